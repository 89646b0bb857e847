//! # textreel-pipeline
//!
//! Real-time playback pipeline for textreel.
//!
//! Features:
//! - Bounded per-kind frame queues behind a swappable `QueueSet`
//! - Wall-clock playback clock with one-step drift resynchronization
//! - Video pacing with catch-up frame dropping
//! - Audio output fill with volume, clip and level metering

pub mod clock;
pub mod collab;
pub mod context;
pub mod output;
pub mod producer;
pub mod queue;
pub mod session;
pub mod sync;

pub use clock::{ManualTime, MonotonicTime, PlaybackClock, TimeSource};
pub use collab::{AudioDevice, MediaSource, Playlist, Renderer, TrackInfo};
pub use context::{PipelineContext, SharedRaster, DEFAULT_VOLUME, MAX_VOLUME};
pub use output::{apply_volume, AudioSink, FillReport, OutputConfig};
pub use producer::{FrameProducer, GaplessTrim, PushOutcome, SeekGuard};
pub use queue::{PerKindQueues, QueueSet, SharedLockQueues, SharedQueueSet, TryEnqueueError};
pub use session::{Session, SessionCommand, SessionEvent, SessionHandle, SessionParts};
pub use sync::{EndOfStream, SessionState, SyncController, Tick};
