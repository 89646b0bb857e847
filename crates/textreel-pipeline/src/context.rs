//! Shared state of one playback session.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use textreel_core::{FrameKind, PipelineConfig, Raster, Result, StatusLine};
use tracing::debug;

use crate::clock::{PlaybackClock, TimeSource};
use crate::queue::{QueueSet, SharedLockQueues, SharedQueueSet};

/// Maximum volume in percent.
pub const MAX_VOLUME: u32 = 200;

/// Default volume in percent.
pub const DEFAULT_VOLUME: u32 = 100;

/// Status refreshes for which a clip stays visible.
const CLIP_HOLD: u8 = 2;

/// Raster shared between the visualization worker and the render loop.
pub type SharedRaster = Arc<Mutex<Raster>>;

#[derive(Debug, Default)]
struct Meters {
    level: i32,
    clip_hold: u8,
    audio_drift_us: i64,
    video_drift_us: i64,
    frame_dropped: bool,
    audio_pts: i64,
    audio_play_number: Option<usize>,
}

/// Everything the producer, the audio callback, the render loop and the
/// visualization worker share. Sessions are independent of each other.
pub struct PipelineContext {
    config: PipelineConfig,
    queues: SharedQueueSet,
    clock: PlaybackClock,
    quit: AtomicBool,
    exhausted: [AtomicBool; 4],
    flush_epoch: AtomicU64,
    /// Unplayed samples of the frame the audio sink is part way through.
    pending_audio: AtomicUsize,
    volume: AtomicU32,
    meters: Mutex<Meters>,
}

impl PipelineContext {
    /// Build a context with a single-lock queue set.
    pub fn new(config: PipelineConfig, time: Arc<dyn TimeSource>) -> Result<Self> {
        config.validate()?;
        let queues = Arc::new(SharedLockQueues::new(config.capacities)?);
        Self::with_queues(config, queues, time)
    }

    /// Build a context around an existing queue set.
    pub fn with_queues(
        config: PipelineConfig,
        queues: SharedQueueSet,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        config.validate()?;
        debug!(
            "Pipeline context: {} Hz, capacities {:?}",
            config.sample_rate, config.capacities
        );
        Ok(Self {
            config,
            queues,
            clock: PlaybackClock::new(time),
            quit: AtomicBool::new(false),
            exhausted: Default::default(),
            flush_epoch: AtomicU64::new(0),
            pending_audio: AtomicUsize::new(0),
            volume: AtomicU32::new(DEFAULT_VOLUME),
            meters: Mutex::new(Meters::default()),
        })
    }

    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn queues(&self) -> &dyn QueueSet {
        self.queues.as_ref()
    }

    pub const fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }

    pub fn should_quit(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    /// Record that the decoder has no more frames of `kind` for the current item.
    pub fn set_exhausted(&self, kind: FrameKind, exhausted: bool) {
        self.exhausted[kind.index()].store(exhausted, Ordering::SeqCst);
    }

    pub fn is_exhausted(&self, kind: FrameKind) -> bool {
        self.exhausted[kind.index()].load(Ordering::SeqCst)
    }

    /// Counter bumped whenever queued audio is discarded.
    ///
    /// The audio sink drops its partially played frame when this changes.
    pub fn flush_epoch(&self) -> u64 {
        self.flush_epoch.load(Ordering::SeqCst)
    }

    /// Drain every queue in `kinds`. Returns the number of frames discarded.
    pub fn flush(&self, kinds: &[FrameKind]) -> usize {
        if kinds.contains(&FrameKind::Audio) {
            self.flush_epoch.fetch_add(1, Ordering::SeqCst);
            self.pending_audio.store(0, Ordering::SeqCst);
        }
        let dropped: usize = kinds
            .iter()
            .map(|&kind| self.queues.drain_all(kind))
            .sum();
        debug!("Flushed {:?}: {} frames", kinds, dropped);
        dropped
    }

    /// Called by the audio sink after every fill.
    pub fn set_pending_audio_samples(&self, samples: usize) {
        self.pending_audio.store(samples, Ordering::SeqCst);
    }

    /// Samples the audio sink has dequeued but not yet played.
    pub fn pending_audio_samples(&self) -> usize {
        self.pending_audio.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> u32 {
        self.volume.load(Ordering::Relaxed)
    }

    pub fn set_volume(&self, percent: u32) {
        self.volume.store(percent.min(MAX_VOLUME), Ordering::Relaxed);
    }

    /// Fold one output buffer's peak into the level meter.
    pub fn record_output_level(&self, peak: i32, clipped: bool) {
        let mut meters = self.meters.lock();
        meters.level = (meters.level * 7 / 8).max(peak);
        if clipped {
            meters.clip_hold = CLIP_HOLD;
        }
    }

    pub fn level(&self) -> i32 {
        self.meters.lock().level
    }

    pub fn record_audio_drift(&self, drift_us: i64) {
        self.meters.lock().audio_drift_us = drift_us;
    }

    pub fn record_video_drift(&self, drift_us: i64) {
        self.meters.lock().video_drift_us = drift_us;
    }

    pub fn flag_frame_drop(&self) {
        self.meters.lock().frame_dropped = true;
    }

    /// Remember what the audio device is playing right now.
    pub fn record_audio_cursor(&self, pts: i64, play_number: Option<usize>) {
        let mut meters = self.meters.lock();
        meters.audio_pts = pts;
        if play_number.is_some() {
            meters.audio_play_number = play_number;
        }
    }

    /// Pts and play number of the audio currently being output.
    pub fn audio_cursor(&self) -> (i64, Option<usize>) {
        let meters = self.meters.lock();
        (meters.audio_pts, meters.audio_play_number)
    }

    /// Snapshot for the status line. Consumes the clip and frame-drop indicators.
    pub fn status_line(&self) -> StatusLine {
        let position_us = self.clock.position_us();
        let volume = self.volume();
        let mut meters = self.meters.lock();
        let status = StatusLine {
            position_us,
            volume,
            clipping: meters.clip_hold > 0,
            audio_drift_us: meters.audio_drift_us,
            video_drift_us: meters.video_drift_us,
            frame_dropped: meters.frame_dropped,
            meter: StatusLine::level_meter(meters.level),
            meter_char: '#',
        };
        meters.clip_hold = meters.clip_hold.saturating_sub(1);
        meters.frame_dropped = false;
        status
    }
}
