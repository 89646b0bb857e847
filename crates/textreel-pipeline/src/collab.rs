//! Interfaces to the components the pipeline drives but does not own:
//! the decoder, the audio device, the playlist and the screen.

use textreel_core::{Raster, Result, StatusLine};

use crate::producer::FrameProducer;

/// What the pipeline needs to know about a playlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackInfo {
    /// Position in the playlist; stamped on every frame as its play number.
    pub index: usize,
    pub has_video: bool,
    /// The video stream is a single picture (cover art).
    pub still_image: bool,
}

impl TrackInfo {
    /// Whether this entry may start while the previous entry's audio is still queued.
    pub const fn allows_gapless(&self) -> bool {
        !self.has_video || self.still_image
    }
}

/// Decoder feeding decoded frames into the queues.
pub trait MediaSource: Send {
    /// Open `track` for decoding from its beginning.
    fn open(&mut self, track: &TrackInfo, producer: &mut FrameProducer) -> Result<()>;

    /// Decode and enqueue frames until the wanted queues are full or the
    /// streams end. Calls [`FrameProducer::finish`] for exhausted streams.
    fn read_and_buffer(&mut self, producer: &mut FrameProducer) -> Result<()>;

    /// Reposition both streams near `target_us`.
    fn seek(&mut self, target_us: i64) -> Result<()>;

    /// Average video frame duration, `None` for audio-only media.
    fn frame_duration_us(&self) -> Option<i64>;

    /// Lossless codecs need a longer quiet period after a seek.
    fn is_lossless(&self) -> bool {
        false
    }
}

/// Audio output device control.
pub trait AudioDevice: Send + Sync {
    fn set_muted(&self, muted: bool);
}

/// Ordered list of media items.
pub trait Playlist: Send {
    fn current(&self) -> Option<TrackInfo>;

    /// The entry [`Playlist::advance`] would move to.
    fn peek_next(&self) -> Option<TrackInfo>;

    fn advance(&mut self) -> Option<TrackInfo>;
}

/// Character display receiving composed frames.
pub trait Renderer: Send {
    fn show(&mut self, raster: &Raster, status: &StatusLine) -> Result<()>;
}
