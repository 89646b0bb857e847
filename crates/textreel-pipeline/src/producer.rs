//! Decoder-side helpers for pushing frames into the queues.

use std::sync::Arc;

use textreel_core::{Frame, FrameKind, Payload, Raster, SeekConfig};
use tracing::{debug, trace};

use crate::context::PipelineContext;
use crate::queue::TryEnqueueError;

/// Pts given to the first video frames after a seek so they show at once.
const FAR_PAST_PTS: i64 = -1_000_000_000;

/// Samples added to the encoded length when the source is resampled.
const RESAMPLE_COMPENSATION: i64 = 16;

/// What happened to a pushed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Consumed by the seek guard or trimmed away entirely.
    Discarded,
}

/// Suppresses decoder output right after a seek.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekGuard {
    audio_blocks: u32,
    video_frames: u32,
}

impl SeekGuard {
    pub const fn armed(config: &SeekConfig, lossless: bool) -> Self {
        Self {
            audio_blocks: if lossless {
                config.ignore_audio_blocks_lossless
            } else {
                config.ignore_audio_blocks
            },
            video_frames: config.ignore_video_frames,
        }
    }

    pub const fn is_active(&self) -> bool {
        self.audio_blocks > 0 || self.video_frames > 0
    }

    /// Returns `true` if this audio block should be thrown away.
    pub fn swallow_audio(&mut self) -> bool {
        if self.audio_blocks == 0 {
            return false;
        }
        self.audio_blocks -= 1;
        true
    }

    /// Pts to stamp on the next video frame.
    pub fn restamp_video(&mut self, pts: i64) -> i64 {
        if self.video_frames == 0 {
            return pts;
        }
        self.video_frames -= 1;
        FAR_PAST_PTS
    }
}

/// Encoder delay and padding information for gapless playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaplessTrim {
    /// Valid samples per channel, at the source rate.
    pub length: i64,
    /// Encoder delay in samples per channel, at the source rate.
    pub encoder_delay: i64,
    pub source_rate: u32,
}

impl GaplessTrim {
    /// Last playable sample position at `output_rate`.
    pub fn end_sample(&self, output_rate: u32) -> i64 {
        let compensation = if self.source_rate == output_rate {
            0
        } else {
            RESAMPLE_COMPENSATION
        };
        (self.length + self.encoder_delay + compensation) * i64::from(output_rate)
            / i64::from(self.source_rate.max(1))
    }

    /// Cut `samples` (interleaved stereo, starting at `pts`) so playback ends
    /// at the encoded length.
    pub fn apply(&self, samples: &mut Vec<i16>, pts: i64, output_rate: u32) {
        let end = self.end_sample(output_rate);
        let current = pts * i64::from(output_rate) / 1_000_000;
        let frames = (samples.len() / 2) as i64;
        if current + frames > end {
            let keep = ((end - current - 1) * 2).max(0);
            samples.truncate(usize::try_from(keep).unwrap_or(0));
        }
    }
}

/// Producer-side handle: stamps play numbers, applies the seek guard and
/// gapless trim, and reports exhaustion.
pub struct FrameProducer {
    ctx: Arc<PipelineContext>,
    play_number: Option<usize>,
    seek_guard: SeekGuard,
    gapless: Option<GaplessTrim>,
    last_video_pts: Option<i64>,
}

impl FrameProducer {
    pub const fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            play_number: None,
            seek_guard: SeekGuard {
                audio_blocks: 0,
                video_frames: 0,
            },
            gapless: None,
            last_video_pts: None,
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub const fn play_number(&self) -> Option<usize> {
        self.play_number
    }

    /// Reset per-item state for a newly opened playlist entry.
    pub fn begin_track(&mut self, play_number: Option<usize>) {
        self.play_number = play_number;
        self.seek_guard = SeekGuard::default();
        self.gapless = None;
        self.last_video_pts = None;
        for kind in [FrameKind::Audio, FrameKind::Video, FrameKind::Void] {
            self.ctx.set_exhausted(kind, false);
        }
    }

    pub fn set_gapless_trim(&mut self, trim: Option<GaplessTrim>) {
        self.gapless = trim;
    }

    pub fn arm_seek_guard(&mut self, lossless: bool) {
        self.seek_guard = SeekGuard::armed(&self.ctx.config().seek, lossless);
        self.last_video_pts = None;
    }

    pub const fn seek_guard(&self) -> &SeekGuard {
        &self.seek_guard
    }

    /// Whether the decoder should produce more frames of `kind`.
    pub fn wants(&self, kind: FrameKind) -> bool {
        !self.ctx.is_exhausted(kind) && !self.ctx.queues().is_full(kind)
    }

    /// Mark a stream as ended for the current item.
    pub fn finish(&self, kind: FrameKind) {
        if !self.ctx.is_exhausted(kind) {
            debug!("{} stream exhausted", kind);
        }
        self.ctx.set_exhausted(kind, true);
    }

    pub fn is_exhausted(&self, kind: FrameKind) -> bool {
        self.ctx.is_exhausted(kind)
    }

    /// Queue a decoded audio block of interleaved stereo samples.
    pub fn push_audio(
        &mut self,
        mut samples: Vec<i16>,
        pts: i64,
    ) -> Result<PushOutcome, TryEnqueueError> {
        if self.seek_guard.swallow_audio() {
            trace!("Ignoring audio block at {} after seek", pts);
            return Ok(PushOutcome::Discarded);
        }
        if let Some(trim) = &self.gapless {
            trim.apply(&mut samples, pts, self.ctx.config().sample_rate);
            if samples.is_empty() {
                return Ok(PushOutcome::Discarded);
            }
        }
        self.requeue(Frame::audio(samples, pts))
    }

    /// Queue a decoded video raster.
    pub fn push_video(&mut self, raster: Raster, pts: i64) -> Result<PushOutcome, TryEnqueueError> {
        if self.last_video_pts.is_some_and(|last| pts < last) {
            debug!("Video pts went backwards to {}, flushing video queue", pts);
            self.ctx.flush(&[FrameKind::Video]);
        }
        self.last_video_pts = Some(pts);
        let pts = self.seek_guard.restamp_video(pts);
        self.requeue(Frame::video(raster, pts))
    }

    /// Queue an opaque payload that is neither audio nor video.
    pub fn push_void(&mut self, bytes: Vec<u8>, pts: i64) -> Result<PushOutcome, TryEnqueueError> {
        self.requeue(Frame::new(FrameKind::Void, pts, Payload::Bytes(bytes)))
    }

    /// Enqueue a frame as-is, e.g. one handed back by a rejected push.
    pub fn requeue(&self, frame: Frame) -> Result<PushOutcome, TryEnqueueError> {
        let frame = frame.with_play_number(self.play_number);
        self.ctx.queues().try_enqueue(frame)?;
        Ok(PushOutcome::Queued)
    }
}
