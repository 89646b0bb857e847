//! Audio output path: fills device buffers from the audio queue.

use std::sync::Arc;

use textreel_core::{Frame, FrameKind};
use tracing::{trace, warn};

use crate::context::PipelineContext;

/// Audio output stream configuration.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per device callback.
    pub buffer_size: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            buffer_size: 1024,
        }
    }
}

impl OutputConfig {
    /// Interleaved samples requested per callback.
    pub fn samples_per_callback(&self) -> usize {
        self.buffer_size as usize * usize::from(self.channels)
    }

    /// Wall time covered by one callback.
    pub fn callback_period(&self) -> std::time::Duration {
        std::time::Duration::from_micros(
            u64::from(self.buffer_size) * 1_000_000 / u64::from(self.sample_rate.max(1)),
        )
    }
}

/// Scale `samples` by `volume` percent and saturate to 16 bits.
///
/// Returns the absolute peak after scaling and whether any sample clipped.
pub fn apply_volume(samples: &mut [i16], volume: u32) -> (i32, bool) {
    let volume = i32::try_from(volume).unwrap_or(i32::MAX);
    let mut peak = 0;
    let mut clipped = false;
    for sample in samples.iter_mut() {
        let scaled = i32::from(*sample).saturating_mul(volume) / 100;
        let limited = scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX));
        clipped |= limited != scaled;
        *sample = limited as i16;
        peak = peak.max(limited.abs());
    }
    (peak, clipped)
}

/// Result of one [`AudioSink::fill`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FillReport {
    /// Samples taken from queued audio frames.
    pub delivered: usize,
    /// Samples substituted with silence.
    pub silence: usize,
}

/// Consumer of the audio queue, driven by the device callback.
///
/// Holds the partially played head frame between callbacks.
pub struct AudioSink {
    ctx: Arc<PipelineContext>,
    pending: Option<Frame>,
    pending_epoch: u64,
}

impl AudioSink {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        let pending_epoch = ctx.flush_epoch();
        Self {
            ctx,
            pending: None,
            pending_epoch,
        }
    }

    /// Fill a little-endian byte buffer. Always writes every byte.
    pub fn fill_bytes(&mut self, out: &mut [u8]) -> FillReport {
        let mut samples = vec![0i16; out.len() / 2];
        let report = self.fill(&mut samples);
        for (chunk, sample) in out.chunks_exact_mut(2).zip(&samples) {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }
        if out.len() % 2 == 1 {
            if let Some(last) = out.last_mut() {
                *last = 0;
            }
        }
        report
    }

    /// Fill `out` with interleaved stereo samples, substituting silence
    /// when no audio is queued or playback is paused.
    pub fn fill(&mut self, out: &mut [i16]) -> FillReport {
        let ctx = Arc::clone(&self.ctx);
        let epoch = ctx.flush_epoch();
        if epoch != self.pending_epoch {
            self.pending = None;
            self.pending_epoch = epoch;
        }

        let rate = ctx.config().sample_rate;
        let threshold = ctx.config().sync.drift_threshold_us;
        let paused = ctx.clock().is_paused();
        let mut written = 0;
        let mut drift_checked = false;

        while written < out.len() && !paused {
            if self.pending.is_none() {
                match ctx.queues().dequeue(FrameKind::Audio) {
                    Ok(frame) => self.pending = Some(frame),
                    Err(_) => break,
                }
            }
            let Some(frame) = self.pending.as_mut() else {
                break;
            };

            let pts = frame.cursor_pts(rate);
            if frame.has_pts() {
                if !drift_checked {
                    ctx.record_audio_drift(ctx.clock().correct_drift(pts, threshold));
                    drift_checked = true;
                }
                ctx.record_audio_cursor(pts, frame.play_number());
            }

            let remaining = frame.remaining_samples();
            let n = remaining.len().min(out.len() - written);
            out[written..written + n].copy_from_slice(&remaining[..n]);
            frame.consume_samples(n);
            written += n;

            if frame.is_consumed() {
                self.pending = None;
            }
        }

        self.ctx.set_pending_audio_samples(
            self.pending
                .as_ref()
                .map_or(0, |frame| frame.remaining_samples().len()),
        );

        let silence = out.len() - written;
        if silence > 0 {
            out[written..].fill(0);
            if !paused {
                ctx.record_audio_cursor(ctx.clock().position_us(), None);
                if written > 0 {
                    trace!("Audio underrun: needed {}, got {}", out.len(), written);
                }
            }
        }

        let (peak, clipped) = apply_volume(out, ctx.volume());
        ctx.record_output_level(peak, clipped);
        self.publish_wave(out);

        FillReport {
            delivered: written,
            silence,
        }
    }

    /// Copy the delivered buffer to the visualization queue, if it has room.
    fn publish_wave(&self, samples: &[i16]) {
        let (pts, play_number) = self.ctx.audio_cursor();
        match Frame::try_pcm_from(FrameKind::WaveSample, samples, pts) {
            Ok(frame) => {
                if self
                    .ctx
                    .queues()
                    .try_enqueue(frame.with_play_number(play_number))
                    .is_err()
                {
                    trace!("Wave sample queue full, dropping block");
                }
            }
            Err(e) => warn!("Failed to allocate wave sample: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

    use super::*;
    use crate::clock::{ManualTime, TimeSource};
    use textreel_core::PipelineConfig;

    fn sink_with_time(now: i64) -> (Arc<ManualTime>, Arc<PipelineContext>, AudioSink) {
        let time = Arc::new(ManualTime::new(now));
        let mut config = PipelineConfig::default();
        config.sample_rate = 48_000;
        let source: Arc<dyn TimeSource> = time.clone();
        let ctx = Arc::new(PipelineContext::new(config, source).unwrap());
        let sink = AudioSink::new(Arc::clone(&ctx));
        (time, ctx, sink)
    }

    #[test]
    fn test_apply_volume() {
        let mut samples = [100, -200, 30_000, -30_000];
        let (peak, clipped) = apply_volume(&mut samples, 50);
        assert_eq!(samples, [50, -100, 15_000, -15_000]);
        assert_eq!(peak, 15_000);
        assert!(!clipped);

        let mut loud = [20_000, -20_000];
        let (peak, clipped) = apply_volume(&mut loud, 200);
        assert_eq!(loud, [i16::MAX, i16::MIN]);
        assert_eq!(peak, 32_768);
        assert!(clipped);
    }

    #[test]
    fn test_underrun_fills_silence() {
        let (_time, ctx, mut sink) = sink_with_time(0);
        let mut out = [7i16; 64];
        let report = sink.fill(&mut out);
        assert_eq!(report, FillReport { delivered: 0, silence: 64 });
        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(ctx.queues().count(FrameKind::WaveSample), 1);
    }

    #[test]
    fn test_partial_consumption_across_callbacks() {
        let (_time, ctx, mut sink) = sink_with_time(0);
        let samples: Vec<i16> = (0..96).collect();
        ctx.queues().try_enqueue(Frame::audio(samples, 0)).unwrap();

        let mut first = [0i16; 64];
        assert_eq!(sink.fill(&mut first).delivered, 64);
        assert_eq!(first[63], 63);
        assert!(ctx.queues().is_empty(FrameKind::Audio));
        assert_eq!(ctx.pending_audio_samples(), 32);

        let mut second = [0i16; 64];
        let report = sink.fill(&mut second);
        assert_eq!(report, FillReport { delivered: 32, silence: 32 });
        assert_eq!(second[0], 64);
        assert_eq!(second[31], 95);
        assert_eq!(second[32], 0);
        assert_eq!(ctx.pending_audio_samples(), 0);
    }

    #[test]
    fn test_drift_resynchronizes_clock() {
        let (time, ctx, mut sink) = sink_with_time(0);
        time.set(500_000);
        ctx.queues().try_enqueue(Frame::audio(vec![0; 32], 100_000)).unwrap();
        sink.fill(&mut [0i16; 32]);
        assert_eq!(ctx.clock().drift_us(100_000), 0);
        assert_eq!(ctx.status_line().audio_drift_us, 400_000);
    }

    #[test]
    fn test_flush_discards_pending_frame() {
        let (_time, ctx, mut sink) = sink_with_time(0);
        ctx.queues().try_enqueue(Frame::audio(vec![1; 128], 0)).unwrap();
        sink.fill(&mut [0i16; 32]);
        assert_eq!(ctx.pending_audio_samples(), 96);
        ctx.flush(&[FrameKind::Audio]);
        assert_eq!(ctx.pending_audio_samples(), 0);
        let report = sink.fill(&mut [0i16; 32]);
        assert_eq!(report.delivered, 0);
    }

    #[test]
    fn test_paused_outputs_silence_and_keeps_queue() {
        let (_time, ctx, mut sink) = sink_with_time(0);
        ctx.queues().try_enqueue(Frame::audio(vec![1; 32], 0)).unwrap();
        ctx.clock().pause();
        let mut out = [5i16; 16];
        let report = sink.fill(&mut out);
        assert_eq!(report.silence, 16);
        assert_eq!(ctx.queues().count(FrameKind::Audio), 1);
    }

    #[test]
    fn test_fill_bytes_little_endian() {
        let (_time, ctx, mut sink) = sink_with_time(0);
        ctx.queues().try_enqueue(Frame::audio(vec![0x0102, -2], 0)).unwrap();
        let mut out = [0xffu8; 5];
        sink.fill_bytes(&mut out);
        assert_eq!(out, [0x02, 0x01, 0xfe, 0xff, 0x00]);
    }

    #[test]
    fn test_wave_queue_full_drops_copy() {
        let (_time, ctx, mut sink) = sink_with_time(0);
        for _ in 0..12 {
            sink.fill(&mut [0i16; 8]);
        }
        assert_eq!(ctx.queues().count(FrameKind::WaveSample), 8);
    }

    #[test]
    fn test_output_config() {
        let config = OutputConfig {
            sample_rate: 48_000,
            channels: 2,
            buffer_size: 480,
        };
        assert_eq!(config.samples_per_callback(), 960);
        assert_eq!(config.callback_period(), std::time::Duration::from_millis(10));
    }
}
