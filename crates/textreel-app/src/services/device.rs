//! A paced stand-in for a sound card: pulls one buffer per period from the
//! audio sink and discards it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use textreel_pipeline::{AudioDevice, AudioSink, OutputConfig, PipelineContext};
use tracing::{debug, info, trace};

#[derive(Debug, Default)]
pub struct SimulatedDevice {
    muted: AtomicBool,
    stopped: AtomicBool,
}

impl SimulatedDevice {
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    /// Ask the output thread to stop pulling buffers.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl AudioDevice for SimulatedDevice {
    fn set_muted(&self, muted: bool) {
        trace!("Device muted: {muted}");
        self.muted.store(muted, Ordering::Release);
    }
}

/// The running output thread.
///
/// It keeps pulling buffers after the pipeline quits, so audio already
/// queued still plays, and exits only once its device is stopped.
pub struct OutputThread {
    device: Arc<SimulatedDevice>,
    handle: JoinHandle<()>,
}

impl OutputThread {
    /// Stop the device and wait for the thread to exit.
    pub fn stop(self) -> Result<()> {
        self.device.stop();
        self.handle
            .join()
            .map_err(|_| anyhow!("audio output thread panicked"))
    }
}

/// Start the output thread.
pub fn spawn_output(
    ctx: Arc<PipelineContext>,
    device: Arc<SimulatedDevice>,
    config: OutputConfig,
) -> Result<OutputThread> {
    let thread_device = Arc::clone(&device);
    let handle = std::thread::Builder::new()
        .name("audio-output".to_string())
        .spawn(move || {
            info!(
                "Audio output started: {} Hz, {} channels, {} frames per buffer",
                config.sample_rate, config.channels, config.buffer_size
            );
            let mut sink = AudioSink::new(Arc::clone(&ctx));
            let mut buffer = vec![0i16; config.samples_per_callback()];
            let period = config.callback_period();
            let mut deadline = Instant::now();
            let mut underruns = 0u64;

            while !thread_device.is_stopped() {
                let report = sink.fill(&mut buffer);
                if thread_device.is_muted() {
                    buffer.fill(0);
                }
                if report.silence > 0 && report.delivered > 0 {
                    underruns += 1;
                }
                deadline += period;
                std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
            }
            debug!("Audio output stopped after {underruns} underruns");
        })
        .context("Failed to spawn audio output thread")?;
    Ok(OutputThread { device, handle })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

    use super::*;
    use std::time::Duration;
    use textreel_core::{Frame, FrameKind, PipelineConfig};
    use textreel_pipeline::MonotonicTime;

    #[test]
    fn test_mute_flag() {
        let device = SimulatedDevice::default();
        assert!(!device.is_muted());
        device.set_muted(true);
        assert!(device.is_muted());
        device.set_muted(false);
        assert!(!device.is_muted());
    }

    #[test]
    fn test_queued_audio_drains_after_quit() {
        let config = PipelineConfig::default();
        let output = OutputConfig {
            sample_rate: config.sample_rate,
            channels: 2,
            buffer_size: 64,
        };
        let ctx = Arc::new(PipelineContext::new(config, Arc::new(MonotonicTime::new())).unwrap());
        for i in 0..4 {
            ctx.queues()
                .try_enqueue(Frame::audio(vec![100; 96], i * 1_000))
                .unwrap();
        }

        let device = Arc::new(SimulatedDevice::default());
        let thread = spawn_output(Arc::clone(&ctx), Arc::clone(&device), output).unwrap();
        ctx.request_quit();

        let deadline = Instant::now() + Duration::from_secs(5);
        while (!ctx.queues().is_empty(FrameKind::Audio) || ctx.pending_audio_samples() > 0)
            && Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(ctx.queues().is_empty(FrameKind::Audio));
        assert_eq!(ctx.pending_audio_samples(), 0);
        assert!(!thread.handle.is_finished());
        assert!(!device.is_stopped());

        thread.stop().unwrap();
        assert!(device.is_stopped());
    }
}
