//! Background thread that turns wave samples into the shared overlay raster.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use textreel_core::config::{MAX_SPECTRUM_OCTAVE, MIN_SPECTRUM_OCTAVE};
use textreel_core::{Error, FrameKind, Raster, Result};
use textreel_pipeline::{PipelineContext, SharedRaster};
use tracing::{debug, info, trace};

use crate::modes::{VisualizationMode, Visualizer};

/// Mode and octave selection, shared between the input side and the worker.
#[derive(Debug)]
pub struct VisualizationControl {
    mode: AtomicUsize,
    base_octave: AtomicU32,
}

impl VisualizationControl {
    pub fn new(mode: VisualizationMode, base_octave: u32) -> Self {
        Self {
            mode: AtomicUsize::new(mode.index()),
            base_octave: AtomicU32::new(
                base_octave.clamp(MIN_SPECTRUM_OCTAVE, MAX_SPECTRUM_OCTAVE),
            ),
        }
    }

    pub fn mode(&self) -> VisualizationMode {
        VisualizationMode::from_index(self.mode.load(Ordering::Acquire))
    }

    pub fn set_mode(&self, mode: VisualizationMode) {
        self.mode.store(mode.index(), Ordering::Release);
    }

    pub fn next_mode(&self) -> VisualizationMode {
        let mode = self.mode().next();
        self.set_mode(mode);
        mode
    }

    pub fn previous_mode(&self) -> VisualizationMode {
        let mode = self.mode().previous();
        self.set_mode(mode);
        mode
    }

    pub fn base_octave(&self) -> u32 {
        self.base_octave.load(Ordering::Acquire)
    }

    pub fn set_base_octave(&self, octave: u32) {
        self.base_octave.store(
            octave.clamp(MIN_SPECTRUM_OCTAVE, MAX_SPECTRUM_OCTAVE),
            Ordering::Release,
        );
    }

    /// Raise the base octave. Ignored outside the musical spectrum.
    pub fn next_base_octave(&self) -> u32 {
        if self.mode() == VisualizationMode::MusicalSpectrum {
            self.set_base_octave(self.base_octave().saturating_add(1));
        }
        self.base_octave()
    }

    /// Lower the base octave. Ignored outside the musical spectrum.
    pub fn previous_base_octave(&self) -> u32 {
        if self.mode() == VisualizationMode::MusicalSpectrum {
            self.set_base_octave(self.base_octave().saturating_sub(1));
        }
        self.base_octave()
    }
}

/// Polls the wave-sample queue and publishes renders into a shared raster.
///
/// Rendering happens on a private canvas; the shared raster is locked only
/// for the final copy. When the shared raster changes size the private
/// canvas is rebuilt from it and the render of that round is discarded.
pub struct VizWorker {
    ctx: Arc<PipelineContext>,
    control: Arc<VisualizationControl>,
    shared: SharedRaster,
    canvas: Raster,
    visualizer: Visualizer,
}

impl VizWorker {
    pub fn new(
        ctx: Arc<PipelineContext>,
        control: Arc<VisualizationControl>,
        shared: SharedRaster,
    ) -> Self {
        let canvas = shared.lock().clone();
        let visualizer = Self::build(&ctx, &control);
        Self {
            ctx,
            control,
            shared,
            canvas,
            visualizer,
        }
    }

    fn build(ctx: &PipelineContext, control: &VisualizationControl) -> Visualizer {
        let config = ctx.config();
        let mut visualizer = Visualizer::new(control.mode(), &config.viz, config.sample_rate);
        visualizer.set_base_octave(control.base_octave());
        visualizer
    }

    pub const fn visualizer(&self) -> &Visualizer {
        &self.visualizer
    }

    /// Spawn the worker on its own thread. It exits once the context is told
    /// to quit.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("viz-worker".to_string())
            .spawn(move || self.run())
            .map_err(|e| Error::Internal(format!("Failed to spawn visualization thread: {e}")))
    }

    pub fn run(mut self) {
        info!("Visualization worker started ({})", self.visualizer.mode());
        let poll = Duration::from_millis(self.ctx.config().viz.poll_interval_ms);
        while !self.ctx.should_quit() {
            self.step();
            std::thread::sleep(poll);
        }
        debug!("Visualization worker shutting down");
    }

    /// One polling round. Returns true if a block was rendered.
    pub fn step(&mut self) -> bool {
        let mode = self.control.mode();
        if mode != self.visualizer.mode() {
            debug!("Visualization mode: {} -> {}", self.visualizer.mode(), mode);
            self.visualizer = Self::build(&self.ctx, &self.control);
            self.canvas.clear();
        } else {
            self.visualizer.set_base_octave(self.control.base_octave());
        }

        let queues = self.ctx.queues();
        let backlog = queues.count(FrameKind::WaveSample);
        if backlog > 1 {
            let mut excess = backlog - 1;
            let skipped = queues.drain_while(FrameKind::WaveSample, &mut |_| {
                let more = excess > 0;
                excess = excess.saturating_sub(1);
                more
            });
            trace!("Skipped {skipped} stale wave blocks");
        }

        let Ok(frame) = queues.dequeue(FrameKind::WaveSample) else {
            return false;
        };
        self.visualizer.render(frame.samples(), &mut self.canvas);

        let mut shared = self.shared.lock();
        if shared.size() == self.canvas.size() {
            shared.copy_from(&self.canvas, 0, 0);
        } else {
            debug!(
                "Overlay resized to {}x{}",
                shared.width(),
                shared.height()
            );
            self.canvas = shared.clone();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

    use parking_lot::Mutex;
    use textreel_core::{Frame, PipelineConfig};
    use textreel_pipeline::{ManualTime, TimeSource};

    use super::*;

    fn setup(mode: VisualizationMode) -> (Arc<PipelineContext>, Arc<VisualizationControl>, SharedRaster) {
        let time: Arc<dyn TimeSource> = Arc::new(ManualTime::new(0));
        let ctx = Arc::new(PipelineContext::new(PipelineConfig::default(), time).unwrap());
        let control = Arc::new(VisualizationControl::new(mode, 3));
        let shared = Arc::new(Mutex::new(Raster::new(40, 12).unwrap()));
        (ctx, control, shared)
    }

    fn push_wave(ctx: &PipelineContext, value: i16) {
        ctx.queues()
            .try_enqueue(Frame::wave_sample(vec![value; 64], -1))
            .unwrap();
    }

    #[test]
    fn test_control_cycles_and_clamps() {
        let control = VisualizationControl::new(VisualizationMode::Waveform, 3);
        assert_eq!(control.previous_mode(), VisualizationMode::MusicalSpectrum);
        assert_eq!(control.next_mode(), VisualizationMode::Waveform);

        // Octave keys only act in musical mode.
        assert_eq!(control.next_base_octave(), 3);
        control.set_mode(VisualizationMode::MusicalSpectrum);
        for _ in 0..10 {
            control.next_base_octave();
        }
        assert_eq!(control.base_octave(), MAX_SPECTRUM_OCTAVE);
        for _ in 0..10 {
            control.previous_base_octave();
        }
        assert_eq!(control.base_octave(), MIN_SPECTRUM_OCTAVE);
    }

    #[test]
    fn test_step_without_samples_leaves_overlay() {
        let (ctx, control, shared) = setup(VisualizationMode::Waveform);
        let mut worker = VizWorker::new(ctx, control, shared.clone());
        assert!(!worker.step());
        assert!(shared.lock().cells().iter().all(|&b| b == b' '));
    }

    #[test]
    fn test_step_keeps_only_newest_block() {
        let (ctx, control, shared) = setup(VisualizationMode::Waveform);
        for value in [0, 0, 0, 20_000] {
            push_wave(&ctx, value);
        }
        let mut worker = VizWorker::new(ctx.clone(), control, shared.clone());
        assert!(worker.step());
        assert_eq!(ctx.queues().count(FrameKind::WaveSample), 0);

        let overlay = shared.lock();
        assert_eq!(overlay.get(0, 3), Some(b'L'));
        assert_eq!(overlay.get(5, 3), Some(b'#'));
        assert!(!overlay.cells().contains(&b'-'));
    }

    #[test]
    fn test_mode_change_resets_canvas() {
        let (ctx, control, shared) = setup(VisualizationMode::ScrollingPeak);
        let mut worker = VizWorker::new(ctx.clone(), control.clone(), shared.clone());
        for _ in 0..5 {
            push_wave(&ctx, 30_000);
            worker.step();
        }
        assert!(shared.lock().cells().contains(&b'#'));

        control.set_mode(VisualizationMode::CircleMeter);
        push_wave(&ctx, 0);
        assert!(worker.step());
        assert_eq!(worker.visualizer().mode(), VisualizationMode::CircleMeter);
        assert!(!shared.lock().cells().contains(&b'#'));
    }

    #[test]
    fn test_follows_overlay_resize() {
        let (ctx, control, shared) = setup(VisualizationMode::Waveform);
        let mut worker = VizWorker::new(ctx.clone(), control, shared.clone());
        shared.lock().resize(60, 20).unwrap();

        push_wave(&ctx, 0);
        assert!(worker.step());
        assert_eq!(worker.canvas.size(), (60, 20));

        push_wave(&ctx, 0);
        assert!(worker.step());
        assert_eq!(shared.lock().get(0, 5), Some(b'L'));
    }

    #[test]
    fn test_spawned_worker_exits_on_quit() {
        let (ctx, control, shared) = setup(VisualizationMode::SpectrumBars);
        let handle = VizWorker::new(ctx.clone(), control, shared.clone())
            .spawn()
            .unwrap();
        push_wave(&ctx, 1000);
        std::thread::sleep(Duration::from_millis(50));
        ctx.request_quit();
        handle.join().unwrap();
        assert!(shared.lock().row_string(11).unwrap().contains("L [sqrt/log"));
    }
}
