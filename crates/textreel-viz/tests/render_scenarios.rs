#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::Arc;

use parking_lot::Mutex;
use textreel_core::{FrameKind, PipelineConfig, Raster};
use textreel_pipeline::{AudioSink, FrameProducer, ManualTime, PipelineContext, TimeSource};
use textreel_viz::{
    BandLadder, SpectrumAnalyzer, VisualizationControl, VisualizationMode, VizWorker,
};

fn tone(freq: f64, rate: u32, frames: usize, amplitude: f64) -> Vec<i16> {
    (0..frames)
        .flat_map(|n| {
            let t = n as f64 / f64::from(rate);
            let s = (amplitude * (2.0 * std::f64::consts::PI * freq * t).sin()) as i16;
            [s, s]
        })
        .collect()
}

#[test]
fn one_kilohertz_tone_peaks_in_its_band() {
    let analyzer = SpectrumAnalyzer::new(48_000);
    let ladder = BandLadder::half_octave();
    let bands = analyzer.analyze(&tone(1000.0, 48_000, 4096, 20_000.0), &ladder);

    let (index, _) = bands
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.left.total_cmp(&b.1.left))
        .unwrap();
    assert_eq!(ladder.frequencies()[index], 1000);
    assert!(bands[index].left > bands[index - 1].left * 4.0);
    assert!(bands[index].left > bands[index + 1].left * 4.0);
}

#[test]
fn analysis_is_repeatable() {
    let analyzer = SpectrumAnalyzer::new(44_100);
    let samples = tone(330.0, 44_100, 2048, 8_000.0);
    let ladder = BandLadder::semitone(2, 44_100, 60);
    assert_eq!(
        analyzer.analyze(&samples, &ladder),
        analyzer.analyze(&samples, &ladder)
    );
}

#[test]
fn audio_callback_feeds_the_overlay() {
    let time: Arc<dyn TimeSource> = Arc::new(ManualTime::new(0));
    let ctx = Arc::new(PipelineContext::new(PipelineConfig::default(), time).unwrap());
    let mut producer = FrameProducer::new(ctx.clone());
    producer.begin_track(Some(0));
    producer
        .push_audio(tone(440.0, 44_100, 1024, 25_000.0), 0)
        .unwrap();

    let mut sink = AudioSink::new(ctx.clone());
    let mut out = vec![0i16; 2048];
    let report = sink.fill(&mut out);
    assert_eq!(report.delivered, 2048);
    assert_eq!(ctx.queues().count(FrameKind::WaveSample), 1);

    let overlay = Arc::new(Mutex::new(Raster::new(64, 16).unwrap()));
    let control = Arc::new(VisualizationControl::new(VisualizationMode::CircleMeter, 3));
    let mut worker = VizWorker::new(ctx.clone(), control, overlay.clone());
    assert!(worker.step());

    let overlay = overlay.lock();
    assert_eq!(overlay.get(16, 8), Some(b'L'));
    assert_eq!(overlay.get(48, 8), Some(b'R'));
    assert!(overlay.cells().contains(&b'.'));
}
