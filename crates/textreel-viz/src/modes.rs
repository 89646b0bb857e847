//! The six visualization modes.
//!
//! Every mode draws into a caller-owned raster. Stateless modes repaint it
//! from scratch; the scrolling modes shift the previous picture one column
//! left and paint the newest column on the right edge.

use std::fmt;

use textreel_core::config::{MAX_SPECTRUM_OCTAVE, MIN_SPECTRUM_OCTAVE};
use textreel_core::{Raster, VizConfig};

use crate::spectrum::{bar_height, BandLadder, SpectrumAnalyzer, HALF_OCTAVE_BANDS, NOTE_NAMES};

/// Samples with a magnitude below this get a centre-line tick.
const QUIET_THRESHOLD: i32 = 512;

/// Floor for both scrolling readouts, in tenths of a dB.
pub const DB_FLOOR_TENTHS: i32 = -1000;

/// Offset between the RMS readout and the scaled signal power.
const RMS_REFERENCE: f64 = 12.342_23;

const RMS_BAR_OFFSET: i32 = 400;
const RMS_BAR_RANGE: i32 = 350;

/// Musical mode never shows more notes than this.
pub const MAX_NOTE_BANDS: usize = 128;

/// Width of one note column pair plus its name.
const NOTE_COLUMNS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VisualizationMode {
    #[default]
    Waveform,
    CircleMeter,
    ScrollingPeak,
    ScrollingRms,
    SpectrumBars,
    MusicalSpectrum,
}

impl VisualizationMode {
    pub const ALL: [Self; 6] = [
        Self::Waveform,
        Self::CircleMeter,
        Self::ScrollingPeak,
        Self::ScrollingRms,
        Self::SpectrumBars,
        Self::MusicalSpectrum,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Mode at `index`, clamped to the last mode.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Waveform => "waveform",
            Self::CircleMeter => "circle",
            Self::ScrollingPeak => "peak",
            Self::ScrollingRms => "rms",
            Self::SpectrumBars => "spectrum",
            Self::MusicalSpectrum => "musical",
        }
    }
}

impl fmt::Display for VisualizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Largest absolute sample per channel of an interleaved stereo block.
fn channel_peaks(samples: &[i16]) -> (i32, i32) {
    samples.chunks_exact(2).fold((0, 0), |(l, r), frame| {
        (
            l.max(i32::from(frame[0]).abs()),
            r.max(i32::from(frame[1]).abs()),
        )
    })
}

/// Readout such as ` -6.0dB ` for a value in tenths of a dB.
pub fn db_label(tenths: i32) -> String {
    let sign = if tenths > 0 { '+' } else { '-' };
    let magnitude = tenths.unsigned_abs();
    format!(" {sign}{}.{}dB ", magnitude / 10, magnitude % 10)
}

/// Peak level in tenths of a dB relative to full scale.
pub fn peak_tenths(peak: i32) -> i32 {
    let db = ((f64::from(peak) + 0.1) / 32768.0).log10() * 200.0;
    (db as i32).max(DB_FLOOR_TENTHS)
}

/// RMS readout in tenths of a dB for a sum of squares over `interval` blocks.
pub fn rms_tenths(sum_of_squares: i64, interval: u32) -> i32 {
    let mean = (sum_of_squares as f64 + 0.1) / f64::from(interval.max(1));
    let db = (mean.log10() - RMS_REFERENCE) * 100.0;
    (db as i32).max(DB_FLOOR_TENTHS)
}

fn dims(canvas: &Raster) -> (i32, i32) {
    (canvas.width() as i32, canvas.height() as i32)
}

/// Two traces of vertical strokes: left channel in the upper half, right in
/// the lower half.
#[derive(Debug, Default)]
pub struct Waveform;

impl Waveform {
    pub fn render(&self, samples: &[i16], canvas: &mut Raster) {
        canvas.clear();
        let (width, height) = dims(canvas);
        let (left_row, right_row) = (height / 4, height * 3 / 4);
        let count = samples.len().min(width.max(0) as usize * 2);

        for (i, &sample) in samples.iter().take(count).enumerate() {
            let sample = i32::from(sample);
            let x = (i / 2) as i32;
            let y = (i64::from(sample) * i64::from(height) / 65536 / 2) as i32;
            let row = if i % 2 == 1 { right_row } else { left_row };
            if x != 0 {
                canvas.draw_line(x, row - y, x, row + y, b'#');
            }
            if sample.abs() < QUIET_THRESHOLD {
                canvas.put(x, row, b'-');
            }
        }
        canvas.put(0, left_row, b'L');
        canvas.put(0, right_row, b'R');
    }
}

/// One ring per channel whose radius follows the block peak.
#[derive(Debug)]
pub struct CircleMeter {
    aspect: i32,
}

impl CircleMeter {
    pub const fn new(aspect: i32) -> Self {
        Self { aspect }
    }

    pub fn render(&self, samples: &[i16], canvas: &mut Raster) {
        canvas.clear();
        let (width, height) = dims(canvas);
        let (left_x, right_x, y) = (width / 4, width * 3 / 4, height / 2);
        let (left_peak, right_peak) = channel_peaks(samples);

        for (x, peak, label) in [(left_x, left_peak, b'L'), (right_x, right_peak, b'R')] {
            let radius = (i64::from(width) * i64::from(peak) / 32768 / 8) as i32;
            canvas.draw_circle(x, y, radius, b'.', self.aspect);
            if radius - 2 > 0 {
                canvas.draw_circle(x, y, radius - 2, b' ', self.aspect);
            }
            canvas.put(x, y, label);
        }
    }
}

/// Shared bookkeeping for the two scrolling modes: the picture advances one
/// column every `interval` blocks.
#[derive(Debug, Clone, Copy)]
struct ScrollCadence {
    interval: u32,
    count: u32,
}

impl ScrollCadence {
    fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            count: 0,
        }
    }

    fn starts_window(self) -> bool {
        self.count % self.interval == 0
    }

    fn ends_window(self) -> bool {
        self.count % self.interval == self.interval - 1
    }

    fn advance(&mut self) {
        self.count = self.count.wrapping_add(1);
    }
}

fn scroll_left(canvas: &mut Raster) {
    let previous = canvas.clone();
    canvas.clear();
    canvas.copy_from(&previous, -1, 0);
    let (width, height) = dims(canvas);
    canvas.draw_line(width - 1, 0, width - 1, height - 1, b' ');
}

/// Peak history with a dB readout per channel.
#[derive(Debug)]
pub struct ScrollingPeak {
    cadence: ScrollCadence,
    left: i32,
    right: i32,
}

impl ScrollingPeak {
    pub fn new(interval: u32) -> Self {
        Self {
            cadence: ScrollCadence::new(interval),
            left: 0,
            right: 0,
        }
    }

    pub fn render(&mut self, samples: &[i16], canvas: &mut Raster) {
        if self.cadence.starts_window() {
            self.left = 0;
            self.right = 0;
        }
        let (left, right) = channel_peaks(samples);
        self.left = self.left.max(left);
        self.right = self.right.max(right);

        if self.cadence.ends_window() {
            scroll_left(canvas);
            let (width, height) = dims(canvas);
            let rows = [(height / 2 - 1, self.left, "[L peak]"), (height - 1, self.right, "[R peak]")];
            for (row, peak, label) in rows {
                canvas.draw_text(8, row, &db_label(peak_tenths(peak)));
                let top = row - (i64::from(height) * i64::from(peak) / 2 / 32768) as i32;
                canvas.draw_line(width - 1, row, width - 1, top, b'#');
                canvas.draw_text(0, row, label);
            }
        }
        self.cadence.advance();
    }
}

/// Power history with a dB readout per channel.
#[derive(Debug)]
pub struct ScrollingRms {
    cadence: ScrollCadence,
    left: i64,
    right: i64,
}

impl ScrollingRms {
    pub fn new(interval: u32) -> Self {
        Self {
            cadence: ScrollCadence::new(interval),
            left: 0,
            right: 0,
        }
    }

    pub fn render(&mut self, samples: &[i16], canvas: &mut Raster) {
        if self.cadence.starts_window() {
            self.left = 0;
            self.right = 0;
        }
        for frame in samples.chunks_exact(2) {
            let (l, r) = (i64::from(frame[0]), i64::from(frame[1]));
            self.left += l * l;
            self.right += r * r;
        }

        if self.cadence.ends_window() {
            scroll_left(canvas);
            let (width, height) = dims(canvas);
            let interval = self.cadence.interval;
            let rows = [(height / 2 - 1, self.left, "[L rms]"), (height - 1, self.right, "[R rms]")];
            for (row, sum, label) in rows {
                let tenths = rms_tenths(sum, interval);
                canvas.draw_text(7, row, &db_label(tenths));
                let bar = (tenths + RMS_BAR_OFFSET).clamp(0, RMS_BAR_RANGE);
                let top = row - height * bar / 2 / RMS_BAR_RANGE;
                canvas.draw_line(width - 1, row, width - 1, top, b'#');
                canvas.draw_text(0, row, label);
            }
        }
        self.cadence.advance();
    }
}

/// Half-octave bars, left channel on the left half of the raster.
#[derive(Debug)]
pub struct SpectrumBars {
    analyzer: SpectrumAnalyzer,
    ladder: BandLadder,
}

impl SpectrumBars {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            analyzer: SpectrumAnalyzer::new(sample_rate),
            ladder: BandLadder::half_octave(),
        }
    }

    pub fn render(&self, samples: &[i16], canvas: &mut Raster) {
        canvas.clear();
        let (width, height) = dims(canvas);
        let bottom = height - 1;
        let (left_x, right_x) = (1, width / 2 + 1);
        let span = width / 2 - 2;
        let bands = HALF_OCTAVE_BANDS as i32;

        for (i, band) in self.analyzer.analyze(samples, &self.ladder).iter().enumerate() {
            let i = i as i32;
            let left = bar_height(band.left, height as usize) as i32;
            let right = bar_height(band.right, height as usize) as i32;
            for column in span * i / bands..span * (i + 1) / bands {
                canvas.draw_line(left_x + column, bottom, left_x + column, bottom - left, b'#');
                canvas.draw_line(right_x + column, bottom, right_x + column, bottom - right, b'#');
            }
        }
        canvas.draw_text(left_x, bottom, "L [sqrt/log 63Hz-1kHz-16kHz]");
        canvas.draw_text(right_x, bottom, "R [sqrt/log 63Hz-1kHz-16kHz]");
    }
}

/// One two-column bar per semitone, drawn with the note name.
#[derive(Debug)]
pub struct MusicalSpectrum {
    analyzer: SpectrumAnalyzer,
    base_octave: u32,
}

impl MusicalSpectrum {
    pub fn new(sample_rate: u32, base_octave: u32) -> Self {
        Self {
            analyzer: SpectrumAnalyzer::new(sample_rate),
            base_octave: base_octave.clamp(MIN_SPECTRUM_OCTAVE, MAX_SPECTRUM_OCTAVE),
        }
    }

    pub const fn base_octave(&self) -> u32 {
        self.base_octave
    }

    pub fn set_base_octave(&mut self, octave: u32) {
        self.base_octave = octave.clamp(MIN_SPECTRUM_OCTAVE, MAX_SPECTRUM_OCTAVE);
    }

    /// Semitone ladder that fits a raster `width` cells wide.
    pub fn ladder(&self, width: usize) -> BandLadder {
        let notes = (width.saturating_sub(2) / 2).min(MAX_NOTE_BANDS);
        BandLadder::semitone(self.base_octave, self.analyzer.sample_rate(), notes)
    }

    pub fn render(&self, samples: &[i16], canvas: &mut Raster) {
        canvas.clear();
        let (_, height) = dims(canvas);
        let bottom = height - 1;
        let ladder = self.ladder(canvas.width());

        for (i, band) in self.analyzer.analyze(samples, &ladder).iter().enumerate() {
            let len = bar_height(band.left, height as usize) as i32;
            let name = NOTE_NAMES[i % NOTE_NAMES.len()].as_bytes();
            for (w, &ch) in name.iter().enumerate() {
                let x = 1 + i as i32 * NOTE_COLUMNS + w as i32;
                canvas.draw_line(x, bottom, x, bottom - len, ch);
            }
        }

        let notes = ladder.len();
        for octave in (0..).take_while(|j| j * 12 < notes) {
            let label = if octave == 0 {
                format!("C{}({}Hz)", self.base_octave, ladder.frequencies()[0])
            } else {
                format!("C{}", self.base_octave as usize + octave)
            };
            canvas.draw_text(1 + octave as i32 * 24, bottom, &label);
        }
    }
}

/// Renderer for the currently selected mode.
#[derive(Debug)]
pub enum Visualizer {
    Waveform(Waveform),
    CircleMeter(CircleMeter),
    ScrollingPeak(ScrollingPeak),
    ScrollingRms(ScrollingRms),
    SpectrumBars(SpectrumBars),
    MusicalSpectrum(MusicalSpectrum),
}

impl Visualizer {
    /// Fresh renderer for `mode`; scroll accumulators start empty.
    pub fn new(mode: VisualizationMode, config: &VizConfig, sample_rate: u32) -> Self {
        match mode {
            VisualizationMode::Waveform => Self::Waveform(Waveform),
            VisualizationMode::CircleMeter => Self::CircleMeter(CircleMeter::new(config.circle_aspect)),
            VisualizationMode::ScrollingPeak => {
                Self::ScrollingPeak(ScrollingPeak::new(config.scroll_interval))
            }
            VisualizationMode::ScrollingRms => {
                Self::ScrollingRms(ScrollingRms::new(config.scroll_interval))
            }
            VisualizationMode::SpectrumBars => Self::SpectrumBars(SpectrumBars::new(sample_rate)),
            VisualizationMode::MusicalSpectrum => Self::MusicalSpectrum(MusicalSpectrum::new(
                sample_rate,
                config.spectrum_base_octave,
            )),
        }
    }

    pub const fn mode(&self) -> VisualizationMode {
        match self {
            Self::Waveform(_) => VisualizationMode::Waveform,
            Self::CircleMeter(_) => VisualizationMode::CircleMeter,
            Self::ScrollingPeak(_) => VisualizationMode::ScrollingPeak,
            Self::ScrollingRms(_) => VisualizationMode::ScrollingRms,
            Self::SpectrumBars(_) => VisualizationMode::SpectrumBars,
            Self::MusicalSpectrum(_) => VisualizationMode::MusicalSpectrum,
        }
    }

    /// No-op unless this is the musical spectrum.
    pub fn set_base_octave(&mut self, octave: u32) {
        if let Self::MusicalSpectrum(m) = self {
            m.set_base_octave(octave);
        }
    }

    pub fn render(&mut self, samples: &[i16], canvas: &mut Raster) {
        match self {
            Self::Waveform(m) => m.render(samples, canvas),
            Self::CircleMeter(m) => m.render(samples, canvas),
            Self::ScrollingPeak(m) => m.render(samples, canvas),
            Self::ScrollingRms(m) => m.render(samples, canvas),
            Self::SpectrumBars(m) => m.render(samples, canvas),
            Self::MusicalSpectrum(m) => m.render(samples, canvas),
        }
    }
}
