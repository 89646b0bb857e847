//! Single-bin frequency correlation over a precomputed cosine table.
//!
//! Each band projects a Hann-windowed block onto a cosine and a
//! quarter-period-shifted cosine at the band frequency. The per-sample loop
//! runs in integer arithmetic; only the final magnitude uses floats.

use textreel_core::{DegenerateReason, Error, Result};
use tracing::trace;

/// Entries in the cosine table. Must be a power of two.
pub const COSINE_TABLE_LEN: usize = 2048;

const TABLE_MASK: i64 = COSINE_TABLE_LEN as i64 - 1;
const QUARTER_TABLE: i64 = COSINE_TABLE_LEN as i64 / 4;

/// Phase accumulator fraction bits.
const PHASE_SHIFT: u32 = 16;

/// Right shift applied to the accumulated correlation before normalization.
const SUM_SHIFT: u32 = 14;

/// Bar height divisor: `sqrt(max magnitude 65536) = 256`, shown at 1/4 scale.
const BAR_SCALE: f64 = 64.0;

/// Cycles of the band frequency covered by a bar-spectrum window.
pub const BAR_CYCLES: u32 = 10;

/// Cycles covered by a musical-spectrum window.
pub const NOTE_CYCLES: u32 = 24;

/// Number of bands in the half-octave ladder.
pub const HALF_OCTAVE_BANDS: usize = 17;

/// C in octave zero, in Hz.
const NOTE_C0_HZ: f64 = 32.703_195_66;

/// Twelfth root of two.
const SEMITONE_RATIO: f64 = 1.059_463_094_359_295;

#[allow(clippy::approx_constant)] // Ladder frequencies are truncated from this exact value
const HALF_OCTAVE_RATIO: f64 = 1.414_213_562_4;

#[allow(clippy::approx_constant)] // Table contents are derived from this exact value
const TABLE_PI: f64 = 3.141_592_6;

/// Note names, two cells wide, starting at C.
pub const NOTE_NAMES: [&str; 12] = [
    "C.", "C#", "D.", "D#", "E.", "F.", "F#", "G.", "G#", "A.", "A#", "B.",
];

/// `-cos` scaled to 16-bit fixed point.
#[derive(Debug, Clone)]
pub struct CosineTable {
    values: Vec<i64>,
}

impl CosineTable {
    pub fn new() -> Self {
        let values = (0..COSINE_TABLE_LEN)
            .map(|i| {
                let t = TABLE_PI * 2.0 * i as f64 / COSINE_TABLE_LEN as f64;
                (-t.cos() * 32768.0) as i64
            })
            .collect();
        Self { values }
    }

    /// Table value at `index`, wrapped to the table length.
    pub fn at(&self, index: i64) -> i64 {
        self.values[(index & TABLE_MASK) as usize]
    }
}

impl Default for CosineTable {
    fn default() -> Self {
        Self::new()
    }
}

/// How the two stereo channels feed the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMix {
    /// Left and right analysed separately.
    Stereo,
    /// `(left + right) / 2`, reported in both channels.
    Mono,
}

/// Ordered analysis frequencies plus the window rule that goes with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandLadder {
    frequencies: Vec<u32>,
    cycles: u32,
    mix: ChannelMix,
}

impl BandLadder {
    /// 17 bands, half an octave apart:
    /// 63, 88, 125, 176, 250, 353, 500, 707, 1000, 1414, 2000, 2828, 4000,
    /// 5656, 8000, 11313, 16000 Hz.
    pub fn half_octave() -> Self {
        let mut frequencies = Vec::with_capacity(HALF_OCTAVE_BANDS);
        let mut exact = 62.5_f64;
        let mut frequency = 63;
        for _ in 0..HALF_OCTAVE_BANDS {
            frequencies.push(frequency);
            exact *= HALF_OCTAVE_RATIO;
            frequency = exact as u32;
        }
        Self {
            frequencies,
            cycles: BAR_CYCLES,
            mix: ChannelMix::Stereo,
        }
    }

    /// Equal-tempered semitones from C of `base_octave`, stopping below
    /// Nyquist or after `max_bands` notes.
    pub fn semitone(base_octave: u32, sample_rate: u32, max_bands: usize) -> Self {
        let mut exact = NOTE_C0_HZ * 2f64.powi(base_octave as i32);
        let mut frequencies = Vec::with_capacity(max_bands);
        for _ in 0..max_bands {
            let frequency = exact as u32;
            if frequency >= sample_rate / 2 {
                break;
            }
            frequencies.push(frequency);
            exact *= SEMITONE_RATIO;
        }
        Self {
            frequencies,
            cycles: NOTE_CYCLES,
            mix: ChannelMix::Mono,
        }
    }

    pub fn frequencies(&self) -> &[u32] {
        &self.frequencies
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub const fn cycles(&self) -> u32 {
        self.cycles
    }

    pub const fn mix(&self) -> ChannelMix {
        self.mix
    }
}

/// Analysis result for one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandMagnitude {
    pub frequency: u32,
    /// Stereo frames the window covered; zero for skipped bands.
    pub window: usize,
    pub left: f64,
    pub right: f64,
}

impl BandMagnitude {
    const fn silent(frequency: u32) -> Self {
        Self {
            frequency,
            window: 0,
            left: 0.0,
            right: 0.0,
        }
    }
}

/// Square-root scaled bar height for a magnitude, clamped to `height`.
pub fn bar_height(magnitude: f64, height: usize) -> usize {
    let scaled = magnitude.trunc().sqrt() * height as f64 / BAR_SCALE;
    (scaled as usize).min(height)
}

#[derive(Debug, Clone, Copy, Default)]
struct Correlation {
    in_phase: i64,
    quadrature: i64,
}

impl Correlation {
    fn magnitude(self, window: usize) -> f64 {
        let window = window.max(1) as i64;
        let ip = (self.in_phase >> SUM_SHIFT) / window;
        let q = (self.quadrature >> SUM_SHIFT) / window;
        ((ip * ip + q * q) as f64).sqrt().trunc()
    }
}

/// Stateless band analyzer for one sample rate.
#[derive(Debug, Clone)]
pub struct SpectrumAnalyzer {
    table: CosineTable,
    sample_rate: u32,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            table: CosineTable::new(),
            sample_rate: sample_rate.max(1),
        }
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Window length in stereo frames for a band, or why the band is skipped.
    pub fn band_window(&self, frequency: u32, cycles: u32, frames: usize) -> Result<usize> {
        if frequency == 0 || u64::from(frequency) * 2 > u64::from(self.sample_rate) {
            return Err(Error::AnalysisDegenerate {
                frequency_hz: frequency,
                reason: DegenerateReason::AboveNyquist,
            });
        }
        let wanted = u64::from(self.sample_rate) * u64::from(cycles) / u64::from(frequency);
        let window = usize::try_from(wanted).unwrap_or(usize::MAX).min(frames);
        if window == 0 {
            return Err(Error::AnalysisDegenerate {
                frequency_hz: frequency,
                reason: DegenerateReason::EmptyWindow,
            });
        }
        Ok(window)
    }

    /// Per-band magnitudes of an interleaved stereo block.
    pub fn analyze(&self, samples: &[i16], ladder: &BandLadder) -> Vec<BandMagnitude> {
        let frames = samples.len() / 2;
        ladder
            .frequencies()
            .iter()
            .map(|&frequency| match self.band_window(frequency, ladder.cycles(), frames) {
                Ok(window) => self.analyze_band(samples, frequency, window, ladder.mix()),
                Err(e) => {
                    trace!("Skipping band: {e}");
                    BandMagnitude::silent(frequency)
                }
            })
            .collect()
    }

    fn analyze_band(
        &self,
        samples: &[i16],
        frequency: u32,
        window: usize,
        mix: ChannelMix,
    ) -> BandMagnitude {
        let step = i64::from(frequency) * COSINE_TABLE_LEN as i64 * (1 << PHASE_SHIFT)
            / i64::from(self.sample_rate);
        let window_len = window as i64;
        let mut phase = 0i64;
        let mut left = Correlation::default();
        let mut right = Correlation::default();

        for (n, frame) in samples.chunks_exact(2).take(window).enumerate() {
            let hann = self.table.at(COSINE_TABLE_LEN as i64 * n as i64 / window_len) + 32768;
            let index = phase >> PHASE_SHIFT;
            let cos = self.table.at(index);
            let shifted = self.table.at(QUARTER_TABLE + index);

            let (l, r) = (i64::from(frame[0]), i64::from(frame[1]));
            match mix {
                ChannelMix::Stereo => {
                    let l = (l * hann) >> 16;
                    let r = (r * hann) >> 16;
                    left.in_phase += l * cos;
                    left.quadrature += l * shifted;
                    right.in_phase += r * cos;
                    right.quadrature += r * shifted;
                }
                ChannelMix::Mono => {
                    let m = (((l + r) / 2) * hann) >> 16;
                    left.in_phase += m * cos;
                    left.quadrature += m * shifted;
                }
            }
            phase += step;
        }

        let left_mag = left.magnitude(window);
        let right_mag = match mix {
            ChannelMix::Stereo => right.magnitude(window),
            ChannelMix::Mono => left_mag,
        };
        BandMagnitude {
            frequency,
            window,
            left: left_mag,
            right: right_mag,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

    use super::*;

    #[test]
    fn test_cosine_table_shape() {
        let table = CosineTable::new();
        assert_eq!(table.at(0), -32768);
        assert_eq!(table.at(1024), 32767);
        assert!(table.at(512).abs() <= 1);
        assert_eq!(table.at(2048), table.at(0));
    }

    #[test]
    fn test_half_octave_ladder() {
        let ladder = BandLadder::half_octave();
        assert_eq!(
            ladder.frequencies(),
            &[
                63, 88, 125, 176, 250, 353, 500, 707, 1000, 1414, 2000, 2828, 4000, 5656, 8000,
                11313, 16000
            ]
        );
        assert_eq!(ladder.cycles(), BAR_CYCLES);
        assert_eq!(ladder.mix(), ChannelMix::Stereo);
    }

    #[test]
    fn test_semitone_ladder_stops_below_nyquist() {
        let ladder = BandLadder::semitone(3, 48_000, 128);
        assert_eq!(ladder.frequencies()[0], 261);
        assert_eq!(ladder.frequencies()[12], 523);
        assert!(ladder.frequencies().iter().all(|&f| f < 24_000));
        assert!(ladder.len() < 128);

        let narrow = BandLadder::semitone(1, 48_000, 10);
        assert_eq!(narrow.len(), 10);
        assert_eq!(narrow.frequencies()[0], 65);
    }

    #[test]
    fn test_band_window_rules() {
        let analyzer = SpectrumAnalyzer::new(48_000);
        assert_eq!(analyzer.band_window(1000, 10, 4096).unwrap(), 480);
        assert_eq!(analyzer.band_window(63, 10, 4096).unwrap(), 4096);
        assert!(matches!(
            analyzer.band_window(30_000, 10, 4096),
            Err(Error::AnalysisDegenerate {
                reason: DegenerateReason::AboveNyquist,
                ..
            })
        ));
        assert!(matches!(
            analyzer.band_window(1000, 10, 0),
            Err(Error::AnalysisDegenerate {
                reason: DegenerateReason::EmptyWindow,
                ..
            })
        ));
    }

    #[test]
    fn test_silence_has_zero_magnitude() {
        let analyzer = SpectrumAnalyzer::new(44_100);
        let bands = analyzer.analyze(&[0; 4096], &BandLadder::half_octave());
        assert_eq!(bands.len(), HALF_OCTAVE_BANDS);
        assert!(bands.iter().all(|b| b.left == 0.0 && b.right == 0.0));
    }

    #[test]
    fn test_supersonic_band_skipped() {
        let analyzer = SpectrumAnalyzer::new(22_050);
        let samples: Vec<i16> = (0..4096).map(|i| if i % 4 < 2 { 20_000 } else { -20_000 }).collect();
        let bands = analyzer.analyze(&samples, &BandLadder::half_octave());
        let top = bands.last().unwrap();
        assert_eq!(top.frequency, 16_000);
        assert_eq!(top.window, 0);
        assert_eq!(top.left, 0.0);
    }

    #[test]
    fn test_bar_height() {
        assert_eq!(bar_height(0.0, 20), 0);
        assert_eq!(bar_height(4096.0, 20), 20);
        assert_eq!(bar_height(1024.0, 20), 10);
        assert_eq!(bar_height(1e12, 20), 20);
    }
}
