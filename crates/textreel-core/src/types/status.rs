//! Status line exposed to the rendering collaborator.

use std::fmt;

/// Width of the level/progress meter in cells.
pub const METER_CELLS: usize = 32;

/// Maximum status line length in characters.
const MAX_STATUS_LEN: usize = 78;

/// Drift values are displayed clamped to this many milliseconds.
const MAX_DISPLAY_DRIFT_MS: i64 = 999;

/// Snapshot of playback state for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusLine {
    /// Current presentation time in microseconds.
    pub position_us: i64,
    /// Volume in percent.
    pub volume: u32,
    pub clipping: bool,
    /// Audio clock drift in microseconds (positive: audio late).
    pub audio_drift_us: i64,
    /// Video lateness in microseconds.
    pub video_drift_us: i64,
    pub frame_dropped: bool,
    /// Filled meter cells, at most [`METER_CELLS`].
    pub meter: usize,
    /// Character used for the filled part of the meter.
    pub meter_char: char,
}

impl StatusLine {
    /// Meter cells for a peak level in 0..=32767.
    pub const fn level_meter(level: i32) -> usize {
        let cells = level / 1024;
        if cells < 0 {
            0
        } else if cells as usize > METER_CELLS {
            METER_CELLS
        } else {
            cells as usize
        }
    }

    /// Meter cells for playback progress through an item.
    pub fn progress_meter(position_us: i64, start_us: i64, duration_us: i64) -> usize {
        let duration = duration_us.max(1_000_000);
        let cells = (position_us - start_us) * (METER_CELLS as i64 + 1) / duration;
        cells.clamp(0, METER_CELLS as i64) as usize
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.position_us / 1000;
        let sign = if millis >= 0 { ' ' } else { '-' };
        let millis = millis.unsigned_abs();
        let (secs, frac) = (millis / 1000, millis % 1000);
        let (hours, mins, secs) = (secs / 3600, (secs / 60) % 60, secs % 60);

        let ad = (self.audio_drift_us / 1000).clamp(-MAX_DISPLAY_DRIFT_MS, MAX_DISPLAY_DRIFT_MS);
        let vd = (self.video_drift_us / 1000).clamp(-MAX_DISPLAY_DRIFT_MS, MAX_DISPLAY_DRIFT_MS);

        let filled = self.meter.min(METER_CELLS);
        let meter: String = std::iter::repeat(self.meter_char)
            .take(filled)
            .chain(std::iter::repeat(' ').take(METER_CELLS - filled))
            .collect();

        let line = format!(
            "  {sign}{hours:02}:{mins:02}:{secs:02}.{frac:03}  V:{:>3}{} D:{ad:>4}/{vd:>3}ms{} [{meter}]  ",
            self.volume,
            if self.clipping { '@' } else { ' ' },
            if self.frame_dropped { '*' } else { ' ' },
        );
        let line: String = line.chars().take(MAX_STATUS_LEN).collect();
        f.write_str(&line)
    }
}
