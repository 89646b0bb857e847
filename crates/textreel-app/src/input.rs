//! Keyboard input read from the terminal in raw mode.

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use textreel_pipeline::{PipelineContext, SessionHandle, MAX_VOLUME};
use textreel_viz::VisualizationControl;
use tracing::info;

const SHORT_SEEK_US: i64 = 10_000_000;
const LONG_SEEK_US: i64 = 60_000_000;
const VOLUME_STEP: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    TogglePause,
    Seek(i64),
    VolumeUp,
    VolumeDown,
    NextMode,
    PreviousMode,
    OctaveUp,
    OctaveDown,
    Stop,
    Quit,
}

impl Key {
    pub const fn from_char(c: char) -> Option<Self> {
        Some(match c {
            ' ' | 'p' => Self::TogglePause,
            'l' => Self::Seek(SHORT_SEEK_US),
            'h' => Self::Seek(-SHORT_SEEK_US),
            'L' => Self::Seek(LONG_SEEK_US),
            'H' => Self::Seek(-LONG_SEEK_US),
            '+' | '=' => Self::VolumeUp,
            '-' => Self::VolumeDown,
            'v' => Self::NextMode,
            'V' => Self::PreviousMode,
            'o' => Self::OctaveUp,
            'O' => Self::OctaveDown,
            's' => Self::Stop,
            'q' => Self::Quit,
            _ => return None,
        })
    }

    pub fn from_event(event: &KeyEvent) -> Option<Self> {
        if event.kind != KeyEventKind::Press {
            return None;
        }
        match event.code {
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Self::Quit)
            }
            KeyCode::Char(c) => Self::from_char(c),
            KeyCode::Right => Some(Self::Seek(SHORT_SEEK_US)),
            KeyCode::Left => Some(Self::Seek(-SHORT_SEEK_US)),
            KeyCode::Up => Some(Self::Seek(LONG_SEEK_US)),
            KeyCode::Down => Some(Self::Seek(-LONG_SEEK_US)),
            KeyCode::Esc => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Wait up to `timeout` for the next mapped key press.
pub fn poll_key(timeout: Duration) -> Result<Option<Key>> {
    if !event::poll(timeout)? {
        return Ok(None);
    }
    Ok(match event::read()? {
        Event::Key(key) => Key::from_event(&key),
        _ => None,
    })
}

/// Act on one key press.
pub fn apply(
    key: Key,
    ctx: &PipelineContext,
    session: &SessionHandle,
    viz: &VisualizationControl,
) -> Result<()> {
    match key {
        Key::TogglePause => session.toggle_pause()?,
        Key::Seek(delta) => session.seek(delta)?,
        Key::VolumeUp => {
            session.set_volume((ctx.volume() + VOLUME_STEP).min(MAX_VOLUME))?;
        }
        Key::VolumeDown => session.set_volume(ctx.volume().saturating_sub(VOLUME_STEP))?,
        Key::NextMode => info!("Visualization: {}", viz.next_mode()),
        Key::PreviousMode => info!("Visualization: {}", viz.previous_mode()),
        Key::OctaveUp => info!("Spectrum base octave: {}", viz.next_base_octave()),
        Key::OctaveDown => info!("Spectrum base octave: {}", viz.previous_base_octave()),
        Key::Stop => session.stop()?,
        Key::Quit => session.quit()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(Key::from_char('p'), Some(Key::TogglePause));
        assert_eq!(Key::from_char('H'), Some(Key::Seek(-LONG_SEEK_US)));
        assert_eq!(Key::from_char('v'), Some(Key::NextMode));
        assert_eq!(Key::from_char('x'), None);
    }

    #[test]
    fn test_key_events() {
        let press = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(Key::from_event(&press(KeyCode::Char('q'))), Some(Key::Quit));
        assert_eq!(Key::from_event(&press(KeyCode::Left)), Some(Key::Seek(-SHORT_SEEK_US)));
        assert_eq!(Key::from_event(&press(KeyCode::Up)), Some(Key::Seek(LONG_SEEK_US)));
        assert_eq!(Key::from_event(&press(KeyCode::Tab)), None);

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(Key::from_event(&ctrl_c), Some(Key::Quit));

        let mut release = press(KeyCode::Char('p'));
        release.kind = KeyEventKind::Release;
        assert_eq!(Key::from_event(&release), None);
    }
}
