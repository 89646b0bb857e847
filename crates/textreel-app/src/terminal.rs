//! Terminal setup and screen output through crossterm.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::Print,
    terminal::{
        self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use textreel_core::{Error, Raster, Result, StatusLine};
use textreel_pipeline::Renderer;
use tracing::warn;

/// Raw mode plus the alternate screen, restored on drop.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(e);
        }

        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            restore_terminal();
            original_hook(panic_info);
        }));
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

/// Safe to call more than once.
fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
}

/// Draws each composed screen at the top left, clipped to the terminal.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    /// Fixed screen size; `None` asks the terminal on every frame.
    size: Option<(u16, u16)>,
    cleared: bool,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: io::stdout(),
            size: None,
            cleared: false,
        }
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub const fn with_size(out: W, cols: u16, rows: u16) -> Self {
        Self {
            out,
            size: Some((cols, rows)),
            cleared: false,
        }
    }

    fn screen_size(&self) -> (u16, u16) {
        self.size.unwrap_or_else(|| {
            terminal::size().unwrap_or_else(|e| {
                warn!("Terminal size unavailable: {e}");
                (80, 25)
            })
        })
    }

    fn write_screen(&mut self, raster: &Raster, status: &StatusLine) -> io::Result<()> {
        let (cols, rows) = self.screen_size();
        let cols = usize::from(cols);
        if !self.cleared {
            queue!(self.out, Clear(ClearType::All))?;
            self.cleared = true;
        }

        // The last terminal row is kept for the status line.
        let picture_rows = raster.height().min(usize::from(rows.saturating_sub(1)));
        for y in 0..picture_rows {
            let row: String = raster
                .row_string(y)
                .unwrap_or_default()
                .chars()
                .take(cols)
                .collect();
            queue!(self.out, MoveTo(0, y as u16), Print(row))?;
        }
        if rows > 0 {
            let line: String = status.to_string().chars().take(cols).collect();
            queue!(
                self.out,
                MoveTo(0, picture_rows as u16),
                Print(line),
                Clear(ClearType::UntilNewLine)
            )?;
        }
        self.out.flush()
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn show(&mut self, raster: &Raster, status: &StatusLine) -> Result<()> {
        self.write_screen(raster, status)
            .map_err(|e| Error::Collaborator(format!("Terminal write failed: {e}")))
    }
}
