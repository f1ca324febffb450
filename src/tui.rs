use std::io::{self, stdout, Stdout};
use std::ops::{Deref, DerefMut};

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

/// Owns the raw-mode terminal; dropping it restores the user's screen even
/// when the app unwinds out of the event loop.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

pub fn init() -> io::Result<Tui> {
    execute!(stdout(), EnterAlternateScreen)?;
    enable_raw_mode()?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(Tui { terminal })
}

impl Deref for Tui {
    type Target = Terminal<CrosstermBackend<Stdout>>;

    fn deref(&self) -> &Self::Target {
        &self.terminal
    }
}

impl DerefMut for Tui {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.terminal
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = restore();
    }
}

// Safe to call multiple times, including from a panic path where the
// terminal may already be in a bad state.
pub fn restore() -> io::Result<()> {
    let _ = execute!(stdout(), LeaveAlternateScreen);
    let _ = disable_raw_mode();
    Ok(())
}
