//! Crossterm-based terminal backend.

use std::io::{self, Read, Write};
use std::sync::mpsc;
use std::time::Duration;

use crossterm::{
    event::{
        DisableBracketedPaste, DisableFocusChange, DisableMouseCapture, EnableBracketedPaste,
        EnableFocusChange, EnableMouseCapture,
    },
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};

use crate::error::Result;
use crate::geometry::Size;

use super::traits::Terminal;

/// Terminal backend using crossterm for real terminal I/O.
///
/// Raw input bytes are pumped from stdin on a reader thread and drained
/// by [`Terminal::poll_input`]; everything else runs on the caller's
/// thread. All acquired modes are released on drop, panics included.
pub struct CrosstermBackend {
    raw_mode: bool,
    alt_screen: bool,
    mouse: bool,
    focus: bool,
    paste: bool,
    input_rx: Option<mpsc::Receiver<Vec<u8>>>,
}

impl CrosstermBackend {
    /// Create a new crossterm backend.
    pub fn new() -> Self {
        Self {
            raw_mode: false,
            alt_screen: false,
            mouse: false,
            focus: false,
            paste: false,
            input_rx: None,
        }
    }

    /// Start the stdin reader thread on first use.
    fn ensure_input_pump(&mut self) {
        if self.input_rx.is_some() {
            return;
        }
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        std::thread::spawn(move || {
            let mut stdin = io::stdin();
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(_) => break,
                }
            }
        });
        self.input_rx = Some(rx);
    }
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for CrosstermBackend {
    fn size(&self) -> Result<Size> {
        let (w, h) = terminal::size()?;
        Ok(Size::new(w, h))
    }

    fn enter_raw_mode(&mut self) -> Result<()> {
        if !self.raw_mode {
            terminal::enable_raw_mode()?;
            self.raw_mode = true;
        }
        Ok(())
    }

    fn exit_raw_mode(&mut self) -> Result<()> {
        if self.raw_mode {
            terminal::disable_raw_mode()?;
            self.raw_mode = false;
        }
        Ok(())
    }

    fn enter_alt_screen(&mut self) -> Result<()> {
        if !self.alt_screen {
            execute!(io::stdout(), EnterAlternateScreen)?;
            self.alt_screen = true;
        }
        Ok(())
    }

    fn leave_alt_screen(&mut self) -> Result<()> {
        if self.alt_screen {
            execute!(io::stdout(), LeaveAlternateScreen)?;
            self.alt_screen = false;
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let n = io::stdout().write(data)?;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        io::stdout().flush()?;
        Ok(())
    }

    fn enable_mouse(&mut self) -> Result<()> {
        if !self.mouse {
            execute!(io::stdout(), EnableMouseCapture)?;
            self.mouse = true;
        }
        Ok(())
    }

    fn disable_mouse(&mut self) -> Result<()> {
        if self.mouse {
            execute!(io::stdout(), DisableMouseCapture)?;
            self.mouse = false;
        }
        Ok(())
    }

    fn enable_focus_reporting(&mut self) -> Result<()> {
        if !self.focus {
            execute!(io::stdout(), EnableFocusChange)?;
            self.focus = true;
        }
        Ok(())
    }

    fn disable_focus_reporting(&mut self) -> Result<()> {
        if self.focus {
            execute!(io::stdout(), DisableFocusChange)?;
            self.focus = false;
        }
        Ok(())
    }

    fn enable_bracketed_paste(&mut self) -> Result<()> {
        if !self.paste {
            execute!(io::stdout(), EnableBracketedPaste)?;
            self.paste = true;
        }
        Ok(())
    }

    fn disable_bracketed_paste(&mut self) -> Result<()> {
        if self.paste {
            execute!(io::stdout(), DisableBracketedPaste)?;
            self.paste = false;
        }
        Ok(())
    }

    fn poll_input(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        self.ensure_input_pump();
        let Some(rx) = &self.input_rx else {
            return Ok(Vec::new());
        };
        let mut bytes = match rx.recv_timeout(timeout) {
            Ok(chunk) => chunk,
            Err(_) => return Ok(Vec::new()),
        };
        // Drain whatever else is already queued without waiting again.
        while let Ok(chunk) = rx.try_recv() {
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        if self.mouse {
            let _ = execute!(io::stdout(), DisableMouseCapture);
        }
        if self.focus {
            let _ = execute!(io::stdout(), DisableFocusChange);
        }
        if self.paste {
            let _ = execute!(io::stdout(), DisableBracketedPaste);
        }
        if self.alt_screen {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
        if self.raw_mode {
            let _ = terminal::disable_raw_mode();
        }
    }
}
