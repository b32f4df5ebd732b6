//! Terminal trait — the output sink and mode controller.

use std::time::Duration;

use crate::error::Result;
use crate::geometry::Size;

/// Abstraction over terminal backends.
///
/// The presenter is the only writer; the input parser is the only
/// consumer of [`Terminal::poll_input`]. Mode setters must be idempotent
/// and implementations must restore every acquired mode on drop, so the
/// terminal is never left raw after a panic.
pub trait Terminal: Send {
    /// Get the current terminal size.
    fn size(&self) -> Result<Size>;

    /// Enter raw mode (disable line buffering, echo, etc.).
    fn enter_raw_mode(&mut self) -> Result<()>;

    /// Exit raw mode (restore normal terminal state).
    fn exit_raw_mode(&mut self) -> Result<()>;

    /// Switch to the alternate screen.
    fn enter_alt_screen(&mut self) -> Result<()>;

    /// Return to the main screen.
    fn leave_alt_screen(&mut self) -> Result<()>;

    /// Write bytes to the terminal, returning how many were accepted.
    /// May perform a short write.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush buffered output to the terminal.
    fn flush(&mut self) -> Result<()>;

    /// Enable mouse reporting (click, drag, motion, SGR encoding).
    fn enable_mouse(&mut self) -> Result<()>;

    /// Disable mouse reporting.
    fn disable_mouse(&mut self) -> Result<()>;

    /// Enable focus in/out reporting.
    fn enable_focus_reporting(&mut self) -> Result<()>;

    /// Disable focus in/out reporting.
    fn disable_focus_reporting(&mut self) -> Result<()>;

    /// Enable bracketed paste.
    fn enable_bracketed_paste(&mut self) -> Result<()>;

    /// Disable bracketed paste.
    fn disable_bracketed_paste(&mut self) -> Result<()>;

    /// Collect any input bytes that arrived, waiting up to `timeout`.
    /// Returns an empty vector when nothing arrived.
    fn poll_input(&mut self, timeout: Duration) -> Result<Vec<u8>>;
}
