//! In-memory terminal backend for testing.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{Result, TesseraError};
use crate::geometry::Size;

use super::traits::Terminal;

/// In-memory terminal backend for testing.
///
/// All output is captured in a buffer that can be inspected; input is
/// scripted with [`TestBackend::push_input`]. Short writes and a closed
/// sink can be simulated to exercise the presenter's failure paths.
pub struct TestBackend {
    size: Size,
    buffer: Vec<u8>,
    input: VecDeque<Vec<u8>>,
    raw_mode: bool,
    alt_screen: bool,
    mouse_enabled: bool,
    focus_enabled: bool,
    paste_enabled: bool,
    write_limit: Option<usize>,
    closed: bool,
    mouse_enables: u32,
    focus_enables: u32,
    paste_enables: u32,
}

impl TestBackend {
    /// Create a new test backend with the given size.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            size: Size::new(width, height),
            buffer: Vec::new(),
            input: VecDeque::new(),
            raw_mode: false,
            alt_screen: false,
            mouse_enabled: false,
            focus_enabled: false,
            paste_enabled: false,
            write_limit: None,
            closed: false,
            mouse_enables: 0,
            focus_enables: 0,
            paste_enables: 0,
        }
    }

    /// Get the bytes written to this backend.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// The written bytes, lossily decoded.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer).to_string()
    }

    /// Clear the output buffer.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Queue input bytes for the next [`Terminal::poll_input`].
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.push_back(bytes.to_vec());
    }

    /// Check if raw mode is active.
    pub fn is_raw_mode(&self) -> bool {
        self.raw_mode
    }

    /// Check if the alternate screen is active.
    pub fn is_alt_screen(&self) -> bool {
        self.alt_screen
    }

    /// Check if mouse capture is active.
    pub fn is_mouse_enabled(&self) -> bool {
        self.mouse_enabled
    }

    /// Check if focus reporting is active.
    pub fn is_focus_enabled(&self) -> bool {
        self.focus_enabled
    }

    /// Check if bracketed paste is active.
    pub fn is_paste_enabled(&self) -> bool {
        self.paste_enabled
    }

    /// Set the terminal size (simulates a resize).
    pub fn set_size(&mut self, width: u16, height: u16) {
        self.size = Size::new(width, height);
    }

    /// How many times each reporting mode was enabled, in the order
    /// (mouse, focus, bracketed paste).
    pub fn enable_counts(&self) -> (u32, u32, u32) {
        (self.mouse_enables, self.focus_enables, self.paste_enables)
    }

    /// Cap each write to at most `limit` bytes (simulates short writes).
    pub fn set_write_limit(&mut self, limit: Option<usize>) {
        self.write_limit = limit;
    }

    /// Simulate the sink closing; subsequent writes fail.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Terminal for TestBackend {
    fn size(&self) -> Result<Size> {
        Ok(self.size)
    }

    fn enter_raw_mode(&mut self) -> Result<()> {
        self.raw_mode = true;
        Ok(())
    }

    fn exit_raw_mode(&mut self) -> Result<()> {
        self.raw_mode = false;
        Ok(())
    }

    fn enter_alt_screen(&mut self) -> Result<()> {
        self.alt_screen = true;
        Ok(())
    }

    fn leave_alt_screen(&mut self) -> Result<()> {
        self.alt_screen = false;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(TesseraError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "sink closed",
            )));
        }
        let n = match self.write_limit {
            Some(limit) => data.len().min(limit),
            None => data.len(),
        };
        self.buffer.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn enable_mouse(&mut self) -> Result<()> {
        self.mouse_enabled = true;
        self.mouse_enables += 1;
        Ok(())
    }

    fn disable_mouse(&mut self) -> Result<()> {
        self.mouse_enabled = false;
        Ok(())
    }

    fn enable_focus_reporting(&mut self) -> Result<()> {
        self.focus_enabled = true;
        self.focus_enables += 1;
        Ok(())
    }

    fn disable_focus_reporting(&mut self) -> Result<()> {
        self.focus_enabled = false;
        Ok(())
    }

    fn enable_bracketed_paste(&mut self) -> Result<()> {
        self.paste_enabled = true;
        self.paste_enables += 1;
        Ok(())
    }

    fn disable_bracketed_paste(&mut self) -> Result<()> {
        self.paste_enabled = false;
        Ok(())
    }

    fn poll_input(&mut self, _timeout: Duration) -> Result<Vec<u8>> {
        Ok(self.input.pop_front().unwrap_or_default())
    }
}
