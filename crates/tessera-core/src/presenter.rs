//! Frame presenter — double-buffered diff to ANSI output.
//!
//! Owns the front (last written) and back (being composed) cell buffers.
//! Each frame the composited back buffer is diffed against the front,
//! changed cells are coalesced into same-row runs, and the runs are
//! emitted with a minimal style transition per cell: colors only when
//! they change, attribute deltas with their reset counterparts, OSC 8
//! hyperlink open/close only when the capability is present. Buffers are
//! swapped, never reallocated, except on terminal resize.

use std::time::Duration;

use crate::ansi;
use crate::attr::Attributes;
use crate::buffer::{CellBuffer, CellChange};
use crate::capabilities::Capabilities;
use crate::cell::NO_LINK;
use crate::color::Rgba;
use crate::error::{Result, TesseraError};
use crate::geometry::{Position, Size};
use crate::input::CapabilityReply;
use crate::terminal::Terminal;

/// Write retry bound before the presenter gives up and stops.
const WRITE_RETRIES: u32 = 3;

/// Which terminal modes the embedding application requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeOptions {
    /// Use the alternate screen.
    pub alt_screen: bool,
    /// Capture mouse input.
    pub mouse: bool,
    /// Report focus changes.
    pub focus: bool,
    /// Use bracketed paste.
    pub bracketed_paste: bool,
}

impl Default for ModeOptions {
    fn default() -> Self {
        Self {
            alt_screen: true,
            mouse: true,
            focus: true,
            bracketed_paste: true,
        }
    }
}

/// Shadow of the terminal's current SGR and link state.
#[derive(Clone, Debug, Default)]
struct StyleShadow {
    fg: Option<Rgba>,
    bg: Option<Rgba>,
    attrs: Option<Attributes>,
    link: Option<String>,
}

/// A run of adjacent changed cells on one row.
#[derive(Debug)]
struct Run {
    x: u16,
    y: u16,
    cells: Vec<CellChange>,
}

/// The frame presenter.
pub struct Presenter {
    front: CellBuffer,
    back: CellBuffer,
    caps: Capabilities,
    stopped: bool,
    force_full: bool,
    last_cursor: Option<Position>,
}

impl Presenter {
    /// Create a presenter with both buffers at the given size.
    pub fn new(size: Size, caps: Capabilities) -> Self {
        Self {
            front: CellBuffer::new(size),
            back: CellBuffer::new(size),
            caps,
            stopped: false,
            force_full: false,
            last_cursor: None,
        }
    }

    /// The buffer the scene graph composites into this frame.
    pub fn back_mut(&mut self) -> &mut CellBuffer {
        &mut self.back
    }

    /// The last presented frame.
    pub fn front(&self) -> &CellBuffer {
        &self.front
    }

    /// The capability table steering emission.
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Whether the presenter has entered the stopped state.
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Poll the sink's size, resizing both buffers on change. Returns the
    /// current size so the caller can lay out against it.
    pub fn prepare(&mut self, term: &mut dyn Terminal) -> Result<Size> {
        let size = term.size()?;
        if size != self.back.size() {
            self.back.resize(size);
            self.front.resize(size);
            self.force_full = true;
        }
        Ok(size)
    }

    /// Write the startup capability queries.
    pub fn handshake(&mut self, term: &mut dyn Terminal) -> Result<()> {
        self.write_all(term, crate::capabilities::HANDSHAKE_QUERIES)?;
        term.flush()
    }

    /// Merge a handshake response into the capability table.
    pub fn apply_capability(&mut self, reply: &CapabilityReply) {
        self.caps.apply_reply(reply);
    }

    /// Acquire the requested terminal modes.
    pub fn acquire_modes(&mut self, term: &mut dyn Terminal, modes: ModeOptions) -> Result<()> {
        term.enter_raw_mode()?;
        if modes.alt_screen {
            term.enter_alt_screen()?;
        }
        self.reassert_modes(term, modes)
    }

    /// (Re-)enable the reporting modes. Called at startup and again on
    /// focus-in, in case the terminal dropped them while unfocused.
    pub fn reassert_modes(&mut self, term: &mut dyn Terminal, modes: ModeOptions) -> Result<()> {
        if modes.mouse {
            term.enable_mouse()?;
        }
        if modes.focus && self.caps.focus_events {
            term.enable_focus_reporting()?;
        }
        if modes.bracketed_paste && self.caps.bracketed_paste {
            term.enable_bracketed_paste()?;
        }
        Ok(())
    }

    /// Release every acquired mode and restore the main screen.
    pub fn release_modes(&mut self, term: &mut dyn Terminal, modes: ModeOptions) -> Result<()> {
        let _ = term.disable_mouse();
        let _ = term.disable_focus_reporting();
        let _ = term.disable_bracketed_paste();
        if modes.alt_screen {
            let _ = term.leave_alt_screen();
        }
        let _ = self.write_all(term, ansi::CURSOR_SHOW.as_bytes());
        let _ = term.flush();
        term.exit_raw_mode()
    }

    /// Diff the back buffer against the front and write the delta.
    ///
    /// A no-op once the presenter is stopped. On success the buffers are
    /// swapped so the freshly written frame becomes the front.
    pub fn present(&mut self, term: &mut dyn Terminal, cursor: Option<Position>) -> Result<()> {
        if self.stopped {
            return Ok(());
        }

        let changes = if self.force_full {
            let empty = CellBuffer::new(Size::new(0, 0));
            self.back.diff(&empty)
        } else {
            self.back.diff(&self.front)
        };

        if changes.is_empty() && cursor == self.last_cursor {
            return Ok(());
        }

        let runs = coalesce_runs(&changes);
        let mut out = String::with_capacity(changes.len() * 16 + 64);

        out.push_str(ansi::CURSOR_HIDE);
        if self.caps.synchronized_output {
            out.push_str(ansi::SYNC_START);
        }

        let mut shadow = StyleShadow::default();
        for run in &runs {
            ansi::cursor_position(&mut out, run.x, run.y);
            for change in &run.cells {
                self.emit_cell(&mut out, &mut shadow, change);
            }
        }

        // Leave the terminal in a neutral state.
        if shadow.link.is_some() {
            out.push_str(ansi::LINK_CLOSE);
        }
        out.push_str(ansi::SGR_RESET);

        match cursor {
            Some(pos) => {
                ansi::cursor_position(&mut out, pos.x, pos.y);
                out.push_str(ansi::CURSOR_SHOW);
            }
            None => {
                ansi::cursor_position(&mut out, 0, 0);
            }
        }
        if self.caps.synchronized_output {
            out.push_str(ansi::SYNC_END);
        }

        self.write_all(term, out.as_bytes())?;
        term.flush()?;

        std::mem::swap(&mut self.front, &mut self.back);
        self.force_full = false;
        self.last_cursor = cursor;
        tracing::trace!(cells = changes.len(), runs = runs.len(), "frame presented");
        Ok(())
    }

    /// Emit one cell: style transition plus glyph.
    fn emit_cell(&self, out: &mut String, shadow: &mut StyleShadow, change: &CellChange) {
        let cell = change.cell;
        if cell.is_continuation() {
            return; // the wide glyph to the left covered this column
        }

        if shadow.fg != Some(cell.fg) {
            ansi::fg_color(out, cell.fg, self.caps.color);
            shadow.fg = Some(cell.fg);
        }
        if shadow.bg != Some(cell.bg) {
            ansi::bg_color(out, cell.bg, self.caps.color);
            shadow.bg = Some(cell.bg);
        }
        match shadow.attrs {
            Some(prev) if prev == cell.attrs => {}
            Some(prev) => {
                ansi::attr_delta(out, prev, cell.attrs);
                shadow.attrs = Some(cell.attrs);
            }
            None => {
                ansi::attr_delta(out, Attributes::empty(), cell.attrs);
                shadow.attrs = Some(cell.attrs);
            }
        }

        if self.caps.hyperlinks {
            let url = if cell.link == NO_LINK {
                None
            } else {
                self.back.link_table().url(cell.link).map(str::to_string)
            };
            if shadow.link != url {
                if shadow.link.is_some() {
                    out.push_str(ansi::LINK_CLOSE);
                }
                if let Some(u) = &url {
                    ansi::link_open(out, u);
                }
                shadow.link = url;
            }
        }

        out.push(cell.ch);
    }

    /// Write with bounded retries; entering the stopped state on failure.
    fn write_all(&mut self, term: &mut dyn Terminal, mut data: &[u8]) -> Result<()> {
        let mut attempts = 0;
        while !data.is_empty() {
            match term.write(data) {
                Ok(0) => {
                    attempts += 1;
                }
                Ok(n) => {
                    data = &data[n.min(data.len())..];
                }
                Err(e) => {
                    attempts += 1;
                    if attempts > WRITE_RETRIES {
                        self.stopped = true;
                        tracing::warn!("output sink failed; presenter stopped: {e}");
                        return Err(e);
                    }
                }
            }
            if attempts > WRITE_RETRIES {
                self.stopped = true;
                tracing::warn!("output sink stalled; presenter stopped");
                return Err(TesseraError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "terminal write stalled",
                )));
            }
        }
        Ok(())
    }
}

/// Group changed cells into runs of visually adjacent same-row cells.
///
/// Wide glyphs advance the expected column by two, so a wide cell and
/// its neighbor stay in one run and need no extra cursor move.
fn coalesce_runs(changes: &[CellChange]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for change in changes {
        if change.cell.is_continuation() {
            // Covered by the wide glyph to its left; the run's width
            // accounting already spans this column.
            continue;
        }
        let extend = runs.last().is_some_and(|run| {
            let width: u16 = run.cells.iter().map(|c| u16::from(c.cell.width())).sum();
            run.y == change.y && run.x + width == change.x
        });
        if extend {
            if let Some(run) = runs.last_mut() {
                run.cells.push(*change);
            }
        } else {
            runs.push(Run {
                x: change.x,
                y: change.y,
                cells: vec![*change],
            });
        }
    }
    runs
}

/// Poll interval the runtime uses when draining input between frames.
pub const INPUT_POLL: Duration = Duration::from_millis(1);
