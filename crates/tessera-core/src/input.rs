//! Input demultiplexer — a byte-at-a-time parser for the terminal's
//! input stream.
//!
//! Separates keyboard input, SGR and X10 mouse reports, focus events,
//! bracketed paste, and capability responses (DA / DCS / OSC) into typed
//! events. Trailing incomplete sequences are buffered for the next
//! [`InputParser::feed`]; malformed sequences are dropped one byte at a
//! time, so the parser always makes progress.

/// Keyboard modifier flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u8);

impl Modifiers {
    /// No modifiers.
    pub const NONE: Self = Self(0);
    /// Shift modifier.
    pub const SHIFT: Self = Self(1);
    /// Alt/Option modifier.
    pub const ALT: Self = Self(2);
    /// Ctrl modifier.
    pub const CTRL: Self = Self(4);

    /// Check if this modifier set contains the given modifier.
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0 && other.0 != 0
    }

    /// Combine two modifier sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Decode an xterm modifier parameter (`1` = none, `2` = shift, ...).
    fn from_xterm_param(param: u16) -> Self {
        let bits = param.saturating_sub(1) as u8;
        let mut m = Self::NONE;
        if bits & 1 != 0 {
            m = m.union(Self::SHIFT);
        }
        if bits & 2 != 0 {
            m = m.union(Self::ALT);
        }
        if bits & 4 != 0 {
            m = m.union(Self::CTRL);
        }
        m
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A key code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum KeyCode {
    /// A character key.
    Char(char),
    /// Enter / Return.
    Enter,
    /// Tab.
    Tab,
    /// Backspace.
    Backspace,
    /// Delete.
    Delete,
    /// Escape.
    Escape,
    /// Arrow up.
    Up,
    /// Arrow down.
    Down,
    /// Arrow left.
    Left,
    /// Arrow right.
    Right,
    /// Home.
    Home,
    /// End.
    End,
    /// Page up.
    PageUp,
    /// Page down.
    PageDown,
    /// Insert.
    Insert,
    /// Function key (F1-F12).
    F(u8),
}

/// A keyboard event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key code.
    pub code: KeyCode,
    /// Active modifiers.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// Create a plain key event with no modifiers.
    pub fn plain(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
        }
    }
}

/// A mouse button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseButton {
    /// Left / primary.
    #[default]
    Left,
    /// Middle / wheel.
    Middle,
    /// Right / secondary.
    Right,
}

/// The kind of mouse event produced by the parser.
///
/// Hover and drop derivations happen in the event bus, which knows the
/// scene geometry; the parser reports the raw protocol kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseEventKind {
    /// Button pressed.
    Down,
    /// Button released.
    Up,
    /// Motion with no button held.
    Move,
    /// Motion with a button held.
    Drag,
    /// Wheel scrolled up.
    ScrollUp,
    /// Wheel scrolled down.
    ScrollDown,
}

/// A mouse event. Coordinates are 0-based cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MouseEvent {
    /// What happened.
    pub kind: MouseEventKind,
    /// The button involved (for scroll events, the reported button bits).
    pub button: MouseButton,
    /// Column, 0-based.
    pub x: u16,
    /// Row, 0-based.
    pub y: u16,
    /// Active modifiers.
    pub modifiers: Modifiers,
}

/// A terminal capability response captured during the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CapabilityReply {
    /// Primary/secondary device attributes (`CSI ... c`), raw parameters.
    DeviceAttributes(String),
    /// Kitty keyboard protocol flags (`CSI ? flags u`).
    KittyFlags(u16),
    /// A DECRQM mode report (`CSI ? mode ; value $ y`), raw parameters.
    ModeReport(String),
    /// An OSC response, terminator stripped.
    Osc(String),
    /// A DCS response, terminator stripped.
    Dcs(String),
}

/// A typed input event.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum InputEvent {
    /// A key was pressed.
    Key(KeyEvent),
    /// A mouse event occurred.
    Mouse(MouseEvent),
    /// The terminal window gained focus.
    FocusGained,
    /// The terminal window lost focus.
    FocusLost,
    /// Text pasted under bracketed paste mode.
    Paste(String),
    /// A capability response addressed to the handshake.
    Capability(CapabilityReply),
}

/// Result of a single parse attempt.
enum Step {
    /// Consumed `n` bytes producing an optional event.
    Done(usize, Option<InputEvent>),
    /// The buffer holds an incomplete prefix; wait for more bytes.
    NeedMore,
}

/// Longest sequence the parser will buffer before giving up on it.
const MAX_SEQUENCE: usize = 4096;

const ESC: u8 = 0x1B;

/// Streaming input parser.
#[derive(Debug, Default)]
pub struct InputParser {
    pending: Vec<u8>,
    /// Bitmask of currently pressed buttons (bit 0 left, 1 middle, 2 right).
    pressed: u8,
}

impl InputParser {
    /// Create a parser with no buffered input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buttons currently held, as a bitmask (bit 0 = left).
    pub fn pressed_buttons(&self) -> u8 {
        self.pressed
    }

    /// Consume bytes, producing the events completed by them.
    ///
    /// Incomplete trailing sequences stay buffered. Invalid input drops a
    /// single byte and continues, so `feed` always terminates and always
    /// advances past unparsable data.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<InputEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();

        loop {
            if self.pending.is_empty() {
                break;
            }
            match self.step() {
                Step::Done(n, event) => {
                    debug_assert!(n > 0, "parser must consume at least one byte");
                    self.pending.drain(..n.max(1));
                    if let Some(e) = event {
                        events.push(e);
                    }
                }
                Step::NeedMore => {
                    if self.pending.len() > MAX_SEQUENCE {
                        // Runaway sequence: drop the lead byte and retry.
                        self.pending.remove(0);
                        continue;
                    }
                    break;
                }
            }
        }
        events
    }

    fn step(&mut self) -> Step {
        let buf = &self.pending;
        if buf[0] != ESC {
            return self.parse_plain();
        }
        if buf.len() < 2 {
            return Step::NeedMore;
        }
        match buf[1] {
            b'[' => self.parse_csi(),
            b'O' => self.parse_ss3(),
            b']' => self.parse_osc(),
            b'P' => self.parse_dcs(),
            ESC => Step::Done(1, Some(InputEvent::Key(KeyEvent::plain(KeyCode::Escape)))),
            c if (0x20..0x7F).contains(&c) => {
                // ESC + printable = Alt-modified key.
                Step::Done(
                    2,
                    Some(InputEvent::Key(KeyEvent {
                        code: KeyCode::Char(c as char),
                        modifiers: Modifiers::ALT,
                    })),
                )
            }
            _ => Step::Done(1, Some(InputEvent::Key(KeyEvent::plain(KeyCode::Escape)))),
        }
    }

    /// A byte sequence not starting with ESC: control keys or UTF-8 text.
    fn parse_plain(&self) -> Step {
        let buf = &self.pending;
        let b = buf[0];
        let key = |code| Step::Done(1, Some(InputEvent::Key(KeyEvent::plain(code))));
        match b {
            b'\r' | b'\n' => key(KeyCode::Enter),
            b'\t' => key(KeyCode::Tab),
            0x7F | 0x08 => key(KeyCode::Backspace),
            0x00 => Step::Done(1, None),
            0x01..=0x1A => {
                // Ctrl-A .. Ctrl-Z.
                let ch = (b'a' + b - 1) as char;
                Step::Done(
                    1,
                    Some(InputEvent::Key(KeyEvent {
                        code: KeyCode::Char(ch),
                        modifiers: Modifiers::CTRL,
                    })),
                )
            }
            0x1C..=0x1F => Step::Done(1, None),
            _ => {
                // UTF-8 character, possibly multi-byte.
                let len = utf8_len(b);
                if buf.len() < len {
                    return Step::NeedMore;
                }
                match std::str::from_utf8(&buf[..len]) {
                    Ok(s) => match s.chars().next() {
                        Some(ch) => Step::Done(
                            len,
                            Some(InputEvent::Key(KeyEvent::plain(KeyCode::Char(ch)))),
                        ),
                        None => Step::Done(1, None),
                    },
                    Err(_) => Step::Done(1, None), // invalid byte dropped
                }
            }
        }
    }

    fn parse_csi(&mut self) -> Step {
        let buf = &self.pending;
        // buf[0] = ESC, buf[1] = '['.
        if buf.len() < 3 {
            return Step::NeedMore;
        }

        match buf[2] {
            b'I' => return Step::Done(3, Some(InputEvent::FocusGained)),
            b'O' => return Step::Done(3, Some(InputEvent::FocusLost)),
            b'M' => return self.parse_x10(),
            b'<' => return self.parse_sgr_mouse(),
            _ => {}
        }

        // Generic CSI: parameters then a final byte in 0x40..=0x7E.
        let mut i = 2;
        while i < buf.len() {
            let b = buf[i];
            if (0x40..=0x7E).contains(&b) {
                return self.finish_csi(i);
            }
            let constituent = b.is_ascii_digit()
                || matches!(b, b';' | b'?' | b'>' | b'=' | b':')
                || (0x20..=0x2F).contains(&b); // intermediates, e.g. '$'
            if !constituent {
                // Not a CSI constituent: drop the ESC and resync.
                return Step::Done(1, None);
            }
            i += 1;
        }
        Step::NeedMore
    }

    /// A complete generic CSI with final byte at `final_idx`.
    fn finish_csi(&self, final_idx: usize) -> Step {
        let buf = &self.pending;
        let total = final_idx + 1;
        let final_byte = buf[final_idx];
        let body = String::from_utf8_lossy(&buf[2..final_idx]).to_string();
        let params: Vec<u16> = body
            .trim_start_matches(['?', '>', '='])
            .split(';')
            .filter_map(|p| p.parse().ok())
            .collect();
        let modifiers = params
            .get(1)
            .copied()
            .map_or(Modifiers::NONE, Modifiers::from_xterm_param);

        let key = |code| {
            Step::Done(
                total,
                Some(InputEvent::Key(KeyEvent { code, modifiers })),
            )
        };

        match final_byte {
            b'A' => key(KeyCode::Up),
            b'B' => key(KeyCode::Down),
            b'C' => key(KeyCode::Right),
            b'D' => key(KeyCode::Left),
            b'H' => key(KeyCode::Home),
            b'F' => key(KeyCode::End),
            b'Z' => Step::Done(
                total,
                Some(InputEvent::Key(KeyEvent {
                    code: KeyCode::Tab,
                    modifiers: Modifiers::SHIFT,
                })),
            ),
            b'c' => Step::Done(
                total,
                Some(InputEvent::Capability(CapabilityReply::DeviceAttributes(
                    body,
                ))),
            ),
            b'u' if body.starts_with('?') => Step::Done(
                total,
                Some(InputEvent::Capability(CapabilityReply::KittyFlags(
                    params.first().copied().unwrap_or(0),
                ))),
            ),
            b'y' => Step::Done(
                total,
                Some(InputEvent::Capability(CapabilityReply::ModeReport(body))),
            ),
            b'~' => {
                let code = params.first().copied().unwrap_or(0);
                match code {
                    1 | 7 => key(KeyCode::Home),
                    2 => key(KeyCode::Insert),
                    3 => key(KeyCode::Delete),
                    4 | 8 => key(KeyCode::End),
                    5 => key(KeyCode::PageUp),
                    6 => key(KeyCode::PageDown),
                    11..=15 => key(KeyCode::F((code - 10) as u8)),
                    17..=21 => key(KeyCode::F((code - 11) as u8)),
                    23 | 24 => key(KeyCode::F((code - 12) as u8)),
                    200 => self.parse_paste(total),
                    _ => Step::Done(total, None),
                }
            }
            _ => Step::Done(total, None), // recognized CSI we don't surface
        }
    }

    /// Bracketed paste: the opener was consumed through `open_len`; the
    /// payload runs until `ESC [ 2 0 1 ~`.
    fn parse_paste(&self, open_len: usize) -> Step {
        const CLOSE: &[u8] = b"\x1b[201~";
        let buf = &self.pending;
        let rest = &buf[open_len..];
        match find_subsequence(rest, CLOSE) {
            Some(pos) => {
                let content = String::from_utf8_lossy(&rest[..pos]).to_string();
                Step::Done(open_len + pos + CLOSE.len(), Some(InputEvent::Paste(content)))
            }
            None => Step::NeedMore,
        }
    }

    /// SGR mouse: `ESC [ < b ; x ; y (M|m)`.
    fn parse_sgr_mouse(&mut self) -> Step {
        let buf = &self.pending;
        let mut i = 3;
        while i < buf.len() {
            let b = buf[i];
            if b == b'M' || b == b'm' {
                let release = b == b'm';
                let body = String::from_utf8_lossy(&buf[3..i]);
                let fields: Vec<u16> = body.split(';').filter_map(|p| p.parse().ok()).collect();
                if fields.len() != 3 {
                    return Step::Done(1, None);
                }
                let total = i + 1;
                let event = self.decode_mouse(fields[0], fields[1], fields[2], release);
                return Step::Done(total, event.map(InputEvent::Mouse));
            }
            if !b.is_ascii_digit() && b != b';' {
                return Step::Done(1, None);
            }
            i += 1;
        }
        Step::NeedMore
    }

    /// Legacy X10 mouse: `ESC [ M` then three raw bytes.
    fn parse_x10(&mut self) -> Step {
        let buf = &self.pending;
        if buf.len() < 6 {
            return Step::NeedMore;
        }
        let b = u16::from(buf[3].saturating_sub(32));
        let x = u16::from(buf[4].saturating_sub(33));
        let y = u16::from(buf[5].saturating_sub(33));
        // X10 encodes release as button value 3.
        let release = b & 0b11 == 3;
        let event = self.decode_mouse(b, x + 1, y + 1, release);
        Step::Done(6, event.map(InputEvent::Mouse))
    }

    /// Shared button-bit decoding for SGR and X10 reports. `x`/`y` are
    /// 1-based as on the wire.
    fn decode_mouse(&mut self, b: u16, x: u16, y: u16, release: bool) -> Option<MouseEvent> {
        let mut modifiers = Modifiers::NONE;
        if b & 4 != 0 {
            modifiers = modifiers.union(Modifiers::SHIFT);
        }
        if b & 8 != 0 {
            modifiers = modifiers.union(Modifiers::ALT);
        }
        if b & 16 != 0 {
            modifiers = modifiers.union(Modifiers::CTRL);
        }

        let x = x.saturating_sub(1);
        let y = y.saturating_sub(1);

        if b & 64 != 0 {
            let kind = if b & 1 != 0 {
                MouseEventKind::ScrollDown
            } else {
                MouseEventKind::ScrollUp
            };
            return Some(MouseEvent {
                kind,
                button: MouseButton::Left,
                x,
                y,
                modifiers,
            });
        }

        let button_bits = b & 0b11;
        let button = match button_bits {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::Left,
        };

        if b & 32 != 0 {
            let kind = if self.pressed != 0 {
                MouseEventKind::Drag
            } else {
                MouseEventKind::Move
            };
            return Some(MouseEvent {
                kind,
                button,
                x,
                y,
                modifiers,
            });
        }

        if release {
            if button_bits == 3 {
                self.pressed = 0;
            } else {
                self.pressed &= !(1 << button_bits);
            }
            Some(MouseEvent {
                kind: MouseEventKind::Up,
                button,
                x,
                y,
                modifiers,
            })
        } else {
            self.pressed |= 1 << button_bits;
            Some(MouseEvent {
                kind: MouseEventKind::Down,
                button,
                x,
                y,
                modifiers,
            })
        }
    }

    /// SS3 sequences: `ESC O` then one final byte.
    fn parse_ss3(&self) -> Step {
        let buf = &self.pending;
        if buf.len() < 3 {
            return Step::NeedMore;
        }
        let key = |code| Step::Done(3, Some(InputEvent::Key(KeyEvent::plain(code))));
        match buf[2] {
            b'A' => key(KeyCode::Up),
            b'B' => key(KeyCode::Down),
            b'C' => key(KeyCode::Right),
            b'D' => key(KeyCode::Left),
            b'H' => key(KeyCode::Home),
            b'F' => key(KeyCode::End),
            b'P' => key(KeyCode::F(1)),
            b'Q' => key(KeyCode::F(2)),
            b'R' => key(KeyCode::F(3)),
            b'S' => key(KeyCode::F(4)),
            _ => Step::Done(1, None),
        }
    }

    /// OSC passthrough: `ESC ]` ... (BEL | `ESC \`).
    fn parse_osc(&self) -> Step {
        let buf = &self.pending;
        let mut i = 2;
        while i < buf.len() {
            if buf[i] == 0x07 {
                let body = String::from_utf8_lossy(&buf[2..i]).to_string();
                return Step::Done(i + 1, Some(InputEvent::Capability(CapabilityReply::Osc(body))));
            }
            if buf[i] == ESC {
                if i + 1 >= buf.len() {
                    return Step::NeedMore;
                }
                if buf[i + 1] == b'\\' {
                    let body = String::from_utf8_lossy(&buf[2..i]).to_string();
                    return Step::Done(
                        i + 2,
                        Some(InputEvent::Capability(CapabilityReply::Osc(body))),
                    );
                }
                return Step::Done(1, None);
            }
            i += 1;
        }
        Step::NeedMore
    }

    /// DCS passthrough: `ESC P` ... `ESC \`.
    fn parse_dcs(&self) -> Step {
        let buf = &self.pending;
        let mut i = 2;
        while i < buf.len() {
            if buf[i] == ESC {
                if i + 1 >= buf.len() {
                    return Step::NeedMore;
                }
                if buf[i + 1] == b'\\' {
                    let body = String::from_utf8_lossy(&buf[2..i]).to_string();
                    return Step::Done(
                        i + 2,
                        Some(InputEvent::Capability(CapabilityReply::Dcs(body))),
                    );
                }
                return Step::Done(1, None);
            }
            i += 1;
        }
        Step::NeedMore
    }
}

/// Expected byte length of a UTF-8 sequence from its lead byte.
fn utf8_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

/// Find a byte subsequence, returning the offset of its start.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(bytes: &[u8]) -> Vec<InputEvent> {
        InputParser::new().feed(bytes)
    }

    // --- plain keys ---

    #[test]
    fn ascii_chars() {
        let events = feed_all(b"ab");
        assert_eq!(
            events,
            vec![
                InputEvent::Key(KeyEvent::plain(KeyCode::Char('a'))),
                InputEvent::Key(KeyEvent::plain(KeyCode::Char('b'))),
            ]
        );
    }

    #[test]
    fn utf8_char() {
        let events = feed_all("世".as_bytes());
        assert_eq!(
            events,
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::Char('世')))]
        );
    }

    #[test]
    fn utf8_split_across_feeds() {
        let mut parser = InputParser::new();
        let bytes = "世".as_bytes();
        assert!(parser.feed(&bytes[..1]).is_empty());
        let events = parser.feed(&bytes[1..]);
        assert_eq!(
            events,
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::Char('世')))]
        );
    }

    #[test]
    fn control_keys() {
        assert_eq!(
            feed_all(b"\r"),
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::Enter))]
        );
        assert_eq!(
            feed_all(b"\t"),
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::Tab))]
        );
        assert_eq!(
            feed_all(&[0x7F]),
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::Backspace))]
        );
    }

    #[test]
    fn ctrl_letter() {
        let events = feed_all(&[0x03]);
        assert_eq!(
            events,
            vec![InputEvent::Key(KeyEvent {
                code: KeyCode::Char('c'),
                modifiers: Modifiers::CTRL,
            })]
        );
    }

    #[test]
    fn alt_letter() {
        let events = feed_all(b"\x1bx");
        assert_eq!(
            events,
            vec![InputEvent::Key(KeyEvent {
                code: KeyCode::Char('x'),
                modifiers: Modifiers::ALT,
            })]
        );
    }

    // --- CSI keys ---

    #[test]
    fn arrow_keys() {
        assert_eq!(
            feed_all(b"\x1b[A"),
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::Up))]
        );
        assert_eq!(
            feed_all(b"\x1b[D"),
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::Left))]
        );
    }

    #[test]
    fn modified_arrow() {
        // CSI 1;5C = Ctrl+Right.
        let events = feed_all(b"\x1b[1;5C");
        assert_eq!(
            events,
            vec![InputEvent::Key(KeyEvent {
                code: KeyCode::Right,
                modifiers: Modifiers::CTRL,
            })]
        );
    }

    #[test]
    fn tilde_keys() {
        assert_eq!(
            feed_all(b"\x1b[3~"),
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::Delete))]
        );
        assert_eq!(
            feed_all(b"\x1b[5~"),
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::PageUp))]
        );
        assert_eq!(
            feed_all(b"\x1b[15~"),
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::F(5)))]
        );
        assert_eq!(
            feed_all(b"\x1b[24~"),
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::F(12)))]
        );
    }

    #[test]
    fn ss3_keys() {
        assert_eq!(
            feed_all(b"\x1bOA"),
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::Up))]
        );
        assert_eq!(
            feed_all(b"\x1bOP"),
            vec![InputEvent::Key(KeyEvent::plain(KeyCode::F(1)))]
        );
    }

    #[test]
    fn shift_tab() {
        let events = feed_all(b"\x1b[Z");
        assert_eq!(
            events,
            vec![InputEvent::Key(KeyEvent {
                code: KeyCode::Tab,
                modifiers: Modifiers::SHIFT,
            })]
        );
    }

    // --- focus ---

    #[test]
    fn focus_events() {
        assert_eq!(feed_all(b"\x1b[I"), vec![InputEvent::FocusGained]);
        assert_eq!(feed_all(b"\x1b[O"), vec![InputEvent::FocusLost]);
    }

    // --- SGR mouse ---

    #[test]
    fn sgr_press_drag_release() {
        // The drag scenario: press, motion with button held, release.
        let mut parser = InputParser::new();
        let mut events = parser.feed(b"\x1b[<0;10;5M");
        events.extend(parser.feed(b"\x1b[<32;12;5M"));
        events.extend(parser.feed(b"\x1b[<0;12;5m"));
        assert_eq!(
            events,
            vec![
                InputEvent::Mouse(MouseEvent {
                    kind: MouseEventKind::Down,
                    button: MouseButton::Left,
                    x: 9,
                    y: 4,
                    modifiers: Modifiers::NONE,
                }),
                InputEvent::Mouse(MouseEvent {
                    kind: MouseEventKind::Drag,
                    button: MouseButton::Left,
                    x: 11,
                    y: 4,
                    modifiers: Modifiers::NONE,
                }),
                InputEvent::Mouse(MouseEvent {
                    kind: MouseEventKind::Up,
                    button: MouseButton::Left,
                    x: 11,
                    y: 4,
                    modifiers: Modifiers::NONE,
                }),
            ]
        );
        assert_eq!(parser.pressed_buttons(), 0);
    }

    #[test]
    fn sgr_motion_without_press_is_move() {
        let events = feed_all(b"\x1b[<35;4;2M");
        assert_eq!(
            events,
            vec![InputEvent::Mouse(MouseEvent {
                kind: MouseEventKind::Move,
                button: MouseButton::Left,
                x: 3,
                y: 1,
                modifiers: Modifiers::NONE,
            })]
        );
    }

    #[test]
    fn sgr_scroll() {
        let up = feed_all(b"\x1b[<64;3;3M");
        let down = feed_all(b"\x1b[<65;3;3M");
        assert!(matches!(
            up[0],
            InputEvent::Mouse(MouseEvent {
                kind: MouseEventKind::ScrollUp,
                ..
            })
        ));
        assert!(matches!(
            down[0],
            InputEvent::Mouse(MouseEvent {
                kind: MouseEventKind::ScrollDown,
                ..
            })
        ));
    }

    #[test]
    fn sgr_right_button_with_ctrl() {
        let events = feed_all(b"\x1b[<18;2;2M");
        assert_eq!(
            events,
            vec![InputEvent::Mouse(MouseEvent {
                kind: MouseEventKind::Down,
                button: MouseButton::Right,
                x: 1,
                y: 1,
                modifiers: Modifiers::CTRL,
            })]
        );
    }

    // --- X10 mouse ---

    #[test]
    fn x10_press_and_release() {
        // Button 0 press at (1,1) 1-based: 32+0, 32+1, 32+1.
        let mut parser = InputParser::new();
        let press = parser.feed(&[0x1B, b'[', b'M', 32, 33, 33]);
        assert_eq!(
            press,
            vec![InputEvent::Mouse(MouseEvent {
                kind: MouseEventKind::Down,
                button: MouseButton::Left,
                x: 0,
                y: 0,
                modifiers: Modifiers::NONE,
            })]
        );
        // Release encodes button 3.
        let release = parser.feed(&[0x1B, b'[', b'M', 35, 33, 33]);
        assert!(matches!(
            release[0],
            InputEvent::Mouse(MouseEvent {
                kind: MouseEventKind::Up,
                ..
            })
        ));
        assert_eq!(parser.pressed_buttons(), 0);
    }

    // --- capability replies ---

    #[test]
    fn da_reply() {
        let events = feed_all(b"\x1b[?62;22c");
        assert_eq!(
            events,
            vec![InputEvent::Capability(CapabilityReply::DeviceAttributes(
                "?62;22".into()
            ))]
        );
    }

    #[test]
    fn kitty_flags_reply() {
        let events = feed_all(b"\x1b[?31u");
        assert_eq!(
            events,
            vec![InputEvent::Capability(CapabilityReply::KittyFlags(31))]
        );
    }

    #[test]
    fn decrqm_mode_report() {
        let events = feed_all(b"\x1b[?2026;2$y");
        assert_eq!(
            events,
            vec![InputEvent::Capability(CapabilityReply::ModeReport(
                "?2026;2$".into()
            ))]
        );
    }

    #[test]
    fn osc_reply_bel_and_st() {
        let bel = feed_all(b"\x1b]10;rgb:ffff/ffff/ffff\x07");
        assert_eq!(
            bel,
            vec![InputEvent::Capability(CapabilityReply::Osc(
                "10;rgb:ffff/ffff/ffff".into()
            ))]
        );
        let st = feed_all(b"\x1b]11;test\x1b\\");
        assert_eq!(
            st,
            vec![InputEvent::Capability(CapabilityReply::Osc("11;test".into()))]
        );
    }

    #[test]
    fn dcs_reply() {
        let events = feed_all(b"\x1bP1$r0m\x1b\\");
        assert_eq!(
            events,
            vec![InputEvent::Capability(CapabilityReply::Dcs("1$r0m".into()))]
        );
    }

    // --- bracketed paste ---

    #[test]
    fn bracketed_paste() {
        let events = feed_all(b"\x1b[200~hello world\x1b[201~");
        assert_eq!(events, vec![InputEvent::Paste("hello world".into())]);
    }

    #[test]
    fn paste_split_across_feeds() {
        let mut parser = InputParser::new();
        assert!(parser.feed(b"\x1b[200~par").is_empty());
        let events = parser.feed(b"tial\x1b[201~");
        assert_eq!(events, vec![InputEvent::Paste("partial".into())]);
    }

    // --- robustness ---

    #[test]
    fn incomplete_csi_buffers() {
        let mut parser = InputParser::new();
        assert!(parser.feed(b"\x1b[1;").is_empty());
        let events = parser.feed(b"5C");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn double_escape_is_escape_key() {
        let events = feed_all(b"\x1b\x1b[A");
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            InputEvent::Key(KeyEvent::plain(KeyCode::Escape))
        );
    }

    #[test]
    fn malformed_csi_drops_one_byte() {
        // ESC [ followed by a non-CSI byte: the ESC is dropped, then the
        // "[" and "x" parse as plain characters.
        let events = feed_all(b"\x1b[\x01x");
        assert!(!events.is_empty());
    }

    #[test]
    fn random_bytes_always_terminate() {
        // Deterministic pseudo-random stream.
        let mut state = 0x12345678u32;
        let mut bytes = Vec::new();
        for _ in 0..4096 {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            bytes.push((state >> 16) as u8);
        }
        let mut parser = InputParser::new();
        let _ = parser.feed(&bytes);
        // Buffered remainder must be bounded by one incomplete sequence.
        assert!(parser.pending.len() <= MAX_SEQUENCE + 1);
    }

    #[test]
    fn interleaved_text_and_sequences() {
        let events = feed_all(b"a\x1b[Ab");
        assert_eq!(
            events,
            vec![
                InputEvent::Key(KeyEvent::plain(KeyCode::Char('a'))),
                InputEvent::Key(KeyEvent::plain(KeyCode::Up)),
                InputEvent::Key(KeyEvent::plain(KeyCode::Char('b'))),
            ]
        );
    }
}
