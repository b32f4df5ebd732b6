//! ANSI escape sequence builders.
//!
//! All output sequences used by the presenter live here: cursor motion,
//! SGR color and attribute transitions (with palette downgrade), OSC 8
//! hyperlinks, and the terminal mode switches.

use std::fmt::Write;

use crate::attr::Attributes;
use crate::capabilities::ColorSupport;
use crate::color::{Rgba, rgb_to_16, rgb_to_256};

/// Reset all SGR attributes.
pub const SGR_RESET: &str = "\x1b[0m";
/// Hide the cursor.
pub const CURSOR_HIDE: &str = "\x1b[?25l";
/// Show the cursor.
pub const CURSOR_SHOW: &str = "\x1b[?25h";
/// Begin synchronized output.
pub const SYNC_START: &str = "\x1b[?2026h";
/// End synchronized output.
pub const SYNC_END: &str = "\x1b[?2026l";
/// Close any open hyperlink.
pub const LINK_CLOSE: &str = "\x1b]8;;\x1b\\";

/// Move the cursor to a 0-based cell position (1-based on the wire).
pub fn cursor_position(out: &mut String, x: u16, y: u16) {
    let _ = write!(out, "\x1b[{};{}H", y + 1, x + 1);
}

/// Open an OSC 8 hyperlink.
pub fn link_open(out: &mut String, url: &str) {
    let _ = write!(out, "\x1b]8;;{url}\x1b\\");
}

/// Emit a foreground color, downgraded to the terminal's support level.
/// Fully transparent colors map to the terminal default (SGR 39).
pub fn fg_color(out: &mut String, color: Rgba, support: ColorSupport) {
    if color.is_transparent() {
        out.push_str("\x1b[39m");
        return;
    }
    let (r, g, b) = color.to_srgb();
    match support {
        ColorSupport::TrueColor => {
            let _ = write!(out, "\x1b[38;2;{r};{g};{b}m");
        }
        ColorSupport::Extended256 => {
            let _ = write!(out, "\x1b[38;5;{}m", rgb_to_256(r, g, b));
        }
        ColorSupport::Basic16 => {
            let idx = rgb_to_16(r, g, b);
            let code = if idx < 8 { 30 + idx } else { 90 + idx - 8 };
            let _ = write!(out, "\x1b[{code}m");
        }
        ColorSupport::NoColor => out.push_str("\x1b[39m"),
    }
}

/// Emit a background color, downgraded to the terminal's support level.
/// Fully transparent colors map to the terminal default (SGR 49).
pub fn bg_color(out: &mut String, color: Rgba, support: ColorSupport) {
    if color.is_transparent() {
        out.push_str("\x1b[49m");
        return;
    }
    let (r, g, b) = color.to_srgb();
    match support {
        ColorSupport::TrueColor => {
            let _ = write!(out, "\x1b[48;2;{r};{g};{b}m");
        }
        ColorSupport::Extended256 => {
            let _ = write!(out, "\x1b[48;5;{}m", rgb_to_256(r, g, b));
        }
        ColorSupport::Basic16 => {
            let idx = rgb_to_16(r, g, b);
            let code = if idx < 8 { 40 + idx } else { 100 + idx - 8 };
            let _ = write!(out, "\x1b[{code}m");
        }
        ColorSupport::NoColor => out.push_str("\x1b[49m"),
    }
}

/// Emit the minimal SGR delta taking attributes from `prev` to `next`.
///
/// Additions emit the set code. Removals emit the reset counterpart;
/// since bold and dim share reset 22, dropping one re-asserts the other
/// when it survives the transition.
pub fn attr_delta(out: &mut String, prev: Attributes, next: Attributes) {
    if prev == next {
        return;
    }

    let removed = prev - next;
    let mut reasserted = Attributes::empty();

    for flag in removed.flags() {
        let Some(code) = flag.sgr_reset() else { continue };
        let _ = write!(out, "\x1b[{code}m");
        if code == 22 {
            // 22 clears both bold and dim; re-add the one still wanted.
            let keep = next & (Attributes::BOLD | Attributes::DIM);
            for k in keep.flags() {
                if let Some(set) = k.sgr_set() {
                    let _ = write!(out, "\x1b[{set}m");
                    reasserted |= k;
                }
            }
        }
    }

    let added = next - prev;
    for flag in added.flags() {
        if reasserted.contains(flag) {
            continue;
        }
        if let Some(code) = flag.sgr_set() {
            let _ = write!(out, "\x1b[{code}m");
        }
    }
}
