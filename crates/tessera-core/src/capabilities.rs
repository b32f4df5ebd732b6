//! Terminal capability detection: environment pre-seed plus handshake
//! responses.
//!
//! Capabilities start from environment heuristics (`COLORTERM`, `TERM`,
//! `NO_COLOR`) and are refined by parsing the terminal's answers to the
//! startup queries. After the handshake the table is read-only.

use crate::input::CapabilityReply;

/// Level of color support available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ColorSupport {
    /// No color.
    NoColor,
    /// 16 ANSI colors.
    Basic16,
    /// 256 color palette.
    Extended256,
    /// 24-bit true color.
    TrueColor,
}

/// Capabilities detected for the terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Color support level.
    pub color: ColorSupport,
    /// Whether OSC 8 hyperlinks may be emitted.
    pub hyperlinks: bool,
    /// Whether the Kitty keyboard protocol is available.
    pub kitty_keyboard: bool,
    /// Whether focus in/out reporting works.
    pub focus_events: bool,
    /// Whether bracketed paste works.
    pub bracketed_paste: bool,
    /// Whether CSI 2026 synchronized output is supported.
    pub synchronized_output: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            color: ColorSupport::TrueColor,
            hyperlinks: true,
            kitty_keyboard: false,
            focus_events: true,
            bracketed_paste: true,
            synchronized_output: false,
        }
    }
}

/// The query burst written at startup: DA1, a Kitty keyboard probe, and
/// a DECRQM probe for synchronized output.
pub const HANDSHAKE_QUERIES: &[u8] = b"\x1b[c\x1b[?u\x1b[?2026$p";

impl Capabilities {
    /// Seed capabilities from environment variables.
    ///
    /// `COLORTERM=truecolor|24bit` wins, then `TERM` containing
    /// `256color`, then `NO_COLOR`. `TERM=dumb` disables everything
    /// optional.
    pub fn from_env() -> Self {
        let mut caps = Self::default();

        let term = std::env::var("TERM").unwrap_or_default();
        if term == "dumb" {
            return Self {
                color: ColorSupport::NoColor,
                hyperlinks: false,
                kitty_keyboard: false,
                focus_events: false,
                bracketed_paste: false,
                synchronized_output: false,
            };
        }

        caps.color = detect_color_support(&term);
        caps
    }

    /// Merge one handshake response into the table.
    pub fn apply_reply(&mut self, reply: &CapabilityReply) {
        match reply {
            CapabilityReply::DeviceAttributes(_) => {
                // Any terminal that answers DA is modern enough for
                // focus and paste reporting.
                self.focus_events = true;
                self.bracketed_paste = true;
            }
            CapabilityReply::KittyFlags(flags) => {
                self.kitty_keyboard = *flags > 0;
            }
            CapabilityReply::ModeReport(body) => {
                // DECRQM reply `?2026;v$`: v of 1 or 2 means recognized.
                if body.contains("2026")
                    && let Some(value) = body
                        .trim_end_matches('$')
                        .rsplit(';')
                        .next()
                        .and_then(|v| v.parse::<u8>().ok())
                {
                    self.synchronized_output = value == 1 || value == 2;
                }
            }
            CapabilityReply::Osc(_) | CapabilityReply::Dcs(_) => {}
        }
    }
}

/// Detect color support from environment variables.
fn detect_color_support(term: &str) -> ColorSupport {
    if let Ok(ct) = std::env::var("COLORTERM")
        && (ct == "truecolor" || ct == "24bit")
    {
        return ColorSupport::TrueColor;
    }
    if term.contains("256color") {
        return ColorSupport::Extended256;
    }
    if std::env::var("NO_COLOR").is_ok() {
        return ColorSupport::NoColor;
    }
    ColorSupport::Basic16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_assumes_modern_terminal() {
        let caps = Capabilities::default();
        assert_eq!(caps.color, ColorSupport::TrueColor);
        assert!(caps.hyperlinks);
        assert!(!caps.synchronized_output);
    }

    #[test]
    fn da_reply_confirms_reporting_modes() {
        let mut caps = Capabilities {
            focus_events: false,
            bracketed_paste: false,
            ..Capabilities::default()
        };
        caps.apply_reply(&CapabilityReply::DeviceAttributes("?62;22".into()));
        assert!(caps.focus_events);
        assert!(caps.bracketed_paste);
    }

    #[test]
    fn kitty_flags_enable_kitty() {
        let mut caps = Capabilities::default();
        caps.apply_reply(&CapabilityReply::KittyFlags(0));
        assert!(!caps.kitty_keyboard);
        caps.apply_reply(&CapabilityReply::KittyFlags(31));
        assert!(caps.kitty_keyboard);
    }

    #[test]
    fn decrqm_2026_recognized() {
        let mut caps = Capabilities::default();
        caps.apply_reply(&CapabilityReply::ModeReport("?2026;2$".into()));
        assert!(caps.synchronized_output);
        caps.apply_reply(&CapabilityReply::ModeReport("?2026;0$".into()));
        assert!(!caps.synchronized_output);
    }

    #[test]
    fn unrelated_mode_report_ignored() {
        let mut caps = Capabilities::default();
        caps.apply_reply(&CapabilityReply::ModeReport("?1049;1$".into()));
        assert!(!caps.synchronized_output);
    }
}
