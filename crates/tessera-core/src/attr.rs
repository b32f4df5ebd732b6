//! Text attribute bitset.

use bitflags::bitflags;

bitflags! {
    /// Text rendering attributes for a cell.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Attributes: u8 {
        /// Bold weight.
        const BOLD = 1 << 0;
        /// Dim / faint.
        const DIM = 1 << 1;
        /// Italic slant.
        const ITALIC = 1 << 2;
        /// Underline.
        const UNDERLINE = 1 << 3;
        /// Blinking text.
        const BLINK = 1 << 4;
        /// Inverse video.
        const INVERSE = 1 << 5;
        /// Hidden (concealed) text.
        const HIDDEN = 1 << 6;
        /// Strikethrough.
        const STRIKETHROUGH = 1 << 7;
    }
}

impl Attributes {
    /// The SGR code that enables this single attribute.
    ///
    /// Only meaningful for single-flag values.
    pub fn sgr_set(self) -> Option<u8> {
        match self {
            Self::BOLD => Some(1),
            Self::DIM => Some(2),
            Self::ITALIC => Some(3),
            Self::UNDERLINE => Some(4),
            Self::BLINK => Some(5),
            Self::INVERSE => Some(7),
            Self::HIDDEN => Some(8),
            Self::STRIKETHROUGH => Some(9),
            _ => None,
        }
    }

    /// The SGR code that disables this single attribute.
    ///
    /// Bold and dim share the reset code 22.
    pub fn sgr_reset(self) -> Option<u8> {
        match self {
            Self::BOLD | Self::DIM => Some(22),
            Self::ITALIC => Some(23),
            Self::UNDERLINE => Some(24),
            Self::BLINK => Some(25),
            Self::INVERSE => Some(27),
            Self::HIDDEN => Some(28),
            Self::STRIKETHROUGH => Some(29),
            _ => None,
        }
    }

    /// Iterate over the individual flags set in this value.
    pub fn flags(self) -> impl Iterator<Item = Attributes> {
        [
            Self::BOLD,
            Self::DIM,
            Self::ITALIC,
            Self::UNDERLINE,
            Self::BLINK,
            Self::INVERSE,
            Self::HIDDEN,
            Self::STRIKETHROUGH,
        ]
        .into_iter()
        .filter(move |f| self.contains(*f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_by_default() {
        assert!(Attributes::default().is_empty());
    }

    #[test]
    fn set_and_contains() {
        let a = Attributes::BOLD | Attributes::UNDERLINE;
        assert!(a.contains(Attributes::BOLD));
        assert!(a.contains(Attributes::UNDERLINE));
        assert!(!a.contains(Attributes::ITALIC));
    }

    #[test]
    fn sgr_codes() {
        assert_eq!(Attributes::BOLD.sgr_set(), Some(1));
        assert_eq!(Attributes::STRIKETHROUGH.sgr_set(), Some(9));
        assert_eq!(Attributes::BOLD.sgr_reset(), Some(22));
        assert_eq!(Attributes::DIM.sgr_reset(), Some(22));
        assert_eq!(Attributes::ITALIC.sgr_reset(), Some(23));
    }

    #[test]
    fn multi_flag_has_no_single_code() {
        let a = Attributes::BOLD | Attributes::ITALIC;
        assert_eq!(a.sgr_set(), None);
    }

    #[test]
    fn flags_iterates_set_bits() {
        let a = Attributes::DIM | Attributes::BLINK | Attributes::HIDDEN;
        let collected: Vec<_> = a.flags().collect();
        assert_eq!(
            collected,
            vec![Attributes::DIM, Attributes::BLINK, Attributes::HIDDEN]
        );
    }
}
