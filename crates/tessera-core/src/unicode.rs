//! Unicode width calculation, line-break and wrap-break scanning.
//!
//! All entry points take raw bytes, treat them as UTF-8, and never panic:
//! invalid sequences are consumed one byte at a time as 1-wide replacement
//! graphemes. Widths follow `unicode-width`, with East Asian ambiguous
//! characters resolved by an explicit [`EastAsianWidth`] option.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// How East Asian ambiguous-width characters are measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EastAsianWidth {
    /// Ambiguous characters are 1 column (the common terminal default).
    #[default]
    Narrow,
    /// Ambiguous characters are 2 columns (CJK legacy environments).
    Wide,
}

/// How soft wrap positions are chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WrapMode {
    /// Break at word boundaries, falling back to grapheme boundaries.
    #[default]
    Word,
    /// Break after any grapheme.
    Char,
    /// Only hard line breaks.
    None,
}

/// The kind of hard line break found by [`find_line_breaks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineBreakKind {
    /// A bare `\n`.
    Lf,
    /// A `\r\n` pair.
    CrLf,
}

/// Punctuation after which word-mode wrapping may break.
const BREAK_PUNCTUATION: &[char] = &[',', '.', ';', ':', '!', '?', '/', '\\', '-'];

/// Returns true iff every byte is ASCII (< 0x80).
///
/// Scans in 16-byte chunks so the compiler can vectorize the OR-reduction.
pub fn is_ascii_only(bytes: &[u8]) -> bool {
    let mut chunks = bytes.chunks_exact(16);
    for chunk in &mut chunks {
        let mut acc = 0u8;
        for b in chunk {
            acc |= *b;
        }
        if acc & 0x80 != 0 {
            return false;
        }
    }
    chunks.remainder().iter().all(|b| b & 0x80 == 0)
}

/// Display width of a single grapheme cluster, clamped to `0..=2`.
///
/// Control graphemes other than TAB, LF, and CR measure as the 1-wide
/// replacement glyph they render as.
pub fn grapheme_width(grapheme: &str, east_asian: EastAsianWidth) -> usize {
    match grapheme {
        "\n" | "\r" | "\r\n" => return 0,
        _ => {}
    }
    if let Some(first) = grapheme.chars().next()
        && first.is_control()
    {
        return 1;
    }
    let w = match east_asian {
        EastAsianWidth::Narrow => grapheme.width(),
        EastAsianWidth::Wide => grapheme.width_cjk(),
    };
    w.min(2)
}

/// One scanned grapheme: byte range plus display width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ScannedGrapheme<'a> {
    /// Byte offset of the grapheme start.
    offset: usize,
    /// The grapheme text, or the replacement for an invalid byte.
    text: &'a str,
    /// Length in source bytes (1 for each invalid byte).
    byte_len: usize,
}

/// Iterate grapheme clusters over possibly-invalid UTF-8.
///
/// Valid runs are segmented normally; each invalid byte yields one
/// replacement grapheme of one source byte.
fn scan_graphemes(bytes: &[u8]) -> Vec<ScannedGrapheme<'_>> {
    let mut out = Vec::new();
    let mut base = 0usize;
    let mut rest = bytes;

    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                for (off, g) in valid.grapheme_indices(true) {
                    out.push(ScannedGrapheme {
                        offset: base + off,
                        text: g,
                        byte_len: g.len(),
                    });
                }
                break;
            }
            Err(err) => {
                let valid_len = err.valid_up_to();
                if valid_len > 0 {
                    // Safe split: from_utf8 vouched for this prefix.
                    if let Ok(valid) = std::str::from_utf8(&rest[..valid_len]) {
                        for (off, g) in valid.grapheme_indices(true) {
                            out.push(ScannedGrapheme {
                                offset: base + off,
                                text: g,
                                byte_len: g.len(),
                            });
                        }
                    }
                }
                // One replacement grapheme per invalid byte.
                out.push(ScannedGrapheme {
                    offset: base + valid_len,
                    text: "\u{FFFD}",
                    byte_len: 1,
                });
                base += valid_len + 1;
                rest = &rest[valid_len + 1..];
            }
        }
    }
    out
}

/// Advance a column past a tab stop.
fn tab_advance(col: usize, tab_width: u16) -> usize {
    let tw = usize::from(tab_width.max(1));
    (col / tw + 1) * tw
}

/// Total display width of a byte string.
///
/// When `respect_tabs` is set, TAB advances to the next multiple of
/// `tab_width`; otherwise it measures as a 1-wide replacement.
pub fn calculate_text_width(
    bytes: &[u8],
    tab_width: u16,
    respect_tabs: bool,
    east_asian: EastAsianWidth,
) -> usize {
    if is_ascii_only(bytes) && !bytes.contains(&b'\t') {
        // Fast path: every ASCII byte is one column, except line breaks.
        return bytes.iter().filter(|b| !matches!(**b, b'\n' | b'\r')).count();
    }

    let mut col = 0usize;
    for g in scan_graphemes(bytes) {
        if g.text == "\t" {
            if respect_tabs {
                col = tab_advance(col, tab_width);
            } else {
                col += 1;
            }
            continue;
        }
        col += grapheme_width(g.text, east_asian);
    }
    col
}

/// Find all hard line breaks, returning `(offset_of_break_char, kind)`.
///
/// For `\r\n` the offset points at the `\r`.
pub fn find_line_breaks(bytes: &[u8]) -> Vec<(usize, LineBreakKind)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' if i + 1 < bytes.len() && bytes[i + 1] == b'\n' => {
                out.push((i, LineBreakKind::CrLf));
                i += 2;
            }
            b'\n' => {
                out.push((i, LineBreakKind::Lf));
                i += 1;
            }
            _ => i += 1,
        }
    }
    out
}

/// Find soft wrap break candidates as byte offsets.
///
/// Word mode places a candidate at the start of each word that follows
/// whitespace and after each punctuation character in `[,.;:!?/\-]`.
/// Char mode places one after every grapheme. `None` returns only hard
/// line break positions.
pub fn find_wrap_breaks(bytes: &[u8], mode: WrapMode, _east_asian: EastAsianWidth) -> Vec<usize> {
    match mode {
        WrapMode::None => find_line_breaks(bytes).into_iter().map(|(o, _)| o).collect(),
        WrapMode::Char => scan_graphemes(bytes)
            .iter()
            .map(|g| g.offset + g.byte_len)
            .collect(),
        WrapMode::Word => {
            let mut out = Vec::new();
            let mut prev_was_space = false;
            for g in scan_graphemes(bytes) {
                let is_space = g.text.chars().all(char::is_whitespace) && !g.text.is_empty();
                if prev_was_space && !is_space {
                    out.push(g.offset);
                }
                if let Some(ch) = g.text.chars().next()
                    && BREAK_PUNCTUATION.contains(&ch)
                {
                    out.push(g.offset + g.byte_len);
                }
                prev_was_space = is_space;
            }
            out.dedup();
            out
        }
    }
}

/// Largest prefix of `bytes` that fits in `max_width` columns.
///
/// Returns `(byte_offset, visual_width)` of the prefix end. If even the
/// first grapheme exceeds `max_width`, that single grapheme is returned.
/// A tab that cannot fully expand consumes exactly the remaining width.
pub fn find_wrap_pos_by_width(
    bytes: &[u8],
    max_width: usize,
    tab_width: u16,
    respect_tabs: bool,
    east_asian: EastAsianWidth,
) -> (usize, usize) {
    let mut col = 0usize;
    let mut offset = 0usize;
    let mut first = true;

    for g in scan_graphemes(bytes) {
        if g.text == "\t" && respect_tabs {
            let next = tab_advance(col, tab_width);
            if next > max_width {
                // The tab eats whatever width is left on this line.
                return (g.offset + g.byte_len, max_width);
            }
            col = next;
            offset = g.offset + g.byte_len;
            first = false;
            continue;
        }

        let w = grapheme_width(g.text, east_asian);
        if col + w > max_width {
            if first {
                return (g.byte_len, w);
            }
            return (offset, col);
        }
        col += w;
        offset = g.offset + g.byte_len;
        first = false;
    }
    (offset, col)
}

/// Byte offset corresponding to a display column.
///
/// With `round_up`, a grapheme straddling `target_col` is included (the
/// offset after it); otherwise it is excluded (the offset before it).
pub fn find_pos_by_width(
    bytes: &[u8],
    target_col: usize,
    tab_width: u16,
    respect_tabs: bool,
    round_up: bool,
    east_asian: EastAsianWidth,
) -> usize {
    let mut col = 0usize;
    for g in scan_graphemes(bytes) {
        if col >= target_col {
            return g.offset;
        }
        let next = if g.text == "\t" && respect_tabs {
            tab_advance(col, tab_width)
        } else {
            col + grapheme_width(g.text, east_asian)
        };
        if next > target_col {
            // Straddling grapheme.
            return if round_up { g.offset + g.byte_len } else { g.offset };
        }
        col = next;
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- is_ascii_only ---

    #[test]
    fn ascii_scan() {
        assert!(is_ascii_only(b"hello world 123!@#"));
        assert!(is_ascii_only(b""));
        assert!(!is_ascii_only("héllo".as_bytes()));
        assert!(!is_ascii_only(&[0x41, 0x80, 0x41]));
    }

    #[test]
    fn ascii_scan_long_input() {
        let long = vec![b'a'; 1000];
        assert!(is_ascii_only(&long));
        let mut bad = long.clone();
        bad[999] = 0xFF;
        assert!(!is_ascii_only(&bad));
    }

    // --- grapheme_width ---

    #[test]
    fn width_classes() {
        assert_eq!(grapheme_width("a", EastAsianWidth::Narrow), 1);
        assert_eq!(grapheme_width("世", EastAsianWidth::Narrow), 2);
        assert_eq!(grapheme_width("\u{200B}", EastAsianWidth::Narrow), 0);
        assert_eq!(grapheme_width("\n", EastAsianWidth::Narrow), 0);
        assert_eq!(grapheme_width("\u{7}", EastAsianWidth::Narrow), 1);
    }

    #[test]
    fn ambiguous_width_configurable() {
        // U+00B1 PLUS-MINUS SIGN is East Asian ambiguous.
        assert_eq!(grapheme_width("±", EastAsianWidth::Narrow), 1);
        assert_eq!(grapheme_width("±", EastAsianWidth::Wide), 2);
    }

    // --- calculate_text_width ---

    #[test]
    fn text_width_ascii() {
        assert_eq!(
            calculate_text_width(b"hello", 8, true, EastAsianWidth::Narrow),
            5
        );
    }

    #[test]
    fn text_width_cjk() {
        assert_eq!(
            calculate_text_width("a世b".as_bytes(), 8, true, EastAsianWidth::Narrow),
            4
        );
    }

    #[test]
    fn text_width_tab_stops() {
        // "ab" (2) then tab to column 8, then "c" = 9.
        assert_eq!(
            calculate_text_width(b"ab\tc", 8, true, EastAsianWidth::Narrow),
            9
        );
        // Tab at column 0 goes straight to 4 with tab_width 4.
        assert_eq!(
            calculate_text_width(b"\tx", 4, true, EastAsianWidth::Narrow),
            5
        );
    }

    #[test]
    fn text_width_tab_ignored() {
        assert_eq!(
            calculate_text_width(b"a\tb", 8, false, EastAsianWidth::Narrow),
            3
        );
    }

    #[test]
    fn text_width_invalid_bytes() {
        // Two invalid bytes measure as two replacement glyphs.
        assert_eq!(
            calculate_text_width(&[b'a', 0xFF, 0xFE, b'b'], 8, true, EastAsianWidth::Narrow),
            4
        );
    }

    #[test]
    fn width_equals_sum_of_graphemes() {
        let s = "héllo 世界 x\u{0301}y";
        let total = calculate_text_width(s.as_bytes(), 8, true, EastAsianWidth::Narrow);
        let sum: usize = s
            .graphemes(true)
            .map(|g| grapheme_width(g, EastAsianWidth::Narrow))
            .sum();
        assert_eq!(total, sum);
    }

    // --- find_line_breaks ---

    #[test]
    fn line_breaks_lf_and_crlf() {
        let breaks = find_line_breaks(b"a\nb\r\nc");
        assert_eq!(
            breaks,
            vec![(1, LineBreakKind::Lf), (3, LineBreakKind::CrLf)]
        );
    }

    #[test]
    fn line_breaks_none() {
        assert!(find_line_breaks(b"abc").is_empty());
    }

    #[test]
    fn lone_cr_is_not_a_break() {
        assert!(find_line_breaks(b"a\rb").is_empty());
    }

    // --- find_wrap_breaks ---

    #[test]
    fn wrap_breaks_word_mode() {
        let breaks = find_wrap_breaks(b"foo bar baz", WrapMode::Word, EastAsianWidth::Narrow);
        // Word starts after whitespace: offsets 4 and 8.
        assert_eq!(breaks, vec![4, 8]);
    }

    #[test]
    fn wrap_breaks_after_punctuation() {
        let breaks = find_wrap_breaks(b"a,b", WrapMode::Word, EastAsianWidth::Narrow);
        assert_eq!(breaks, vec![2]);
    }

    #[test]
    fn wrap_breaks_hyphen() {
        let breaks = find_wrap_breaks(b"well-known", WrapMode::Word, EastAsianWidth::Narrow);
        assert_eq!(breaks, vec![5]);
    }

    #[test]
    fn wrap_breaks_char_mode() {
        let breaks = find_wrap_breaks("a世".as_bytes(), WrapMode::Char, EastAsianWidth::Narrow);
        assert_eq!(breaks, vec![1, 4]);
    }

    #[test]
    fn wrap_breaks_none_mode() {
        let breaks = find_wrap_breaks(b"ab\ncd", WrapMode::None, EastAsianWidth::Narrow);
        assert_eq!(breaks, vec![2]);
    }

    // --- find_wrap_pos_by_width ---

    #[test]
    fn wrap_pos_fits_entirely() {
        let (off, w) = find_wrap_pos_by_width(b"abc", 10, 8, true, EastAsianWidth::Narrow);
        assert_eq!((off, w), (3, 3));
    }

    #[test]
    fn wrap_pos_cuts_at_width() {
        let (off, w) = find_wrap_pos_by_width(b"abcdef", 4, 8, true, EastAsianWidth::Narrow);
        assert_eq!((off, w), (4, 4));
    }

    #[test]
    fn wrap_pos_wide_char_does_not_split() {
        // "a" (1) + "世" (2) = 3; next "界" would need 5 columns.
        let (off, w) =
            find_wrap_pos_by_width("a世界".as_bytes(), 4, 8, true, EastAsianWidth::Narrow);
        assert_eq!((off, w), (4, 3));
    }

    #[test]
    fn wrap_pos_oversize_first_grapheme() {
        let (off, w) = find_wrap_pos_by_width("世".as_bytes(), 1, 8, true, EastAsianWidth::Narrow);
        assert_eq!((off, w), (3, 2));
    }

    #[test]
    fn wrap_pos_tab_consumes_remaining() {
        // "abc" = 3 columns, then tab would expand to column 8 but only
        // width 5 is available: the tab consumes the rest.
        let (off, w) = find_wrap_pos_by_width(b"abc\tdef", 5, 8, true, EastAsianWidth::Narrow);
        assert_eq!((off, w), (4, 5));
    }

    #[test]
    fn wrap_pos_empty_input() {
        let (off, w) = find_wrap_pos_by_width(b"", 5, 8, true, EastAsianWidth::Narrow);
        assert_eq!((off, w), (0, 0));
    }

    // --- find_pos_by_width ---

    #[test]
    fn pos_by_width_exact() {
        assert_eq!(
            find_pos_by_width(b"abcdef", 3, 8, true, false, EastAsianWidth::Narrow),
            3
        );
    }

    #[test]
    fn pos_by_width_straddling_wide() {
        // "世" spans columns 0-1; target column 1 lands inside it.
        let down = find_pos_by_width("世x".as_bytes(), 1, 8, true, false, EastAsianWidth::Narrow);
        let up = find_pos_by_width("世x".as_bytes(), 1, 8, true, true, EastAsianWidth::Narrow);
        assert_eq!(down, 0);
        assert_eq!(up, 3);
    }

    #[test]
    fn pos_by_width_past_end() {
        assert_eq!(
            find_pos_by_width(b"ab", 10, 8, true, false, EastAsianWidth::Narrow),
            2
        );
    }

    #[test]
    fn pos_by_width_zero_target() {
        assert_eq!(
            find_pos_by_width(b"abc", 0, 8, true, false, EastAsianWidth::Narrow),
            0
        );
    }

    // --- invalid UTF-8 safety ---

    #[test]
    fn invalid_bytes_never_panic() {
        let junk: Vec<u8> = (0u8..=255).collect();
        let _ = calculate_text_width(&junk, 8, true, EastAsianWidth::Narrow);
        let _ = find_wrap_breaks(&junk, WrapMode::Word, EastAsianWidth::Narrow);
        let _ = find_wrap_pos_by_width(&junk, 10, 8, true, EastAsianWidth::Narrow);
        let _ = find_pos_by_width(&junk, 10, 8, true, true, EastAsianWidth::Narrow);
    }

    #[test]
    fn truncated_multibyte_is_replacement() {
        // First two bytes of "世" (E4 B8 96) only.
        let bytes = [0xE4, 0xB8];
        assert_eq!(
            calculate_text_width(&bytes, 8, true, EastAsianWidth::Narrow),
            2
        );
    }
}
