//! Text buffer — logical lines of styled chunks with a soft-wrap cache.
//!
//! Content is a rope of [`Line`] segments so that "which line is at
//! visual row R" is a logarithmic summary search. Each line caches its
//! wrap segmentation for the current wrap parameters; edits invalidate
//! only the touched lines and the cache is rebuilt lazily on the next
//! query. Highlight overlays and the selection are layered on top of the
//! chunk styles at read time.

use std::collections::BTreeMap;

use unicode_segmentation::UnicodeSegmentation;

use crate::rope::{Item, Rope, Summary};
use crate::text_style::{Chunk, StyleId, StyleRegistry, TextStyle};
use crate::unicode::{
    EastAsianWidth, WrapMode, calculate_text_width, find_wrap_breaks, find_wrap_pos_by_width,
};

/// One soft-wrap segment of a logical line: a byte range plus its width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WrapSegment {
    /// Byte offset of the segment start within the line text.
    pub start: usize,
    /// Byte offset one past the segment end.
    pub end: usize,
    /// Display width of the segment.
    pub width: usize,
}

/// A logical line: styled chunks plus the cached wrap segmentation.
#[derive(Clone, Debug)]
pub struct Line {
    chunks: Vec<Chunk>,
    /// `None` marks the cache dirty for the current wrap parameters.
    wrap: Option<Vec<WrapSegment>>,
}

impl Line {
    fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks, wrap: None }
    }

    fn from_text(text: &str) -> Self {
        if text.is_empty() {
            Self::new(Vec::new())
        } else {
            Self::new(vec![Chunk::new(text)])
        }
    }

    /// The full text of the line (no trailing newline).
    pub fn text(&self) -> String {
        self.chunks.iter().map(|c| c.text.as_str()).collect()
    }

    fn byte_len(&self) -> usize {
        self.chunks.iter().map(|c| c.text.len()).sum()
    }
}

/// Rope summary for lines: line count, virtual line count, byte total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineSummary {
    /// Logical line count.
    pub lines: usize,
    /// Virtual (wrapped) line count.
    pub vlines: usize,
    /// Total bytes of line text.
    pub bytes: usize,
}

impl Summary for LineSummary {
    fn add(&self, other: &Self) -> Self {
        Self {
            lines: self.lines + other.lines,
            vlines: self.vlines + other.vlines,
            bytes: self.bytes + other.bytes,
        }
    }

    fn weight(&self) -> usize {
        self.bytes
    }
}

impl Item for Line {
    type Summary = LineSummary;
    const MARKER_VARIANTS: usize = 0;

    fn summarize(&self) -> LineSummary {
        LineSummary {
            lines: 1,
            vlines: self.wrap.as_ref().map_or(1, Vec::len),
            bytes: self.byte_len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A highlight overlay on one logical line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Highlight {
    /// First grapheme column covered.
    pub start_col: usize,
    /// One past the last grapheme column covered.
    pub end_col: usize,
    /// Style to apply, resolved through the registry at read time.
    pub style_id: StyleId,
    /// Higher priority wins where overlays overlap.
    pub priority: u8,
}

/// Selection endpoints in logical `(row, grapheme-column)` coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    /// Row where the selection was anchored.
    pub anchor_row: usize,
    /// Column where the selection was anchored.
    pub anchor_col: usize,
    /// Row of the moving end.
    pub focus_row: usize,
    /// Column of the moving end.
    pub focus_col: usize,
}

impl Selection {
    /// Endpoints ordered document-forward: `(start, end)`.
    pub fn ordered(&self) -> ((usize, usize), (usize, usize)) {
        let a = (self.anchor_row, self.anchor_col);
        let f = (self.focus_row, self.focus_col);
        if a <= f { (a, f) } else { (f, a) }
    }

    /// Returns true if anchor and focus coincide.
    pub fn is_collapsed(&self) -> bool {
        self.anchor_row == self.focus_row && self.anchor_col == self.focus_col
    }
}

/// Wrap parameters currently in force.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct WrapParams {
    width: u16,
    mode: WrapMode,
    tab_width: u16,
    east_asian: EastAsianWidth,
}

impl Default for WrapParams {
    fn default() -> Self {
        Self {
            width: 0, // 0 = unbounded
            mode: WrapMode::None,
            tab_width: 8,
            east_asian: EastAsianWidth::Narrow,
        }
    }
}

/// Text buffer over styled logical lines with a wrap cache.
#[derive(Clone, Debug)]
pub struct TextBuffer {
    lines: Rope<Line>,
    params: WrapParams,
    highlights: BTreeMap<usize, Vec<Highlight>>,
    selection: Option<Selection>,
    all_dirty: bool,
    dirty_lines: Vec<usize>,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    /// Create an empty buffer holding one empty line.
    pub fn new() -> Self {
        Self {
            lines: Rope::from_slice(&[Line::from_text("")]),
            params: WrapParams::default(),
            highlights: BTreeMap::new(),
            selection: None,
            all_dirty: true,
            dirty_lines: Vec::new(),
        }
    }

    /// Replace the entire content with plain text.
    pub fn set_text(&mut self, text: &str) {
        let lines: Vec<Line> = split_lines(text).into_iter().map(|l| Line::from_text(&l)).collect();
        self.lines = Rope::from_slice(&lines);
        self.highlights.clear();
        self.selection = None;
        self.all_dirty = true;
        self.dirty_lines.clear();
    }

    /// Replace the entire content with styled chunks. Chunk text may
    /// contain `\n`, which splits lines while preserving styles.
    pub fn set_styled_text(&mut self, chunks: Vec<Chunk>) {
        let mut lines: Vec<Line> = Vec::new();
        let mut current: Vec<Chunk> = Vec::new();
        for chunk in chunks {
            let mut rest = chunk.text.as_str();
            loop {
                match rest.find('\n') {
                    Some(pos) => {
                        let head = rest[..pos].trim_end_matches('\r');
                        if !head.is_empty() {
                            current.push(Chunk {
                                text: head.to_string(),
                                style: chunk.style,
                                link: chunk.link.clone(),
                            });
                        }
                        lines.push(Line::new(std::mem::take(&mut current)));
                        rest = &rest[pos + 1..];
                    }
                    None => {
                        if !rest.is_empty() {
                            current.push(Chunk {
                                text: rest.to_string(),
                                style: chunk.style,
                                link: chunk.link.clone(),
                            });
                        }
                        break;
                    }
                }
            }
        }
        lines.push(Line::new(current));
        self.lines = Rope::from_slice(&lines);
        self.highlights.clear();
        self.selection = None;
        self.all_dirty = true;
        self.dirty_lines.clear();
    }

    /// The full text, lines joined with `\n`.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut first = true;
        self.lines.for_each(|line| {
            if !first {
                out.push('\n');
            }
            out.push_str(&line.text());
            first = false;
        });
        out
    }

    /// Number of logical lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// The text of a logical line, or `None` if out of range.
    pub fn line_text(&self, row: usize) -> Option<String> {
        self.lines.get(row).map(Line::text)
    }

    /// Grapheme count of a logical line, or `None` if out of range.
    pub fn line_grapheme_len(&self, row: usize) -> Option<usize> {
        self.line_text(row)
            .map(|t| t.graphemes(true).count())
    }

    /// Set the wrap parameters and invalidate the wrap cache.
    ///
    /// A `width` of 0 disables width-bounded wrapping regardless of mode.
    pub fn wrap_to(&mut self, width: u16, mode: WrapMode, tab_width: u16) {
        let new = WrapParams {
            width,
            mode,
            tab_width: tab_width.max(1),
            east_asian: self.params.east_asian,
        };
        if new != self.params {
            self.params = new;
            self.all_dirty = true;
        }
    }

    /// Set how East Asian ambiguous characters are measured.
    pub fn set_east_asian_width(&mut self, east_asian: EastAsianWidth) {
        if self.params.east_asian != east_asian {
            self.params.east_asian = east_asian;
            self.all_dirty = true;
        }
    }

    /// How East Asian ambiguous characters are measured. Callers that
    /// position or size this buffer's text must measure with the same
    /// setting, or wrapped and painted widths drift apart.
    pub fn east_asian_width(&self) -> EastAsianWidth {
        self.params.east_asian
    }

    /// Number of virtual (wrapped) lines.
    pub fn virtual_line_count(&mut self) -> usize {
        self.ensure_wrapped();
        self.lines.summary().vlines
    }

    /// Map a visual row to `(logical_row, start_byte_offset)`.
    ///
    /// Out-of-range rows clamp to the last virtual line.
    pub fn visual_to_logical(&mut self, vrow: usize) -> (usize, usize) {
        self.ensure_wrapped();
        let total = self.lines.summary().vlines;
        if total == 0 {
            return (0, 0);
        }
        let vrow = vrow.min(total - 1);
        match self.lines.find_by_summary(|s| s.vlines > vrow) {
            Some((row, through)) => {
                let line_vlines = self
                    .lines
                    .get(row)
                    .map_or(1, |l| l.wrap.as_ref().map_or(1, Vec::len));
                let first_vrow = through.vlines - line_vlines;
                let seg_idx = vrow - first_vrow;
                let start = self
                    .lines
                    .get(row)
                    .and_then(|l| l.wrap.as_ref())
                    .and_then(|w| w.get(seg_idx))
                    .map_or(0, |s| s.start);
                (row, start)
            }
            None => (self.lines.len().saturating_sub(1), 0),
        }
    }

    /// Map a logical `(row, grapheme_col)` to `(visual_row, visual_col)`.
    pub fn logical_to_visual(&mut self, row: usize, col: usize) -> (usize, usize) {
        self.ensure_wrapped();
        let row = row.min(self.lines.len().saturating_sub(1));
        let vlines_before = match self.lines.find_by_summary(|s| s.lines > row) {
            Some((_, through)) => {
                let line_vlines = self
                    .lines
                    .get(row)
                    .map_or(1, |l| l.wrap.as_ref().map_or(1, Vec::len));
                through.vlines - line_vlines
            }
            None => 0,
        };

        let Some(line) = self.lines.get(row) else {
            return (vlines_before, 0);
        };
        let text = line.text();
        let byte = byte_of_grapheme_col(&text, col);
        let segs = line.wrap.as_deref().unwrap_or(&[]);
        let mut seg_idx = 0;
        for (i, seg) in segs.iter().enumerate() {
            if byte < seg.end || i == segs.len() - 1 {
                seg_idx = i;
                break;
            }
        }
        let seg_start = segs.get(seg_idx).map_or(0, |s| s.start);
        let vcol = calculate_text_width(
            text.as_bytes()
                .get(seg_start..byte)
                .unwrap_or(&[]),
            self.params.tab_width,
            true,
            self.params.east_asian,
        );
        (vlines_before + seg_idx, vcol)
    }

    /// Map a visual `(row, column)` position, as produced by a mouse hit,
    /// to logical `(row, grapheme_col)` coordinates.
    pub fn visual_position_to_logical(&mut self, vrow: usize, vcol: usize) -> (usize, usize) {
        let (row, start) = self.visual_to_logical(vrow);
        let Some(text) = self.line_text(row) else {
            return (row, 0);
        };
        let tab_width = self.params.tab_width;
        let east_asian = self.params.east_asian;
        let rest = text.as_bytes().get(start..).unwrap_or(&[]);
        let byte =
            start + crate::unicode::find_pos_by_width(rest, vcol, tab_width, true, false, east_asian);
        (row, grapheme_col_of_byte(&text, byte))
    }

    /// Insert text at a logical `(row, grapheme_col)` position.
    ///
    /// The text may contain newlines. Coordinates clamp to the valid
    /// range. Returns the cursor position after the inserted text.
    pub fn insert_at(&mut self, row: usize, col: usize, text: &str) -> (usize, usize) {
        let row = row.min(self.lines.len().saturating_sub(1));
        let Some(line) = self.lines.get(row) else {
            return (row, col);
        };
        let line_text = line.text();
        let byte = byte_of_grapheme_col(&line_text, col);
        let insert_lines = split_lines(text);

        if insert_lines.len() == 1 {
            let mut new_line = line.clone();
            splice_chunks(&mut new_line.chunks, byte, &insert_lines[0]);
            new_line.wrap = None;
            self.lines.replace(row, new_line);
            self.mark_dirty(row);
            let end_col = grapheme_col_of_byte(&line_text, byte)
                + insert_lines[0].graphemes(true).count();
            return (row, end_col);
        }

        // Multi-line insert: split the host line at the insertion point.
        let (head_chunks, tail_chunks) = split_chunks_at(&line.chunks, byte);
        let mut first = Line::new(head_chunks);
        let first_byte_len = first.byte_len();
        splice_chunks(&mut first.chunks, first_byte_len, &insert_lines[0]);
        self.lines.replace(row, first);
        self.mark_dirty(row);

        let mut insert_row = row + 1;
        for middle in &insert_lines[1..insert_lines.len() - 1] {
            self.lines.insert(insert_row, Line::from_text(middle));
            self.mark_dirty(insert_row);
            insert_row += 1;
        }

        let last_text = &insert_lines[insert_lines.len() - 1];
        let mut last = Line::new(tail_chunks);
        splice_chunks(&mut last.chunks, 0, last_text);
        self.lines.insert(insert_row, last);
        self.mark_dirty(insert_row);
        self.shift_highlights_down(row + 1, insert_lines.len() - 1);
        (insert_row, last_text.graphemes(true).count())
    }

    /// Delete the range between two logical `(row, grapheme_col)`
    /// positions. Coordinates clamp; reversed ranges are normalized.
    /// Returns the cursor position at the deletion point.
    pub fn delete_range(
        &mut self,
        start_row: usize,
        start_col: usize,
        end_row: usize,
        end_col: usize,
    ) -> (usize, usize) {
        let last = self.lines.len().saturating_sub(1);
        let (mut sr, mut sc, mut er, mut ec) = (
            start_row.min(last),
            start_col,
            end_row.min(last),
            end_col,
        );
        if (sr, sc) > (er, ec) {
            std::mem::swap(&mut sr, &mut er);
            std::mem::swap(&mut sc, &mut ec);
        }

        let Some(start_line) = self.lines.get(sr) else {
            return (sr, sc);
        };
        let start_text = start_line.text();
        let start_byte = byte_of_grapheme_col(&start_text, sc);

        if sr == er {
            let end_byte = byte_of_grapheme_col(&start_text, ec);
            if start_byte >= end_byte {
                return (sr, grapheme_col_of_byte(&start_text, start_byte));
            }
            let mut new_line = start_line.clone();
            remove_chunk_range(&mut new_line.chunks, start_byte, end_byte);
            new_line.wrap = None;
            self.lines.replace(sr, new_line);
            self.mark_dirty(sr);
            return (sr, grapheme_col_of_byte(&start_text, start_byte));
        }

        // Multi-line: keep start line head + end line tail, drop between.
        let Some(end_line) = self.lines.get(er) else {
            return (sr, sc);
        };
        let end_text = end_line.text();
        let end_byte = byte_of_grapheme_col(&end_text, ec);

        let (head, _) = split_chunks_at(&start_line.chunks, start_byte);
        let (_, tail) = split_chunks_at(&end_line.chunks, end_byte);
        let mut joined = Line::new(head);
        joined.chunks.extend(tail);
        joined.wrap = None;

        for row in (sr + 1..=er).rev() {
            self.lines.delete(row);
            self.highlights.remove(&row);
        }
        self.lines.replace(sr, joined);
        self.mark_dirty(sr);
        self.shift_highlights_up(er + 1, er - sr);
        (sr, grapheme_col_of_byte(&start_text, start_byte))
    }

    /// Add a highlight overlay to a logical line.
    pub fn add_highlight(&mut self, row: usize, highlight: Highlight) {
        self.highlights.entry(row).or_default().push(highlight);
    }

    /// Remove all highlights in a logical row range (end-exclusive).
    pub fn clear_highlights(&mut self, rows: std::ops::Range<usize>) {
        let keys: Vec<usize> = self
            .highlights
            .range(rows)
            .map(|(k, _)| *k)
            .collect();
        for k in keys {
            self.highlights.remove(&k);
        }
    }

    /// Set or clear the selection.
    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    /// The current selection.
    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// The selected text. Logical lines are joined with `\n`; in columnar
    /// mode each line contributes the grapheme-column rectangle between
    /// the selection's columns instead of the linear range.
    pub fn selected_text(&self, columnar: bool) -> String {
        let Some(sel) = self.selection else {
            return String::new();
        };
        if sel.is_collapsed() {
            return String::new();
        }
        let ((sr, sc), (er, ec)) = sel.ordered();
        let mut out = String::new();

        if columnar {
            let (lo, hi) = (sc.min(ec), sc.max(ec));
            for row in sr..=er {
                let Some(text) = self.line_text(row) else { continue };
                if row > sr {
                    out.push('\n');
                }
                let from = byte_of_grapheme_col(&text, lo);
                let to = byte_of_grapheme_col(&text, hi);
                out.push_str(text.get(from..to).unwrap_or(""));
            }
            return out;
        }

        for row in sr..=er {
            let Some(text) = self.line_text(row) else { continue };
            if row > sr {
                out.push('\n');
            }
            let from = if row == sr {
                byte_of_grapheme_col(&text, sc)
            } else {
                0
            };
            let to = if row == er {
                byte_of_grapheme_col(&text, ec)
            } else {
                text.len()
            };
            out.push_str(text.get(from..to).unwrap_or(""));
        }
        out
    }

    /// The styled chunks of one visual row, with highlight overlays and
    /// the selection applied. This is the unit the scene graph consumes.
    pub fn chunks_for_visual_row(
        &mut self,
        vrow: usize,
        registry: &StyleRegistry,
        selection_style: TextStyle,
    ) -> Vec<Chunk> {
        self.ensure_wrapped();
        let total = self.lines.summary().vlines;
        if total == 0 {
            return Vec::new();
        }
        let vrow = vrow.min(total - 1);
        let Some((row, through)) = self.lines.find_by_summary(|s| s.vlines > vrow) else {
            return Vec::new();
        };
        let Some(line) = self.lines.get(row) else {
            return Vec::new();
        };
        let segs: &[WrapSegment] = line.wrap.as_deref().unwrap_or(&[]);
        let first_vrow = through.vlines - segs.len().max(1);
        let seg_idx = (vrow - first_vrow).min(segs.len().saturating_sub(1));
        let line_text = line.text();
        let seg = segs.get(seg_idx).copied().unwrap_or(WrapSegment {
            start: 0,
            end: line_text.len(),
            width: 0,
        });

        let base = slice_chunks(&line.chunks, seg.start, seg.end);
        let overlays = self.overlays_for(row, registry, selection_style, &line_text);
        apply_overlays(base, seg.start, overlays)
    }

    // --- internal ---

    /// Overlay spans (byte ranges within the line) ordered by priority.
    fn overlays_for(
        &self,
        row: usize,
        registry: &StyleRegistry,
        selection_style: TextStyle,
        line_text: &str,
    ) -> Vec<(usize, usize, TextStyle, u8)> {
        let mut spans: Vec<(usize, usize, TextStyle, u8)> = Vec::new();
        if let Some(hls) = self.highlights.get(&row) {
            for hl in hls {
                let from = byte_of_grapheme_col(line_text, hl.start_col);
                let to = byte_of_grapheme_col(line_text, hl.end_col);
                if from < to {
                    spans.push((from, to, registry.style(hl.style_id), hl.priority));
                }
            }
        }
        if let Some(sel) = self.selection
            && !sel.is_collapsed()
        {
            let ((sr, sc), (er, ec)) = sel.ordered();
            if row >= sr && row <= er {
                let from = if row == sr {
                    byte_of_grapheme_col(line_text, sc)
                } else {
                    0
                };
                let to = if row == er {
                    byte_of_grapheme_col(line_text, ec)
                } else {
                    line_text.len()
                };
                if from < to {
                    // Selection outranks any syntax overlay.
                    spans.push((from, to, selection_style, u8::MAX));
                }
            }
        }
        spans.sort_by_key(|(_, _, _, p)| *p);
        spans
    }

    fn mark_dirty(&mut self, row: usize) {
        if !self.all_dirty {
            self.dirty_lines.push(row);
        }
    }

    /// Rebuild the wrap cache for dirty lines.
    fn ensure_wrapped(&mut self) {
        if self.all_dirty {
            for row in 0..self.lines.len() {
                self.rewrap_line(row);
            }
            self.all_dirty = false;
            self.dirty_lines.clear();
            return;
        }
        if self.dirty_lines.is_empty() {
            return;
        }
        let rows = std::mem::take(&mut self.dirty_lines);
        for row in rows {
            if row < self.lines.len() {
                self.rewrap_line(row);
            }
        }
    }

    fn rewrap_line(&mut self, row: usize) {
        let params = self.params;
        let Some(line) = self.lines.get(row) else {
            return;
        };
        let text = line.text();
        let segs = wrap_segments(&text, params);
        if let Some(line) = self.lines.get_mut(row) {
            line.wrap = Some(segs);
        }
        self.lines.refresh_index(row);
    }

    fn shift_highlights_down(&mut self, from_row: usize, by: usize) {
        if by == 0 {
            return;
        }
        let moved: Vec<(usize, Vec<Highlight>)> = self
            .highlights
            .range(from_row..)
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        for (k, _) in &moved {
            self.highlights.remove(k);
        }
        for (k, v) in moved {
            self.highlights.insert(k + by, v);
        }
    }

    fn shift_highlights_up(&mut self, from_row: usize, by: usize) {
        if by == 0 {
            return;
        }
        let moved: Vec<(usize, Vec<Highlight>)> = self
            .highlights
            .range(from_row..)
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        for (k, _) in &moved {
            self.highlights.remove(k);
        }
        for (k, v) in moved {
            self.highlights.insert(k.saturating_sub(by), v);
        }
    }
}

/// Split text into logical lines on `\n`, tolerating `\r\n`.
fn split_lines(text: &str) -> Vec<String> {
    let mut out: Vec<String> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect();
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

/// Compute wrap segments for a line of text under the given parameters.
fn wrap_segments(text: &str, params: WrapParams) -> Vec<WrapSegment> {
    let bytes = text.as_bytes();
    let full_width = calculate_text_width(bytes, params.tab_width, true, params.east_asian);
    if params.mode == WrapMode::None || params.width == 0 {
        return vec![WrapSegment {
            start: 0,
            end: bytes.len(),
            width: full_width,
        }];
    }

    let max_width = usize::from(params.width);
    let breaks = if params.mode == WrapMode::Word {
        find_wrap_breaks(bytes, WrapMode::Word, params.east_asian)
    } else {
        Vec::new()
    };

    let mut segs = Vec::new();
    let mut start = 0usize;
    while start < bytes.len() {
        let rest = &bytes[start..];
        let (fit, fit_width) =
            find_wrap_pos_by_width(rest, max_width, params.tab_width, true, params.east_asian);
        let mut end = start + fit;
        let mut width = fit_width;

        if end < bytes.len() && params.mode == WrapMode::Word {
            // Back up to the last word-break candidate inside the fit.
            if let Some(bk) = breaks
                .iter()
                .copied()
                .filter(|b| *b > start && *b <= end)
                .next_back()
            {
                if bk < end {
                    end = bk;
                    width = calculate_text_width(
                        &bytes[start..end],
                        params.tab_width,
                        true,
                        params.east_asian,
                    );
                }
            }
        }

        if end == start {
            // Defensive: always make progress.
            end = (start + 1).min(bytes.len());
            width = calculate_text_width(
                &bytes[start..end],
                params.tab_width,
                true,
                params.east_asian,
            );
        }

        segs.push(WrapSegment { start, end, width });
        start = end;
    }

    if segs.is_empty() {
        segs.push(WrapSegment {
            start: 0,
            end: 0,
            width: 0,
        });
    }
    segs
}

/// Byte offset of a grapheme column in `text`, clamped to the end.
fn byte_of_grapheme_col(text: &str, col: usize) -> usize {
    text.grapheme_indices(true)
        .nth(col)
        .map_or(text.len(), |(i, _)| i)
}

/// Grapheme column of a byte offset in `text`.
fn grapheme_col_of_byte(text: &str, byte: usize) -> usize {
    text.grapheme_indices(true)
        .take_while(|(i, _)| *i < byte)
        .count()
}

/// Insert text into a chunk list at a byte offset, inheriting the style
/// of the chunk at the insertion point.
fn splice_chunks(chunks: &mut Vec<Chunk>, byte: usize, text: &str) {
    if text.is_empty() {
        return;
    }
    if chunks.is_empty() {
        chunks.push(Chunk::new(text));
        return;
    }
    let mut offset = 0usize;
    for chunk in chunks.iter_mut() {
        let end = offset + chunk.text.len();
        if byte <= end {
            let local = byte - offset;
            chunk.text.insert_str(local, text);
            return;
        }
        offset = end;
    }
    // Past the end: extend the last chunk.
    if let Some(last) = chunks.last_mut() {
        last.text.push_str(text);
    }
}

/// Split a chunk list into head `[0, byte)` and tail `[byte, ..)`.
fn split_chunks_at(chunks: &[Chunk], byte: usize) -> (Vec<Chunk>, Vec<Chunk>) {
    let mut head = Vec::new();
    let mut tail = Vec::new();
    let mut offset = 0usize;
    for chunk in chunks {
        let end = offset + chunk.text.len();
        if end <= byte {
            head.push(chunk.clone());
        } else if offset >= byte {
            tail.push(chunk.clone());
        } else {
            let local = byte - offset;
            let mut left = chunk.clone();
            left.text.truncate(local);
            let mut right = chunk.clone();
            right.text = chunk.text[local..].to_string();
            if !left.text.is_empty() {
                head.push(left);
            }
            if !right.text.is_empty() {
                tail.push(right);
            }
        }
        offset = end;
    }
    (head, tail)
}

/// Remove the byte range `[from, to)` from a chunk list.
fn remove_chunk_range(chunks: &mut Vec<Chunk>, from: usize, to: usize) {
    let (head, rest) = split_chunks_at(chunks, from);
    let joined_rest: Vec<Chunk> = {
        let rest_full: Vec<Chunk> = rest;
        let skip = to - from;
        let (_, tail) = split_chunks_at(&rest_full, skip);
        tail
    };
    *chunks = head;
    chunks.extend(joined_rest);
}

/// Slice a chunk list to the byte range `[from, to)`.
fn slice_chunks(chunks: &[Chunk], from: usize, to: usize) -> Vec<Chunk> {
    let (_, rest) = split_chunks_at(chunks, from);
    let (mid, _) = split_chunks_at(&rest, to - from);
    mid
}

/// Apply overlay spans (byte ranges in line coordinates) to base chunks
/// that start at `seg_start` within the line.
fn apply_overlays(
    base: Vec<Chunk>,
    seg_start: usize,
    overlays: Vec<(usize, usize, TextStyle, u8)>,
) -> Vec<Chunk> {
    if overlays.is_empty() {
        return base;
    }

    // Collect every boundary that falls inside this segment.
    let seg_len: usize = base.iter().map(|c| c.text.len()).sum();
    let mut cuts: Vec<usize> = vec![0, seg_len];
    for (from, to, _, _) in &overlays {
        for b in [from, to] {
            let local = b.saturating_sub(seg_start).min(seg_len);
            cuts.push(local);
        }
    }
    cuts.sort_unstable();
    cuts.dedup();

    let mut out = Vec::new();
    for window in cuts.windows(2) {
        let (from, to) = (window[0], window[1]);
        if from == to {
            continue;
        }
        let piece = slice_chunks(&base, from, to);
        // Highest-priority overlay covering this span wins; overlays are
        // sorted ascending so later entries override earlier ones.
        let mut overlay_style: Option<TextStyle> = None;
        let abs_from = seg_start + from;
        for (o_from, o_to, style, _) in &overlays {
            if *o_from <= abs_from && abs_from < *o_to {
                overlay_style = Some(*style);
            }
        }
        match overlay_style {
            Some(style) => {
                for mut chunk in piece {
                    chunk.style = chunk.style.merge(&style);
                    out.push(chunk);
                }
            }
            None => out.extend(piece),
        }
    }
    out
}
