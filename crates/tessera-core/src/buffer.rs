//! Cell buffer — a 2D grid of terminal cells in parallel arrays.
//!
//! The buffer owns four parallel arrays (glyph, foreground, background,
//! attributes) plus a hyperlink id array, all of length `width * height`
//! in row-major order. All drawing primitives clip to the buffer bounds
//! and preserve the wide-glyph invariant: a 2-column glyph at `(x, y)`
//! always owns a continuation placeholder at `(x+1, y)`.

use crate::attr::Attributes;
use crate::cell::{Cell, CONTINUATION, NO_LINK};
use crate::color::Rgba;
use crate::geometry::Size;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Tab stop interval used by [`CellBuffer::draw_text`].
const TAB_STOP: u16 = 8;

/// Interned hyperlink URLs for one buffer. Id 0 is reserved for "no link".
#[derive(Clone, Debug, Default)]
pub struct LinkTable {
    urls: Vec<String>,
}

impl LinkTable {
    /// Intern a URL, returning its stable id (1-based).
    pub fn intern(&mut self, url: &str) -> u16 {
        if let Some(pos) = self.urls.iter().position(|u| u == url) {
            return (pos + 1) as u16;
        }
        self.urls.push(url.to_string());
        self.urls.len() as u16
    }

    /// Look up a URL by id. Returns `None` for [`NO_LINK`] or unknown ids.
    pub fn url(&self, id: u16) -> Option<&str> {
        if id == NO_LINK {
            return None;
        }
        self.urls.get(usize::from(id) - 1).map(String::as_str)
    }
}

/// Border glyph style for [`CellBuffer::draw_box`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BorderStyle {
    /// Light single lines.
    #[default]
    Single,
    /// Double lines.
    Double,
    /// Single lines with rounded corners.
    Rounded,
    /// Heavy single lines.
    Heavy,
}

// Arm bits for border glyphs.
const ARM_UP: u8 = 1;
const ARM_DOWN: u8 = 2;
const ARM_LEFT: u8 = 4;
const ARM_RIGHT: u8 = 8;

impl BorderStyle {
    /// The glyph for a given arm combination in this style.
    ///
    /// Arm bits: up=1, down=2, left=4, right=8. Combinations that do not
    /// correspond to one of the 11 box-drawing glyphs fall back to the
    /// horizontal line.
    fn glyph(self, arms: u8) -> char {
        let chart = self.chart();
        match arms {
            a if a == ARM_LEFT | ARM_RIGHT => chart[4],
            a if a == ARM_UP | ARM_DOWN => chart[5],
            a if a == ARM_DOWN | ARM_RIGHT => chart[0],
            a if a == ARM_DOWN | ARM_LEFT => chart[1],
            a if a == ARM_UP | ARM_RIGHT => chart[2],
            a if a == ARM_UP | ARM_LEFT => chart[3],
            a if a == ARM_UP | ARM_DOWN | ARM_RIGHT => chart[6],
            a if a == ARM_UP | ARM_DOWN | ARM_LEFT => chart[7],
            a if a == ARM_DOWN | ARM_LEFT | ARM_RIGHT => chart[8],
            a if a == ARM_UP | ARM_LEFT | ARM_RIGHT => chart[9],
            a if a == ARM_UP | ARM_DOWN | ARM_LEFT | ARM_RIGHT => chart[10],
            _ => chart[4],
        }
    }

    /// The 11 glyphs of this style in the order:
    /// top-left, top-right, bottom-left, bottom-right, horizontal,
    /// vertical, left-tee, right-tee, top-tee, bottom-tee, cross.
    const fn chart(self) -> [char; 11] {
        match self {
            Self::Single => ['┌', '┐', '└', '┘', '─', '│', '├', '┤', '┬', '┴', '┼'],
            Self::Double => ['╔', '╗', '╚', '╝', '═', '║', '╠', '╣', '╦', '╩', '╬'],
            Self::Rounded => ['╭', '╮', '╰', '╯', '─', '│', '├', '┤', '┬', '┴', '┼'],
            Self::Heavy => ['┏', '┓', '┗', '┛', '━', '┃', '┣', '┫', '┳', '┻', '╋'],
        }
    }
}

/// Look up the arm bits of an existing glyph across all border styles.
fn border_arms(ch: char) -> Option<u8> {
    const ARMS: [u8; 11] = [
        ARM_DOWN | ARM_RIGHT,
        ARM_DOWN | ARM_LEFT,
        ARM_UP | ARM_RIGHT,
        ARM_UP | ARM_LEFT,
        ARM_LEFT | ARM_RIGHT,
        ARM_UP | ARM_DOWN,
        ARM_UP | ARM_DOWN | ARM_RIGHT,
        ARM_UP | ARM_DOWN | ARM_LEFT,
        ARM_DOWN | ARM_LEFT | ARM_RIGHT,
        ARM_UP | ARM_LEFT | ARM_RIGHT,
        ARM_UP | ARM_DOWN | ARM_LEFT | ARM_RIGHT,
    ];
    for style in [
        BorderStyle::Single,
        BorderStyle::Double,
        BorderStyle::Rounded,
        BorderStyle::Heavy,
    ] {
        let chart = style.chart();
        if let Some(pos) = chart.iter().position(|c| *c == ch) {
            return Some(ARMS[pos]);
        }
    }
    None
}

/// A 2D grid of terminal cells representing one frame of terminal content.
#[derive(Clone, Debug)]
pub struct CellBuffer {
    width: u16,
    height: u16,
    chars: Vec<char>,
    fg: Vec<Rgba>,
    bg: Vec<Rgba>,
    attrs: Vec<Attributes>,
    links: Vec<u16>,
    link_table: LinkTable,
}

impl CellBuffer {
    /// Create a new buffer filled with blank cells.
    pub fn new(size: Size) -> Self {
        let len = usize::from(size.width) * usize::from(size.height);
        Self {
            width: size.width,
            height: size.height,
            chars: vec![' '; len],
            fg: vec![Rgba::WHITE; len],
            bg: vec![Rgba::TRANSPARENT; len],
            attrs: vec![Attributes::empty(); len],
            links: vec![NO_LINK; len],
            link_table: LinkTable::default(),
        }
    }

    /// Get the buffer dimensions.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Get the buffer width.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Get the buffer height.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// The hyperlink table for this buffer.
    pub fn link_table(&self) -> &LinkTable {
        &self.link_table
    }

    /// Intern a hyperlink URL into this buffer's link table.
    pub fn intern_link(&mut self, url: &str) -> u16 {
        self.link_table.intern(url)
    }

    /// Set every cell to a space over the given background.
    pub fn clear(&mut self, bg: Rgba) {
        self.chars.fill(' ');
        self.fg.fill(Rgba::WHITE);
        self.bg.fill(bg);
        self.attrs.fill(Attributes::empty());
        self.links.fill(NO_LINK);
    }

    /// Resize the buffer. Contents are lost (filled with blanks).
    pub fn resize(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
        let len = usize::from(size.width) * usize::from(size.height);
        self.chars.clear();
        self.chars.resize(len, ' ');
        self.fg.clear();
        self.fg.resize(len, Rgba::WHITE);
        self.bg.clear();
        self.bg.resize(len, Rgba::TRANSPARENT);
        self.attrs.clear();
        self.attrs.resize(len, Attributes::empty());
        self.links.clear();
        self.links.resize(len, NO_LINK);
    }

    /// Get the cell at `(x, y)`, or `None` if out of bounds.
    pub fn get(&self, x: u16, y: u16) -> Option<Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = self.index(x, y);
        Some(Cell {
            ch: self.chars[idx],
            fg: self.fg[idx],
            bg: self.bg[idx],
            attrs: self.attrs[idx],
            link: self.links[idx],
        })
    }

    /// Set a cell at `(x, y)`. If the glyph is wide, the next cell becomes
    /// its continuation placeholder. No-op if out of bounds.
    ///
    /// Wide-glyph edge cases:
    /// - Writing over a continuation blanks the wide glyph to its left.
    /// - Writing over a wide glyph blanks its old continuation.
    /// - A wide glyph whose continuation would fall past the last column
    ///   is skipped (the cell is blanked instead).
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if x >= self.width || y >= self.height {
            return;
        }

        let is_wide = cell.is_wide();
        let idx = self.index(x, y);

        if is_wide && x + 1 >= self.width {
            self.write_raw(idx, Cell::blank_over(cell.bg));
            return;
        }

        // Blank the wide glyph whose continuation we are about to overwrite.
        if self.chars[idx] == CONTINUATION && x > 0 {
            let prev = self.index(x - 1, y);
            let bg = self.bg[prev];
            self.write_raw(prev, Cell::blank_over(bg));
        }

        // Blank the old continuation if we overwrite a wide glyph.
        if char_is_wide(self.chars[idx]) && x + 1 < self.width {
            let next = self.index(x + 1, y);
            let bg = self.bg[next];
            self.write_raw(next, Cell::blank_over(bg));
        }

        self.write_raw(idx, cell);

        if is_wide {
            let next_x = x + 1;
            let next = self.index(next_x, y);
            // If the continuation lands on another wide glyph's first half,
            // that glyph loses its own continuation too.
            if char_is_wide(self.chars[next]) && next_x + 1 < self.width {
                let after = self.index(next_x + 1, y);
                let bg = self.bg[after];
                self.write_raw(after, Cell::blank_over(bg));
            }
            let mut cont = Cell::continuation(cell.fg, cell.bg);
            cont.attrs = cell.attrs;
            cont.link = cell.link;
            self.write_raw(next, cont);
        }
    }

    /// Blend a color into the backgrounds of a rectangle, clipped to the
    /// buffer. Fully clipped or zero-sized rectangles are silent no-ops.
    pub fn fill_rect(&mut self, x: u16, y: u16, w: u16, h: u16, color: Rgba) {
        if w == 0 || h == 0 || x >= self.width || y >= self.height {
            return;
        }
        let x_end = x.saturating_add(w).min(self.width);
        let y_end = y.saturating_add(h).min(self.height);
        for row in y..y_end {
            for col in x..x_end {
                let idx = self.index(col, row);
                if color.is_opaque() {
                    // An opaque fill covers whatever glyph was there.
                    self.write_raw(idx, Cell::blank_over(color));
                } else {
                    self.bg[idx] = color.blend_over(self.bg[idx]);
                }
            }
        }
        // An opaque fill may have cut a wide glyph in half at either edge.
        if color.is_opaque() {
            for row in y..y_end {
                self.repair_wide_pair(x, row);
                self.repair_wide_pair(x_end, row);
            }
        }
    }

    /// Draw text at `(x, y)` walking grapheme clusters left to right.
    ///
    /// Drawing stops at the buffer's right edge; the caller pre-splits text
    /// that should wrap. TAB advances to the next tab stop without writing;
    /// LF stops the draw; other control characters render as U+FFFD.
    pub fn draw_text(
        &mut self,
        text: &str,
        x: u16,
        y: u16,
        fg: Rgba,
        bg: Option<Rgba>,
        attrs: Attributes,
    ) {
        if y >= self.height {
            return;
        }
        let bg = bg.unwrap_or(Rgba::TRANSPARENT);
        let mut col = x;

        for grapheme in text.graphemes(true) {
            if col >= self.width {
                break;
            }
            if grapheme == "\n" {
                break;
            }
            if grapheme == "\t" {
                col = (col / TAB_STOP + 1) * TAB_STOP;
                continue;
            }

            let mut ch = first_scalar(grapheme);
            let mut width = UnicodeWidthStr::width(grapheme).min(2);
            if width == 0 {
                // Zero-width clusters occupy no cell.
                continue;
            }
            if ch.is_control() {
                ch = '\u{FFFD}';
                width = 1;
            }

            if col + width as u16 > self.width {
                break;
            }

            let mut cell = Cell::new(ch, fg, bg, attrs);
            if !bg.is_opaque() {
                // Preserve whatever background is already under the glyph.
                if let Some(existing) = self.get(col, y) {
                    cell.bg = bg.blend_over(existing.bg);
                }
            }
            self.set(col, y, cell);
            col += width as u16;
        }
    }

    /// Attach a hyperlink to a horizontal run of cells.
    pub fn annotate_link(&mut self, x: u16, y: u16, len: u16, url: &str) {
        if y >= self.height || x >= self.width || len == 0 {
            return;
        }
        let id = self.intern_link(url);
        let end = x.saturating_add(len).min(self.width);
        for col in x..end {
            let idx = self.index(col, y);
            self.links[idx] = id;
        }
    }

    /// Draw a rectangular border, clipped to the buffer.
    ///
    /// Where an edge lands on an existing border glyph the two are merged
    /// into the matching tee or cross, so adjacent boxes share clean joins.
    /// `fill` blends into the interior background when given.
    pub fn draw_box(
        &mut self,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        style: BorderStyle,
        color: Rgba,
        fill: Option<Rgba>,
    ) {
        if w < 2 || h < 2 || x >= self.width || y >= self.height {
            return;
        }
        let right = x.saturating_add(w) - 1;
        let bottom = y.saturating_add(h) - 1;

        if let Some(fill_color) = fill
            && w > 2
            && h > 2
        {
            self.fill_rect(x + 1, y + 1, w - 2, h - 2, fill_color);
        }

        self.put_border(x, y, ARM_DOWN | ARM_RIGHT, style, color);
        self.put_border(right, y, ARM_DOWN | ARM_LEFT, style, color);
        self.put_border(x, bottom, ARM_UP | ARM_RIGHT, style, color);
        self.put_border(right, bottom, ARM_UP | ARM_LEFT, style, color);
        for col in x + 1..right {
            self.put_border(col, y, ARM_LEFT | ARM_RIGHT, style, color);
            self.put_border(col, bottom, ARM_LEFT | ARM_RIGHT, style, color);
        }
        for row in y + 1..bottom {
            self.put_border(x, row, ARM_UP | ARM_DOWN, style, color);
            self.put_border(right, row, ARM_UP | ARM_DOWN, style, color);
        }
    }

    /// Write one border glyph, merging arms with any border glyph already
    /// in the cell.
    fn put_border(&mut self, x: u16, y: u16, arms: u8, style: BorderStyle, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.index(x, y);
        let merged = match border_arms(self.chars[idx]) {
            Some(existing) => existing | arms,
            None => arms,
        };
        let bg = self.bg[idx];
        self.set(
            x,
            y,
            Cell::new(style.glyph(merged), color, bg, Attributes::empty()),
        );
    }

    /// Composite another buffer onto this one at `(dst_x, dst_y)`.
    ///
    /// Foreground and background are straight-alpha blended separately;
    /// a non-empty source attribute set replaces the destination's. Blank
    /// fully-transparent source cells leave the destination untouched.
    /// The source is clipped to the overlap.
    pub fn blend(&mut self, src: &CellBuffer, dst_x: u16, dst_y: u16) {
        let full = crate::geometry::Rect::new(0, 0, self.width, self.height);
        self.blend_clipped(src, dst_x, dst_y, full);
    }

    /// Composite another buffer onto this one, restricted to a clip
    /// rectangle in destination coordinates. Used by the scene compositor
    /// so a node can never paint outside its ancestors' bounds.
    pub fn blend_clipped(
        &mut self,
        src: &CellBuffer,
        dst_x: u16,
        dst_y: u16,
        clip: crate::geometry::Rect,
    ) {
        let cols = src.width.min(self.width.saturating_sub(dst_x));
        let rows = src.height.min(self.height.saturating_sub(dst_y));

        for sy in 0..rows {
            for sx in 0..cols {
                if !clip.contains(crate::geometry::Position::new(dst_x + sx, dst_y + sy)) {
                    continue;
                }
                let s_idx = src.index(sx, sy);
                let s_ch = src.chars[s_idx];
                if s_ch == CONTINUATION {
                    continue; // written by its wide-left neighbor
                }
                let s_bg = src.bg[s_idx];
                let s_fg = src.fg[s_idx];
                let s_attrs = src.attrs[s_idx];
                let s_link = src.links[s_idx];
                let transparent_blank = s_ch == ' '
                    && s_bg.is_transparent()
                    && s_attrs.is_empty()
                    && s_link == NO_LINK;
                if transparent_blank {
                    continue;
                }

                let dx = dst_x + sx;
                let dy = dst_y + sy;
                let Some(dst) = self.get(dx, dy) else { continue };

                let see_through = s_ch == ' ' && !s_bg.is_opaque();
                let mut out = Cell {
                    ch: if see_through { dst.ch } else { s_ch },
                    fg: if see_through {
                        dst.fg
                    } else {
                        s_fg.blend_over(dst.fg)
                    },
                    bg: s_bg.blend_over(dst.bg),
                    attrs: if s_attrs.is_empty() { dst.attrs } else { s_attrs },
                    link: dst.link,
                };
                if s_link != NO_LINK
                    && let Some(url) = src.link_table.url(s_link)
                {
                    let url = url.to_string();
                    out.link = self.intern_link(&url);
                }
                if see_through && dst.ch == CONTINUATION {
                    // Don't resurrect a continuation as a standalone glyph.
                    out.ch = ' ';
                }
                self.set(dx, dy, out);
            }
        }
    }

    /// Compute the differences between this buffer and a previous frame.
    ///
    /// If the sizes differ every cell is reported (full redraw).
    pub fn diff(&self, previous: &CellBuffer) -> Vec<CellChange> {
        if self.width != previous.width || self.height != previous.height {
            return self.full_diff();
        }

        let mut changes = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = self.index(x, y);
                let same = self.chars[idx] == previous.chars[idx]
                    && self.fg[idx] == previous.fg[idx]
                    && self.bg[idx] == previous.bg[idx]
                    && self.attrs[idx] == previous.attrs[idx]
                    && self.link_table.url(self.links[idx])
                        == previous.link_table.url(previous.links[idx]);
                if !same {
                    changes.push(CellChange {
                        x,
                        y,
                        cell: Cell {
                            ch: self.chars[idx],
                            fg: self.fg[idx],
                            bg: self.bg[idx],
                            attrs: self.attrs[idx],
                            link: self.links[idx],
                        },
                    });
                }
            }
        }
        changes
    }

    /// Generate changes for every cell (used when sizes differ).
    fn full_diff(&self) -> Vec<CellChange> {
        let mut changes = Vec::with_capacity(self.chars.len());
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = self.index(x, y);
                changes.push(CellChange {
                    x,
                    y,
                    cell: Cell {
                        ch: self.chars[idx],
                        fg: self.fg[idx],
                        bg: self.bg[idx],
                        attrs: self.attrs[idx],
                        link: self.links[idx],
                    },
                });
            }
        }
        changes
    }

    /// Write a cell into the arrays without wide-glyph bookkeeping.
    fn write_raw(&mut self, idx: usize, cell: Cell) {
        self.chars[idx] = cell.ch;
        self.fg[idx] = cell.fg;
        self.bg[idx] = cell.bg;
        self.attrs[idx] = cell.attrs;
        self.links[idx] = cell.link;
    }

    /// If the cell at `x - 1` is a wide glyph whose continuation at `x` was
    /// overwritten (or vice versa), blank the orphan half.
    fn repair_wide_pair(&mut self, x: u16, y: u16) {
        if x == 0 || x >= self.width {
            return;
        }
        let left = self.index(x - 1, y);
        let here = self.index(x, y);
        if char_is_wide(self.chars[left]) && self.chars[here] != CONTINUATION {
            let bg = self.bg[left];
            self.write_raw(left, Cell::blank_over(bg));
        }
        if self.chars[here] == CONTINUATION && !char_is_wide(self.chars[left]) {
            let bg = self.bg[here];
            self.write_raw(here, Cell::blank_over(bg));
        }
    }

    /// Convert `(x, y)` to a linear index.
    fn index(&self, x: u16, y: u16) -> usize {
        usize::from(y) * usize::from(self.width) + usize::from(x)
    }
}

/// Display width test for a bare codepoint.
fn char_is_wide(ch: char) -> bool {
    use unicode_width::UnicodeWidthChar;
    ch != CONTINUATION && ch.width().unwrap_or(1) >= 2
}

/// The first scalar of a grapheme cluster.
fn first_scalar(grapheme: &str) -> char {
    grapheme.chars().next().unwrap_or(' ')
}

/// A single cell change: position + new cell value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellChange {
    /// Column position.
    pub x: u16,
    /// Row position.
    pub y: u16,
    /// New cell value.
    pub cell: Cell,
}
