//! Half-block pixel encoding — two vertical pixels per terminal cell.
//!
//! A foreign RGBA raster is resolved into cells using the upper/lower
//! half-block glyphs: the top pixel becomes the foreground of `▀`, the
//! bottom pixel its background. Uniform cells collapse to `█` or a plain
//! background; fully transparent cells stay empty.

use crate::attr::Attributes;
use crate::buffer::CellBuffer;
use crate::cell::Cell;
use crate::color::Rgba;

/// How the source raster maps to cell rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HalfBlockAlgorithm {
    /// The raster has two pixel rows per cell row; each cell samples its
    /// top and bottom pixel.
    #[default]
    Standard,
    /// The caller already averaged vertical pixel pairs; the raster has
    /// one pixel row per cell row.
    PreSqueezed,
}

/// Read one RGBA8 pixel from a raster. Out-of-range reads are transparent.
fn pixel_at(src: &[u8], src_w: u16, x: u16, y: u16) -> Rgba {
    let idx = (usize::from(y) * usize::from(src_w) + usize::from(x)) * 4;
    if idx + 3 >= src.len() {
        return Rgba::TRANSPARENT;
    }
    let mut c = Rgba::from_srgb(src[idx], src[idx + 1], src[idx + 2]);
    c.a = f32::from(src[idx + 3]) / 255.0;
    c
}

/// Resolve a top/bottom pixel pair to a cell.
fn resolve_pair(top: Rgba, bottom: Rgba) -> Cell {
    let top_visible = !top.is_transparent();
    let bottom_visible = !bottom.is_transparent();

    match (top_visible, bottom_visible) {
        (false, false) => Cell::blank(),
        (true, false) => Cell::new('▀', top, Rgba::TRANSPARENT, Attributes::empty()),
        (false, true) => Cell::new('▄', bottom, Rgba::TRANSPARENT, Attributes::empty()),
        (true, true) => {
            if top == bottom {
                if top.is_opaque() {
                    Cell::new('█', top, top, Attributes::empty())
                } else {
                    Cell::new(' ', top, top, Attributes::empty())
                }
            } else {
                Cell::new('▀', top, bottom, Attributes::empty())
            }
        }
    }
}

impl CellBuffer {
    /// Encode an RGBA8 raster into cells at `(x, y)` using half-block
    /// glyphs.
    ///
    /// `src` is tightly packed RGBA8, `src_w` pixels per row. Under
    /// [`HalfBlockAlgorithm::Standard`] the raster holds two pixel rows per
    /// cell row; under [`HalfBlockAlgorithm::PreSqueezed`] one. The blit
    /// clips to the buffer and is idempotent for identical source pixels.
    pub fn super_sample_blit(
        &mut self,
        src: &[u8],
        src_w: u16,
        src_h: u16,
        x: u16,
        y: u16,
        algorithm: HalfBlockAlgorithm,
    ) {
        if src_w == 0 || src_h == 0 {
            return;
        }
        let cell_rows = match algorithm {
            HalfBlockAlgorithm::Standard => src_h.div_ceil(2),
            HalfBlockAlgorithm::PreSqueezed => src_h,
        };

        for row in 0..cell_rows {
            let dy = y.saturating_add(row);
            if dy >= self.height() {
                break;
            }
            for col in 0..src_w {
                let dx = x.saturating_add(col);
                if dx >= self.width() {
                    break;
                }
                let cell = match algorithm {
                    HalfBlockAlgorithm::Standard => {
                        let top = pixel_at(src, src_w, col, row * 2);
                        let bottom = if row * 2 + 1 < src_h {
                            pixel_at(src, src_w, col, row * 2 + 1)
                        } else {
                            Rgba::TRANSPARENT
                        };
                        resolve_pair(top, bottom)
                    }
                    HalfBlockAlgorithm::PreSqueezed => {
                        let c = pixel_at(src, src_w, col, row);
                        resolve_pair(c, c)
                    }
                };
                if cell.is_blank() && cell.bg.is_transparent() {
                    continue; // transparent pixels leave the buffer untouched
                }
                self.set(dx, dy, cell);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;

    fn px(r: u8, g: u8, b: u8, a: u8) -> [u8; 4] {
        [r, g, b, a]
    }

    fn raster(pixels: &[[u8; 4]]) -> Vec<u8> {
        pixels.iter().flatten().copied().collect()
    }

    #[test]
    fn uniform_opaque_pair_is_full_block() {
        let mut buf = CellBuffer::new(Size::new(2, 2));
        let src = raster(&[px(255, 0, 0, 255), px(255, 0, 0, 255)]);
        buf.super_sample_blit(&src, 1, 2, 0, 0, HalfBlockAlgorithm::Standard);
        let c = buf.get(0, 0);
        assert_eq!(c.map(|c| c.ch), Some('█'));
        assert_eq!(c.map(|c| c.fg.to_srgb()), Some((255, 0, 0)));
    }

    #[test]
    fn distinct_pair_is_upper_half_block() {
        let mut buf = CellBuffer::new(Size::new(1, 1));
        let src = raster(&[px(255, 0, 0, 255), px(0, 0, 255, 255)]);
        buf.super_sample_blit(&src, 1, 2, 0, 0, HalfBlockAlgorithm::Standard);
        let c = buf.get(0, 0);
        assert_eq!(c.map(|c| c.ch), Some('▀'));
        assert_eq!(c.map(|c| c.fg.to_srgb()), Some((255, 0, 0)));
        assert_eq!(c.map(|c| c.bg.to_srgb()), Some((0, 0, 255)));
    }

    #[test]
    fn transparent_top_is_lower_half_block() {
        let mut buf = CellBuffer::new(Size::new(1, 1));
        let src = raster(&[px(0, 0, 0, 0), px(0, 255, 0, 255)]);
        buf.super_sample_blit(&src, 1, 2, 0, 0, HalfBlockAlgorithm::Standard);
        let c = buf.get(0, 0);
        assert_eq!(c.map(|c| c.ch), Some('▄'));
        assert_eq!(c.map(|c| c.fg.to_srgb()), Some((0, 255, 0)));
    }

    #[test]
    fn transparent_pair_leaves_cell_alone() {
        let mut buf = CellBuffer::new(Size::new(1, 1));
        buf.draw_text("x", 0, 0, Rgba::WHITE, None, Attributes::empty());
        let src = raster(&[px(0, 0, 0, 0), px(0, 0, 0, 0)]);
        buf.super_sample_blit(&src, 1, 2, 0, 0, HalfBlockAlgorithm::Standard);
        assert_eq!(buf.get(0, 0).map(|c| c.ch), Some('x'));
    }

    #[test]
    fn pre_squeezed_one_pixel_per_cell() {
        let mut buf = CellBuffer::new(Size::new(2, 1));
        let src = raster(&[px(10, 20, 30, 255), px(40, 50, 60, 255)]);
        buf.super_sample_blit(&src, 2, 1, 0, 0, HalfBlockAlgorithm::PreSqueezed);
        assert_eq!(buf.get(0, 0).map(|c| c.fg.to_srgb()), Some((10, 20, 30)));
        assert_eq!(buf.get(1, 0).map(|c| c.fg.to_srgb()), Some((40, 50, 60)));
        assert_eq!(buf.get(0, 0).map(|c| c.ch), Some('█'));
    }

    #[test]
    fn blit_is_idempotent() {
        let mut buf = CellBuffer::new(Size::new(2, 1));
        let src = raster(&[
            px(1, 2, 3, 255),
            px(9, 8, 7, 255),
            px(4, 5, 6, 255),
            px(6, 5, 4, 255),
        ]);
        buf.super_sample_blit(&src, 2, 2, 0, 0, HalfBlockAlgorithm::Standard);
        let first: Vec<_> = (0..2).map(|x| buf.get(x, 0)).collect();
        buf.super_sample_blit(&src, 2, 2, 0, 0, HalfBlockAlgorithm::Standard);
        let second: Vec<_> = (0..2).map(|x| buf.get(x, 0)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn blit_clips_to_buffer() {
        let mut buf = CellBuffer::new(Size::new(1, 1));
        let src = raster(&[
            px(255, 0, 0, 255),
            px(255, 0, 0, 255),
            px(255, 0, 0, 255),
            px(255, 0, 0, 255),
        ]);
        buf.super_sample_blit(&src, 2, 2, 0, 0, HalfBlockAlgorithm::Standard);
        assert_eq!(buf.get(0, 0).map(|c| c.ch), Some('█'));
    }

    #[test]
    fn odd_height_bottom_row_transparent() {
        let mut buf = CellBuffer::new(Size::new(1, 2));
        let src = raster(&[
            px(255, 0, 0, 255),
            px(255, 0, 0, 255),
            px(0, 255, 0, 255), // orphan top pixel of the second cell row
        ]);
        buf.super_sample_blit(&src, 1, 3, 0, 0, HalfBlockAlgorithm::Standard);
        assert_eq!(buf.get(0, 1).map(|c| c.ch), Some('▀'));
        assert_eq!(buf.get(0, 1).map(|c| c.fg.to_srgb()), Some((0, 255, 0)));
    }
}
