//! Normalized RGBA color type with alpha blending and palette downgrade.
//!
//! Colors are stored as four `f32` channels in `[0, 1]` and converted to
//! 24-bit sRGB only at emit time. Terminals without truecolor support get
//! the nearest 256-color or 16-color approximation.

use crate::error::{Result, TesseraError};

/// A normalized RGBA color. All channels are in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rgba {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
    /// Alpha channel. 0 is fully transparent, 1 fully opaque.
    pub a: f32,
}

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Create a color from normalized channels.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color from normalized channels.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create an opaque color from 8-bit sRGB components.
    pub fn from_srgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: f32::from(r) / 255.0,
            g: f32::from(g) / 255.0,
            b: f32::from(b) / 255.0,
            a: 1.0,
        }
    }

    /// Convert to an 8-bit sRGB triplet, ignoring alpha.
    pub fn to_srgb(self) -> (u8, u8, u8) {
        (
            channel_to_u8(self.r),
            channel_to_u8(self.g),
            channel_to_u8(self.b),
        )
    }

    /// Returns true if this color is fully transparent.
    pub fn is_transparent(self) -> bool {
        self.a <= 0.0
    }

    /// Returns true if this color is fully opaque.
    pub fn is_opaque(self) -> bool {
        self.a >= 1.0
    }

    /// Straight-alpha blend of `self` over `dst`.
    ///
    /// Each color channel is `src*a + dst*(1-a)`; the result alpha is the
    /// standard over-composite `a_src + a_dst*(1-a_src)`.
    pub fn blend_over(self, dst: Rgba) -> Rgba {
        if self.is_opaque() {
            return self;
        }
        if self.is_transparent() {
            return dst;
        }
        let a = self.a;
        Rgba {
            r: self.r * a + dst.r * (1.0 - a),
            g: self.g * a + dst.g * (1.0 - a),
            b: self.b * a + dst.b * (1.0 - a),
            a: a + dst.a * (1.0 - a),
        }
    }

    /// Parse a color from a hex string (`#RGB` or `#RRGGBB`) or a named
    /// palette entry.
    ///
    /// The named palette is the CSS basic set (16 keywords) plus
    /// `grey`, `orange`, and `transparent`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.starts_with('#') {
            return Self::from_hex(trimmed);
        }
        Self::from_name(trimmed)
            .ok_or_else(|| TesseraError::Parse(format!("unknown color name: {trimmed:?}")))
    }

    /// Parse a hex color string like `"#rrggbb"` or `"#rgb"`.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        match hex.len() {
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16)
                    .map_err(|e| TesseraError::Parse(format!("invalid hex color: {e}")))?;
                let g = u8::from_str_radix(&hex[2..4], 16)
                    .map_err(|e| TesseraError::Parse(format!("invalid hex color: {e}")))?;
                let b = u8::from_str_radix(&hex[4..6], 16)
                    .map_err(|e| TesseraError::Parse(format!("invalid hex color: {e}")))?;
                Ok(Self::from_srgb(r, g, b))
            }
            3 => {
                let r = u8::from_str_radix(&hex[0..1], 16)
                    .map_err(|e| TesseraError::Parse(format!("invalid hex color: {e}")))?;
                let g = u8::from_str_radix(&hex[1..2], 16)
                    .map_err(|e| TesseraError::Parse(format!("invalid hex color: {e}")))?;
                let b = u8::from_str_radix(&hex[2..3], 16)
                    .map_err(|e| TesseraError::Parse(format!("invalid hex color: {e}")))?;
                Ok(Self::from_srgb(r * 17, g * 17, b * 17))
            }
            _ => Err(TesseraError::Parse(format!(
                "invalid hex color length: expected 3 or 6, got {}",
                hex.len()
            ))),
        }
    }

    /// Look up a color by CSS name. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        let (r, g, b) = match name.to_ascii_lowercase().as_str() {
            "black" => (0, 0, 0),
            "silver" => (192, 192, 192),
            "gray" | "grey" => (128, 128, 128),
            "white" => (255, 255, 255),
            "maroon" => (128, 0, 0),
            "red" => (255, 0, 0),
            "purple" => (128, 0, 128),
            "fuchsia" | "magenta" => (255, 0, 255),
            "green" => (0, 128, 0),
            "lime" => (0, 255, 0),
            "olive" => (128, 128, 0),
            "yellow" => (255, 255, 0),
            "navy" => (0, 0, 128),
            "blue" => (0, 0, 255),
            "teal" => (0, 128, 128),
            "aqua" | "cyan" => (0, 255, 255),
            "orange" => (255, 165, 0),
            "transparent" => return Some(Self::TRANSPARENT),
            _ => return None,
        };
        Some(Self::from_srgb(r, g, b))
    }
}

/// Clamp a normalized channel and convert to an 8-bit value.
fn channel_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert an sRGB triplet to the nearest 256-color palette index.
///
/// The 256-color palette is:
/// - 0-7: standard colors
/// - 8-15: bright colors
/// - 16-231: 6x6x6 color cube
/// - 232-255: grayscale ramp
pub fn rgb_to_256(r: u8, g: u8, b: u8) -> u8 {
    if r == g && g == b {
        if r < 8 {
            return 16; // black corner of the cube
        }
        if r > 248 {
            return 231; // white corner of the cube
        }
        return (((u16::from(r) - 8) * 24 / 240) as u8) + 232;
    }

    let ri = color_cube_index(r);
    let gi = color_cube_index(g);
    let bi = color_cube_index(b);
    16 + 36 * ri + 6 * gi + bi
}

/// Map an 8-bit color channel to a 6-level color cube index.
fn color_cube_index(val: u8) -> u8 {
    if val < 48 {
        0
    } else if val < 115 {
        1
    } else {
        ((u16::from(val) - 35) / 40) as u8
    }
}

/// Convert an sRGB triplet to the nearest of the 16 ANSI colors.
///
/// Returns the palette index 0-15 (0-7 standard, 8-15 bright).
pub fn rgb_to_16(r: u8, g: u8, b: u8) -> u8 {
    const PALETTE: [(u8, u8, u8); 16] = [
        (0, 0, 0),       // black
        (128, 0, 0),     // red
        (0, 128, 0),     // green
        (128, 128, 0),   // yellow
        (0, 0, 128),     // blue
        (128, 0, 128),   // magenta
        (0, 128, 128),   // cyan
        (192, 192, 192), // white
        (128, 128, 128), // bright black
        (255, 0, 0),     // bright red
        (0, 255, 0),     // bright green
        (255, 255, 0),   // bright yellow
        (0, 0, 255),     // bright blue
        (255, 0, 255),   // bright magenta
        (0, 255, 255),   // bright cyan
        (255, 255, 255), // bright white
    ];

    let mut best = 0u8;
    let mut best_dist = u32::MAX;
    for (idx, (cr, cg, cb)) in PALETTE.iter().enumerate() {
        let dr = i32::from(r) - i32::from(*cr);
        let dg = i32::from(g) - i32::from(*cg);
        let db = i32::from(b) - i32::from(*cb);
        let dist = (dr * dr + dg * dg + db * db) as u32;
        if dist < best_dist {
            best_dist = dist;
            best = idx as u8;
        }
    }
    best
}
