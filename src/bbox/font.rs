/// Label fonts: TrueType files via `ab_glyph`, with a built-in 5×5 bitmap
/// font for when no font file can be loaded.
use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};

use crate::errors::{BoxLensError, BoxLensResult};

/// Something that can measure and draw a single line of label text.
pub trait LabelFont {
    /// Width and height in pixels of the rendered text.
    fn text_size(&self, text: &str) -> (u32, u32);

    fn draw_text(&self, canvas: &mut RgbaImage, colour: Rgba<u8>, x: i32, y: i32, text: &str);
}

/// Resolves a font at a given pixel size. Called once per render.
pub trait FontProvider: Send + Sync {
    fn load(&self, size: f32) -> Box<dyn LabelFont>;
}

// ── TrueType ────────────────────────────────────────────────────────────────

pub struct TrueTypeFont {
    font: FontArc,
    scale: PxScale,
}

impl TrueTypeFont {
    /// Parse font data. Collections (`.ttc`) use their first face.
    pub fn from_bytes(data: Vec<u8>, size: f32) -> BoxLensResult<Self> {
        let font = FontVec::try_from_vec_and_index(data, 0)
            .map_err(|e| BoxLensError::Font(e.to_string()))?;
        Ok(Self {
            font: FontArc::new(font),
            scale: PxScale::from(size),
        })
    }

    pub fn from_file(path: &Path, size: f32) -> BoxLensResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data, size)
            .map_err(|e| BoxLensError::Font(format!("{}: {e}", path.display())))
    }
}

impl LabelFont for TrueTypeFont {
    fn text_size(&self, text: &str) -> (u32, u32) {
        text_size(self.scale, &self.font, text)
    }

    fn draw_text(&self, canvas: &mut RgbaImage, colour: Rgba<u8>, x: i32, y: i32, text: &str) {
        draw_text_mut(canvas, colour, x, y, self.scale, &self.font, text);
    }
}

// ── Built-in bitmap font ────────────────────────────────────────────────────
// Each glyph: 5 rows, each row is a u8 where bit4=leftmost pixel, bit0=rightmost.
// Index 0–9 = digits '0'–'9', index 10-35 = letters 'A'–'Z'.
const FONT_5X5: [[u8; 5]; 36] = [
    [0b01110, 0b10001, 0b10001, 0b10001, 0b01110], // 0
    [0b00100, 0b01100, 0b00100, 0b00100, 0b01110], // 1
    [0b01110, 0b10001, 0b00110, 0b01000, 0b11111], // 2
    [0b11110, 0b00001, 0b00110, 0b00001, 0b11110], // 3
    [0b00110, 0b01010, 0b10010, 0b11111, 0b00010], // 4
    [0b11111, 0b10000, 0b11110, 0b00001, 0b11110], // 5
    [0b01110, 0b10000, 0b11110, 0b10001, 0b01110], // 6
    [0b11111, 0b00001, 0b00010, 0b00100, 0b00100], // 7
    [0b01110, 0b10001, 0b01110, 0b10001, 0b01110], // 8
    [0b01110, 0b10001, 0b01111, 0b00001, 0b01110], // 9
    [0b01110, 0b10001, 0b11111, 0b10001, 0b10001], // A
    [0b11110, 0b10001, 0b11110, 0b10001, 0b11110], // B
    [0b01110, 0b10000, 0b10000, 0b10000, 0b01110], // C
    [0b11100, 0b10010, 0b10001, 0b10010, 0b11100], // D
    [0b11111, 0b10000, 0b11110, 0b10000, 0b11111], // E
    [0b11111, 0b10000, 0b11110, 0b10000, 0b10000], // F
    [0b01110, 0b10000, 0b10011, 0b10001, 0b01110], // G
    [0b10001, 0b10001, 0b11111, 0b10001, 0b10001], // H
    [0b01110, 0b00100, 0b00100, 0b00100, 0b01110], // I
    [0b00111, 0b00010, 0b00010, 0b10010, 0b01100], // J
    [0b10001, 0b10010, 0b11100, 0b10010, 0b10001], // K
    [0b10000, 0b10000, 0b10000, 0b10000, 0b11111], // L
    [0b10001, 0b11011, 0b10101, 0b10001, 0b10001], // M
    [0b10001, 0b11001, 0b10101, 0b10011, 0b10001], // N
    [0b01110, 0b10001, 0b10001, 0b10001, 0b01110], // O
    [0b11110, 0b10001, 0b11110, 0b10000, 0b10000], // P
    [0b01110, 0b10001, 0b10101, 0b10010, 0b01101], // Q
    [0b11110, 0b10001, 0b11110, 0b10010, 0b10001], // R
    [0b01111, 0b10000, 0b01110, 0b00001, 0b11110], // S
    [0b11111, 0b00100, 0b00100, 0b00100, 0b00100], // T
    [0b10001, 0b10001, 0b10001, 0b10001, 0b01110], // U
    [0b10001, 0b10001, 0b10001, 0b01010, 0b00100], // V
    [0b10001, 0b10001, 0b10101, 0b11011, 0b10001], // W
    [0b10001, 0b01010, 0b00100, 0b01010, 0b10001], // X
    [0b10001, 0b01010, 0b00100, 0b00100, 0b00100], // Y
    [0b11111, 0b00010, 0b00100, 0b01000, 0b11111], // Z
];

/// Hollow square drawn for characters the bitmap font has no glyph for.
const PLACEHOLDER: [u8; 5] = [0b11111, 0b10001, 0b10001, 0b10001, 0b11111];

fn char_to_glyph(c: char) -> Option<[u8; 5]> {
    let c = c.to_ascii_uppercase();
    let glyph = match c {
        '0'..='9' => FONT_5X5[(c as u8 - b'0') as usize],
        'A'..='Z' => FONT_5X5[10 + (c as u8 - b'A') as usize],
        ':' => [0b00000, 0b00100, 0b00000, 0b00100, 0b00000],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        '-' => [0b00000, 0b00000, 0b01110, 0b00000, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00100],
        ' ' => [0b00000; 5],
        _ => return None,
    };
    Some(glyph)
}

/// ASCII-only fallback font. Lowercase is drawn as uppercase and anything
/// without a glyph (including all CJK text) becomes a placeholder square.
#[derive(Debug, Clone, Copy)]
pub struct BitmapFont {
    scale: u32,
}

impl BitmapFont {
    pub fn new(scale: u32) -> Self {
        Self { scale: scale.max(1) }
    }

    /// Pick a pixel scale so the glyphs are roughly half of `size` tall.
    pub fn for_size(size: f32) -> Self {
        Self::new((size / 10.0).round().max(1.0) as u32)
    }

    fn advance(&self) -> u32 {
        6 * self.scale
    }
}

impl LabelFont for BitmapFont {
    fn text_size(&self, text: &str) -> (u32, u32) {
        let n = text.chars().count() as u32;
        if n == 0 {
            return (0, 0);
        }
        (n * self.advance() - self.scale, 5 * self.scale)
    }

    fn draw_text(&self, canvas: &mut RgbaImage, colour: Rgba<u8>, x: i32, y: i32, text: &str) {
        let (w, h) = canvas.dimensions();
        let scale = self.scale as i32;
        for (i, c) in text.chars().enumerate() {
            let gx = x + i as i32 * self.advance() as i32;
            let glyph = char_to_glyph(c).unwrap_or(PLACEHOLDER);
            for (row, &bits) in glyph.iter().enumerate() {
                for bit in 0..5i32 {
                    if (bits >> (4 - bit)) & 1 == 0 {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            let px = gx + bit * scale + sx;
                            let py = y + row as i32 * scale + sy;
                            if px >= 0 && py >= 0 && (px as u32) < w && (py as u32) < h {
                                canvas.put_pixel(px as u32, py as u32, colour);
                            }
                        }
                    }
                }
            }
        }
    }
}

// ── Providers ───────────────────────────────────────────────────────────────

/// Always the built-in bitmap font; needs no filesystem access.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinFontProvider;

impl FontProvider for BuiltinFontProvider {
    fn load(&self, size: f32) -> Box<dyn LabelFont> {
        Box::new(BitmapFont::for_size(size))
    }
}

/// Tries each font file in order and falls back to the built-in font.
#[derive(Debug, Clone)]
pub struct FileFontProvider {
    candidates: Vec<PathBuf>,
}

impl FileFontProvider {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }
}

impl FontProvider for FileFontProvider {
    fn load(&self, size: f32) -> Box<dyn LabelFont> {
        for path in &self.candidates {
            if !path.exists() {
                continue;
            }
            match TrueTypeFont::from_file(path, size) {
                Ok(font) => {
                    tracing::debug!(path = %path.display(), size, "label font loaded");
                    return Box::new(font);
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "font unusable, trying next");
                }
            }
        }
        tracing::debug!("no font file usable, using built-in bitmap font");
        Box::new(BitmapFont::for_size(size))
    }
}
