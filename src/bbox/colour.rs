use std::fmt;

use image::Rgba;
use rand::Rng;

use crate::errors::{BoxLensError, BoxLensResult};

/// A 24-bit RGB box colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxColour(u32);

impl BoxColour {
    pub const BLACK: BoxColour = BoxColour(0x000000);
    pub const WHITE: BoxColour = BoxColour(0xFFFFFF);

    /// Build from a packed `0xRRGGBB` value; bits above 24 are dropped.
    pub fn from_rgb_u32(rgb: u32) -> Self {
        Self(rgb & 0xFF_FFFF)
    }

    pub fn random() -> Self {
        Self(rand::rng().random_range(0..=0xFF_FFFF))
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> BoxLensResult<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BoxLensError::Config(format!("invalid colour '{hex}': expected #rrggbb")));
        }
        u32::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|e| BoxLensError::Config(format!("invalid colour '{hex}': {e}")))
    }

    pub fn to_hex(self) -> String {
        format!("#{:06x}", self.0)
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8, 255])
    }
}

impl fmt::Display for BoxColour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Supplies one colour per rendered box.
pub trait ColourSource {
    fn next_colour(&mut self) -> BoxColour;
}

impl<F: FnMut() -> BoxColour> ColourSource for F {
    fn next_colour(&mut self) -> BoxColour {
        self()
    }
}

/// Uniformly random, unseeded colours.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomColours;

impl ColourSource for RandomColours {
    fn next_colour(&mut self) -> BoxColour {
        BoxColour::random()
    }
}

/// Cycles through a fixed palette; an empty palette yields random colours.
#[derive(Debug, Clone)]
pub struct FixedColours {
    palette: Vec<BoxColour>,
    next: usize,
}

impl FixedColours {
    pub fn new(palette: Vec<BoxColour>) -> Self {
        Self { palette, next: 0 }
    }

    pub fn from_hex_list<S: AsRef<str>>(hexes: &[S]) -> BoxLensResult<Self> {
        let palette = hexes
            .iter()
            .map(|h| BoxColour::from_hex(h.as_ref()))
            .collect::<BoxLensResult<Vec<_>>>()?;
        Ok(Self::new(palette))
    }
}

impl ColourSource for FixedColours {
    fn next_colour(&mut self) -> BoxColour {
        if self.palette.is_empty() {
            return BoxColour::random();
        }
        let colour = self.palette[self.next % self.palette.len()];
        self.next += 1;
        colour
    }
}
