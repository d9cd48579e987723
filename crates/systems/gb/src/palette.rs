//! Colour lookup for both models.
//!
//! DMG: BGP/OBP0/OBP1 map a 2-bit colour index to one of four fixed shades.
//!
//! CGB: eight background and eight object palettes of four RGB555 colours,
//! stored in 64-byte colour RAMs. `$FF68 BCPS` / `$FF6A OCPS` select a byte
//! (bits 0-5) with optional auto-increment (bit 7); `$FF69 BCPD` /
//! `$FF6B OCPD` read and write the selected byte.

use serde::{Deserialize, Serialize};

/// White, light grey, dark grey, black.
pub const DMG_SHADES: [u32; 4] = [0xFFFFFFFF, 0xFFAAAAAA, 0xFF555555, 0xFF000000];

/// Shade for `color` (0-3) through a DMG palette register.
#[inline]
pub fn dmg_color(palette: u8, color: u8) -> u32 {
    DMG_SHADES[((palette >> ((color & 0x03) * 2)) & 0x03) as usize]
}

/// Expand a little-endian RGB555 value to ARGB8888.
pub fn rgb555_to_argb(value: u16) -> u32 {
    let expand = |c: u16| -> u32 {
        let c = (c & 0x1F) as u32;
        (c << 3) | (c >> 2)
    };
    let r = expand(value);
    let g = expand(value >> 5);
    let b = expand(value >> 10);
    0xFF00_0000 | (r << 16) | (g << 8) | b
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorRam {
    #[serde(with = "crate::serde_arrays")]
    data: [u8; 64],
    index: u8,
    auto_increment: bool,
}

impl Default for ColorRam {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorRam {
    /// Colour RAM starts out white.
    pub fn new() -> Self {
        Self {
            data: [0xFF; 64],
            index: 0,
            auto_increment: false,
        }
    }

    pub fn read_spec(&self) -> u8 {
        0x40 | ((self.auto_increment as u8) << 7) | self.index
    }

    pub fn write_spec(&mut self, val: u8) {
        self.index = val & 0x3F;
        self.auto_increment = val & 0x80 != 0;
    }

    pub fn read_data(&self) -> u8 {
        self.data[self.index as usize]
    }

    pub fn write_data(&mut self, val: u8) {
        self.data[self.index as usize] = val;
        if self.auto_increment {
            self.index = (self.index + 1) & 0x3F;
        }
    }

    /// ARGB colour `color` (0-3) of palette `palette` (0-7).
    pub fn color(&self, palette: u8, color: u8) -> u32 {
        let offset = ((palette & 0x07) as usize) * 8 + ((color & 0x03) as usize) * 2;
        let value = u16::from_le_bytes([self.data[offset], self.data[offset + 1]]);
        rgb555_to_argb(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dmg_palette_lookup() {
        // BGP = 0xE4: identity mapping
        for color in 0..4 {
            assert_eq!(dmg_color(0xE4, color), DMG_SHADES[color as usize]);
        }
        // BGP = 0x1B: reversed
        assert_eq!(dmg_color(0x1B, 0), DMG_SHADES[3]);
        assert_eq!(dmg_color(0x1B, 3), DMG_SHADES[0]);
    }

    #[test]
    fn test_rgb555_expansion() {
        assert_eq!(rgb555_to_argb(0x7FFF), 0xFFFFFFFF);
        assert_eq!(rgb555_to_argb(0x0000), 0xFF000000);
        assert_eq!(rgb555_to_argb(0x001F), 0xFFFF0000);
        assert_eq!(rgb555_to_argb(0x03E0), 0xFF00FF00);
        assert_eq!(rgb555_to_argb(0x7C00), 0xFF0000FF);
    }

    #[test]
    fn test_auto_increment() {
        let mut cram = ColorRam::new();
        cram.write_spec(0x80 | 0x08);
        cram.write_data(0x1F);
        cram.write_data(0x00);
        assert_eq!(cram.read_spec(), 0xC0 | 0x0A);
        assert_eq!(cram.color(1, 0), 0xFFFF0000);
    }

    #[test]
    fn test_no_increment_and_wrap() {
        let mut cram = ColorRam::new();
        cram.write_spec(0x05);
        cram.write_data(0x12);
        cram.write_data(0x34);
        assert_eq!(cram.read_data(), 0x34);
        assert_eq!(cram.read_spec(), 0x45);

        cram.write_spec(0xBF);
        cram.write_data(0x00);
        assert_eq!(cram.read_spec() & 0x3F, 0x00);
    }
}
