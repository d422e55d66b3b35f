//! RGBA colors shared by configuration, simulation and rendering

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// 8-bit straight-alpha RGBA color, laid out like an image pixel
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const BACKGROUND: Self = Self::rgb(15, 15, 25);
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    /// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    /// Same color with alpha scaled by `factor` (0-1)
    pub fn faded(self, factor: f32) -> Self {
        let a = (self.a as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    /// Brighten toward white by `amount` (0-1)
    pub fn lighten(self, amount: f32) -> Self {
        let t = amount.clamp(0.0, 1.0);
        let mix = |c: u8| (c as f32 + (255.0 - c as f32) * t).round() as u8;
        Self {
            r: mix(self.r),
            g: mix(self.g),
            b: mix(self.b),
            a: self.a,
        }
    }

    /// Rotate the hue by `hue_degrees` and scale the HSV value by
    /// `value_scale`, keeping the value in [0.3, 1]
    pub fn shifted(self, hue_degrees: f32, value_scale: f32) -> Self {
        if hue_degrees == 0.0 && value_scale == 1.0 {
            return self;
        }
        let (r, g, b) = (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        );
        let max = r.max(g).max(b);
        let delta = max - r.min(g).min(b);
        let s = if max > 0.0 { delta / max } else { 0.0 };
        let h = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };

        let h = (h + hue_degrees).rem_euclid(360.0);
        let v = (max * value_scale).clamp(0.3, 1.0);

        let c = v * s;
        let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
        let m = v - c;
        let (r, g, b) = match (h / 60.0) as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        Self::from_unit(r + m, g + m, b + m, self.a as f32 / 255.0)
    }

    /// Build from float channels in 0-1
    pub fn from_unit(r: f32, g: f32, b: f32, a: f32) -> Self {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::rgba(q(r), q(g), q(b), q(a))
    }
}

impl TryFrom<String> for Rgba {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgba::from_hex(&value).ok_or_else(|| format!("invalid hex color '{value}'"))
    }
}

impl From<Rgba> for String {
    fn from(color: Rgba) -> Self {
        color.to_hex()
    }
}

/// Default palette (TikTok brand colors)
pub fn default_palette() -> Vec<Rgba> {
    vec![
        Rgba::rgb(0xFF, 0x00, 0x50),
        Rgba::rgb(0x00, 0xF2, 0xEA),
        Rgba::rgb(0xFF, 0xFF, 0xFF),
        Rgba::rgb(0xFE, 0x2C, 0x55),
        Rgba::rgb(0x25, 0xF4, 0xEE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        assert_eq!(Rgba::from_hex("#FF0050"), Some(Rgba::rgb(255, 0, 80)));
        assert_eq!(Rgba::from_hex("00f2ea"), Some(Rgba::rgb(0, 242, 234)));
        assert_eq!(Rgba::from_hex("#00000080"), Some(Rgba::rgba(0, 0, 0, 128)));
        assert_eq!(Rgba::from_hex("#GG0000"), None);
        assert_eq!(Rgba::from_hex("#FFF"), None);
        assert_eq!(Rgba::from_hex("#ÉÉÉÉÉÉ"), None);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let json = serde_json::to_string(&Rgba::rgb(255, 0, 80)).unwrap();
        assert_eq!(json, "\"#FF0050\"");
        let back: Rgba = serde_json::from_str("\"#0F0F19\"").unwrap();
        assert_eq!(back, Rgba::BACKGROUND);
        assert!(serde_json::from_str::<Rgba>("\"nope\"").is_err());
    }

    #[test]
    fn test_faded_and_lighten() {
        assert_eq!(Rgba::WHITE.faded(0.5).a, 128);
        assert_eq!(Rgba::BLACK.lighten(1.0), Rgba::WHITE);
        assert_eq!(Rgba::BLACK.lighten(0.0), Rgba::BLACK);
    }

    #[test]
    fn test_hue_shift() {
        let red = Rgba::rgb(255, 0, 0);
        assert_eq!(red.shifted(0.0, 1.0), red);
        assert_eq!(red.shifted(120.0, 1.0), Rgba::rgb(0, 255, 0));
        assert_eq!(red.shifted(240.0, 1.0), Rgba::rgb(0, 0, 255));
        assert_eq!(red.shifted(360.0, 1.0), red);
        // Value is kept in [0.3, 1]
        assert_eq!(red.shifted(0.0, 0.1), Rgba::rgb(77, 0, 0));
        assert_eq!(red.shifted(0.0, 2.0), red);
    }
}
