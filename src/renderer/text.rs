//! Anti-aliased bitmap text using noto-sans-mono-bitmap
//!
//! Glyphs are blitted with their intensity as coverage, scaled up by an
//! integer factor so text keeps its size at any `render_scale`.

use glam::Vec2;
use noto_sans_mono_bitmap::{FontWeight, RasterHeight, get_raster, get_raster_width};

use super::canvas::Canvas;
use crate::color::Rgba;

/// Font weight, raster size and integer magnification
#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub weight: FontWeight,
    pub height: RasterHeight,
    /// Raster height in pixels, matching `height`
    pub px: u32,
    pub scale: u32,
}

impl TextStyle {
    pub fn regular(scale: u32) -> Self {
        Self {
            weight: FontWeight::Regular,
            height: RasterHeight::Size16,
            px: 16,
            scale: scale.max(1),
        }
    }

    pub fn bold(scale: u32) -> Self {
        Self {
            weight: FontWeight::Bold,
            height: RasterHeight::Size32,
            px: 32,
            scale: scale.max(1),
        }
    }

    pub fn char_width(&self) -> u32 {
        get_raster_width(self.weight, self.height) as u32 * self.scale
    }

    pub fn line_height(&self) -> u32 {
        self.px * self.scale
    }
}

/// Pixel size of a single line of text
pub fn text_size(text: &str, style: TextStyle) -> (u32, u32) {
    (text.chars().count() as u32 * style.char_width(), style.line_height())
}

/// Draw one character with its top-left corner at (x0, y0)
pub fn draw_char(canvas: &mut Canvas, ch: char, x0: i64, y0: i64, style: TextStyle, color: Rgba) {
    let rc = match get_raster(ch, style.weight, style.height) {
        Some(rc) => rc,
        None => match get_raster('?', style.weight, style.height) {
            Some(rc) => rc,
            None => return,
        },
    };

    let scale = style.scale as i64;
    let width = rc.width();
    for (y, row) in rc.raster().iter().enumerate() {
        for (x, &intensity) in row.iter().take(width).enumerate() {
            if intensity == 0 {
                continue;
            }
            let px = x0 + x as i64 * scale;
            let py = y0 + y as i64 * scale;
            for sy in 0..scale {
                for sx in 0..scale {
                    canvas.blend_coverage(px + sx, py + sy, color, intensity);
                }
            }
        }
    }
}

/// Draw a line of text with its top-left corner at `pos`
pub fn draw_text(canvas: &mut Canvas, text: &str, pos: Vec2, style: TextStyle, color: Rgba) {
    let advance = style.char_width() as i64;
    let x0 = pos.x.round() as i64;
    let y0 = pos.y.round() as i64;
    for (i, ch) in text.chars().enumerate() {
        draw_char(canvas, ch, x0 + i as i64 * advance, y0, style, color);
    }
}

/// Draw a line of text centred on `center`
pub fn draw_text_centered(
    canvas: &mut Canvas,
    text: &str,
    center: Vec2,
    style: TextStyle,
    color: Rgba,
) {
    let (w, h) = text_size(text, style);
    let pos = center - Vec2::new(w as f32, h as f32) / 2.0;
    draw_text(canvas, text, pos, style, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_size_scales() {
        let one = TextStyle::regular(1);
        let two = TextStyle::regular(2);
        let (w1, h1) = text_size("abc", one);
        let (w2, h2) = text_size("abc", two);
        assert_eq!(h1, 16);
        assert_eq!(w2, w1 * 2);
        assert_eq!(h2, 32);
        assert_eq!(TextStyle::bold(1).line_height(), 32);
    }

    #[test]
    fn test_draw_text_marks_pixels() {
        let mut canvas = Canvas::new(120, 40, Rgba::BLACK).unwrap();
        draw_text(&mut canvas, "HI", Vec2::new(4.0, 4.0), TextStyle::bold(1), Rgba::WHITE);
        let lit = canvas.pixels().iter().filter(|p| p.r > 0).count();
        assert!(lit > 20);
        // Nothing drawn past the two glyphs
        let (w, _) = text_size("HI", TextStyle::bold(1));
        for y in 0..40 {
            for x in (4 + w as i64 + 1)..120 {
                assert_eq!(canvas.get(x, y), Some(Rgba::BLACK));
            }
        }
    }

    #[test]
    fn test_unknown_glyph_falls_back() {
        let mut canvas = Canvas::new(40, 40, Rgba::BLACK).unwrap();
        draw_char(&mut canvas, '\u{4e2d}', 0, 0, TextStyle::regular(1), Rgba::WHITE);
        assert!(canvas.pixels().iter().any(|p| p.r > 0));
    }
}
