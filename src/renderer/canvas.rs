//! RGBA pixel canvas with alpha blending and area-average downsampling

use crate::color::Rgba;
use crate::error::{RenderError, RenderResult};

/// Row-major RGBA pixel buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl Canvas {
    /// Allocate a `width` x `height` canvas filled with `fill`
    ///
    /// Allocation failure is reported instead of aborting the process.
    pub fn new(width: u32, height: u32, fill: Rgba) -> RenderResult<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .filter(|len| len.checked_mul(std::mem::size_of::<Rgba>()).is_some())
            .ok_or(RenderError::BufferTooLarge {
                width: width as u64,
                height: height as u64,
            })?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|_| RenderError::OutOfMemory {
                width,
                height,
                bytes: len * std::mem::size_of::<Rgba>(),
            })?;
        pixels.resize(len, fill);

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<Rgba> {
        self.pixels
    }

    #[inline]
    fn offset(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn get(&self, x: i64, y: i64) -> Option<Rgba> {
        self.offset(x, y).map(|i| self.pixels[i])
    }

    /// Overwrite one pixel (ignored off-canvas)
    pub fn put(&mut self, x: i64, y: i64, color: Rgba) {
        if let Some(i) = self.offset(x, y) {
            self.pixels[i] = color;
        }
    }

    /// Source-over blend one pixel using the color's alpha
    #[inline]
    pub fn blend(&mut self, x: i64, y: i64, color: Rgba) {
        self.blend_coverage(x, y, color, 255);
    }

    /// Source-over blend with an extra coverage factor (0-255)
    pub fn blend_coverage(&mut self, x: i64, y: i64, color: Rgba, coverage: u8) {
        let Some(i) = self.offset(x, y) else {
            return;
        };
        let alpha = color.a as u32 * coverage as u32 / 255;
        if alpha == 0 {
            return;
        }
        if alpha == 255 {
            self.pixels[i] = Rgba { a: 255, ..color };
            return;
        }
        let dst = self.pixels[i];
        let inv = 255 - alpha;
        let mix = |s: u8, d: u8| ((s as u32 * alpha + d as u32 * inv + 127) / 255) as u8;
        self.pixels[i] = Rgba {
            r: mix(color.r, dst.r),
            g: mix(color.g, dst.g),
            b: mix(color.b, dst.b),
            a: (alpha + dst.a as u32 * inv / 255).min(255) as u8,
        };
    }

    /// Blend a solid color over the whole canvas
    pub fn wash(&mut self, color: Rgba) {
        for y in 0..self.height as i64 {
            for x in 0..self.width as i64 {
                self.blend(x, y, color);
            }
        }
    }

    /// Box-filter downsample to `width` x `height`
    ///
    /// Each output pixel is the area-weighted average of the source pixels
    /// it covers, so non-integer scale factors are handled exactly.
    pub fn downsample(&self, width: u32, height: u32) -> RenderResult<Canvas> {
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }
        let mut out = Canvas::new(width, height, Rgba::TRANSPARENT)?;
        let cols = axis_weights(self.width, width);
        let rows = axis_weights(self.height, height);

        for (oy, row_taps) in rows.iter().enumerate() {
            for (ox, col_taps) in cols.iter().enumerate() {
                let mut acc = [0.0f32; 4];
                for &(sy, wy) in row_taps {
                    let base = sy as usize * self.width as usize;
                    for &(sx, wx) in col_taps {
                        let p = self.pixels[base + sx as usize];
                        let w = wx * wy;
                        acc[0] += p.r as f32 * w;
                        acc[1] += p.g as f32 * w;
                        acc[2] += p.b as f32 * w;
                        acc[3] += p.a as f32 * w;
                    }
                }
                let q = |v: f32| v.round().clamp(0.0, 255.0) as u8;
                out.pixels[oy * width as usize + ox] =
                    Rgba::rgba(q(acc[0]), q(acc[1]), q(acc[2]), q(acc[3]));
            }
        }
        Ok(out)
    }
}

/// Source taps `(index, weight)` for every output coordinate along one axis
///
/// Weights of each output coordinate sum to 1.
fn axis_weights(src: u32, dst: u32) -> Vec<Vec<(u32, f32)>> {
    let ratio = src as f64 / dst as f64;
    (0..dst)
        .map(|o| {
            let start = o as f64 * ratio;
            let end = (o as f64 + 1.0) * ratio;
            let first = start.floor() as u32;
            let last = (end.ceil() as u32).min(src);
            (first..last)
                .filter_map(|s| {
                    let overlap = (end.min(s as f64 + 1.0) - start.max(s as f64)) / ratio;
                    (overlap > 1e-9).then_some((s, overlap as f32))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fills_and_bounds() {
        let mut canvas = Canvas::new(4, 3, Rgba::BLACK).unwrap();
        assert_eq!(canvas.pixels().len(), 12);
        assert_eq!(canvas.get(3, 2), Some(Rgba::BLACK));
        assert_eq!(canvas.get(4, 0), None);
        assert_eq!(canvas.get(-1, 0), None);
        // Off-canvas writes are ignored
        canvas.put(10, 10, Rgba::WHITE);
        canvas.blend(-5, 1, Rgba::WHITE);
        assert!(canvas.pixels().iter().all(|&p| p == Rgba::BLACK));
    }

    #[test]
    fn test_oversized_buffer_is_an_error() {
        let err = Canvas::new(u32::MAX, u32::MAX, Rgba::BLACK).unwrap_err();
        assert!(matches!(
            err,
            RenderError::BufferTooLarge { .. } | RenderError::OutOfMemory { .. }
        ));
    }

    #[test]
    fn test_blend_half_alpha() {
        let mut canvas = Canvas::new(1, 1, Rgba::BLACK).unwrap();
        canvas.blend(0, 0, Rgba::rgba(255, 255, 255, 128));
        let p = canvas.get(0, 0).unwrap();
        assert_eq!(p.r, 128);
        assert_eq!(p.a, 255);

        canvas.blend_coverage(0, 0, Rgba::WHITE, 0);
        assert_eq!(canvas.get(0, 0).unwrap().r, 128);
    }

    #[test]
    fn test_downsample_integer_factor_averages() {
        let mut canvas = Canvas::new(4, 2, Rgba::BLACK).unwrap();
        // Left 2x2 block: half white
        canvas.put(0, 0, Rgba::WHITE);
        canvas.put(1, 1, Rgba::WHITE);
        // Right 2x2 block: all white
        for (x, y) in [(2, 0), (3, 0), (2, 1), (3, 1)] {
            canvas.put(x, y, Rgba::WHITE);
        }
        let small = canvas.downsample(2, 1).unwrap();
        assert_eq!(small.get(0, 0).unwrap().r, 128);
        assert_eq!(small.get(1, 0), Some(Rgba::WHITE));
    }

    #[test]
    fn test_downsample_fractional_factor() {
        // 3 -> 2 columns: output 0 covers source 0 fully and half of 1
        let mut canvas = Canvas::new(3, 1, Rgba::BLACK).unwrap();
        canvas.put(0, 0, Rgba::WHITE);
        let small = canvas.downsample(2, 1).unwrap();
        assert_eq!(small.get(0, 0).unwrap().r, 170);
        assert_eq!(small.get(1, 0).unwrap().r, 0);
    }

    #[test]
    fn test_axis_weights_sum_to_one() {
        for (src, dst) in [(1080, 1080), (1620, 1080), (2160, 1080), (7, 3)] {
            for taps in axis_weights(src, dst) {
                let sum: f32 = taps.iter().map(|&(_, w)| w).sum();
                assert!((sum - 1.0).abs() < 1e-4, "{src}->{dst}: {sum}");
            }
        }
    }
}
