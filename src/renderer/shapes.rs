//! Rasterization of 2D primitives onto a canvas
//!
//! Primitives are sampled at pixel centers with hard edges. Anti-aliasing
//! comes from supersampling (`render_scale`) followed by the box downsample.

use glam::Vec2;

use super::canvas::Canvas;
use crate::color::Rgba;
use crate::sim::TrailPoint;
use crate::sim::collision::angle_of;
use crate::sim::ring::angle_in_span;

/// Interpolate color based on speed (slow=blue, medium=green, fast=red/orange)
pub fn velocity_color(speed: f32, max_speed: f32, alpha: f32) -> Rgba {
    let t = (speed / max_speed.max(1.0)).clamp(0.0, 1.0);

    // Color gradient: blue (slow) -> cyan -> green -> yellow -> orange -> red (fast)
    let (r, g, b) = if t < 0.25 {
        let u = t / 0.25;
        (0.2, 0.4 + 0.4 * u, 1.0)
    } else if t < 0.5 {
        let u = (t - 0.25) / 0.25;
        (0.2, 0.8, 1.0 - 0.6 * u)
    } else if t < 0.75 {
        let u = (t - 0.5) / 0.25;
        (0.2 + 0.8 * u, 0.8, 0.4 - 0.2 * u)
    } else {
        let u = (t - 0.75) / 0.25;
        (1.0, 0.8 - 0.5 * u, 0.2)
    };

    Rgba::from_unit(r, g, b, alpha)
}

/// Pixel bounds `[min, max)` of a square around `center`, clipped to the canvas
fn bounds(canvas: &Canvas, center: Vec2, half: f32) -> (i64, i64, i64, i64) {
    let x0 = ((center.x - half).floor() as i64).max(0);
    let y0 = ((center.y - half).floor() as i64).max(0);
    let x1 = ((center.x + half).ceil() as i64 + 1).min(canvas.width() as i64);
    let y1 = ((center.y + half).ceil() as i64 + 1).min(canvas.height() as i64);
    (x0, y0, x1, y1)
}

/// Filled circle
pub fn circle(canvas: &mut Canvas, center: Vec2, radius: f32, color: Rgba) {
    if radius <= 0.0 || !center.is_finite() {
        return;
    }
    let r2 = radius * radius;
    let (x0, y0, x1, y1) = bounds(canvas, center, radius);
    for y in y0..y1 {
        let dy = y as f32 + 0.5 - center.y;
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - center.x;
            if dx * dx + dy * dy <= r2 {
                canvas.blend(x, y, color);
            }
        }
    }
}

/// Thick ring band between `inner` and `outer`, leaving the gap
/// `[gap_start, gap_start + gap_width]` degrees empty
pub fn ring_band(
    canvas: &mut Canvas,
    center: Vec2,
    inner: f32,
    outer: f32,
    gap_start: f32,
    gap_width: f32,
    color: Rgba,
) {
    if outer <= 0.0 || outer <= inner {
        return;
    }
    let inner2 = inner.max(0.0).powi(2);
    let outer2 = outer * outer;
    let (x0, y0, x1, y1) = bounds(canvas, center, outer);
    for y in y0..y1 {
        let py = y as f32 + 0.5;
        let dy = py - center.y;
        for x in x0..x1 {
            let px = x as f32 + 0.5;
            let dx = px - center.x;
            let d2 = dx * dx + dy * dy;
            if d2 < inner2 || d2 > outer2 {
                continue;
            }
            if angle_in_span(angle_of(Vec2::new(px, py), center), gap_start, gap_width) {
                continue;
            }
            canvas.blend(x, y, color);
        }
    }
}

/// Axis-aligned filled rectangle
pub fn rect(canvas: &mut Canvas, min: Vec2, size: Vec2, color: Rgba) {
    let x0 = (min.x.round() as i64).max(0);
    let y0 = (min.y.round() as i64).max(0);
    let x1 = ((min.x + size.x).round() as i64).min(canvas.width() as i64);
    let y1 = ((min.y + size.y).round() as i64).min(canvas.height() as i64);
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.blend(x, y, color);
        }
    }
}

/// Ball trail with speed-based colors, fading and thinning toward the tail
///
/// Trail points are newest first; circles are stamped along each segment so
/// fast balls leave a continuous streak.
pub fn ball_trail(canvas: &mut Canvas, trail: &[TrailPoint], ball_radius: f32, max_speed: f32) {
    if trail.len() < 2 {
        return;
    }
    let trail_len = trail.len() as f32;

    // Oldest first so newer stamps land on top
    for i in (0..trail.len() - 1).rev() {
        let p1 = &trail[i];
        let p2 = &trail[i + 1];

        let t1 = i as f32 / trail_len;
        let t2 = (i + 1) as f32 / trail_len;

        let spacing = (ball_radius * 0.5).max(1.0);
        let steps = ((p2.pos - p1.pos).length() / spacing).ceil().max(1.0) as usize;
        for s in (1..=steps).rev() {
            let u = s as f32 / steps as f32;
            let t = t1 + (t2 - t1) * u;
            let pos = p1.pos.lerp(p2.pos, u);
            let speed = p1.speed + (p2.speed - p1.speed) * u;
            let alpha = (1.0 - t) * 0.35;
            let width = ball_radius * (1.0 - t * 0.7);
            circle(canvas, pos, width, velocity_color(speed, max_speed, alpha));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_color_ramp() {
        let slow = velocity_color(0.0, 1000.0, 1.0);
        let fast = velocity_color(1000.0, 1000.0, 1.0);
        assert!(slow.b > slow.r);
        assert!(fast.r > fast.b);
        assert_eq!(velocity_color(5000.0, 1000.0, 1.0), fast);
        assert_eq!(velocity_color(0.0, 1000.0, 0.5).a, 128);
    }

    #[test]
    fn test_circle_covers_area() {
        let mut canvas = Canvas::new(100, 100, Rgba::BLACK).unwrap();
        circle(&mut canvas, Vec2::new(50.0, 50.0), 20.0, Rgba::WHITE);
        let lit = canvas.pixels().iter().filter(|&&p| p == Rgba::WHITE).count() as f32;
        let expected = std::f32::consts::PI * 400.0;
        assert!((lit - expected).abs() / expected < 0.05);
        assert_eq!(canvas.get(50, 50), Some(Rgba::WHITE));
        assert_eq!(canvas.get(5, 5), Some(Rgba::BLACK));
    }

    #[test]
    fn test_circle_clips_at_edges() {
        let mut canvas = Canvas::new(10, 10, Rgba::BLACK).unwrap();
        circle(&mut canvas, Vec2::new(0.0, 0.0), 5.0, Rgba::WHITE);
        circle(&mut canvas, Vec2::new(-50.0, -50.0), 5.0, Rgba::WHITE);
        assert_eq!(canvas.get(0, 0), Some(Rgba::WHITE));
        assert_eq!(canvas.get(9, 9), Some(Rgba::BLACK));
    }

    #[test]
    fn test_ring_band_leaves_gap() {
        let mut canvas = Canvas::new(200, 200, Rgba::BLACK).unwrap();
        let center = Vec2::new(100.0, 100.0);
        // Gap centred on straight up (90 degrees)
        ring_band(&mut canvas, center, 60.0, 80.0, 60.0, 60.0, Rgba::WHITE);

        // Top of the band is in the gap
        assert_eq!(canvas.get(100, 30), Some(Rgba::BLACK));
        // Bottom, left and right are solid
        assert_eq!(canvas.get(100, 170), Some(Rgba::WHITE));
        assert_eq!(canvas.get(30, 100), Some(Rgba::WHITE));
        assert_eq!(canvas.get(170, 100), Some(Rgba::WHITE));
        // Inside and outside the band stay empty
        assert_eq!(canvas.get(100, 100), Some(Rgba::BLACK));
        assert_eq!(canvas.get(100, 195), Some(Rgba::BLACK));
    }

    #[test]
    fn test_trail_draws_behind_ball() {
        let mut canvas = Canvas::new(100, 100, Rgba::BLACK).unwrap();
        let trail = [
            TrailPoint {
                pos: Vec2::new(80.0, 50.0),
                speed: 900.0,
            },
            TrailPoint {
                pos: Vec2::new(20.0, 50.0),
                speed: 800.0,
            },
        ];
        ball_trail(&mut canvas, &trail, 6.0, 1000.0);
        assert_ne!(canvas.get(50, 50), Some(Rgba::BLACK));
        assert_eq!(canvas.get(50, 5), Some(Rgba::BLACK));
    }
}
