//! CPU frame renderer
//!
//! Rasterizes a `FrameSnapshot` at `render_scale` times the output size and
//! box-filters it down to one RGBA frame. Rendering only reads the snapshot
//! and the shared config, so frames can be rendered on any worker thread.

pub mod canvas;
pub mod shapes;
pub mod text;

use std::sync::Arc;

use glam::Vec2;

use crate::color::Rgba;
use crate::config::SimulationConfig;
use crate::consts::VICTORY_SECS;
use crate::error::{RenderError, RenderResult};
use crate::sim::{BallSnapshot, FrameSnapshot, Particle, RingSnapshot};
use canvas::Canvas;
use text::TextStyle;

/// Colors for overlay elements
pub mod colors {
    use crate::color::Rgba;

    pub const LABEL_PLATE: Rgba = Rgba::rgba(0, 0, 0, 160);
    pub const LEGEND_PLATE: Rgba = Rgba::rgba(0, 0, 0, 150);
    pub const TEXT: Rgba = Rgba::WHITE;
    pub const SHADOW: Rgba = Rgba::BLACK;
    pub const HIGHLIGHT: Rgba = Rgba::rgba(255, 255, 255, 130);
    pub const DEBUG: Rgba = Rgba::rgb(255, 255, 0);
}

/// Seconds the white victory flash lasts
const VICTORY_FLASH_SECS: f64 = 0.3;

/// Ring halo opacity at full glow, and how far it spreads past the band (px)
const GLOW_ALPHA: f32 = 0.47;
const GLOW_SPREAD: f32 = 5.0;

/// One rendered output frame (straight-alpha RGBA, row-major)
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Rgba>,
}

impl Frame {
    /// Raw RGBA8 bytes
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    pub fn to_image(&self) -> RenderResult<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.as_bytes().to_vec()).ok_or(
            RenderError::SizeMismatch {
                expected: (self.width, self.height),
                actual: (self.pixels.len() as u32, 1),
            },
        )
    }
}

/// Renders snapshots for one job
#[derive(Debug, Clone)]
pub struct FrameRenderer {
    config: Arc<SimulationConfig>,
    /// Supersampling factor
    scale: f32,
    canvas_width: u32,
    canvas_height: u32,
}

impl FrameRenderer {
    pub fn new(config: Arc<SimulationConfig>) -> Self {
        let scale = config.render_scale;
        let canvas_width = ((config.width as f32 * scale).round() as u32).max(config.width);
        let canvas_height = ((config.height as f32 * scale).round() as u32).max(config.height);
        Self {
            config,
            scale,
            canvas_width,
            canvas_height,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Output frame pixel count in bytes
    pub fn frame_bytes(&self) -> usize {
        self.config.width as usize * self.config.height as usize * std::mem::size_of::<Rgba>()
    }

    /// Render one snapshot to an output-resolution frame
    ///
    /// The scene is offset by the snapshot's screen shake; overlays are not.
    pub fn render(&self, snapshot: &FrameSnapshot) -> RenderResult<Frame> {
        let mut canvas =
            Canvas::new(self.canvas_width, self.canvas_height, self.config.background)?;
        let shake = snapshot.shake;

        for ring in snapshot.rings.iter().rev().filter(|r| r.visible()) {
            self.draw_ring(&mut canvas, ring, shake);
        }

        if self.config.trails {
            for ball in &snapshot.balls {
                self.draw_trail(&mut canvas, ball, shake);
            }
        }

        for particle in &snapshot.particles {
            self.draw_particle(&mut canvas, particle, shake);
        }

        for ball in snapshot.balls.iter().filter(|b| b.active) {
            self.draw_ball(&mut canvas, ball, shake);
        }

        if self.config.on_balls_text {
            for ball in snapshot.balls.iter().filter(|b| b.active) {
                self.draw_label(&mut canvas, ball, shake);
            }
        } else {
            self.draw_legend(&mut canvas, &snapshot.balls);
        }

        self.draw_question(&mut canvas, &snapshot.rings);
        self.draw_victory(&mut canvas, snapshot);

        if self.config.debug {
            self.draw_frame_counter(&mut canvas, snapshot.index);
        }

        let out = canvas.downsample(self.config.width, self.config.height)?;
        Ok(Frame {
            index: snapshot.index,
            width: out.width(),
            height: out.height(),
            pixels: out.into_pixels(),
        })
    }

    /// Output coordinates to canvas coordinates
    #[inline]
    fn px(&self, p: Vec2) -> Vec2 {
        p * self.scale
    }

    /// Scene coordinates to canvas coordinates, shaken
    #[inline]
    fn world(&self, p: Vec2, shake: Vec2) -> Vec2 {
        (p + shake) * self.scale
    }

    /// Integer text magnification for `base` output-space multiples
    fn text_scale(&self, base: f32) -> u32 {
        ((base * self.scale).round() as u32).max(1)
    }

    fn draw_ring(&self, canvas: &mut Canvas, ring: &RingSnapshot, shake: Vec2) {
        let center = self.world(ring.center, shake);
        let inner = (ring.inner_radius() + ring.spring) * self.scale;
        let outer = (ring.outer_radius() + ring.spring) * self.scale;
        // Destroyed rings vanish as a whole circle
        let gap_width = if ring.alive { ring.gap_width } else { 0.0 };

        if ring.glow > 0.0 {
            let spread = GLOW_SPREAD * self.scale;
            shapes::ring_band(
                canvas,
                center,
                inner - spread,
                outer + spread,
                ring.gap_start,
                gap_width,
                ring.color.faded(GLOW_ALPHA * ring.glow * ring.fade),
            );
        }

        shapes::ring_band(
            canvas,
            center,
            inner,
            outer,
            ring.gap_start,
            gap_width,
            ring.color.faded(ring.fade),
        );
    }

    fn draw_trail(&self, canvas: &mut Canvas, ball: &BallSnapshot, shake: Vec2) {
        let trail: Vec<_> = ball
            .trail
            .iter()
            .map(|p| crate::sim::TrailPoint {
                pos: self.world(p.pos, shake),
                speed: p.speed,
            })
            .collect();
        shapes::ball_trail(canvas, &trail, ball.radius * self.scale, self.config.max_speed);
    }

    /// Fading dot, with a faint halo for glowing particles
    fn draw_particle(&self, canvas: &mut Canvas, particle: &Particle, shake: Vec2) {
        let center = self.world(particle.pos, shake);
        let r = particle.size * self.scale;
        let alpha = particle.alpha();
        if particle.glow {
            shapes::circle(canvas, center, 2.0 * r, particle.color.faded(alpha / 3.0));
        }
        shapes::circle(canvas, center, r, particle.color.faded(alpha));
    }

    fn draw_ball(&self, canvas: &mut Canvas, ball: &BallSnapshot, shake: Vec2) {
        let center = self.world(ball.pos, shake);
        let r = ball.radius * self.scale;

        if ball.flash > 0.0 {
            shapes::circle(canvas, center, r * 1.3, Rgba::WHITE.faded(0.6 * ball.flash));
        }
        shapes::circle(canvas, center, r, ball.color);
        shapes::circle(canvas, center - Vec2::splat(0.3 * r), 0.35 * r, colors::HIGHLIGHT);
    }

    fn draw_label(&self, canvas: &mut Canvas, ball: &BallSnapshot, shake: Vec2) {
        let Some(label) = ball.label.as_deref() else {
            return;
        };
        let style = TextStyle::regular(self.text_scale(1.0));
        let (w, h) = text::text_size(label, style);
        let center = self.world(ball.pos, shake);
        let pad = 3.0 * self.scale;
        let size = Vec2::new(w as f32, h as f32) + Vec2::splat(2.0 * pad);
        shapes::rect(canvas, center - size / 2.0, size, colors::LABEL_PLATE);
        text::draw_text_centered(canvas, label, center, style, colors::TEXT);
    }

    /// Ball colors and labels in the top-left corner
    fn draw_legend(&self, canvas: &mut Canvas, balls: &[BallSnapshot]) {
        if !balls.iter().any(|b| b.label.is_some()) {
            return;
        }
        let row = 40.0;
        let origin = Vec2::new(20.0, 20.0);
        self.fill_rect(
            canvas,
            origin,
            Vec2::new(200.0, row * balls.len() as f32),
            colors::LEGEND_PLATE,
        );

        let style = TextStyle::regular(self.text_scale(1.0));
        for (i, ball) in balls.iter().enumerate() {
            let Some(label) = ball.label.as_deref() else {
                continue;
            };
            let swatch = origin + Vec2::new(20.0, 20.0 + i as f32 * row);
            shapes::circle(canvas, self.px(swatch), 10.0 * self.scale, ball.color);
            text::draw_text(
                canvas,
                label,
                self.px(swatch + Vec2::new(20.0, -8.0)),
                style,
                colors::TEXT,
            );
        }
    }

    /// Question lines stacked above the outermost ring
    fn draw_question(&self, canvas: &mut Canvas, rings: &[RingSnapshot]) {
        let Some(question) = self.config.question_text.as_deref() else {
            return;
        };
        let lines: Vec<&str> = question.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            return;
        }

        let style = TextStyle::bold(self.text_scale(1.5));
        let line_height = style.line_height() as f32 + 10.0 * self.scale;
        let center = self.config.center();
        let top_ring = rings.last().map(|r| r.outer_radius()).unwrap_or(0.0);
        let bottom = (center.y - top_ring - 40.0) * self.scale;

        for (i, line) in lines.iter().enumerate() {
            let rows_below = (lines.len() - 1 - i) as f32;
            let y = (bottom - line_height * (rows_below + 0.5)).max(line_height / 2.0);
            let pos = Vec2::new(center.x * self.scale, y);
            let shadow = Vec2::splat(2.0 * self.scale);
            text::draw_text_centered(canvas, line, pos + shadow, style, colors::SHADOW);
            text::draw_text_centered(canvas, line, pos, style, colors::TEXT);
        }
    }

    /// "<winner> wins!" banner growing in after the last ring is cleared
    fn draw_victory(&self, canvas: &mut Canvas, snapshot: &FrameSnapshot) {
        let Some(elapsed) = snapshot.since_cleared() else {
            return;
        };
        if elapsed > VICTORY_SECS {
            return;
        }

        if elapsed < VICTORY_FLASH_SECS {
            canvas.wash(Rgba::WHITE.faded((1.0 - elapsed / VICTORY_FLASH_SECS) as f32));
        }

        let progress = (elapsed / VICTORY_SECS) as f32;
        let winner = snapshot
            .game_over
            .as_ref()
            .and_then(|info| info.ball)
            .and_then(|i| snapshot.balls.get(i))
            .and_then(|b| b.label.clone())
            .unwrap_or_else(|| "Ball".to_string());
        let banner = format!("{winner} wins!");

        let style = TextStyle::bold(self.text_scale(1.0 + 2.0 * progress));
        let alpha = (progress * 2.0).min(1.0);
        let center = self.px(self.config.center());
        text::draw_text_centered(canvas, &banner, center, style, colors::TEXT.faded(alpha));
    }

    fn draw_frame_counter(&self, canvas: &mut Canvas, index: u64) {
        let label = format!("Frame: {}/{}", index, self.config.total_frames());
        let style = TextStyle::regular(self.text_scale(1.0));
        let pos = Vec2::new(10.0, self.config.height as f32 - 60.0);
        text::draw_text(canvas, &label, self.px(pos), style, colors::DEBUG);
    }

    fn fill_rect(&self, canvas: &mut Canvas, min: Vec2, size: Vec2, color: Rgba) {
        shapes::rect(canvas, self.px(min), size * self.scale, color);
    }
}
