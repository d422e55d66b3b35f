//! Rotating ring geometry
//!
//! A ring is a thick circular band centred on the frame with a single
//! angular gap. In polar terms:
//! - radius: band centerline (inner = radius - thickness/2, outer = radius + thickness/2)
//! - gap: `[gap_start, gap_start + gap_width]` degrees, rotating with the ring

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::consts::RING_FADE_SECS;
use crate::normalize_degrees;

/// Hue drift of alive rings (degrees per second)
const HUE_DRIFT: f64 = 15.0;
/// Brightness pulse period (seconds) and relative amplitude
const PULSE_PERIOD: f64 = 1.5;
const PULSE_AMOUNT: f32 = 0.2;

/// Check if `angle` lies in `[start, start + width]` degrees, wrapping past 360
///
/// A zero-width span contains nothing.
#[inline]
pub fn angle_in_span(angle: f32, start: f32, width: f32) -> bool {
    if width <= 0.0 {
        return false;
    }
    normalize_degrees(angle - start) <= width
}

/// Ring lifecycle. `Alive -> Destroyed` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RingState {
    Alive,
    Destroyed { at: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    /// Position in the ring stack (0 = innermost)
    pub index: usize,
    pub center: Vec2,
    /// Centerline radius
    pub radius: f32,
    /// Radial thickness
    pub thickness: f32,
    /// Current rotation (degrees, [0, 360))
    pub rotation: f32,
    /// Degrees per second, counter-clockwise
    pub angular_velocity: f32,
    /// Gap start at rotation 0
    pub gap_offset: f32,
    /// Gap width in degrees, [0, 360)
    pub gap_width: f32,
    pub state: RingState,
    pub color: Rgba,
}

impl Ring {
    pub fn new(
        index: usize,
        center: Vec2,
        radius: f32,
        thickness: f32,
        gap_offset: f32,
        gap_width: f32,
        angular_velocity: f32,
    ) -> Self {
        Self {
            index,
            center,
            radius,
            thickness,
            rotation: 0.0,
            angular_velocity,
            gap_offset: normalize_degrees(gap_offset),
            gap_width,
            state: RingState::Alive,
            color: Rgba::WHITE,
        }
    }

    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = color;
        self
    }

    #[inline]
    pub fn inner_radius(&self) -> f32 {
        self.radius - self.thickness / 2.0
    }

    #[inline]
    pub fn outer_radius(&self) -> f32 {
        self.radius + self.thickness / 2.0
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        matches!(self.state, RingState::Alive)
    }

    /// Current gap start angle (degrees, [0, 360))
    #[inline]
    pub fn gap_start(&self) -> f32 {
        normalize_degrees(self.gap_offset + self.rotation)
    }

    /// Current gap end angle; may exceed 360 before wrapping
    #[inline]
    pub fn gap_end(&self) -> f32 {
        self.gap_start() + self.gap_width
    }

    /// Check if an angle falls inside the gap (both edges inclusive)
    pub fn gap_contains(&self, angle: f32) -> bool {
        angle_in_span(angle, self.gap_start(), self.gap_width)
    }

    /// Rotate by `angular_velocity * dt`
    pub fn rotate(&mut self, dt: f32) {
        self.rotation = normalize_degrees(self.rotation + self.angular_velocity * dt);
    }

    /// Mark destroyed. Returns false if the ring was already gone.
    pub fn destroy(&mut self, time: f64) -> bool {
        match self.state {
            RingState::Alive => {
                self.state = RingState::Destroyed { at: time };
                true
            }
            RingState::Destroyed { .. } => false,
        }
    }

    /// Display color at `time`: hue drifting and value pulsing while alive,
    /// frozen at the moment of destruction
    pub fn animated_color(&self, time: f64) -> Rgba {
        let t = match self.state {
            RingState::Alive => time,
            RingState::Destroyed { at } => at,
        };
        let hue = (HUE_DRIFT * t).rem_euclid(360.0) as f32;
        let pulse = 1.0 + PULSE_AMOUNT * (std::f64::consts::TAU * t / PULSE_PERIOD).sin() as f32;
        self.color.shifted(hue, pulse)
    }

    /// Opacity at `time`: 1 while alive, fading to 0 after destruction
    pub fn fade(&self, time: f64) -> f32 {
        match self.state {
            RingState::Alive => 1.0,
            RingState::Destroyed { at } => {
                (1.0 - (time - at) / RING_FADE_SECS).clamp(0.0, 1.0) as f32
            }
        }
    }
}
