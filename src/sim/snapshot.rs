//! Immutable per-frame views of the session handed to the renderer

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::effects::Particle;
use super::event::GameOverReason;
use super::state::TrailPoint;
use crate::color::Rgba;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub index: usize,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub color: Rgba,
    pub label: Option<String>,
    /// Newest first
    pub trail: Vec<TrailPoint>,
    /// Hit flash intensity (0-1)
    pub flash: f32,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingSnapshot {
    pub index: usize,
    pub center: Vec2,
    pub radius: f32,
    pub thickness: f32,
    pub rotation: f32,
    pub gap_start: f32,
    pub gap_width: f32,
    pub alive: bool,
    /// Animated display color
    pub color: Rgba,
    /// Opacity (1 alive, fading to 0 after destruction)
    pub fade: f32,
    /// Halo intensity (0-1)
    pub glow: f32,
    /// Radial wobble added to `radius` when drawing (px)
    pub spring: f32,
}

impl RingSnapshot {
    pub fn inner_radius(&self) -> f32 {
        self.radius - self.thickness / 2.0
    }

    pub fn outer_radius(&self) -> f32 {
        self.radius + self.thickness / 2.0
    }

    /// Whether the ring still needs drawing
    pub fn visible(&self) -> bool {
        self.fade > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOverInfo {
    pub reason: GameOverReason,
    pub time: f64,
    /// Ball that caused the game over, if any
    pub ball: Option<usize>,
}

/// Everything needed to draw one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub index: u64,
    /// Simulation time (seconds)
    pub time: f64,
    pub balls: Vec<BallSnapshot>,
    /// Innermost first
    pub rings: Vec<RingSnapshot>,
    pub particles: Vec<Particle>,
    /// Screen shake applied to everything but the HUD (px)
    pub shake: Vec2,
    pub game_over: Option<GameOverInfo>,
}

impl FrameSnapshot {
    /// Seconds since the session was cleared, if it was
    pub fn since_cleared(&self) -> Option<f64> {
        match &self.game_over {
            Some(info) if info.reason == GameOverReason::RingsCleared => {
                Some((self.time - info.time).max(0.0))
            }
            _ => None,
        }
    }
}
