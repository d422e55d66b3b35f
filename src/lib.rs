//! Ring Escape - rotating ring ball simulation for generated videos
//!
//! Core modules:
//! - `sim`: Deterministic simulation (physics, collisions, ring lifecycle, events)
//! - `renderer`: Supersampled CPU rasterizer producing RGBA frames
//! - `bridge`: Ordered event delivery for the external audio generator
//! - `output`: Frame sinks, reorder buffer, metadata
//! - `job`: Per-video orchestration, cancellation and worker pools
//! - `config`: Data-driven simulation parameters

pub mod bridge;
pub mod color;
pub mod config;
pub mod error;
pub mod job;
pub mod output;
pub mod renderer;
pub mod sim;

pub use color::Rgba;
pub use config::{CollisionOrder, SimulationConfig};
pub use error::{ConfigError, JobError, PhysicsError, RenderError};
pub use job::{CancelToken, JobReport, SimulationReport, VideoJob, run_batch};
pub use sim::{EventKind, FrameSnapshot, GameOverReason, Session, SimulationEvent};

use glam::Vec2;

/// Simulation constants
pub mod consts {
    /// Distance kept between a bounced ball and the contact boundary, so the
    /// next step starts outside the band
    pub const CONTACT_SLOP: f32 = 0.01;

    /// Normal speeds below this (or two steps of gravity) are resting contact
    /// and produce no bounce
    pub const MIN_BOUNCE_SPEED: f32 = 10.0;

    /// Upper bound on live particles per session
    pub const MAX_PARTICLES: usize = 3000;

    /// Number of per-frame positions kept for ball trails
    pub const TRAIL_LENGTH: usize = 15;

    /// Seconds a ball glows after hitting an arc
    pub const HIT_FLASH_SECS: f64 = 0.1;

    /// Seconds a destroyed ring takes to fade out
    pub const RING_FADE_SECS: f64 = 1.0;

    /// Seconds the victory banner stays on screen
    pub const VICTORY_SECS: f64 = 3.0;

    /// Frames between progress log lines
    pub const PROGRESS_LOG_INTERVAL: u64 = 60;
}

/// Normalize an angle in degrees to [0, 360)
#[inline]
pub fn normalize_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360.0
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Convert polar (r, degrees) around `center` to screen coordinates (y down)
#[inline]
pub fn polar_to_screen(center: Vec2, r: f32, degrees: f32) -> Vec2 {
    let theta = degrees.to_radians();
    center + Vec2::new(r * theta.cos(), -r * theta.sin())
}

/// Convert a screen point to polar (r, degrees) around `center`
#[inline]
pub fn screen_to_polar(point: Vec2, center: Vec2) -> (f32, f32) {
    let d = point - center;
    (d.length(), sim::collision::angle_of(point, center))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(0.0), 0.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
        assert!(normalize_degrees(-1e-9) < 360.0);
    }

    #[test]
    fn test_polar_round_trip_screen_axes() {
        let center = Vec2::new(100.0, 100.0);
        // 90 degrees points up the screen (negative y)
        let up = polar_to_screen(center, 10.0, 90.0);
        assert!((up.x - 100.0).abs() < 1e-4);
        assert!((up.y - 90.0).abs() < 1e-4);

        let (r, deg) = screen_to_polar(Vec2::new(100.0, 120.0), center);
        assert!((r - 20.0).abs() < 1e-4);
        assert!((deg - 270.0).abs() < 1e-3);
    }
}
