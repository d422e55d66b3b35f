//! Simulation configuration
//!
//! Built once per job from a JSON object. Unknown keys are ignored and
//! missing keys fall back to the defaults below. After validation the config
//! is treated as immutable and shared with render workers behind an `Arc`.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::color::{Rgba, default_palette};
use crate::error::{ConfigError, ConfigResult};

/// Order in which alive rings are tested against a ball each step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionOrder {
    #[default]
    InnerFirst,
    OuterFirst,
}

/// Immutable parameter snapshot for one simulation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // === Output ===
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Output frames per second
    pub fps: u32,
    /// Video duration in seconds
    pub duration: f32,
    /// Supersampling multiplier (rendered at this scale, then downsampled)
    pub render_scale: f32,

    // === Rings ===
    /// Centerline radius of the innermost ring
    pub min_radius: f32,
    /// Radial spacing between neighbouring ring bands
    pub gap_radius: f32,
    pub nb_rings: u32,
    /// Radial thickness of each ring band
    pub thickness: f32,
    /// Angular width of each ring's gap (degrees)
    pub gap_angle: f32,
    /// Base angular velocity (degrees/s)
    pub rotation_speed: f32,
    /// Draw each ring's initial gap position from the seeded RNG
    pub random_arc: bool,
    /// Initial gap position when `random_arc` is off (degrees)
    pub start_angle: f32,
    /// Additional angular velocity per ring index (degrees/s)
    pub gap_speed: f32,
    pub collision_order: CollisionOrder,

    // === Balls ===
    pub balls: u32,
    pub ball_radius: f32,
    /// Spawn circle radius when several balls are simulated
    pub ball_spread: f32,
    /// Initial downward nudge (px/s)
    pub launch_speed: f32,
    /// Per-axis bound of the random initial velocity (px/s)
    pub launch_jitter: f32,

    // === Physics ===
    /// Downward acceleration (px/s²)
    pub gravity: f32,
    /// Normal-velocity multiplier on bounce (>1 gains energy)
    pub elasticity: f32,
    /// Minimum physics steps per second; rounded up to a multiple of fps
    pub physics_rate: u32,
    /// Speed clamp (px/s)
    pub max_speed: f32,
    pub seed: u64,

    // === Visuals ===
    pub color_palette: Vec<Rgba>,
    pub background: Rgba,
    pub text_balls: Vec<String>,
    pub on_balls_text: bool,
    pub max_text_length: usize,
    pub question_text: Option<String>,
    pub trails: bool,
    /// Draw the frame counter
    pub debug: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 60,
            duration: 30.0,
            render_scale: 1.0,

            min_radius: 100.0,
            gap_radius: 20.0,
            nb_rings: 5,
            thickness: 15.0,
            gap_angle: 60.0,
            rotation_speed: 60.0,
            random_arc: true,
            start_angle: 30.0,
            gap_speed: 10.0,
            collision_order: CollisionOrder::InnerFirst,

            balls: 1,
            ball_radius: 20.0,
            ball_spread: 50.0,
            launch_speed: 10.0,
            launch_jitter: 0.0,

            gravity: 400.0,
            elasticity: 1.02,
            physics_rate: 240,
            max_speed: 4000.0,
            seed: 42,

            color_palette: default_palette(),
            background: Rgba::BACKGROUND,
            text_balls: Vec::new(),
            on_balls_text: true,
            max_text_length: 10,
            question_text: None,
            trails: true,
            debug: false,
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validated()
    }

    /// Build from an already-parsed JSON object
    pub fn from_value(value: serde_json::Value) -> ConfigResult<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validated()
    }

    /// Load and validate a JSON config file
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!(
            "Loaded config {}: {}x{} @ {} fps, {}s, {} rings",
            path.as_ref().display(),
            config.width,
            config.height,
            config.fps,
            config.duration,
            config.nb_rings
        );
        Ok(config)
    }

    pub fn validated(self) -> ConfigResult<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Check every parameter; fails on the first invalid one
    pub fn validate(&self) -> ConfigResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::invalid("width", "output dimensions must be non-zero"));
        }
        if self.fps == 0 {
            return Err(ConfigError::invalid("fps", "must be at least 1"));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(ConfigError::invalid("duration", "must be a positive number of seconds"));
        }
        if !(self.render_scale.is_finite() && (1.0..=8.0).contains(&self.render_scale)) {
            return Err(ConfigError::invalid("render_scale", "must be between 1 and 8"));
        }
        if self.nb_rings == 0 {
            return Err(ConfigError::invalid("nb_rings", "at least one ring is required"));
        }
        if !(self.min_radius.is_finite() && self.min_radius > 0.0) {
            return Err(ConfigError::invalid("min_radius", "must be positive"));
        }
        if !(self.gap_radius.is_finite() && self.gap_radius >= 0.0) {
            return Err(ConfigError::invalid("gap_radius", "must not be negative"));
        }
        if !(self.thickness.is_finite() && self.thickness >= 0.0) {
            return Err(ConfigError::invalid("thickness", "must not be negative"));
        }
        if !(self.gap_angle.is_finite() && (0.0..360.0).contains(&self.gap_angle)) {
            return Err(ConfigError::invalid("gap_angle", "must be in [0, 360)"));
        }
        for (field, value) in [
            ("rotation_speed", self.rotation_speed),
            ("start_angle", self.start_angle),
            ("gap_speed", self.gap_speed),
            ("gravity", self.gravity),
            ("launch_speed", self.launch_speed),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::invalid(field, "must be finite"));
            }
        }
        if self.ball_count() == 0 {
            return Err(ConfigError::invalid("balls", "at least one ball is required"));
        }
        if !(self.ball_radius.is_finite() && self.ball_radius >= 0.0) {
            return Err(ConfigError::invalid("ball_radius", "must not be negative"));
        }
        if !(self.ball_spread.is_finite() && self.ball_spread >= 0.0) {
            return Err(ConfigError::invalid("ball_spread", "must not be negative"));
        }
        if !(self.launch_jitter.is_finite() && self.launch_jitter >= 0.0) {
            return Err(ConfigError::invalid("launch_jitter", "must not be negative"));
        }
        let innermost = self.min_radius - self.thickness / 2.0;
        if self.ball_radius >= innermost {
            return Err(ConfigError::invalid(
                "ball_radius",
                format!("ball must fit inside the innermost ring (inner edge {innermost:.1})"),
            ));
        }
        if self.ball_count() > 1 && self.ball_spread + self.ball_radius >= innermost {
            return Err(ConfigError::invalid(
                "ball_spread",
                "spawn circle must lie inside the innermost ring",
            ));
        }
        if !(self.elasticity.is_finite() && self.elasticity > 0.0) {
            return Err(ConfigError::invalid("elasticity", "must be positive"));
        }
        if self.physics_rate < self.fps {
            return Err(ConfigError::invalid("physics_rate", "must be at least fps"));
        }
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(ConfigError::invalid("max_speed", "must be positive"));
        }
        if self.color_palette.is_empty() {
            return Err(ConfigError::invalid("color_palette", "at least one color is required"));
        }
        Ok(())
    }

    /// Total number of output frames
    pub fn total_frames(&self) -> u64 {
        (self.fps as f64 * self.duration as f64).round() as u64
    }

    /// Physics steps per output frame
    pub fn substeps(&self) -> u32 {
        self.physics_rate.div_ceil(self.fps).max(1)
    }

    /// Fixed physics timestep
    pub fn dt(&self) -> f32 {
        1.0 / (self.fps * self.substeps()) as f32
    }

    /// Common center of all rings (output pixel space)
    pub fn center(&self) -> Vec2 {
        Vec2::new((self.width / 2) as f32, (self.height / 2) as f32)
    }

    /// Centerline radius of ring `index`
    pub fn ring_radius(&self, index: usize) -> f32 {
        self.min_radius + index as f32 * (self.thickness + self.gap_radius)
    }

    /// Angular velocity of ring `index` (degrees/s)
    pub fn ring_angular_velocity(&self, index: usize) -> f32 {
        self.rotation_speed + self.gap_speed * index as f32
    }

    /// Number of balls actually simulated (labels override `balls`)
    pub fn ball_count(&self) -> usize {
        if self.text_balls.is_empty() {
            self.balls as usize
        } else {
            self.text_balls.len()
        }
    }

    /// Label for ball `index`, truncated to `max_text_length`
    pub fn ball_label(&self, index: usize) -> Option<String> {
        let text = self.text_balls.get(index)?.trim();
        if text.is_empty() {
            return None;
        }
        let len = text.chars().count();
        if len > self.max_text_length {
            let keep = self.max_text_length.saturating_sub(3);
            Some(format!("{}...", text.chars().take(keep).collect::<String>()))
        } else {
            Some(text.to_string())
        }
    }

    /// Palette color for entity `index` (rings and balls cycle independently)
    pub fn palette_color(&self, index: usize) -> Rgba {
        self.color_palette
            .get(index % self.color_palette.len().max(1))
            .copied()
            .unwrap_or(Rgba::WHITE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_unknown_keys() {
        let config = SimulationConfig::from_json(r#"{"nb_rings": 3, "tiktok_hashtags": ["x"]}"#)
            .expect("valid config");
        assert_eq!(config.nb_rings, 3);
        assert_eq!(config.width, 1080);
        assert_eq!(config.height, 1920);
        assert_eq!(config.fps, 60);
        assert_eq!(config.gap_angle, 60.0);
        assert_eq!(config.color_palette.len(), 5);
    }

    #[test]
    fn test_total_frames_and_timestep() {
        let json = r#"{"fps": 60, "duration": 5, "physics_rate": 200}"#;
        let config = SimulationConfig::from_json(json).unwrap();
        assert_eq!(config.total_frames(), 300);
        // 200 / 60 rounds up to 4 substeps
        assert_eq!(config.substeps(), 4);
        assert!((config.dt() - 1.0 / 240.0).abs() < 1e-9);

        let odd = SimulationConfig::from_json(r#"{"fps": 30, "duration": 0.55}"#).unwrap();
        assert_eq!(odd.total_frames(), 17);
    }

    #[test]
    fn test_ring_layout() {
        let config = SimulationConfig::default();
        assert_eq!(config.ring_radius(0), 100.0);
        assert_eq!(config.ring_radius(2), 170.0);
        assert_eq!(config.ring_angular_velocity(0), 60.0);
        assert_eq!(config.ring_angular_velocity(3), 90.0);
        assert_eq!(config.center(), Vec2::new(540.0, 960.0));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            (r#"{"nb_rings": 0}"#, "nb_rings"),
            (r#"{"gap_angle": 360}"#, "gap_angle"),
            (r#"{"gap_angle": -5}"#, "gap_angle"),
            (r#"{"min_radius": -10}"#, "min_radius"),
            (r#"{"thickness": -1}"#, "thickness"),
            (r#"{"ball_radius": -1}"#, "ball_radius"),
            (r#"{"ball_radius": 95}"#, "ball_radius"),
            (r#"{"fps": 0}"#, "fps"),
            (r#"{"duration": 0}"#, "duration"),
            (r#"{"render_scale": 0.5}"#, "render_scale"),
            (r#"{"physics_rate": 30}"#, "physics_rate"),
            (r#"{"elasticity": 0}"#, "elasticity"),
            (r#"{"balls": 0}"#, "balls"),
            (r#"{"color_palette": []}"#, "color_palette"),
        ];
        for (json, field) in cases {
            let err = SimulationConfig::from_json(json).expect_err(json);
            assert_eq!(err.field(), Some(field), "{json}");
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            SimulationConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SimulationConfig::from_json(r##"{"color_palette": ["#nothex"]}"##),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_labels_override_ball_count() {
        let config = SimulationConfig::from_json(
            r#"{"balls": 1, "text_balls": ["Alice", "Bartholomew the Great"],
                "max_text_length": 10}"#,
        )
        .unwrap();
        assert_eq!(config.ball_count(), 2);
        assert_eq!(config.ball_label(0).as_deref(), Some("Alice"));
        assert_eq!(config.ball_label(1).as_deref(), Some("Barthol..."));
        assert_eq!(config.ball_label(2), None);
    }

    #[test]
    fn test_collision_order_key() {
        let config = SimulationConfig::from_json(r#"{"collision_order": "outer_first"}"#).unwrap();
        assert_eq!(config.collision_order, CollisionOrder::OuterFirst);
    }
}
