//! Simulation events
//!
//! Events are emitted in non-decreasing time order and never modified after
//! emission. The JSON shape is what the external audio generator consumes:
//!
//! ```json
//! {"type": "BOUNCE", "time": 1.25, "tick": 300, "ring_index": 0,
//!  "ball_index": 0, "velocity": 612.0, "impact": 540.5, "angle": 271.3}
//! ```

use serde::{Deserialize, Serialize};

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameOverReason {
    RingsCleared,
    BallEscaped,
    DurationElapsed,
    /// Numerical failure; the message carries the underlying `PhysicsError`
    Fault { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Bounce,
    PassThrough,
    RingDestroyed,
    GameOver { reason: GameOverReason },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    /// Simulation time (seconds)
    pub time: f64,
    /// Physics step that produced the event
    pub tick: u64,
    #[serde(default)]
    pub ring_index: Option<usize>,
    #[serde(default)]
    pub ball_index: Option<usize>,
    /// Ball speed after the event (px/s)
    #[serde(default)]
    pub velocity: f32,
    /// Approaching normal speed for bounces (px/s)
    #[serde(default)]
    pub impact: f32,
    /// Contact angle (degrees)
    #[serde(default)]
    pub angle: f32,
}

impl SimulationEvent {
    pub fn new(kind: EventKind, time: f64, tick: u64) -> Self {
        Self {
            kind,
            time,
            tick,
            ring_index: None,
            ball_index: None,
            velocity: 0.0,
            impact: 0.0,
            angle: 0.0,
        }
    }

    pub fn game_over(reason: GameOverReason, time: f64, tick: u64) -> Self {
        Self::new(EventKind::GameOver { reason }, time, tick)
    }

    pub fn with_ring(mut self, index: usize) -> Self {
        self.ring_index = Some(index);
        self
    }

    pub fn with_ball(mut self, index: usize) -> Self {
        self.ball_index = Some(index);
        self
    }

    pub fn with_velocity(mut self, speed: f32) -> Self {
        self.velocity = speed;
        self
    }

    pub fn with_impact(mut self, speed: f32) -> Self {
        self.impact = speed;
        self
    }

    pub fn with_angle(mut self, degrees: f32) -> Self {
        self.angle = degrees;
        self
    }

    pub fn is_game_over(&self) -> bool {
        matches!(self.kind, EventKind::GameOver { .. })
    }

    /// Short uppercase tag matching the serialized `type`
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            EventKind::Bounce => "BOUNCE",
            EventKind::PassThrough => "PASS_THROUGH",
            EventKind::RingDestroyed => "RING_DESTROYED",
            EventKind::GameOver { .. } => "GAME_OVER",
        }
    }
}
