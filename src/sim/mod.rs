//! Deterministic simulation module
//!
//! All physics and ring logic lives here. This module must be pure and
//! deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (rings innermost first, balls by id)
//! - No rendering or I/O dependencies

pub mod collision;
pub mod effects;
pub mod event;
pub mod ring;
pub mod rings;
pub mod snapshot;
pub mod state;
pub mod tick;

pub use collision::{
    CollisionResult, Contact, RingSide, angle_of, detect_collision, impact_speed, is_angle_in_gap,
    resolve_bounce,
};
pub use effects::{Effects, Particle, ScreenShake, Spring};
pub use event::{EventKind, GameOverReason, SimulationEvent};
pub use ring::{Ring, RingState};
pub use rings::RingSet;
pub use snapshot::{BallSnapshot, FrameSnapshot, GameOverInfo, RingSnapshot};
pub use state::{Ball, BallState, Session, TrailPoint};
pub use tick::step;
