//! Session state and core simulation types
//!
//! A `Session` owns every piece of mutable state for one video. Rings and
//! balls are seeded from `config.seed` at construction; nothing outside the
//! session mutates simulation state.

use std::sync::Arc;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::effects::Effects;
use super::event::{GameOverReason, SimulationEvent};
use super::rings::RingSet;
use super::snapshot::{BallSnapshot, FrameSnapshot, GameOverInfo, RingSnapshot};
use super::tick;
use crate::color::Rgba;
use crate::config::SimulationConfig;
use crate::consts::{HIT_FLASH_SECS, TRAIL_LENGTH};
use crate::error::{ConfigResult, PhysicsError};
use crate::polar_to_screen;

/// Ball lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BallState {
    Active,
    /// Left the frame; no longer simulated
    Escaped { at: f64 },
}

/// Trail point for ball rendering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub pos: Vec2,
    pub speed: f32,
}

/// A ball entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub id: usize,
    pub pos: Vec2,
    /// Position at the start of the current step (for swept tests)
    pub prev_pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub color: Rgba,
    pub label: Option<String>,
    pub state: BallState,
    /// Time of the last arc hit (drives the hit flash)
    pub last_hit: Option<f64>,
    /// Per-frame positions (newest first)
    pub trail: Vec<TrailPoint>,
}

impl Ball {
    pub fn new(id: usize, pos: Vec2, radius: f32) -> Self {
        Self {
            id,
            pos,
            prev_pos: pos,
            vel: Vec2::ZERO,
            radius,
            color: Rgba::WHITE,
            label: None,
            state: BallState::Active,
            last_hit: None,
            trail: Vec::with_capacity(TRAIL_LENGTH + 1),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.state, BallState::Active)
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.vel.length()
    }

    pub fn is_finite(&self) -> bool {
        self.pos.is_finite() && self.vel.is_finite()
    }

    /// Record current position to trail (once per output frame)
    pub fn record_trail(&mut self) {
        let speed = self.speed();
        self.trail.insert(0, TrailPoint { pos: self.pos, speed });
        self.trail.truncate(TRAIL_LENGTH);
    }

    /// Hit flash intensity at `time` (1 right after a hit, 0 after the flash)
    pub fn flash(&self, time: f64) -> f32 {
        match self.last_hit {
            Some(hit) if time - hit < HIT_FLASH_SECS => {
                (1.0 - (time - hit) / HIT_FLASH_SECS).clamp(0.0, 1.0) as f32
            }
            _ => 0.0,
        }
    }

    /// True once the ball is entirely outside a `width` x `height` frame
    pub fn is_outside(&self, width: f32, height: f32) -> bool {
        let r = self.radius;
        self.pos.x + r < 0.0
            || self.pos.x - r > width
            || self.pos.y + r < 0.0
            || self.pos.y - r > height
    }
}

/// One simulation run
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) config: Arc<SimulationConfig>,
    /// Sorted by id for deterministic iteration
    pub(crate) balls: Vec<Ball>,
    pub(crate) rings: RingSet,
    /// Physics steps taken
    pub(crate) tick: u64,
    /// Output frames advanced
    pub(crate) frame: u64,
    pub(crate) dt: f32,
    pub(crate) substeps: u32,
    pub(crate) game_over: Option<GameOverInfo>,
    pub(crate) fault: Option<PhysicsError>,
    /// Number of times a ball hit the speed limit
    pub(crate) clamp_count: u64,
    pub(crate) effects: Effects,
}

impl Session {
    /// Validate `config` and build the initial state
    pub fn new(config: SimulationConfig) -> ConfigResult<Self> {
        Self::from_shared(Arc::new(config))
    }

    /// Build from a config shared with render workers
    pub fn from_shared(config: Arc<SimulationConfig>) -> ConfigResult<Self> {
        config.validate()?;

        let mut rng = Pcg32::seed_from_u64(config.seed);
        let rings = RingSet::new(&config, &mut rng);
        let balls = spawn_balls(&config, &mut rng);
        let effects = Effects::new(config.seed, rings.len());

        log::info!(
            "Session ready: {} rings, {} balls, {} substeps/frame (dt={:.5}s), seed {}",
            rings.len(),
            balls.len(),
            config.substeps(),
            config.dt(),
            config.seed
        );

        Ok(Self {
            dt: config.dt(),
            substeps: config.substeps(),
            config,
            balls,
            rings,
            tick: 0,
            frame: 0,
            game_over: None,
            fault: None,
            clamp_count: 0,
            effects,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    pub fn rings(&self) -> &RingSet {
        &self.rings
    }

    /// Simulation time in seconds
    pub fn time(&self) -> f64 {
        self.tick as f64 / (self.config.fps as f64 * self.substeps as f64)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn substeps(&self) -> u32 {
        self.substeps
    }

    pub fn is_over(&self) -> bool {
        self.game_over.is_some()
    }

    pub fn game_over(&self) -> Option<&GameOverInfo> {
        self.game_over.as_ref()
    }

    /// Fatal physics error that ended the session, if any
    pub fn fault(&self) -> Option<&PhysicsError> {
        self.fault.as_ref()
    }

    pub fn clamp_count(&self) -> u64 {
        self.clamp_count
    }

    /// Advance one fixed physics step
    pub fn step(&mut self) -> Vec<SimulationEvent> {
        let dt = self.dt;
        tick::step(self, dt)
    }

    /// Advance one output frame (`substeps` physics steps) and record trails
    pub fn advance_frame(&mut self) -> Vec<SimulationEvent> {
        let mut events = Vec::new();
        self.advance_frame_checked(&mut events, || true);
        events
    }

    /// Like `advance_frame`, but polls `keep_going` before every step
    ///
    /// Events are appended to `events`. Returns false if stopped early, in
    /// which case the frame is left partially advanced.
    pub fn advance_frame_checked(
        &mut self,
        events: &mut Vec<SimulationEvent>,
        mut keep_going: impl FnMut() -> bool,
    ) -> bool {
        for _ in 0..self.substeps {
            if !keep_going() {
                return false;
            }
            events.extend(self.step());
        }

        if !self.is_over() {
            for ball in self.balls.iter_mut().filter(|b| b.is_active()) {
                ball.record_trail();
            }
        }

        let time = self.time();
        let victory_elapsed = self
            .game_over
            .as_ref()
            .filter(|info| info.reason == GameOverReason::RingsCleared)
            .map(|info| time - info.time);
        self.effects.update(
            self.dt * self.substeps as f32,
            time,
            &self.rings,
            &self.balls,
            &self.config,
            victory_elapsed,
        );
        self.frame += 1;

        if self.frame % crate::consts::PROGRESS_LOG_INTERVAL == 0 {
            log::debug!(
                "Frame {}/{} t={:.2}s rings alive={}",
                self.frame,
                self.config.total_frames(),
                self.time(),
                self.rings.alive_count()
            );
        }
        true
    }

    /// End the session with `reason` if it is still running
    pub fn finish(&mut self, reason: GameOverReason) -> Option<SimulationEvent> {
        if self.is_over() {
            return None;
        }
        Some(self.end(reason, None))
    }

    /// Record the game over and build its event
    pub(crate) fn end(&mut self, reason: GameOverReason, ball: Option<usize>) -> SimulationEvent {
        let time = self.time();
        log::info!("Game over at t={:.3}s: {:?}", time, reason);
        self.game_over = Some(GameOverInfo {
            reason: reason.clone(),
            time,
            ball,
        });
        let mut event = SimulationEvent::game_over(reason, time, self.tick);
        if let Some(index) = ball {
            event = event.with_ball(index);
            if let Some(b) = self.balls.get(index) {
                event = event.with_velocity(b.speed());
            }
        }
        event
    }

    /// Immutable view of the current state for rendering
    pub fn snapshot(&self) -> FrameSnapshot {
        let time = self.time();
        let balls = self
            .balls
            .iter()
            .map(|b| BallSnapshot {
                index: b.id,
                pos: b.pos,
                vel: b.vel,
                radius: b.radius,
                color: b.color,
                label: b.label.clone(),
                trail: b.trail.clone(),
                flash: b.flash(time),
                active: b.is_active(),
            })
            .collect();
        let rings = self
            .rings
            .iter()
            .map(|r| RingSnapshot {
                index: r.index,
                center: r.center,
                radius: r.radius,
                thickness: r.thickness,
                rotation: r.rotation,
                gap_start: r.gap_start(),
                gap_width: r.gap_width,
                alive: r.is_alive(),
                color: r.animated_color(time),
                fade: r.fade(time),
                glow: self.effects.glow(r.index),
                spring: self.effects.spring(r.index),
            })
            .collect();

        FrameSnapshot {
            index: self.frame,
            time,
            balls,
            rings,
            particles: self.effects.particles().to_vec(),
            shake: self.effects.shake().offset(),
            game_over: self.game_over.clone(),
        }
    }
}

/// Uniform value in `[-bound, bound]`
fn jitter(rng: &mut Pcg32, bound: f32) -> f32 {
    if bound > 0.0 {
        rng.random_range(-bound..=bound)
    } else {
        0.0
    }
}

/// Place balls at the center (or on the spawn circle) with their launch velocity
fn spawn_balls(config: &SimulationConfig, rng: &mut Pcg32) -> Vec<Ball> {
    let count = config.ball_count();
    if !config.text_balls.is_empty() && config.text_balls.len() != config.balls as usize {
        log::warn!(
            "text_balls has {} labels but balls={}, simulating {} balls",
            config.text_balls.len(),
            config.balls,
            count
        );
    }

    let center = config.center();
    (0..count)
        .map(|i| {
            let pos = if count == 1 {
                center
            } else {
                polar_to_screen(center, config.ball_spread, 360.0 / count as f32 * i as f32)
            };
            let mut ball = Ball::new(i, pos, config.ball_radius);
            let jitter = Vec2::new(
                jitter(rng, config.launch_jitter),
                jitter(rng, config.launch_jitter),
            );
            ball.vel = Vec2::new(0.0, config.launch_speed) + jitter;
            ball.color = config.palette_color(i + 1);
            ball.label = config.ball_label(i);
            ball
        })
        .collect()
}
