//! Visual effects driven by simulation events
//!
//! Particles, screen shake, ring springs and ring glow. Effects never feed
//! back into physics and draw from their own seeded RNG, so the event stream
//! is the same with or without them. They keep animating after game over.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collision::RingSide;
use super::ring::Ring;
use super::rings::RingSet;
use super::state::Ball;
use crate::color::Rgba;
use crate::config::SimulationConfig;
use crate::consts::{MAX_PARTICLES, VICTORY_SECS};

/// Mixed into the session seed so effects draw an independent sequence
const EFFECTS_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Fraction of particle velocity kept after one second
const PARTICLE_DRAG: f32 = 0.3;

const SPRING_STIFFNESS: f32 = 800.0;
const SPRING_DAMPING: f32 = 12.0;
/// Largest spring integration step (seconds)
const SPRING_MAX_STEP: f32 = 1.0 / 240.0;
const SPRING_MAX_KICK: f32 = 250.0;

const GLOW_ON_HIT: f32 = 0.5;
/// Glow lost per second
const GLOW_DECAY: f32 = 2.0;

const IMPACT_PARTICLES: usize = 15;
const RING_HIT_PARTICLES: usize = 10;
const RING_EXPLOSION_PARTICLES: usize = 150;
/// Embers per second shed by a fading ring
const EMBER_RATE: f32 = 20.0;
/// Chance per frame of a victory burst
const VICTORY_BURST_CHANCE: f64 = 0.3;
const VICTORY_BURST_PARTICLES: usize = 5;

/// A short-lived dot drawn over the scene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub color: Rgba,
    /// Radius in px
    pub size: f32,
    /// Seconds left
    pub life: f32,
    pub max_life: f32,
    /// Drawn with a halo
    pub glow: bool,
}

impl Particle {
    /// Move and age by `dt`. Returns false once the particle is dead.
    pub fn update(&mut self, dt: f32) -> bool {
        self.pos += self.vel * dt;
        self.life -= dt;
        self.vel *= PARTICLE_DRAG.powf(dt);
        self.life > 0.0
    }

    /// Opacity: 1 at birth, 0 at death
    pub fn alpha(&self) -> f32 {
        if self.max_life <= 0.0 {
            return 0.0;
        }
        (self.life / self.max_life).clamp(0.0, 1.0)
    }
}

/// Random whole-frame offset after strong impacts
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenShake {
    intensity: f32,
    remaining: f32,
    offset: Vec2,
}

impl ScreenShake {
    /// Shake by up to `intensity` px for `duration` seconds
    ///
    /// A weaker shake does not replace a stronger one still running.
    pub fn start(&mut self, intensity: f32, duration: f32) {
        let intensity = intensity.max(0.0);
        if self.is_active() && intensity < self.intensity {
            return;
        }
        self.intensity = intensity;
        self.remaining = self.remaining.max(duration);
    }

    pub fn update(&mut self, dt: f32, rng: &mut Pcg32) {
        if !self.is_active() {
            return;
        }
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            *self = Self::default();
        } else {
            let i = self.intensity;
            self.offset = Vec2::new(rng.random_range(-i..=i), rng.random_range(-i..=i));
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0.0
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }
}

/// Damped radial wobble of a ring after a hit (px)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    pub offset: f32,
    pub velocity: f32,
}

impl Spring {
    pub fn kick(&mut self, velocity: f32) {
        self.velocity += velocity;
    }

    pub fn update(&mut self, dt: f32) {
        if self.is_settled() {
            *self = Self::default();
            return;
        }
        let steps = (dt / SPRING_MAX_STEP).ceil().max(1.0) as u32;
        let h = dt / steps as f32;
        for _ in 0..steps {
            let accel = -SPRING_STIFFNESS * self.offset - SPRING_DAMPING * self.velocity;
            self.velocity += accel * h;
            self.offset += self.velocity * h;
        }
    }

    pub fn is_settled(&self) -> bool {
        self.offset.abs() <= 0.01 && self.velocity.abs() <= 0.1
    }
}

/// All effect state for one session
#[derive(Debug, Clone)]
pub struct Effects {
    rng: Pcg32,
    particles: Vec<Particle>,
    shake: ScreenShake,
    /// Indexed by ring
    springs: Vec<Spring>,
    glow: Vec<f32>,
}

impl Effects {
    pub fn new(seed: u64, ring_count: usize) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed ^ EFFECTS_SEED_SALT),
            particles: Vec::new(),
            shake: ScreenShake::default(),
            springs: vec![Spring::default(); ring_count],
            glow: vec![0.0; ring_count],
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn shake(&self) -> &ScreenShake {
        &self.shake
    }

    /// Radial offset of ring `index` (px)
    pub fn spring(&self, index: usize) -> f32 {
        self.springs.get(index).map_or(0.0, |s| s.offset)
    }

    /// Glow of ring `index` (0-1)
    pub fn glow(&self, index: usize) -> f32 {
        self.glow.get(index).copied().unwrap_or(0.0)
    }

    /// Ball hit the solid arc of `ring`
    pub fn on_bounce(&mut self, ball: &Ball, ring: &Ring, side: RingSide, impact: f32, time: f64) {
        let outward = (ball.pos - ring.center).normalize_or_zero();
        // Surface normal pointing back at the ball
        let toward_ball = match side {
            RingSide::Inner => -outward,
            RingSide::Outer => outward,
        };
        let origin = ball.pos - toward_ball * ball.radius;
        let base_speed = ball.speed() * 0.3;
        let base_color = ball.color.lighten(0.2);

        for _ in 0..IMPACT_PARTICLES {
            let spread = self.rng.random_range(-FRAC_PI_2..=FRAC_PI_2);
            let dir = Vec2::from_angle(spread).rotate(toward_ball);
            let speed = base_speed * self.rng.random_range(0.5..=2.0);
            let d = self.rng.random_range(-30..=30);
            let particle = Particle {
                pos: origin,
                vel: dir * speed,
                color: shift_channels(base_color, [d, d, d]),
                size: self.rng.random_range(2.0..=6.0),
                life: 0.0,
                max_life: self.rng.random_range(0.3..=0.7),
                glow: self.rng.random_bool(0.3),
            };
            self.push(particle);
        }

        self.burst_ring(ring, RING_HIT_PARTICLES, time);

        if let Some(glow) = self.glow.get_mut(ring.index) {
            *glow = glow.max(GLOW_ON_HIT);
        }
        if let Some(spring) = self.springs.get_mut(ring.index) {
            let kick = (impact * 0.25).min(SPRING_MAX_KICK);
            spring.kick(match side {
                RingSide::Inner => kick,
                RingSide::Outer => -kick,
            });
        }

        let force = impact / 200.0;
        if force > 0.2 {
            self.shake.start((force * 3.0).min(10.0), (force * 0.1).min(0.2));
        }
    }

    /// Ball slipped through the gap of a ring colored `color`
    pub fn on_gap_pass(&mut self, ball: &Ball, color: Rgba) {
        let count = self.rng.random_range(20..=35);
        for _ in 0..count {
            let angle = self.rng.random_range(0.0..TAU);
            let speed = self.rng.random_range(200.0..=600.0);
            let mut vel = Vec2::from_angle(angle) * speed;
            vel.y -= 200.0;
            let delta = [
                self.rng.random_range(-20..=80),
                self.rng.random_range(-20..=80),
                self.rng.random_range(-20..=80),
            ];
            let particle = Particle {
                pos: ball.pos,
                vel,
                color: shift_channels(color, delta),
                size: self.rng.random_range(3.0..=7.0),
                life: 0.0,
                max_life: self.rng.random_range(0.5..=1.0),
                glow: false,
            };
            self.push(particle);
        }
    }

    pub fn on_ring_destroyed(&mut self, ring: &Ring, time: f64) {
        self.burst_ring(ring, RING_EXPLOSION_PARTICLES, time);
        self.shake.start(10.0, 0.4);
    }

    pub fn on_victory(&mut self) {
        self.shake.start(10.0, 0.5);
    }

    /// Advance every effect by one output frame
    ///
    /// `victory_elapsed` is the time since the rings were cleared, if they were.
    pub fn update(
        &mut self,
        dt: f32,
        time: f64,
        rings: &RingSet,
        balls: &[Ball],
        config: &SimulationConfig,
        victory_elapsed: Option<f64>,
    ) {
        self.particles.retain_mut(|p| p.update(dt));
        self.shake.update(dt, &mut self.rng);
        for spring in &mut self.springs {
            spring.update(dt);
        }

        for ring in rings.iter() {
            let Some(glow) = self.glow.get_mut(ring.index) else {
                continue;
            };
            let proximity = if ring.is_alive() {
                balls
                    .iter()
                    .filter(|b| b.is_active())
                    .map(|b| {
                        let gap = b.pos.distance(ring.center) + b.radius - ring.inner_radius();
                        (1.0 - gap.abs() / (2.0 * ring.thickness)).max(0.0)
                    })
                    .fold(0.0, f32::max)
            } else {
                0.0
            };
            *glow = (*glow - GLOW_DECAY * dt).max(proximity * 0.8);
        }

        let ember_chance = (EMBER_RATE * dt).clamp(0.0, 1.0) as f64;
        for ring in rings.iter().filter(|r| !r.is_alive() && r.fade(time) > 0.0) {
            if self.rng.random_bool(ember_chance) {
                self.burst_ring(ring, 1, time);
            }
        }

        if let Some(elapsed) = victory_elapsed {
            if elapsed < VICTORY_SECS && self.rng.random_bool(VICTORY_BURST_CHANCE) {
                let progress = (elapsed / VICTORY_SECS).max(0.1) as f32;
                self.victory_burst(config, progress);
            }
        }

        if self.particles.len() > MAX_PARTICLES {
            let excess = self.particles.len() - MAX_PARTICLES;
            self.particles.drain(..excess);
        }
    }

    /// Particles thrown outward from random points of the ring band
    fn burst_ring(&mut self, ring: &Ring, count: usize, time: f64) {
        let color = ring.animated_color(time);
        let half = ring.thickness / 2.0;
        for _ in 0..count {
            let angle = self.rng.random_range(0.0..TAU);
            let dir = Vec2::from_angle(angle);
            let r = ring.radius + self.rng.random_range(-half..=half);
            let d = self.rng.random_range(-50..=50);
            let particle = Particle {
                pos: ring.center + dir * r,
                vel: dir * self.rng.random_range(100.0..=300.0),
                color: shift_channels(color, [d, d, d]),
                size: self.rng.random_range(3.0..=8.0),
                life: 0.0,
                max_life: self.rng.random_range(0.5..=1.5),
                glow: true,
            };
            self.push(particle);
        }
    }

    fn victory_burst(&mut self, config: &SimulationConfig, progress: f32) {
        let center = config.center();
        for _ in 0..VICTORY_BURST_PARTICLES {
            let dir = Vec2::from_angle(self.rng.random_range(0.0..TAU));
            let distance = self.rng.random_range(100.0..=300.0) * progress;
            let pick = self.rng.random_range(0..config.color_palette.len().max(1));
            let color = config.palette_color(pick);
            let particle = Particle {
                pos: center + dir * distance,
                vel: dir * self.rng.random_range(50.0..=200.0),
                color,
                size: self.rng.random_range(5.0..=15.0),
                life: 0.0,
                max_life: self.rng.random_range(0.5..=1.5),
                glow: true,
            };
            self.push(particle);
        }
    }

    fn push(&mut self, mut particle: Particle) {
        particle.life = particle.max_life;
        self.particles.push(particle);
    }
}

/// Add a per-channel offset, saturating at 0 and 255
fn shift_channels(color: Rgba, delta: [i32; 3]) -> Rgba {
    let shift = |c: u8, d: i32| (c as i32 + d).clamp(0, 255) as u8;
    Rgba {
        r: shift(color.r, delta[0]),
        g: shift(color.g, delta[1]),
        b: shift(color.b, delta[2]),
        a: color.a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimulationConfig {
        SimulationConfig::from_json(r#"{"nb_rings": 3, "gap_angle": 0}"#).unwrap()
    }

    fn rings(config: &SimulationConfig) -> RingSet {
        RingSet::new(config, &mut Pcg32::seed_from_u64(1))
    }

    fn resting_ball(config: &SimulationConfig) -> Ball {
        let mut ball = Ball::new(0, config.center() + Vec2::new(0.0, 70.0), 20.0);
        ball.vel = Vec2::new(0.0, -600.0);
        ball
    }

    #[test]
    fn test_particle_dies_after_lifetime() {
        let mut p = Particle {
            pos: Vec2::ZERO,
            vel: Vec2::new(100.0, 0.0),
            color: Rgba::WHITE,
            size: 3.0,
            life: 0.5,
            max_life: 0.5,
            glow: false,
        };
        assert!(p.update(0.25));
        assert!((p.alpha() - 0.5).abs() < 1e-6);
        assert!(p.pos.x > 0.0);
        assert!(p.vel.x < 100.0);
        assert!(!p.update(0.3));
        assert_eq!(p.alpha(), 0.0);
    }

    #[test]
    fn test_shake_decays() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut shake = ScreenShake::default();
        shake.start(8.0, 0.1);
        shake.update(1.0 / 60.0, &mut rng);
        assert!(shake.is_active());
        assert!(shake.offset().abs().max_element() <= 8.0);

        // A weaker shake does not override the running one
        shake.start(2.0, 0.05);
        assert_eq!(shake.intensity, 8.0);

        for _ in 0..10 {
            shake.update(1.0 / 60.0, &mut rng);
        }
        assert!(!shake.is_active());
        assert_eq!(shake.offset(), Vec2::ZERO);
    }

    #[test]
    fn test_spring_settles() {
        let mut spring = Spring::default();
        spring.kick(200.0);
        spring.update(1.0 / 60.0);
        assert!(spring.offset > 0.0);
        for _ in 0..120 {
            spring.update(1.0 / 60.0);
        }
        assert!(spring.is_settled());
    }

    #[test]
    fn test_bounce_spawns_particles_and_shake() {
        let config = config();
        let rings = rings(&config);
        let ball = resting_ball(&config);
        let ring = rings.get(0).unwrap();

        let mut fx = Effects::new(config.seed, rings.len());
        fx.on_bounce(&ball, ring, RingSide::Inner, 600.0, 0.0);
        assert_eq!(fx.particles().len(), IMPACT_PARTICLES + RING_HIT_PARTICLES);
        assert!(fx.particles().iter().all(|p| p.life == p.max_life && p.life > 0.0));
        assert_eq!(fx.glow(0), GLOW_ON_HIT);
        assert!(fx.shake().is_active());

        fx.update(1.0 / 60.0, 0.0, &rings, &[ball], &config, None);
        assert!(fx.spring(0) > 0.0);
        assert_eq!(fx.spring(1), 0.0);
    }

    #[test]
    fn test_ring_explosion() {
        let config = config();
        let rings = rings(&config);
        let mut fx = Effects::new(config.seed, rings.len());
        fx.on_ring_destroyed(rings.get(1).unwrap(), 0.0);
        assert_eq!(fx.particles().len(), RING_EXPLOSION_PARTICLES);
        assert!(fx.shake().is_active());

        // Everything has died out two seconds later
        for _ in 0..120 {
            fx.update(1.0 / 60.0, 0.0, &rings, &[], &config, None);
        }
        assert!(fx.particles().is_empty());
        assert!(!fx.shake().is_active());
    }

    #[test]
    fn test_same_seed_same_particles() {
        let config = config();
        let rings = rings(&config);
        let ball = resting_ball(&config);
        let run = |seed: u64| {
            let mut fx = Effects::new(seed, rings.len());
            fx.on_gap_pass(&ball, Rgba::rgb(200, 40, 90));
            fx.on_bounce(&ball, rings.get(0).unwrap(), RingSide::Inner, 300.0, 0.5);
            for _ in 0..5 {
                fx.update(1.0 / 60.0, 0.5, &rings, std::slice::from_ref(&ball), &config, Some(0.2));
            }
            (fx.particles().to_vec(), fx.shake().offset())
        };
        assert_eq!(run(42), run(42));
        assert_ne!(run(42).0, run(43).0);
    }

    #[test]
    fn test_particle_cap() {
        let config = config();
        let rings = rings(&config);
        let mut fx = Effects::new(0, rings.len());
        for _ in 0..(MAX_PARTICLES / RING_EXPLOSION_PARTICLES + 2) {
            fx.on_ring_destroyed(rings.get(2).unwrap(), 0.0);
        }
        fx.update(1.0 / 60.0, 0.0, &rings, &[], &config, None);
        assert_eq!(fx.particles().len(), MAX_PARTICLES);
    }

    #[test]
    fn test_shift_channels_saturates() {
        let c = shift_channels(Rgba::rgb(250, 10, 128), [20, -20, 0]);
        assert_eq!(c, Rgba::rgb(255, 0, 128));
    }
}
