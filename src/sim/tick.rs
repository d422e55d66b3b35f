//! Fixed timestep simulation tick
//!
//! Advances a session deterministically by one physics step:
//! 1. Rotate alive rings
//! 2. Integrate each active ball under gravity and clamp its speed
//! 3. Test the ball's swept path against alive rings (bounce or gap pass)
//! 4. Check for escape and cleared rings

use std::sync::Arc;

use glam::Vec2;

use super::collision::{
    CollisionResult, RingSide, detect_collision, impact_speed, outward_normal, resolve_bounce,
};
use super::event::{EventKind, GameOverReason, SimulationEvent};
use super::state::{Ball, BallState, Session};
use crate::consts::{CONTACT_SLOP, MIN_BOUNCE_SPEED};
use crate::error::PhysicsError;

/// Advance the session by one fixed timestep
///
/// Once the session is over only the clock moves and nothing is emitted.
pub fn step(session: &mut Session, dt: f32) -> Vec<SimulationEvent> {
    session.tick += 1;
    if session.is_over() {
        return Vec::new();
    }

    let time = session.time();
    let tick = session.tick;
    let config = Arc::clone(&session.config);
    let gravity = Vec2::new(0.0, config.gravity);
    let (width, height) = (config.width as f32, config.height as f32);
    let mut events = Vec::new();

    session.rings.advance(dt);

    // Balls are stored sorted by id
    for index in 0..session.balls.len() {
        if !session.balls[index].is_active() {
            continue;
        }

        integrate(&mut session.balls[index], gravity, dt);

        if !session.balls[index].is_finite() {
            let err = PhysicsError::NonFinite { ball: index, time };
            log::error!("{err}");
            let message = err.to_string();
            session.fault = Some(err);
            let event = session.end(GameOverReason::Fault { message }, None);
            events.push(event.with_ball(index));
            return events;
        }

        clamp_speed(session, index);
        collide_with_rings(session, index, StepClock { time, tick, dt }, gravity, &mut events);

        if session.balls[index].is_outside(width, height) {
            session.balls[index].state = BallState::Escaped { at: time };
            log::info!("Ball {} escaped the frame at t={:.3}s", index, time);
            events.push(session.end(GameOverReason::BallEscaped, Some(index)));
            return events;
        }

        if session.rings.alive_count() == 0 {
            events.push(session.end(GameOverReason::RingsCleared, Some(index)));
            session.effects.on_victory();
            return events;
        }
    }

    events
}

/// Trapezoidal integration (exact for constant gravity)
fn integrate(ball: &mut Ball, gravity: Vec2, dt: f32) {
    let v0 = ball.vel;
    ball.vel += gravity * dt;
    ball.prev_pos = ball.pos;
    ball.pos += (v0 + ball.vel) * 0.5 * dt;
}

/// Scale the ball back to `max_speed` if it exceeds it
fn clamp_speed(session: &mut Session, index: usize) {
    let limit = session.config.max_speed;
    let ball = &mut session.balls[index];
    let speed = ball.speed();
    if speed <= limit {
        return;
    }

    ball.vel *= limit / speed;
    session.clamp_count += 1;

    let warning = PhysicsError::RunawaySpeed {
        ball: index,
        speed,
        limit,
    };
    if session.clamp_count == 1 {
        log::warn!("{warning}");
    } else {
        log::trace!("{warning}");
    }
}

/// Timestamp of the step being resolved
#[derive(Clone, Copy)]
struct StepClock {
    time: f64,
    tick: u64,
    dt: f32,
}

/// Test one ball against alive rings in collision order
///
/// An arc hit bounces the ball and ends testing for this step. A gap pass
/// emits `PASS_THROUGH` (plus `RING_DESTROYED` for the innermost ring) and
/// testing continues outward.
fn collide_with_rings(
    session: &mut Session,
    index: usize,
    clock: StepClock,
    gravity: Vec2,
    events: &mut Vec<SimulationEvent>,
) {
    let StepClock { time, tick, dt } = clock;
    let elasticity = session.config.elasticity;
    let resting_speed = (2.0 * gravity.length() * dt).max(MIN_BOUNCE_SPEED);
    let mut bounce = None;

    for ring_index in session.rings.rings_in_collision_order() {
        let Some(ring) = session.rings.get(ring_index) else {
            continue;
        };

        match detect_collision(&session.balls[index], ring) {
            CollisionResult::Miss => {}
            CollisionResult::ArcHit(contact) => {
                let ball = &mut session.balls[index];
                let normal = outward_normal(contact.point, ring.center);
                let (toward_surface, settle) = match contact.side {
                    RingSide::Inner => (normal, contact.distance - CONTACT_SLOP),
                    RingSide::Outer => (-normal, contact.distance + CONTACT_SLOP),
                };
                let settle = settle.max(0.0);
                let remaining = dt * (1.0 - contact.t);

                // Rewind to the contact point and the velocity it had there
                ball.pos = ring.center + normal * settle;
                ball.vel -= gravity * remaining;
                let impact = impact_speed(ball, ring);

                if impact < resting_speed {
                    // Resting contact: slide along the surface, no bounce
                    ball.vel -= toward_surface * impact;
                    break;
                }

                ball.vel = resolve_bounce(ball, ring, elasticity);
                ball.pos += ball.vel * remaining + 0.5 * gravity * remaining * remaining;
                ball.vel += gravity * remaining;

                // The rest of the step must not carry the ball back into the band
                let distance = ball.pos.distance(ring.center);
                let kept = match contact.side {
                    RingSide::Inner => distance.min(settle),
                    RingSide::Outer => distance.max(settle),
                };
                if kept != distance {
                    ball.pos = ring.center + outward_normal(ball.pos, ring.center) * kept;
                }

                ball.last_hit = Some(time);
                session
                    .effects
                    .on_bounce(&session.balls[index], ring, contact.side, impact, time);
                bounce = Some((ring_index, contact.angle, impact));
                break;
            }
            CollisionResult::GapPass(contact) => {
                let pass = SimulationEvent::new(EventKind::PassThrough, time, tick)
                    .with_ring(ring_index)
                    .with_ball(index)
                    .with_velocity(session.balls[index].speed())
                    .with_angle(contact.angle);
                session
                    .effects
                    .on_gap_pass(&session.balls[index], ring.animated_color(time));

                let destroyed = session.rings.register_gap_pass(ring_index, &pass);
                if destroyed.is_some() {
                    if let Some(ring) = session.rings.get(ring_index) {
                        session.effects.on_ring_destroyed(ring, time);
                    }
                }
                events.push(pass);
                events.extend(destroyed);
            }
        }
    }

    if let Some((ring_index, angle, impact)) = bounce {
        clamp_speed(session, index);
        events.push(
            SimulationEvent::new(EventKind::Bounce, time, tick)
                .with_ring(ring_index)
                .with_ball(index)
                .with_velocity(session.balls[index].speed())
                .with_impact(impact)
                .with_angle(angle),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;

    fn session(json: &str) -> Session {
        Session::new(SimulationConfig::from_json(json).unwrap()).unwrap()
    }

    /// Run every output frame, then end on duration like a job does
    fn run_to_end(session: &mut Session) -> (Vec<SimulationEvent>, u64) {
        let mut events = Vec::new();
        let mut frames = 0;
        for _ in 0..session.config().total_frames() {
            let _snapshot = session.snapshot();
            frames += 1;
            events.extend(session.advance_frame());
        }
        events.extend(session.finish(GameOverReason::DurationElapsed));
        (events, frames)
    }

    fn count(events: &[SimulationEvent], kind: &EventKind) -> usize {
        events.iter().filter(|e| &e.kind == kind).count()
    }

    const ESCAPE_SCENARIO: &str = r#"{
        "nb_rings": 3, "gap_angle": 60, "rotation_speed": 20, "gravity": 500,
        "elasticity": 1.02, "balls": 1, "fps": 60, "duration": 5,
        "start_angle": 240, "random_arc": false, "gap_speed": 0
    }"#;

    #[test]
    fn test_falling_ball_clears_three_rings() {
        let mut s = session(ESCAPE_SCENARIO);
        let (events, frames) = run_to_end(&mut s);

        assert_eq!(frames, 300);
        assert_eq!(count(&events, &EventKind::Bounce), 0);
        assert_eq!(count(&events, &EventKind::PassThrough), 3);

        let destroyed: Vec<&SimulationEvent> = events
            .iter()
            .filter(|e| e.kind == EventKind::RingDestroyed)
            .collect();
        assert_eq!(destroyed.len(), 3);
        assert_eq!(
            destroyed.iter().map(|e| e.ring_index).collect::<Vec<_>>(),
            vec![Some(0), Some(1), Some(2)]
        );
        assert!(destroyed.windows(2).all(|w| w[1].velocity > w[0].velocity));
        // Straight down is 270 degrees
        assert!(destroyed.iter().all(|e| (e.angle - 270.0).abs() < 1e-3));

        let game_overs: Vec<&SimulationEvent> =
            events.iter().filter(|e| e.is_game_over()).collect();
        assert_eq!(game_overs.len(), 1);
        assert_eq!(
            game_overs[0].kind,
            EventKind::GameOver {
                reason: GameOverReason::RingsCleared
            }
        );
        assert!(game_overs[0].time > 0.5 && game_overs[0].time < 1.0);
        assert!(events.last().unwrap().is_game_over());
    }

    #[test]
    fn test_closed_ring_only_bounces() {
        let mut s = session(
            r#"{"nb_rings": 1, "gap_angle": 0, "gravity": 500, "fps": 60, "duration": 5}"#,
        );
        let (events, frames) = run_to_end(&mut s);

        assert_eq!(frames, 300);
        let bounces: Vec<&SimulationEvent> =
            events.iter().filter(|e| e.kind == EventKind::Bounce).collect();
        assert!(!bounces.is_empty());
        assert_eq!(count(&events, &EventKind::PassThrough), 0);
        assert_eq!(count(&events, &EventKind::RingDestroyed), 0);
        assert!(bounces.iter().all(|e| e.ring_index == Some(0) && e.impact > 0.0));
        // Elasticity above 1 pumps energy in
        assert!(bounces.last().unwrap().impact > bounces[0].impact);

        assert_eq!(events.iter().filter(|e| e.is_game_over()).count(), 1);
        assert_eq!(
            events.last().unwrap().kind,
            EventKind::GameOver {
                reason: GameOverReason::DurationElapsed
            }
        );
        // Ball never leaves the ring
        let ring = s.rings().get(0).unwrap();
        assert!(s.balls()[0].pos.distance(ring.center) < ring.inner_radius());
    }

    #[test]
    fn test_events_are_time_ordered() {
        let mut s = session(r#"{"nb_rings": 4, "duration": 8, "launch_jitter": 40}"#);
        let (events, _) = run_to_end(&mut s);
        assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
        assert!(events.windows(2).all(|w| w[0].tick <= w[1].tick));
    }

    #[test]
    fn test_determinism() {
        // Two sessions from the same config produce identical runs
        let json = r#"{"nb_rings": 5, "balls": 3, "launch_jitter": 80,
            "duration": 4, "seed": 99999}"#;
        let mut s1 = session(json);
        let mut s2 = session(json);

        for _ in 0..s1.config().total_frames() {
            assert_eq!(s1.snapshot(), s2.snapshot());
            assert_eq!(s1.advance_frame(), s2.advance_frame());
        }
        assert_eq!(s1.snapshot(), s2.snapshot());
    }

    #[test]
    fn test_substep_consistency() {
        // Free flight inside a ring far out of reach
        let base =
            r#""min_radius": 1500, "width": 4000, "height": 4000, "nb_rings": 1, "duration": 1"#;
        let mut coarse = session(&format!(r#"{{{base}, "physics_rate": 240}}"#));
        let mut fine = session(&format!(r#"{{{base}, "physics_rate": 480}}"#));
        assert_eq!(fine.substeps(), 2 * coarse.substeps());

        for _ in 0..30 {
            assert!(coarse.advance_frame().is_empty());
            assert!(fine.advance_frame().is_empty());
        }
        let a = coarse.balls()[0].pos;
        let b = fine.balls()[0].pos;
        assert!(a.distance(b) < 0.1, "{a} vs {b}");
        assert!((coarse.time() - fine.time()).abs() < 1e-9);
    }

    #[test]
    fn test_escape_ends_session() {
        let mut s = session("{}");
        s.balls[0].pos = Vec2::new(-200.0, -200.0);
        s.balls[0].vel = Vec2::ZERO;
        let events = s.step();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].kind,
            EventKind::GameOver {
                reason: GameOverReason::BallEscaped
            }
        );
        assert_eq!(events[0].ball_index, Some(0));
        assert!(matches!(s.balls()[0].state, BallState::Escaped { .. }));
    }

    #[test]
    fn test_non_finite_state_faults() {
        let mut s = session("{}");
        s.balls[0].vel = Vec2::new(f32::NAN, 0.0);
        let events = s.step();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0].kind,
            EventKind::GameOver {
                reason: GameOverReason::Fault { .. }
            }
        ));
        assert!(matches!(s.fault(), Some(PhysicsError::NonFinite { ball: 0, .. })));
        assert!(serde_json::to_string(&events[0]).is_ok());
    }

    #[test]
    fn test_terminal_after_game_over() {
        let mut s = session("{}");
        s.finish(GameOverReason::DurationElapsed);
        let ticks = s.tick_count();
        let before = s.snapshot();

        assert!(s.advance_frame().is_empty());
        assert_eq!(s.tick_count(), ticks + s.substeps() as u64);
        let after = s.snapshot();
        assert_eq!(before.balls[0].pos, after.balls[0].pos);
        for (a, b) in before.rings.iter().zip(&after.rings) {
            assert_eq!((a.rotation, a.gap_start, a.alive), (b.rotation, b.gap_start, b.alive));
        }
        assert!(after.time > before.time);
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut s = session(r#"{"max_speed": 500}"#);
        s.balls[0].vel = Vec2::new(0.0, 3000.0);
        s.step();
        assert!(s.balls()[0].speed() <= 500.0 + 1e-3);
        assert_eq!(s.clamp_count(), 1);
        assert!(s.fault().is_none());
    }

    #[test]
    fn test_bounce_settles_inside_band() {
        let mut s = session(r#"{"nb_rings": 1, "gap_angle": 0}"#);
        let center = s.config().center();
        // Just short of the inner contact radius (92.5 - 20), heading down fast
        s.balls[0].pos = center + Vec2::new(0.0, 70.0);
        s.balls[0].vel = Vec2::new(0.0, 900.0);
        let events = s.step();

        assert_eq!(events.len(), 1);
        let bounce = &events[0];
        assert_eq!(bounce.kind, EventKind::Bounce);
        assert!((bounce.angle - 270.0).abs() < 1e-3);
        assert!(bounce.impact > 900.0);

        // The rest of the step is spent moving back up from the contact point
        let ball = &s.balls()[0];
        let distance = ball.pos.distance(center);
        assert!(ball.vel.y < 0.0);
        assert!(distance < 72.5 - CONTACT_SLOP && distance > 70.0, "{distance}");
        assert_eq!(ball.last_hit, Some(s.time()));
    }

    #[test]
    fn test_inelastic_ball_comes_to_rest() {
        let mut s =
            session(r#"{"nb_rings": 1, "gap_angle": 0, "elasticity": 0.5, "duration": 10}"#);
        let (events, frames) = run_to_end(&mut s);
        assert_eq!(frames, 600);

        let bounces: Vec<&SimulationEvent> =
            events.iter().filter(|e| e.kind == EventKind::Bounce).collect();
        assert!(bounces.len() >= 3, "{} bounces", bounces.len());
        assert!(bounces.windows(2).all(|w| w[1].impact < w[0].impact));
        let last = bounces.last().unwrap();
        assert!(last.time < 3.0, "still bouncing at t={}", last.time);

        // Resting on the bottom of the ring, inside the band
        let ball = &s.balls()[0];
        let ring = s.rings().get(0).unwrap();
        let distance = ball.pos.distance(ring.center);
        assert!(distance < ring.inner_radius() - ball.radius);
        assert!(distance > ring.inner_radius() - ball.radius - 1.0);
        assert!(ball.speed() < MIN_BOUNCE_SPEED);
    }

    #[test]
    fn test_three_rings_with_random_gaps() {
        // Random gap placement and gap_speed, so rings may survive the run
        for seed in [1u64, 7, 42, 2024] {
            let mut s = session(&format!(
                r#"{{"nb_rings": 3, "gap_angle": 60, "rotation_speed": 20, "gravity": 500,
                    "elasticity": 1.02, "balls": 1, "fps": 60, "duration": 5, "seed": {seed}}}"#
            ));
            let (events, frames) = run_to_end(&mut s);

            assert_eq!(frames, 300);
            assert!(count(&events, &EventKind::RingDestroyed) <= 3);
            assert_eq!(events.iter().filter(|e| e.is_game_over()).count(), 1);
            assert!(events.last().unwrap().is_game_over());
            assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
        }
    }

    #[test]
    fn test_effects_follow_events() {
        let mut s = session(ESCAPE_SCENARIO);
        let mut destroyed = 0;
        while !s.is_over() {
            destroyed += count(&s.advance_frame(), &EventKind::RingDestroyed);
        }
        assert_eq!(destroyed, 3);
        let snap = s.snapshot();
        assert!(snap.particles.len() >= 150);
        assert_ne!(snap.shake, Vec2::ZERO);

        // Effects settle while the physics stays frozen
        let pos = s.balls()[0].pos;
        for _ in 0..180 {
            s.advance_frame();
        }
        assert_eq!(s.balls()[0].pos, pos);
        let snap = s.snapshot();
        assert_eq!(snap.shake, Vec2::ZERO);
        assert!(snap.rings.iter().all(|r| r.glow == 0.0 && r.spring == 0.0));
    }
}
