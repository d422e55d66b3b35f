//! Collision detection and response for rotating rings
//!
//! The tricky part of the simulation: a fast ball can cross a thin ring band
//! between two fixed steps, so detection is swept from the ball's previous
//! position to its current one. Only entering the contact band counts; a ball
//! already inside the band (mid-way through a gap) is left alone.

use glam::Vec2;

use super::ring::Ring;
use super::state::Ball;
use crate::normalize_degrees;

/// Which face of the band the ball approached from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingSide {
    /// From inside the ring (toward the center)
    Inner,
    /// From outside the ring
    Outer,
}

/// Where a swept ball path enters a ring's contact band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Angle of the ball center at entry (degrees)
    pub angle: f32,
    /// Ball center at entry
    pub point: Vec2,
    pub side: RingSide,
    /// Distance from the ring center at entry
    pub distance: f32,
    /// Fraction of the step (0-1) elapsed at entry
    pub t: f32,
}

/// Result of a swept ball-vs-ring test
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionResult {
    Miss,
    /// Entered the band over the solid arc
    ArcHit(Contact),
    /// Entered the band through the gap
    GapPass(Contact),
}

impl CollisionResult {
    pub fn miss() -> Self {
        CollisionResult::Miss
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CollisionResult::ArcHit(_))
    }
}

/// Angle of `point` around `center` (degrees CCW from +x, screen y down)
#[inline]
pub fn angle_of(point: Vec2, center: Vec2) -> f32 {
    let d = point - center;
    if d == Vec2::ZERO {
        return 0.0;
    }
    normalize_degrees((-d.y).atan2(d.x).to_degrees())
}

/// Check if `angle` lies in the ring's gap
///
/// Both gap edges count as inside, so a contact exactly on the boundary
/// passes through. A zero-width gap contains nothing.
#[inline]
pub fn is_angle_in_gap(angle: f32, ring: &Ring) -> bool {
    ring.gap_contains(angle)
}

/// Unit vector from the ring center toward `point` (zero at the center)
#[inline]
pub fn outward_normal(point: Vec2, center: Vec2) -> Vec2 {
    (point - center).normalize_or_zero()
}

/// First parameter `t` in [0, 1] where segment `p0 -> p1` crosses the circle
pub fn segment_circle_crossing(p0: Vec2, p1: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let d = p1 - p0;
    let f = p0 - center;
    let a = d.dot(d);
    if a <= f32::EPSILON {
        return None;
    }
    let b = 2.0 * f.dot(d);
    let c = f.dot(f) - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);
    [t1, t2].into_iter().find(|t| (0.0..=1.0).contains(t))
}

/// Closest distance from `center` to segment `p0 -> p1`
fn segment_min_distance(p0: Vec2, p1: Vec2, center: Vec2) -> f32 {
    let d = p1 - p0;
    let len_sq = d.length_squared();
    if len_sq <= f32::EPSILON {
        return p0.distance(center);
    }
    let t = ((center - p0).dot(d) / len_sq).clamp(0.0, 1.0);
    (p0 + d * t).distance(center)
}

/// Swept test of the ball's last step against a ring
///
/// The contact band is `[inner - r, outer + r]` for ball radius `r`. The
/// path is a hit when it enters the band from either side during the step;
/// the entry angle decides between arc and gap.
pub fn detect_collision(ball: &Ball, ring: &Ring) -> CollisionResult {
    if !ring.is_alive() {
        return CollisionResult::miss();
    }

    let center = ring.center;
    let band_inner = (ring.inner_radius() - ball.radius).max(0.0);
    let band_outer = ring.outer_radius() + ball.radius;

    let d0 = ball.prev_pos.distance(center);
    let d1 = ball.pos.distance(center);

    let (side, boundary) = if d0 < band_inner && d1 >= band_inner {
        (RingSide::Inner, band_inner)
    } else if d0 > band_outer
        && segment_min_distance(ball.prev_pos, ball.pos, center) <= band_outer
    {
        (RingSide::Outer, band_outer)
    } else {
        return CollisionResult::miss();
    };

    let t = segment_circle_crossing(ball.prev_pos, ball.pos, center, boundary).unwrap_or(1.0);
    let point = ball.prev_pos.lerp(ball.pos, t);

    let contact = Contact {
        angle: angle_of(point, center),
        point,
        side,
        distance: point.distance(center),
        t,
    };

    if is_angle_in_gap(contact.angle, ring) {
        CollisionResult::GapPass(contact)
    } else {
        CollisionResult::ArcHit(contact)
    }
}

/// Side of the ring the ball started its step on
fn approach_side(ball: &Ball, ring: &Ring) -> RingSide {
    if ball.prev_pos.distance(ring.center) <= ring.radius {
        RingSide::Inner
    } else {
        RingSide::Outer
    }
}

/// Normal speed toward the ring surface (0 when separating)
pub fn impact_speed(ball: &Ball, ring: &Ring) -> f32 {
    let n = outward_normal(ball.pos, ring.center);
    let vn = ball.vel.dot(n);
    match approach_side(ball, ring) {
        RingSide::Inner => vn.max(0.0),
        RingSide::Outer => (-vn).max(0.0),
    }
}

/// Bounce velocity off the ring surface
///
/// The normal component is reversed and scaled by `elasticity`; the
/// tangential component is kept. A separating ball keeps its velocity.
pub fn resolve_bounce(ball: &Ball, ring: &Ring, elasticity: f32) -> Vec2 {
    if impact_speed(ball, ring) <= 0.0 {
        return ball.vel;
    }
    let n = outward_normal(ball.pos, ring.center);
    ball.vel - (1.0 + elasticity) * ball.vel.dot(n) * n
}
