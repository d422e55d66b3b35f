//! Ring stack management
//!
//! Rings are built once, ordered innermost to outermost, and never reordered
//! or removed. Only the innermost alive ring can be destroyed.

use rand::Rng;
use rand_pcg::Pcg32;

use super::event::{EventKind, SimulationEvent};
use super::ring::Ring;
use crate::config::{CollisionOrder, SimulationConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct RingSet {
    rings: Vec<Ring>,
    order: CollisionOrder,
}

impl RingSet {
    /// Build `nb_rings` rings. Gap offsets are drawn from `rng` once per ring
    /// when `random_arc` is set.
    pub fn new(config: &SimulationConfig, rng: &mut Pcg32) -> Self {
        let center = config.center();
        let rings = (0..config.nb_rings as usize)
            .map(|i| {
                let gap_offset = if config.random_arc {
                    rng.random_range(0.0..360.0)
                } else {
                    config.start_angle
                };
                Ring::new(
                    i,
                    center,
                    config.ring_radius(i),
                    config.thickness,
                    gap_offset,
                    config.gap_angle,
                    config.ring_angular_velocity(i),
                )
                .with_color(config.palette_color(i))
            })
            .collect();

        Self {
            rings,
            order: config.collision_order,
        }
    }

    /// Rotate every alive ring
    pub fn advance(&mut self, dt: f32) {
        for ring in self.rings.iter_mut().filter(|r| r.is_alive()) {
            ring.rotate(dt);
        }
    }

    /// Indices of alive rings in the order they are tested against a ball
    pub fn rings_in_collision_order(&self) -> Vec<usize> {
        let alive = self.rings.iter().filter(|r| r.is_alive()).map(|r| r.index);
        match self.order {
            CollisionOrder::InnerFirst => alive.collect(),
            CollisionOrder::OuterFirst => alive.rev().collect(),
        }
    }

    pub fn innermost_alive(&self) -> Option<usize> {
        self.rings.iter().find(|r| r.is_alive()).map(|r| r.index)
    }

    pub fn alive_count(&self) -> usize {
        self.rings.iter().filter(|r| r.is_alive()).count()
    }

    pub fn get(&self, index: usize) -> Option<&Ring> {
        self.rings.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ring> {
        self.rings.iter()
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// Handle a ball passing through ring `index`'s gap
    ///
    /// Destroys the ring and returns a `RING_DESTROYED` event stamped like
    /// `pass` only when `index` is the innermost alive ring.
    pub fn register_gap_pass(
        &mut self,
        index: usize,
        pass: &SimulationEvent,
    ) -> Option<SimulationEvent> {
        if self.innermost_alive() != Some(index) {
            return None;
        }
        let ring = self.rings.get_mut(index)?;
        if !ring.destroy(pass.time) {
            return None;
        }
        log::debug!("Ring {} destroyed at t={:.3}s", index, pass.time);
        Some(SimulationEvent {
            kind: EventKind::RingDestroyed,
            ..pass.clone()
        })
    }
}
