//! Forces applied to bodies before integration.
//!
//! Two kinds of forces are supported:
//!
//! - [`GravityForce`] - A constant acceleration, applied to every body
//!   registered with it
//! - [`SpringForce`] - A damped spring between anchor points on two bodies
//!
//! A [`ForceManager`] owns the forces and accumulates them into the bodies'
//! force sums once per step:
//!
//! ```text
//! F_gravity = m · g
//! F_spring  = (k · (|d| - L) + c · v_rel · d̂) · d̂      d = p₂ - p₁
//! ```

use std::collections::BTreeSet;

use nalgebra::{Point3, Vector3};
use sim_types::{Arena, BodyId, ForceId, Gravity, Result, SimError};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::BodySet;

/// Constant acceleration applied to awake movable bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GravityForce {
    /// Acceleration in m/s².
    pub acceleration: Vector3<f64>,
}

impl GravityForce {
    /// Create a gravity force.
    #[must_use]
    pub const fn new(acceleration: Vector3<f64>) -> Self {
        Self { acceleration }
    }

    fn validate(&self) -> Result<()> {
        if !self.acceleration.iter().all(|x| x.is_finite()) {
            return Err(SimError::invalid_config("gravity must be finite"));
        }
        Ok(())
    }
}

impl From<Gravity> for GravityForce {
    fn from(gravity: Gravity) -> Self {
        Self::new(gravity.acceleration)
    }
}

/// Damped spring between anchor points of two bodies.
///
/// Anchors are in body coordinates. The spring pulls the anchors together
/// when stretched past its rest length and pushes them apart when
/// compressed. Damping acts on the relative anchor velocity along the
/// spring.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpringForce {
    bodies: [BodyId; 2],
    anchors: [Point3<f64>; 2],
    rest_length: f64,
    stiffness: f64,
    damping: f64,
}

impl SpringForce {
    /// Connect `anchor1` on `body1` to `anchor2` on `body2` with an undamped
    /// spring.
    #[must_use]
    pub fn new(
        body1: BodyId,
        anchor1: Point3<f64>,
        body2: BodyId,
        anchor2: Point3<f64>,
        rest_length: f64,
        stiffness: f64,
    ) -> Self {
        Self {
            bodies: [body1, body2],
            anchors: [anchor1, anchor2],
            rest_length,
            stiffness,
            damping: 0.0,
        }
    }

    /// Set the damping coefficient (N·s/m).
    #[must_use]
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Connected bodies.
    #[must_use]
    pub fn bodies(&self) -> [BodyId; 2] {
        self.bodies
    }

    /// Anchor points in body coordinates.
    #[must_use]
    pub fn anchors(&self) -> &[Point3<f64>; 2] {
        &self.anchors
    }

    /// Length at which the spring exerts no force.
    #[must_use]
    pub fn rest_length(&self) -> f64 {
        self.rest_length
    }

    /// Stiffness (N/m).
    #[must_use]
    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    /// Damping coefficient (N·s/m).
    #[must_use]
    pub fn damping(&self) -> f64 {
        self.damping
    }

    fn validate(&self) -> Result<()> {
        if self.bodies[0] == self.bodies[1] {
            return Err(SimError::invalid_config(
                "a spring must connect two different bodies",
            ));
        }
        for (value, name) in [
            (self.rest_length, "rest_length"),
            (self.stiffness, "stiffness"),
            (self.damping, "damping"),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::invalid_config(format!(
                    "spring {name} must be finite and non-negative"
                )));
            }
        }
        if !self.anchors.iter().all(|p| p.iter().all(|x| x.is_finite())) {
            return Err(SimError::invalid_config("spring anchors must be finite"));
        }
        Ok(())
    }

    /// Accumulate the spring force into both bodies.
    ///
    /// Nothing happens when a body is missing, when both bodies sleep, or
    /// when the anchors coincide.
    pub fn apply(&self, bodies: &mut BodySet) {
        let [id1, id2] = self.bodies;
        let (Some(b1), Some(b2)) = (bodies.get(id1), bodies.get(id2)) else {
            return;
        };
        if b1.is_sleeping() && b2.is_sleeping() {
            return;
        }

        let p1 = b1.transform().transform_point(&self.anchors[0]);
        let p2 = b2.transform().transform_point(&self.anchors[1]);
        let delta = p2 - p1;
        let Some(direction) = delta.try_normalize(f64::EPSILON) else {
            return;
        };
        let v1 = b1.linear_velocity() + b1.angular_velocity().cross(&(p1 - b1.position()));
        let v2 = b2.linear_velocity() + b2.angular_velocity().cross(&(p2 - b2.position()));
        let stretch = delta.norm() - self.rest_length;
        let speed = (v2 - v1).dot(&direction);
        let force = direction * (self.stiffness * stretch + self.damping * speed);

        if let Some(body) = bodies.get_mut(id1) {
            body.add_force_at_point(force, p1);
        }
        if let Some(body) = bodies.get_mut(id2) {
            body.add_force_at_point(-force, p2);
        }
    }
}

/// The forces a [`ForceManager`] knows about.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Force {
    /// Constant acceleration of the registered bodies.
    Gravity(GravityForce),
    /// Damped spring between two bodies.
    Spring(SpringForce),
}

impl Force {
    /// Human-readable kind, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gravity(_) => "gravity",
            Self::Spring(_) => "spring",
        }
    }

    /// Bodies the force always acts on, in addition to registered ones.
    #[must_use]
    pub fn connected_bodies(&self) -> Option<[BodyId; 2]> {
        match self {
            Self::Gravity(_) => None,
            Self::Spring(spring) => Some(spring.bodies()),
        }
    }

    /// Check the force parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Gravity(gravity) => gravity.validate(),
            Self::Spring(spring) => spring.validate(),
        }
    }
}

impl From<GravityForce> for Force {
    fn from(force: GravityForce) -> Self {
        Self::Gravity(force)
    }
}

impl From<SpringForce> for Force {
    fn from(force: SpringForce) -> Self {
        Self::Spring(force)
    }
}

#[derive(Debug, Clone)]
struct ForceEntry {
    force: Force,
    targets: BTreeSet<BodyId>,
}

/// Owns forces and the bodies they act on.
///
/// Gravity forces act on the bodies registered with
/// [`add_body_force`](Self::add_body_force). Springs act on the two bodies
/// they connect and cannot be registered with other bodies.
#[derive(Debug, Clone, Default)]
pub struct ForceManager {
    forces: Arena<ForceEntry>,
}

impl ForceManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of forces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forces.len()
    }

    /// Whether the manager has no forces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    /// Validate and add a force.
    pub fn add_force(&mut self, force: Force) -> Result<ForceId> {
        force.validate()?;
        let kind = force.kind();
        let id = ForceId::new(self.forces.insert(ForceEntry {
            force,
            targets: BTreeSet::new(),
        }));
        debug!(%id, kind, "added force");
        Ok(id)
    }

    /// Remove a force from every body it acts on.
    pub fn remove_force(&mut self, id: ForceId) -> Result<Force> {
        let entry = self
            .forces
            .remove(id.raw())
            .ok_or(SimError::InvalidForceId(id.raw()))?;
        debug!(%id, kind = entry.force.kind(), "removed force");
        Ok(entry.force)
    }

    /// Get a force.
    #[must_use]
    pub fn force(&self, id: ForceId) -> Option<&Force> {
        self.forces.get(id.raw()).map(|entry| &entry.force)
    }

    /// Iterate over forces in id slot order.
    pub fn forces(&self) -> impl Iterator<Item = (ForceId, &Force)> {
        self.forces
            .iter()
            .map(|(raw, entry)| (ForceId::new(raw), &entry.force))
    }

    /// Make a gravity force act on `body`.
    pub fn add_body_force(&mut self, body: BodyId, id: ForceId) -> Result<()> {
        let entry = self
            .forces
            .get_mut(id.raw())
            .ok_or(SimError::InvalidForceId(id.raw()))?;
        if matches!(entry.force, Force::Spring(_)) {
            return Err(SimError::invalid_config(
                "springs act only on the bodies they connect",
            ));
        }
        entry.targets.insert(body);
        Ok(())
    }

    /// Stop a force from acting on `body`. Returns whether it did.
    pub fn remove_body_force(&mut self, body: BodyId, id: ForceId) -> Result<bool> {
        let entry = self
            .forces
            .get_mut(id.raw())
            .ok_or(SimError::InvalidForceId(id.raw()))?;
        Ok(entry.targets.remove(&body))
    }

    /// Bodies a force was registered with.
    pub fn targets(&self, id: ForceId) -> impl Iterator<Item = BodyId> + '_ {
        self.forces
            .get(id.raw())
            .into_iter()
            .flat_map(|entry| entry.targets.iter().copied())
    }

    /// Forget `body`: unregister it everywhere and remove the springs that
    /// connect it. Returns the ids of the removed springs.
    pub fn remove_rigid_body(&mut self, body: BodyId) -> Vec<ForceId> {
        let mut removed = Vec::new();
        for (raw, entry) in self.forces.iter_mut() {
            entry.targets.remove(&body);
            if entry
                .force
                .connected_bodies()
                .is_some_and(|bodies| bodies.contains(&body))
            {
                removed.push(ForceId::new(raw));
            }
        }
        for id in &removed {
            self.forces.remove(id.raw());
        }
        if !removed.is_empty() {
            debug!(%body, removed = removed.len(), "removed forces of body");
        }
        removed
    }

    /// Accumulate every force into the bodies' force sums.
    ///
    /// Gravity skips sleeping and immovable bodies so that resting bodies
    /// can fall asleep.
    pub fn apply(&self, bodies: &mut BodySet) {
        for (_, entry) in self.forces.iter() {
            match &entry.force {
                Force::Gravity(gravity) => {
                    for &id in &entry.targets {
                        let Some(body) = bodies.get_mut(id) else {
                            continue;
                        };
                        if body.is_sleeping() || body.inverse_mass() <= 0.0 {
                            continue;
                        }
                        body.add_force(gravity.acceleration / body.inverse_mass());
                    }
                }
                Force::Spring(spring) => spring.apply(bodies),
            }
        }
    }
}
