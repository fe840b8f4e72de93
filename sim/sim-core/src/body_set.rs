//! Arena of rigid bodies addressed by [`BodyId`].

use sim_types::{Arena, BodyId, Result, SimError};
use tracing::debug;

use crate::RigidBody;

/// Owns the rigid bodies of a simulation.
///
/// Slots of removed bodies are reused, but a removed body's id keeps failing
/// lookups. Iteration follows slot order.
#[derive(Debug, Clone, Default)]
pub struct BodySet {
    bodies: Arena<RigidBody>,
}

impl BodySet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body and return its id.
    pub fn insert(&mut self, body: RigidBody) -> BodyId {
        let id = BodyId::new(self.bodies.insert(body));
        debug!(%id, "added rigid body");
        id
    }

    /// Remove a body.
    pub fn remove(&mut self, id: BodyId) -> Result<RigidBody> {
        let body = self
            .bodies
            .remove(id.raw())
            .ok_or(SimError::InvalidBodyId(id.raw()))?;
        debug!(%id, "removed rigid body");
        Ok(body)
    }

    /// Get a body.
    #[must_use]
    pub fn get(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id.raw())
    }

    /// Get a body mutably.
    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id.raw())
    }

    /// Check whether a body exists.
    #[must_use]
    pub fn contains(&self, id: BodyId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the set holds no bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Iterate over live bodies.
    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &RigidBody)> {
        self.bodies.iter().map(|(raw, body)| (BodyId::new(raw), body))
    }

    /// Iterate mutably over live bodies.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyId, &mut RigidBody)> {
        self.bodies
            .iter_mut()
            .map(|(raw, body)| (BodyId::new(raw), body))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::RigidBodyConfig;
    use nalgebra::Point3;
    use sim_types::Pose;

    fn body_at(x: f64) -> RigidBody {
        RigidBody::new(RigidBodyConfig::default(), Pose::from_position(Point3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn test_insert_and_get() {
        let mut set = BodySet::new();
        let a = set.insert(body_at(1.0));
        let b = set.insert(body_at(2.0));

        assert_ne!(a, b);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(b).unwrap().position().x, 2.0);
    }

    #[test]
    fn test_removed_ids_are_not_reused() {
        let mut set = BodySet::new();
        let a = set.insert(body_at(1.0));
        set.remove(a).unwrap();
        let b = set.insert(body_at(2.0));

        assert_ne!(a, b);
        assert!(set.get(a).is_none());
        assert!(set.remove(a).unwrap_err().is_invalid_id());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_churn_reuses_slots() {
        let mut set = BodySet::new();
        let keep = set.insert(body_at(0.0));
        for i in 0..1000 {
            let id = set.insert(body_at(f64::from(i)));
            set.remove(id).unwrap();
        }

        assert_eq!(set.len(), 1);
        assert_eq!(set.bodies.capacity(), 2);
        assert!(set.contains(keep));
    }

    #[test]
    fn test_iteration_order() {
        let mut set = BodySet::new();
        let ids: Vec<_> = (0..4).map(|i| set.insert(body_at(f64::from(i)))).collect();
        set.remove(ids[1]).unwrap();

        let seen: Vec<_> = set.iter().map(|(id, _)| id).collect();
        assert_eq!(seen, vec![ids[0], ids[2], ids[3]]);

        for (_, body) in set.iter_mut() {
            body.put_to_sleep();
        }
        assert!(set.iter().all(|(_, body)| body.is_sleeping()));
    }
}
