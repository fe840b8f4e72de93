//! The physics world: bodies, colliders, constraints and the step loop.

use std::collections::BTreeMap;

use sim_collision::{Collider, CollisionEvent, CollisionWorld};
use sim_constraint::{Constraint, ConstraintManager};
use sim_contact::ContactConstraints;
use sim_core::{BodySet, BodyState, Force, ForceManager, GravityForce, RigidBody};
use sim_types::{
    BodyId, ColliderId, ConstraintId, ForceId, PhysicsConfig, Pose, Result, SimError,
};
use tracing::{debug, trace, warn};

/// Summary of one [`PhysicsWorld::step`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Collision events of the step, in pair order.
    pub events: Vec<CollisionEvent>,
    /// Movable bodies still awake after the step.
    pub active_bodies: usize,
    /// Bodies that fell asleep during the step.
    pub fell_asleep: usize,
    /// Constraints in the manager, contacts included.
    pub constraints: usize,
}

/// A collider attached to a body, with its offset in body coordinates.
#[derive(Debug, Clone, Copy)]
struct Attachment {
    collider: ColliderId,
    offset: Pose,
}

/// Colliders of one body and the body pose they were last moved to.
#[derive(Debug, Clone)]
struct BodyColliders {
    synced: Pose,
    attachments: Vec<Attachment>,
}

/// Owns every simulated object and advances them in time.
///
/// Bodies added with [`add_body`](Self::add_body) are registered with a
/// gravity force built from the configured gravity. Stepping never clears
/// [`BodyState::Updated`], which is left for the caller to read back.
///
/// # Example
///
/// ```
/// use sim_physics::prelude::*;
///
/// let mut world = PhysicsWorld::new(PhysicsConfig::default())?;
/// world.add_static_collider(
///     Collider::convex(ConvexShape::bounding_box(Vector3::new(5.0, 5.0, 0.5)))?
///         .with_pose(Pose::from_position(Point3::new(0.0, 0.0, -0.5))),
/// );
///
/// let ball = world.add_body(RigidBody::new(
///     RigidBodyConfig::from_mass_properties(&MassProperties::sphere(1.0, 0.5)),
///     Pose::from_position(Point3::new(0.0, 0.0, 2.0)),
/// ));
/// world.attach_collider(ball, Collider::convex(ConvexShape::sphere(0.5))?)?;
///
/// for _ in 0..60 {
///     world.step(1.0 / 60.0)?;
/// }
/// assert!(world.body(ball).is_some_and(|b| b.position().z < 2.0));
/// # Ok::<(), SimError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    config: PhysicsConfig,
    bodies: BodySet,
    collision: CollisionWorld,
    constraints: ConstraintManager,
    contacts: ContactConstraints,
    forces: ForceManager,
    gravity: Option<ForceId>,
    attachments: BTreeMap<BodyId, BodyColliders>,
    step_count: u64,
}

impl PhysicsWorld {
    /// Create an empty world after validating `config`.
    pub fn new(config: PhysicsConfig) -> Result<Self> {
        config.validate()?;
        let mut forces = ForceManager::new();
        let gravity = forces.add_force(GravityForce::from(config.gravity).into())?;
        Ok(Self {
            bodies: BodySet::new(),
            collision: CollisionWorld::new(&config.collision),
            constraints: ConstraintManager::new(config.solver.clone()),
            contacts: ContactConstraints::new(config.contact),
            forces,
            gravity: Some(gravity),
            attachments: BTreeMap::new(),
            step_count: 0,
            config,
        })
    }

    /// World configuration.
    #[must_use]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Number of completed steps.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Add a body, register it with the world gravity and return its id.
    pub fn add_body(&mut self, body: RigidBody) -> BodyId {
        let id = self.bodies.insert(body);
        if let Some(gravity) = self.gravity {
            if let Err(err) = self.forces.add_body_force(id, gravity) {
                warn!(%id, %err, "body added without gravity");
            }
        }
        id
    }

    /// Remove a body together with its colliders and constraints.
    pub fn remove_body(&mut self, id: BodyId) -> Result<RigidBody> {
        if !self.bodies.contains(id) {
            return Err(SimError::InvalidBodyId(id.raw()));
        }
        if let Some(colliders) = self.attachments.remove(&id) {
            for attachment in colliders.attachments {
                self.drop_collider(attachment.collider)?;
            }
        }
        self.constraints.remove_rigid_body(id, &mut self.bodies);
        self.forces.remove_rigid_body(id);
        self.bodies.remove(id)
    }

    /// Get a body.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    /// Get a body mutably.
    ///
    /// Pose and velocity setters wake the body, and its colliders follow on
    /// the next step.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id)
    }

    /// All bodies.
    #[must_use]
    pub fn bodies(&self) -> &BodySet {
        &self.bodies
    }

    /// Attach a collider to a body.
    ///
    /// The collider's current pose is taken as its offset in body
    /// coordinates.
    pub fn attach_collider(&mut self, body: BodyId, collider: Collider) -> Result<ColliderId> {
        let body_pose = self
            .bodies
            .get(body)
            .ok_or(SimError::InvalidBodyId(body.raw()))?
            .pose();
        let offset = *collider.pose();
        let id = self
            .collision
            .add_collider(collider.with_body(body).with_pose(body_pose.compose(&offset)));
        self.attach(body, body_pose, Attachment {
            collider: id,
            offset,
        });
        debug!(%body, collider = %id, "attached collider");
        Ok(id)
    }

    /// Add a collider that never moves.
    ///
    /// An immovable body is created at the collider's pose to carry it.
    pub fn add_static_collider(&mut self, collider: Collider) -> ColliderId {
        let pose = *collider.pose();
        let body = self.bodies.insert(RigidBody::immovable(pose));
        let id = self.collision.add_collider(collider.with_body(body));
        self.attach(body, pose, Attachment {
            collider: id,
            offset: Pose::identity(),
        });
        id
    }

    fn attach(&mut self, body: BodyId, pose: Pose, attachment: Attachment) {
        self.attachments
            .entry(body)
            .or_insert_with(|| BodyColliders {
                synced: pose,
                attachments: Vec::new(),
            })
            .attachments
            .push(attachment);
    }

    /// Detach and return a collider, removing its contact constraints.
    pub fn remove_collider(&mut self, id: ColliderId) -> Result<Collider> {
        let collider = self.drop_collider(id)?;
        if let Some(body) = collider.body() {
            if let Some(colliders) = self.attachments.get_mut(&body) {
                colliders
                    .attachments
                    .retain(|attachment| attachment.collider != id);
            }
        }
        Ok(collider)
    }

    fn drop_collider(&mut self, id: ColliderId) -> Result<Collider> {
        let (collider, pairs) = self.collision.remove_collider(id)?;
        for pair in &pairs {
            self.contacts
                .remove_pair(pair, &mut self.bodies, &mut self.constraints);
        }
        Ok(collider)
    }

    /// The collision world.
    #[must_use]
    pub fn collision_world(&self) -> &CollisionWorld {
        &self.collision
    }

    /// Add a user constraint such as a distance joint.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintId> {
        self.constraints.add_constraint(constraint, &mut self.bodies)
    }

    /// Remove a user constraint.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<Constraint> {
        self.constraints.remove_constraint(id, &mut self.bodies)
    }

    /// The constraint manager, contact constraints included.
    #[must_use]
    pub fn constraint_manager(&self) -> &ConstraintManager {
        &self.constraints
    }

    /// The contact constraint system.
    #[must_use]
    pub fn contacts(&self) -> &ContactConstraints {
        &self.contacts
    }

    /// Add a force. Springs must connect existing bodies.
    pub fn add_force(&mut self, force: Force) -> Result<ForceId> {
        if let Some(bodies) = force.connected_bodies() {
            self.require_bodies(&bodies)?;
        }
        self.forces.add_force(force)
    }

    /// Remove a force from every body it acts on.
    ///
    /// Removing the world gravity leaves bodies added later without gravity.
    pub fn remove_force(&mut self, id: ForceId) -> Result<Force> {
        let force = self.forces.remove_force(id)?;
        if self.gravity == Some(id) {
            self.gravity = None;
        }
        Ok(force)
    }

    /// Make a gravity force act on a body.
    pub fn add_body_force(&mut self, body: BodyId, force: ForceId) -> Result<()> {
        self.require_bodies(&[body])?;
        self.forces.add_body_force(body, force)
    }

    /// Stop a force from acting on a body. Returns whether it did.
    pub fn remove_body_force(&mut self, body: BodyId, force: ForceId) -> Result<bool> {
        self.forces.remove_body_force(body, force)
    }

    /// The gravity force new bodies are registered with, unless removed.
    #[must_use]
    pub fn gravity_force(&self) -> Option<ForceId> {
        self.gravity
    }

    /// The force manager.
    #[must_use]
    pub fn force_manager(&self) -> &ForceManager {
        &self.forces
    }

    fn require_bodies(&self, bodies: &[BodyId]) -> Result<()> {
        match bodies.iter().find(|&&id| !self.bodies.contains(id)) {
            Some(missing) => Err(SimError::InvalidBodyId(missing.raw())),
            None => Ok(()),
        }
    }

    /// Advance the world by `dt` seconds.
    pub fn step(&mut self, dt: f64) -> Result<StepReport> {
        let dt = SimError::check_timestep(dt)?;

        for (_, body) in self.bodies.iter_mut() {
            body.reset_step_states();
        }
        self.forces.apply(&mut self.bodies);

        self.sync_colliders()?;

        let events = self.collision.update();
        self.contacts.handle_events(
            &events,
            &self.collision,
            &mut self.bodies,
            &mut self.constraints,
        )?;
        self.constraints.update(&mut self.bodies, dt)?;

        let mut active_bodies = 0;
        let mut fell_asleep = 0;
        for (id, body) in self.bodies.iter_mut() {
            if !body.check_state(BodyState::ConstraintsSolved) {
                body.integrate(dt);
            }
            body.clear_forces();

            if !body.pose().is_finite() {
                return Err(SimError::diverged(format!("{id} left the finite range")));
            }
            if body.update_sleep(&self.config.sleep) {
                debug!(%id, "body fell asleep");
                fell_asleep += 1;
            }
            if !body.is_sleeping() {
                active_bodies += 1;
            }
        }

        self.step_count += 1;
        trace!(
            step = self.step_count,
            events = events.len(),
            active_bodies,
            constraints = self.constraints.len(),
            "step finished"
        );
        Ok(StepReport {
            events,
            active_bodies,
            fell_asleep,
            constraints: self.constraints.len(),
        })
    }

    /// Move the colliders of every body whose pose changed since they were
    /// last moved.
    fn sync_colliders(&mut self) -> Result<()> {
        for (&body_id, colliders) in &mut self.attachments {
            let Some(body) = self.bodies.get(body_id) else {
                continue;
            };
            let pose = body.pose();
            if pose == colliders.synced {
                continue;
            }
            for attachment in &colliders.attachments {
                self.collision
                    .set_collider_pose(attachment.collider, pose.compose(&attachment.offset))?;
            }
            colliders.synced = pose;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use sim_collision::{ColliderPair, ConvexShape};
    use sim_constraint::DistanceConstraint;
    use sim_core::{RigidBodyConfig, SpringForce};

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(PhysicsConfig::default()).unwrap()
    }

    fn cube() -> Collider {
        Collider::convex(ConvexShape::bounding_box(Vector3::repeat(0.5))).unwrap()
    }

    fn body_at(z: f64) -> RigidBody {
        RigidBody::new(
            RigidBodyConfig::default(),
            Pose::from_position(Point3::new(0.0, 0.0, z)),
        )
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config =
            PhysicsConfig::default().solver(sim_types::SolverConfig::default().with_iterations(0));
        assert!(PhysicsWorld::new(config).unwrap_err().is_config_error());
    }

    #[test]
    fn test_rejects_invalid_timestep() {
        let mut world = world();
        assert!(matches!(world.step(-0.1), Err(SimError::InvalidTimestep(_))));
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_free_fall() {
        let mut world = world();
        let id = world.add_body(RigidBody::new(
            RigidBodyConfig::default().with_slow_down(1.0, 1.0),
            Pose::from_position(Point3::new(0.0, 0.0, 10.0)),
        ));
        let dt = 0.01;
        for _ in 0..100 {
            world.step(dt).unwrap();
        }
        let body = world.body(id).unwrap();
        // Semi-implicit Euler: v = g·t, z = z0 + g·dt²·n(n+1)/2.
        assert_relative_eq!(body.linear_velocity().z, -9.81, epsilon = 1e-9);
        assert_relative_eq!(body.position().z, 10.0 - 9.81 * dt * dt * 5050.0, epsilon = 1e-9);
        assert_eq!(world.step_count(), 100);
    }

    #[test]
    fn test_attached_collider_follows_body() {
        let mut world = world();
        let id = world.add_body(body_at(5.0));
        let offset = Pose::from_position(Point3::new(1.0, 0.0, 0.0));
        let collider = world
            .attach_collider(id, cube().with_pose(offset))
            .unwrap();
        assert_relative_eq!(
            world.collision_world().collider(collider).unwrap().pose().position,
            Point3::new(1.0, 0.0, 5.0)
        );

        world.step(0.01).unwrap();
        world.step(0.01).unwrap();
        let body_z = world.body(id).unwrap().position().z;
        // Colliders are synced before integration, so they trail by one step.
        let collider_z = world.collision_world().collider(collider).unwrap().pose().position.z;
        assert!(collider_z < 5.0);
        assert!(collider_z > body_z);
    }

    #[test]
    fn test_step_keeps_updated_for_caller() {
        let mut world = world();
        world.add_static_collider(
            Collider::convex(ConvexShape::bounding_box(Vector3::new(5.0, 5.0, 0.5)))
                .unwrap()
                .with_pose(Pose::from_position(Point3::new(0.0, 0.0, -0.5))),
        );
        let id = world.add_body(body_at(3.0));
        let collider = world.attach_collider(id, cube()).unwrap();

        world.step(0.01).unwrap();
        assert!(world.body(id).unwrap().check_state(BodyState::Updated));

        // Clearing the bit does not stop the colliders from following.
        world.body_mut(id).unwrap().clear_updated();
        world.step(0.01).unwrap();
        world.step(0.01).unwrap();
        let body_z = world.body(id).unwrap().position().z;
        let collider_z = world.collision_world().collider(collider).unwrap().pose().position.z;
        assert!(body_z < collider_z && collider_z < 3.0);

        // A body repositioned by hand keeps the bit until the caller clears it.
        let floor_body = world.bodies().iter().find(|(_, b)| b.is_immovable()).unwrap().0;
        let moved = Pose::from_position(Point3::new(0.0, 0.0, -0.6));
        world.body_mut(floor_body).unwrap().set_pose(moved);
        world.step(0.01).unwrap();
        assert!(world.body(floor_body).unwrap().check_state(BodyState::Updated));
        assert!(
            world
                .collision_world()
                .colliders()
                .any(|(_, c)| c.body() == Some(floor_body) && *c.pose() == moved)
        );
    }

    #[test]
    fn test_spring_force_between_bodies() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default().zero_gravity()).unwrap();
        let a = world.add_body(RigidBody::new(
            RigidBodyConfig::default(),
            Pose::from_position(Point3::new(-1.0, 0.0, 0.0)),
        ));
        let b = world.add_body(RigidBody::new(
            RigidBodyConfig::default(),
            Pose::from_position(Point3::new(1.0, 0.0, 0.0)),
        ));
        world
            .add_force(
                SpringForce::new(a, Point3::origin(), b, Point3::origin(), 1.0, 20.0).into(),
            )
            .unwrap();

        world.step(0.01).unwrap();
        assert!(world.body(a).unwrap().linear_velocity().x > 0.0);
        assert!(world.body(b).unwrap().linear_velocity().x < 0.0);

        // The spring goes with either of its bodies.
        world.remove_body(a).unwrap();
        assert_eq!(world.force_manager().len(), 1);
    }

    #[test]
    fn test_force_validation() {
        let mut world = world();
        let a = world.add_body(body_at(0.0));
        let missing = BodyId::new(99);
        let spring = SpringForce::new(a, Point3::origin(), missing, Point3::origin(), 1.0, 1.0);
        assert!(world.add_force(spring.into()).unwrap_err().is_invalid_id());

        let gravity = world.gravity_force().unwrap();
        assert!(world.add_body_force(missing, gravity).unwrap_err().is_invalid_id());
        assert!(world.remove_body_force(a, gravity).unwrap());
        world.step(0.01).unwrap();
        assert_eq!(world.body(a).unwrap().linear_velocity(), Vector3::zeros());
    }

    #[test]
    fn test_removing_gravity() {
        let mut world = world();
        let gravity = world.gravity_force().unwrap();
        world.remove_force(gravity).unwrap();
        assert!(world.gravity_force().is_none());

        let id = world.add_body(body_at(1.0));
        world.step(0.01).unwrap();
        assert_eq!(world.body(id).unwrap().position().z, 1.0);
    }

    #[test]
    fn test_attach_to_unknown_body() {
        let mut world = world();
        assert!(
            world
                .attach_collider(BodyId::new(3), cube())
                .unwrap_err()
                .is_invalid_id()
        );
    }

    #[test]
    fn test_contact_creates_constraints() {
        let mut world = world();
        let floor = world.add_static_collider(
            Collider::convex(ConvexShape::bounding_box(Vector3::new(5.0, 5.0, 0.5)))
                .unwrap()
                .with_pose(Pose::from_position(Point3::new(0.0, 0.0, -0.5))),
        );
        let id = world.add_body(body_at(0.45));
        let collider = world.attach_collider(id, cube()).unwrap();

        let report = world.step(0.01).unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].pair, ColliderPair::new(floor, collider));
        assert!(report.constraints >= 3);
        assert_eq!(report.constraints, world.contacts().constraint_count());
        assert!(world.body(id).unwrap().check_state(BodyState::ConstraintsSolved));
    }

    #[test]
    fn test_remove_body_cleans_up() {
        let mut world = world();
        world.add_static_collider(
            Collider::convex(ConvexShape::bounding_box(Vector3::new(5.0, 5.0, 0.5)))
                .unwrap()
                .with_pose(Pose::from_position(Point3::new(0.0, 0.0, -0.5))),
        );
        let a = world.add_body(body_at(0.45));
        let b = world.add_body(body_at(3.0));
        world.attach_collider(a, cube()).unwrap();
        world
            .add_constraint(
                DistanceConstraint::new(a, Point3::origin(), b, Point3::origin(), 2.55).into(),
            )
            .unwrap();
        world.step(0.01).unwrap();
        assert!(world.constraint_manager().len() > 1);

        world.remove_body(a).unwrap();
        assert!(world.constraint_manager().is_empty());
        assert!(world.contacts().is_empty());
        assert_eq!(world.collision_world().colliders().count(), 1);
        assert!(world.remove_body(a).unwrap_err().is_invalid_id());
        world.step(0.01).unwrap();
    }

    #[test]
    fn test_remove_collider() {
        let mut world = world();
        world.add_static_collider(
            Collider::convex(ConvexShape::bounding_box(Vector3::new(5.0, 5.0, 0.5)))
                .unwrap()
                .with_pose(Pose::from_position(Point3::new(0.0, 0.0, -0.5))),
        );
        let id = world.add_body(body_at(0.45));
        let collider = world.attach_collider(id, cube()).unwrap();
        world.step(0.01).unwrap();

        world.remove_collider(collider).unwrap();
        assert!(world.constraint_manager().is_empty());
        assert!(world.remove_collider(collider).unwrap_err().is_invalid_id());
        // The body keeps falling without its collider.
        world.step(0.01).unwrap();
        assert!(!world.body(id).unwrap().check_state(BodyState::ConstraintsSolved));
    }
}
