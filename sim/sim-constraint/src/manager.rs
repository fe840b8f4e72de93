//! Sequential-impulse constraint manager.
//!
//! The manager owns every constraint of the world and the bookkeeping that
//! maps constrained bodies to dense solver slots. Each step it solves
//!
//! ```text
//! J · (v + dt · (M⁻¹F_ext + M⁻¹Jᵀλ)) = bias,   alpha_min <= λ <= alpha_max
//! ```
//!
//! with projected Gauss-Seidel, one row at a time, in insertion order:
//!
//! ```text
//! η_i    = bias_i/dt - J_i · (v/dt + M⁻¹F_ext)
//! invMJ_i = M⁻¹ J_iᵀ,        diag_i = J_i · invMJ_i
//! Δλ_i   = (η_i - J_i · Σ_k invMJ_k λ_k) / diag_i
//! ```
//!
//! Multipliers are stored back into the constraints and reused as the
//! starting point of the next step (warm starting).

use nalgebra::{Matrix3, Vector3};
use sim_core::{BodySet, BodyState, RigidBody};
use sim_types::{BodyId, ConstraintId, Result, SimError, SolverConfig};
use tracing::{debug, trace};

use crate::{Constraint, ConstraintBounds, ConstraintEquation, Jacobian};

/// Diagonal entries at or below this are treated as unsolvable rows.
const DIAGONAL_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
struct Entry {
    id: ConstraintId,
    constraint: Constraint,
    slots: [usize; 2],
}

#[derive(Debug, Clone)]
struct TrackedBody {
    id: BodyId,
    references: usize,
}

/// Per-body data cached for one solve.
#[derive(Debug, Clone)]
struct BodyCache {
    inverse_mass: f64,
    inverse_inertia: Matrix3<f64>,
    /// `v/dt + M⁻¹F_ext` and `ω/dt + I⁻¹τ_ext`.
    free: [Vector3<f64>; 2],
    /// `Σ invMJ_k λ_k`, linear and angular.
    accumulated: [Vector3<f64>; 2],
    should_solve: bool,
    flagged: bool,
}

/// Per-constraint data cached for one solve.
#[derive(Debug, Clone)]
struct Row {
    slots: [usize; 2],
    jacobian: Jacobian,
    inv_mj: [Vector3<f64>; 4],
    eta: f64,
    diag: f64,
    bounds: ConstraintBounds,
    lambda: f64,
    /// Rows between two bodies that need no solving keep their λ untouched.
    active: bool,
    /// Index of the linked normal row and the friction coefficient.
    friction: Option<(Option<usize>, f64)>,
}

/// Owns the constraints and solves them.
///
/// # Example
///
/// ```
/// use sim_constraint::{ConstraintManager, DistanceConstraint};
/// use sim_core::{BodySet, RigidBody, RigidBodyConfig};
/// use sim_types::{Pose, SolverConfig};
/// use nalgebra::Point3;
///
/// let mut bodies = BodySet::new();
/// let anchor = bodies.insert(RigidBody::immovable(Pose::identity()));
/// let bob = bodies.insert(RigidBody::new(
///     RigidBodyConfig::default(),
///     Pose::from_position(Point3::new(1.0, 0.0, 0.0)),
/// ));
///
/// let mut manager = ConstraintManager::new(SolverConfig::default());
/// manager.add_constraint(
///     DistanceConstraint::new(anchor, Point3::origin(), bob, Point3::origin(), 1.0).into(),
///     &mut bodies,
/// )?;
/// manager.update(&mut bodies, 0.01)?;
/// assert_eq!(manager.len(), 1);
/// # Ok::<(), sim_types::SimError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConstraintManager {
    config: SolverConfig,
    entries: Vec<Entry>,
    bodies: Vec<TrackedBody>,
    next_id: u64,
}

impl ConstraintManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Solver settings.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Number of constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct bodies referenced by constraints.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Check whether a constraint exists.
    #[must_use]
    pub fn contains(&self, id: ConstraintId) -> bool {
        self.position(id).is_some()
    }

    /// Get a constraint.
    #[must_use]
    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.position(id).map(|index| &self.entries[index].constraint)
    }

    /// Get a constraint mutably, e.g. to refresh contact geometry.
    pub fn constraint_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint> {
        self.position(id)
            .map(|index| &mut self.entries[index].constraint)
    }

    /// Iterate over constraints in insertion order.
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.entries.iter().map(|entry| (entry.id, &entry.constraint))
    }

    /// Add a constraint and wake both of its bodies.
    ///
    /// The stored λ of the constraint is kept as its warm start.
    pub fn add_constraint(
        &mut self,
        constraint: Constraint,
        bodies: &mut BodySet,
    ) -> Result<ConstraintId> {
        let [a, b] = constraint.bodies();
        if a == b {
            return Err(SimError::invalid_config(format!(
                "{} constraint connects {a} to itself",
                constraint.kind()
            )));
        }
        for id in [a, b] {
            if !bodies.contains(id) {
                return Err(SimError::InvalidBodyId(id.raw()));
            }
        }

        let slots = [self.track(a), self.track(b)];
        let id = ConstraintId::new(self.next_id);
        self.next_id += 1;
        debug!(%id, kind = constraint.kind(), body1 = %a, body2 = %b, "added constraint");

        self.entries.push(Entry {
            id,
            constraint,
            slots,
        });
        for body in [a, b] {
            if let Some(body) = bodies.get_mut(body) {
                body.wake_up();
            }
        }
        Ok(id)
    }

    /// Remove a constraint and wake the bodies it connected.
    pub fn remove_constraint(
        &mut self,
        id: ConstraintId,
        bodies: &mut BodySet,
    ) -> Result<Constraint> {
        let constraint = self.detach(id)?;
        for body in constraint.bodies() {
            if let Some(body) = bodies.get_mut(body) {
                body.wake_up();
            }
        }
        Ok(constraint)
    }

    /// Remove every constraint that references `body`.
    ///
    /// The other bodies of those constraints are woken up. Returns the ids
    /// of the removed constraints.
    pub fn remove_rigid_body(&mut self, body: BodyId, bodies: &mut BodySet) -> Vec<ConstraintId> {
        let ids: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| entry.constraint.bodies().contains(&body))
            .map(|entry| entry.id)
            .collect();

        for &id in &ids {
            if let Ok(constraint) = self.detach(id) {
                for other in constraint.bodies() {
                    if other != body {
                        if let Some(other) = bodies.get_mut(other) {
                            other.wake_up();
                        }
                    }
                }
            }
        }
        if !ids.is_empty() {
            debug!(%body, removed = ids.len(), "removed constraints of body");
        }
        ids
    }

    fn position(&self, id: ConstraintId) -> Option<usize> {
        // Ids are handed out in increasing order and entries keep insertion
        // order, so the list is sorted by id.
        self.entries
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()
    }

    fn track(&mut self, id: BodyId) -> usize {
        if let Some(slot) = self.bodies.iter().position(|tracked| tracked.id == id) {
            self.bodies[slot].references += 1;
            slot
        } else {
            self.bodies.push(TrackedBody { id, references: 1 });
            self.bodies.len() - 1
        }
    }

    fn untrack(&mut self, slot: usize) {
        let Some(tracked) = self.bodies.get_mut(slot) else {
            return;
        };
        tracked.references -= 1;
        if tracked.references > 0 {
            return;
        }
        self.bodies.remove(slot);
        for entry in &mut self.entries {
            for s in &mut entry.slots {
                if *s > slot {
                    *s -= 1;
                }
            }
        }
    }

    fn detach(&mut self, id: ConstraintId) -> Result<Constraint> {
        let index = self
            .position(id)
            .ok_or(SimError::InvalidConstraintId(id.raw()))?;
        let entry = self.entries.remove(index);
        // Untrack the higher slot first so the lower index stays valid.
        let [s0, s1] = entry.slots;
        self.untrack(s0.max(s1));
        self.untrack(s0.min(s1));
        debug!(%id, kind = entry.constraint.kind(), "removed constraint");
        Ok(entry.constraint)
    }

    /// Solve all constraints for one step of length `dt`.
    ///
    /// Bodies touched by an active constraint receive their constraint
    /// impulse, are integrated and get `ConstraintsSolved` set. Other bodies
    /// are left for the caller to integrate.
    pub fn update(&mut self, bodies: &mut BodySet, dt: f64) -> Result<()> {
        let dt = SimError::check_timestep(dt)?;
        if self.entries.is_empty() {
            return Ok(());
        }

        let mut cache = self.cache_bodies(bodies, dt)?;
        let mut rows = self.build_rows(bodies, &mut cache, dt)?;

        for _ in 0..self.config.iterations {
            for i in 0..rows.len() {
                if !rows[i].active {
                    continue;
                }
                if let Some((normal, mu)) = rows[i].friction {
                    let normal_lambda = normal.map_or(0.0, |n| rows[n].lambda);
                    rows[i].bounds = ConstraintBounds::symmetric(mu * normal_lambda);
                }

                let row = &rows[i];
                let [a, b] = row.slots;
                let jv = row.jacobian.dot(&[
                    cache[a].accumulated[0],
                    cache[a].accumulated[1],
                    cache[b].accumulated[0],
                    cache[b].accumulated[1],
                ]);
                let lambda = row.bounds.clamp(row.lambda + (row.eta - jv) / row.diag);
                apply(&mut cache, row.slots, &row.inv_mj, lambda - row.lambda);
                rows[i].lambda = lambda;
            }
        }

        // Normal rows may have shrunk after their friction rows were solved.
        for i in 0..rows.len() {
            let (true, Some((normal, mu))) = (rows[i].active, rows[i].friction) else {
                continue;
            };
            let normal_lambda = normal.map_or(0.0, |n| rows[n].lambda);
            rows[i].bounds = ConstraintBounds::symmetric(mu * normal_lambda);
            let row = &rows[i];
            let clamped = row.bounds.clamp(row.lambda);
            if clamped != row.lambda {
                apply(&mut cache, row.slots, &row.inv_mj, clamped - row.lambda);
                rows[i].lambda = clamped;
            }
        }

        if let Some(row) = rows.iter().find(|row| !row.lambda.is_finite()) {
            return Err(SimError::diverged(format!(
                "constraint multiplier became {}",
                row.lambda
            )));
        }

        let mut solved = 0_usize;
        for (tracked, body_cache) in self.bodies.iter().zip(&cache) {
            if !body_cache.flagged {
                continue;
            }
            let Some(body) = bodies.get_mut(tracked.id) else {
                continue;
            };
            if body.is_immovable() {
                continue;
            }
            body.wake_up();
            body.apply_velocity_delta(
                body_cache.accumulated[0] * dt,
                body_cache.accumulated[1] * dt,
            );
            body.integrate(dt);
            body.mark_constraints_solved();
            solved += 1;
        }

        for (entry, row) in self.entries.iter_mut().zip(&rows) {
            entry.constraint.set_lambda(row.lambda);
            if let (Constraint::Friction(friction), Some((normal, _))) =
                (&mut entry.constraint, row.friction)
            {
                friction.set_normal_lambda(normal.map_or(0.0, |n| rows[n].lambda));
            }
        }
        trace!(constraints = rows.len(), bodies = solved, "solved constraints");
        Ok(())
    }

    fn cache_bodies(&self, bodies: &BodySet, dt: f64) -> Result<Vec<BodyCache>> {
        self.bodies
            .iter()
            .map(|tracked| {
                let body = bodies
                    .get(tracked.id)
                    .ok_or(SimError::InvalidBodyId(tracked.id.raw()))?;
                let data = body.data();
                let inverse_mass = body.inverse_mass();
                let inverse_inertia = *body.world_inverse_inertia();
                Ok(BodyCache {
                    inverse_mass,
                    inverse_inertia,
                    free: [
                        data.linear_velocity / dt + data.force_sum * inverse_mass,
                        data.angular_velocity / dt + inverse_inertia * data.torque_sum,
                    ],
                    accumulated: [Vector3::zeros(); 2],
                    should_solve: inverse_mass > 0.0
                        && (!body.is_sleeping() || body.check_state(BodyState::Integrated)),
                    flagged: false,
                })
            })
            .collect()
    }

    fn build_rows(
        &self,
        bodies: &BodySet,
        cache: &mut [BodyCache],
        dt: f64,
    ) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let [a, b] = entry.slots;
            let pair = body_pair(bodies, &entry.constraint)?;
            let jacobian = entry.constraint.jacobian(pair);
            let bias = entry.constraint.bias(pair, dt);

            let blocks = jacobian.blocks();
            let inv_mj = [
                blocks[0] * cache[a].inverse_mass,
                cache[a].inverse_inertia * blocks[1],
                blocks[2] * cache[b].inverse_mass,
                cache[b].inverse_inertia * blocks[3],
            ];
            let eta = bias / dt
                - jacobian.dot(&[cache[a].free[0], cache[a].free[1], cache[b].free[0], cache[b].free[1]]);
            let diag = jacobian.dot(&inv_mj);

            let friction = entry.constraint.as_friction().map(|friction| {
                (self.position(friction.normal()), friction.coefficient())
            });

            let active = (cache[a].should_solve || cache[b].should_solve)
                && diag > DIAGONAL_EPSILON;
            let lambda = entry.constraint.lambda();
            let lambda = if active {
                cache[a].flagged = true;
                cache[b].flagged = true;
                let warm = if self.config.warm_starting { lambda } else { 0.0 };
                apply(cache, [a, b], &inv_mj, warm);
                warm
            } else {
                lambda
            };

            rows.push(Row {
                slots: [a, b],
                jacobian,
                inv_mj,
                eta,
                diag,
                bounds: entry.constraint.bounds(),
                lambda,
                active,
                friction,
            });
        }
        Ok(rows)
    }
}

fn body_pair<'a>(bodies: &'a BodySet, constraint: &Constraint) -> Result<[&'a RigidBody; 2]> {
    let [a, b] = constraint.bodies();
    let first = bodies.get(a).ok_or(SimError::InvalidBodyId(a.raw()))?;
    let second = bodies.get(b).ok_or(SimError::InvalidBodyId(b.raw()))?;
    Ok([first, second])
}

fn apply(cache: &mut [BodyCache], [a, b]: [usize; 2], inv_mj: &[Vector3<f64>; 4], delta: f64) {
    cache[a].accumulated[0] += inv_mj[0] * delta;
    cache[a].accumulated[1] += inv_mj[1] * delta;
    cache[b].accumulated[0] += inv_mj[2] * delta;
    cache[b].accumulated[1] += inv_mj[3] * delta;
}
