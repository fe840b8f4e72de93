//! Contacts and persistent contact manifolds.
//!
//! A [`Manifold`] keeps up to [`MAX_CONTACTS`] contacts between one pair of
//! colliders across steps. Contacts are stored with their local positions on
//! both colliders, so that after the colliders move each stored contact can
//! be checked against where its points have drifted:
//!
//! ```text
//! step n:    A ●────● B      contact recorded (world, local)
//! step n+1:  A ●──────● B    pose(local) vs recorded world
//!                            drift >= separation → pruned
//! ```

use std::fmt;

use nalgebra::{Point3, Vector3};
use smallvec::SmallVec;
use sim_types::{ColliderId, Pose};
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of contacts kept per manifold.
pub const MAX_CONTACTS: usize = 4;

/// An unordered pair of colliders, stored with the lower id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColliderPair {
    first: ColliderId,
    second: ColliderId,
}

impl ColliderPair {
    /// Create a normalized pair.
    #[must_use]
    pub fn new(a: ColliderId, b: ColliderId) -> Self {
        if a <= b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }

    /// Collider with the lower id.
    #[must_use]
    pub fn first(&self) -> ColliderId {
        self.first
    }

    /// Collider with the higher id.
    #[must_use]
    pub fn second(&self) -> ColliderId {
        self.second
    }

    /// Whether the pair involves a collider.
    #[must_use]
    pub fn contains(&self, id: ColliderId) -> bool {
        self.first == id || self.second == id
    }
}

impl fmt::Display for ColliderPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// A single contact point between two colliders.
///
/// Index 0 refers to the first collider of the pair and index 1 to the
/// second. The normal points from the first collider to the second, so
/// `(world_position[1] - world_position[0]) · normal == -penetration`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Contact {
    /// Penetration depth, non-negative.
    pub penetration: f64,
    /// Unit contact normal.
    pub normal: Vector3<f64>,
    /// Deepest points on each collider in world coordinates.
    pub world_position: [Point3<f64>; 2],
    /// The same points in each collider's frame.
    pub local_position: [Point3<f64>; 2],
}

impl Contact {
    /// Whether the contact's points are within `separation` of `other`'s on
    /// both colliders.
    #[must_use]
    pub fn is_near(&self, other: &Self, separation: f64) -> bool {
        (self.world_position[0] - other.world_position[0]).norm() < separation
            && (self.world_position[1] - other.world_position[1]).norm() < separation
    }

    /// Whether the contact points still follow their colliders.
    ///
    /// Each local position is re-projected through the current pose and
    /// compared with the world position recorded when the contact was found.
    #[must_use]
    pub fn is_persistent(&self, poses: [&Pose; 2], separation: f64) -> bool {
        (0..2).all(|i| {
            let current = poses[i].transform_point(&self.local_position[i]);
            (current - self.world_position[i]).norm() < separation
        })
    }
}

/// States of a manifold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ManifoldState {
    /// The colliders intersect.
    Intersecting = 1,
    /// The manifold changed during the last collision update.
    Updated = 1 << 1,
}

/// Bitset of [`ManifoldState`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManifoldStates(u8);

impl ManifoldStates {
    /// No state set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Whether a state is set.
    #[must_use]
    pub const fn contains(self, state: ManifoldState) -> bool {
        self.0 & state as u8 != 0
    }

    /// Set a state.
    pub fn insert(&mut self, state: ManifoldState) {
        self.0 |= state as u8;
    }

    /// Clear a state.
    pub fn remove(&mut self, state: ManifoldState) {
        self.0 &= !(state as u8);
    }

    /// Set or clear a state.
    pub fn set(&mut self, state: ManifoldState, value: bool) {
        if value {
            self.insert(state);
        } else {
            self.remove(state);
        }
    }
}

/// Persistent set of contacts between two colliders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Manifold {
    contacts: SmallVec<[Contact; MAX_CONTACTS]>,
    states: ManifoldStates,
}

impl Manifold {
    /// Create an empty, disjoint manifold.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contacts.
    #[must_use]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// State bits.
    #[must_use]
    pub fn states(&self) -> ManifoldStates {
        self.states
    }

    /// Whether the colliders intersect.
    #[must_use]
    pub fn is_intersecting(&self) -> bool {
        self.states.contains(ManifoldState::Intersecting)
    }

    /// Whether the manifold changed during the last collision update.
    #[must_use]
    pub fn is_updated(&self) -> bool {
        self.states.contains(ManifoldState::Updated)
    }

    pub(crate) fn set_state(&mut self, state: ManifoldState, value: bool) {
        self.states.set(state, value);
    }

    /// Drop every contact and mark the manifold disjoint and updated.
    pub(crate) fn set_disjoint(&mut self) {
        self.contacts.clear();
        self.states.remove(ManifoldState::Intersecting);
        self.states.insert(ManifoldState::Updated);
    }

    /// Remove contacts whose points no longer follow their colliders and
    /// report whether any were removed.
    pub(crate) fn prune(&mut self, poses: [&Pose; 2], separation: f64) -> bool {
        let before = self.contacts.len();
        self.contacts
            .retain(|contact| contact.is_persistent(poses, separation));
        if self.contacts.len() == before {
            return false;
        }
        trace!(
            removed = before - self.contacts.len(),
            remaining = self.contacts.len(),
            "pruned stale contacts"
        );
        true
    }

    /// Merge a new contact into the manifold.
    ///
    /// A contact near an existing one refreshes that slot's depth and
    /// normal. Otherwise it is appended, and a full manifold is reduced back
    /// to [`MAX_CONTACTS`] with [`limit`].
    ///
    /// Returns whether the set of contact points changed. Refreshing a slot
    /// does not count, and neither does a new contact that [`limit`] drops.
    pub(crate) fn add_contact(&mut self, contact: Contact, separation: f64) -> bool {
        if let Some(existing) = self
            .contacts
            .iter_mut()
            .find(|existing| existing.is_near(&contact, separation))
        {
            existing.penetration = contact.penetration;
            existing.normal = contact.normal;
            return false;
        }

        if self.contacts.len() < MAX_CONTACTS {
            self.contacts.push(contact);
            return true;
        }

        let kept = limit([
            self.contacts[0],
            self.contacts[1],
            self.contacts[2],
            self.contacts[3],
            contact,
        ]);
        if !kept.contains(&contact) {
            return false;
        }
        self.contacts.clear();
        self.contacts.extend(kept);
        true
    }
}

/// Choose four of five contacts that cover the largest area.
///
/// Keeps the deepest contact, then the one farthest from it, then the one
/// farthest from the line through the first two, then the one farthest from
/// their plane. Distances are measured on the first collider.
#[must_use]
pub fn limit(candidates: [Contact; MAX_CONTACTS + 1]) -> [Contact; MAX_CONTACTS] {
    let point = |i: usize| candidates[i].world_position[0];
    let mut remaining: SmallVec<[usize; MAX_CONTACTS + 1]> = (0..candidates.len()).collect();

    let mut take_best = |score: &dyn Fn(usize) -> f64| -> usize {
        let (slot, _) = remaining
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(best, best_score), (slot, &i)| {
                let s = score(i);
                if s > best_score { (slot, s) } else { (best, best_score) }
            });
        remaining.remove(slot)
    };

    let deepest = take_best(&|i| candidates[i].penetration);
    let p0 = point(deepest);

    let farthest = take_best(&|i| (point(i) - p0).norm_squared());
    let edge = point(farthest) - p0;

    let off_edge = take_best(&|i| edge.cross(&(point(i) - p0)).norm_squared());
    let normal = edge.cross(&(point(off_edge) - p0));

    let off_plane = take_best(&|i| normal.dot(&(point(i) - p0)).abs());

    [
        candidates[deepest],
        candidates[farthest],
        candidates[off_edge],
        candidates[off_plane],
    ]
}
