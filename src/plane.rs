//! # Planes of existence and interactability
//!
//! Every plane (physical, astral, ...) is assigned a distinct small prime.
//! A set of planes is the product of their primes, so:
//!
//! - union is `lcm`
//! - membership is divisibility
//! - "shares a plane" is `gcd != 1`
//!
//! Products are `u64`. The first 15 primes multiply to
//! 614 889 782 588 491 410 (< 2⁶³), which fixes [`MAX_PLANES`] at 15.
//!
//! The registry that hands out primes is owned by the
//! [`Universe`](crate::world::Universe) context; there is no global counter.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Primes handed out to planes, in registration order.
pub const PLANE_PRIMES: [u64; 15] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47];

/// Hard cap on distinct planes (products must fit in `u64`).
pub const MAX_PLANES: usize = PLANE_PRIMES.len();

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

// ============================================================================
// Plane
// ============================================================================

/// A registered plane of existence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plane {
    pub name: String,
    pub prime: u64,
}

impl Plane {
    pub fn index(&self) -> usize {
        PLANE_PRIMES.iter().position(|p| *p == self.prime).unwrap_or(usize::MAX)
    }

    pub fn set(&self) -> Interactability {
        Interactability(self.prime)
    }
}

// ============================================================================
// Interactability
// ============================================================================

/// A squarefree product of plane primes: the set of planes a thing
/// exists on, can sense, or can be sensed from.
///
/// Zero is not a product of primes and reads as the empty set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct Interactability(u64);

impl Interactability {
    /// The empty set.
    pub const NONE: Interactability = Interactability(1);

    pub const fn new(product: u64) -> Self {
        if product == 0 {
            Self::NONE
        } else {
            Self(product)
        }
    }

    pub fn product(&self) -> u64 {
        self.0
    }

    pub fn from_planes<'a>(planes: impl IntoIterator<Item = &'a Plane>) -> Self {
        planes.into_iter().fold(Self::NONE, |acc, p| acc.union(p.set()))
    }

    pub fn is_empty(&self) -> bool {
        self.0 <= 1
    }

    pub fn contains(&self, plane: &Plane) -> bool {
        self.0 % plane.prime == 0
    }

    /// True when the two sets share at least one plane.
    pub fn can_interact(&self, other: Interactability) -> bool {
        gcd(self.0, other.0) != 1
    }

    pub fn union(&self, other: Interactability) -> Interactability {
        let g = gcd(self.0, other.0);
        Interactability(self.0 / g * other.0)
    }

    pub fn intersection(&self, other: Interactability) -> Interactability {
        Interactability(gcd(self.0, other.0))
    }

    pub fn difference(&self, other: Interactability) -> Interactability {
        Interactability(self.0 / gcd(self.0, other.0))
    }

    /// Indices (into [`PLANE_PRIMES`]) of the planes in this set.
    pub fn plane_indices(&self) -> impl Iterator<Item = usize> + '_ {
        PLANE_PRIMES
            .iter()
            .enumerate()
            .filter(|(_, p)| self.0 % **p == 0)
            .map(|(i, _)| i)
    }
}

impl From<u64> for Interactability {
    fn from(product: u64) -> Self {
        Self::new(product)
    }
}

impl From<Interactability> for u64 {
    fn from(set: Interactability) -> Self {
        set.0
    }
}

impl Default for Interactability {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for Interactability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "planes({})", self.0)
    }
}

// ============================================================================
// PlaneTally — multiset of planes
// ============================================================================

/// Per-plane contributor counts.
///
/// A bare product cannot undo a union (removing one contributor must not
/// drop a plane another contributor still supplies), so aggregates over
/// many parts keep a count per prime. [`product`](Self::product) turns
/// the tally back into the squarefree set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PlaneTally {
    counts: [u32; MAX_PLANES],
}

impl PlaneTally {
    pub fn of(set: Interactability) -> Self {
        let mut tally = Self::default();
        for i in set.plane_indices() {
            tally.counts[i] = 1;
        }
        tally
    }

    pub fn add(&mut self, other: &PlaneTally) {
        for (c, o) in self.counts.iter_mut().zip(other.counts.iter()) {
            *c += o;
        }
    }

    pub fn subtract(&mut self, other: &PlaneTally) {
        for (c, o) in self.counts.iter_mut().zip(other.counts.iter()) {
            *c = c.saturating_sub(*o);
        }
    }

    pub fn count(&self, plane: &Plane) -> u32 {
        self.counts.get(plane.index()).copied().unwrap_or(0)
    }

    /// The squarefree union of every plane with a nonzero count.
    pub fn product(&self) -> Interactability {
        Interactability(
            self.counts
                .iter()
                .zip(PLANE_PRIMES.iter())
                .filter(|(c, _)| **c > 0)
                .map(|(_, p)| *p)
                .product(),
        )
    }
}

// ============================================================================
// PlaneRegistry
// ============================================================================

/// Hands out one prime per plane name, in registration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaneRegistry {
    planes: Vec<Plane>,
    limit: usize,
}

impl Default for PlaneRegistry {
    fn default() -> Self {
        Self { planes: Vec::new(), limit: MAX_PLANES }
    }
}

impl PlaneRegistry {
    pub const PHYSICAL: &'static str = "physical";
    pub const ASTRAL: &'static str = "astral";
    pub const ETHEREAL: &'static str = "ethereal";

    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that refuses planes beyond `limit` (never more than
    /// [`MAX_PLANES`]).
    pub fn with_limit(limit: usize) -> Self {
        Self { planes: Vec::new(), limit: limit.min(MAX_PLANES) }
    }

    /// Registry preloaded with physical (2), astral (3) and ethereal (5).
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for name in [Self::PHYSICAL, Self::ASTRAL, Self::ETHEREAL] {
            // Three names never hit the cap.
            let _ = registry.register(name);
        }
        registry
    }

    /// Register a plane, or return the existing one with that name.
    pub fn register(&mut self, name: &str) -> Result<Plane> {
        if let Some(existing) = self.get(name) {
            return Ok(existing.clone());
        }
        if self.planes.len() >= self.limit {
            return Err(Error::PlaneLimit { max: self.limit });
        }
        let prime = PLANE_PRIMES[self.planes.len()];
        let plane = Plane { name: name.to_string(), prime };
        debug!(plane = name, prime, "plane registered");
        self.planes.push(plane.clone());
        Ok(plane)
    }

    pub fn get(&self, name: &str) -> Option<&Plane> {
        self.planes.iter().find(|p| p.name == name)
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Set of the named planes. Unknown names are an error.
    pub fn set_of(&self, names: &[impl AsRef<str>]) -> Result<Interactability> {
        names.iter().try_fold(Interactability::NONE, |acc, name| {
            let plane = self
                .get(name.as_ref())
                .ok_or_else(|| Error::NotFound(format!("plane '{}'", name.as_ref())))?;
            Ok(acc.union(plane.set()))
        })
    }

    /// Names of the registered planes contained in `set`.
    pub fn names_in(&self, set: Interactability) -> Vec<&str> {
        self.planes.iter().filter(|p| set.contains(p)).map(|p| p.name.as_str()).collect()
    }
}
