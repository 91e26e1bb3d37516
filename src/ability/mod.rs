//! # Part Abilities
//!
//! Capabilities are tagged values, not types: a part carries a bag of
//! [`Ability`] values keyed by [`AbilityKey`], so "does this part see" is
//! a hash lookup instead of a downcast.
//!
//! Each ability declares which [`PartStat`]s it contributes to. The form
//! folds those contributions across parts (see [`stat`]).

pub mod stat;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::SpiritId;
use crate::plane::{Interactability, PlaneTally};

pub use stat::{Aggregation, PartStat, StatCache, StatValue};

// ============================================================================
// Keys and roles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    Sight,
    Hearing,
    Smell,
    Taste,
    Touch,
    Magic,
}

/// What a channel center does for its system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenterRole {
    /// Drives ticks of everything reachable over the system's channels (brain).
    Control,
    /// Pushes the system's resource outward (heart).
    Distribution,
    /// Produces the system's resource (core).
    Generation,
    /// Takes resource in from outside the body (stomach, lungs).
    Intake,
}

/// Lookup key of an ability. A part holds at most one ability per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityKey {
    Sense(Sense),
    Walk,
    Grasp,
    /// One center per channel system per part.
    Center(String),
    Tether,
}

// ============================================================================
// Ability
// ============================================================================

/// A channel-system center installed on a part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelCenter {
    pub system: String,
    pub role: CenterRole,
    /// Automatic centers tick once per body tick without a controller.
    pub automatic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ability {
    Sensor { sense: Sense, planes: Interactability, range: f64 },
    Walk { speed: f64 },
    Grasp { strength: f64 },
    Center(ChannelCenter),
    /// Possessor marker left by a spirit. `former` is set once the spirit
    /// has left the part.
    Tether { spirit: SpiritId, former: bool },
}

impl Ability {
    pub fn key(&self) -> AbilityKey {
        match self {
            Ability::Sensor { sense, .. } => AbilityKey::Sense(*sense),
            Ability::Walk { .. } => AbilityKey::Walk,
            Ability::Grasp { .. } => AbilityKey::Grasp,
            Ability::Center(c) => AbilityKey::Center(c.system.clone()),
            Ability::Tether { .. } => AbilityKey::Tether,
        }
    }

    /// Stats this ability contributes to.
    pub fn stats(&self) -> &'static [PartStat] {
        match self {
            Ability::Sensor { .. } => &[PartStat::SenseRange, PartStat::SensePlanes],
            Ability::Walk { .. } => &[PartStat::WalkSpeed],
            Ability::Grasp { .. } => &[PartStat::GraspStrength],
            Ability::Center(_) | Ability::Tether { .. } => &[],
        }
    }

    /// This ability's contribution to `stat`, if it declares it.
    pub fn stat_value(&self, stat: PartStat) -> Option<StatValue> {
        match (self, stat) {
            (Ability::Sensor { range, .. }, PartStat::SenseRange) => Some(StatValue::Scalar(*range)),
            (Ability::Sensor { planes, .. }, PartStat::SensePlanes) => {
                Some(StatValue::Planes(PlaneTally::of(*planes)))
            }
            (Ability::Walk { speed }, PartStat::WalkSpeed) => Some(StatValue::Scalar(*speed)),
            (Ability::Grasp { strength }, PartStat::GraspStrength) => Some(StatValue::Scalar(*strength)),
            _ => None,
        }
    }

    pub fn as_center(&self) -> Option<&ChannelCenter> {
        match self {
            Ability::Center(c) => Some(c),
            _ => None,
        }
    }
}

// ============================================================================
// Abilities — the per-part bag
// ============================================================================

/// Abilities of one part, keyed for O(1) lookup.
///
/// Serialized as a plain list since the keys are not strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Ability>", into = "Vec<Ability>")]
pub struct Abilities {
    by_key: HashMap<AbilityKey, Ability>,
}

impl Abilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an ability, returning the one it replaced under the same key.
    pub fn insert(&mut self, ability: Ability) -> Option<Ability> {
        self.by_key.insert(ability.key(), ability)
    }

    pub fn get(&self, key: &AbilityKey) -> Option<&Ability> {
        self.by_key.get(key)
    }

    pub fn get_mut(&mut self, key: &AbilityKey) -> Option<&mut Ability> {
        self.by_key.get_mut(key)
    }

    pub fn remove(&mut self, key: &AbilityKey) -> Option<Ability> {
        self.by_key.remove(key)
    }

    pub fn contains(&self, key: &AbilityKey) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ability> {
        self.by_key.values()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn center(&self, system: &str) -> Option<&ChannelCenter> {
        self.by_key
            .get(&AbilityKey::Center(system.to_string()))
            .and_then(Ability::as_center)
    }

    pub fn centers(&self) -> impl Iterator<Item = &ChannelCenter> {
        self.by_key.values().filter_map(Ability::as_center)
    }

    /// The part's own contribution to `stat`: its abilities declaring the
    /// stat folded together, so a part counts once per stat.
    pub fn stat_value(&self, stat: PartStat) -> Option<StatValue> {
        let values: Vec<StatValue> = self.by_key.values().filter_map(|a| a.stat_value(stat)).collect();
        if values.is_empty() {
            None
        } else {
            Some(stat.aggregate(values))
        }
    }
}

impl From<Vec<Ability>> for Abilities {
    fn from(list: Vec<Ability>) -> Self {
        let mut abilities = Self::new();
        for ability in list {
            abilities.insert(ability);
        }
        abilities
    }
}

impl From<Abilities> for Vec<Ability> {
    fn from(abilities: Abilities) -> Self {
        abilities.by_key.into_values().collect()
    }
}

impl FromIterator<Ability> for Abilities {
    fn from_iter<I: IntoIterator<Item = Ability>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}
