//! Stat aggregation across parts.
//!
//! A [`PartStat`] names a quantity several parts may contribute to and
//! how the contributions combine. Every combination family has an exact
//! inverse, so the soma can keep aggregates current as parts come and go
//! without re-scanning the body:
//!
//! | Family       | aggregate      | extract                      |
//! |--------------|----------------|------------------------------|
//! | `Sum`        | Σv             | agg − v                      |
//! | `Average`    | Σv / n         | (agg·n − v) / (n − 1)        |
//! | `PrimeUnion` | per-prime tally| tally − tally(v)             |

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::plane::{Interactability, PlaneTally};

use super::Abilities;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    Sum,
    Average,
    PrimeUnion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartStat {
    WalkSpeed,
    GraspStrength,
    SenseRange,
    SensePlanes,
}

impl PartStat {
    pub const ALL: [PartStat; 4] =
        [PartStat::WalkSpeed, PartStat::GraspStrength, PartStat::SenseRange, PartStat::SensePlanes];

    pub fn aggregation(&self) -> Aggregation {
        match self {
            PartStat::WalkSpeed | PartStat::SenseRange => Aggregation::Average,
            PartStat::GraspStrength => Aggregation::Sum,
            PartStat::SensePlanes => Aggregation::PrimeUnion,
        }
    }

    /// Value of the stat when no part contributes.
    pub fn default_value(&self) -> StatValue {
        match self.aggregation() {
            Aggregation::PrimeUnion => StatValue::Planes(PlaneTally::default()),
            _ => StatValue::Scalar(0.0),
        }
    }

    /// Fold contributions. Zero contributors yield the default.
    pub fn aggregate(&self, values: impl IntoIterator<Item = StatValue>) -> StatValue {
        let mut acc = self.default_value();
        let mut count = 0;
        for v in values {
            acc = self.accumulate(&acc, &v, count);
            count += 1;
        }
        acc
    }

    /// Aggregate after adding one contributor to `prior_count` others.
    pub fn accumulate(&self, aggregate: &StatValue, added: &StatValue, prior_count: usize) -> StatValue {
        match (self.aggregation(), aggregate, added) {
            (Aggregation::Sum, StatValue::Scalar(a), StatValue::Scalar(v)) => StatValue::Scalar(a + v),
            (Aggregation::Average, StatValue::Scalar(a), StatValue::Scalar(v)) => {
                let n = prior_count as f64;
                StatValue::Scalar((a * n + v) / (n + 1.0))
            }
            (Aggregation::PrimeUnion, StatValue::Planes(a), StatValue::Planes(v)) => {
                let mut tally = *a;
                tally.add(v);
                StatValue::Planes(tally)
            }
            _ => {
                trace!(stat = ?self, "mismatched stat value ignored");
                aggregate.clone()
            }
        }
    }

    /// Aggregate after removing one of `prior_count` contributors.
    ///
    /// Removing the last contributor yields the default.
    pub fn extract(&self, aggregate: &StatValue, removed: &StatValue, prior_count: usize) -> StatValue {
        if prior_count <= 1 {
            return self.default_value();
        }
        match (self.aggregation(), aggregate, removed) {
            (Aggregation::Sum, StatValue::Scalar(a), StatValue::Scalar(v)) => StatValue::Scalar(a - v),
            (Aggregation::Average, StatValue::Scalar(a), StatValue::Scalar(v)) => {
                let n = prior_count as f64;
                StatValue::Scalar((a * n - v) / (n - 1.0))
            }
            (Aggregation::PrimeUnion, StatValue::Planes(a), StatValue::Planes(v)) => {
                let mut tally = *a;
                tally.subtract(v);
                StatValue::Planes(tally)
            }
            _ => {
                trace!(stat = ?self, "mismatched stat value ignored");
                aggregate.clone()
            }
        }
    }
}

// ============================================================================
// StatValue
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatValue {
    Scalar(f64),
    Planes(PlaneTally),
}

impl StatValue {
    pub fn scalar(&self) -> Option<f64> {
        match self {
            StatValue::Scalar(v) => Some(*v),
            StatValue::Planes(_) => None,
        }
    }

    /// The plane set a prime-union value covers.
    pub fn planes(&self) -> Option<Interactability> {
        match self {
            StatValue::Planes(t) => Some(t.product()),
            StatValue::Scalar(_) => None,
        }
    }
}

// ============================================================================
// StatCache
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct CachedStat {
    value: StatValue,
    count: usize,
}

/// Running aggregates for every stat over a body's parts.
///
/// Updated with [`gain`](Self::gain)/[`lose`](Self::lose) as parts join or
/// leave; reads never re-scan.
#[derive(Debug, Clone, Default)]
pub struct StatCache {
    entries: HashMap<PartStat, CachedStat>,
}

impl StatCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one part's abilities.
    pub fn gain(&mut self, abilities: &Abilities) {
        for stat in PartStat::ALL {
            let Some(v) = abilities.stat_value(stat) else { continue };
            let entry = self
                .entries
                .entry(stat)
                .or_insert_with(|| CachedStat { value: stat.default_value(), count: 0 });
            entry.value = stat.accumulate(&entry.value, &v, entry.count);
            entry.count += 1;
        }
    }

    /// Take one part's abilities back out.
    pub fn lose(&mut self, abilities: &Abilities) {
        for stat in PartStat::ALL {
            let Some(v) = abilities.stat_value(stat) else { continue };
            let Some(entry) = self.entries.get_mut(&stat) else { continue };
            entry.value = stat.extract(&entry.value, &v, entry.count);
            entry.count = entry.count.saturating_sub(1);
            if entry.count == 0 {
                self.entries.remove(&stat);
            }
        }
    }

    pub fn get(&self, stat: PartStat) -> StatValue {
        self.entries.get(&stat).map_or_else(|| stat.default_value(), |e| e.value.clone())
    }

    /// Number of parts currently contributing to `stat`.
    pub fn contributors(&self, stat: PartStat) -> usize {
        self.entries.get(&stat).map_or(0, |e| e.count)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
