//! Relation types of the representation and coverage graphs.

use serde::{Deserialize, Serialize};

use crate::graph::Relation;
use crate::model::{PartId, Property};

// ============================================================================
// PartConnection
// ============================================================================

/// How two parts touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartConnection {
    /// Physical attachment that can be cut.
    Joined,
    /// Inseparable attachment; a part merges with at most one other.
    Merged,
    /// Contact that is not an attachment (grasping, wearing).
    Holding,
    HeldBy,
}

impl PartConnection {
    /// Attachments are the only edges that decide connectivity.
    pub const ATTACHMENTS: [BodyRelation; 2] =
        [BodyRelation::Attach(PartConnection::Joined), BodyRelation::Attach(PartConnection::Merged)];

    pub fn is_attachment(&self) -> bool {
        matches!(self, PartConnection::Joined | PartConnection::Merged)
    }

    pub fn is_severable(&self) -> bool {
        matches!(self, PartConnection::Joined)
    }
}

// ============================================================================
// ChannelType
// ============================================================================

/// A conduit type of one channel system (blood vessel, nerve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelType {
    pub system: &'static str,
    pub name: &'static str,
    /// Both ends of a channel must embed this material.
    pub vector_material: &'static str,
}

// ============================================================================
// BodyRelation
// ============================================================================

/// Edge type of a form's representation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BodyRelation {
    Attach(PartConnection),
    Channel(ChannelType),
}

impl BodyRelation {
    pub fn is_attachment(&self) -> bool {
        matches!(self, BodyRelation::Attach(c) if c.is_attachment())
    }

    pub fn channel_of(&self, system: &str) -> Option<&ChannelType> {
        match self {
            BodyRelation::Channel(c) if c.system == system => Some(c),
            _ => None,
        }
    }
}

impl Relation<PartId> for BodyRelation {
    fn is_bidirectional(&self) -> bool {
        !matches!(self, BodyRelation::Attach(PartConnection::Holding | PartConnection::HeldBy))
    }

    fn inverse(&self) -> Self {
        match self {
            BodyRelation::Attach(PartConnection::Holding) => BodyRelation::Attach(PartConnection::HeldBy),
            BodyRelation::Attach(PartConnection::HeldBy) => BodyRelation::Attach(PartConnection::Holding),
            other => *other,
        }
    }

    fn max_permitted(&self) -> Option<usize> {
        match self {
            BodyRelation::Attach(PartConnection::Merged) => Some(1),
            BodyRelation::Attach(PartConnection::HeldBy) => Some(1),
            _ => None,
        }
    }
}

// ============================================================================
// Coverage
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeSide {
    Front,
    Back,
    Left,
    Right,
    Top,
    Bottom,
}

impl RelativeSide {
    pub const ALL: [RelativeSide; 6] = [
        RelativeSide::Front,
        RelativeSide::Back,
        RelativeSide::Left,
        RelativeSide::Right,
        RelativeSide::Top,
        RelativeSide::Bottom,
    ];
}

/// `a -Covers(side)-> b`: `a` lies over `b` on `b`'s `side`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CoverageType {
    Covers(RelativeSide),
    CoveredOn(RelativeSide),
}

impl CoverageType {
    pub fn side(&self) -> RelativeSide {
        match self {
            CoverageType::Covers(s) | CoverageType::CoveredOn(s) => *s,
        }
    }
}

impl Relation<PartId> for CoverageType {
    fn is_bidirectional(&self) -> bool {
        false
    }

    fn inverse(&self) -> Self {
        match self {
            CoverageType::Covers(s) => CoverageType::CoveredOn(*s),
            CoverageType::CoveredOn(s) => CoverageType::Covers(*s),
        }
    }
}

/// Fraction of the covered side the coverer hides.
pub const COVERAGE: Property<f64> = Property::new("coverage", || 1.0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverses_are_involutions() {
        let rels = [
            BodyRelation::Attach(PartConnection::Joined),
            BodyRelation::Attach(PartConnection::Merged),
            BodyRelation::Attach(PartConnection::Holding),
            BodyRelation::Attach(PartConnection::HeldBy),
        ];
        for r in rels {
            assert_eq!(r.inverse().inverse(), r);
        }
        for side in RelativeSide::ALL {
            let c = CoverageType::Covers(side);
            assert_eq!(c.inverse(), CoverageType::CoveredOn(side));
            assert_eq!(c.inverse().inverse(), c);
        }
    }

    #[test]
    fn test_only_joined_and_merged_attach() {
        assert!(BodyRelation::Attach(PartConnection::Joined).is_attachment());
        assert!(BodyRelation::Attach(PartConnection::Merged).is_attachment());
        assert!(!BodyRelation::Attach(PartConnection::Holding).is_attachment());
        assert!(PartConnection::Joined.is_severable());
        assert!(!PartConnection::Merged.is_severable());
    }
}
