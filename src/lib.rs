//! # soma-rs — Composable Bodies and Channel Systems
//!
//! A tick-driven simulation kernel for bodies built out of parts. A body
//! is a graph: parts joined, merged and held, laid over one another,
//! threaded by vessels and nerves that carry typed resources. Spirits
//! tether to parts and think through whatever the body still reaches.
//!
//! ## Design Principles
//!
//! 1. **Arena, not pointers**: parts live in their [`Form`] keyed by
//!    [`PartId`]; every cross-reference is an id
//! 2. **Invertible relations**: a stored edge answers queries from both ends
//! 3. **Tagged abilities**: capabilities are data looked up by key, never
//!    type checks
//! 4. **Explicit context**: planes and channel systems live in a
//!    [`Universe`], not in globals
//!
//! ## Quick Start
//!
//! ```rust
//! use soma::{BodyPlan, EngineConfig, Kind, KindSettings, Universe};
//!
//! # fn example() -> soma::Result<()> {
//! let mut universe = Universe::new(EngineConfig::default())?;
//! let plan = BodyPlan::from_json(r#"{
//!     "base_mass": 70.0,
//!     "parts": [
//!         { "name": "torso", "material": { "name": "flesh" },
//!           "embedded": [ { "name": "blood" } ] },
//!         { "name": "heart", "parent": "torso", "connection": "merged",
//!           "material": { "name": "muscle" },
//!           "embedded": [ { "name": "blood" } ] }
//!     ]
//! }"#)?;
//! let kind = Kind::from_registry("blob", plan, universe.channels(), &["circulatory"])?;
//! universe.register_kind(kind);
//!
//! let mut soma = universe.generate_soma("blob", &KindSettings::new())?;
//! soma.tick(1)?;
//! assert!(soma.is_viable());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Layers
//!
//! | Layer | Module | Description |
//! |-------|--------|-------------|
//! | Graph | [`graph`] | Typed multigraph with implicit inverse edges |
//! | Body | [`form`] | Part arena, attachments, coverage, severance |
//! | Flow | [`channel`] | Circulatory, nervous and energy systems |
//! | Life | [`soma`], [`spirit`] | Living bodies and the minds tethered to them |
//! | Shell | [`actor`], [`world`] | Physics, spawning, per-actor isolation |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod graph;
pub mod plane;
pub mod ability;
pub mod form;
pub mod channel;
pub mod spirit;
pub mod soma;
pub mod kind;
pub mod actor;
pub mod world;
pub mod config;
pub mod export;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    ActorId, FormId, PartId, SpiritId,
    Position, Property, PropertyMap, Value, Vec3,
};

// ============================================================================
// Re-exports: Bodies
// ============================================================================

pub use ability::{Ability, AbilityKey, PartStat, StatValue};
pub use form::{Form, Material, Part, PartConnection, RelativeSide, Visage};
pub use plane::{Interactability, PlaneRegistry};
pub use soma::Soma;
pub use spirit::{Mind, Spirit, Tether};

// ============================================================================
// Re-exports: Systems and shell
// ============================================================================

pub use actor::Actor;
pub use channel::{ChannelRegistry, ChannelSystem};
pub use config::EngineConfig;
pub use kind::{BodyPlan, Kind, KindSettings};
pub use world::{GameMap, Terrain, Universe, World};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Relation {relation} does not accept {src} -> {dst}")]
    EndpointType { relation: String, src: String, dst: String },

    #[error("Relation {relation} on {node} is capped at {max}")]
    Capacity { relation: String, node: String, max: usize },

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Not implemented: {0}")]
    Unimplemented(String),

    #[error("Plane limit of {max} reached")]
    PlaneLimit { max: usize },

    #[error("Invalid body plan: {0}")]
    InvalidBodyPlan(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
