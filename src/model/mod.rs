//! # Simulation Data Model
//!
//! Plain DTOs shared by every layer: identifiers, dynamically typed
//! values and property bags, and the small geometry types used by the
//! actor shell.
//!
//! Design rule: no graph logic, no tick logic here. This module is pure
//! data.

pub mod ids;
pub mod value;
pub mod property_map;
pub mod vector;

pub use ids::{ActorId, FormId, PartId, SpiritId};
pub use value::{FromValue, Value};
pub use property_map::{Property, PropertyMap};
pub use vector::{Position, Vec3};
