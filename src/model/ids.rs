//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Parts, forms, spirits and actors are referenced by id everywhere; the
//! owning arena resolves the id to data. Ids are random (v4) so that
//! forms built independently never collide when pieces are merged.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                // Short form keeps logs readable; collisions on 8 hex digits
                // only matter to humans.
                let s = self.0.simple().to_string();
                write!(f, "{}", &s[..8])
            }
        }
    };
}

define_id! {
    /// Identifier of a part, stable for the part's whole life.
    PartId
}

define_id! {
    /// Identifier of a form (soma or visage graph).
    FormId
}

define_id! {
    /// Identifier of a spirit/soul.
    SpiritId
}

define_id! {
    /// Identifier of an actor.
    ActorId
}
