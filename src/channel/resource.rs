//! Bounded resources carried by channel systems.

use serde::Serialize;
use tracing::trace;

use crate::form::Part;

/// How amounts of a resource combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Combine {
    /// Plain addition and subtraction.
    Additive,
    /// Presence flag: adding is OR, subtracting is AND-NOT.
    Signal,
}

/// A typed quantity flowing through a channel system.
///
/// Every write goes through [`clamp`](Self::clamp), so a stored amount
/// is always within `[empty, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Resource {
    pub name: &'static str,
    pub empty: f64,
    pub max: f64,
    /// Amount seeded into a part the first time the system reaches it.
    pub initial: f64,
    pub combine: Combine,
}

impl Resource {
    pub fn clamp(&self, amount: f64) -> f64 {
        if amount.is_nan() {
            return self.empty;
        }
        amount.clamp(self.empty, self.max)
    }

    pub fn add(&self, current: f64, delta: f64) -> f64 {
        match self.combine {
            Combine::Additive => self.clamp(current + delta),
            Combine::Signal => {
                if current > self.empty || delta > 0.0 { self.max } else { self.empty }
            }
        }
    }

    pub fn subtract(&self, current: f64, delta: f64) -> f64 {
        match self.combine {
            Combine::Additive => self.clamp(current - delta),
            Combine::Signal => {
                if delta > 0.0 { self.empty } else { self.clamp(current) }
            }
        }
    }

    /// Amount on `part`, `empty` if the part holds none.
    pub fn amount(&self, part: &Part) -> f64 {
        part.resources.get(self.name).copied().unwrap_or(self.empty)
    }

    /// Overwrite the amount on `part`, clamped. Returns the stored value.
    pub fn set(&self, part: &mut Part, amount: f64) -> f64 {
        let v = self.clamp(amount);
        part.resources.insert(self.name.to_string(), v);
        v
    }

    pub fn give(&self, part: &mut Part, delta: f64) -> f64 {
        let v = self.add(self.amount(part), delta);
        trace!(resource = self.name, part = %part.id(), delta, amount = v, "resource in");
        self.set(part, v)
    }

    pub fn take(&self, part: &mut Part, delta: f64) -> f64 {
        let v = self.subtract(self.amount(part), delta);
        trace!(resource = self.name, part = %part.id(), delta, amount = v, "resource out");
        self.set(part, v)
    }

    /// Seed the initial amount if the part has none. Returns whether it did.
    pub fn seed(&self, part: &mut Part) -> bool {
        if part.resources.contains_key(self.name) {
            return false;
        }
        self.set(part, self.initial);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Material;

    const WATER: Resource = Resource { name: "water", empty: 0.0, max: 1.0, initial: 0.5, combine: Combine::Additive };
    const PULSE: Resource = Resource { name: "pulse", empty: 0.0, max: 1.0, initial: 0.0, combine: Combine::Signal };

    #[test]
    fn test_additive_clamps_both_ends() {
        let mut p = Part::new("cup", Material::new("clay"));
        assert!(WATER.seed(&mut p));
        assert!(!WATER.seed(&mut p));
        assert_eq!(WATER.give(&mut p, 0.75), 1.0);
        assert_eq!(WATER.take(&mut p, 3.0), 0.0);
        assert_eq!(WATER.set(&mut p, f64::NAN), 0.0);
    }

    #[test]
    fn test_signal_is_boolean() {
        let mut p = Part::new("nerve", Material::new("flesh"));
        assert_eq!(PULSE.amount(&p), 0.0);
        assert_eq!(PULSE.give(&mut p, 0.1), 1.0);
        assert_eq!(PULSE.give(&mut p, 0.0), 1.0);
        assert_eq!(PULSE.take(&mut p, 0.1), 0.0);
        assert_eq!(PULSE.take(&mut p, 0.0), 0.0);
    }
}
