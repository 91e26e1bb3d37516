//! Energy: a core generates it into everything on its ley lines.

use tracing::trace;

use crate::ability::CenterRole;
use crate::form::{ChannelType, Form};
use crate::model::PartId;
use crate::{Error, Result};

use super::{CenterType, ChannelSystem, Combine, Resource};

pub const LEY_LINE: ChannelType = ChannelType { system: "energy", name: "ley_line", vector_material: "mana" };

pub const ENERGY: Resource =
    Resource { name: "energy", empty: 0.0, max: 100.0, initial: 0.0, combine: Combine::Additive };

pub const CORE: CenterType = CenterType { role: CenterRole::Generation, part_name: "core", automatic: true };

#[derive(Debug, Clone)]
pub struct Energy {
    rate: f64,
}

impl Energy {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl ChannelSystem for Energy {
    fn name(&self) -> &'static str {
        "energy"
    }

    fn channels(&self) -> &[ChannelType] {
        &[LEY_LINE]
    }

    fn centers(&self) -> &[CenterType] {
        &[CORE]
    }

    fn resources(&self) -> &[Resource] {
        &[ENERGY]
    }

    /// Generate `rate · ticks` into the core and every part on its ley lines.
    fn automatic_tick(&self, form: &mut Form, part: PartId, ticks: u64) -> Result<()> {
        if !form.contains(part) {
            return Err(Error::NotFound(format!("core part {part}")));
        }
        let delta = self.rate * ticks as f64;
        let reached = form.channeled_parts(part, self.name());
        for id in &reached {
            if let Some(p) = form.part_mut(*id) {
                ENERGY.give(p, delta);
            }
        }
        trace!(core = %part, delta, parts = reached.len(), "energy generated");
        Ok(())
    }
}
