//! # Channel Systems
//!
//! A channel system models one kind of flow through a body: blood through
//! vessels, signal through nerves, energy through ley lines. It owns
//!
//! - conduit edge types ([`ChannelType`]) laid between parts that embed
//!   the conduit's vector material,
//! - center types ([`CenterType`]) installed on designated parts
//!   (heart, brain, core),
//! - bounded [`Resource`]s stored per part.
//!
//! Systems are stateless singletons shared by every body of a kind. All
//! state lives on the form: channel edges in the representation graph,
//! centers in part abilities, amounts in part resources.
//!
//! The trait's provided methods implement the generic behavior
//! (population, pruning, wiring new parts, loss viability). A system
//! overrides [`automatic_tick`](ChannelSystem::automatic_tick) if it has
//! automatic centers; the default reports [`Error::Unimplemented`].

pub mod circulatory;
pub mod energy;
pub mod nervous;
pub mod resource;

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use hashbrown::HashSet;
use tracing::{debug, warn};

use crate::ability::{Ability, CenterRole, ChannelCenter};
use crate::config::EngineConfig;
use crate::form::{BodyRelation, ChannelType, Form, Part, PartConnection, StatusEffect};
use crate::graph::Edge;
use crate::model::{PartId, PropertyMap};
use crate::{Error, Result};

pub use circulatory::Circulatory;
pub use energy::Energy;
pub use nervous::Nervous;
pub use resource::{Combine, Resource};

/// A center a system installs on every part with a designated name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CenterType {
    pub role: CenterRole,
    pub part_name: &'static str,
    pub automatic: bool,
}

impl CenterType {
    /// Roles whose loss can leave the system without a working center.
    pub fn is_vital(&self) -> bool {
        matches!(self.role, CenterRole::Control | CenterRole::Distribution | CenterRole::Generation)
    }
}

// ============================================================================
// ChannelSystem trait
// ============================================================================

pub trait ChannelSystem: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn channels(&self) -> &[ChannelType];

    fn centers(&self) -> &[CenterType];

    fn resources(&self) -> &[Resource];

    fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources().iter().find(|r| r.name == name)
    }

    /// Whether `part` carries one of this system's vector materials.
    fn carries(&self, part: &Part) -> bool {
        self.channels().iter().any(|c| part.embeds(c.vector_material))
    }

    /// Install centers on designated parts, lay channels along attachments
    /// reachable from each center, and seed resources on every part the
    /// channels reach. Running it twice changes nothing.
    ///
    /// Returns the parts carrying one of this system's centers.
    fn populate_body(&self, form: &mut Form, _settings: &PropertyMap) -> Result<Vec<PartId>> {
        let mut installed = Vec::new();
        for center in self.centers() {
            let named: Vec<PartId> = form.parts_by_name(center.part_name).map(Part::id).collect();
            for id in named {
                if let Some(part) = form.part_mut(id) {
                    part.abilities.insert(Ability::Center(ChannelCenter {
                        system: self.name().to_string(),
                        role: center.role,
                        automatic: center.automatic,
                    }));
                    installed.push(id);
                }
            }
        }

        let mut seeded = HashSet::new();
        for &center in &installed {
            let reached = form
                .representation_graph()
                .reachable(center, &PartConnection::ATTACHMENTS, |_| true);
            let attachments: Vec<Edge<PartId, BodyRelation>> = reached
                .iter()
                .flat_map(|&p| form.representation_graph().edges_from(p))
                .filter(|e| e.rel.is_attachment())
                .collect();
            for e in attachments {
                for channel in self.channels() {
                    form.add_channel(e.src, e.dst, *channel)?;
                }
            }
            for id in reached {
                if !seeded.insert(id) {
                    continue;
                }
                if let Some(part) = form.part_mut(id).filter(|p| self.carries(p)) {
                    for r in self.resources() {
                        r.seed(part);
                    }
                }
            }
        }
        debug!(system = self.name(), form = %form.id(), centers = installed.len(), "body populated");
        Ok(installed)
    }

    /// Drop this system's channels at `part` whose vector material is
    /// gone. Does not re-run propagation.
    fn on_body_update(&self, form: &mut Form, part: PartId) -> Vec<Edge<PartId, BodyRelation>> {
        form.prune_channels(part, self.name())
    }

    /// Whether the system still works after `lost` left `form`.
    ///
    /// False when `lost` carried this system's last center of a vital role.
    fn on_body_loss(&self, form: &Form, lost: &Part) -> bool {
        let Some(center) = lost.abilities.center(self.name()) else {
            return true;
        };
        let vital = self.centers().iter().any(|c| c.role == center.role && c.is_vital());
        if !vital {
            return true;
        }
        let remaining = form
            .parts()
            .filter_map(|p| p.abilities.center(self.name()))
            .any(|c| c.role == center.role);
        if !remaining {
            warn!(system = self.name(), part = %lost.id(), role = ?center.role, "last center lost");
        }
        remaining
    }

    /// Wire a freshly attached part into the system: lay a channel to its
    /// attachment neighbour and seed resources when both carry the
    /// vector material. Returns whether any channel was laid.
    fn on_body_new(
        &self,
        form: &mut Form,
        gained: PartId,
        connection: PartConnection,
        to: PartId,
        is_new: bool,
    ) -> Result<bool> {
        if !connection.is_attachment() {
            return Ok(false);
        }
        let mut laid = false;
        for channel in self.channels() {
            laid |= form.add_channel(to, gained, *channel)?;
        }
        if laid && is_new {
            if let Some(part) = form.part_mut(gained) {
                for r in self.resources() {
                    r.seed(part);
                }
            }
        }
        Ok(laid)
    }

    /// Whether the center on `part` may tick now.
    fn can_tick(&self, form: &Form, part: PartId) -> bool {
        form.part(part).is_some_and(|p| {
            !p.is_destroyed()
                && !p.has_effect(StatusEffect::Stunned)
                && p.abilities.center(self.name()).is_some()
        })
    }

    /// Called once per control tick with the parts the controller reached
    /// over this system's channels.
    fn on_control_tick(&self, _form: &mut Form, _reached: &HashSet<PartId>) {}

    /// One tick of an automatic center on `part`, covering `ticks` ticks.
    fn automatic_tick(&self, _form: &mut Form, _part: PartId, _ticks: u64) -> Result<()> {
        Err(Error::Unimplemented(format!("{} has no automatic centers", self.name())))
    }
}

// ============================================================================
// ChannelRegistry
// ============================================================================

/// Name → system lookup for a kind.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    systems: BTreeMap<&'static str, Arc<dyn ChannelSystem>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Circulatory, nervous and energy systems tuned by `config`.
    pub fn standard(config: &EngineConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Circulatory::new(config.heart_increment)));
        registry.register(Arc::new(Nervous::new(config.signal_decay)));
        registry.register(Arc::new(Energy::new(config.energy_generation)));
        registry
    }

    /// Register a system, replacing any other with the same name.
    pub fn register(&mut self, system: Arc<dyn ChannelSystem>) -> Option<Arc<dyn ChannelSystem>> {
        self.systems.insert(system.name(), system)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ChannelSystem>> {
        self.systems.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.systems.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ChannelSystem>> {
        self.systems.values()
    }

    /// Systems with the given names, skipping unknown ones.
    pub fn select<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<Arc<dyn ChannelSystem>> {
        names.into_iter().filter_map(|n| self.get(n)).collect()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry() {
        let registry = ChannelRegistry::standard(&EngineConfig::default());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["circulatory", "energy", "nervous"]);
        assert!(registry.get("circulatory").is_some());
        assert!(registry.get("digestive").is_none());
        assert_eq!(registry.select(["nervous", "digestive"]).len(), 1);
    }

    #[test]
    fn test_nervous_has_no_automatic_tick() {
        let nervous = Nervous::new(1.0);
        let mut form = Form::with_center(Part::new("brain", crate::form::Material::new("flesh")), 1.0);
        let brain = form.center().unwrap();
        assert!(matches!(nervous.automatic_tick(&mut form, brain, 1), Err(Error::Unimplemented(_))));
    }
}
