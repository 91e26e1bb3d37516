//! # Soma
//!
//! A living body: a [`Form`] plus the channel systems flowing through it,
//! the spirits bound to it and running stat aggregates.
//!
//! Every structural change to a body goes through the soma so that the
//! systems, spirits and the [`StatCache`] see it:
//!
//! | Change          | Systems          | Spirits                      | Stats |
//! |-----------------|------------------|------------------------------|-------|
//! | part attached   | `on_body_new`    | –                            | gain  |
//! | part updated    | `on_body_update` | `on_any_part_state_change`   | swap  |
//! | piece broke off | `on_body_loss`   | `on_any_severances`          | lose  |
//! | effect applied  | –                | `on_host_effect_applied`     | –     |
//!
//! ## Tick
//!
//! 1. Every control center (brain) walks its system's channels, ticks the
//!    automatic centers it reaches and runs the spirits tethered inside
//!    the reached parts.
//! 2. Automatic centers no controller reached tick on their own.
//! 3. Body-bound spirits think through the contiguous body; bodiless
//!    spirits drift.

use std::sync::Arc;

use hashbrown::HashSet;
use tracing::{debug, trace, warn};

use crate::ability::{Abilities, AbilityKey, CenterRole, PartStat, StatCache, StatValue};
use crate::channel::ChannelSystem;
use crate::form::{Form, Part, PartConnection, RelativeSide, StatusEffect};
use crate::model::{PartId, PropertyMap, SpiritId};
use crate::spirit::{SeveranceOutcome, Spirit, Tether};
use crate::{Error, Result};

/// A piece that broke off a body, with the spirits that went along.
#[derive(Debug)]
pub struct BrokenPiece {
    pub form: Form,
    pub spirits: Vec<Spirit>,
}

// ============================================================================
// Soma
// ============================================================================

#[derive(Debug)]
pub struct Soma {
    form: Form,
    systems: Vec<Arc<dyn ChannelSystem>>,
    spirits: Vec<Spirit>,
    stats: StatCache,
    broken_off: Vec<BrokenPiece>,
    viable: bool,
}

impl Soma {
    pub fn new(form: Form, systems: Vec<Arc<dyn ChannelSystem>>) -> Self {
        let mut stats = StatCache::new();
        for part in form.parts() {
            stats.gain(&part.abilities);
        }
        Self { form, systems, spirits: Vec::new(), stats, broken_off: Vec::new(), viable: true }
    }

    /// Body for a piece that broke off another body.
    pub fn from_piece(piece: BrokenPiece, systems: Vec<Arc<dyn ChannelSystem>>) -> Self {
        let mut soma = Self::new(piece.form, systems);
        soma.spirits = piece.spirits;
        soma
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn systems(&self) -> &[Arc<dyn ChannelSystem>] {
        &self.systems
    }

    pub fn system(&self, name: &str) -> Option<&Arc<dyn ChannelSystem>> {
        self.systems.iter().find(|s| s.name() == name)
    }

    pub fn spirits(&self) -> &[Spirit] {
        &self.spirits
    }

    pub fn spirit(&self, id: SpiritId) -> Option<&Spirit> {
        self.spirits.iter().find(|s| s.id() == id)
    }

    /// False once a system lost its last vital center.
    pub fn is_viable(&self) -> bool {
        self.viable
    }

    pub fn mass(&self) -> f64 {
        self.form.mass()
    }

    // ========================================================================
    // Setup
    // ========================================================================

    /// Run every system's population over the body. Idempotent.
    pub fn populate(&mut self, settings: &PropertyMap) -> Result<Vec<PartId>> {
        let mut centers = Vec::new();
        for system in &self.systems {
            centers.extend(system.populate_body(&mut self.form, settings)?);
        }
        self.rebuild_stats();
        Ok(centers)
    }

    /// Bind a spirit: to the first part that can host it (control centers
    /// first), or to the whole body when it has no requirement and no
    /// part hosts it.
    pub fn add_spirit(&mut self, mut spirit: Spirit) -> SpiritId {
        let mut hosts: Vec<PartId> = self.form.part_ids().collect();
        hosts.sort_by_key(|id| {
            let controls = self
                .form
                .part(*id)
                .is_some_and(|p| p.abilities.centers().any(|c| c.role == CenterRole::Control));
            (!controls, *id)
        });
        let host = hosts.into_iter().find(|id| spirit.can_attach_host(&self.form, *id));
        match host {
            Some(id) => {
                spirit.attach(&mut self.form, id);
            }
            None => spirit.attach_body(),
        }
        let id = spirit.id();
        self.spirits.push(spirit);
        id
    }

    /// Add a spirit exactly as it is, without looking for a host.
    pub fn adopt_spirit(&mut self, spirit: Spirit) {
        self.spirits.push(spirit);
    }

    /// Tether an already-added spirit to `part`. Returns the tether afterwards.
    pub fn tether(&mut self, spirit: SpiritId, part: PartId) -> Option<PartId> {
        let s = self.spirits.iter_mut().find(|s| s.id() == spirit)?;
        s.attach(&mut self.form, part)
    }

    // ========================================================================
    // Growth & change
    // ========================================================================

    /// Attach a part and wire it into every system.
    pub fn attach(
        &mut self,
        part: Part,
        to: PartId,
        connection: PartConnection,
        covering: &[RelativeSide],
    ) -> Result<Option<PartId>> {
        let is_new = !self.form.contains(part.id());
        let abilities = part.abilities.clone();
        let Some(id) = self.form.attach(part, to, connection, covering)? else {
            return Ok(None);
        };
        for system in &self.systems {
            system.on_body_new(&mut self.form, id, connection, to, is_new)?;
        }
        if is_new {
            self.stats.gain(&abilities);
        }
        Ok(Some(id))
    }

    /// Change a part in place. Systems prune stale channels, spirits react,
    /// and a part left destroyed is removed from the body.
    pub fn update_part(&mut self, id: PartId, change: impl FnOnce(&mut Part)) -> Result<()> {
        let part = self.form.part_mut(id).ok_or_else(|| Error::NotFound(format!("part {id}")))?;
        let before = part.abilities.clone();
        change(part);
        let after = part.abilities.clone();
        let destroyed = part.is_destroyed();
        self.stats.lose(&before);
        self.stats.gain(&after);

        for system in &self.systems {
            let pruned = system.on_body_update(&mut self.form, id);
            if !pruned.is_empty() {
                trace!(system = system.name(), part = %id, pruned = pruned.len(), "channels pruned");
            }
        }
        for spirit in &mut self.spirits {
            spirit.on_any_part_state_change(&mut self.form, id);
        }
        if destroyed {
            self.destroy_part(id)?;
        }
        Ok(())
    }

    /// Remove a part outright; whatever hung on through it breaks off.
    pub fn destroy_part(&mut self, id: PartId) -> Result<Part> {
        let (part, pieces) = self
            .form
            .destroy_part(id)
            .ok_or_else(|| Error::NotFound(format!("part {id}")))?;
        self.lose(&part);
        for spirit in &mut self.spirits {
            if spirit.tether_part() == Some(id) {
                spirit.on_host_state_change(&mut self.form);
            }
        }
        self.break_off(pieces);
        Ok(part)
    }

    /// Cut the joint between two parts. Returns whether a piece broke off.
    pub fn sever(&mut self, a: PartId, b: PartId) -> bool {
        match self.form.sever_connection(a, b) {
            Some(piece) => {
                self.break_off(vec![piece]);
                true
            }
            None => false,
        }
    }

    /// Take a bite of `fraction` of a part's full size. A part eaten down
    /// to nothing is destroyed. Returns the mass eaten.
    pub fn eat(&mut self, id: PartId, fraction: f64) -> Result<f64> {
        let base = self.form.base_mass();
        let part = self.form.part_mut(id).ok_or_else(|| Error::NotFound(format!("part {id}")))?;
        let bite = fraction.clamp(0.0, part.relative_size);
        let before = part.mass(base);
        part.relative_size -= bite;
        let eaten = before - part.mass(base);
        if part.relative_size <= f64::EPSILON {
            self.destroy_part(id)?;
        }
        Ok(eaten)
    }

    pub fn apply_effect(&mut self, id: PartId, effect: StatusEffect) -> bool {
        let Some(part) = self.form.part_mut(id) else {
            return false;
        };
        if !part.effects.insert(effect) {
            return false;
        }
        for spirit in &mut self.spirits {
            if spirit.tether_part() == Some(id) || spirit.tether() == Tether::Body {
                spirit.on_host_effect_applied(&mut self.form, effect);
            }
        }
        true
    }

    pub fn remove_effect(&mut self, id: PartId, effect: StatusEffect) -> bool {
        let Some(part) = self.form.part_mut(id) else {
            return false;
        };
        if !part.effects.remove(&effect) {
            return false;
        }
        for spirit in &mut self.spirits {
            if spirit.tether_part() == Some(id) || spirit.tether() == Tether::Body {
                spirit.on_host_effect_removed(&mut self.form, effect);
            }
        }
        true
    }

    fn lose(&mut self, part: &Part) {
        self.stats.lose(&part.abilities);
        for system in &self.systems {
            if !system.on_body_loss(&self.form, part) {
                self.viable = false;
            }
        }
    }

    fn break_off(&mut self, pieces: Vec<Form>) {
        if pieces.is_empty() {
            return;
        }
        for piece in &pieces {
            for part in piece.parts() {
                self.lose(part);
            }
        }

        let mut shunted: Vec<Vec<Spirit>> = pieces.iter().map(|_| Vec::new()).collect();
        let mut kept = Vec::with_capacity(self.spirits.len());
        for mut spirit in self.spirits.drain(..) {
            match spirit.on_any_severances(&mut self.form, &pieces) {
                SeveranceOutcome::Shunted(i) => shunted[i].push(spirit),
                SeveranceOutcome::Retained | SeveranceOutcome::Detached => kept.push(spirit),
            }
        }
        self.spirits = kept;

        for (form, spirits) in pieces.into_iter().zip(shunted) {
            debug!(piece = %form.id(), parts = form.len(), spirits = spirits.len(), "piece broke off body");
            self.broken_off.push(BrokenPiece { form, spirits });
        }
        if !self.viable {
            warn!(form = %self.form.id(), "body lost integrity");
        }
    }

    /// Pieces that broke off since the last call.
    pub fn take_broken_off(&mut self) -> Vec<BrokenPiece> {
        std::mem::take(&mut self.broken_off)
    }

    /// Detach every spirit and hand them over.
    pub fn release_spirits(&mut self) -> Vec<Spirit> {
        for spirit in &mut self.spirits {
            spirit.on_remove(Some(&mut self.form));
        }
        std::mem::take(&mut self.spirits)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn stat(&self, stat: PartStat) -> StatValue {
        self.stats.get(stat)
    }

    /// Has at least one walking part and a nonzero walking speed.
    pub fn can_walk(&self) -> bool {
        self.stats.contributors(PartStat::WalkSpeed) > 0
            && self.stats.get(PartStat::WalkSpeed).scalar().is_some_and(|v| v > 0.0)
    }

    pub fn can_grasp(&self) -> bool {
        self.form.parts().any(|p| p.abilities.contains(&AbilityKey::Grasp))
    }

    /// Recompute every stat from the parts.
    pub fn rebuild_stats(&mut self) {
        self.stats.clear();
        for part in self.form.parts() {
            self.stats.gain(&part.abilities);
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    pub fn tick(&mut self, ticks: u64) -> Result<()> {
        let mut ticked: HashSet<(&'static str, PartId)> = HashSet::new();
        let mut ran: HashSet<SpiritId> = HashSet::new();

        let controllers: Vec<(Arc<dyn ChannelSystem>, PartId)> = self
            .systems
            .iter()
            .flat_map(|system| {
                self.form
                    .parts()
                    .filter(|p| p.abilities.center(system.name()).is_some_and(|c| c.role == CenterRole::Control))
                    .map(|p| (Arc::clone(system), p.id()))
                    .collect::<Vec<_>>()
            })
            .collect();

        for (system, brain) in controllers {
            if !system.can_tick(&self.form, brain) {
                continue;
            }
            let mut reached = self.form.channeled_parts(brain, system.name());
            reached.insert(brain);
            system.on_control_tick(&mut self.form, &reached);
            for &part in &reached {
                self.tick_automatic_at(part, ticks, &mut ticked)?;
            }
            for spirit in &mut self.spirits {
                if spirit.is_within(&reached) && ran.insert(spirit.id()) {
                    spirit.run_tick(&self.form, &reached, ticks);
                }
            }
        }

        let all: Vec<PartId> = self.form.part_ids().collect();
        for part in all {
            self.tick_automatic_at(part, ticks, &mut ticked)?;
        }

        let contiguous = self.form.contiguous_parts();
        for spirit in &mut self.spirits {
            match spirit.tether() {
                Tether::Body if ran.insert(spirit.id()) => spirit.run_tick(&self.form, &contiguous, ticks),
                Tether::None => spirit.untethered_tick(ticks),
                _ => {}
            }
        }
        Ok(())
    }

    /// Tick every automatic center on `part` that has not ticked yet.
    fn tick_automatic_at(
        &mut self,
        part: PartId,
        ticks: u64,
        ticked: &mut HashSet<(&'static str, PartId)>,
    ) -> Result<()> {
        let automatic: Vec<String> = match self.form.part(part) {
            Some(p) => automatic_systems(&p.abilities),
            None => return Ok(()),
        };
        for name in automatic {
            let Some(system) = self.systems.iter().find(|s| s.name() == name).cloned() else {
                continue;
            };
            if !ticked.insert((system.name(), part)) || !system.can_tick(&self.form, part) {
                continue;
            }
            match system.automatic_tick(&mut self.form, part, ticks) {
                Ok(()) => {}
                Err(Error::Unimplemented(msg)) => trace!(system = system.name(), %msg, "automatic tick skipped"),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

fn automatic_systems(abilities: &Abilities) -> Vec<String> {
    abilities.centers().filter(|c| c.automatic).map(|c| c.system.clone()).collect()
}
