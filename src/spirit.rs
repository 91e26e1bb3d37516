//! # Spirits
//!
//! A spirit is a mind bound to a body through one part (a brain, a
//! phylactery) or to the body as a whole.
//!
//! ```text
//!  Untethered ──attach──▶ Tethered(p) ──callback returns p'──▶ Tethered(p')
//!      ▲                       │
//!      └───── detach ──────────┘ (on_remove marks the part as former host)
//! ```
//!
//! Every callback is total. Callbacks run deep inside body mutation, so
//! they report through their return value (`Option<PartId>` for the
//! tether after the call) and never fail.

use std::fmt::Debug;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ability::{Ability, AbilityKey};
use crate::form::{Form, MaterialState, Part, ShapeState, StatusEffect};
use crate::model::{PartId, SpiritId};

// ============================================================================
// Tether & conditions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tether {
    #[default]
    None,
    Part(PartId),
    /// Bound to the whole body rather than one part.
    Body,
}

/// When a host part is too damaged to hold a spirit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestroyedCondition {
    MaterialGone,
    ShapeGone,
    #[default]
    Either,
    /// The spirit never lets go on its own.
    Never,
}

impl DestroyedCondition {
    /// Whether the host must be released. A missing part always counts as
    /// destroyed, even under `Never`.
    pub fn holds(&self, part: Option<&Part>) -> bool {
        let Some(part) = part else {
            return true;
        };
        match self {
            DestroyedCondition::MaterialGone => part.material.state == MaterialState::Gone,
            DestroyedCondition::ShapeGone => part.shape.state == ShapeState::Gone,
            DestroyedCondition::Either => part.is_destroyed(),
            DestroyedCondition::Never => false,
        }
    }
}

/// What happened to a tethered spirit when its body came apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeveranceOutcome {
    /// The host stayed with the retained body.
    Retained,
    /// The host is in `severed[i]`; the spirit goes with it.
    Shunted(usize),
    /// The host is gone; the spirit was released.
    Detached,
}

// ============================================================================
// Mind
// ============================================================================

/// The thinking part of a spirit. Decision making lives outside the engine.
pub trait Mind: Send + Debug {
    /// One tick of perception and will, limited to the parts the spirit
    /// can reach through its body.
    fn think(&mut self, spirit: SpiritId, form: &Form, accessible: &HashSet<PartId>, ticks: u64);

    /// A tick while the spirit has no body.
    fn drift(&mut self, _spirit: SpiritId, _ticks: u64) {}
}

/// A mind that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleMind;

impl Mind for IdleMind {
    fn think(&mut self, _: SpiritId, _: &Form, _: &HashSet<PartId>, _: u64) {}
}

// ============================================================================
// Spirit
// ============================================================================

#[derive(Debug)]
pub struct Spirit {
    id: SpiritId,
    pub name: String,
    tether: Tether,
    detach: DestroyedCondition,
    /// Ability a part must carry to host this spirit.
    host_requirement: Option<AbilityKey>,
    /// Look for another host when the current one is destroyed.
    pub retether_on_loss: bool,
    active: bool,
    removed: bool,
    mind: Box<dyn Mind>,
}

impl Spirit {
    pub fn new(name: impl Into<String>, mind: Box<dyn Mind>) -> Self {
        Self {
            id: SpiritId::new(),
            name: name.into(),
            tether: Tether::None,
            detach: DestroyedCondition::default(),
            host_requirement: None,
            retether_on_loss: false,
            active: false,
            removed: false,
            mind,
        }
    }

    pub fn with_requirement(mut self, key: AbilityKey) -> Self {
        self.host_requirement = Some(key);
        self
    }

    pub fn with_detach(mut self, condition: DestroyedCondition) -> Self {
        self.detach = condition;
        self
    }

    pub fn id(&self) -> SpiritId {
        self.id
    }

    pub fn tether(&self) -> Tether {
        self.tether
    }

    pub fn tether_part(&self) -> Option<PartId> {
        match self.tether {
            Tether::Part(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_tethered(&self) -> bool {
        self.tether != Tether::None
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Whether the tether lies inside `parts`.
    pub fn is_within(&self, parts: &HashSet<PartId>) -> bool {
        self.tether_part().is_some_and(|p| parts.contains(&p))
    }

    // ========================================================================
    // Attachment
    // ========================================================================

    pub fn can_attach_host(&self, form: &Form, part: PartId) -> bool {
        if self.removed {
            return false;
        }
        let Some(host) = form.part(part) else {
            return false;
        };
        if self.detach.holds(Some(host)) {
            return false;
        }
        self.host_requirement.as_ref().is_none_or(|key| host.abilities.contains(key))
    }

    /// Tether to `part` if it can host. Returns the tether part afterwards.
    pub fn attach(&mut self, form: &mut Form, part: PartId) -> Option<PartId> {
        if !self.can_attach_host(form, part) {
            return self.tether_part();
        }
        if let Some(old) = self.tether_part().filter(|old| *old != part) {
            self.mark_former(form, old);
        }
        let mut conscious = true;
        if let Some(host) = form.part_mut(part) {
            host.abilities.insert(Ability::Tether { spirit: self.id, former: false });
            conscious = !host.has_effect(StatusEffect::Unconscious);
        }
        self.tether = Tether::Part(part);
        self.active = conscious;
        debug!(spirit = %self.id, name = %self.name, %part, "spirit tethered");
        Some(part)
    }

    /// Bind to the body as a whole.
    pub fn attach_body(&mut self) {
        if self.removed {
            return;
        }
        self.tether = Tether::Body;
        self.active = true;
        debug!(spirit = %self.id, name = %self.name, "spirit bound to body");
    }

    /// Release the host. The part keeps a former-possessor marker.
    pub fn on_remove(&mut self, form: Option<&mut Form>) {
        if let (Some(form), Some(part)) = (form, self.tether_part()) {
            self.mark_former(form, part);
        }
        if self.is_tethered() {
            debug!(spirit = %self.id, name = %self.name, "spirit untethered");
        }
        self.tether = Tether::None;
        self.active = false;
    }

    /// Permanently gone. Nothing re-attaches a removed spirit.
    pub fn set_removed(&mut self, form: Option<&mut Form>) {
        self.on_remove(form);
        self.removed = true;
    }

    fn mark_former(&self, form: &mut Form, part: PartId) {
        if let Some(Ability::Tether { spirit, former }) =
            form.part_mut(part).and_then(|p| p.abilities.get_mut(&AbilityKey::Tether))
        {
            if *spirit == self.id {
                *former = true;
            }
        }
    }

    // ========================================================================
    // Body callbacks
    // ========================================================================

    /// The host changed state. Keeps, moves or drops the tether.
    pub fn on_host_state_change(&mut self, form: &mut Form) -> Option<PartId> {
        let Some(host) = self.tether_part() else {
            return self.body_tether(form);
        };
        if !self.detach.holds(form.part(host)) {
            self.active = !form.part(host).is_some_and(|p| p.has_effect(StatusEffect::Unconscious));
            return Some(host);
        }
        if self.retether_on_loss {
            let candidate = form
                .part_ids()
                .filter(|p| *p != host)
                .find(|p| self.can_attach_host(form, *p));
            if let Some(next) = candidate {
                return self.attach(form, next);
            }
        }
        self.on_remove(Some(form));
        None
    }

    pub fn on_host_effect_applied(&mut self, form: &mut Form, effect: StatusEffect) -> Option<PartId> {
        if effect == StatusEffect::Unconscious && self.is_tethered() {
            self.active = false;
        }
        self.tether_part().or_else(|| self.body_tether(form))
    }

    pub fn on_host_effect_removed(&mut self, form: &mut Form, effect: StatusEffect) -> Option<PartId> {
        if effect == StatusEffect::Unconscious && self.is_tethered() && !self.removed {
            self.active = true;
        }
        self.tether_part().or_else(|| self.body_tether(form))
    }

    /// Some part of the body changed state. Only the host matters.
    pub fn on_any_part_state_change(&mut self, form: &mut Form, changed: PartId) -> Option<PartId> {
        if self.tether_part() == Some(changed) {
            self.on_host_state_change(form)
        } else {
            self.tether_part().or_else(|| self.body_tether(form))
        }
    }

    /// The body split into `retained` and the `severed` pieces.
    pub fn on_any_severances(&mut self, retained: &mut Form, severed: &[Form]) -> SeveranceOutcome {
        let Some(host) = self.tether_part() else {
            return SeveranceOutcome::Retained;
        };
        if retained.contains(host) {
            return SeveranceOutcome::Retained;
        }
        if let Some(i) = severed.iter().position(|f| f.contains(host)) {
            debug!(spirit = %self.id, %host, piece = %severed[i].id(), "spirit shunted with severed piece");
            return SeveranceOutcome::Shunted(i);
        }
        self.on_remove(Some(retained));
        SeveranceOutcome::Detached
    }

    fn body_tether(&self, form: &Form) -> Option<PartId> {
        match self.tether {
            Tether::Body => form.center(),
            _ => None,
        }
    }

    // ========================================================================
    // Ticks
    // ========================================================================

    /// Think through the parts the controller reached.
    pub fn run_tick(&mut self, form: &Form, accessible: &HashSet<PartId>, ticks: u64) {
        if self.active && !self.removed {
            self.mind.think(self.id, form, accessible, ticks);
        }
    }

    /// Tick of a bodiless spirit.
    pub fn untethered_tick(&mut self, ticks: u64) {
        if !self.is_tethered() && !self.removed {
            self.mind.drift(self.id, ticks);
        }
    }
}

// ============================================================================
// SoulGenerator
// ============================================================================

/// Creates the spirits of a newly generated body.
pub trait SoulGenerator: Send + Sync + Debug {
    fn generate(&self, form: &Form) -> Vec<Spirit>;
}

/// One idle spirit per body, hosted by a part carrying `requirement`.
#[derive(Debug, Clone)]
pub struct SingleSoul {
    pub name: String,
    pub requirement: Option<AbilityKey>,
    pub detach: DestroyedCondition,
}

impl SoulGenerator for SingleSoul {
    fn generate(&self, _form: &Form) -> Vec<Spirit> {
        let mut spirit = Spirit::new(self.name.clone(), Box::new(IdleMind)).with_detach(self.detach);
        spirit.host_requirement = self.requirement.clone();
        vec![spirit]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::ability::{CenterRole, ChannelCenter};
    use crate::form::{Material, PartConnection};

    #[derive(Debug, Default)]
    struct Recording {
        seen: Arc<Mutex<Vec<usize>>>,
        drifted: Arc<Mutex<u64>>,
    }

    impl Mind for Recording {
        fn think(&mut self, _: SpiritId, _: &Form, accessible: &HashSet<PartId>, _: u64) {
            self.seen.lock().push(accessible.len());
        }
        fn drift(&mut self, _: SpiritId, ticks: u64) {
            *self.drifted.lock() += ticks;
        }
    }

    fn brain_center() -> Ability {
        Ability::Center(ChannelCenter { system: "nervous".into(), role: CenterRole::Control, automatic: false })
    }

    fn body() -> (Form, PartId, PartId) {
        let mut form = Form::with_center(Part::new("torso", Material::new("flesh")), 1.0);
        let torso = form.center().unwrap();
        let mut head = Part::new("head", Material::new("flesh"));
        head.abilities.insert(brain_center());
        let head = form.attach(head, torso, PartConnection::Joined, &[]).unwrap().unwrap();
        (form, torso, head)
    }

    fn needs_brain() -> Spirit {
        Spirit::new("soul", Box::new(IdleMind)).with_requirement(AbilityKey::Center("nervous".into()))
    }

    #[test]
    fn test_attach_requires_host_ability() {
        let (mut form, torso, head) = body();
        let mut spirit = needs_brain();
        assert!(!spirit.can_attach_host(&form, torso));
        assert_eq!(spirit.attach(&mut form, torso), None);
        assert_eq!(spirit.attach(&mut form, head), Some(head));
        assert!(spirit.is_active());
        assert!(matches!(
            form.part(head).unwrap().abilities.get(&AbilityKey::Tether),
            Some(Ability::Tether { former: false, .. })
        ));
    }

    #[test]
    fn test_unconscious_deactivates_without_detaching() {
        let (mut form, _, head) = body();
        let mut spirit = needs_brain();
        spirit.attach(&mut form, head);
        assert_eq!(spirit.on_host_effect_applied(&mut form, StatusEffect::Unconscious), Some(head));
        assert!(!spirit.is_active());
        assert!(spirit.is_tethered());
        assert_eq!(spirit.on_host_effect_removed(&mut form, StatusEffect::Unconscious), Some(head));
        assert!(spirit.is_active());
    }

    #[test]
    fn test_destroyed_host_detaches_and_marks_former() {
        let (mut form, torso, head) = body();
        let mut spirit = needs_brain();
        spirit.attach(&mut form, head);
        assert_eq!(spirit.on_any_part_state_change(&mut form, torso), Some(head));

        form.part_mut(head).unwrap().material.state = MaterialState::Gone;
        assert_eq!(spirit.on_any_part_state_change(&mut form, head), None);
        assert!(!spirit.is_tethered());
        assert!(matches!(
            form.part(head).unwrap().abilities.get(&AbilityKey::Tether),
            Some(Ability::Tether { former: true, .. })
        ));
    }

    #[test]
    fn test_retether_to_backup_host() {
        let (mut form, torso, head) = body();
        let mut backup = Part::new("ganglion", Material::new("flesh"));
        backup.abilities.insert(brain_center());
        let backup = form.attach(backup, torso, PartConnection::Joined, &[]).unwrap().unwrap();

        let mut spirit = needs_brain();
        spirit.retether_on_loss = true;
        spirit.attach(&mut form, head);
        form.part_mut(head).unwrap().shape.state = ShapeState::Gone;
        assert_eq!(spirit.on_host_state_change(&mut form), Some(backup));
        assert_eq!(spirit.tether(), Tether::Part(backup));
        assert!(matches!(
            form.part(head).unwrap().abilities.get(&AbilityKey::Tether),
            Some(Ability::Tether { former: true, .. })
        ));
    }

    #[test]
    fn test_removed_is_terminal() {
        let (mut form, _, head) = body();
        let mut spirit = needs_brain();
        spirit.attach(&mut form, head);
        spirit.set_removed(Some(&mut form));
        assert!(spirit.is_removed());
        assert_eq!(spirit.attach(&mut form, head), None);
        spirit.attach_body();
        assert_eq!(spirit.tether(), Tether::None);
    }

    #[test]
    fn test_ticks_reach_the_mind() {
        let (mut form, _, head) = body();
        let mind = Recording::default();
        let seen = mind.seen.clone();
        let drifted = mind.drifted.clone();
        let mut spirit = Spirit::new("ghost", Box::new(mind));

        spirit.untethered_tick(3);
        assert_eq!(*drifted.lock(), 3);

        spirit.attach(&mut form, head);
        let accessible: HashSet<PartId> = [head].into_iter().collect();
        spirit.run_tick(&form, &accessible, 1);
        spirit.untethered_tick(1);
        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(*drifted.lock(), 3);
    }
}
