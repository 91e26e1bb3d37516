//! Nerves: the brain's reach.
//!
//! The nervous system has no automatic centers. Its brain is a control
//! center: each body tick the soma walks the nerves from the brain, ticks
//! the automatic centers it reaches and lets tethered spirits act through
//! the reached parts (see [`Soma::tick`](crate::soma::Soma::tick)).

use hashbrown::HashSet;

use crate::ability::CenterRole;
use crate::form::{ChannelType, Form};
use crate::model::PartId;

use super::{CenterType, ChannelSystem, Combine, Resource};

pub const NERVE: ChannelType = ChannelType { system: "nervous", name: "nerve", vector_material: "nerve_tissue" };

pub const SIGNAL: Resource =
    Resource { name: "signal", empty: 0.0, max: 1.0, initial: 0.0, combine: Combine::Signal };

pub const BRAIN: CenterType = CenterType { role: CenterRole::Control, part_name: "brain", automatic: false };

/// `decay` switches fading on or off. [`SIGNAL`] combines as a flag, so
/// any positive decay clears an unreached part at once and zero leaves
/// its last signal in place.
#[derive(Debug, Clone)]
pub struct Nervous {
    decay: f64,
}

impl Nervous {
    pub fn new(decay: f64) -> Self {
        Self { decay }
    }

    /// Raise the signal on `reached` and fade it everywhere else.
    pub fn signal(&self, form: &mut Form, reached: &HashSet<PartId>) {
        let all: Vec<PartId> = form.part_ids().collect();
        for id in all {
            let Some(part) = form.part_mut(id) else { continue };
            if reached.contains(&id) {
                SIGNAL.give(part, 1.0);
            } else if self.decay > 0.0 && part.resources.contains_key(SIGNAL.name) {
                SIGNAL.take(part, self.decay);
            }
        }
    }
}

impl ChannelSystem for Nervous {
    fn name(&self) -> &'static str {
        "nervous"
    }

    fn channels(&self) -> &[ChannelType] {
        &[NERVE]
    }

    fn centers(&self) -> &[CenterType] {
        &[BRAIN]
    }

    fn resources(&self) -> &[Resource] {
        &[SIGNAL]
    }

    fn on_control_tick(&self, form: &mut Form, reached: &HashSet<PartId>) {
        self.signal(form, reached);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{Material, Part, PartConnection};
    use crate::model::PropertyMap;

    fn nerved(name: &str) -> Part {
        Part::new(name, Material::new("flesh")).with_embedded(Material::new("nerve_tissue"))
    }

    #[test]
    fn test_signal_follows_nerves() {
        let mut form = Form::with_center(nerved("head"), 1.0);
        let head = form.center().unwrap();
        let brain = form.attach(nerved("brain"), head, PartConnection::Merged, &[]).unwrap().unwrap();
        let arm = form.attach(nerved("arm"), head, PartConnection::Joined, &[]).unwrap().unwrap();
        let nervous = Nervous::new(1.0);
        nervous.populate_body(&mut form, &PropertyMap::new()).unwrap();

        let reached = form.channeled_parts(brain, "nervous");
        assert_eq!(reached.len(), 3);
        nervous.signal(&mut form, &reached);
        assert_eq!(form.part(arm).unwrap().resource("signal"), 1.0);

        let only_brain: HashSet<PartId> = [brain].into_iter().collect();
        nervous.signal(&mut form, &only_brain);
        assert_eq!(form.part(arm).unwrap().resource("signal"), 0.0);
        assert_eq!(form.part(brain).unwrap().resource("signal"), 1.0);
    }

    #[test]
    fn test_decay_clears_or_latches() {
        for (decay, left) in [(0.25, 0.0), (0.0, 1.0)] {
            let mut form = Form::with_center(nerved("head"), 1.0);
            let head = form.center().unwrap();
            let brain = form.attach(nerved("brain"), head, PartConnection::Merged, &[]).unwrap().unwrap();
            let nervous = Nervous::new(decay);
            nervous.populate_body(&mut form, &PropertyMap::new()).unwrap();

            let reached = form.channeled_parts(brain, "nervous");
            nervous.signal(&mut form, &reached);
            assert_eq!(form.part(head).unwrap().resource("signal"), 1.0);

            let only_brain: HashSet<PartId> = [brain].into_iter().collect();
            nervous.signal(&mut form, &only_brain);
            assert_eq!(form.part(head).unwrap().resource("signal"), left);
        }
    }

    #[test]
    fn test_losing_the_only_brain_is_fatal() {
        let mut form = Form::with_center(nerved("head"), 1.0);
        let head = form.center().unwrap();
        let brain = form.attach(nerved("brain"), head, PartConnection::Joined, &[]).unwrap().unwrap();
        let nervous = Nervous::new(1.0);
        nervous.populate_body(&mut form, &PropertyMap::new()).unwrap();
        let lost = form.take_part(brain).unwrap();
        assert!(!nervous.on_body_loss(&form, &lost));
        let head_part = form.part(head).unwrap().clone();
        assert!(nervous.on_body_loss(&form, &head_part));
    }
}
