//! Blood: a heart pushes it into every part it is attached to.

use tracing::trace;

use crate::ability::CenterRole;
use crate::form::{ChannelType, Form};
use crate::model::PartId;
use crate::{Error, Result};

use super::{CenterType, ChannelSystem, Combine, Resource};

pub const VESSEL: ChannelType = ChannelType { system: "circulatory", name: "vessel", vector_material: "blood" };

pub const BLOOD: Resource =
    Resource { name: "blood", empty: 0.0, max: 1.0, initial: 1.0, combine: Combine::Additive };

pub const HEART: CenterType = CenterType { role: CenterRole::Distribution, part_name: "heart", automatic: true };

#[derive(Debug, Clone)]
pub struct Circulatory {
    /// Blood pushed into each neighbour per tick.
    increment: f64,
}

impl Circulatory {
    pub fn new(increment: f64) -> Self {
        Self { increment }
    }

    pub fn increment(&self) -> f64 {
        self.increment
    }
}

impl ChannelSystem for Circulatory {
    fn name(&self) -> &'static str {
        "circulatory"
    }

    fn channels(&self) -> &[ChannelType] {
        &[VESSEL]
    }

    fn centers(&self) -> &[CenterType] {
        &[HEART]
    }

    fn resources(&self) -> &[Resource] {
        &[BLOOD]
    }

    /// Push `increment · ticks` blood into every part attached to the heart.
    fn automatic_tick(&self, form: &mut Form, part: PartId, ticks: u64) -> Result<()> {
        if !form.contains(part) {
            return Err(Error::NotFound(format!("heart part {part}")));
        }
        let delta = self.increment * ticks as f64;
        for neighbour in form.connected_parts(part) {
            if let Some(p) = form.part_mut(neighbour) {
                BLOOD.give(p, delta);
            }
        }
        trace!(heart = %part, delta, "heartbeat");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{Material, Part, PartConnection};
    use crate::model::PropertyMap;

    fn blooded(name: &str) -> Part {
        Part::new(name, Material::new("flesh")).with_embedded(Material::new("blood"))
    }

    #[test]
    fn test_populate_installs_heart_and_vessels() {
        let mut form = Form::with_center(blooded("torso"), 1.0);
        let torso = form.center().unwrap();
        let heart = form.attach(blooded("heart"), torso, PartConnection::Merged, &[]).unwrap().unwrap();
        let leg = form.attach(blooded("leg"), torso, PartConnection::Joined, &[]).unwrap().unwrap();
        let hoof = form.attach(Part::new("hoof", Material::new("horn")), leg, PartConnection::Joined, &[]).unwrap().unwrap();

        let system = Circulatory::new(0.05);
        let centers = system.populate_body(&mut form, &PropertyMap::new()).unwrap();
        assert_eq!(centers, vec![heart]);
        assert!(form.part(heart).unwrap().abilities.center("circulatory").is_some());
        assert_eq!(form.channeled_parts(heart, "circulatory").len(), 3);
        assert_eq!(form.part(leg).unwrap().resource("blood"), 1.0);
        assert!(!form.part(hoof).unwrap().resources.contains_key("blood"));
    }

    #[test]
    fn test_heart_feeds_neighbours_only() {
        let mut form = Form::with_center(blooded("heart"), 1.0);
        let heart = form.center().unwrap();
        let arm = form.attach(blooded("arm"), heart, PartConnection::Joined, &[]).unwrap().unwrap();
        let hand = form.attach(blooded("hand"), arm, PartConnection::Joined, &[]).unwrap().unwrap();
        let system = Circulatory::new(0.25);
        system.automatic_tick(&mut form, heart, 2).unwrap();
        assert_eq!(form.part(arm).unwrap().resource("blood"), 0.5);
        assert_eq!(form.part(hand).unwrap().resource("blood"), 0.0);
    }
}
