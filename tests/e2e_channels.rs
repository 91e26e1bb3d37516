//! End-to-end tests for channel systems.
//!
//! Population over realistic bodies, the heart distribution scenario run
//! through a soma tick, resource clamping under random flow, and nerve
//! control over automatic centers.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use soma::channel::circulatory::BLOOD;
use soma::channel::energy::ENERGY;
use soma::channel::{ChannelSystem, Circulatory, Energy, Nervous, Resource};
use soma::form::{Material, Part, PartConnection};
use soma::{Form, PartId, PropertyMap, Soma};

// ============================================================================
// Helpers
// ============================================================================

fn bloody(name: &str) -> Part {
    Part::new(name, Material::new("flesh")).with_embedded(Material::new("blood"))
}

/// A heart joined to three limbs, every limb drained.
fn heart_and_limbs() -> (Soma, PartId, Vec<PartId>) {
    let mut form = Form::with_center(bloody("heart"), 5.0);
    let heart = form.center().unwrap();
    let limbs: Vec<PartId> = ["a", "b", "c"]
        .iter()
        .map(|n| form.attach(bloody(n), heart, PartConnection::Joined, &[]).unwrap().unwrap())
        .collect();
    let systems: Vec<Arc<dyn ChannelSystem>> = vec![Arc::new(Circulatory::new(0.05))];
    let mut soma = Soma::new(form, systems);
    soma.populate(&PropertyMap::new()).unwrap();
    for &limb in &limbs {
        soma.update_part(limb, |p| {
            BLOOD.set(p, 0.0);
        })
        .unwrap();
    }
    (soma, heart, limbs)
}

fn blood(soma: &Soma, part: PartId) -> f64 {
    soma.form().part(part).unwrap().resource("blood")
}

// ============================================================================
// Heart distribution
// ============================================================================

#[test]
fn test_heart_fills_limbs_and_clamps() {
    let (mut soma, _heart, limbs) = heart_and_limbs();
    for &limb in &limbs {
        assert_eq!(blood(&soma, limb), 0.0);
    }

    soma.tick(1).unwrap();
    for &limb in &limbs {
        assert_eq!(blood(&soma, limb), 0.05);
    }

    for _ in 0..20 {
        soma.tick(1).unwrap();
    }
    for &limb in &limbs {
        assert_eq!(blood(&soma, limb), 1.0);
    }
}

#[test]
fn test_heart_tick_covers_elapsed_ticks() {
    let (mut soma, _heart, limbs) = heart_and_limbs();
    soma.tick(10).unwrap();
    for &limb in &limbs {
        assert!((blood(&soma, limb) - 0.5).abs() < 1e-9);
    }
}

#[test]
fn test_populate_is_idempotent() {
    let (mut soma, heart, _) = heart_and_limbs();
    let edges = soma.form().representation_graph().edge_count();
    let abilities = soma.form().part(heart).unwrap().abilities.len();

    soma.populate(&PropertyMap::new()).unwrap();
    soma.populate(&PropertyMap::new()).unwrap();

    assert_eq!(soma.form().representation_graph().edge_count(), edges);
    assert_eq!(soma.form().part(heart).unwrap().abilities.len(), abilities);
}

#[test]
fn test_channels_need_the_vector_material_at_both_ends() {
    let mut form = Form::with_center(bloody("heart"), 5.0);
    let heart = form.center().unwrap();
    let bone = form
        .attach(Part::new("bone", Material::new("bone")), heart, PartConnection::Joined, &[])
        .unwrap()
        .unwrap();
    let circulatory = Circulatory::new(0.05);
    circulatory.populate_body(&mut form, &PropertyMap::new()).unwrap();

    let reached = form.channeled_parts(heart, "circulatory");
    assert_eq!(reached.len(), 1);
    assert!(!reached.contains(&bone));
    assert!(form.part(bone).unwrap().resources.is_empty());
}

// ============================================================================
// Control and generation
// ============================================================================

#[test]
fn test_brain_reaches_core_over_nerves() {
    let part = |name: &str| {
        Part::new(name, Material::new("flesh"))
            .with_embedded(Material::new("nerve_tissue"))
            .with_embedded(Material::new("mana"))
    };
    let mut form = Form::with_center(part("torso"), 50.0);
    let torso = form.center().unwrap();
    form.attach(part("brain"), torso, PartConnection::Merged, &[]).unwrap();
    let core = form.attach(part("core"), torso, PartConnection::Joined, &[]).unwrap().unwrap();
    let tail = form.attach(part("tail"), torso, PartConnection::Joined, &[]).unwrap().unwrap();
    let systems: Vec<Arc<dyn ChannelSystem>> = vec![Arc::new(Nervous::new(1.0)), Arc::new(Energy::new(2.0))];
    let mut soma = Soma::new(form, systems);
    soma.populate(&PropertyMap::new()).unwrap();

    soma.tick(1).unwrap();

    let energy = |id| soma.form().part(id).unwrap().resource(ENERGY.name);
    // The core ticks exactly once even though the brain reached it.
    assert_eq!(energy(tail), 2.0);
    assert_eq!(energy(core), 2.0);
    assert_eq!(soma.form().part(tail).unwrap().resource("signal"), 1.0);
}

// ============================================================================
// Clamping
// ============================================================================

fn resource() -> impl Strategy<Value = Resource> {
    prop_oneof![
        Just(BLOOD),
        Just(ENERGY),
        Just(soma::channel::nervous::SIGNAL),
    ]
}

proptest! {
    #[test]
    fn prop_amounts_stay_in_bounds(r in resource(), flows in prop::collection::vec(-200.0f64..200.0, 1..50)) {
        let mut part = bloody("limb");
        r.seed(&mut part);
        for delta in flows {
            if delta >= 0.0 { r.give(&mut part, delta); } else { r.take(&mut part, -delta); }
            let amount = r.amount(&part);
            prop_assert!(amount >= r.empty && amount <= r.max);
        }
    }
}
