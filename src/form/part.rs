//! Parts: the nodes of a body or visage graph.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::ability::Abilities;
use crate::model::{PartId, Property, PropertyMap};
use crate::plane::Interactability;

// ============================================================================
// Material property keys
// ============================================================================

/// Surface roughness, feeds the friction coefficient.
pub const ROUGHNESS: Property<f64> = Property::new("roughness", || 0.0);
pub const UNEVENNESS: Property<f64> = Property::new("unevenness", || 0.0);
/// Drag of a medium the actor is immersed in (water, mud).
pub const VISCOSITY: Property<f64> = Property::new("viscosity", || 0.0);
/// Mass per unit of relative size.
pub const DENSITY: Property<f64> = Property::new("density", || 1.0);

// ============================================================================
// Shape & Material
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeState {
    #[default]
    Intact,
    Damaged,
    Crushed,
    Gone,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    #[serde(default)]
    pub state: ShapeState,
}

impl Shape {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: ShapeState::Intact }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialState {
    #[default]
    Solid,
    Liquid,
    Gas,
    Burnt,
    Gone,
}

/// An opaque material: a name, a physical state and a property bag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    #[serde(default)]
    pub state: MaterialState,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: MaterialState::Solid, properties: PropertyMap::new() }
    }

    pub fn with(mut self, key: Property<f64>, value: f64) -> Self {
        key.set(&mut self.properties, value);
        self
    }

    pub fn property(&self, key: &Property<f64>) -> f64 {
        key.get(&self.properties)
    }
}

// ============================================================================
// Status effects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEffect {
    Unconscious,
    Stunned,
    Bleeding,
    Burning,
    Frozen,
}

// ============================================================================
// Part
// ============================================================================

/// One node of a form graph.
///
/// The id is fixed for the part's life; the name is a search label and
/// repeats freely ("left hand", "finger").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    id: PartId,
    pub name: String,
    /// Fraction of the whole body's scale.
    pub relative_size: f64,
    pub shape: Shape,
    pub material: Material,
    /// Vector materials running through the part (blood, nerve tissue).
    /// Channels only connect parts that embed their material.
    #[serde(default)]
    pub embedded: Vec<Material>,
    #[serde(default)]
    pub stains: Vec<Material>,
    #[serde(default)]
    pub abilities: Abilities,
    /// Resource name → current amount. Channel systems clamp on write.
    #[serde(default)]
    pub resources: HashMap<String, f64>,
    /// Planes this part can be detected from.
    #[serde(default)]
    pub detection: Interactability,
    #[serde(default)]
    pub is_hole: bool,
    #[serde(default)]
    pub effects: HashSet<StatusEffect>,
}

impl Part {
    pub fn new(name: impl Into<String>, material: Material) -> Self {
        let name = name.into();
        Self {
            id: PartId::new(),
            shape: Shape::new(name.clone()),
            name,
            relative_size: 1.0,
            material,
            embedded: Vec::new(),
            stains: Vec::new(),
            abilities: Abilities::new(),
            resources: HashMap::new(),
            detection: Interactability::NONE,
            is_hole: false,
            effects: HashSet::new(),
        }
    }

    pub fn id(&self) -> PartId {
        self.id
    }

    pub fn with_size(mut self, relative_size: f64) -> Self {
        self.relative_size = relative_size;
        self
    }

    pub fn with_embedded(mut self, material: Material) -> Self {
        self.embedded.push(material);
        self
    }

    pub fn with_detection(mut self, planes: Interactability) -> Self {
        self.detection = planes;
        self
    }

    /// Copy this part. With `fresh_id` the copy is a new identity;
    /// otherwise it stands in for the original (used when promoting a part).
    pub fn duplicate(&self, fresh_id: bool) -> Part {
        let mut copy = self.clone();
        if fresh_id {
            copy.id = PartId::new();
        }
        copy
    }

    pub fn embeds(&self, material: &str) -> bool {
        self.embedded.iter().any(|m| m.name == material && m.state != MaterialState::Gone)
    }

    /// Destroyed parts have lost either their material or their shape.
    pub fn is_destroyed(&self) -> bool {
        self.material.state == MaterialState::Gone || self.shape.state == ShapeState::Gone
    }

    pub fn has_effect(&self, effect: StatusEffect) -> bool {
        self.effects.contains(&effect)
    }

    pub fn resource(&self, name: &str) -> f64 {
        self.resources.get(name).copied().unwrap_or(0.0)
    }

    /// Mass of this part in a body whose full-size mass is `base_mass`.
    pub fn mass(&self, base_mass: f64) -> f64 {
        if self.is_hole {
            return 0.0;
        }
        base_mass * self.relative_size * self.material.property(&DENSITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_fresh_and_preserved() {
        let p = Part::new("hand", Material::new("flesh"));
        assert_ne!(p.duplicate(true).id(), p.id());
        assert_eq!(p.duplicate(false).id(), p.id());
        assert_eq!(p.duplicate(true).name, "hand");
    }

    #[test]
    fn test_destroyed_by_material_or_shape() {
        let mut p = Part::new("arm", Material::new("flesh"));
        assert!(!p.is_destroyed());
        p.shape.state = ShapeState::Gone;
        assert!(p.is_destroyed());
        p.shape.state = ShapeState::Intact;
        p.material.state = MaterialState::Gone;
        assert!(p.is_destroyed());
    }

    #[test]
    fn test_mass_uses_density_and_size() {
        let p = Part::new("torso", Material::new("stone").with(DENSITY, 2.5)).with_size(0.4);
        assert!((p.mass(10.0) - 10.0).abs() < 1e-9);
        let mut hole = p.clone();
        hole.is_hole = true;
        assert_eq!(hole.mass(10.0), 0.0);
    }

    #[test]
    fn test_embeds_ignores_gone_material() {
        let mut p = Part::new("leg", Material::new("flesh")).with_embedded(Material::new("blood"));
        assert!(p.embeds("blood"));
        p.embedded[0].state = MaterialState::Gone;
        assert!(!p.embeds("blood"));
    }
}
