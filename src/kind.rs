//! # Kinds and body plans
//!
//! A [`Kind`] is the template of a sort of creature or object: the
//! [`BodyPlan`] its bodies are built from, the channel systems flowing
//! through them and the generator of their spirits. Plans are plain JSON:
//!
//! ```json
//! {
//!   "base_mass": 70.0,
//!   "parts": [
//!     { "name": "torso", "material": { "name": "flesh" } },
//!     { "name": "head", "parent": "torso", "material": { "name": "flesh" } },
//!     { "key": "left_leg", "name": "leg", "parent": "torso",
//!       "material": { "name": "flesh" },
//!       "abilities": [ { "type": "walk", "speed": 1.4 } ] }
//!   ]
//! }
//! ```
//!
//! Exactly one template has no parent; it becomes the center. Children
//! refer to their parent by `key`, which defaults to the name.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ability::Ability;
use crate::channel::{ChannelRegistry, ChannelSystem};
use crate::form::{Form, Material, Part, PartConnection, RelativeSide};
use crate::model::{FromValue, PartId, Property, PropertyMap, Value};
use crate::plane::PlaneRegistry;
use crate::soma::Soma;
use crate::spirit::SoulGenerator;
use crate::{Error, Result};

// ============================================================================
// Settings
// ============================================================================

/// Scales the plan's base mass.
pub const SIZE: Property<f64> = Property::new("size", || 1.0);
/// Whether generated bodies get spirits.
pub const SOULED: Property<bool> = Property::new("souled", || true);

/// Per-generation settings: a property bag read through typed keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindSettings(pub PropertyMap);

impl KindSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: FromValue + Into<Value>>(&self, key: &Property<T>) -> T {
        key.get(&self.0)
    }

    pub fn with<T: FromValue + Into<Value>>(mut self, key: Property<T>, value: T) -> Self {
        key.set(&mut self.0, value);
        self
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.0
    }
}

// ============================================================================
// BodyPlan
// ============================================================================

fn joined() -> PartConnection {
    PartConnection::Joined
}

fn full_size() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartTemplate {
    pub name: String,
    /// Unique label children use as `parent`. Defaults to `name`.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default = "joined")]
    pub connection: PartConnection,
    /// Sides of the parent this part lies over.
    #[serde(default)]
    pub covers: Vec<RelativeSide>,
    #[serde(default = "full_size")]
    pub relative_size: f64,
    pub material: Material,
    #[serde(default)]
    pub embedded: Vec<Material>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
    /// Names of the planes the part can be detected from.
    #[serde(default)]
    pub detection: Vec<String>,
}

impl PartTemplate {
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }

    fn instantiate(&self, planes: &PlaneRegistry) -> Result<Part> {
        let mut part = Part::new(self.name.clone(), self.material.clone()).with_size(self.relative_size);
        part.embedded = self.embedded.clone();
        part.abilities = self.abilities.iter().cloned().collect();
        part.detection = planes.set_of(&self.detection)?;
        Ok(part)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyPlan {
    pub base_mass: f64,
    pub parts: Vec<PartTemplate>,
}

impl BodyPlan {
    pub fn from_json(json: &str) -> Result<Self> {
        let plan: Self = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Exactly one root, unique keys, every parent known.
    pub fn validate(&self) -> Result<()> {
        let roots = self.parts.iter().filter(|t| t.parent.is_none()).count();
        if roots != 1 {
            return Err(Error::InvalidBodyPlan(format!("expected one root part, found {roots}")));
        }
        let mut keys = HashSet::new();
        for t in &self.parts {
            if !keys.insert(t.key()) {
                return Err(Error::InvalidBodyPlan(format!("duplicate part key '{}'", t.key())));
            }
        }
        for t in &self.parts {
            if let Some(parent) = &t.parent {
                if !keys.contains(parent.as_str()) {
                    return Err(Error::InvalidBodyPlan(format!(
                        "part '{}' names unknown parent '{parent}'",
                        t.key()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build a form. Templates may appear in any order.
    pub fn build(&self, planes: &PlaneRegistry, mass_scale: f64) -> Result<Form> {
        self.validate()?;
        let mut form = Form::new(self.base_mass * mass_scale);
        let mut built: HashMap<&str, PartId> = HashMap::new();

        let mut pending: Vec<&PartTemplate> = self.parts.iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for t in pending {
                let part = match &t.parent {
                    None => {
                        let id = form.add_part(t.instantiate(planes)?);
                        form.set_center(id)?;
                        Some(id)
                    }
                    Some(parent) => match built.get(parent.as_str()) {
                        Some(&to) => form.attach(t.instantiate(planes)?, to, t.connection, &t.covers)?,
                        None => {
                            waiting.push(t);
                            continue;
                        }
                    },
                };
                let id = part.ok_or_else(|| {
                    Error::InvalidBodyPlan(format!("part '{}' could not be attached", t.key()))
                })?;
                built.insert(t.key(), id);
            }
            if waiting.len() == before {
                return Err(Error::InvalidBodyPlan("parent cycle among parts".into()));
            }
            pending = waiting;
        }
        Ok(form)
    }
}

// ============================================================================
// Kind
// ============================================================================

#[derive(Debug, Clone)]
pub struct Kind {
    pub name: String,
    plan: BodyPlan,
    systems: Vec<Arc<dyn ChannelSystem>>,
    souls: Option<Arc<dyn SoulGenerator>>,
}

impl Kind {
    pub fn new(name: impl Into<String>, plan: BodyPlan, systems: Vec<Arc<dyn ChannelSystem>>) -> Self {
        Self { name: name.into(), plan, systems, souls: None }
    }

    /// A kind using the named systems of `registry`. Unknown names are an error.
    pub fn from_registry(
        name: impl Into<String>,
        plan: BodyPlan,
        registry: &ChannelRegistry,
        systems: &[&str],
    ) -> Result<Self> {
        let resolved = systems
            .iter()
            .map(|n| registry.get(n).ok_or_else(|| Error::NotFound(format!("channel system '{n}'"))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(name, plan, resolved))
    }

    pub fn with_souls(mut self, generator: Arc<dyn SoulGenerator>) -> Self {
        self.souls = Some(generator);
        self
    }

    pub fn plan(&self) -> &BodyPlan {
        &self.plan
    }

    pub fn systems(&self) -> &[Arc<dyn ChannelSystem>] {
        &self.systems
    }

    /// Build, populate and ensoul a fresh body.
    pub fn generate_soma(&self, settings: &KindSettings, planes: &PlaneRegistry) -> Result<Soma> {
        let form = self.plan.build(planes, settings.get(&SIZE))?;
        let mut soma = Soma::new(form, self.systems.clone());
        soma.populate(settings.properties())?;
        if settings.get(&SOULED) {
            if let Some(generator) = &self.souls {
                for spirit in generator.generate(soma.form()) {
                    soma.add_spirit(spirit);
                }
            }
        }
        info!(kind = %self.name, parts = soma.form().len(), spirits = soma.spirits().len(), "soma generated");
        Ok(soma)
    }
}
