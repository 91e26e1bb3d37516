//! # World driver
//!
//! The engine does not own terrain. A [`Terrain`] answers what block
//! material sits at a position, how strong gravity is and where the map
//! ends; a [`GameMap`] adds the deferred [`ActionQueue`].
//!
//! Actors tick one after another. Anything that would change the actor
//! collection mid-iteration (a piece breaking off, a death) is queued and
//! applied once every actor has ticked. An actor whose tick fails is
//! logged and skipped; the rest of the world keeps going.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::actor::Actor;
use crate::channel::ChannelRegistry;
use crate::config::EngineConfig;
use crate::form::Material;
use crate::kind::{Kind, KindSettings};
use crate::model::{ActorId, Position, Vec3};
use crate::plane::PlaneRegistry;
use crate::soma::Soma;
use crate::spirit::Spirit;
use crate::{Error, Result};

// ============================================================================
// Collaborator traits
// ============================================================================

pub trait Terrain {
    /// Material of the block at `position`; `None` is empty space.
    fn block_at(&self, position: Position) -> Option<Material>;

    fn gravity(&self) -> f64;

    fn out_of_bounds(&self, position: Position) -> bool;
}

pub trait GameMap: Terrain {
    /// Defer `action` until every actor has ticked.
    fn queue_action(&self, action: QueuedAction);
}

// ============================================================================
// Action queue
// ============================================================================

#[derive(Debug)]
pub enum QueuedAction {
    Spawn(Box<Actor>),
    Despawn(ActorId),
    /// Spirits released by a dead body.
    Release(Vec<Spirit>),
}

/// Post-tick actions, pushed through `&self` from inside actor ticks.
#[derive(Debug, Default)]
pub struct ActionQueue {
    pending: Mutex<Vec<QueuedAction>>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, action: QueuedAction) {
        self.pending.lock().push(action);
    }

    pub fn drain(&self) -> Vec<QueuedAction> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

// ============================================================================
// FlatTerrain
// ============================================================================

/// Ground below `z = 0`, a medium above it, box bounds.
#[derive(Debug, Clone)]
pub struct FlatTerrain {
    pub ground: Material,
    pub medium: Option<Material>,
    pub gravity: f64,
    pub min: Vec3,
    pub max: Vec3,
}

impl FlatTerrain {
    pub fn new(ground: Material, gravity: f64) -> Self {
        Self {
            ground,
            medium: None,
            gravity,
            min: Vec3::new(-1000.0, -1000.0, -1.0),
            max: Vec3::new(1000.0, 1000.0, 1000.0),
        }
    }

    pub fn with_medium(mut self, medium: Material) -> Self {
        self.medium = Some(medium);
        self
    }

    pub fn with_bounds(mut self, min: Vec3, max: Vec3) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

impl Terrain for FlatTerrain {
    fn block_at(&self, position: Position) -> Option<Material> {
        if position.point.z < 0.0 { Some(self.ground.clone()) } else { self.medium.clone() }
    }

    fn gravity(&self) -> f64 {
        self.gravity
    }

    fn out_of_bounds(&self, position: Position) -> bool {
        let p = position.point;
        p.x < self.min.x || p.x > self.max.x || p.y < self.min.y || p.y > self.max.y || p.z < self.min.z || p.z > self.max.z
    }
}

/// Terrain plus queue, borrowed for the length of a world tick.
struct MapView<'a, T> {
    terrain: &'a T,
    queue: &'a ActionQueue,
}

impl<T: Terrain> Terrain for MapView<'_, T> {
    fn block_at(&self, position: Position) -> Option<Material> {
        self.terrain.block_at(position)
    }

    fn gravity(&self) -> f64 {
        self.terrain.gravity()
    }

    fn out_of_bounds(&self, position: Position) -> bool {
        self.terrain.out_of_bounds(position)
    }
}

impl<T: Terrain> GameMap for MapView<'_, T> {
    fn queue_action(&self, action: QueuedAction) {
        self.queue.push(action);
    }
}

// ============================================================================
// Universe
// ============================================================================

/// Shared context of every world: planes, channel systems, kinds, config.
#[derive(Debug, Clone)]
pub struct Universe {
    config: EngineConfig,
    planes: PlaneRegistry,
    channels: ChannelRegistry,
    kinds: BTreeMap<String, Arc<Kind>>,
}

impl Universe {
    /// A universe with the standard planes (as many as `max_planes`
    /// allows) and the standard channel systems.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let mut planes = PlaneRegistry::with_limit(config.max_planes);
        for name in [PlaneRegistry::PHYSICAL, PlaneRegistry::ASTRAL, PlaneRegistry::ETHEREAL]
            .into_iter()
            .take(config.max_planes)
        {
            planes.register(name)?;
        }
        let channels = ChannelRegistry::standard(&config);
        Ok(Self { config, planes, channels, kinds: BTreeMap::new() })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn planes(&self) -> &PlaneRegistry {
        &self.planes
    }

    pub fn planes_mut(&mut self) -> &mut PlaneRegistry {
        &mut self.planes
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut ChannelRegistry {
        &mut self.channels
    }

    pub fn register_kind(&mut self, kind: Kind) -> Arc<Kind> {
        let kind = Arc::new(kind);
        self.kinds.insert(kind.name.clone(), Arc::clone(&kind));
        kind
    }

    pub fn kind(&self, name: &str) -> Option<Arc<Kind>> {
        self.kinds.get(name).cloned()
    }

    pub fn generate_soma(&self, kind: &str, settings: &KindSettings) -> Result<Soma> {
        let kind = self.kind(kind).ok_or_else(|| Error::NotFound(format!("kind '{kind}'")))?;
        kind.generate_soma(settings, &self.planes)
    }
}

// ============================================================================
// World
// ============================================================================

/// What one world tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub ticked: usize,
    pub failures: Vec<(ActorId, String)>,
    pub spawned: Vec<ActorId>,
    pub despawned: Vec<ActorId>,
    pub released: usize,
}

#[derive(Debug)]
pub struct World<T: Terrain> {
    universe: Universe,
    terrain: T,
    actors: BTreeMap<ActorId, Actor>,
    queue: ActionQueue,
    ghosts: Vec<Spirit>,
    ticks: u64,
}

impl<T: Terrain> World<T> {
    pub fn new(universe: Universe, terrain: T) -> Self {
        Self { universe, terrain, actors: BTreeMap::new(), queue: ActionQueue::new(), ghosts: Vec::new(), ticks: 0 }
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn terrain(&self) -> &T {
        &self.terrain
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Total ticks simulated.
    pub fn elapsed(&self) -> u64 {
        self.ticks
    }

    pub fn insert(&mut self, actor: Actor) -> ActorId {
        let id = actor.id();
        self.actors.insert(id, actor);
        id
    }

    /// Generate a body of `kind` and place it at `position`.
    pub fn spawn(&mut self, name: &str, kind: &str, settings: &KindSettings, position: Position) -> Result<ActorId> {
        let soma = self.universe.generate_soma(kind, settings)?;
        let actor = Actor::new(name, kind, soma, position);
        info!(actor = %actor.id(), name, kind, "actor spawned");
        Ok(self.insert(actor))
    }

    pub fn remove(&mut self, id: ActorId) -> Option<Actor> {
        self.actors.remove(&id)
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Bodiless spirits drifting in the world.
    pub fn ghosts(&self) -> &[Spirit] {
        &self.ghosts
    }

    /// Tick every actor, then apply the queued actions, then let the
    /// ghosts drift.
    pub fn tick(&mut self, ticks: u64) -> TickReport {
        let mut report = TickReport::default();
        let tps = self.universe.config.ticks_per_second;
        let map = MapView { terrain: &self.terrain, queue: &self.queue };

        for (id, actor) in &mut self.actors {
            match actor.tick(ticks, tps, &map) {
                Ok(()) => report.ticked += 1,
                Err(e) => {
                    warn!(actor = %id, error = %e, "actor tick failed");
                    report.failures.push((*id, e.to_string()));
                }
            }
        }

        for action in self.queue.drain() {
            match action {
                QueuedAction::Spawn(actor) => {
                    report.spawned.push(actor.id());
                    self.actors.insert(actor.id(), *actor);
                }
                QueuedAction::Despawn(id) => {
                    if self.actors.remove(&id).is_some() {
                        report.despawned.push(id);
                    }
                }
                QueuedAction::Release(spirits) => {
                    report.released += spirits.len();
                    self.ghosts.extend(spirits);
                }
            }
        }

        for ghost in &mut self.ghosts {
            ghost.untethered_tick(ticks);
        }
        self.ghosts.retain(|g| !g.is_removed());

        self.ticks += ticks;
        debug!(ticks = self.ticks, actors = self.actors.len(), failures = report.failures.len(), "world ticked");
        report
    }
}
