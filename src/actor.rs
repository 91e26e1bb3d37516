//! # Actor
//!
//! The physical shell around a [`Soma`]: where it is, how fast it moves
//! and what it looks like. An actor tick runs the body, spawns whatever
//! broke off it, applies ground and medium friction, then moves the actor
//! inside the map's bounds.
//!
//! Friction decelerates by `μ·g`, where
//! `μ = (body roughness + ground roughness) / 2 + medium viscosity`
//! (the force `μ·g·m` divided by the actor's mass). Airborne actors only
//! feel the medium.

use tracing::{debug, info};

use crate::form::{Canvas, ROUGHNESS, VISCOSITY, Visage, draw_form};
use crate::model::{ActorId, Position, Vec3};
use crate::plane::Interactability;
use crate::soma::Soma;
use crate::world::{GameMap, QueuedAction};
use crate::Result;

#[derive(Debug)]
pub struct Actor {
    id: ActorId,
    pub name: String,
    pub position: Position,
    pub velocity: Vec3,
    kind: String,
    soma: Soma,
    /// `None`: the body is its own appearance.
    visage: Option<Visage>,
    dead: bool,
    redraw: bool,
}

impl Actor {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, soma: Soma, position: Position) -> Self {
        Self {
            id: ActorId::new(),
            name: name.into(),
            position,
            velocity: Vec3::ZERO,
            kind: kind.into(),
            soma,
            visage: None,
            dead: false,
            redraw: true,
        }
    }

    pub fn with_visage(mut self, visage: Visage) -> Self {
        self.visage = Some(visage);
        self
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn soma(&self) -> &Soma {
        &self.soma
    }

    /// Mutable body access marks the actor for redraw.
    pub fn soma_mut(&mut self) -> &mut Soma {
        self.mark_redraw();
        &mut self.soma
    }

    pub fn visage(&self) -> Option<&Visage> {
        self.visage.as_ref()
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn mass(&self) -> f64 {
        self.soma.mass()
    }

    pub fn momentum(&self) -> Vec3 {
        self.velocity * self.mass()
    }

    /// Change velocity by `impulse / mass`. Massless actors ignore it.
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        let mass = self.mass();
        if mass > 0.0 {
            self.velocity += impulse * (1.0 / mass);
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    pub fn can_render(&self) -> bool {
        match &self.visage {
            Some(v) => v.can_render(),
            None => self.soma.form().center().is_some(),
        }
    }

    pub fn needs_redraw(&self) -> bool {
        self.redraw || self.visage.as_ref().is_some_and(Visage::needs_redraw)
    }

    fn mark_redraw(&mut self) {
        self.redraw = true;
        if let Some(v) = &mut self.visage {
            v.mark_dirty();
        }
    }

    /// Hand every part visible from `planes` to `canvas`.
    pub fn draw(&mut self, canvas: &mut dyn Canvas, planes: Interactability) -> usize {
        self.redraw = false;
        match &mut self.visage {
            Some(v) => v.draw(canvas, planes),
            None => draw_form(self.soma.form(), canvas, planes),
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    pub fn tick(&mut self, ticks: u64, ticks_per_second: u32, map: &dyn GameMap) -> Result<()> {
        if ticks == 0 {
            return Ok(());
        }
        if !self.dead {
            self.soma.tick(ticks)?;
        }
        // Corpses still shed pieces.
        self.spawn_broken_off(map);
        if !self.dead && !self.soma.is_viable() {
            self.die(map);
        }
        let dt = ticks as f64 / f64::from(ticks_per_second.max(1));
        self.apply_friction(dt, map);
        self.integrate(dt, map);
        Ok(())
    }

    /// Queue a child actor per broken-off piece. Momentum is split in
    /// proportion to mass, so every piece keeps the parent's velocity.
    fn spawn_broken_off(&mut self, map: &dyn GameMap) {
        let pieces = self.soma.take_broken_off();
        if pieces.is_empty() {
            return;
        }
        let total = self.mass() + pieces.iter().map(|p| p.form.mass()).sum::<f64>();
        let momentum = self.velocity * total;
        for piece in pieces {
            let mass = piece.form.mass();
            let velocity = if total > 0.0 && mass > 0.0 {
                momentum * (mass / total) * (1.0 / mass)
            } else {
                Vec3::ZERO
            };
            let name = piece
                .form
                .center()
                .and_then(|c| piece.form.part(c))
                .map_or_else(|| self.name.clone(), |p| p.name.clone());
            let soma = Soma::from_piece(piece, self.soma.systems().to_vec());
            let mut child = Actor::new(name, self.kind.clone(), soma, self.position);
            child.velocity = velocity;
            info!(parent = %self.id, actor = %child.id, name = %child.name, mass, "piece spawned");
            map.queue_action(QueuedAction::Spawn(Box::new(child)));
        }
        self.mark_redraw();
    }

    fn die(&mut self, map: &dyn GameMap) {
        self.dead = true;
        let spirits = self.soma.release_spirits();
        info!(actor = %self.id, name = %self.name, released = spirits.len(), "actor died");
        if !spirits.is_empty() {
            map.queue_action(QueuedAction::Release(spirits));
        }
        self.mark_redraw();
    }

    fn apply_friction(&mut self, dt: f64, map: &dyn GameMap) {
        let speed = self.velocity.length();
        if speed == 0.0 {
            return;
        }
        let mass = self.mass();
        if mass <= 0.0 {
            self.velocity = Vec3::ZERO;
            return;
        }
        let medium = map.block_at(self.position).map_or(0.0, |m| m.property(&VISCOSITY));
        let contact = map.block_at(self.position.below()).map_or(0.0, |ground| {
            (self.soma.form().average_material_property(&ROUGHNESS) + ground.property(&ROUGHNESS)) / 2.0
        });
        let force = (contact + medium) * map.gravity() * mass;
        let slowed = (speed - force / mass * dt).max(0.0);
        self.velocity = self.velocity * (slowed / speed);
    }

    /// Move axis by axis; an axis that would leave the map stops dead.
    fn integrate(&mut self, dt: f64, map: &dyn GameMap) {
        if self.velocity.is_zero() {
            return;
        }
        let mut step = self.velocity * dt;
        let mut point = self.position.point;
        for axis in 0..3 {
            let mut next = point;
            *component(&mut next, axis) += *component(&mut step, axis);
            if map.out_of_bounds(self.position.with_point(next)) {
                *component(&mut self.velocity, axis) = 0.0;
            } else {
                point = next;
            }
        }
        if point != self.position.point {
            debug!(actor = %self.id, x = point.x, y = point.y, z = point.z, "actor moved");
            self.position = self.position.with_point(point);
            self.mark_redraw();
        }
    }
}

fn component(v: &mut Vec3, axis: usize) -> &mut f64 {
    match axis {
        0 => &mut v.x,
        1 => &mut v.y,
        _ => &mut v.z,
    }
}
