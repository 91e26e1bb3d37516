//! Appearance forms and the render hook.
//!
//! Nothing here renders. A [`Visage`] walks its form and hands each
//! visible part to a [`Canvas`] supplied by the caller.

use hashbrown::HashMap;

use crate::graph::Edge;
use crate::model::PartId;
use crate::plane::Interactability;

use super::{BodyRelation, Form, Part};

/// Render target implemented outside the engine.
pub trait Canvas {
    /// `depth` is the attachment distance from the center part.
    fn draw_part(&mut self, part: &Part, depth: usize);
}

/// How a thing looks. May differ from what its body is.
#[derive(Debug, Clone)]
pub struct Visage {
    form: Form,
    dirty: bool,
}

impl Visage {
    pub fn new(form: Form) -> Self {
        Self { form, dirty: true }
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    /// Mutable access marks the visage for redraw.
    pub fn form_mut(&mut self) -> &mut Form {
        self.dirty = true;
        &mut self.form
    }

    pub fn can_render(&self) -> bool {
        self.form.center().is_some() && !self.form.is_empty()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn needs_redraw(&self) -> bool {
        self.dirty
    }

    /// Draw the parts visible from `planes`, center first, breadth first.
    /// Returns how many parts were drawn.
    pub fn draw(&mut self, canvas: &mut dyn Canvas, planes: Interactability) -> usize {
        self.dirty = false;
        draw_form(&self.form, canvas, planes)
    }
}

/// Breadth-first draw of any form; shared with bodies that are their own visage.
pub fn draw_form(form: &Form, canvas: &mut dyn Canvas, planes: Interactability) -> usize {
    let Some(center) = form.center() else {
        return 0;
    };
    let mut depth: HashMap<PartId, usize> = HashMap::new();
    depth.insert(center, 0);
    let mut drawn = 0;
    let mut visit = |id: PartId, d: usize| {
        if let Some(part) = form.part(id).filter(|p| p.detection.can_interact(planes)) {
            canvas.draw_part(part, d);
            drawn += 1;
        }
    };
    visit(center, 0);
    let structural = |e: &Edge<PartId, BodyRelation>| !matches!(e.rel, BodyRelation::Channel(_));
    for edge in form.representation_graph().bfs(center, &[], structural) {
        let d = depth.get(&edge.src).copied().unwrap_or(0) + 1;
        depth.insert(edge.dst, d);
        visit(edge.dst, d);
    }
    drawn
}
