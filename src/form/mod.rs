//! # Forms
//!
//! A [`Form`] is a physical thing made of parts: an arena of [`Part`]s
//! keyed by [`PartId`], a representation graph (attachments, holding and
//! channel conduits) and a coverage graph (what lies over what, per
//! side). Bodies ([`Soma`](crate::soma::Soma)) and appearances
//! ([`Visage`]) are both forms.
//!
//! ## Connectivity
//!
//! One part is the center (torso, trunk). Only attachment edges
//! (`Joined`, `Merged`) decide whether a part is still connected to it.
//! Anything a connected part is holding stays with it. Everything else
//! has broken off and is moved into its own form by
//! [`sever_connection`](Form::sever_connection) or
//! [`destroy_part`](Form::destroy_part).
//!
//! Rings are allowed. Only reachability matters.

pub mod coverage;
pub mod part;
pub mod relations;
pub mod visage;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, trace};

use crate::ability::{PartStat, StatValue};
use crate::graph::{Edge, RelationGraph};
use crate::model::{FormId, PartId, Property};
use crate::plane::Interactability;
use crate::{Error, Result};

pub use part::{
    DENSITY, Material, MaterialState, Part, ROUGHNESS, Shape, ShapeState, StatusEffect, UNEVENNESS, VISCOSITY,
};
pub use relations::{BodyRelation, ChannelType, CoverageType, PartConnection, RelativeSide, COVERAGE};
pub use visage::{Canvas, Visage, draw_form};

pub type RepresentationGraph = RelationGraph<PartId, BodyRelation>;
pub type CoverageGraph = RelationGraph<PartId, CoverageType>;

/// Relations a broken-off piece takes along: its attachments and what it holds.
const CARRIED: [BodyRelation; 3] = [
    BodyRelation::Attach(PartConnection::Joined),
    BodyRelation::Attach(PartConnection::Merged),
    BodyRelation::Attach(PartConnection::Holding),
];

/// Relations that keep loose parts together in one piece.
const LOOSE: [BodyRelation; 4] = [
    BodyRelation::Attach(PartConnection::Joined),
    BodyRelation::Attach(PartConnection::Merged),
    BodyRelation::Attach(PartConnection::Holding),
    BodyRelation::Attach(PartConnection::HeldBy),
];

// ============================================================================
// Form
// ============================================================================

#[derive(Debug, Clone)]
pub struct Form {
    id: FormId,
    parts: HashMap<PartId, Part>,
    center: Option<PartId>,
    representation: RepresentationGraph,
    coverage: CoverageGraph,
    /// Mass of a body at relative size 1.0 and density 1.0.
    base_mass: f64,
}

impl Form {
    pub fn new(base_mass: f64) -> Self {
        Self {
            id: FormId::new(),
            parts: HashMap::new(),
            center: None,
            representation: RelationGraph::new(),
            coverage: RelationGraph::new(),
            base_mass,
        }
    }

    /// A form made of a single center part.
    pub fn with_center(center: Part, base_mass: f64) -> Self {
        let mut form = Self::new(base_mass);
        form.add_part(center);
        form
    }

    pub fn id(&self) -> FormId {
        self.id
    }

    pub fn center(&self) -> Option<PartId> {
        self.center
    }

    pub fn set_center(&mut self, part: PartId) -> Result<()> {
        if !self.parts.contains_key(&part) {
            return Err(Error::NotFound(format!("part {part}")));
        }
        self.center = Some(part);
        Ok(())
    }

    pub fn base_mass(&self) -> f64 {
        self.base_mass
    }

    // ========================================================================
    // Arena access
    // ========================================================================

    /// Insert an unattached part. The first part added becomes the center.
    pub fn add_part(&mut self, part: Part) -> PartId {
        let id = part.id();
        self.representation.add(id);
        self.parts.entry(id).or_insert(part);
        if self.center.is_none() {
            self.center = Some(id);
        }
        id
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(&id)
    }

    pub fn part_mut(&mut self, id: PartId) -> Option<&mut Part> {
        self.parts.get_mut(&id)
    }

    pub fn contains(&self, id: PartId) -> bool {
        self.parts.contains_key(&id)
    }

    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    pub fn part_ids(&self) -> impl Iterator<Item = PartId> + '_ {
        self.parts.keys().copied()
    }

    pub fn parts_by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Part> + 'a {
        self.parts.values().filter(move |p| p.name == name)
    }

    /// First part with the given name, if any.
    pub fn part_named(&self, name: &str) -> Option<PartId> {
        self.parts_by_name(name).next().map(Part::id)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn representation_graph(&self) -> &RepresentationGraph {
        &self.representation
    }

    pub fn coverage_graph(&self) -> &CoverageGraph {
        &self.coverage
    }

    /// Swap a part for a new one in place, keeping every edge.
    /// Returns false if `old` is not in the form.
    pub fn replace_part(&mut self, old: PartId, new: Part) -> Result<bool> {
        if !self.parts.contains_key(&old) {
            return Ok(false);
        }
        let new_id = new.id();
        if new_id != old && self.parts.contains_key(&new_id) {
            return Err(Error::ConstraintViolation(format!("part {new_id} is already in form {}", self.id)));
        }
        self.representation.set(old, new_id)?;
        self.coverage.set(old, new_id)?;
        self.parts.remove(&old);
        self.parts.insert(new_id, new);
        if self.center == Some(old) {
            self.center = Some(new_id);
        }
        Ok(true)
    }

    /// Move a part out of the form, dropping its edges.
    pub fn take_part(&mut self, id: PartId) -> Option<Part> {
        let part = self.parts.remove(&id)?;
        self.representation.remove(id);
        self.coverage.remove(id);
        if self.center == Some(id) {
            self.center = None;
        }
        Some(part)
    }

    // ========================================================================
    // Growth
    // ========================================================================

    /// Attach `part` to `to` and lay it over `to` on each of `covering`.
    ///
    /// `Ok(None)` when `to` is not in the form, or when merging onto a
    /// part that is already merged elsewhere. Structural errors from the
    /// graph leave the form unchanged.
    pub fn attach(
        &mut self,
        part: Part,
        to: PartId,
        connection: PartConnection,
        covering: &[RelativeSide],
    ) -> Result<Option<PartId>> {
        if !self.parts.contains_key(&to) {
            return Ok(None);
        }
        let id = part.id();
        if connection == PartConnection::Merged {
            let merged = BodyRelation::Attach(PartConnection::Merged);
            if self.representation.out_degree(to, merged) > 0 || self.representation.out_degree(id, merged) > 0 {
                return Ok(None);
            }
        }

        let fresh = !self.parts.contains_key(&id);
        let added = self.representation.add_edge(to, BodyRelation::Attach(connection), id)?;
        let mut covered = Vec::new();
        for side in covering {
            match self.coverage.add_edge(id, CoverageType::Covers(*side), to) {
                Ok(_) => covered.push(*side),
                Err(e) => {
                    for side in covered {
                        self.coverage.remove_edge(id, CoverageType::Covers(side), to);
                    }
                    if added {
                        self.representation.remove_edge(to, BodyRelation::Attach(connection), id);
                    }
                    if fresh {
                        self.representation.remove(id);
                    }
                    return Err(e);
                }
            }
        }
        if fresh {
            debug!(part = %id, name = %part.name, to = %to, ?connection, "part attached");
            self.parts.insert(id, part);
        }
        Ok(Some(id))
    }

    /// Connect two parts that are both already in the form.
    pub fn connect(&mut self, a: PartId, b: PartId, connection: PartConnection) -> Result<bool> {
        for id in [a, b] {
            if !self.parts.contains_key(&id) {
                return Err(Error::NotFound(format!("part {id}")));
            }
        }
        self.representation.add_edge(a, BodyRelation::Attach(connection), b)
    }

    /// Lay a channel between two parts of the form.
    ///
    /// `Ok(false)` if either part does not embed the channel's vector
    /// material, or the channel is already there.
    pub fn add_channel(&mut self, a: PartId, b: PartId, channel: ChannelType) -> Result<bool> {
        let (Some(pa), Some(pb)) = (self.parts.get(&a), self.parts.get(&b)) else {
            return Err(Error::NotFound(format!("channel endpoint {a} or {b}")));
        };
        if !pa.embeds(channel.vector_material) || !pb.embeds(channel.vector_material) {
            return Ok(false);
        }
        self.representation.add_edge(a, BodyRelation::Channel(channel), b)
    }

    /// Drop channel edges of `system` at `part` whose vector material is
    /// no longer embedded at both ends. Returns the pruned edges.
    pub fn prune_channels(&mut self, part: PartId, system: &str) -> Vec<Edge<PartId, BodyRelation>> {
        let stale: Vec<_> = self
            .representation
            .edges_from(part)
            .filter(|e| {
                e.rel.channel_of(system).is_some_and(|c| {
                    let embeds = |id: PartId| self.parts.get(&id).is_some_and(|p| p.embeds(c.vector_material));
                    !embeds(e.src) || !embeds(e.dst)
                })
            })
            .collect();
        for e in &stale {
            self.representation.remove_edge(e.src, e.rel, e.dst);
        }
        stale
    }

    // ========================================================================
    // Connectivity queries
    // ========================================================================

    /// Parts directly joined or merged to `part`.
    pub fn connected_parts(&self, part: PartId) -> Vec<PartId> {
        self.representation.neighbours(part, &PartConnection::ATTACHMENTS)
    }

    /// Parts reachable from the center over attachments (center included).
    pub fn contiguous_parts(&self) -> HashSet<PartId> {
        match self.center {
            Some(c) => self.representation.reachable(c, &PartConnection::ATTACHMENTS, |_| true),
            None => HashSet::new(),
        }
    }

    /// Parts not reachable from the center over attachments.
    pub fn non_connected_parts(&self) -> Vec<PartId> {
        let contiguous = self.contiguous_parts();
        self.parts.keys().filter(|id| !contiguous.contains(*id)).copied().collect()
    }

    /// Parts reachable from `from` over the channels of one system.
    pub fn channeled_parts(&self, from: PartId, system: &str) -> HashSet<PartId> {
        self.representation
            .reachable(from, &[], |e| e.rel.channel_of(system).is_some())
    }

    /// Parts that stay with the center: its attachment component plus
    /// whatever that component holds.
    fn anchored_parts(&self) -> HashSet<PartId> {
        match self.center {
            Some(c) => self.representation.reachable(c, &CARRIED, |_| true),
            None => HashSet::new(),
        }
    }

    // ========================================================================
    // Breakage
    // ========================================================================

    /// Cut every `Joined` edge between `a` and `b`.
    ///
    /// Returns the piece that lost its path to the center as a new form
    /// (everything internal to it kept, edges across the cut dropped), or
    /// `None` if there was nothing to cut or everything is still
    /// connected. `Merged` edges are never cut.
    pub fn sever_connection(&mut self, a: PartId, b: PartId) -> Option<Form> {
        let joined = BodyRelation::Attach(PartConnection::Joined);
        let cut: Vec<_> = self
            .representation
            .edges_between(a, b)
            .into_iter()
            .filter(|e| e.rel == joined)
            .collect();
        if cut.is_empty() {
            return None;
        }
        for e in &cut {
            self.representation.remove_edge(e.src, e.rel, e.dst);
        }
        debug!(form = %self.id, %a, %b, "connection severed");

        let anchored = self.anchored_parts();
        let off = [a, b].into_iter().find(|p| !anchored.contains(p))?;
        let piece = self.representation.reachable(off, &CARRIED, |e| !anchored.contains(&e.dst));
        Some(self.split_piece(&piece, off))
    }

    /// Remove a part and break off everything that only hung on through it.
    ///
    /// Returns the removed part and the broken-off pieces. Destroying the
    /// center leaves the rest in place with no center.
    pub fn destroy_part(&mut self, id: PartId) -> Option<(Part, Vec<Form>)> {
        let part = self.take_part(id)?;
        debug!(form = %self.id, part = %id, name = %part.name, "part destroyed");
        if self.center.is_none() {
            return Some((part, Vec::new()));
        }

        let anchored = self.anchored_parts();
        let mut loose: HashSet<PartId> = self.parts.keys().filter(|p| !anchored.contains(*p)).copied().collect();
        let mut pieces = Vec::new();
        while let Some(&seed) = loose.iter().next() {
            let group = self.representation.reachable(seed, &LOOSE, |e| loose.contains(&e.dst));
            loose.retain(|p| !group.contains(p));
            let center = group
                .iter()
                .copied()
                .max_by(|x, y| {
                    let size = |p: &PartId| self.parts.get(p).map_or(0.0, |p| p.relative_size);
                    size(x).total_cmp(&size(y)).then(x.cmp(y))
                })
                .unwrap_or(seed);
            pieces.push(self.split_piece(&group, center));
        }
        Some((part, pieces))
    }

    /// Move `nodes` into a new form centered on `center`.
    fn split_piece(&mut self, nodes: &HashSet<PartId>, center: PartId) -> Form {
        let (representation, crossing) = self.representation.split_off(nodes);
        let (coverage, covered) = self.coverage.split_off(nodes);
        trace!(crossing = crossing.len(), coverage = covered.len(), "edges dropped across cut");
        let parts: HashMap<PartId, Part> =
            nodes.iter().filter_map(|id| self.parts.remove(id).map(|p| (*id, p))).collect();
        let piece = Form {
            id: FormId::new(),
            parts,
            center: Some(center),
            representation,
            coverage,
            base_mass: self.base_mass,
        };
        debug!(from = %self.id, piece = %piece.id, parts = piece.len(), "piece broke off");
        piece
    }

    // ========================================================================
    // Aggregates
    // ========================================================================

    /// Fold a stat over every part whose abilities declare it.
    pub fn aggregate_stat(&self, stat: PartStat) -> StatValue {
        stat.aggregate(self.parts.values().filter_map(|p| p.abilities.stat_value(stat)))
    }

    pub fn mass(&self) -> f64 {
        self.parts.values().map(|p| p.mass(self.base_mass)).sum()
    }

    /// Size-weighted mean of a primary-material property over solid parts.
    pub fn average_material_property(&self, key: &Property<f64>) -> f64 {
        let (sum, weight) = self
            .parts
            .values()
            .filter(|p| !p.is_hole)
            .fold((0.0, 0.0), |(s, w), p| (s + p.material.property(key) * p.relative_size, w + p.relative_size));
        if weight > 0.0 { sum / weight } else { key.default_value() }
    }

    /// Parts detectable from any of `planes`.
    pub fn visible_parts(&self, planes: Interactability) -> Vec<PartId> {
        self.parts.values().filter(|p| p.detection.can_interact(planes)).map(Part::id).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::Ability;

    fn flesh(name: &str) -> Part {
        Part::new(name, Material::new("flesh"))
    }

    /// torso ─ head, torso ─ arm ─ hand
    fn humanoid() -> (Form, [PartId; 4]) {
        let mut form = Form::with_center(flesh("torso"), 70.0);
        let torso = form.center().unwrap();
        let head = form.attach(flesh("head"), torso, PartConnection::Joined, &[]).unwrap().unwrap();
        let arm = form.attach(flesh("arm"), torso, PartConnection::Joined, &[]).unwrap().unwrap();
        let hand = form.attach(flesh("hand"), arm, PartConnection::Joined, &[]).unwrap().unwrap();
        (form, [torso, head, arm, hand])
    }

    #[test]
    fn test_attach_to_absent_part() {
        let mut form = Form::with_center(flesh("torso"), 1.0);
        let got = form.attach(flesh("ghost"), PartId::new(), PartConnection::Joined, &[]).unwrap();
        assert_eq!(got, None);
        assert_eq!(form.len(), 1);
    }

    #[test]
    fn test_merge_sites_are_exclusive() {
        let mut form = Form::with_center(flesh("trunk"), 1.0);
        let trunk = form.center().unwrap();
        assert!(form.attach(flesh("bark"), trunk, PartConnection::Merged, &[]).unwrap().is_some());
        assert_eq!(form.attach(flesh("moss"), trunk, PartConnection::Merged, &[]).unwrap(), None);
        assert!(form.attach(flesh("branch"), trunk, PartConnection::Joined, &[]).unwrap().is_some());
        assert_eq!(form.len(), 3);
    }

    #[test]
    fn test_attach_adds_coverage() {
        let (mut form, [torso, ..]) = humanoid();
        let shirt = form
            .attach(flesh("shirt"), torso, PartConnection::Holding, &[RelativeSide::Front, RelativeSide::Back])
            .unwrap()
            .unwrap();
        assert!(form.coverage_graph().contains_edge(torso, CoverageType::CoveredOn(RelativeSide::Front), shirt));
        assert!(!form.connected_parts(torso).contains(&shirt));
    }

    #[test]
    fn test_contiguous_partition() {
        let (mut form, [torso, head, arm, hand]) = humanoid();
        let stray = form.add_part(flesh("tooth"));
        let contiguous = form.contiguous_parts();
        assert_eq!(contiguous.len(), 4);
        assert!([torso, head, arm, hand].iter().all(|p| contiguous.contains(p)));
        assert_eq!(form.non_connected_parts(), vec![stray]);
    }

    #[test]
    fn test_sever_splits_off_far_side() {
        let (mut form, [torso, _head, arm, hand]) = humanoid();
        let piece = form.sever_connection(torso, arm).unwrap();
        assert_eq!(piece.len(), 2);
        assert_eq!(piece.center(), Some(arm));
        assert!(piece.representation_graph().contains_edge(arm, BodyRelation::Attach(PartConnection::Joined), hand));
        assert_eq!(form.len(), 2);
        assert!(!form.contains(hand));
    }

    #[test]
    fn test_sever_ring_keeps_everything() {
        let (mut form, [torso, _, arm, hand]) = humanoid();
        form.connect(hand, torso, PartConnection::Joined).unwrap();
        assert!(form.sever_connection(torso, arm).is_none());
        assert_eq!(form.len(), 4);
        // Second cut breaks the ring.
        assert!(form.sever_connection(hand, torso).is_some());
    }

    #[test]
    fn test_sever_never_cuts_merged_or_missing() {
        let (mut form, [torso, head, arm, _]) = humanoid();
        let scale = form.attach(flesh("scale"), head, PartConnection::Merged, &[]).unwrap().unwrap();
        assert!(form.sever_connection(head, scale).is_none());
        assert!(form.sever_connection(head, arm).is_none());
        assert!(form.sever_connection(torso, scale).is_none());
        assert_eq!(form.len(), 5);
    }

    #[test]
    fn test_severed_hand_takes_what_it_holds() {
        let (mut form, [_, _, arm, hand]) = humanoid();
        let sword = form.attach(flesh("sword"), hand, PartConnection::Holding, &[]).unwrap().unwrap();
        let piece = form.sever_connection(arm, hand).unwrap();
        assert!(piece.contains(sword));
        assert!(piece.contains(hand));
        assert!(!form.contains(sword));
    }

    #[test]
    fn test_destroy_part_breaks_off_dependents() {
        let (mut form, [torso, head, arm, hand]) = humanoid();
        let (gone, pieces) = form.destroy_part(arm).unwrap();
        assert_eq!(gone.id(), arm);
        assert_eq!(pieces.len(), 1);
        assert!(pieces[0].contains(hand));
        assert!(form.contains(torso) && form.contains(head));
        assert_eq!(form.len(), 2);
    }

    #[test]
    fn test_replace_part_keeps_edges() {
        let (mut form, [torso, head, ..]) = humanoid();
        let new_head = form.part(head).unwrap().duplicate(true);
        let new_id = new_head.id();
        assert!(form.replace_part(head, new_head).unwrap());
        assert!(form.connected_parts(torso).contains(&new_id));
        assert!(form.part(head).is_none());
    }

    #[test]
    fn test_aggregate_stat_and_mass() {
        let (mut form, [torso, _, arm, hand]) = humanoid();
        form.part_mut(hand).unwrap().abilities.insert(Ability::Grasp { strength: 3.0 });
        form.part_mut(arm).unwrap().abilities.insert(Ability::Grasp { strength: 2.0 });
        assert_eq!(form.aggregate_stat(PartStat::GraspStrength), StatValue::Scalar(5.0));
        assert_eq!(form.aggregate_stat(PartStat::WalkSpeed), StatValue::Scalar(0.0));
        assert!((form.mass() - 280.0).abs() < 1e-9);
        form.part_mut(torso).unwrap().relative_size = 0.5;
        assert!((form.mass() - 245.0).abs() < 1e-9);
    }

    #[test]
    fn test_channels_need_vector_material() {
        const VESSEL: ChannelType = ChannelType { system: "circulatory", name: "vessel", vector_material: "blood" };
        let mut form = Form::with_center(flesh("torso").with_embedded(Material::new("blood")), 1.0);
        let torso = form.center().unwrap();
        let arm = form
            .attach(flesh("arm").with_embedded(Material::new("blood")), torso, PartConnection::Joined, &[])
            .unwrap()
            .unwrap();
        let claw = form.attach(flesh("claw"), arm, PartConnection::Joined, &[]).unwrap().unwrap();
        assert!(form.add_channel(torso, arm, VESSEL).unwrap());
        assert!(!form.add_channel(arm, claw, VESSEL).unwrap());
        assert_eq!(form.channeled_parts(torso, "circulatory").len(), 2);

        form.part_mut(arm).unwrap().embedded.clear();
        assert_eq!(form.prune_channels(arm, "circulatory").len(), 1);
        assert_eq!(form.channeled_parts(torso, "circulatory").len(), 1);
    }
}
