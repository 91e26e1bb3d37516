//! Coverage queries: how much of a part is hidden, per side.

use hashbrown::HashMap;

use crate::model::PartId;
use crate::Result;

use super::{CoverageType, Form, RelativeSide, COVERAGE};

impl Form {
    /// Record that `coverer` hides `fraction` of `covered` on `side`,
    /// adding the coverage edge if needed.
    pub fn set_coverage(&mut self, coverer: PartId, covered: PartId, side: RelativeSide, fraction: f64) -> Result<()> {
        let rel = CoverageType::Covers(side);
        self.coverage.add_edge(coverer, rel, covered)?;
        self.coverage.set_property(coverer, rel, covered, &COVERAGE, fraction.clamp(0.0, 1.0))
    }

    /// Fraction of `covered` hidden directly by `coverer`.
    ///
    /// With no side given, the best-covered side counts. Zero when the
    /// two parts are not in a coverage relation.
    pub fn percent_covered(&self, coverer: PartId, covered: PartId, side: Option<RelativeSide>) -> f64 {
        let fraction = |s: RelativeSide| {
            let rel = CoverageType::Covers(s);
            if self.coverage.contains_edge(coverer, rel, covered) {
                self.coverage.property(coverer, rel, covered, &COVERAGE)
            } else {
                0.0
            }
        };
        match side {
            Some(s) => fraction(s),
            None => RelativeSide::ALL.into_iter().map(fraction).fold(0.0, f64::max),
        }
    }

    /// Total coverage of `part` per side, counting layers over layers.
    ///
    /// A coverer reached through a chain of layers contributes the
    /// product of the fractions along the chain. Contributions combine as
    /// independent occluders: `1 − Π(1 − pᵢ)`. Sides with no coverer are
    /// absent from the result.
    pub fn overall_coverage(&self, part: PartId) -> HashMap<RelativeSide, f64> {
        let mut sides = HashMap::new();
        for side in RelativeSide::ALL {
            let rel = CoverageType::CoveredOn(side);
            let mut depth: HashMap<PartId, f64> = HashMap::new();
            depth.insert(part, 1.0);
            let mut uncovered = 1.0;
            for edge in self.coverage.bfs(part, &[rel], |_| true) {
                let p = self.coverage.property(edge.src, rel, edge.dst, &COVERAGE);
                let reach = depth.get(&edge.src).copied().unwrap_or(1.0) * p;
                depth.insert(edge.dst, reach);
                uncovered *= 1.0 - reach;
            }
            if depth.len() > 1 {
                sides.insert(side, 1.0 - uncovered);
            }
        }
        sides
    }

    /// True when every side of `part` is at least `threshold` covered.
    pub fn is_enclosed(&self, part: PartId, threshold: f64) -> bool {
        let coverage = self.overall_coverage(part);
        RelativeSide::ALL.iter().all(|s| coverage.get(s).is_some_and(|c| *c >= threshold))
    }
}

#[cfg(test)]
mod tests {
    use crate::form::{Form, Material, Part, PartConnection, RelativeSide};

    #[test]
    fn test_layers_combine() {
        let mut form = Form::with_center(Part::new("arm", Material::new("flesh")), 1.0);
        let arm = form.center().unwrap();
        let sleeve = form
            .attach(Part::new("sleeve", Material::new("cloth")), arm, PartConnection::Holding, &[RelativeSide::Front])
            .unwrap()
            .unwrap();
        let gauntlet = form
            .attach(Part::new("bracer", Material::new("steel")), arm, PartConnection::Holding, &[])
            .unwrap()
            .unwrap();
        form.set_coverage(sleeve, arm, RelativeSide::Front, 0.5).unwrap();
        form.set_coverage(gauntlet, arm, RelativeSide::Front, 0.5).unwrap();

        assert_eq!(form.percent_covered(sleeve, arm, Some(RelativeSide::Front)), 0.5);
        assert_eq!(form.percent_covered(sleeve, arm, Some(RelativeSide::Back)), 0.0);
        assert_eq!(form.percent_covered(gauntlet, arm, None), 0.5);

        let overall = form.overall_coverage(arm);
        assert!((overall[&RelativeSide::Front] - 0.75).abs() < 1e-9);
        assert!(!overall.contains_key(&RelativeSide::Back));
        assert!(!form.is_enclosed(arm, 0.1));
    }

    #[test]
    fn test_outer_layer_scales_by_inner() {
        let mut form = Form::with_center(Part::new("torso", Material::new("flesh")), 1.0);
        let torso = form.center().unwrap();
        let shirt = form
            .attach(Part::new("shirt", Material::new("cloth")), torso, PartConnection::Holding, &[RelativeSide::Back])
            .unwrap()
            .unwrap();
        let _cloak = form
            .attach(Part::new("cloak", Material::new("wool")), shirt, PartConnection::Holding, &[RelativeSide::Back])
            .unwrap()
            .unwrap();
        form.set_coverage(shirt, torso, RelativeSide::Back, 0.5).unwrap();

        // A coverage edge without a recorded fraction covers fully.
        assert_eq!(form.overall_coverage(shirt)[&RelativeSide::Back], 1.0);
        // shirt 0.5, cloak through shirt 0.5 → 1 − 0.5·0.5
        assert!((form.overall_coverage(torso)[&RelativeSide::Back] - 0.75).abs() < 1e-9);
    }
}
