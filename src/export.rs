//! Cypher DUMP export: write a form as Cypher statements.
//!
//! Knowledge and rendering consumers outside the engine read bodies as
//! plain property graphs. Parts become `:Part` nodes; attachments,
//! channels and coverage become relationships.
//!
//! ```text
//! Form → export_cypher_dump() → CREATE/MATCH statements
//!   → load into any Cypher-compatible store
//! ```
//!
//! Output is sorted by part id so that equal forms dump identically.

use std::io::Write;

use crate::form::{BodyRelation, COVERAGE, CoverageType, Form, Part};
use crate::model::{PropertyMap, Value};
use crate::Result;

/// Write `form` as a Cypher script.
pub fn export_cypher_dump(form: &Form, writer: &mut dyn Write) -> Result<()> {
    let mut parts: Vec<&Part> = form.parts().collect();
    parts.sort_by_key(|p| p.id());

    writeln!(writer, "// soma-rs Cypher DUMP")?;
    writeln!(writer, "// Form: {}", form.id())?;
    writeln!(writer, "// Parts: {}", parts.len())?;
    writeln!(writer)?;

    for part in &parts {
        writeln!(writer, "CREATE (n:Part {{{}}});", part_properties(form, part))?;
    }

    writeln!(writer)?;
    writeln!(writer, "// Relationships")?;

    let mut lines = Vec::new();
    for e in form.representation_graph().edges() {
        let (label, props) = match e.rel {
            BodyRelation::Attach(conn) => (format!("{conn:?}").to_uppercase(), String::new()),
            BodyRelation::Channel(c) => {
                (c.name.to_uppercase(), format!(" {{system: {}}}", format_value(&Value::from(c.system))))
            }
        };
        lines.push((e.src, e.dst, match_create(&e.src, &e.dst, &label, &props)));
    }
    for e in form.coverage_graph().edges() {
        let (coverer, side, covered) = match e.rel {
            CoverageType::Covers(side) => (e.src, side, e.dst),
            CoverageType::CoveredOn(side) => (e.dst, side, e.src),
        };
        let fraction = form.coverage_graph().property(e.src, e.rel, e.dst, &COVERAGE);
        let props = format!(" {{side: '{}', coverage: {fraction}}}", format!("{side:?}").to_lowercase());
        lines.push((coverer, covered, match_create(&coverer, &covered, "COVERS", &props)));
    }
    lines.sort_by(|a, b| (a.0, a.1, &a.2).cmp(&(b.0, b.1, &b.2)));
    for (_, _, line) in lines {
        writeln!(writer, "{line}")?;
    }
    Ok(())
}

/// The dump as a string.
pub fn cypher_dump(form: &Form) -> Result<String> {
    let mut buf = Vec::new();
    export_cypher_dump(form, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn match_create(a: &impl std::fmt::Display, b: &impl std::fmt::Display, label: &str, props: &str) -> String {
    format!("MATCH (a {{_id: '{a}'}}), (b {{_id: '{b}'}}) CREATE (a)-[:{label}{props}]->(b);")
}

fn part_properties(form: &Form, part: &Part) -> String {
    let mut props = PropertyMap::new();
    props.insert("name".into(), Value::from(part.name.clone()));
    props.insert("material".into(), Value::from(part.material.name.clone()));
    props.insert("size".into(), Value::Float(part.relative_size));
    props.insert("mass".into(), Value::Float(part.mass(form.base_mass())));
    if form.center() == Some(part.id()) {
        props.insert("center".into(), Value::Bool(true));
    }
    if part.is_hole {
        props.insert("hole".into(), Value::Bool(true));
    }
    for (resource, amount) in &part.resources {
        props.insert(resource.clone(), Value::Float(*amount));
    }
    let rest = format_properties(&props);
    format!("_id: '{}', {rest}", part.id())
}

/// Format a PropertyMap as a Cypher property string (key: value, ...),
/// keys sorted.
fn format_properties(props: &PropertyMap) -> String {
    let mut keys: Vec<&String> = props.keys().filter(|k| !k.starts_with('_')).collect();
    keys.sort();
    keys.iter().map(|k| format!("{k}: {}", format_value(&props[*k]))).collect::<Vec<_>>().join(", ")
}

/// Format a Value as a Cypher literal.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "\\'")),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{f}"),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Map(m) => {
            let mut inner: Vec<String> = m.iter().map(|(k, v)| format!("{k}: {}", format_value(v))).collect();
            inner.sort();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{Material, PartConnection, RelativeSide};

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::String("it's".into())), "'it\\'s'");
        assert_eq!(format_value(&Value::Int(42)), "42");
        assert_eq!(format_value(&Value::Float(0.5)), "0.5");
        assert_eq!(format_value(&Value::Bool(true)), "true");
        assert_eq!(format_value(&Value::Null), "null");
    }

    #[test]
    fn test_format_properties_sorted() {
        let mut props = PropertyMap::new();
        props.insert("name".into(), Value::String("heart".into()));
        props.insert("blood".into(), Value::Float(1.0));
        props.insert("_hidden".into(), Value::Int(3));
        assert_eq!(format_properties(&props), "blood: 1, name: 'heart'");
    }

    #[test]
    fn test_dump_form() {
        let mut form = Form::with_center(Part::new("torso", Material::new("flesh")), 2.0);
        let torso = form.center().unwrap();
        form.attach(Part::new("arm", Material::new("flesh")), torso, PartConnection::Joined, &[]).unwrap();
        form.attach(Part::new("shirt", Material::new("cloth")), torso, PartConnection::Holding, &[RelativeSide::Front])
            .unwrap();

        let dump = cypher_dump(&form).unwrap();
        assert_eq!(dump.matches("CREATE (n:Part").count(), 3);
        assert!(dump.contains("center: true"));
        assert!(dump.contains("name: 'arm'"));
        assert!(dump.contains("[:JOINED]"));
        assert!(dump.contains("[:HOLDING]") || dump.contains("[:HELDBY]"));
        assert!(dump.contains("[:COVERS {side: 'front', coverage: 1}]"));
        assert_eq!(dump, cypher_dump(&form).unwrap());
    }
}
