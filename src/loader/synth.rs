//! Creation statements for staged chunks.
//!
//! Each statement iterates a staged array with `UNWIND` and creates one
//! vertex or edge per element, so a chunk costs one round trip regardless of
//! its size.

use std::collections::BTreeSet;

use crate::model::{EntityKind, Record};
use crate::query::render::wrap_sql;
use crate::schema::{SchemaProvider, DEFAULT_ID_PROPERTY, EDGE_FROM_FIELD, EDGE_TO_FIELD};

/// Field added to every staged record holding its position within its type.
pub(crate) const INDEX_FIELD: &str = "__index";

/// Column returned by vertex statements.
pub(crate) const CREATED_COLUMN: &str = "created";

/// Column returned by edge statements, one row per created edge.
pub(crate) const INDEX_COLUMN: &str = "idx";

/// Properties written for a type, plus record fields that are dropped
/// because the schema does not declare them.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Columns {
    pub(crate) stored: Vec<String>,
    pub(crate) dropped: Vec<String>,
}

pub(crate) fn columns<'r>(
    schema: &dyn SchemaProvider,
    kind: EntityKind,
    type_name: &str,
    records: impl IntoIterator<Item = &'r Record>,
) -> Columns {
    let reserved: &[&str] = match kind {
        EntityKind::Vertex => &[INDEX_FIELD],
        EntityKind::Edge => &[INDEX_FIELD, EDGE_FROM_FIELD, EDGE_TO_FIELD],
    };
    let present: BTreeSet<&str> = records
        .into_iter()
        .flat_map(|record| record.keys().map(String::as_str))
        .filter(|key| !reserved.contains(key))
        .collect();

    let declared: Vec<String> = schema
        .property_definitions(type_name)
        .map(|defs| defs.iter().map(|def| def.name.clone()).collect())
        .unwrap_or_default();
    if declared.is_empty() {
        return Columns {
            stored: present.into_iter().map(str::to_owned).collect(),
            dropped: Vec::new(),
        };
    }

    let mut stored = Vec::with_capacity(declared.len() + 1);
    if kind == EntityKind::Vertex {
        stored.push(vertex_id_property(schema, type_name).to_owned());
    }
    for name in declared {
        if !stored.contains(&name) {
            stored.push(name);
        }
    }
    let dropped = present
        .into_iter()
        .filter(|key| !stored.iter().any(|s| s == key))
        .map(str::to_owned)
        .collect();
    Columns { stored, dropped }
}

pub(crate) fn vertex_id_property<'s>(schema: &'s dyn SchemaProvider, label: &str) -> &'s str {
    schema.id_property(label).unwrap_or(DEFAULT_ID_PROPERTY)
}

fn property_map(var: &str, columns: &[String]) -> String {
    if columns.is_empty() {
        return String::new();
    }
    let body = columns
        .iter()
        .map(|c| format!("{c}: {var}.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(" {{{body}}}")
}

/// `UNWIND <source> AS row CREATE (v:Type {..}) RETURN count(v) AS created`
pub(crate) fn vertex_statement(
    graph: &str,
    source: &str,
    type_name: &str,
    columns: &[String],
) -> String {
    let cypher = format!(
        "UNWIND {source} AS row CREATE (v:{type_name}{}) RETURN count(v) AS {CREATED_COLUMN}",
        property_map("row", columns)
    );
    wrap_sql(graph, &cypher, &[CREATED_COLUMN.to_owned()])
}

/// Endpoint labels and identifier properties of an edge type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Endpoints {
    pub(crate) from_label: String,
    pub(crate) from_id: String,
    pub(crate) to_label: String,
    pub(crate) to_id: String,
}

impl Endpoints {
    pub(crate) fn resolve(schema: &dyn SchemaProvider, edge_type: &str) -> Option<Self> {
        let (from, to) = schema.edge_endpoints(edge_type)?;
        Some(Self {
            from_label: from.to_owned(),
            from_id: vertex_id_property(schema, from).to_owned(),
            to_label: to.to_owned(),
            to_id: vertex_id_property(schema, to).to_owned(),
        })
    }
}

/// Matches both endpoints by identifier and creates the edge. Rows whose
/// endpoints do not match produce no output, so missing `idx` values are
/// unresolved references.
pub(crate) fn edge_statement(
    graph: &str,
    source: &str,
    type_name: &str,
    endpoints: &Endpoints,
    columns: &[String],
) -> String {
    let cypher = format!(
        "UNWIND {source} AS row \
         MATCH (source:{from_label}), (target:{to_label}) \
         WHERE source.{from_id} = row.{EDGE_FROM_FIELD} AND target.{to_id} = row.{EDGE_TO_FIELD} \
         CREATE (source)-[e:{type_name}{props}]->(target) \
         RETURN row.{INDEX_FIELD} AS {INDEX_COLUMN}",
        from_label = endpoints.from_label,
        to_label = endpoints.to_label,
        from_id = endpoints.from_id,
        to_id = endpoints.to_id,
        props = property_map("row", columns),
    );
    wrap_sql(graph, &cypher, &[INDEX_COLUMN.to_owned()])
}
