//! Clause ordering, schema and parameter checks.
//!
//! Ordering is checked over the assembled parts rather than enforced at call
//! time, so callers may add clauses conditionally in any order and still get
//! a precise report.

use std::collections::{BTreeMap, BTreeSet};

use crate::query::issues::QueryIssue;
use crate::query::part::{PartKind, QueryPart};
use crate::query::pattern::Pattern;
use crate::schema::SchemaProvider;
use crate::value::Value;

/// Position of a clause inside one WITH-delimited segment.
fn rank(kind: PartKind) -> u8 {
    match kind {
        PartKind::Match | PartKind::Unwind => 0,
        PartKind::Where => 1,
        PartKind::With | PartKind::Return => 2,
        PartKind::OrderBy => 3,
        PartKind::Skip => 4,
        PartKind::Limit => 5,
    }
}

#[derive(Default)]
struct Segment {
    rank: Option<u8>,
    projection: Option<PartKind>,
    with_filtered: bool,
    seen_skip: bool,
    seen_limit: bool,
}

/// Reports clauses assembled out of order.
pub(crate) fn ordering_issues(parts: &[QueryPart]) -> Vec<QueryIssue> {
    let mut issues = Vec::new();
    let mut segment = Segment::default();
    let mut returned = false;
    let mut previous: Option<PartKind> = None;

    for part in parts {
        let kind = part.kind();
        let prior = previous.replace(kind);
        let after = prior.unwrap_or(kind);

        if returned && !matches!(kind, PartKind::OrderBy | PartKind::Skip | PartKind::Limit) {
            issues.push(QueryIssue::ClauseAfterReturn { part: kind });
            continue;
        }

        match kind {
            PartKind::Match | PartKind::Unwind | PartKind::With | PartKind::Return
                if segment.projection == Some(PartKind::With) =>
            {
                // WITH closes the segment; anything reading or projecting
                // starts a new one.
                segment = Segment::default();
            }
            PartKind::Where if segment.projection == Some(PartKind::With) => {
                if segment.with_filtered {
                    issues.push(QueryIssue::OutOfOrder { part: kind, after });
                }
                segment.with_filtered = true;
                continue;
            }
            _ => {}
        }

        match kind {
            PartKind::Where if segment.rank.is_none() => {
                issues.push(QueryIssue::WhereWithoutSource);
                continue;
            }
            // WHERE only filters a MATCH or a WITH, never an UNWIND.
            PartKind::Where if prior == Some(PartKind::Unwind) => {
                issues.push(QueryIssue::OutOfOrder { part: kind, after });
                continue;
            }
            PartKind::OrderBy | PartKind::Skip | PartKind::Limit => {
                if segment.projection.is_none() {
                    issues.push(QueryIssue::RequiresProjection { part: kind });
                    continue;
                }
                if segment.with_filtered {
                    issues.push(QueryIssue::OutOfOrder {
                        part: kind,
                        after: PartKind::Where,
                    });
                    continue;
                }
                let duplicate = match kind {
                    PartKind::Skip => std::mem::replace(&mut segment.seen_skip, true),
                    PartKind::Limit => std::mem::replace(&mut segment.seen_limit, true),
                    _ => false,
                };
                if duplicate {
                    issues.push(QueryIssue::DuplicateClause { part: kind });
                    continue;
                }
            }
            _ => {}
        }

        let current = rank(kind);
        match segment.rank {
            Some(rank) if current < rank => {
                issues.push(QueryIssue::OutOfOrder { part: kind, after });
            }
            _ => segment.rank = Some(current),
        }
        if matches!(kind, PartKind::With | PartKind::Return) {
            segment.projection = Some(kind);
            returned = kind == PartKind::Return;
        }
    }
    issues
}

/// Reports labels and constrained properties the schema does not declare.
pub(crate) fn schema_issues(parts: &[QueryPart], schema: &dyn SchemaProvider) -> Vec<QueryIssue> {
    let mut issues = Vec::new();
    for part in parts {
        if let QueryPart::Match(m) = part {
            for pattern in &m.patterns {
                let (label, is_edge, constraints) = match pattern {
                    Pattern::Vertex(v) => (v.label.as_str(), false, &v.constraints),
                    Pattern::Edge(e) => (e.label.as_str(), true, &e.constraints),
                };
                if !label_known(schema, label, is_edge, &mut issues) {
                    continue;
                }
                for (prop, _) in constraints.iter() {
                    check_property(schema, label, prop, &mut issues);
                }
            }
        }
        for condition in part.conditions() {
            if let Some((label, prop, is_edge)) = &condition.subject {
                let known = if *is_edge {
                    schema.is_edge_label(label)
                } else {
                    schema.is_vertex_label(label)
                };
                if known {
                    check_property(schema, label, prop, &mut issues);
                }
            }
        }
    }
    issues
}

fn label_known(
    schema: &dyn SchemaProvider,
    label: &str,
    is_edge: bool,
    issues: &mut Vec<QueryIssue>,
) -> bool {
    let known = if is_edge {
        schema.is_edge_label(label)
    } else {
        schema.is_vertex_label(label)
    };
    if !known {
        let label = label.to_owned();
        issues.push(if is_edge {
            QueryIssue::UnknownEdgeLabel { label }
        } else {
            QueryIssue::UnknownLabel { label }
        });
    }
    known
}

fn check_property(schema: &dyn SchemaProvider, label: &str, prop: &str, issues: &mut Vec<QueryIssue>) {
    if schema.id_property(label) == Some(prop) {
        return;
    }
    let Some(defs) = schema.property_definitions(label) else {
        return;
    };
    // A label without declared properties accepts any.
    if defs.is_empty() || defs.iter().any(|def| def.name == prop) {
        return;
    }
    let issue = QueryIssue::UnknownProperty {
        label: label.to_owned(),
        prop: prop.to_owned(),
    };
    if !issues.contains(&issue) {
        issues.push(issue);
    }
}

/// Parameters bound by the parts plus `extra`, and the conflicts found while
/// merging them.
pub(crate) fn collect_params(
    parts: &[QueryPart],
    extra: &BTreeMap<String, Value>,
) -> (BTreeMap<String, Value>, Vec<QueryIssue>) {
    let mut params = extra.clone();
    let mut conflicts = BTreeSet::new();
    for part in parts {
        for (name, value) in part.params() {
            match params.get(&name) {
                Some(existing) if *existing != value => {
                    conflicts.insert(name);
                }
                Some(_) => {}
                None => {
                    params.insert(name, value);
                }
            }
        }
    }
    let issues = conflicts
        .into_iter()
        .map(|name| QueryIssue::ParameterConflict { name })
        .collect();
    (params, issues)
}

/// Parameters referenced by the text but never bound.
pub(crate) fn missing_params(
    parts: &[QueryPart],
    params: &BTreeMap<String, Value>,
) -> Vec<QueryIssue> {
    let mut missing = Vec::new();
    for part in parts {
        for name in part.referenced_params() {
            if !params.contains_key(&name) && !missing.contains(&name) {
                missing.push(name);
            }
        }
    }
    missing
        .into_iter()
        .map(|name| QueryIssue::MissingParameter { name })
        .collect()
}
