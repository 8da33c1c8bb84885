//! Vertex and edge patterns.

use std::collections::BTreeMap;

use crate::query::render::RenderContext;
use crate::value::Value;

/// Traversal direction of an edge pattern, relative to its source alias.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `(source)-[..]->(target)`
    #[default]
    Outgoing,
    /// `(source)<-[..]-(target)`
    Incoming,
    /// `(source)-[..]-(target)`
    Undirected,
}

/// Ordered property constraints. Setting the same property twice replaces
/// the earlier value but keeps its position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Constraints(Vec<Constraint>);

#[derive(Clone, Debug, PartialEq)]
struct Constraint {
    prop: String,
    value: Value,
    // Assigned by the builder when the clause is committed.
    param: String,
}

impl Constraints {
    pub(crate) fn set(&mut self, prop: String, value: Value) {
        match self.0.iter_mut().find(|c| c.prop == prop) {
            Some(slot) => slot.value = value,
            None => self.0.push(Constraint {
                prop,
                value,
                param: String::new(),
            }),
        }
    }

    /// Names the parameter of each constraint, in insertion order.
    pub(crate) fn name_params(&mut self, mut allocate: impl FnMut(&str) -> String) {
        for constraint in &mut self.0 {
            constraint.param = allocate(&constraint.prop);
        }
    }

    /// Constraints in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|c| (c.prop.as_str(), &c.value))
    }

    /// Returns true when no constraint is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn render(&self, ctx: &RenderContext<'_>) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let body = self
            .0
            .iter()
            .map(|c| format!("{}: {}", c.prop, ctx.param(&c.param)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(" {{{body}}}")
    }

    fn params(&self, out: &mut BTreeMap<String, Value>) {
        for c in &self.0 {
            out.insert(c.param.clone(), c.value.clone());
        }
    }
}

/// `(alias:Label {prop: $param})`
#[derive(Clone, Debug, PartialEq)]
pub struct VertexPattern {
    /// Vertex label.
    pub label: String,
    /// Variable bound by the pattern.
    pub alias: String,
    /// Equality constraints rendered inline.
    pub constraints: Constraints,
}

impl VertexPattern {
    pub(crate) fn new(label: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            alias: alias.into(),
            constraints: Constraints::default(),
        }
    }

    pub(crate) fn render(&self, ctx: &RenderContext<'_>) -> String {
        format!(
            "({}:{}{})",
            self.alias,
            self.label,
            self.constraints.render(ctx)
        )
    }
}

/// `(source)-[alias:Label {..}]->(target)`
#[derive(Clone, Debug, PartialEq)]
pub struct EdgePattern {
    /// Edge label.
    pub label: String,
    /// Variable bound to the edge.
    pub alias: String,
    /// Alias of an already-matched vertex.
    pub source: String,
    /// Alias of an already-matched vertex.
    pub target: String,
    /// Direction relative to `source`.
    pub direction: Direction,
    /// Equality constraints rendered inline.
    pub constraints: Constraints,
}

impl EdgePattern {
    pub(crate) fn render(&self, ctx: &RenderContext<'_>) -> String {
        let body = format!(
            "[{}:{}{}]",
            self.alias,
            self.label,
            self.constraints.render(ctx)
        );
        let (left, right) = match self.direction {
            Direction::Outgoing => ("-", "->"),
            Direction::Incoming => ("<-", "-"),
            Direction::Undirected => ("-", "-"),
        };
        format!("({}){left}{body}{right}({})", self.source, self.target)
    }
}

/// Pattern inside a MATCH part.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    /// Vertex pattern.
    Vertex(VertexPattern),
    /// Edge pattern between two bound vertices.
    Edge(EdgePattern),
}

impl Pattern {
    /// Alias bound by the pattern.
    pub fn alias(&self) -> &str {
        match self {
            Pattern::Vertex(v) => &v.alias,
            Pattern::Edge(e) => &e.alias,
        }
    }

    pub(crate) fn render(&self, ctx: &RenderContext<'_>) -> String {
        match self {
            Pattern::Vertex(v) => v.render(ctx),
            Pattern::Edge(e) => e.render(ctx),
        }
    }

    pub(crate) fn params(&self, out: &mut BTreeMap<String, Value>) {
        match self {
            Pattern::Vertex(v) => v.constraints.params(out),
            Pattern::Edge(e) => e.constraints.params(out),
        }
    }
}
