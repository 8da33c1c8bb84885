//! Scoped clauses returned by [`QueryBuilder`] methods.
//!
//! A clause holds the builder mutably until its terminal [`done`] call, which
//! commits the clause as a part and hands the builder back. Problems found
//! along the way are recorded on the builder, never panicked on.
//!
//! [`done`]: VertexMatch::done

use std::collections::BTreeMap;

use crate::query::builder::{AliasKind, QueryBuilder};
use crate::query::issues::QueryIssue;
use crate::query::part::{Condition, MatchPart, PartKind, Projection, QueryPart, ReturnPart};
use crate::query::pattern::{Constraints, Direction, EdgePattern, Pattern, VertexPattern};
use crate::value::Value;

/// Comparison operator for scoped predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `STARTS WITH`
    StartsWith,
    /// `ENDS WITH`
    EndsWith,
    /// `CONTAINS`
    Contains,
    /// `IN`
    In,
}

impl CompareOp {
    /// Cypher operator text.
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::StartsWith => "STARTS WITH",
            CompareOp::EndsWith => "ENDS WITH",
            CompareOp::Contains => "CONTAINS",
            CompareOp::In => "IN",
        }
    }
}

enum Test {
    Compare(CompareOp, Value),
    Null { negate: bool },
}

struct Predicate {
    prop: String,
    test: Test,
}

/// Predicates of a match clause. Their text is built on `done`, once the
/// alias and parameter names are final.
#[derive(Default)]
struct Predicates {
    items: Vec<Predicate>,
}

impl Predicates {
    fn compare(
        &mut self,
        builder: &mut QueryBuilder,
        owner: &str,
        prop: &str,
        op: CompareOp,
        value: Value,
    ) {
        if !builder.check_identifier("property", prop) {
            return;
        }
        if let Some(reason) = value.constraint_violation() {
            builder.record(QueryIssue::InvalidConstraint {
                alias: owner.to_owned(),
                prop: prop.to_owned(),
                reason,
            });
            return;
        }
        self.items.push(Predicate {
            prop: prop.to_owned(),
            test: Test::Compare(op, value),
        });
    }

    fn null_check(&mut self, builder: &mut QueryBuilder, prop: &str, negate: bool) {
        if !builder.check_identifier("property", prop) {
            return;
        }
        self.items.push(Predicate {
            prop: prop.to_owned(),
            test: Test::Null { negate },
        });
    }

    fn into_conditions(
        self,
        builder: &mut QueryBuilder,
        (label, alias, is_edge): (&str, &str, bool),
    ) -> Vec<Condition> {
        self.items
            .into_iter()
            .enumerate()
            .map(|(i, Predicate { prop, test })| {
                let subject = Some((label.to_owned(), prop.clone(), is_edge));
                match test {
                    Test::Compare(op, value) => {
                        let name = builder.allocate_param(format!("{alias}_w{i}_{prop}"));
                        Condition {
                            text: format!("{alias}.{prop} {} ${name}", op.symbol()),
                            params: BTreeMap::from([(name, value)]),
                            subject,
                        }
                    }
                    Test::Null { negate } => {
                        let test = if negate { "IS NOT NULL" } else { "IS NULL" };
                        Condition {
                            text: format!("{alias}.{prop} {test}"),
                            params: BTreeMap::new(),
                            subject,
                        }
                    }
                }
            })
            .collect()
    }
}

fn set_constraint(
    builder: &mut QueryBuilder,
    constraints: &mut Constraints,
    alias: &str,
    prop: &str,
    value: Value,
) {
    if !builder.check_identifier("property", prop) {
        return;
    }
    match value.constraint_violation() {
        Some(reason) => builder.record(QueryIssue::InvalidConstraint {
            alias: alias.to_owned(),
            prop: prop.to_owned(),
            reason,
        }),
        None => constraints.set(prop.to_owned(), value),
    }
}

/// Vertex-scoped clause returned by [`QueryBuilder::r#match`].
#[must_use = "call done() to add the MATCH to the query"]
pub struct VertexMatch<'b> {
    builder: &'b mut QueryBuilder,
    pattern: VertexPattern,
    optional: bool,
    predicates: Predicates,
}

impl<'b> VertexMatch<'b> {
    pub(crate) fn new(builder: &'b mut QueryBuilder, pattern: VertexPattern) -> Self {
        Self {
            builder,
            pattern,
            optional: false,
            predicates: Predicates::default(),
        }
    }

    /// Alias bound by this pattern.
    pub fn alias(&self) -> &str {
        &self.pattern.alias
    }

    /// Adds an inline equality constraint `{prop: value}`. Null and
    /// non-finite values are rejected.
    pub fn prop(mut self, prop: &str, value: impl Into<Value>) -> Self {
        let alias = self.pattern.alias.clone();
        set_constraint(
            self.builder,
            &mut self.pattern.constraints,
            &alias,
            prop,
            value.into(),
        );
        self
    }

    /// Adds several inline constraints.
    pub fn props<I, K, V>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (prop, value) in props {
            self = self.prop(prop.as_ref(), value);
        }
        self
    }

    /// Renders as `OPTIONAL MATCH`.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Adds `alias.prop <op> $param`.
    pub fn where_cmp(mut self, prop: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        self.predicates
            .compare(self.builder, &self.pattern.alias, prop, op, value.into());
        self
    }

    /// Adds `alias.prop = $param`.
    pub fn where_eq(self, prop: &str, value: impl Into<Value>) -> Self {
        self.where_cmp(prop, CompareOp::Eq, value)
    }

    /// Adds `alias.prop IS NULL`.
    pub fn where_null(mut self, prop: &str) -> Self {
        self.predicates.null_check(self.builder, prop, false);
        self
    }

    /// Adds `alias.prop IS NOT NULL`.
    pub fn where_not_null(mut self, prop: &str) -> Self {
        self.predicates.null_check(self.builder, prop, true);
        self
    }

    /// Commits the MATCH and returns the builder.
    pub fn done(self) -> &'b mut QueryBuilder {
        let Self {
            builder,
            mut pattern,
            optional,
            predicates,
        } = self;
        let alias = pattern.alias.clone();
        pattern
            .constraints
            .name_params(|prop| builder.allocate_param(format!("{alias}_{prop}")));
        let subject = (pattern.label.as_str(), alias.as_str(), false);
        let predicates = predicates.into_conditions(builder, subject);
        builder.push_part(QueryPart::Match(MatchPart {
            patterns: vec![Pattern::Vertex(pattern)],
            optional,
            predicates,
        }));
        builder
    }
}

/// Edge-scoped clause returned by [`QueryBuilder::match_edge`].
#[must_use = "call done() to add the MATCH to the query"]
pub struct EdgeMatch<'b> {
    builder: &'b mut QueryBuilder,
    pattern: EdgePattern,
    optional: bool,
    predicates: Predicates,
}

impl<'b> EdgeMatch<'b> {
    pub(crate) fn new(builder: &'b mut QueryBuilder, pattern: EdgePattern) -> Self {
        Self {
            builder,
            pattern,
            optional: false,
            predicates: Predicates::default(),
        }
    }

    /// Binds the edge to `alias` instead of a generated one.
    pub fn alias(mut self, alias: &str) -> Self {
        if self.builder.check_identifier("alias", alias) {
            self.pattern.alias = alias.to_owned();
        }
        self
    }

    /// Sets the traversal direction relative to the source alias.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.pattern.direction = direction;
        self
    }

    /// Adds an inline equality constraint on the edge.
    pub fn prop(mut self, prop: &str, value: impl Into<Value>) -> Self {
        let owner = self.owner();
        set_constraint(
            self.builder,
            &mut self.pattern.constraints,
            &owner,
            prop,
            value.into(),
        );
        self
    }

    /// Adds `edge.prop <op> $param`.
    pub fn where_cmp(mut self, prop: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        let owner = self.owner();
        self.predicates
            .compare(self.builder, &owner, prop, op, value.into());
        self
    }

    /// Renders as `OPTIONAL MATCH`.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    // Names the edge in issues raised before its alias is final.
    fn owner(&self) -> String {
        if self.pattern.alias.is_empty() {
            self.pattern.label.clone()
        } else {
            self.pattern.alias.clone()
        }
    }

    /// Binds the edge alias, commits the MATCH and returns the builder.
    pub fn done(self) -> &'b mut QueryBuilder {
        let Self {
            builder,
            mut pattern,
            optional,
            predicates,
        } = self;
        if pattern.alias.is_empty() {
            pattern.alias = builder.next_edge_alias();
        }
        builder.bind_alias(&pattern.alias, AliasKind::Edge);
        let alias = pattern.alias.clone();
        pattern
            .constraints
            .name_params(|prop| builder.allocate_param(format!("{alias}_{prop}")));
        let subject = (pattern.label.as_str(), alias.as_str(), true);
        let predicates = predicates.into_conditions(builder, subject);
        builder.push_part(QueryPart::Match(MatchPart {
            patterns: vec![Pattern::Edge(pattern)],
            optional,
            predicates,
        }));
        builder
    }
}

/// RETURN-scoped clause returned by [`QueryBuilder::r#return`].
#[must_use = "call done() to add the RETURN to the query"]
pub struct ReturnClause<'b> {
    builder: &'b mut QueryBuilder,
    part: ReturnPart,
}

impl<'b> ReturnClause<'b> {
    pub(crate) fn new(builder: &'b mut QueryBuilder, items: Vec<Projection>) -> Self {
        Self {
            builder,
            part: ReturnPart {
                items,
                distinct: false,
                group_by: Vec::new(),
            },
        }
    }

    /// Renders `RETURN DISTINCT`.
    pub fn distinct(mut self) -> Self {
        self.part.distinct = true;
        self
    }

    /// Appends one more projected item.
    pub fn item(mut self, item: impl Into<Projection>) -> Self {
        let item = item.into();
        self.builder.check_projection(&item);
        self.part.items.push(item);
        self
    }

    /// Adds grouping keys; keys already projected are not repeated.
    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if self.builder.check_raw(&field) {
                self.part.push_group_by(field);
            }
        }
        self
    }

    /// Commits the RETURN and returns the builder.
    pub fn done(self) -> &'b mut QueryBuilder {
        if self.part.items.is_empty() && self.part.group_by.is_empty() {
            self.builder.record(QueryIssue::EmptyProjection {
                part: PartKind::Return,
            });
        }
        self.builder.push_part(QueryPart::Return(self.part));
        self.builder
    }
}
