//! Renderable clause units.

use std::collections::BTreeMap;
use std::fmt;

use crate::ident::is_identifier;
use crate::query::pattern::Pattern;
use crate::query::render::{param_names, RenderContext};
use crate::staging::StagingKey;
use crate::value::Value;

/// Clause kind of a [`QueryPart`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartKind {
    /// `MATCH` / `OPTIONAL MATCH`
    Match,
    /// `WHERE`
    Where,
    /// `RETURN`
    Return,
    /// `ORDER BY`
    OrderBy,
    /// `LIMIT`
    Limit,
    /// `SKIP`
    Skip,
    /// `WITH`
    With,
    /// `UNWIND`
    Unwind,
}

impl PartKind {
    /// Cypher keyword for the clause.
    pub fn keyword(self) -> &'static str {
        match self {
            PartKind::Match => "MATCH",
            PartKind::Where => "WHERE",
            PartKind::Return => "RETURN",
            PartKind::OrderBy => "ORDER BY",
            PartKind::Limit => "LIMIT",
            PartKind::Skip => "SKIP",
            PartKind::With => "WITH",
            PartKind::Unwind => "UNWIND",
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Sort direction for `ORDER BY`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Order {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Order {
    fn keyword(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// What a projection item evaluates.
#[derive(Clone, Debug, PartialEq)]
pub enum ProjectionExpr {
    /// Raw Cypher expression; `$name` references are parameters.
    Expr(String),
    /// Value staged with `set_param` under the given key.
    StagedParam(StagingKey),
    /// Every staged value as one map.
    AllStagedParams,
}

/// Projection item of a RETURN or WITH.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    /// Projected expression.
    pub expr: ProjectionExpr,
    /// Optional `AS` alias.
    pub alias: Option<String>,
}

impl Projection {
    /// Projects a raw expression.
    pub fn expr(text: impl Into<String>) -> Self {
        Self {
            expr: ProjectionExpr::Expr(text.into()),
            alias: None,
        }
    }

    /// Sets the `AS` alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub(crate) fn raw_text(&self) -> Option<&str> {
        match &self.expr {
            ProjectionExpr::Expr(text) => Some(text),
            _ => None,
        }
    }

    fn render(&self, ctx: &RenderContext<'_>) -> String {
        let expr = match &self.expr {
            ProjectionExpr::Expr(text) => ctx.rewrite(text),
            ProjectionExpr::StagedParam(key) => ctx.staging.retrieval_call(key),
            ProjectionExpr::AllStagedParams => ctx.staging.all_retrieval_call(),
        };
        match &self.alias {
            Some(alias) => format!("{expr} AS {alias}"),
            None => expr,
        }
    }

    /// Result column name: the alias, a trailing `AS name`, or a bare
    /// identifier expression.
    pub(crate) fn column_name(&self) -> Option<String> {
        if let Some(alias) = &self.alias {
            return Some(alias.clone());
        }
        let text = self.raw_text()?.trim();
        if is_identifier(text) {
            return Some(text.to_owned());
        }
        let upper = text.to_ascii_uppercase();
        let at = upper.rfind(" AS ")?;
        let tail = text[at + 4..].trim();
        is_identifier(tail).then(|| tail.to_owned())
    }
}

impl From<&str> for Projection {
    fn from(value: &str) -> Self {
        Projection::expr(value)
    }
}

impl From<String> for Projection {
    fn from(value: String) -> Self {
        Projection::expr(value)
    }
}

impl From<(&str, &str)> for Projection {
    fn from((expr, alias): (&str, &str)) -> Self {
        Projection::expr(expr).alias(alias)
    }
}

/// Filter condition with the parameter values it binds.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub(crate) text: String,
    pub(crate) params: BTreeMap<String, Value>,
    /// `(label, property, is_edge)` the condition filters on, when known.
    pub(crate) subject: Option<(String, String, bool)>,
}

impl Condition {
    pub(crate) fn raw(text: impl Into<String>, params: BTreeMap<String, Value>) -> Self {
        Self {
            text: text.into(),
            params,
            subject: None,
        }
    }

    /// Condition text with `$name` references.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// `[OPTIONAL] MATCH pattern, ...`
#[derive(Clone, Debug, PartialEq)]
pub struct MatchPart {
    /// Patterns matched together.
    pub patterns: Vec<Pattern>,
    /// Renders as `OPTIONAL MATCH`.
    pub optional: bool,
    /// Predicates added through the scoped clause, rendered as WHERE.
    pub(crate) predicates: Vec<Condition>,
}

/// `WHERE condition`
#[derive(Clone, Debug, PartialEq)]
pub struct WherePart {
    pub(crate) condition: Condition,
}

/// `RETURN [DISTINCT] items`
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnPart {
    /// Projected items.
    pub items: Vec<Projection>,
    /// Renders `DISTINCT`.
    pub distinct: bool,
    /// Grouping keys appended after the items.
    pub group_by: Vec<String>,
}

impl ReturnPart {
    /// Appends grouping keys not already projected.
    pub(crate) fn push_group_by(&mut self, field: String) {
        let projected = self
            .items
            .iter()
            .any(|item| item.alias.is_none() && item.raw_text() == Some(field.as_str()));
        if !projected && !self.group_by.contains(&field) {
            self.group_by.push(field);
        }
    }

    /// Items followed by grouping keys, as rendered.
    pub(crate) fn projected(&self) -> Vec<Projection> {
        self.items
            .iter()
            .cloned()
            .chain(self.group_by.iter().map(|g| Projection::expr(g.clone())))
            .collect()
    }
}

/// `ORDER BY expr [ASC|DESC], ...`
#[derive(Clone, Debug, PartialEq)]
pub struct OrderByPart {
    /// Sort keys in priority order.
    pub items: Vec<(String, Order)>,
}

impl OrderByPart {
    pub(crate) fn push(&mut self, expr: String, order: Order) {
        self.items.push((expr, order));
    }
}

/// `WITH [DISTINCT] items`
#[derive(Clone, Debug, PartialEq)]
pub struct WithPart {
    /// Projected items.
    pub items: Vec<Projection>,
    /// Renders `DISTINCT`.
    pub distinct: bool,
}

/// Source of an `UNWIND`.
#[derive(Clone, Debug, PartialEq)]
pub enum UnwindSource {
    /// Raw list expression.
    Expr(String),
    /// List bound as a parameter.
    Param {
        /// Parameter name.
        name: String,
        /// Bound list.
        value: Value,
    },
    /// Array staged with `set_param`.
    Staged(StagingKey),
}

/// `UNWIND source AS alias`
#[derive(Clone, Debug, PartialEq)]
pub struct UnwindPart {
    /// List to iterate.
    pub source: UnwindSource,
    /// Row variable.
    pub alias: String,
}

/// One clause of a query.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryPart {
    /// MATCH.
    Match(MatchPart),
    /// WHERE.
    Where(WherePart),
    /// RETURN.
    Return(ReturnPart),
    /// ORDER BY.
    OrderBy(OrderByPart),
    /// LIMIT.
    Limit(u64),
    /// SKIP.
    Skip(u64),
    /// WITH.
    With(WithPart),
    /// UNWIND.
    Unwind(UnwindPart),
}

impl QueryPart {
    /// Clause kind.
    pub fn kind(&self) -> PartKind {
        match self {
            QueryPart::Match(_) => PartKind::Match,
            QueryPart::Where(_) => PartKind::Where,
            QueryPart::Return(_) => PartKind::Return,
            QueryPart::OrderBy(_) => PartKind::OrderBy,
            QueryPart::Limit(_) => PartKind::Limit,
            QueryPart::Skip(_) => PartKind::Skip,
            QueryPart::With(_) => PartKind::With,
            QueryPart::Unwind(_) => PartKind::Unwind,
        }
    }

    /// Renders the clause. WHERE conditions (including match predicates)
    /// are rendered by the builder, which merges adjacent ones.
    pub(crate) fn render(&self, ctx: &RenderContext<'_>) -> String {
        match self {
            QueryPart::Match(m) => {
                let patterns = m
                    .patterns
                    .iter()
                    .map(|p| p.render(ctx))
                    .collect::<Vec<_>>()
                    .join(", ");
                if m.optional {
                    format!("OPTIONAL MATCH {patterns}")
                } else {
                    format!("MATCH {patterns}")
                }
            }
            QueryPart::Where(w) => format!("WHERE {}", ctx.rewrite(&w.condition.text)),
            QueryPart::Return(r) => format!(
                "RETURN {}{}",
                if r.distinct { "DISTINCT " } else { "" },
                render_items(&r.projected(), ctx)
            ),
            QueryPart::OrderBy(o) => format!(
                "ORDER BY {}",
                o.items
                    .iter()
                    .map(|(expr, order)| format!("{} {}", ctx.rewrite(expr), order.keyword()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            QueryPart::Limit(n) => format!("LIMIT {n}"),
            QueryPart::Skip(n) => format!("SKIP {n}"),
            QueryPart::With(w) => format!(
                "WITH {}{}",
                if w.distinct { "DISTINCT " } else { "" },
                render_items(&w.items, ctx)
            ),
            QueryPart::Unwind(u) => {
                let source = match &u.source {
                    UnwindSource::Expr(expr) => ctx.rewrite(expr),
                    UnwindSource::Param { name, .. } => ctx.param(name),
                    UnwindSource::Staged(key) => ctx.staging.array_retrieval_call(key),
                };
                format!("UNWIND {source} AS {}", u.alias)
            }
        }
    }

    /// Filter conditions carried by the part.
    pub(crate) fn conditions(&self) -> &[Condition] {
        match self {
            QueryPart::Match(m) => &m.predicates,
            QueryPart::Where(w) => std::slice::from_ref(&w.condition),
            _ => &[],
        }
    }

    /// Parameter values bound by the part, in a stable order.
    pub(crate) fn params(&self) -> Vec<(String, Value)> {
        let mut out = BTreeMap::new();
        if let QueryPart::Match(m) = self {
            for pattern in &m.patterns {
                pattern.params(&mut out);
            }
        }
        if let QueryPart::Unwind(UnwindPart {
            source: UnwindSource::Param { name, value },
            ..
        }) = self
        {
            out.insert(name.clone(), value.clone());
        }
        let mut params: Vec<_> = out.into_iter().collect();
        for condition in self.conditions() {
            params.extend(condition.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        params
    }

    /// Parameter names referenced from the rendered text.
    pub(crate) fn referenced_params(&self) -> Vec<String> {
        let mut names = Vec::new();
        for condition in self.conditions() {
            names.extend(param_names(&condition.text));
        }
        match self {
            QueryPart::Match(_) => {
                names.extend(self.params().into_iter().map(|(name, _)| name));
            }
            QueryPart::Return(r) => {
                for item in r.projected() {
                    names.extend(item.raw_text().map(param_names).unwrap_or_default());
                }
            }
            QueryPart::With(w) => {
                for item in &w.items {
                    names.extend(item.raw_text().map(param_names).unwrap_or_default());
                }
            }
            QueryPart::OrderBy(o) => {
                for (expr, _) in &o.items {
                    names.extend(param_names(expr));
                }
            }
            QueryPart::Unwind(u) => match &u.source {
                UnwindSource::Expr(expr) => names.extend(param_names(expr)),
                UnwindSource::Param { name, .. } => names.push(name.clone()),
                UnwindSource::Staged(_) => {}
            },
            QueryPart::Where(_) | QueryPart::Limit(_) | QueryPart::Skip(_) => {}
        }
        names
    }
}

fn render_items(items: &[Projection], ctx: &RenderContext<'_>) -> String {
    items
        .iter()
        .map(|item| item.render(ctx))
        .collect::<Vec<_>>()
        .join(", ")
}
