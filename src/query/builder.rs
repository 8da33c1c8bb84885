//! Fluent query builder.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::error::{AgeError, FieldError, Result};
use crate::executor::{AutoCommit, Executor, Row};
use crate::ident::is_identifier;
use crate::query::clause::{EdgeMatch, ReturnClause, VertexMatch};
use crate::query::issues::QueryIssue;
use crate::query::part::{
    Condition, Order, OrderByPart, PartKind, Projection, ProjectionExpr, QueryPart, UnwindPart,
    UnwindSource, WherePart, WithPart,
};
use crate::query::pattern::{Constraints, Direction, EdgePattern, VertexPattern};
use crate::query::render::{param_names, wrap_sql, RenderContext};
use crate::query::validate;
use crate::schema::SchemaProvider;
use crate::staging::{Namespace, StagingKey, StagingStore};
use crate::value::Value;

/// What an alias is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AliasKind {
    Vertex,
    Edge,
    Projected,
}

/// Rendered query text plus the parameters it references.
#[derive(Clone, Debug, PartialEq)]
pub struct CypherQuery {
    /// Cypher text with `$name` parameter references.
    pub text: String,
    /// Parameter values by name.
    pub params: BTreeMap<String, Value>,
    /// Result column names, used when wrapping the text in SQL.
    pub columns: Vec<String>,
}

/// Fluent builder assembling a Cypher query from ordered parts.
///
/// Mutators never fail; problems are recorded and surfaced by
/// [`validate_query`](Self::validate_query), [`to_cypher`](Self::to_cypher)
/// and [`execute`](Self::execute).
///
/// ```ignore
/// let mut qb = QueryBuilder::new("social");
/// qb.r#match("Person", "p").prop("name", "Alice").done()
///     .r#return(["p"]).done();
/// let rows = qb.execute(&executor)?;
/// ```
pub struct QueryBuilder {
    graph: String,
    parts: Vec<QueryPart>,
    aliases: BTreeMap<String, AliasKind>,
    params: BTreeMap<String, Value>,
    // Every parameter name bound, referenced or generated so far.
    param_names: BTreeSet<String>,
    issues: Vec<QueryIssue>,
    next_edge_alias: usize,
    schema: Option<Arc<dyn SchemaProvider>>,
    staging: StagingStore,
}

impl QueryBuilder {
    /// Creates an empty builder targeting `graph`.
    pub fn new(graph: impl Into<String>) -> Self {
        let graph = graph.into();
        let mut builder = Self {
            graph,
            parts: Vec::new(),
            aliases: BTreeMap::new(),
            params: BTreeMap::new(),
            param_names: BTreeSet::new(),
            issues: Vec::new(),
            next_edge_alias: 0,
            schema: None,
            staging: StagingStore::default(),
        };
        builder.check_graph();
        builder
    }

    /// Validates labels and constrained properties against `schema`.
    pub fn with_schema(mut self, schema: Arc<dyn SchemaProvider>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Uses a non-default staging store.
    pub fn with_staging(mut self, staging: StagingStore) -> Self {
        self.staging = staging;
        self
    }

    /// Target graph name.
    pub fn graph(&self) -> &str {
        &self.graph
    }

    /// Parts in insertion order.
    pub fn parts(&self) -> &[QueryPart] {
        &self.parts
    }

    /// Starts a vertex pattern `(alias:label)`.
    pub fn r#match(&mut self, label: &str, alias: &str) -> VertexMatch<'_> {
        self.check_identifier("label", label);
        self.bind_alias(alias, AliasKind::Vertex);
        VertexMatch::new(self, VertexPattern::new(label, alias))
    }

    /// Starts an edge pattern between two vertex aliases bound earlier.
    pub fn match_edge(&mut self, source: &str, label: &str, target: &str) -> EdgeMatch<'_> {
        self.check_identifier("label", label);
        for (alias, context) in [(source, "edge source"), (target, "edge target")] {
            if self.aliases.get(alias) != Some(&AliasKind::Vertex) {
                self.record(QueryIssue::UnboundAlias {
                    alias: alias.to_owned(),
                    context,
                });
            }
        }
        let pattern = EdgePattern {
            label: label.to_owned(),
            alias: String::new(),
            source: source.to_owned(),
            target: target.to_owned(),
            direction: Direction::Outgoing,
            constraints: Constraints::default(),
        };
        EdgeMatch::new(self, pattern)
    }

    /// Appends a raw WHERE condition. `$name` references must be bound with
    /// [`bind`](Self::bind) or [`where_param`](Self::where_param).
    pub fn r#where(&mut self, condition: impl Into<String>) -> &mut Self {
        self.where_param(condition, std::iter::empty::<(String, Value)>())
    }

    /// Appends a WHERE condition together with the parameters it uses.
    pub fn where_param<I, K, V>(&mut self, condition: impl Into<String>, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let condition = condition.into();
        self.check_raw(&condition);
        let mut bound = BTreeMap::new();
        for (name, value) in params {
            let name = name.into();
            if self.check_identifier("parameter", &name) {
                self.param_names.insert(name.clone());
                bound.insert(name, value.into());
            }
        }
        self.push_part(QueryPart::Where(WherePart {
            condition: Condition::raw(condition, bound),
        }));
        self
    }

    /// Binds a parameter referenced from raw clause text.
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        if self.check_identifier("parameter", name) {
            self.param_names.insert(name.to_owned());
            self.params.insert(name.to_owned(), value.into());
        }
        self
    }

    /// Starts a RETURN projection.
    pub fn r#return<I, P>(&mut self, items: I) -> ReturnClause<'_>
    where
        I: IntoIterator<Item = P>,
        P: Into<Projection>,
    {
        let items = self.projections(items);
        ReturnClause::new(self, items)
    }

    /// Adds grouping keys to the last RETURN.
    pub fn group_by<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if !fields.iter().all(|f| self.check_raw(f)) {
            return self;
        }
        let last_return = self.parts.iter_mut().rev().find_map(|part| match part {
            QueryPart::Return(r) => Some(r),
            _ => None,
        });
        if let Some(part) = last_return {
            fields.into_iter().for_each(|f| part.push_group_by(f));
        } else {
            self.record(QueryIssue::NothingToGroup);
        }
        self
    }

    /// Adds a sort key. Consecutive calls extend the same ORDER BY.
    pub fn order_by(&mut self, expr: impl Into<String>, order: Order) -> &mut Self {
        let expr = expr.into();
        self.check_raw(&expr);
        match self.parts.last_mut() {
            Some(QueryPart::OrderBy(part)) => part.push(expr, order),
            _ => self.push_part(QueryPart::OrderBy(OrderByPart {
                items: vec![(expr, order)],
            })),
        }
        self
    }

    /// Appends `LIMIT n`.
    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.push_part(QueryPart::Limit(n));
        self
    }

    /// Appends `SKIP n`.
    pub fn skip(&mut self, n: u64) -> &mut Self {
        self.push_part(QueryPart::Skip(n));
        self
    }

    /// Appends `WITH items`.
    pub fn with<I, P>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Projection>,
    {
        self.push_with(items, false)
    }

    /// Appends `WITH DISTINCT items`.
    pub fn with_distinct<I, P>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Projection>,
    {
        self.push_with(items, true)
    }

    /// Appends `UNWIND expr AS alias`.
    pub fn unwind(&mut self, expr: impl Into<String>, alias: &str) -> &mut Self {
        let expr = expr.into();
        self.check_raw(&expr);
        self.push_unwind(UnwindSource::Expr(expr), alias)
    }

    /// Appends `UNWIND $name AS alias`, binding `list` to `name`.
    pub fn unwind_param(&mut self, name: &str, list: impl Into<Value>, alias: &str) -> &mut Self {
        if self.check_identifier("parameter", name) {
            self.param_names.insert(name.to_owned());
        }
        let source = UnwindSource::Param {
            name: name.to_owned(),
            value: list.into(),
        };
        self.push_unwind(source, alias)
    }

    /// Appends `UNWIND age_params.get_array('key') AS alias`, iterating an
    /// array staged with [`set_param`](Self::set_param).
    pub fn unwind_age_param(&mut self, key: &str, alias: &str) -> &mut Self {
        match self.staging_key(key) {
            Some(key) => self.push_unwind(UnwindSource::Staged(key), alias),
            None => self,
        }
    }

    /// Appends `WITH age_params.get('key') AS alias`.
    pub fn with_age_param(&mut self, key: &str, alias: &str) -> &mut Self {
        let Some(key) = self.staging_key(key) else {
            return self;
        };
        self.push_staged_with(ProjectionExpr::StagedParam(key), alias)
    }

    /// Appends `WITH age_params.get_all() AS alias`.
    pub fn with_all_age_params(&mut self, alias: &str) -> &mut Self {
        self.push_staged_with(ProjectionExpr::AllStagedParams, alias)
    }

    /// Upserts `value` under `key` in the staging store. Returns once the
    /// write is committed, so a query reading `key` can follow.
    pub fn set_param(&self, executor: &dyn Executor, key: &str, value: &JsonValue) -> Result<()> {
        let key = StagingKey::new(key)?;
        self.staging
            .upsert(&mut AutoCommit::new(executor), &key, value)
    }

    /// Reads a value staged with [`set_param`](Self::set_param).
    pub fn get_param(&self, executor: &dyn Executor, key: &str) -> Result<Option<JsonValue>> {
        let key = StagingKey::new(key)?;
        self.staging.get(&mut AutoCommit::new(executor), &key)
    }

    /// Every problem with the query as assembled. Never fails.
    pub fn validate_query(&self) -> Vec<QueryIssue> {
        let mut issues = self.blocking_issues();
        let (params, _) = validate::collect_params(&self.parts, &self.params);
        issues.extend(validate::missing_params(&self.parts, &params));
        if let Some(schema) = &self.schema {
            issues.extend(validate::schema_issues(&self.parts, schema.as_ref()));
        }
        if self.parts.is_empty() {
            issues.push(QueryIssue::EmptyQuery);
        } else if !self
            .parts
            .iter()
            .any(|part| part.kind() == PartKind::Return)
        {
            issues.push(QueryIssue::MissingReturn);
        }
        issues
    }

    /// Renders the query with `$name` parameter references.
    ///
    /// Fails without rendering when construction or ordering problems were
    /// recorded.
    pub fn to_cypher(&self) -> Result<CypherQuery> {
        let issues = self.blocking_issues();
        if !issues.is_empty() {
            return Err(issues_error(&issues));
        }
        let (params, _) = validate::collect_params(&self.parts, &self.params);
        let ctx = RenderContext::placeholder(&self.staging);
        Ok(CypherQuery {
            text: self.render(&ctx),
            params,
            columns: self.columns(),
        })
    }

    /// Renders the SQL statement AGE executes, with `$name` references left
    /// in place.
    pub fn to_sql(&self) -> Result<String> {
        let query = self.to_cypher()?;
        Ok(wrap_sql(&self.graph, &query.text, &query.columns))
    }

    /// Validates, stages parameters and runs the query.
    ///
    /// Parameters are staged under a call-local namespace inside the same
    /// transaction as the query and deleted before commit; a failure rolls
    /// the staged rows back with everything else. A transient failure while
    /// staging repeats the transaction; the query itself is sent once.
    pub fn execute(&self, executor: &dyn Executor) -> Result<Vec<Row>> {
        let issues = self.validate_query();
        if !issues.is_empty() {
            return Err(issues_error(&issues));
        }
        let (params, _) = validate::collect_params(&self.parts, &self.params);
        let columns = self.columns();

        if params.is_empty() {
            let ctx = RenderContext::placeholder(&self.staging);
            let sql = wrap_sql(&self.graph, &self.render(&ctx), &columns);
            debug!(graph = %self.graph, parts = self.parts.len(), "query.execute");
            return executor.execute(&sql, &[]);
        }

        let namespace = Namespace::generate();
        let ctx = RenderContext::staged(&self.staging, &namespace);
        let sql = wrap_sql(&self.graph, &self.render(&ctx), &columns);
        let encoded = params
            .iter()
            .map(|(name, value)| Ok((namespace.key(name)?, value.to_json()?)))
            .collect::<Result<Vec<_>>>()?;

        let rows = self.staging.with_staged(
            executor,
            |tx| {
                for (key, value) in &encoded {
                    self.staging.upsert(tx, key, value)?;
                }
                Ok(())
            },
            |tx| {
                let rows = tx.execute(&sql, &[])?;
                self.staging.delete_prefix(tx, &namespace.prefix())?;
                Ok(rows)
            },
        )?;
        info!(
            graph = %self.graph,
            namespace = %namespace,
            params = encoded.len(),
            rows = rows.len(),
            "query.execute"
        );
        Ok(rows)
    }

    /// Discards parts, aliases, bound parameters and recorded problems.
    /// Values in the staging store are not owned by the builder and remain.
    pub fn reset(&mut self) -> &mut Self {
        self.parts.clear();
        self.aliases.clear();
        self.params.clear();
        self.param_names.clear();
        self.issues.clear();
        self.next_edge_alias = 0;
        self.check_graph();
        self
    }

    fn blocking_issues(&self) -> Vec<QueryIssue> {
        let mut issues = self.issues.clone();
        issues.extend(validate::ordering_issues(&self.parts));
        let (_, conflicts) = validate::collect_params(&self.parts, &self.params);
        issues.extend(conflicts);
        issues
    }

    fn render(&self, ctx: &RenderContext<'_>) -> String {
        let mut clauses = Vec::with_capacity(self.parts.len());
        let mut pending: Vec<String> = Vec::new();
        for part in &self.parts {
            if let QueryPart::Where(w) = part {
                pending.push(ctx.rewrite(&w.condition.text));
                continue;
            }
            flush_conditions(&mut clauses, &mut pending);
            clauses.push(part.render(ctx));
            pending.extend(part.conditions().iter().map(|c| ctx.rewrite(&c.text)));
        }
        flush_conditions(&mut clauses, &mut pending);
        clauses.join(" ")
    }

    fn columns(&self) -> Vec<String> {
        let last_return = self.parts.iter().rev().find_map(|part| match part {
            QueryPart::Return(r) => Some(r),
            _ => None,
        });
        match last_return {
            Some(part) => part
                .projected()
                .into_iter()
                .enumerate()
                .map(|(i, item)| item.column_name().unwrap_or_else(|| format!("col{i}")))
                .collect(),
            None => vec!["result".to_owned()],
        }
    }

    fn projections<I, P>(&mut self, items: I) -> Vec<Projection>
    where
        I: IntoIterator<Item = P>,
        P: Into<Projection>,
    {
        let items: Vec<Projection> = items.into_iter().map(Into::into).collect();
        for item in &items {
            self.check_projection(item);
        }
        items
    }

    fn push_with<I, P>(&mut self, items: I, distinct: bool) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Projection>,
    {
        let items = self.projections(items);
        if items.is_empty() {
            self.record(QueryIssue::EmptyProjection {
                part: PartKind::With,
            });
        }
        self.push_part(QueryPart::With(WithPart { items, distinct }));
        self
    }

    fn push_staged_with(&mut self, expr: ProjectionExpr, alias: &str) -> &mut Self {
        self.bind_alias(alias, AliasKind::Projected);
        let item = Projection {
            expr,
            alias: Some(alias.to_owned()),
        };
        self.push_part(QueryPart::With(WithPart {
            items: vec![item],
            distinct: false,
        }));
        self
    }

    fn push_unwind(&mut self, source: UnwindSource, alias: &str) -> &mut Self {
        self.bind_alias(alias, AliasKind::Projected);
        self.push_part(QueryPart::Unwind(UnwindPart {
            source,
            alias: alias.to_owned(),
        }));
        self
    }

    fn staging_key(&mut self, key: &str) -> Option<StagingKey> {
        match StagingKey::new(key) {
            Ok(key) => Some(key),
            Err(err) => {
                self.record(QueryIssue::InvalidStagingKey {
                    key: key.to_owned(),
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    fn check_graph(&mut self) {
        let graph = self.graph.clone();
        self.check_identifier("graph", &graph);
    }

    pub(crate) fn push_part(&mut self, part: QueryPart) {
        self.parts.push(part);
    }

    pub(crate) fn record(&mut self, issue: QueryIssue) {
        self.issues.push(issue);
    }

    pub(crate) fn check_identifier(&mut self, kind: &'static str, value: &str) -> bool {
        let ok = is_identifier(value);
        if !ok {
            self.record(QueryIssue::InvalidIdentifier {
                kind,
                value: value.to_owned(),
            });
        }
        ok
    }

    /// Raw text is embedded between `$$` delimiters and must not close them.
    pub(crate) fn check_raw(&mut self, text: &str) -> bool {
        let ok = !text.contains("$$");
        if !ok {
            self.record(QueryIssue::DollarQuote);
        }
        self.param_names.extend(param_names(text));
        ok
    }

    pub(crate) fn check_projection(&mut self, item: &Projection) {
        if let Some(text) = item.raw_text() {
            self.check_raw(text);
        }
        if let Some(alias) = &item.alias {
            self.check_identifier("alias", alias);
        }
    }

    pub(crate) fn bind_alias(&mut self, alias: &str, kind: AliasKind) {
        if !self.check_identifier("alias", alias) {
            return;
        }
        if self.aliases.contains_key(alias) {
            self.record(QueryIssue::DuplicateAlias {
                alias: alias.to_owned(),
            });
        } else {
            self.aliases.insert(alias.to_owned(), kind);
        }
    }

    /// Claims a parameter name for a clause constraint: `base`, or `base_N`
    /// when `base` is already in use.
    pub(crate) fn allocate_param(&mut self, base: String) -> String {
        let mut name = base.clone();
        let mut suffix = 1;
        while self.param_names.contains(&name) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        self.param_names.insert(name.clone());
        name
    }

    pub(crate) fn next_edge_alias(&mut self) -> String {
        loop {
            let alias = format!("e{}", self.next_edge_alias);
            self.next_edge_alias += 1;
            if !self.aliases.contains_key(&alias) {
                return alias;
            }
        }
    }
}

fn flush_conditions(clauses: &mut Vec<String>, pending: &mut Vec<String>) {
    match pending.len() {
        0 => {}
        1 => clauses.push(format!("WHERE {}", pending[0])),
        _ => clauses.push(format!(
            "WHERE {}",
            pending
                .iter()
                .map(|c| format!("({c})"))
                .collect::<Vec<_>>()
                .join(" AND ")
        )),
    }
    pending.clear();
}

fn issues_error(issues: &[QueryIssue]) -> AgeError {
    AgeError::validation("query", issues.iter().map(FieldError::from).collect())
}
