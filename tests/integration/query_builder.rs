#![allow(missing_docs)]

mod support;

use std::sync::Arc;

use agebridge::query::{PartKind, QueryIssue};
use agebridge::{
    CompareOp, Direction, Executor, GraphSchema, Order, PropertyDefinition, PropertyType,
    QueryBuilder, Result, Value, VertexDefinition,
};
use serde_json::json;
use support::MemoryAge;

fn people_query() -> QueryBuilder {
    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person", "p")
        .prop("name", "Alice")
        .done()
        .r#return(["p"])
        .done();
    qb
}

#[test]
fn execute_stages_params_in_one_transaction() -> Result<()> {
    support::init_tracing();
    let age = MemoryAge::new();
    let rows = people_query().execute(&age)?;

    assert_eq!(rows.len(), 1);
    let cypher = rows[0]["cypher"].as_str().expect("echoed text");
    assert!(cypher.starts_with("MATCH (p:Person {name: age_params.get('batch_"));
    assert!(cypher.ends_with(":p_name')}) RETURN p"));
    let staged = rows[0]["staged"].as_object().expect("staged values");
    assert_eq!(staged.len(), 1);
    assert_eq!(staged.values().next(), Some(&json!("Alice")));

    assert_eq!(age.transactions(), (1, 1, 0));
    assert!(age.staged_keys().is_empty(), "staged rows are removed");
    let log = age.statements();
    assert!(log[0].starts_with("INSERT INTO age_params.params"));
    assert!(log[1].starts_with("SELECT * FROM ag_catalog.cypher('social', $$ MATCH"));
    assert!(log[2].starts_with("DELETE FROM age_params.params"));
    Ok(())
}

#[test]
fn execute_without_params_skips_staging() -> Result<()> {
    let age = MemoryAge::new();
    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person", "p").done().r#return(["p.name"]).done().limit(3);
    let rows = qb.execute(&age)?;

    assert_eq!(
        rows[0]["cypher"],
        json!("MATCH (p:Person) RETURN p.name LIMIT 3")
    );
    assert_eq!(age.transactions(), (0, 0, 0));
    assert_eq!(
        age.statements(),
        vec!["SELECT * FROM ag_catalog.cypher('social', $$ MATCH (p:Person) RETURN p.name LIMIT 3 $$) \
              AS (col0 ag_catalog.agtype)"
            .to_string()]
    );
    Ok(())
}

#[test]
fn failed_query_rolls_back_staged_params() {
    let age = MemoryAge::new();
    age.fail_on("ag_catalog.cypher", 0, 1);
    let err = people_query().execute(&age).expect_err("query fails");
    assert_eq!(err.code(), "QueryError");
    assert_eq!(age.transactions(), (1, 0, 1));
    assert!(age.staged_keys().is_empty());
}

#[test]
fn set_param_is_an_upsert_visible_to_queries() -> Result<()> {
    let age = MemoryAge::new();
    let mut qb = QueryBuilder::new("social");
    qb.set_param(&age, "people", &json!([{"name": "A"}]))?;
    qb.set_param(&age, "people", &json!([{"name": "B"}, {"name": "C"}]))?;
    assert_eq!(
        qb.get_param(&age, "people")?,
        Some(json!([{"name": "B"}, {"name": "C"}]))
    );
    assert_eq!(age.staged_keys(), vec!["people".to_string()]);

    qb.unwind_age_param("people", "person")
        .with_age_param("people", "all_people")
        .r#return(["person.name"])
        .done();
    let text = qb.to_cypher()?.text;
    assert_eq!(
        text,
        "UNWIND age_params.get_array('people') AS person \
         WITH age_params.get('people') AS all_people RETURN person.name"
    );
    let rows = qb.execute(&age)?;
    assert_eq!(
        rows[0]["staged"]["people"],
        json!([{"name": "B"}, {"name": "C"}])
    );
    assert!(qb.get_param(&age, "missing")?.is_none());
    Ok(())
}

#[test]
fn staged_params_outlive_the_query() -> Result<()> {
    let age = MemoryAge::new();
    let mut qb = QueryBuilder::new("social");
    qb.set_param(&age, "limits", &json!({"max": 10}))?;
    qb.with_all_age_params("params").r#return(["params"]).done();
    assert_eq!(
        qb.to_cypher()?.text,
        "WITH age_params.get_all() AS params RETURN params"
    );
    qb.execute(&age)?;
    assert_eq!(age.staged("limits"), Some(json!({"max": 10})));
    Ok(())
}

#[test]
fn where_conditions_merge_into_one_clause() -> Result<()> {
    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person", "p")
        .where_cmp("age", CompareOp::Ge, 18)
        .where_not_null("email")
        .done()
        .where_param("p.city = $city", [("city", "Oslo")])
        .r#return(["p"])
        .done();
    let query = qb.to_cypher()?;
    assert_eq!(
        query.text,
        "MATCH (p:Person) WHERE (p.age >= $p_w0_age) AND (p.email IS NOT NULL) \
         AND (p.city = $city) RETURN p"
    );
    assert_eq!(query.params.len(), 2);
    Ok(())
}

#[test]
fn edges_render_with_direction_and_constraints() -> Result<()> {
    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person", "a")
        .done()
        .r#match("Person", "b")
        .optional()
        .done()
        .match_edge("a", "KNOWS", "b")
        .alias("r")
        .direction(Direction::Incoming)
        .prop("since", 2020)
        .done()
        .r#return(["a", "r", "b"])
        .distinct()
        .done();
    let query = qb.to_cypher()?;
    assert_eq!(
        query.text,
        "MATCH (a:Person) OPTIONAL MATCH (b:Person) MATCH (a)<-[r:KNOWS {since: $r_since}]-(b) \
         RETURN DISTINCT a, r, b"
    );
    assert_eq!(query.columns, vec!["a", "r", "b"]);
    Ok(())
}

#[test]
fn group_by_extends_the_return() -> Result<()> {
    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person", "p")
        .done()
        .r#return(["p.city", "count(p) AS total"])
        .done()
        .group_by(["p.city", "p.country"])
        .order_by("total", Order::Desc)
        .skip(10)
        .limit(10);
    let query = qb.to_cypher()?;
    assert_eq!(
        query.text,
        "MATCH (p:Person) RETURN p.city, count(p) AS total, p.country \
         ORDER BY total DESC SKIP 10 LIMIT 10"
    );
    assert_eq!(query.columns, vec!["col0", "total", "col2"]);
    Ok(())
}

#[test]
fn clause_after_return_is_rejected() {
    let mut qb = people_query();
    qb.r#match("Company", "c").done();
    let issues = qb.validate_query();
    assert!(issues.contains(&QueryIssue::ClauseAfterReturn {
        part: PartKind::Match
    }));
    let err = qb.to_cypher().expect_err("ordering problem");
    assert_eq!(err.code(), "ValidationError");
}

#[test]
fn missing_parameters_block_execution_only() {
    let age = MemoryAge::new();
    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person", "p")
        .done()
        .r#where("p.age > $min_age")
        .r#return(["p"])
        .done();
    assert!(qb.to_cypher().is_ok());
    assert_eq!(
        qb.validate_query(),
        vec![QueryIssue::MissingParameter {
            name: "min_age".into()
        }]
    );
    assert!(qb.execute(&age).is_err());
    assert!(age.statements().is_empty(), "nothing sent");

    qb.bind("min_age", 21);
    assert!(qb.validate_query().is_empty());
    assert!(qb.execute(&age).is_ok());
}

#[test]
fn conflicting_bindings_are_reported() {
    let mut qb = QueryBuilder::new("social");
    qb.bind("x", 1)
        .r#match("Person", "p")
        .done()
        .where_param("p.rank = $x", [("x", 2)])
        .r#return(["p"])
        .done();
    assert!(qb
        .validate_query()
        .contains(&QueryIssue::ParameterConflict { name: "x".into() }));
    assert!(qb.to_cypher().is_err());
}

#[test]
fn unsafe_text_never_reaches_the_executor() {
    let age = MemoryAge::new();

    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person) DETACH DELETE (x", "p")
        .done()
        .r#return(["p"])
        .done();
    assert!(matches!(
        qb.validate_query().first(),
        Some(QueryIssue::InvalidIdentifier { kind: "label", .. })
    ));
    assert!(qb.execute(&age).is_err());

    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person", "p")
        .done()
        .r#where("p.name = '$$) AS (x agtype); DROP TABLE t; --'")
        .r#return(["p"])
        .done();
    assert!(qb.validate_query().contains(&QueryIssue::DollarQuote));
    assert!(qb.execute(&age).is_err());

    let qb = QueryBuilder::new("my graph");
    assert!(qb.to_sql().is_err());
    assert!(age.statements().is_empty());
}

#[test]
fn nan_constraint_is_rejected_before_rendering() {
    let mut qb = QueryBuilder::new("social");
    qb.r#match("Reading", "r")
        .prop("value", vec![1.0, f64::NAN])
        .done()
        .r#return(["r"])
        .done();
    assert!(matches!(
        qb.validate_query().first(),
        Some(QueryIssue::InvalidConstraint { prop, .. }) if prop == "value"
    ));
    assert!(qb.to_cypher().is_err());
}

#[test]
fn reset_rebuilds_identically() -> Result<()> {
    let mut qb = QueryBuilder::new("social");
    let build = |qb: &mut QueryBuilder| {
        qb.r#match("Person", "a")
            .prop("name", "Alice")
            .done()
            .r#match("Person", "b")
            .done()
            .match_edge("a", "KNOWS", "b")
            .where_cmp("since", CompareOp::Lt, 2000)
            .done()
            .r#return(["b.name"])
            .done();
    };
    build(&mut qb);
    let first = qb.to_cypher()?;
    qb.reset();
    assert!(qb.parts().is_empty());
    assert_eq!(qb.validate_query(), vec![QueryIssue::EmptyQuery]);
    build(&mut qb);
    let second = qb.to_cypher()?;
    assert_eq!(first, second);
    assert!(first.text.contains("(a)-[e0:KNOWS]->(b)"));
    assert!(first.text.contains("e0.since < $e0_w0_since"));
    Ok(())
}

#[test]
fn schema_checks_labels_and_properties() {
    let schema = GraphSchema::new().vertex(
        "Person",
        VertexDefinition::new().property(PropertyDefinition::required("name", PropertyType::String)),
    );
    let mut qb = QueryBuilder::new("social").with_schema(Arc::new(schema));
    qb.r#match("Person", "p")
        .prop("nickname", "Al")
        .where_eq("id", "p1")
        .done()
        .r#match("Robot", "r")
        .done()
        .r#return(["p", "r"])
        .done();
    let issues = qb.validate_query();
    assert!(issues.contains(&QueryIssue::UnknownProperty {
        label: "Person".into(),
        prop: "nickname".into()
    }));
    assert!(issues.contains(&QueryIssue::UnknownLabel {
        label: "Robot".into()
    }));
    assert_eq!(issues.len(), 2);
    // Schema problems do not stop rendering.
    assert!(qb.to_cypher().is_ok());
}

#[test]
fn to_sql_declares_result_columns() -> Result<()> {
    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person", "p")
        .done()
        .r#return([("p.name", "name")])
        .item("count(p) AS total")
        .done();
    assert_eq!(
        qb.to_sql()?,
        "SELECT * FROM ag_catalog.cypher('social', $$ MATCH (p:Person) RETURN p.name AS name, \
         count(p) AS total $$) AS (name ag_catalog.agtype, total ag_catalog.agtype)"
    );
    Ok(())
}

#[test]
fn executor_trait_objects_work() -> Result<()> {
    let age: Arc<dyn Executor> = Arc::new(MemoryAge::new());
    let rows = people_query().execute(age.as_ref())?;
    assert_eq!(rows.len(), 1);
    Ok(())
}

#[test]
fn where_cannot_follow_unwind() -> Result<()> {
    let mut qb = QueryBuilder::new("social");
    qb.unwind("[1, 2, 3]", "x")
        .r#where("x > 1")
        .r#return(["x"])
        .done();
    assert_eq!(
        qb.validate_query(),
        vec![QueryIssue::OutOfOrder {
            part: PartKind::Where,
            after: PartKind::Unwind
        }]
    );
    assert!(qb.to_cypher().is_err());

    qb.reset();
    qb.unwind("[1, 2, 3]", "x")
        .with(["x"])
        .r#where("x > 1")
        .r#return(["x"])
        .done();
    assert_eq!(
        qb.to_cypher()?.text,
        "UNWIND [1, 2, 3] AS x WITH x WHERE x > 1 RETURN x"
    );
    Ok(())
}

#[test]
fn generated_param_names_never_collide() -> Result<()> {
    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person", "p_a")
        .prop("b", 1)
        .done()
        .r#match("Person", "p")
        .prop("a_b", 2)
        .done()
        .r#return(["p_a", "p"])
        .done();
    assert!(qb.validate_query().is_empty());
    let query = qb.to_cypher()?;
    assert_eq!(
        query.text,
        "MATCH (p_a:Person {b: $p_a_b}) MATCH (p:Person {a_b: $p_a_b_1}) RETURN p_a, p"
    );
    assert_eq!(query.params.len(), 2);

    let age = MemoryAge::new();
    let rows = qb.execute(&age)?;
    let mut staged: Vec<_> = rows[0]["staged"]
        .as_object()
        .expect("staged values")
        .values()
        .cloned()
        .collect();
    staged.sort_by_key(|v| v.as_i64());
    assert_eq!(staged, vec![json!(1), json!(2)]);
    Ok(())
}

#[test]
fn generated_param_names_avoid_bound_names() -> Result<()> {
    let mut qb = QueryBuilder::new("social");
    qb.bind("p_name", "Bob");
    qb.r#match("Person", "p")
        .prop("name", "Alice")
        .done()
        .r#where("p.nick = $p_name")
        .r#return(["p"])
        .done();
    let query = qb.to_cypher()?;
    assert_eq!(
        query.text,
        "MATCH (p:Person {name: $p_name_1}) WHERE p.nick = $p_name RETURN p"
    );
    assert_eq!(query.params["p_name"], Value::from("Bob"));
    assert_eq!(query.params["p_name_1"], Value::from("Alice"));
    Ok(())
}

#[test]
fn edge_alias_applies_to_earlier_predicates() -> Result<()> {
    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person", "a")
        .done()
        .r#match("Person", "b")
        .done()
        .match_edge("a", "KNOWS", "b")
        .where_cmp("since", CompareOp::Gt, 2000)
        .prop("weight", 1)
        .alias("k")
        .done()
        .r#return(["k"])
        .done();
    assert!(qb.validate_query().is_empty());
    let query = qb.to_cypher()?;
    assert_eq!(
        query.text,
        "MATCH (a:Person) MATCH (b:Person) MATCH (a)-[k:KNOWS {weight: $k_weight}]->(b) \
         WHERE k.since > $k_w0_since RETURN k"
    );
    assert!(!query.text.contains("e0"));
    Ok(())
}

#[test]
fn vertex_aliases_must_be_unique() {
    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person", "p")
        .done()
        .r#match("Company", "p")
        .done()
        .r#return(["p"])
        .done();
    assert_eq!(
        qb.validate_query(),
        vec![QueryIssue::DuplicateAlias { alias: "p".into() }]
    );
    let err = qb.to_cypher().expect_err("duplicate alias");
    assert_eq!(err.code(), "ValidationError");
}

#[test]
fn edge_alias_cannot_reuse_a_vertex_alias() {
    let mut qb = QueryBuilder::new("social");
    qb.r#match("Person", "a")
        .done()
        .r#match("Person", "b")
        .done()
        .match_edge("a", "KNOWS", "b")
        .alias("b")
        .done()
        .r#return(["a", "b"])
        .done();
    assert_eq!(
        qb.validate_query(),
        vec![QueryIssue::DuplicateAlias { alias: "b".into() }]
    );
    assert!(qb.to_cypher().is_err());
}
