#![allow(missing_docs)]

mod support;

use agebridge::staging::ddl::type_function_name;
use agebridge::{AutoCommit, EntityKind, Namespace, Result, StagingKey, StagingStore};
use serde_json::json;
use support::MemoryAge;

#[test]
fn install_is_repeatable() -> Result<()> {
    let age = MemoryAge::new();
    let store = StagingStore::new();
    store.install(&mut AutoCommit::new(&age))?;
    store.install(&mut AutoCommit::new(&age))?;
    assert_eq!(age.statements_containing("CREATE TABLE IF NOT EXISTS age_params.params"), 2);
    assert_eq!(
        age.functions(),
        vec!["get".to_string(), "get_all".to_string(), "get_array".to_string()]
    );
    Ok(())
}

#[test]
fn upsert_get_and_delete() -> Result<()> {
    let age = MemoryAge::new();
    let store = StagingStore::new();
    let mut session = AutoCommit::new(&age);
    let key = StagingKey::new("people")?;

    store.upsert(&mut session, &key, &json!({"nested": [1, {"deep": true}]}))?;
    store.upsert(&mut session, &key, &json!([1, 2, 3]))?;
    assert_eq!(store.get(&mut session, &key)?, Some(json!([1, 2, 3])));

    assert!(store.delete(&mut session, &key)?);
    assert!(!store.delete(&mut session, &key)?);
    assert_eq!(store.get(&mut session, &key)?, None);
    Ok(())
}

#[test]
fn namespaces_keep_callers_apart() -> Result<()> {
    let age = MemoryAge::new();
    let store = StagingStore::new();
    let mut session = AutoCommit::new(&age);
    let first = Namespace::generate();
    let second = Namespace::generate();
    assert_ne!(first, second);

    store.upsert(&mut session, &first.key("rows")?, &json!([1]))?;
    store.upsert(&mut session, &second.key("rows")?, &json!([2]))?;
    store.upsert(&mut session, &first.key("extra")?, &json!(null))?;

    assert_eq!(store.keys(&mut session, &first.prefix())?.len(), 2);
    assert_eq!(store.delete_prefix(&mut session, &first.prefix())?, 2);
    assert_eq!(
        store.keys(&mut session, "")?,
        vec![second.key("rows")?.to_string()]
    );
    assert!(store.delete_prefix(&mut session, "").is_err());
    Ok(())
}

#[test]
fn transient_failures_are_retried() -> Result<()> {
    let age = MemoryAge::new();
    age.fail_transiently("INSERT INTO", 2);
    let store = StagingStore::new();
    let key = StagingKey::new("k")?;
    store.upsert(&mut AutoCommit::new(&age), &key, &json!(1))?;
    assert_eq!(age.staged("k"), Some(json!(1)));
    assert_eq!(age.statements_containing("INSERT INTO"), 3);

    age.fail_transiently("INSERT INTO", 5);
    let err = store
        .upsert(&mut AutoCommit::new(&age), &key, &json!(2))
        .expect_err("retries exhausted");
    assert!(err.is_transient());
    assert_eq!(age.staged("k"), Some(json!(1)));
    Ok(())
}

#[test]
fn type_entry_points_read_shared_keys() -> Result<()> {
    let age = MemoryAge::new();
    let store = StagingStore::with_schema("staging")?;
    let call = store.ensure_type_entry_points(
        &mut AutoCommit::new(&age),
        EntityKind::Vertex,
        "Person",
    )?;
    assert_eq!(call, "staging.get_person_vertices()");
    assert_eq!(
        type_function_name(EntityKind::Edge, "WORKS_AT"),
        "get_works_at_edges"
    );
    assert_eq!(age.functions(), vec!["get_person_vertices".to_string()]);

    let key = StagingStore::shared_key(EntityKind::Vertex, "Person")?;
    assert_eq!(key.as_str(), "vertex_Person");
    assert!(StagingStore::shared_key(EntityKind::Edge, "bad name").is_err());
    Ok(())
}

#[test]
fn invalid_keys_and_schemas_are_refused() {
    assert!(StagingKey::new("").is_err());
    assert!(StagingKey::new("it's").is_err());
    assert!(StagingStore::with_schema("age params").is_err());
    assert!(Namespace::named("a:b").is_err());
}

#[test]
fn staged_transaction_restarts_after_a_transient_write() -> Result<()> {
    let age = MemoryAge::new();
    age.fail_transiently("INSERT INTO", 1);
    let store = StagingStore::new();
    let key = StagingKey::new("k")?;
    let seen = store.with_staged(
        &age,
        |tx| store.upsert(tx, &key, &json!([1, 2])),
        |tx| store.get(tx, &key),
    )?;
    assert_eq!(seen, Some(json!([1, 2])));
    assert_eq!(age.statements_containing("INSERT INTO"), 2);
    assert_eq!(age.transactions(), (2, 1, 1));
    Ok(())
}

#[test]
fn consuming_statement_runs_at_most_once() -> Result<()> {
    let age = MemoryAge::new();
    age.fail_transiently("SELECT value FROM", 1);
    let store = StagingStore::new();
    let key = StagingKey::new("k")?;
    let err = store
        .with_staged(
            &age,
            |tx| store.upsert(tx, &key, &json!(1)),
            |tx| store.get(tx, &key),
        )
        .expect_err("consume is not repeated");
    assert!(err.is_transient());
    assert_eq!(age.statements_containing("SELECT value FROM"), 1);
    assert_eq!(age.transactions(), (1, 0, 1));
    assert_eq!(age.staged("k"), None);
    Ok(())
}
