//! DDL for the staging table and its retrieval entry points.
//!
//! Entry points are SQL functions returning `agtype`, so Cypher text can read
//! a staged value (`get`), iterate a staged array (`get_array`, consumed with
//! `UNWIND`), or read everything at once (`get_all`).

use crate::model::EntityKind;

/// Name of the staging table inside the staging schema.
pub const TABLE: &str = "params";

pub(crate) fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {schema}")
}

pub(crate) fn create_table(schema: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {schema}.{TABLE} (\
         key TEXT PRIMARY KEY, \
         value JSONB NOT NULL)"
    )
}

// agtype strings cast to text keep their quotes.
const KEY_ARG: &str = "trim(both '\"' from $1::text)";

pub(crate) fn create_get(schema: &str) -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {schema}.get(key ag_catalog.agtype) \
         RETURNS ag_catalog.agtype LANGUAGE sql STABLE AS $fn$ \
         SELECT p.value::text::ag_catalog.agtype FROM {schema}.{TABLE} p \
         WHERE p.key = {KEY_ARG} $fn$"
    )
}

pub(crate) fn create_get_array(schema: &str) -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {schema}.get_array(key ag_catalog.agtype) \
         RETURNS ag_catalog.agtype LANGUAGE sql STABLE AS $fn$ \
         SELECT COALESCE(\
         (SELECT p.value::text::ag_catalog.agtype FROM {schema}.{TABLE} p \
         WHERE p.key = {KEY_ARG} AND jsonb_typeof(p.value) = 'array'), \
         '[]'::ag_catalog.agtype) $fn$"
    )
}

pub(crate) fn create_get_all(schema: &str) -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {schema}.get_all() \
         RETURNS ag_catalog.agtype LANGUAGE sql STABLE AS $fn$ \
         SELECT COALESCE(jsonb_object_agg(p.key, p.value), '{{}}'::jsonb)\
         ::text::ag_catalog.agtype FROM {schema}.{TABLE} p $fn$"
    )
}

/// Name of the generated per-type entry point, without schema.
pub fn type_function_name(kind: EntityKind, type_name: &str) -> String {
    format!(
        "get_{}_{}",
        crate::ident::function_suffix(type_name),
        kind.plural()
    )
}

pub(crate) fn create_type_function(
    schema: &str,
    kind: EntityKind,
    type_name: &str,
    key: &str,
) -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {schema}.{name}() \
         RETURNS ag_catalog.agtype LANGUAGE sql STABLE AS $fn$ \
         SELECT {schema}.get_array('\"{key}\"'::ag_catalog.agtype) $fn$",
        name = type_function_name(kind, type_name),
    )
}

pub(crate) fn upsert(schema: &str) -> String {
    format!(
        "INSERT INTO {schema}.{TABLE} (key, value) VALUES ($1, $2::jsonb) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value"
    )
}

pub(crate) fn select_value(schema: &str) -> String {
    format!("SELECT value FROM {schema}.{TABLE} WHERE key = $1")
}

pub(crate) fn delete_key(schema: &str) -> String {
    format!("DELETE FROM {schema}.{TABLE} WHERE key = $1 RETURNING key")
}

pub(crate) fn delete_prefix(schema: &str) -> String {
    format!("DELETE FROM {schema}.{TABLE} WHERE starts_with(key, $1) RETURNING key")
}

pub(crate) fn select_keys(schema: &str) -> String {
    format!("SELECT key FROM {schema}.{TABLE} WHERE starts_with(key, $1) ORDER BY key")
}
