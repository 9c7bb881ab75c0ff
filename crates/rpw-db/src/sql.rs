//! Postgres statement text for the upsert protocol.
//!
//! Everything here is pure: values are rendered as literals from their
//! [`FieldValue`] tag, never by inspecting runtime types. Identifiers always
//! come from the live column set of a known [`Table`], and are quoted anyway.
//!
//! Literal rules:
//! - condition position: numbers verbatim, `true`/`false` as `1`/`0`,
//!   null as `''`, text single-quoted with embedded quotes doubled
//! - value position (INSERT values, UPDATE assignments): as above, except
//!   null renders as `NULL` so nullable typed columns accept it
//!
//! Text rendering assumes `standard_conforming_strings = on` (the Postgres
//! default), where backslashes are ordinary characters.

use anyhow::{bail, Result};
use rpw_schemas::{Condition, FieldValue, Record, Table};

/// What an INSERT does when the natural key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Let the unique constraint reject the row.
    Error,
    /// `ON CONFLICT (<cols>) DO NOTHING`.
    DoNothing(&'static [&'static str]),
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_text(s: &str) -> String {
    // Postgres text cannot hold NUL.
    let cleaned: String = s.chars().filter(|c| *c != '\0').collect();
    format!("'{}'", cleaned.replace('\'', "''"))
}

/// Literal for the right-hand side of an equality condition.
pub fn condition_literal(v: &FieldValue) -> String {
    match v {
        FieldValue::Null => "''".to_string(),
        other => value_literal(other),
    }
}

/// Literal for an INSERT value or UPDATE assignment.
pub fn value_literal(v: &FieldValue) -> String {
    match v {
        FieldValue::Null => "NULL".to_string(),
        FieldValue::Bool(true) => "1".to_string(),
        FieldValue::Bool(false) => "0".to_string(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Text(s) => quote_text(s),
    }
}

pub fn where_clause(conditions: &[Condition]) -> Result<String> {
    if conditions.is_empty() {
        bail!("refusing to build an unconditional WHERE clause");
    }
    Ok(conditions
        .iter()
        .map(|c| format!("{} = {}", quote_ident(&c.field), condition_literal(&c.value)))
        .collect::<Vec<_>>()
        .join(" AND "))
}

pub fn exists_sql(table: Table, conditions: &[Condition]) -> Result<String> {
    Ok(format!(
        "SELECT 1 FROM {} WHERE {} LIMIT 1",
        quote_ident(table.as_str()),
        where_clause(conditions)?
    ))
}

pub fn insert_sql(table: Table, record: &Record, on_conflict: OnConflict) -> Result<String> {
    if record.is_empty() {
        bail!("nothing to insert into {table}: record has no known columns");
    }
    let columns = record
        .keys()
        .map(|k| quote_ident(k))
        .collect::<Vec<_>>()
        .join(", ");
    let values = record
        .values()
        .map(value_literal)
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table.as_str()),
        columns,
        values
    );
    if let OnConflict::DoNothing(key) = on_conflict {
        let key = key.iter().map(|k| quote_ident(k)).collect::<Vec<_>>().join(", ");
        sql.push_str(&format!(" ON CONFLICT ({key}) DO NOTHING"));
    }
    Ok(sql)
}

pub fn update_sql(table: Table, record: &Record, conditions: &[Condition]) -> Result<String> {
    if record.is_empty() {
        bail!("nothing to update in {table}: record has no known columns");
    }
    let assignments = record
        .iter()
        .map(|(k, v)| format!("{} = {}", quote_ident(k), value_literal(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "UPDATE {} SET {} WHERE {}",
        quote_ident(table.as_str()),
        assignments,
        where_clause(conditions)?
    ))
}
