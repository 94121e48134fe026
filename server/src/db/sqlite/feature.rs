use anyhow::Result;
use log::debug;
use portal_misc::api::feature::Feature;
use portal_misc::api::Query;
use rusqlite::types::Value as DbValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};

use crate::db::sql::{Select, Update, Value};

use super::convert_values;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS feature (
    id TEXT PRIMARY KEY NOT NULL,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);
"#;

const FIELDS: [&str; 5] = ["id", "code", "name", "create_time", "update_time"];

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create(tx: &Transaction, feature: &Feature) -> Result<()> {
    let sql = r#"
    INSERT INTO feature (id, code, name, create_time, update_time)
    VALUES (?, ?, ?, ?, ?)
    "#;
    debug!("Database create_feature: {sql}, {feature:?}");
    tx.execute(
        sql,
        params![
            feature.id,
            feature.code,
            feature.name,
            feature.create_time,
            feature.update_time,
        ],
    )?;

    Ok(())
}

pub fn update(tx: &Transaction, params: crate::db::types::PatchFeatureParams) -> Result<()> {
    let mut update = Update::new("feature");

    if let Some(name) = params.name {
        update.add_field("name", Value::Text(name));
    }

    update.add_field("update_time", Value::Integer(params.update_time));
    update.add_where("id = ?", Value::Text(params.id));

    let (sql, values) = update.build();
    if sql.is_empty() {
        return Ok(());
    }
    let values = convert_values(values);

    debug!("Database update_feature: {sql}, {values:?}");
    tx.execute(&sql, params_from_iter(values.iter()))?;

    Ok(())
}

pub fn delete(tx: &Transaction, id: &str) -> Result<()> {
    let sql = "DELETE FROM feature WHERE id = ?";
    debug!("Database delete_feature: {sql}, {id}");
    tx.execute(sql, params![id])?;
    Ok(())
}

pub fn get(tx: &Transaction, id: &str) -> Result<Option<Feature>> {
    query_one(tx, "id = ?", id)
}

pub fn get_by_code(tx: &Transaction, code: &str) -> Result<Option<Feature>> {
    query_one(tx, "code = ?", code)
}

fn query_one(tx: &Transaction, cond: &str, value: &str) -> Result<Option<Feature>> {
    let mut select = Select::new(FIELDS.to_vec(), "feature");
    select.add_where(cond, Value::Text(value.to_string()));

    let (sql, values) = select.build();
    let values = convert_values(values);

    debug!("Database get_feature: {sql}, {values:?}");
    let mut stmt = tx.prepare(&sql)?;
    let feature = stmt
        .query_row(params_from_iter(values), row_to_feature)
        .optional()?;

    Ok(feature)
}

pub fn count(tx: &Transaction, query: Query) -> Result<u64> {
    let (sql, values) = build_select_sql(true, query);
    debug!("Database count_features: {sql}, {values:?}");

    let mut stmt = tx.prepare(&sql)?;
    let count: i64 = stmt.query_row(params_from_iter(values.iter()), |row| row.get(0))?;

    Ok(count as u64)
}

pub fn list(tx: &Transaction, query: Query) -> Result<Vec<Feature>> {
    let (sql, values) = build_select_sql(false, query);
    debug!("Database list_features: {sql}, {values:?}");

    let mut stmt = tx.prepare(&sql)?;
    let features = stmt
        .query_map(params_from_iter(values), row_to_feature)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(features)
}

fn build_select_sql(count: bool, query: Query) -> (String, Vec<DbValue>) {
    let mut select = if count {
        Select::count("feature")
    } else {
        Select::new(FIELDS.to_vec(), "feature")
    };

    select.add_order_by("create_time DESC");
    select.set_query(query, "name");

    let (sql, values) = select.build();
    (sql, convert_values(values))
}

fn row_to_feature(row: &rusqlite::Row) -> rusqlite::Result<Feature> {
    Ok(Feature {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        create_time: row.get(3)?,
        update_time: row.get(4)?,
    })
}
