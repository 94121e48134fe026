use anyhow::Result;
use log::debug;
use portal_misc::api::role::Role;
use portal_misc::api::Query;
use rusqlite::types::Value as DbValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};

use crate::db::sql::{Select, Update, Value};
use crate::db::types::PatchRoleParams;

use super::convert_values;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS role (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    code TEXT NOT NULL UNIQUE,
    is_active INTEGER NOT NULL,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);
"#;

const FIELDS: [&str; 6] = ["id", "name", "code", "is_active", "create_time", "update_time"];

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create(tx: &Transaction, role: &Role) -> Result<()> {
    let sql = r#"
    INSERT INTO role (id, name, code, is_active, create_time, update_time)
    VALUES (?, ?, ?, ?, ?, ?)
    "#;
    debug!("Database create_role: {sql}, {role:?}");
    tx.execute(
        sql,
        params![
            role.id,
            role.name,
            role.code,
            role.is_active,
            role.create_time,
            role.update_time,
        ],
    )?;

    Ok(())
}

pub fn update(tx: &Transaction, params: PatchRoleParams) -> Result<()> {
    let mut update = Update::new("role");

    if let Some(name) = params.name {
        update.add_field("name", Value::Text(name));
    }

    if let Some(is_active) = params.is_active {
        update.add_field("is_active", Value::Bool(is_active));
    }

    update.add_field("update_time", Value::Integer(params.update_time));
    update.add_where("id = ?", Value::Text(params.id));

    let (sql, values) = update.build();
    if sql.is_empty() {
        return Ok(());
    }
    let values = convert_values(values);

    debug!("Database update_role: {sql}, {values:?}");
    tx.execute(&sql, params_from_iter(values.iter()))?;

    Ok(())
}

pub fn delete(tx: &Transaction, id: &str) -> Result<()> {
    let sql = "DELETE FROM role WHERE id = ?";
    debug!("Database delete_role: {sql}, {id}");
    tx.execute(sql, params![id])?;
    Ok(())
}

pub fn get(tx: &Transaction, id: &str) -> Result<Option<Role>> {
    query_one(tx, "id = ?", id)
}

pub fn get_by_code(tx: &Transaction, code: &str) -> Result<Option<Role>> {
    query_one(tx, "code = ?", code)
}

pub fn has_name(tx: &Transaction, name: &str) -> Result<bool> {
    let sql = "SELECT COUNT(1) FROM role WHERE name = ?";
    debug!("Database has_role_name: {sql}, {name}");
    let mut stmt = tx.prepare(sql)?;
    let count: i64 = stmt.query_row(params![name], |row| row.get(0))?;
    Ok(count > 0)
}

fn query_one(tx: &Transaction, cond: &str, value: &str) -> Result<Option<Role>> {
    let mut select = Select::new(FIELDS.to_vec(), "role");
    select.add_where(cond, Value::Text(value.to_string()));

    let (sql, values) = select.build();
    let values = convert_values(values);

    debug!("Database get_role: {sql}, {values:?}");
    let mut stmt = tx.prepare(&sql)?;
    let role = stmt
        .query_row(params_from_iter(values), row_to_role)
        .optional()?;

    Ok(role)
}

pub fn count(tx: &Transaction, query: Query) -> Result<u64> {
    let (sql, values) = build_select_sql(true, query);
    debug!("Database count_roles: {sql}, {values:?}");

    let mut stmt = tx.prepare(&sql)?;
    let count: i64 = stmt.query_row(params_from_iter(values.iter()), |row| row.get(0))?;

    Ok(count as u64)
}

pub fn list(tx: &Transaction, query: Query) -> Result<Vec<Role>> {
    let (sql, values) = build_select_sql(false, query);
    debug!("Database list_roles: {sql}, {values:?}");

    let mut stmt = tx.prepare(&sql)?;
    let roles = stmt
        .query_map(params_from_iter(values), row_to_role)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(roles)
}

fn build_select_sql(count: bool, query: Query) -> (String, Vec<DbValue>) {
    let mut select = if count {
        Select::count("role")
    } else {
        Select::new(FIELDS.to_vec(), "role")
    };

    select.add_order_by("create_time DESC");
    select.set_query(query, "name");

    let (sql, values) = select.build();
    (sql, convert_values(values))
}

fn row_to_role(row: &rusqlite::Row) -> rusqlite::Result<Role> {
    Ok(Role {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        is_active: row.get(3)?,
        create_time: row.get(4)?,
        update_time: row.get(5)?,
    })
}
