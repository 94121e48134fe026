use anyhow::Result;
use log::debug;
use portal_misc::api::role::Role;
use portal_misc::api::Query;
use rusqlite::types::Value as DbValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};

use crate::db::sql::{Select, Update, Value};
use crate::db::types::{PatchUserParams, UserRecord};

use super::convert_values;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS user (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    email TEXT,
    hash TEXT NOT NULL,
    salt TEXT NOT NULL,
    is_active INTEGER NOT NULL,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_role (
    user_id TEXT NOT NULL,
    role_id TEXT NOT NULL,
    UNIQUE(user_id, role_id)
);
"#;

const FIELDS: [&str; 8] = [
    "id",
    "name",
    "email",
    "hash",
    "salt",
    "is_active",
    "create_time",
    "update_time",
];

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create(tx: &Transaction, user: &UserRecord) -> Result<()> {
    let sql = r#"
    INSERT INTO user (id, name, email, hash, salt, is_active, create_time, update_time)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    "#;
    debug!("Database create_user: {sql}, {}", user.name);
    tx.execute(
        sql,
        params![
            user.id,
            user.name,
            user.email,
            user.hash,
            user.salt,
            user.is_active,
            user.create_time,
            user.update_time,
        ],
    )?;

    Ok(())
}

pub fn update(tx: &Transaction, params: PatchUserParams) -> Result<()> {
    let mut update = Update::new("user");

    if let Some(email) = params.email {
        update.add_field("email", Value::Text(email));
    }

    if let Some((hash, salt)) = params.secret {
        update.add_field("hash", Value::Text(hash));
        update.add_field("salt", Value::Text(salt));
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

    debug!("Database update_user: {sql}");
    tx.execute(&sql, params_from_iter(values.iter()))?;

    Ok(())
}

pub fn delete(tx: &Transaction, id: &str) -> Result<()> {
    let sql = "DELETE FROM user WHERE id = ?";
    debug!("Database delete_user: {sql}, {id}");
    tx.execute(sql, params![id])?;
    Ok(())
}

pub fn get(tx: &Transaction, id: &str) -> Result<Option<UserRecord>> {
    query_one(tx, "id = ?", id)
}

pub fn get_by_name(tx: &Transaction, name: &str) -> Result<Option<UserRecord>> {
    query_one(tx, "name = ?", name)
}

fn query_one(tx: &Transaction, cond: &str, value: &str) -> Result<Option<UserRecord>> {
    let mut select = Select::new(FIELDS.to_vec(), "user");
    select.add_where(cond, Value::Text(value.to_string()));

    let (sql, values) = select.build();
    let values = convert_values(values);

    debug!("Database get_user: {sql}, {values:?}");
    let mut stmt = tx.prepare(&sql)?;
    let user = stmt
        .query_row(params_from_iter(values), row_to_user)
        .optional()?;

    Ok(user)
}

pub fn count(tx: &Transaction, query: Query) -> Result<u64> {
    let (sql, values) = build_select_sql(true, query);
    debug!("Database count_users: {sql}, {values:?}");

    let mut stmt = tx.prepare(&sql)?;
    let count: i64 = stmt.query_row(params_from_iter(values.iter()), |row| row.get(0))?;

    Ok(count as u64)
}

pub fn list(tx: &Transaction, query: Query) -> Result<Vec<UserRecord>> {
    let (sql, values) = build_select_sql(false, query);
    debug!("Database list_users: {sql}, {values:?}");

    let mut stmt = tx.prepare(&sql)?;
    let users = stmt
        .query_map(params_from_iter(values), row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(users)
}

pub fn create_user_role(tx: &Transaction, user_id: &str, role_id: &str) -> Result<()> {
    let sql = "INSERT OR IGNORE INTO user_role (user_id, role_id) VALUES (?, ?)";
    debug!("Database create_user_role: {sql}, {user_id}, {role_id}");
    tx.execute(sql, params![user_id, role_id])?;
    Ok(())
}

pub fn delete_user_roles(tx: &Transaction, user_id: &str) -> Result<()> {
    let sql = "DELETE FROM user_role WHERE user_id = ?";
    debug!("Database delete_user_roles: {sql}, {user_id}");
    tx.execute(sql, params![user_id])?;
    Ok(())
}

pub fn list_user_roles(tx: &Transaction, user_id: &str) -> Result<Vec<Role>> {
    let sql = r#"
    SELECT r.id, r.name, r.code, r.is_active, r.create_time, r.update_time
    FROM role r JOIN user_role ur ON ur.role_id = r.id
    WHERE ur.user_id = ?
    ORDER BY r.code
    "#;
    debug!("Database list_user_roles: {sql}, {user_id}");

    let mut stmt = tx.prepare(sql)?;
    let roles = stmt
        .query_map(params![user_id], |row| {
            Ok(Role {
                id: row.get(0)?,
                name: row.get(1)?,
                code: row.get(2)?,
                is_active: row.get(3)?,
                create_time: row.get(4)?,
                update_time: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(roles)
}

pub fn is_role_assigned(tx: &Transaction, role_id: &str) -> Result<bool> {
    let sql = "SELECT COUNT(1) FROM user_role WHERE role_id = ?";
    debug!("Database is_role_assigned: {sql}, {role_id}");
    let mut stmt = tx.prepare(sql)?;
    let count: i64 = stmt.query_row(params![role_id], |row| row.get(0))?;
    Ok(count > 0)
}

/// Derives the full grouping relation: one (username, role_code) pair per
/// assignment, restricted to active users and active roles.
pub fn list_subject_groupings(tx: &Transaction) -> Result<Vec<(String, String)>> {
    let sql = r#"
    SELECT u.name, r.code
    FROM user u
    JOIN user_role ur ON ur.user_id = u.id
    JOIN role r ON r.id = ur.role_id
    WHERE u.is_active = 1 AND r.is_active = 1
    "#;
    debug!("Database list_subject_groupings: {sql}");

    let mut stmt = tx.prepare(sql)?;
    let pairs = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(pairs)
}

fn build_select_sql(count: bool, query: Query) -> (String, Vec<DbValue>) {
    let mut select = if count {
        Select::count("user")
    } else {
        Select::new(FIELDS.to_vec(), "user")
    };

    select.add_order_by("create_time DESC");
    select.set_query(query, "name");

    let (sql, values) = select.build();
    (sql, convert_values(values))
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        hash: row.get(3)?,
        salt: row.get(4)?,
        is_active: row.get(5)?,
        create_time: row.get(6)?,
        update_time: row.get(7)?,
    })
}
