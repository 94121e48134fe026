use anyhow::Result;
use log::debug;
use portal_misc::api::session::{Session, SESSION_EXPIRED};
use portal_misc::api::Query;
use rusqlite::types::Value as DbValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};

use crate::db::sql::{Select, Value};

use super::convert_values;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS session (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    username TEXT NOT NULL,
    ip_address TEXT NOT NULL,
    started INTEGER NOT NULL,
    last_access INTEGER NOT NULL,
    refresh_token TEXT NOT NULL UNIQUE,
    status INTEGER NOT NULL,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);
"#;

const FIELDS: [&str; 10] = [
    "id",
    "user_id",
    "username",
    "ip_address",
    "started",
    "last_access",
    "refresh_token",
    "status",
    "create_time",
    "update_time",
];

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create(tx: &Transaction, session: &Session) -> Result<()> {
    let sql = r#"
    INSERT INTO session (id, user_id, username, ip_address, started, last_access,
        refresh_token, status, create_time, update_time)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    "#;
    debug!("Database create_session: {sql}, {}", session.id);
    tx.execute(
        sql,
        params![
            session.id,
            session.user_id,
            session.username,
            session.ip_address,
            session.started,
            session.last_access,
            session.refresh_token,
            session.status,
            session.create_time,
            session.update_time,
        ],
    )?;

    Ok(())
}

pub fn get(tx: &Transaction, id: &str) -> Result<Option<Session>> {
    query_one(tx, "id = ?", id)
}

pub fn get_by_refresh_token(tx: &Transaction, refresh_token: &str) -> Result<Option<Session>> {
    query_one(tx, "refresh_token = ?", refresh_token)
}

fn query_one(tx: &Transaction, cond: &str, value: &str) -> Result<Option<Session>> {
    let mut select = Select::new(FIELDS.to_vec(), "session");
    select.add_where(cond, Value::Text(value.to_string()));

    let (sql, values) = select.build();
    let values = convert_values(values);

    debug!("Database get_session: {sql}");
    let mut stmt = tx.prepare(&sql)?;
    let session = stmt
        .query_row(params_from_iter(values), row_to_session)
        .optional()?;

    Ok(session)
}

pub fn touch(tx: &Transaction, id: &str, last_access: u64) -> Result<()> {
    let sql = "UPDATE session SET last_access = ?, update_time = ? WHERE id = ?";
    debug!("Database touch_session: {sql}, {id}");
    tx.execute(sql, params![last_access, last_access, id])?;
    Ok(())
}

pub fn rotate_token(
    tx: &Transaction,
    id: &str,
    refresh_token: &str,
    last_access: u64,
) -> Result<()> {
    let sql =
        "UPDATE session SET refresh_token = ?, last_access = ?, update_time = ? WHERE id = ?";
    debug!("Database rotate_session_token: {sql}, {id}");
    tx.execute(sql, params![refresh_token, last_access, last_access, id])?;
    Ok(())
}

pub fn set_status(tx: &Transaction, id: &str, status: u32, update_time: u64) -> Result<()> {
    let sql = "UPDATE session SET status = ?, update_time = ? WHERE id = ?";
    debug!("Database set_session_status: {sql}, {id}, {status}");
    tx.execute(sql, params![status, update_time, id])?;
    Ok(())
}

pub fn delete(tx: &Transaction, id: &str) -> Result<()> {
    let sql = "DELETE FROM session WHERE id = ?";
    debug!("Database delete_session: {sql}, {id}");
    tx.execute(sql, params![id])?;
    Ok(())
}

pub fn count(tx: &Transaction, query: Query) -> Result<u64> {
    let (sql, values) = build_select_sql(true, query);
    debug!("Database count_sessions: {sql}");

    let mut stmt = tx.prepare(&sql)?;
    let count: i64 = stmt.query_row(params_from_iter(values.iter()), |row| row.get(0))?;

    Ok(count as u64)
}

pub fn list(tx: &Transaction, query: Query) -> Result<Vec<Session>> {
    let (sql, values) = build_select_sql(false, query);
    debug!("Database list_sessions: {sql}");

    let mut stmt = tx.prepare(&sql)?;
    let sessions = stmt
        .query_map(params_from_iter(values), row_to_session)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(sessions)
}

/// Marks every active session whose last access is older than the cutoff as
/// expired. Returns the number of expired sessions.
pub fn expire_before(tx: &Transaction, last_access_before: u64, update_time: u64) -> Result<u64> {
    let sql = "UPDATE session SET status = ?, update_time = ? WHERE status != ? AND last_access < ?";
    debug!("Database expire_sessions_before: {sql}, {last_access_before}");
    let count = tx.execute(
        sql,
        params![
            SESSION_EXPIRED,
            update_time,
            SESSION_EXPIRED,
            last_access_before
        ],
    )?;
    Ok(count as u64)
}

fn build_select_sql(count: bool, query: Query) -> (String, Vec<DbValue>) {
    let mut select = if count {
        Select::count("session")
    } else {
        Select::new(FIELDS.to_vec(), "session")
    };

    select.add_order_by("last_access DESC");
    select.set_query(query, "username");

    let (sql, values) = select.build();
    (sql, convert_values(values))
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        ip_address: row.get(3)?,
        started: row.get(4)?,
        last_access: row.get(5)?,
        refresh_token: row.get(6)?,
        status: row.get(7)?,
        create_time: row.get(8)?,
        update_time: row.get(9)?,
    })
}
