use anyhow::Result;
use log::debug;
use portal_misc::api::permission::Permission;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS permission (
    id TEXT PRIMARY KEY NOT NULL,
    role_id TEXT NOT NULL,
    role_code TEXT NOT NULL,
    feature_id TEXT NOT NULL,
    feature_code TEXT NOT NULL,
    operation TEXT NOT NULL,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL,
    UNIQUE(role_code, feature_code, operation)
);
"#;

const FIELDS: &str =
    "id, role_id, role_code, feature_id, feature_code, operation, create_time, update_time";

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create(tx: &Transaction, perm: &Permission) -> Result<()> {
    let sql = r#"
    INSERT INTO permission (id, role_id, role_code, feature_id, feature_code, operation,
        create_time, update_time)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    "#;
    debug!("Database create_permission: {sql}, {perm:?}");
    tx.execute(
        sql,
        params![
            perm.id,
            perm.role_id,
            perm.role_code,
            perm.feature_id,
            perm.feature_code,
            perm.operation,
            perm.create_time,
            perm.update_time,
        ],
    )?;

    Ok(())
}

pub fn update(tx: &Transaction, params: crate::db::types::PatchPermissionParams) -> Result<()> {
    let sql = r#"
    UPDATE permission SET role_id = ?, role_code = ?, feature_id = ?, feature_code = ?,
        operation = ?, update_time = ?
    WHERE id = ?
    "#;
    debug!("Database update_permission: {sql}, {params:?}");
    tx.execute(
        sql,
        params![
            params.role_id,
            params.role_code,
            params.feature_id,
            params.feature_code,
            params.operation,
            params.update_time,
            params.id,
        ],
    )?;

    Ok(())
}

pub fn delete(tx: &Transaction, id: &str) -> Result<()> {
    let sql = "DELETE FROM permission WHERE id = ?";
    debug!("Database delete_permission: {sql}, {id}");
    tx.execute(sql, params![id])?;
    Ok(())
}

pub fn get(tx: &Transaction, id: &str) -> Result<Option<Permission>> {
    let sql = format!("SELECT {FIELDS} FROM permission WHERE id = ?");
    debug!("Database get_permission: {sql}, {id}");
    let mut stmt = tx.prepare(&sql)?;
    let perm = stmt.query_row(params![id], row_to_permission).optional()?;

    Ok(perm)
}

pub fn has_tuple(
    tx: &Transaction,
    role_code: &str,
    feature_code: &str,
    operation: &str,
) -> Result<bool> {
    let sql =
        "SELECT COUNT(1) FROM permission WHERE role_code = ? AND feature_code = ? AND operation = ?";
    debug!("Database has_permission_tuple: {sql}, ({role_code}, {feature_code}, {operation})");
    let mut stmt = tx.prepare(sql)?;
    let count: i64 = stmt.query_row(params![role_code, feature_code, operation], |row| {
        row.get(0)
    })?;
    Ok(count > 0)
}

pub fn list(tx: &Transaction, role_code: Option<&str>) -> Result<Vec<Permission>> {
    let (sql, values) = match role_code {
        Some(code) => (
            format!(
                "SELECT {FIELDS} FROM permission WHERE role_code = ? \
                 ORDER BY feature_code, operation"
            ),
            vec![code.to_string()],
        ),
        None => (
            format!("SELECT {FIELDS} FROM permission ORDER BY feature_code, operation"),
            vec![],
        ),
    };
    debug!("Database list_permissions: {sql}, {values:?}");

    let mut stmt = tx.prepare(&sql)?;
    let perms = stmt
        .query_map(params_from_iter(values), row_to_permission)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(perms)
}

pub fn has_feature(tx: &Transaction, feature_code: &str) -> Result<bool> {
    let sql = "SELECT COUNT(1) FROM permission WHERE feature_code = ?";
    debug!("Database has_feature_permissions: {sql}, {feature_code}");
    let mut stmt = tx.prepare(sql)?;
    let count: i64 = stmt.query_row(params![feature_code], |row| row.get(0))?;
    Ok(count > 0)
}

pub fn delete_for_role(tx: &Transaction, role_id: &str) -> Result<u64> {
    let sql = "DELETE FROM permission WHERE role_id = ?";
    debug!("Database delete_role_permissions: {sql}, {role_id}");
    let count = tx.execute(sql, params![role_id])?;
    Ok(count as u64)
}

fn row_to_permission(row: &rusqlite::Row) -> rusqlite::Result<Permission> {
    Ok(Permission {
        id: row.get(0)?,
        role_id: row.get(1)?,
        role_code: row.get(2)?,
        feature_id: row.get(3)?,
        feature_code: row.get(4)?,
        operation: row.get(5)?,
        create_time: row.get(6)?,
        update_time: row.get(7)?,
    })
}
