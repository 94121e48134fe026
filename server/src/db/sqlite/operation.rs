use anyhow::Result;
use log::debug;
use portal_misc::api::feature::FeatureOperation;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS feature_operation (
    id TEXT PRIMARY KEY NOT NULL,
    feature_id TEXT NOT NULL,
    feature_code TEXT NOT NULL,
    operation TEXT NOT NULL UNIQUE,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL
);
"#;

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

/// Inserts a registry entry, or refreshes feature linkage and update time if
/// the operation is already registered. The operation name is the conflict
/// key since it is globally unique.
pub fn upsert(tx: &Transaction, op: &FeatureOperation) -> Result<()> {
    let sql = r#"
    INSERT INTO feature_operation (id, feature_id, feature_code, operation, create_time, update_time)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT(operation) DO UPDATE SET
        feature_id = excluded.feature_id,
        feature_code = excluded.feature_code,
        update_time = excluded.update_time
    "#;
    debug!("Database upsert_operation: {sql}, {op:?}");
    tx.execute(
        sql,
        params![
            op.id,
            op.feature_id,
            op.feature_code,
            op.operation,
            op.create_time,
            op.update_time,
        ],
    )?;

    Ok(())
}

pub fn find(
    tx: &Transaction,
    feature_id: &str,
    operation: &str,
) -> Result<Option<FeatureOperation>> {
    let sql = r#"
    SELECT id, feature_id, feature_code, operation, create_time, update_time
    FROM feature_operation WHERE feature_id = ? AND operation = ?
    "#;
    debug!("Database find_operation: {sql}, {feature_id}, {operation}");
    let mut stmt = tx.prepare(sql)?;
    let op = stmt
        .query_row(params![feature_id, operation], row_to_operation)
        .optional()?;

    Ok(op)
}

pub fn list(tx: &Transaction, feature_id: Option<&str>) -> Result<Vec<FeatureOperation>> {
    let (sql, params) = match feature_id {
        Some(id) => (
            "SELECT id, feature_id, feature_code, operation, create_time, update_time \
             FROM feature_operation WHERE feature_id = ? ORDER BY feature_code, operation",
            vec![id.to_string()],
        ),
        None => (
            "SELECT id, feature_id, feature_code, operation, create_time, update_time \
             FROM feature_operation ORDER BY feature_code, operation",
            vec![],
        ),
    };
    debug!("Database list_operations: {sql}, {params:?}");

    let mut stmt = tx.prepare(sql)?;
    let ops = stmt
        .query_map(rusqlite::params_from_iter(params), row_to_operation)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ops)
}

/// Links every orphaned registry entry carrying the given code to a newly
/// created feature, so permissions on its operations become assignable
/// without waiting for the next startup sync.
pub fn adopt_feature(
    tx: &Transaction,
    feature_id: &str,
    feature_code: &str,
    update_time: u64,
) -> Result<u64> {
    let sql = "UPDATE feature_operation SET feature_id = ?, update_time = ? \
               WHERE feature_code = ? AND feature_id = ''";
    debug!("Database adopt_feature_operations: {sql}, {feature_id}, {feature_code}");
    let count = tx.execute(sql, params![feature_id, update_time, feature_code])?;
    Ok(count as u64)
}

/// Blanks the feature linkage of every operation registered under a deleted
/// feature. The entries stay in the registry as orphans until a feature with
/// the same code is recreated.
pub fn detach_feature(tx: &Transaction, feature_id: &str, update_time: u64) -> Result<u64> {
    let sql = "UPDATE feature_operation SET feature_id = '', update_time = ? WHERE feature_id = ?";
    debug!("Database detach_feature_operations: {sql}, {feature_id}");
    let count = tx.execute(sql, params![update_time, feature_id])?;
    Ok(count as u64)
}

fn row_to_operation(row: &rusqlite::Row) -> rusqlite::Result<FeatureOperation> {
    Ok(FeatureOperation {
        id: row.get(0)?,
        feature_id: row.get(1)?,
        feature_code: row.get(2)?,
        operation: row.get(3)?,
        create_time: row.get(4)?,
        update_time: row.get(5)?,
    })
}
