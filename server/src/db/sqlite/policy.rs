use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, Transaction};

use crate::db::types::PolicyRuleRow;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS policy_rule (
    kind TEXT NOT NULL,
    v0 TEXT NOT NULL,
    v1 TEXT NOT NULL,
    v2 TEXT NOT NULL,
    UNIQUE(kind, v0, v1, v2)
);
"#;

pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

/// Rewrites the durable policy rules wholesale. The policy store persists by
/// replacing the full table with its in-memory index inside one transaction.
pub fn replace(tx: &Transaction, rows: &[PolicyRuleRow]) -> Result<()> {
    debug!("Database replace_policy_rules: {} rules", rows.len());
    tx.execute("DELETE FROM policy_rule", [])?;

    let sql = "INSERT INTO policy_rule (kind, v0, v1, v2) VALUES (?, ?, ?, ?)";
    let mut stmt = tx.prepare(sql)?;
    for row in rows {
        stmt.execute(params![row.kind, row.v0, row.v1, row.v2])?;
    }

    Ok(())
}

pub fn load(tx: &Transaction) -> Result<Vec<PolicyRuleRow>> {
    let sql = "SELECT kind, v0, v1, v2 FROM policy_rule";
    debug!("Database load_policy_rules: {sql}");

    let mut stmt = tx.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PolicyRuleRow {
                kind: row.get(0)?,
                v0: row.get(1)?,
                v1: row.get(2)?,
                v2: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}
