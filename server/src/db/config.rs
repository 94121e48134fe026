use std::path::PathBuf;

use anyhow::{Context, Result};
use portal_misc::config::{expandenv, CommonConfig, PathSet};
use serde::{Deserialize, Serialize};

use super::sqlite::SqliteConnection;
use super::{Database, UnionConnection};

/// Database configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DbConfig {
    /// Database type to use
    #[serde(default = "DbConfig::default_name")]
    pub name: DbType,

    /// SQLite database file name, relative to the data directory.
    #[serde(default = "DbConfig::default_sqlite_file")]
    pub sqlite_file: String,

    #[serde(skip)]
    sqlite_path: PathBuf,
}

/// Database type
#[derive(Debug, Deserialize, Serialize, Clone)]
pub enum DbType {
    /// Use SQLite database
    #[serde(rename = "sqlite")]
    Sqlite,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            sqlite_file: Self::default_sqlite_file(),
            sqlite_path: PathBuf::new(),
        }
    }
}

impl CommonConfig for DbConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        let file = expandenv("sqlite_file", &self.sqlite_file)?;
        self.sqlite_path = ps.data_dir.join(file);
        Ok(())
    }
}

impl DbConfig {
    pub fn build(&self) -> Result<Database> {
        let conn = match self.name {
            DbType::Sqlite => {
                let conn = SqliteConnection::open(&self.sqlite_path)
                    .with_context(|| format!("open sqlite: {}", self.sqlite_path.display()))?;
                UnionConnection::Sqlite(conn)
            }
        };
        Ok(Database::new(conn))
    }

    fn default_name() -> DbType {
        DbType::Sqlite
    }

    fn default_sqlite_file() -> String {
        String::from("portal.db")
    }
}
