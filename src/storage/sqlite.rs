//! SQLite key-value state store
//!
//! One table, one row per key, values stored as JSON text. Access goes
//! through a deadpool-sqlite connection pool so blocking rusqlite calls run
//! off the async executor.

use crate::error::{KeyquizError, Result};
use crate::storage::StateStore;
use async_trait::async_trait;
use chrono::Utc;
use deadpool_sqlite::{Config, Pool, Runtime};
use rusqlite::OptionalExtension;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_state (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Durable state store backed by a SQLite file
pub struct SqliteStateStore {
    pool: Pool,
}

impl SqliteStateStore {
    /// Open (or create) the database at `db_path` and ensure the schema
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        info!("Opening state store at: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = Config::new(path.to_path_buf())
            .create_pool(Runtime::Tokio1)
            .map_err(|e| {
                KeyquizError::Store(format!("Failed to create connection pool: {}", e))
            })?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.connection().await?;
        conn.interact(|conn| conn.execute_batch(SCHEMA))
            .await
            .map_err(|e| KeyquizError::Store(format!("Pool interaction failed: {}", e)))?
            .map_err(|e| KeyquizError::Store(format!("Failed to create schema: {}", e)))?;
        debug!("State store schema ready");
        Ok(())
    }

    async fn connection(&self) -> Result<deadpool_sqlite::Object> {
        self.pool.get().await.map_err(|e| {
            KeyquizError::Store(format!("Failed to get connection from pool: {}", e))
        })
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let conn = self.connection().await?;

        let rows = conn
            .interact(move |conn| -> rusqlite::Result<Vec<(String, String)>> {
                let mut stmt = conn.prepare("SELECT value FROM kv_state WHERE key = ?1")?;
                let mut found = Vec::with_capacity(keys.len());
                for key in keys {
                    let value: Option<String> =
                        stmt.query_row([&key], |row| row.get(0)).optional()?;
                    if let Some(value) = value {
                        found.push((key, value));
                    }
                }
                Ok(found)
            })
            .await
            .map_err(|e| KeyquizError::Store(format!("Pool interaction failed: {}", e)))?
            .map_err(|e| KeyquizError::Store(format!("Failed to read state: {}", e)))?;

        rows.into_iter()
            .map(|(key, text)| Ok((key, serde_json::from_str(&text)?)))
            .collect()
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        let rows = entries
            .into_iter()
            .map(|(key, value)| Ok((key, serde_json::to_string(&value)?)))
            .collect::<Result<Vec<(String, String)>>>()?;
        let now = Utc::now().to_rfc3339();
        let conn = self.connection().await?;

        conn.interact(move |conn| -> rusqlite::Result<()> {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO kv_state (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                )?;
                for (key, value) in &rows {
                    stmt.execute(rusqlite::params![key, value, now])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(|e| KeyquizError::Store(format!("Pool interaction failed: {}", e)))?
        .map_err(|e| KeyquizError::Store(format!("Failed to write state: {}", e)))?;

        Ok(())
    }
}
