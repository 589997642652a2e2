//! Database persistence layer for ArtChain

use crate::error::{LedgerError, Result};
use crate::ledger::{Category, Entity, EntityKey, LedgerStore, WriteBatch, WriteOp};
use crate::model::{ArtToken, ArtWorkId};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// Durable ledger store backed by SQLite. Each committed batch is one SQL
/// transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| LedgerError::Storage(format!("Failed to open database: {}", e)))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LedgerError::Storage(format!("Failed to open database: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS entities (
                category TEXT NOT NULL,
                id TEXT NOT NULL,
                art_work TEXT,
                body TEXT NOT NULL,
                PRIMARY KEY (category, id)
            )",
            [],
        )
        .map_err(|e| LedgerError::Storage(format!("Failed to create entities table: {}", e)))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS entities_by_art_work ON entities (art_work)",
            [],
        )
        .map_err(|e| LedgerError::Storage(format!("Failed to create art_work index: {}", e)))?;

        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn decode(body: &str) -> Result<Entity> {
        serde_json::from_str(body).map_err(|e| {
            LedgerError::Serialization(format!("Failed to deserialize entity: {}", e))
        })
    }
}

fn exists(conn: &Connection, key: &EntityKey) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM entities WHERE category = ?1 AND id = ?2",
            params![key.category.as_str(), key.id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

impl LedgerStore for SqliteStore {
    fn get(&self, key: &EntityKey) -> Result<Option<Entity>> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM entities WHERE category = ?1 AND id = ?2",
                params![key.category.as_str(), key.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| LedgerError::Storage(format!("Failed to load {}: {}", key, e)))?;
        body.as_deref().map(Self::decode).transpose()
    }

    fn get_all(&self, category: Category) -> Result<Vec<Entity>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT body FROM entities WHERE category = ?1 ORDER BY id ASC")
            .map_err(|e| LedgerError::Storage(format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map(params![category.as_str()], |row| row.get::<_, String>(0))
            .map_err(|e| LedgerError::Storage(format!("Failed to query {}: {}", category, e)))?;

        let mut entities = Vec::new();
        for row in rows {
            let body = row.map_err(|e| LedgerError::Storage(format!("Failed to read row: {}", e)))?;
            entities.push(Self::decode(&body)?);
        }
        Ok(entities)
    }

    fn tokens_of(&self, art_work: &ArtWorkId) -> Result<Vec<ArtToken>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT body FROM entities WHERE category = ?1 AND art_work = ?2 ORDER BY id ASC",
            )
            .map_err(|e| LedgerError::Storage(format!("Failed to prepare query: {}", e)))?;
        let rows = stmt
            .query_map(
                params![Category::ArtToken.as_str(), art_work.as_str()],
                |row| row.get::<_, String>(0),
            )
            .map_err(|e| LedgerError::Storage(format!("Failed to query tokens: {}", e)))?;

        let mut tokens = Vec::new();
        for row in rows {
            let body = row.map_err(|e| LedgerError::Storage(format!("Failed to read row: {}", e)))?;
            if let Entity::ArtToken(token) = Self::decode(&body)? {
                tokens.push(token);
            }
        }
        Ok(tokens)
    }

    fn count(&self, category: Category) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE category = ?1",
            params![category.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        batch.check_distinct_keys()?;
        let len = batch.len();

        let conn = self.conn.lock();
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| LedgerError::Storage(format!("Failed to start transaction: {}", e)))?;

        for op in batch.ops() {
            let entity = op.entity();
            let key = entity.key();
            match op {
                WriteOp::Insert(_) if exists(&tx, &key)? => {
                    // Dropping `tx` rolls back everything written so far
                    return Err(LedgerError::Consistency(format!("{} already exists", key)));
                }
                WriteOp::Update(_) if !exists(&tx, &key)? => {
                    return Err(LedgerError::NotFound(key.not_found()));
                }
                _ => {}
            }

            let body = serde_json::to_string(entity).map_err(|e| {
                LedgerError::Serialization(format!("Failed to serialize {}: {}", key, e))
            })?;
            tx.execute(
                "INSERT OR REPLACE INTO entities (category, id, art_work, body)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    key.category.as_str(),
                    key.id,
                    entity.art_work().map(|w| w.as_str()),
                    body,
                ],
            )
            .map_err(|e| LedgerError::Storage(format!("Failed to save {}: {}", key, e)))?;
        }

        tx.commit()
            .map_err(|e| LedgerError::Storage(format!("Failed to commit transaction: {}", e)))?;
        debug!("sqlite store committed {} writes", len);
        Ok(())
    }
}
