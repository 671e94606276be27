use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::feed::Message;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Append-only destination for accepted messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Write one message in its own transaction; it either fully commits or not at all.
    async fn append(&self, message: &Message) -> Result<(), StoreError>;
}

/// Outcome of [`create_schema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    Created,
    AlreadyPresent,
}

/// Create the `messages` table unless it exists. Safe to call repeatedly.
pub fn create_schema(conn: &Connection) -> Result<SchemaStatus, StoreError> {
    let exists: bool = conn.query_row(
        "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'messages'",
        [],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(SchemaStatus::AlreadyPresent);
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            timestamp INTEGER NOT NULL,
            chat_id INTEGER NOT NULL,
            from_user_id INTEGER NOT NULL,
            text TEXT NOT NULL
        );
        ",
    )?;
    Ok(SchemaStatus::Created)
}

/// SQLite-backed message log
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at the given path and ensure the table exists.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // journal_mode PRAGMA returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        match create_schema(&conn).context("Failed to create messages table")? {
            SchemaStatus::Created => info!("Created table."),
            SchemaStatus::AlreadyPresent => info!("Table is already created."),
        }

        info!("Message store opened at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of stored messages
    pub async fn count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        let count = conn
            .query_row("SELECT count(*) FROM messages", [], |row| row.get(0))
            .context("Failed to count messages")?;
        Ok(count)
    }

    /// All stored rows in insertion order
    #[cfg(test)]
    pub async fn messages(&self) -> Result<Vec<Message>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT timestamp, chat_id, from_user_id, text FROM messages ORDER BY rowid ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Message {
                    timestamp: row.get(0)?,
                    chat_id: row.get(1)?,
                    from_user_id: row.get(2)?,
                    text: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load messages")?;
        Ok(rows)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append(&self, message: &Message) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO messages (timestamp, chat_id, from_user_id, text)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                message.timestamp,
                message.chat_id,
                message.from_user_id,
                &message.text,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}
