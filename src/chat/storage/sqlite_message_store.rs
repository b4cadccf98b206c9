//! `SQLite` implementation of the conversation log.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::chat::core::config::StorageConfig;
use crate::chat::core::errors::{StoreError, StoreResult};
use crate::chat::core::ids::MessageKey;
use crate::chat::core::message::{ChatMessage, NewMessage};
use crate::chat::storage::message_store::{MessageStore, StoreFuture};
use crate::chat::storage::subscription::{MessageSubscription, SubscriberSet};

type MessageRow = (i64, Option<String>, Option<String>, Option<String>, i64);

/// `SQLite`-backed message log.
///
/// The `AUTOINCREMENT` row id is the store-assigned key, so keys are never
/// reused and always grow.
pub struct SqliteMessageStore {
    conn: Connection,
    table: String,
    subscribers: Arc<SubscriberSet>,
}

impl SqliteMessageStore {
    /// Open (or create) the log at the configured path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn new(config: &StorageConfig) -> StoreResult<Self> {
        let conn = Connection::open(&config.sqlite_path).await?;
        Self::init(conn, config.table.clone()).await
    }

    /// Open a private in-memory log.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open_in_memory(table: &str) -> StoreResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, table.to_string()).await
    }

    async fn init(conn: Connection, table: String) -> StoreResult<Self> {
        let table_name = table.clone();
        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    display_name TEXT,
                    text TEXT,
                    role TEXT,
                    created_at INTEGER NOT NULL
                );"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            table,
            subscribers: Arc::new(SubscriberSet::new()),
        })
    }
}

impl MessageStore for SqliteMessageStore {
    fn append_message(&self, message: NewMessage) -> StoreFuture<'_, StoreResult<ChatMessage>> {
        Box::pin(async move {
            let table = self.table.clone();
            let created_ms = Utc::now().timestamp_millis();
            let created_at = millis_to_datetime(created_ms)?;
            let subscribers = Arc::clone(&self.subscribers);

            // Insert and publish run together on the connection thread, so a
            // caller dropped mid-append cannot persist an unannounced entry.
            let (stored, reached) = self
                .conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (display_name, text, role, created_at)
                             VALUES (?1, ?2, ?3, ?4)"
                        ),
                        rusqlite::params![
                            message.display_name,
                            message.text,
                            message.role,
                            created_ms
                        ],
                    )?;
                    let stored = ChatMessage {
                        key: MessageKey::new(conn.last_insert_rowid()),
                        display_name: message.display_name,
                        text: message.text,
                        role: message.role,
                        created_at,
                    };
                    let reached = subscribers.publish(&stored);
                    Ok((stored, reached))
                })
                .await?;

            debug!(key = %stored.key, subscribers = reached, "Appended message");
            Ok(stored)
        })
    }

    fn read_last_n(&self, n: usize) -> StoreFuture<'_, StoreResult<Vec<ChatMessage>>> {
        Box::pin(async move {
            if n == 0 {
                return Ok(Vec::new());
            }

            let table = self.table.clone();
            let limit = i64::try_from(n).unwrap_or(i64::MAX);
            let mut rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, display_name, text, role, created_at
                         FROM {table}
                         ORDER BY id DESC
                         LIMIT ?1"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![limit], |row| {
                            let id: i64 = row.get(0)?;
                            let display_name: Option<String> = row.get(1)?;
                            let text: Option<String> = row.get(2)?;
                            let role: Option<String> = row.get(3)?;
                            let created_at: i64 = row.get(4)?;
                            Ok((id, display_name, text, role, created_at))
                        })?
                        .collect::<Result<Vec<MessageRow>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.reverse();
            rows.into_iter()
                .map(|(id, display_name, text, role, created_at)| -> StoreResult<ChatMessage> {
                    Ok(ChatMessage {
                        key: MessageKey::new(id),
                        display_name,
                        text,
                        role,
                        created_at: millis_to_datetime(created_at)?,
                    })
                })
                .collect()
        })
    }

    fn subscribe(&self) -> MessageSubscription {
        self.subscribers.subscribe()
    }
}

fn millis_to_datetime(ms: i64) -> StoreResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::InvalidRecord(format!("invalid timestamp: {ms}")))
}
