//! SQLite-backed message bus
//!
//! Several processes can share one bus file. Each message row carries a
//! `visible_at` instant (milliseconds since the epoch); receiving a message
//! pushes it forward by the lease, acking deletes the row. Rows whose body
//! does not decode are moved to `dead_letters` instead of being handed out.

use super::{BusError, BusResult, Delivery, Event, Message, MessageBus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const BUS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    delivery_id INTEGER PRIMARY KEY AUTOINCREMENT,
    topic TEXT NOT NULL,
    body TEXT NOT NULL,
    visible_at INTEGER NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_messages_topic ON messages(topic, visible_at);

CREATE TABLE IF NOT EXISTS dead_letters (
    delivery_id INTEGER PRIMARY KEY,
    topic TEXT NOT NULL,
    body TEXT NOT NULL,
    error TEXT NOT NULL,
    failed_at INTEGER NOT NULL
);
"#;

/// Message bus stored in a SQLite database
pub struct SqliteBus {
    conn: Mutex<Connection>,
    lease: Duration,
}

impl SqliteBus {
    /// Opens (or creates) a bus database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `lease` - How long a received message stays invisible before it is
    ///   handed out again
    pub fn new(path: &Path, lease: Duration) -> BusResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        Self::with_connection(conn, lease)
    }

    pub fn new_in_memory(lease: Duration) -> BusResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, lease)
    }

    fn with_connection(conn: Connection, lease: Duration) -> BusResult<Self> {
        conn.execute_batch(BUS_SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            lease,
        })
    }

    fn conn(&self) -> BusResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| BusError::LockPoisoned)
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl MessageBus for SqliteBus {
    fn publish(&self, event: &Event, topic: &str) -> BusResult<Message> {
        let message = Message::new(event.clone());
        let body = serde_json::to_string(&message)?;

        self.conn()?.execute(
            "INSERT INTO messages (topic, body, visible_at) VALUES (?1, ?2, ?3)",
            params![topic, body, now_millis()],
        )?;

        tracing::debug!("Published {} to {}", message.event_id, topic);
        Ok(message)
    }

    fn receive(&self, topic: &str) -> BusResult<Option<Delivery>> {
        let mut conn = self.conn()?;
        // Write lock up front: a deferred read-then-write fails with
        // SQLITE_BUSY when another process leases concurrently
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_millis();
        let lease_ms = i64::try_from(self.lease.as_millis()).unwrap_or(i64::MAX);

        loop {
            let row = tx
                .query_row(
                    "SELECT delivery_id, body, attempts FROM messages
                     WHERE topic = ?1 AND visible_at <= ?2
                     ORDER BY delivery_id LIMIT 1",
                    params![topic, now],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, u32>(2)?,
                        ))
                    },
                )
                .optional()?;

            let Some((delivery_id, body, attempts)) = row else {
                tx.commit()?;
                return Ok(None);
            };

            match serde_json::from_str::<Message>(&body) {
                Ok(message) => {
                    tx.execute(
                        "UPDATE messages SET visible_at = ?1, attempts = attempts + 1
                         WHERE delivery_id = ?2",
                        params![now.saturating_add(lease_ms), delivery_id],
                    )?;
                    tx.commit()?;

                    return Ok(Some(Delivery {
                        delivery_id,
                        topic: topic.to_string(),
                        attempt: attempts + 1,
                        message,
                    }));
                }
                Err(e) => {
                    tracing::warn!(
                        "Dead-lettering malformed message {} on {}: {}",
                        delivery_id,
                        topic,
                        e
                    );
                    tx.execute(
                        "INSERT INTO dead_letters (delivery_id, topic, body, error, failed_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![delivery_id, topic, body, e.to_string(), now],
                    )?;
                    tx.execute(
                        "DELETE FROM messages WHERE delivery_id = ?1",
                        params![delivery_id],
                    )?;
                }
            }
        }
    }

    fn ack(&self, delivery: &Delivery) -> BusResult<()> {
        self.conn()?.execute(
            "DELETE FROM messages WHERE delivery_id = ?1",
            params![delivery.delivery_id],
        )?;
        Ok(())
    }

    fn pending(&self, topic: &str) -> BusResult<u64> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM messages WHERE topic = ?1",
            params![topic],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
