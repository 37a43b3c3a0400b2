//! SQLite backend for the contact store and the append-only audit log.
//!
//! Migration happens on open with `CREATE TABLE IF NOT EXISTS`. The
//! contact state transition uses a conditional UPDATE so a racing writer
//! surfaces as `StateConflict` instead of silently overwriting.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use frentista_core::error::{FrentistaError, Result};
use frentista_core::traits::{AuditLog, ContactStore};
use frentista_core::types::{
    AttemptOutcome, Contact, ConversationTurn, DeliveryAttempt, Direction, FlowState,
};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| FrentistaError::Database(format!("DB open: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory database, handy for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FrentistaError::Database(format!("DB open: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.lock()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS contacts (
                phone TEXT PRIMARY KEY,
                name TEXT,
                flow_state TEXT NOT NULL,
                opt_in INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Append-only: one row per terminal delivery outcome
            CREATE TABLE IF NOT EXISTS delivery_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phone TEXT NOT NULL,
                payload TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                outcome TEXT NOT NULL,
                transient INTEGER NOT NULL DEFAULT 0,
                provider_message_id TEXT,
                error TEXT,
                timestamp TEXT NOT NULL
            );

            -- Append-only: conversation history per phone
            CREATE TABLE IF NOT EXISTS conversation_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phone TEXT NOT NULL,
                direction TEXT NOT NULL,
                text TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_turns_phone ON conversation_turns(phone, id);
         ",
            )
            .map_err(|e| FrentistaError::Database(format!("Migration: {e}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FrentistaError::Database(format!("DB lock poisoned: {e}")))
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}

fn parse_flow_state(s: &str) -> Result<FlowState> {
    FlowState::parse(s)
        .ok_or_else(|| FrentistaError::Database(format!("unknown flow_state '{s}'")))
}

#[async_trait]
impl ContactStore for SqliteStore {
    async fn get(&self, phone: &str) -> Result<Option<Contact>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT phone, name, flow_state, opt_in, created_at, updated_at
                 FROM contacts WHERE phone = ?1",
            )
            .map_err(|e| FrentistaError::Database(e.to_string()))?;
        let mut rows = stmt
            .query(rusqlite::params![phone])
            .map_err(|e| FrentistaError::Database(e.to_string()))?;

        match rows.next().map_err(|e| FrentistaError::Database(e.to_string()))? {
            Some(row) => {
                let state: String = row
                    .get(2)
                    .map_err(|e| FrentistaError::Database(e.to_string()))?;
                Ok(Some(Contact {
                    phone: row.get(0).map_err(|e| FrentistaError::Database(e.to_string()))?,
                    name: row.get(1).map_err(|e| FrentistaError::Database(e.to_string()))?,
                    flow_state: parse_flow_state(&state)?,
                    opt_in: row
                        .get::<_, i64>(3)
                        .map_err(|e| FrentistaError::Database(e.to_string()))?
                        != 0,
                    created_at: parse_timestamp(
                        &row.get::<_, String>(4)
                            .map_err(|e| FrentistaError::Database(e.to_string()))?,
                    ),
                    updated_at: parse_timestamp(
                        &row.get::<_, String>(5)
                            .map_err(|e| FrentistaError::Database(e.to_string()))?,
                    ),
                }))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, contact: &Contact) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO contacts
                (phone, name, flow_state, opt_in, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                contact.phone,
                contact.name,
                contact.flow_state.as_str(),
                contact.opt_in as i64,
                contact.created_at.to_rfc3339(),
                contact.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| FrentistaError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_state(
        &self,
        phone: &str,
        expected: FlowState,
        next: FlowState,
        name: Option<&str>,
    ) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE contacts
                 SET flow_state = ?1, name = COALESCE(?2, name), updated_at = ?3
                 WHERE phone = ?4 AND flow_state = ?5",
                rusqlite::params![
                    next.as_str(),
                    name,
                    Utc::now().to_rfc3339(),
                    phone,
                    expected.as_str(),
                ],
            )
            .map_err(|e| FrentistaError::Database(e.to_string()))?;

        if changed == 1 {
            tracing::debug!("contact {phone}: {expected} → {next}");
            return Ok(());
        }

        // Distinguish a missing contact from a lost race.
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM contacts WHERE phone = ?1",
                rusqlite::params![phone],
                |r| r.get::<_, i64>(0),
            )
            .map(|n| n > 0)
            .map_err(|e| FrentistaError::Database(e.to_string()))?;

        if exists {
            Err(FrentistaError::StateConflict(format!(
                "contact {phone} is no longer in state {expected}"
            )))
        } else {
            Err(FrentistaError::Database(format!(
                "contact {phone} not found"
            )))
        }
    }
}

#[async_trait]
impl AuditLog for SqliteStore {
    async fn record_attempt(&self, attempt: &DeliveryAttempt) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO delivery_attempts
                (phone, payload, attempts, outcome, transient,
                 provider_message_id, error, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                attempt.phone,
                attempt.payload,
                attempt.attempts,
                attempt.outcome.as_str(),
                attempt.transient as i64,
                attempt.provider_message_id,
                attempt.error,
                attempt.timestamp.to_rfc3339(),
            ],
        )
        .map_err(|e| FrentistaError::Database(e.to_string()))?;
        Ok(())
    }

    async fn record_turn(&self, turn: &ConversationTurn) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO conversation_turns (phone, direction, text, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                turn.phone,
                turn.direction.as_str(),
                turn.text,
                turn.timestamp.to_rfc3339(),
            ],
        )
        .map_err(|e| FrentistaError::Database(e.to_string()))?;
        Ok(())
    }

    async fn recent_turns(&self, phone: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT phone, direction, text, timestamp
                 FROM conversation_turns
                 WHERE phone = ?1
                 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| FrentistaError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(rusqlite::params![phone, limit as i64], |row| {
                let direction: String = row.get(1)?;
                Ok(ConversationTurn {
                    phone: row.get(0)?,
                    direction: if direction == "inbound" {
                        Direction::Inbound
                    } else {
                        Direction::Outbound
                    },
                    text: row.get(2)?,
                    timestamp: parse_timestamp(&row.get::<_, String>(3)?),
                })
            })
            .map_err(|e| FrentistaError::Database(e.to_string()))?;

        let mut turns: Vec<ConversationTurn> =
            rows.filter_map(|r| r.ok()).collect();
        turns.reverse(); // oldest first
        Ok(turns)
    }
}

/// Count of recorded delivery attempts, used by the operator CLI.
impl SqliteStore {
    pub fn attempt_count(&self) -> usize {
        let Ok(conn) = self.conn.lock() else { return 0 };
        conn.query_row("SELECT COUNT(*) FROM delivery_attempts", [], |r| {
            r.get::<_, i64>(0)
        })
        .unwrap_or(0) as usize
    }

    /// Recent terminal outcomes for one phone, newest first.
    pub fn attempts_for(&self, phone: &str, limit: usize) -> Result<Vec<DeliveryAttempt>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT phone, payload, attempts, outcome, transient,
                        provider_message_id, error, timestamp
                 FROM delivery_attempts
                 WHERE phone = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| FrentistaError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(rusqlite::params![phone, limit as i64], |row| {
                let outcome: String = row.get(3)?;
                Ok(DeliveryAttempt {
                    phone: row.get(0)?,
                    payload: row.get(1)?,
                    attempts: row.get(2)?,
                    outcome: if outcome == "sent" {
                        AttemptOutcome::Sent
                    } else {
                        AttemptOutcome::Failed
                    },
                    transient: row.get::<_, i64>(4)? != 0,
                    provider_message_id: row.get(5)?,
                    error: row.get(6)?,
                    timestamp: parse_timestamp(&row.get::<_, String>(7)?),
                })
            })
            .map_err(|e| FrentistaError::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}
