use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hakach_core::{ChatSession, Language, RateFlow};
use parking_lot::RwLock;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::warn;

/// Persistence for chat sessions, including the one-turn-at-a-time guard.
pub trait SessionRepository: Send + Sync {
    async fn load_session(&self, session_id: &str) -> Result<Option<ChatSession>>;
    async fn upsert_session(&self, session: &ChatSession) -> Result<()>;
    /// Stores `session` unless its id is taken. `true` when it was inserted.
    async fn insert_session_if_absent(&self, session: &ChatSession) -> Result<bool>;
    async fn delete_session(&self, session_id: &str) -> Result<bool>;
    /// Marks the session as loading. `false` when it already was, or does not exist.
    async fn try_begin_turn(&self, session_id: &str) -> Result<bool>;
    async fn end_turn(&self, session_id: &str) -> Result<()>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<String, ChatSession>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionRepository for MemoryStore {
    async fn load_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn upsert_session(&self, session: &ChatSession) -> Result<()> {
        self.sessions
            .write()
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn insert_session_if_absent(&self, session: &ChatSession) -> Result<bool> {
        match self.sessions.write().entry(session.session_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(true)
            }
        }
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.write().remove(session_id).is_some())
    }

    async fn try_begin_turn(&self, session_id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(session_id) {
            Some(session) if !session.is_loading => {
                session.is_loading = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn end_turn(&self, session_id: &str) -> Result<()> {
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.is_loading = false;
        }
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut removed = 0_u64;
        self.sessions.write().retain(|_, value| {
            let keep = value.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });

        Ok(removed)
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        // every connection to an in-memory database sees its own empty database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_sessions (
              session_id TEXT PRIMARY KEY,
              language TEXT NOT NULL,
              messages_json TEXT NOT NULL,
              rate_flow_json TEXT NOT NULL,
              is_loading INTEGER NOT NULL DEFAULT 0,
              next_message_id INTEGER NOT NULL,
              expires_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed creating chat_sessions table")?;

        Ok(())
    }
}

impl SessionRepository for SqliteStore {
    async fn load_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, language, messages_json, rate_flow_json, is_loading, next_message_id, expires_at
            FROM chat_sessions
            WHERE session_id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let language_code: String = row.get("language");
        let language = Language::from_code(&language_code).unwrap_or(Language::Fr);

        let messages_json: String = row.get("messages_json");
        let messages = serde_json::from_str(&messages_json).unwrap_or_else(|err| {
            warn!(session_id, error = %err, "discarding unreadable message history");
            Vec::new()
        });

        let rate_flow_json: String = row.get("rate_flow_json");
        let rate_flow = serde_json::from_str::<RateFlow>(&rate_flow_json).unwrap_or_default();

        let session = ChatSession {
            session_id: row.get("session_id"),
            language,
            messages,
            rate_flow,
            is_loading: row.get::<i64, _>("is_loading") != 0,
            next_message_id: row.get::<i64, _>("next_message_id").max(1) as u64,
            expires_at: row
                .get::<String, _>("expires_at")
                .parse()
                .unwrap_or_else(|_| Utc::now()),
        };

        Ok(Some(session))
    }

    async fn upsert_session(&self, session: &ChatSession) -> Result<()> {
        let messages_json = serde_json::to_string(&session.messages)?;
        let rate_flow_json = serde_json::to_string(&session.rate_flow)?;

        sqlx::query(
            r#"
            INSERT INTO chat_sessions (session_id, language, messages_json, rate_flow_json, is_loading, next_message_id, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(session_id) DO UPDATE SET
              language=excluded.language,
              messages_json=excluded.messages_json,
              rate_flow_json=excluded.rate_flow_json,
              is_loading=excluded.is_loading,
              next_message_id=excluded.next_message_id,
              expires_at=excluded.expires_at
            "#,
        )
        .bind(&session.session_id)
        .bind(session.language.as_code())
        .bind(messages_json)
        .bind(rate_flow_json)
        .bind(i64::from(session.is_loading))
        .bind(session.next_message_id as i64)
        .bind(session.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_session_if_absent(&self, session: &ChatSession) -> Result<bool> {
        let messages_json = serde_json::to_string(&session.messages)?;
        let rate_flow_json = serde_json::to_string(&session.rate_flow)?;

        let result = sqlx::query(
            r#"
            INSERT INTO chat_sessions (session_id, language, messages_json, rate_flow_json, is_loading, next_message_id, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(session_id) DO NOTHING
            "#,
        )
        .bind(&session.session_id)
        .bind(session.language.as_code())
        .bind(messages_json)
        .bind(rate_flow_json)
        .bind(i64::from(session.is_loading))
        .bind(session.next_message_id as i64)
        .bind(session.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn try_begin_turn(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE chat_sessions SET is_loading = 1 WHERE session_id = ?1 AND is_loading = 0",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn end_turn(&self, session_id: &str) -> Result<()> {
        sqlx::query("UPDATE chat_sessions SET is_loading = 0 WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE expires_at < ?1")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
        }
    }
}

impl SessionRepository for Store {
    async fn load_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        match self {
            Store::Memory(store) => store.load_session(session_id).await,
            Store::Sqlite(store) => store.load_session(session_id).await,
        }
    }

    async fn upsert_session(&self, session: &ChatSession) -> Result<()> {
        match self {
            Store::Memory(store) => store.upsert_session(session).await,
            Store::Sqlite(store) => store.upsert_session(session).await,
        }
    }

    async fn insert_session_if_absent(&self, session: &ChatSession) -> Result<bool> {
        match self {
            Store::Memory(store) => store.insert_session_if_absent(session).await,
            Store::Sqlite(store) => store.insert_session_if_absent(session).await,
        }
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        match self {
            Store::Memory(store) => store.delete_session(session_id).await,
            Store::Sqlite(store) => store.delete_session(session_id).await,
        }
    }

    async fn try_begin_turn(&self, session_id: &str) -> Result<bool> {
        match self {
            Store::Memory(store) => store.try_begin_turn(session_id).await,
            Store::Sqlite(store) => store.try_begin_turn(session_id).await,
        }
    }

    async fn end_turn(&self, session_id: &str) -> Result<()> {
        match self {
            Store::Memory(store) => store.end_turn(session_id).await,
            Store::Sqlite(store) => store.end_turn(session_id).await,
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        match self {
            Store::Memory(store) => store.purge_expired(now).await,
            Store::Sqlite(store) => store.purge_expired(now).await,
        }
    }
}
