/// Preference Store
///
/// Persistence boundary for preference state and the selection history
/// log. `put_state` swaps the whole state value, so concurrent readers
/// observe either the previous or the new snapshot, never a torn one.
/// History is ordered most recent first on read.
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::{FeedbackKind, HistoryRecord, PreferenceState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read/write contract the engine requires from persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get_state(&self) -> Result<Option<PreferenceState>>;

    /// Atomic whole-state replacement.
    async fn put_state(&self, state: &PreferenceState) -> Result<()>;

    async fn append_history(&self, record: HistoryRecord) -> Result<()>;

    /// Most recent first.
    async fn get_history(&self, limit: usize) -> Result<Vec<HistoryRecord>>;

    /// Attach explicit feedback to the newest history record for the item.
    /// A miss is not an error; the feedback still lives in the state.
    async fn record_feedback(&self, item_id: &str, kind: FeedbackKind) -> Result<()>;
}

#[derive(Default)]
struct UserRecord {
    state: Option<PreferenceState>,
    /// Oldest first; reads reverse.
    history: Vec<HistoryRecord>,
}

/// Shared in-memory backend, one record per user.
#[derive(Default)]
pub struct MemoryBackend {
    users: DashMap<Uuid, UserRecord>,
}

/// In-memory store handle scoped to a single user. Cloneable; clones
/// share the backend.
#[derive(Clone)]
pub struct InMemoryPreferenceStore {
    backend: Arc<MemoryBackend>,
    user_id: Uuid,
}

impl InMemoryPreferenceStore {
    pub fn new(user_id: Uuid) -> Self {
        Self::with_backend(Arc::new(MemoryBackend::default()), user_id)
    }

    pub fn with_backend(backend: Arc<MemoryBackend>, user_id: Uuid) -> Self {
        Self { backend, user_id }
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get_state(&self) -> Result<Option<PreferenceState>> {
        Ok(self
            .backend
            .users
            .get(&self.user_id)
            .and_then(|record| record.state.clone()))
    }

    async fn put_state(&self, state: &PreferenceState) -> Result<()> {
        self.backend
            .users
            .entry(self.user_id)
            .or_default()
            .state = Some(state.clone());
        Ok(())
    }

    async fn append_history(&self, record: HistoryRecord) -> Result<()> {
        self.backend
            .users
            .entry(self.user_id)
            .or_default()
            .history
            .push(record);
        Ok(())
    }

    async fn get_history(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        Ok(self
            .backend
            .users
            .get(&self.user_id)
            .map(|record| record.history.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn record_feedback(&self, item_id: &str, kind: FeedbackKind) -> Result<()> {
        if let Some(mut record) = self.backend.users.get_mut(&self.user_id) {
            if let Some(entry) = record
                .history
                .iter_mut()
                .rev()
                .find(|entry| entry.item_id == item_id)
            {
                entry.explicit_feedback = Some(kind);
            }
        }
        Ok(())
    }
}

/// Redis-backed store.
///
/// Keys:
/// - `{prefix}:{user}:state` - JSON preference state
/// - `{prefix}:{user}:history` - list of JSON records, newest first
pub struct RedisPreferenceStore {
    redis: redis::Client,
    key_prefix: String,
    user_id: Uuid,
    /// History list length cap.
    history_cap: usize,
}

impl RedisPreferenceStore {
    pub fn new(redis: redis::Client, user_id: Uuid) -> Self {
        Self {
            redis,
            key_prefix: "preferences".to_string(),
            user_id,
            history_cap: 500,
        }
    }

    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap;
        self
    }

    fn state_key(&self) -> String {
        format!("{}:{}:state", self.key_prefix, self.user_id)
    }

    fn history_key(&self) -> String {
        format!("{}:{}:history", self.key_prefix, self.user_id)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))
    }
}

#[async_trait]
impl PreferenceStore for RedisPreferenceStore {
    async fn get_state(&self) -> Result<Option<PreferenceState>> {
        let mut conn = self.connection().await?;

        let raw: Option<String> = conn
            .get(self.state_key())
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        match raw {
            Some(json) => {
                let state = serde_json::from_str(&json)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn put_state(&self, state: &PreferenceState) -> Result<()> {
        let mut conn = self.connection().await?;

        let json =
            serde_json::to_string(state).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let _: () = conn
            .set(self.state_key(), json)
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        debug!(user_id = %self.user_id, feedback_count = state.feedback_count, "Persisted preference state");
        Ok(())
    }

    async fn append_history(&self, record: HistoryRecord) -> Result<()> {
        let mut conn = self.connection().await?;

        let json =
            serde_json::to_string(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let _: () = conn
            .lpush(self.history_key(), json)
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;
        let _: () = conn
            .ltrim(self.history_key(), 0, self.history_cap as isize - 1)
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        Ok(())
    }

    async fn get_history(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let mut conn = self.connection().await?;

        let raw: Vec<String> = conn
            .lrange(self.history_key(), 0, limit as isize - 1)
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        raw.iter()
            .map(|json| {
                serde_json::from_str(json).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect()
    }

    async fn record_feedback(&self, item_id: &str, kind: FeedbackKind) -> Result<()> {
        let mut conn = self.connection().await?;

        let raw: Vec<String> = conn
            .lrange(self.history_key(), 0, self.history_cap as isize - 1)
            .await
            .map_err(|e| StoreError::Redis(e.to_string()))?;

        for (index, json) in raw.iter().enumerate() {
            let mut record: HistoryRecord = serde_json::from_str(json)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if record.item_id == item_id {
                record.explicit_feedback = Some(kind);
                let updated = serde_json::to_string(&record)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                let _: () = conn
                    .lset(self.history_key(), index as isize, updated)
                    .await
                    .map_err(|e| StoreError::Redis(e.to_string()))?;
                break;
            }
        }

        Ok(())
    }
}
