//! In-memory document store.
//!
//! Backs tests and the offline mode of the binary. Rows are kept as JSON so
//! malformed documents can be seeded exactly as a hosted backend could return
//! them, and individual operations can be made to fail or stall.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use convo_core::draft::ConversationInsert;
use convo_core::error::{ConvoError, Result};
use convo_core::types::{Conversation, ConversationId, Profile, Response};

use crate::store::DocumentStore;

/// Store operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    List,
    Insert,
    Delete,
    UpdateResponses,
    GetProfile,
    InsertProfile,
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<Value>,
    profiles: HashMap<Uuid, Profile>,
    failing: HashSet<FailPoint>,
    calls: HashMap<FailPoint, usize>,
}

/// `DocumentStore` kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    delay: Option<Duration>,
    owner: Option<Uuid>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp inserted rows with this `user_id`.
    pub fn with_owner(mut self, user_id: Uuid) -> Self {
        self.owner = Some(user_id);
        self
    }

    /// Sleep before every operation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a well-formed conversation.
    pub fn seed(&self, conversation: &Conversation) {
        if let Ok(row) = serde_json::to_value(conversation) {
            self.seed_raw(row);
        }
    }

    /// Add an arbitrary JSON row.
    pub fn seed_raw(&self, row: Value) {
        self.with_inner(|inner| inner.rows.push(row));
    }

    pub fn seed_profile(&self, profile: Profile) {
        self.with_inner(|inner| {
            inner.profiles.insert(profile.id, profile);
        });
    }

    /// Make `point` fail until [`InMemoryStore::recover`] is called.
    pub fn fail_on(&self, point: FailPoint) {
        self.with_inner(|inner| {
            inner.failing.insert(point);
        });
    }

    pub fn recover(&self, point: FailPoint) {
        self.with_inner(|inner| {
            inner.failing.remove(&point);
        });
    }

    /// Number of times `point` was invoked, failed calls included.
    pub fn calls(&self, point: FailPoint) -> usize {
        self.with_inner(|inner| inner.calls.get(&point).copied().unwrap_or(0))
    }

    /// Decoded copy of a stored conversation.
    pub fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        let key = id.to_string();
        self.with_inner(|inner| {
            inner
                .rows
                .iter()
                .find(|row| row.get("id").and_then(Value::as_str) == Some(key.as_str()))
                .cloned()
        })
        .and_then(|row| Conversation::decode(row).ok())
    }

    pub fn profile(&self, id: Uuid) -> Option<Profile> {
        self.with_inner(|inner| inner.profiles.get(&id).cloned())
    }

    pub fn len(&self) -> usize {
        self.with_inner(|inner| inner.rows.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    async fn enter(&self, point: FailPoint) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self.with_inner(|inner| {
            *inner.calls.entry(point).or_default() += 1;
            inner.failing.contains(&point)
        });
        if failing {
            debug!(?point, "Injected store failure");
            return Err(ConvoError::Storage(format!("{:?} failed", point)));
        }
        Ok(())
    }

    fn row_index(inner: &Inner, id: ConversationId) -> Option<usize> {
        let key = id.to_string();
        inner
            .rows
            .iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(key.as_str()))
    }
}

fn created_at(row: &Value) -> Option<DateTime<Utc>> {
    row.get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn list_conversations(&self) -> Result<Vec<Value>> {
        self.enter(FailPoint::List).await?;
        let mut rows = self.with_inner(|inner| inner.rows.clone());
        rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
        Ok(rows)
    }

    async fn insert_conversation(&self, row: &ConversationInsert<'_>) -> Result<()> {
        self.enter(FailPoint::Insert).await?;
        let mut value = serde_json::to_value(row)?;
        if let Value::Object(map) = &mut value {
            map.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
            map.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
            if let Some(owner) = self.owner {
                map.insert("user_id".into(), Value::String(owner.to_string()));
            }
        }
        self.with_inner(|inner| inner.rows.push(value));
        Ok(())
    }

    async fn delete_conversation(&self, id: ConversationId) -> Result<()> {
        self.enter(FailPoint::Delete).await?;
        self.with_inner(|inner| {
            if let Some(i) = Self::row_index(inner, id) {
                inner.rows.remove(i);
            }
        });
        Ok(())
    }

    async fn update_responses(&self, id: ConversationId, responses: &[Response]) -> Result<()> {
        self.enter(FailPoint::UpdateResponses).await?;
        let encoded = serde_json::to_value(responses)?;
        self.with_inner(|inner| {
            let i = Self::row_index(inner, id)
                .ok_or_else(|| ConvoError::not_found("conversation", id.to_string()))?;
            if let Value::Object(map) = &mut inner.rows[i] {
                map.insert("responses".into(), encoded);
                map.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
            }
            Ok(())
        })
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        self.enter(FailPoint::GetProfile).await?;
        Ok(self.profile(user_id))
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        self.enter(FailPoint::InsertProfile).await?;
        self.seed_profile(profile.clone());
        Ok(())
    }
}
