use async_trait::async_trait;
use uuid::Uuid;

use convo_core::draft::ConversationInsert;
use convo_core::error::Result;
use convo_core::types::{ConversationId, Profile, Response};

/// Access to the hosted document collections.
///
/// Conversations come back as raw JSON rows so callers can decode and
/// sanitize them individually; one malformed row must not hide the rest.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All conversations visible to the current user, newest first.
    async fn list_conversations(&self) -> Result<Vec<serde_json::Value>>;

    async fn insert_conversation(&self, row: &ConversationInsert<'_>) -> Result<()>;

    async fn delete_conversation(&self, id: ConversationId) -> Result<()>;

    /// Replace the `responses` column of one conversation.
    async fn update_responses(&self, id: ConversationId, responses: &[Response]) -> Result<()>;

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;

    async fn insert_profile(&self, profile: &Profile) -> Result<()>;
}
