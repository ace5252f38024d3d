use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Identifier of a conversation row.
pub type ConversationId = Uuid;
/// Identifier of a topic inside a conversation.
pub type TopicId = Uuid;
/// Identifier of a response inside a conversation.
pub type ResponseId = Uuid;

/// Literal stored in `Response.participants` when a response is addressed to
/// the whole room.
pub const EVERYONE: &str = "everyone";

/// Separator used when joining recipient names into `Response.participants`.
pub const RECIPIENT_SEPARATOR: &str = ", ";

// =============================================================================
// Decode helpers
// =============================================================================

/// Treat an explicit JSON `null` the same as an absent field.
///
/// The backend stores topics/responses/participants/images as loosely typed
/// JSON columns which may be `null` on older rows.
pub fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_everyone() -> String {
    EVERYONE.to_string()
}

fn null_as_everyone<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(default_everyone))
}

// =============================================================================
// Records
// =============================================================================

/// A recorded multi-party conversation owned by one authenticated user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered participant names. Uniqueness is only enforced by the draft form.
    #[serde(default, deserialize_with = "null_as_default")]
    pub participants: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub topics: Vec<Topic>,
    /// Canonical flat response list; each response points at its topic.
    #[serde(default, deserialize_with = "null_as_default")]
    pub responses: Vec<Response>,
    /// Image references. Carried through untouched.
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
}

impl Conversation {
    /// Decode a backend row, defaulting absent or `null` collections to empty.
    pub fn decode(row: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(row)?)
    }

    /// Look up a topic by identifier.
    pub fn topic(&self, topic_id: TopicId) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == topic_id)
    }

    /// Look up a response by identifier.
    pub fn response(&self, response_id: ResponseId) -> Option<&Response> {
        self.responses.iter().find(|r| r.id == response_id)
    }

    /// Whether `name` is one of the conversation's participants.
    pub fn has_participant(&self, name: &str) -> bool {
        self.participants.iter().any(|p| p == name)
    }

    /// Number of responses recorded under `topic_id`.
    pub fn response_count(&self, topic_id: TopicId) -> usize {
        self.responses
            .iter()
            .filter(|r| r.topic_id == topic_id)
            .count()
    }

    /// Responses whose `topic_id` does not reference any topic of this
    /// conversation.
    pub fn orphaned_responses(&self) -> Vec<&Response> {
        self.responses
            .iter()
            .filter(|r| self.topic(r.topic_id).is_none())
            .collect()
    }
}

/// A discussion subject within a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: TopicId,
    pub content: String,
    #[serde(default)]
    pub is_completed: bool,
    /// Denormalized copy kept only for compatibility with stored rows. The
    /// flat `Conversation::responses` list is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responses: Option<Vec<Response>>,
}

impl Topic {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            is_completed: false,
            responses: None,
        }
    }
}

/// A single recorded utterance attributed to a speaker, tied to one topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: ResponseId,
    pub topic_id: TopicId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// 0-3 short extracted phrases.
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_points: Vec<String>,
    pub speaker: String,
    /// Comma-joined recipient names, or [`EVERYONE`].
    #[serde(default = "default_everyone", deserialize_with = "null_as_everyone")]
    pub participants: String,
}

impl Response {
    /// Whether the response was addressed to the whole room.
    pub fn is_for_everyone(&self) -> bool {
        self.participants.eq_ignore_ascii_case(EVERYONE)
    }

    /// Individual recipient names; empty when addressed to everyone.
    pub fn recipients(&self) -> Vec<&str> {
        if self.is_for_everyone() {
            return Vec::new();
        }
        self.participants
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Encode a recipient selection the way responses store it.
pub fn join_recipients(recipients: &[String], everyone_label: &str) -> String {
    if recipients.is_empty() {
        everyone_label.to_string()
    } else {
        recipients.join(RECIPIENT_SEPARATOR)
    }
}

/// Profile row created at sign-up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Tests
// =============================================================================
