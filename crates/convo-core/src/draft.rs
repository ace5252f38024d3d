//! Conversation draft: the data behind the "new conversation" form.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{ConvoError, Result};
use crate::types::{Response, Topic, TopicId};

/// Editable state of the new-conversation form.
///
/// Participant 0 is the signed-in user when a profile name is known and
/// cannot be removed.
#[derive(Debug, Clone, Default)]
pub struct ConversationDraft {
    pub title: String,
    pub description: String,
    participants: Vec<String>,
    owner_pinned: bool,
    topics: Vec<Topic>,
    scheduled_date: Option<String>,
    scheduled_time: Option<String>,
}

impl ConversationDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a draft with the current user's display name as participant 0.
    pub fn for_owner(full_name: &str) -> Self {
        let mut draft = Self::new();
        let name = full_name.trim();
        if !name.is_empty() {
            draft.participants.push(name.to_string());
            draft.owner_pinned = true;
        }
        draft
    }

    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Add a participant. Returns `false` for blank or duplicate names.
    pub fn add_participant(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.participants.iter().any(|p| p == name) {
            return false;
        }
        self.participants.push(name.to_string());
        true
    }

    /// Remove the participant at `index`. The pinned owner stays.
    pub fn remove_participant(&mut self, index: usize) -> bool {
        if index >= self.participants.len() || (index == 0 && self.owner_pinned) {
            return false;
        }
        self.participants.remove(index);
        true
    }

    /// Add a topic, returning its new identifier. Blank content is ignored.
    pub fn add_topic(&mut self, content: &str) -> Option<TopicId> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let topic = Topic::new(content);
        let id = topic.id;
        self.topics.push(topic);
        Some(id)
    }

    pub fn remove_topic(&mut self, topic_id: TopicId) -> bool {
        let before = self.topics.len();
        self.topics.retain(|t| t.id != topic_id);
        self.topics.len() != before
    }

    /// Set the optional schedule. Either part may be blank.
    pub fn schedule(&mut self, date: Option<&str>, time: Option<&str>) {
        let clean = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        self.scheduled_date = clean(date);
        self.scheduled_time = clean(time);
    }

    /// `YYYY-MM-DDTHH:MM`, only when both date and time are set.
    pub fn scheduled_at(&self) -> Option<String> {
        match (&self.scheduled_date, &self.scheduled_time) {
            (Some(date), Some(time)) => Some(format!("{}T{}", date, time)),
            _ => None,
        }
    }

    /// Whether the submit control should be enabled.
    pub fn is_submittable(&self) -> bool {
        !self.title.trim().is_empty() && !self.participants.is_empty()
    }

    /// Validate and produce the insert payload.
    pub fn build(&self) -> Result<NewConversation> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ConvoError::Validation(
                "Conversation title is required".to_string(),
            ));
        }
        if self.participants.is_empty() {
            return Err(ConvoError::Validation(
                "At least one participant is required".to_string(),
            ));
        }
        let description = self.description.trim();
        Ok(NewConversation {
            title: title.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            participants: self.participants.clone(),
            topics: self.topics.clone(),
            scheduled_date: self.scheduled_at(),
        })
    }

    /// Reset the form after a successful submit, keeping the pinned owner.
    pub fn clear(&mut self) {
        let owner = if self.owner_pinned {
            self.participants.first().cloned()
        } else {
            None
        };
        *self = match owner {
            Some(name) => Self::for_owner(&name),
            None => Self::new(),
        };
    }
}

/// Validated payload for creating a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConversation {
    pub title: String,
    pub description: Option<String>,
    pub participants: Vec<String>,
    pub topics: Vec<Topic>,
    pub scheduled_date: Option<String>,
}

/// Row shape sent to the `conversations` collection on insert.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationInsert<'a> {
    pub user_id: Uuid,
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    pub participants: &'a [String],
    pub topics: &'a [Topic],
    pub responses: &'a [Response],
    pub images: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<&'a str>,
}

impl NewConversation {
    /// Borrow this payload as an insert row for `user_id`.
    pub fn as_insert(&self, user_id: Uuid) -> ConversationInsert<'_> {
        ConversationInsert {
            user_id,
            title: &self.title,
            description: self.description.as_deref(),
            participants: &self.participants,
            topics: &self.topics,
            responses: &[],
            images: &[],
            scheduled_date: self.scheduled_date.as_deref(),
        }
    }
}
