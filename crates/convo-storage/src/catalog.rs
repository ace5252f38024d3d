//! The signed-in user's conversation list.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use convo_core::confirm::Confirm;
use convo_core::draft::NewConversation;
use convo_core::error::{ConvoError, Result};
use convo_core::events::NoticeBus;
use convo_core::types::{Conversation, ConversationId};

use crate::store::DocumentStore;

pub const DELETE_CONVERSATION_PROMPT: &str = "Are you sure you want to delete this conversation?";

/// Number of conversations shown on the home view.
pub const RECENT_LIMIT: usize = 3;

/// Conversations loaded from the store, newest first, plus the one that is
/// currently open.
pub struct ConversationCatalog {
    store: Arc<dyn DocumentStore>,
    notices: NoticeBus,
    conversations: Vec<Conversation>,
    open: Option<ConversationId>,
}

impl ConversationCatalog {
    pub fn new(store: Arc<dyn DocumentStore>, notices: NoticeBus) -> Self {
        Self {
            store,
            notices,
            conversations: Vec::new(),
            open: None,
        }
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    /// Reload from the store. Rows that do not decode are skipped.
    ///
    /// On failure the current list is kept and an error notice is published.
    pub async fn refresh(&mut self) -> Result<()> {
        let rows = match self.store.list_conversations().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Loading conversations failed");
                self.notices.error("Failed to load conversations");
                return Err(e);
            }
        };

        let total = rows.len();
        let mut conversations = Vec::with_capacity(total);
        for row in rows {
            let id = row
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("<missing>")
                .to_string();
            match Conversation::decode(row) {
                Ok(conversation) => conversations.push(conversation),
                Err(e) => warn!(conversation_id = %id, error = %e, "Skipping malformed conversation row"),
            }
        }
        conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        info!(loaded = conversations.len(), skipped = total - conversations.len(), "Conversations refreshed");
        self.conversations = conversations;
        if let Some(open) = self.open {
            if self.get(open).is_none() {
                self.open = None;
            }
        }
        Ok(())
    }

    pub fn list(&self) -> &[Conversation] {
        &self.conversations
    }

    /// The `n` most recently created conversations.
    pub fn recent(&self, n: usize) -> &[Conversation] {
        &self.conversations[..n.min(self.conversations.len())]
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Mark `id` as the open conversation.
    pub fn open(&mut self, id: ConversationId) -> Result<&Conversation> {
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ConvoError::not_found("conversation", id))?;
        self.open = Some(id);
        Ok(&self.conversations[index])
    }

    pub fn close(&mut self) {
        self.open = None;
    }

    pub fn open_conversation(&self) -> Option<&Conversation> {
        self.open.and_then(|id| self.get(id))
    }

    /// Insert a new conversation owned by `user_id` and reload.
    pub async fn create(&mut self, user_id: Uuid, conversation: &NewConversation) -> Result<()> {
        if let Err(e) = self
            .store
            .insert_conversation(&conversation.as_insert(user_id))
            .await
        {
            warn!(error = %e, title = %conversation.title, "Creating conversation failed");
            self.notices.error("Failed to create conversation");
            return Err(e);
        }

        info!(title = %conversation.title, "Conversation created");
        self.notices.success("Conversation created successfully");
        // A failed reload already published its own notice.
        let _ = self.refresh().await;
        Ok(())
    }

    /// Delete a conversation after confirmation.
    ///
    /// Returns `Ok(false)` when the user declines; nothing is touched then.
    pub async fn delete(&mut self, id: ConversationId, confirm: &dyn Confirm) -> Result<bool> {
        if self.get(id).is_none() {
            return Err(ConvoError::not_found("conversation", id));
        }
        if !confirm.confirm(DELETE_CONVERSATION_PROMPT).await {
            info!(conversation_id = %id, "Conversation delete declined");
            return Ok(false);
        }

        if let Err(e) = self.store.delete_conversation(id).await {
            warn!(conversation_id = %id, error = %e, "Deleting conversation failed");
            self.notices.error("Failed to delete conversation");
            return Err(e);
        }

        self.conversations.retain(|c| c.id != id);
        if self.open == Some(id) {
            self.open = None;
        }
        info!(conversation_id = %id, "Conversation deleted");
        self.notices.success("Conversation deleted");
        // A failed reload already published its own notice.
        let _ = self.refresh().await;
        Ok(true)
    }

    /// Swap in an updated copy of a conversation (e.g. after a session
    /// changed its responses). Unknown ids are ignored.
    pub fn replace(&mut self, conversation: Conversation) -> bool {
        match self.conversations.iter_mut().find(|c| c.id == conversation.id) {
            Some(slot) => {
                *slot = conversation;
                true
            }
            None => false,
        }
    }
}
