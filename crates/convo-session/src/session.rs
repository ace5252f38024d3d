//! Recording and saving responses against one topic of a conversation.
//!
//! `ConversationSession` owns a copy of the conversation while its view is
//! open. Every mutation of the response list goes to the store first and is
//! applied locally only once the store accepted it, so local and persisted
//! state never diverge.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use convo_core::config::SessionConfig;
use convo_core::confirm::Confirm;
use convo_core::error::{ConvoError, Result};
use convo_core::events::NoticeBus;
use convo_core::types::{join_recipients, Conversation, Response, ResponseId, TopicId};
use convo_insight::{group_by_topic, key_point_rollup, KeyPointExtractor, MeetingSummary, SHARE_TITLE};
use convo_storage::DocumentStore;

use crate::devices::{SessionDevices, TranscriptEvent};
use crate::state::{SessionState, StateMachine};

/// Prompt shown before a response is deleted.
pub const DELETE_RESPONSE_PROMPT: &str = "Are you sure you want to delete this response?";

const RECORDING_FAILED: &str =
    "Could not start recording. Please check your microphone permissions.";
const RECOGNITION_FAILED: &str = "Speech recognition error. Please try again.";

/// How an exported summary left the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    /// Handed to the native share sheet.
    Shared,
    /// Copied to the clipboard.
    Copied,
}

/// One row of the topic picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicEntry {
    pub id: TopicId,
    pub content: String,
    pub response_count: usize,
}

/// Live state of one open conversation.
pub struct ConversationSession {
    conversation: Conversation,
    store: Arc<dyn DocumentStore>,
    extractor: KeyPointExtractor,
    devices: SessionDevices,
    notices: NoticeBus,
    config: SessionConfig,
    state: StateMachine,
    selected_topic: Option<TopicId>,
    speaker: Option<String>,
    recipients: Vec<String>,
    compose: String,
    interim: String,
    transcript: Option<mpsc::Receiver<TranscriptEvent>>,
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("conversation_id", &self.conversation.id)
            .field("state", &self.state.current())
            .field("selected_topic", &self.selected_topic)
            .field("speaker", &self.speaker)
            .field("recipients", &self.recipients)
            .field("compose_len", &self.compose.len())
            .finish()
    }
}

impl ConversationSession {
    pub fn new(
        conversation: Conversation,
        store: Arc<dyn DocumentStore>,
        extractor: KeyPointExtractor,
        devices: SessionDevices,
        notices: NoticeBus,
        config: SessionConfig,
    ) -> Self {
        info!(
            conversation_id = %conversation.id,
            responses = conversation.responses.len(),
            "Conversation session opened"
        );
        Self {
            conversation,
            store,
            extractor,
            devices,
            notices,
            config,
            state: StateMachine::new(),
            selected_topic: None,
            speaker: None,
            recipients: Vec::new(),
            compose: String::new(),
            interim: String::new(),
            transcript: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn selected_topic(&self) -> Option<TopicId> {
        self.selected_topic
    }

    pub fn speaker(&self) -> Option<&str> {
        self.speaker.as_deref()
    }

    /// Selected recipients in roster order. Empty means everyone.
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// The response being composed.
    pub fn compose(&self) -> &str {
        &self.compose
    }

    /// Latest partial transcript; display only.
    pub fn interim(&self) -> &str {
        &self.interim
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn select_topic(&mut self, topic_id: TopicId) -> Result<()> {
        self.ensure_editable("select a topic")?;
        if self.conversation.topic(topic_id).is_none() {
            return Err(ConvoError::not_found("topic", topic_id));
        }
        if self.state.current() == SessionState::Idle {
            self.state.transition(SessionState::TopicSelected)?;
        }
        self.selected_topic = Some(topic_id);
        debug!(topic_id = %topic_id, "Topic selected");
        Ok(())
    }

    pub fn clear_topic(&mut self) -> Result<()> {
        self.state.transition(SessionState::Idle)?;
        self.selected_topic = None;
        Ok(())
    }

    /// Choose who is speaking. The speaker is dropped from the recipients.
    pub fn select_speaker(&mut self, name: &str) -> Result<()> {
        self.ensure_editable("change the speaker")?;
        let name = self.participant(name)?;
        self.recipients.retain(|r| *r != name);
        self.speaker = Some(name);
        Ok(())
    }

    /// Add or remove a recipient. Returns whether `name` is now selected.
    pub fn toggle_recipient(&mut self, name: &str) -> Result<bool> {
        self.ensure_editable("change the recipients")?;
        let name = self.participant(name)?;
        if self.speaker.as_deref() == Some(name.as_str()) {
            return Err(ConvoError::Validation(
                "The speaker cannot also be a recipient".to_string(),
            ));
        }
        if let Some(pos) = self.recipients.iter().position(|r| *r == name) {
            self.recipients.remove(pos);
            return Ok(false);
        }
        self.recipients.push(name);
        let roster = &self.conversation.participants;
        self.recipients
            .sort_by_key(|r| roster.iter().position(|p| p == r).unwrap_or(usize::MAX));
        Ok(true)
    }

    /// Address the response to everyone.
    pub fn clear_recipients(&mut self) {
        self.recipients.clear();
    }

    pub fn set_compose(&mut self, text: impl Into<String>) {
        self.compose = text.into();
    }

    fn participant(&self, name: &str) -> Result<String> {
        let name = name.trim();
        if self.conversation.has_participant(name) {
            Ok(name.to_string())
        } else {
            Err(ConvoError::Validation(format!(
                "{} is not a participant of this conversation",
                name
            )))
        }
    }

    fn ensure_editable(&self, action: &str) -> Result<()> {
        match self.state.current() {
            SessionState::Recording | SessionState::Saving => Err(ConvoError::InvalidState(
                format!("Cannot {} while {}", action, self.state.current()),
            )),
            SessionState::Idle | SessionState::TopicSelected => Ok(()),
        }
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Acquire the recognizer and the backup recorder together and begin
    /// appending finalized transcript segments to the compose buffer.
    pub async fn start_recording(&mut self) -> Result<()> {
        if self.speaker.is_none() {
            return Err(ConvoError::Validation(
                "Please select who is speaking first".to_string(),
            ));
        }
        if !self
            .state
            .current()
            .can_transition_to(&SessionState::Recording)
        {
            return Err(ConvoError::InvalidState(format!(
                "Cannot start recording while {}",
                self.state.current()
            )));
        }

        let recognizer = Arc::clone(&self.devices.recognizer);
        let recorder = Arc::clone(&self.devices.recorder);
        let (transcript, backup) = tokio::join!(recognizer.start(), recorder.start());

        let rx = match (transcript, backup) {
            (Ok(rx), Ok(())) => rx,
            (transcript, backup) => {
                if transcript.is_ok() {
                    if let Err(e) = recognizer.stop().await {
                        warn!(error = %e, "Releasing recognizer failed");
                    }
                }
                if backup.is_ok() {
                    if let Err(e) = recorder.stop().await {
                        warn!(error = %e, "Releasing recorder failed");
                    }
                }
                let err = match (transcript, backup) {
                    (Err(e), _) | (_, Err(e)) => e,
                    _ => ConvoError::Device(RECORDING_FAILED.to_string()),
                };
                warn!(error = %err, "Recording could not start");
                self.notices.error(RECORDING_FAILED);
                return Err(err);
            }
        };

        self.state.transition(SessionState::Recording)?;
        self.transcript = Some(rx);
        self.interim.clear();
        info!(
            conversation_id = %self.conversation.id,
            topic_id = ?self.selected_topic,
            speaker = ?self.speaker,
            "Recording started"
        );
        self.notices.info("Recording started");
        Ok(())
    }

    /// Apply every transcript event already delivered. Returns the number of
    /// final segments committed.
    pub async fn poll_transcript(&mut self) -> usize {
        let mut committed = 0;
        while let Some(event) = self.next_pending() {
            if self.apply(event).await {
                committed += 1;
            }
        }
        committed
    }

    /// Wait for the next transcript event and apply it.
    ///
    /// Returns `None` when nothing is recording or the stream ended.
    pub async fn await_transcript(&mut self) -> Option<TranscriptEvent> {
        let event = self.transcript.as_mut()?.recv().await;
        match event {
            Some(event) => {
                self.apply(event.clone()).await;
                Some(event)
            }
            None => {
                debug!("Transcript stream closed");
                self.transcript = None;
                None
            }
        }
    }

    /// Stop capture. Segments already delivered are committed first.
    pub async fn stop_recording(&mut self) -> Result<()> {
        if self.state.current() != SessionState::Recording {
            return Err(ConvoError::InvalidState(format!(
                "Cannot stop recording while {}",
                self.state.current()
            )));
        }
        self.poll_transcript().await;
        if self.state.current() != SessionState::Recording {
            // A recognizer error in the drained events already ended capture.
            return Ok(());
        }

        self.release_devices().await;
        self.state.transition(SessionState::TopicSelected)?;
        info!(compose_len = self.compose.len(), "Recording stopped");
        self.notices.info("Recording stopped");
        Ok(())
    }

    fn next_pending(&mut self) -> Option<TranscriptEvent> {
        let rx = self.transcript.as_mut()?;
        match rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                debug!("Transcript stream closed");
                self.transcript = None;
                None
            }
        }
    }

    /// Returns true when a final segment was committed.
    async fn apply(&mut self, event: TranscriptEvent) -> bool {
        match event {
            TranscriptEvent::Final(text) => {
                self.interim.clear();
                let text = text.trim();
                if text.is_empty() {
                    return false;
                }
                if !self.compose.is_empty() && !self.compose.ends_with(char::is_whitespace) {
                    self.compose.push(' ');
                }
                self.compose.push_str(text);
                true
            }
            TranscriptEvent::Interim(text) => {
                self.interim = text;
                false
            }
            TranscriptEvent::Error(message) => {
                warn!(error = %message, "Speech recognition failed");
                self.release_devices().await;
                self.state.force(SessionState::TopicSelected);
                self.notices.warning(RECOGNITION_FAILED);
                false
            }
        }
    }

    async fn release_devices(&mut self) {
        self.transcript = None;
        self.interim.clear();
        if let Err(e) = self.devices.recognizer.stop().await {
            warn!(error = %e, "Stopping recognizer failed");
        }
        match self.devices.recorder.stop().await {
            Ok(audio) => debug!(bytes = audio.len(), "Backup recording discarded"),
            Err(e) => warn!(error = %e, "Stopping recorder failed"),
        }
    }

    // =========================================================================
    // Save / delete
    // =========================================================================

    /// Analyze the composed text and persist it as a new response.
    ///
    /// The compose buffer survives any failure so the user can retry.
    pub async fn save_response(&mut self) -> Result<Response> {
        match self.state.current() {
            SessionState::Recording => {
                return Err(ConvoError::InvalidState(
                    "Stop recording before saving".to_string(),
                ))
            }
            SessionState::Saving => {
                return Err(ConvoError::InvalidState(
                    "A response is already being saved".to_string(),
                ))
            }
            SessionState::Idle | SessionState::TopicSelected => {}
        }
        let Some(topic_id) = self.selected_topic else {
            return Err(ConvoError::Validation(
                "Please select a topic first".to_string(),
            ));
        };
        let Some(speaker) = self.speaker.clone() else {
            return Err(ConvoError::Validation(
                "Please select who is speaking".to_string(),
            ));
        };
        let content = self.compose.trim().to_string();
        if content.is_empty() {
            return Err(ConvoError::Validation(
                "Response text is required".to_string(),
            ));
        }

        self.state.transition(SessionState::Saving)?;

        let key_points = self.extractor.extract(&content).await;
        let response = Response {
            id: Uuid::new_v4(),
            topic_id,
            content,
            timestamp: Utc::now(),
            key_points,
            speaker,
            participants: join_recipients(&self.recipients, &self.config.everyone_label),
        };

        let mut responses = self.conversation.responses.clone();
        responses.push(response.clone());

        if let Err(e) = self.persist("save response", &responses).await {
            warn!(
                conversation_id = %self.conversation.id,
                error = %e,
                "Saving response failed"
            );
            self.state.transition(SessionState::TopicSelected)?;
            self.notices.error("Failed to save response");
            return Err(e);
        }

        self.conversation.responses = responses;
        self.compose.clear();
        self.interim.clear();
        self.recipients.clear();
        self.state.transition(SessionState::TopicSelected)?;
        info!(
            conversation_id = %self.conversation.id,
            topic_id = %topic_id,
            response_id = %response.id,
            key_points = response.key_points.len(),
            "Response saved"
        );
        self.notices.success("Response saved and analyzed");
        Ok(response)
    }

    /// Delete one response after confirmation.
    ///
    /// Returns `Ok(false)` when the user declined. A store failure leaves the
    /// local list untouched.
    pub async fn delete_response(
        &mut self,
        response_id: ResponseId,
        confirm: &dyn Confirm,
    ) -> Result<bool> {
        if self.conversation.response(response_id).is_none() {
            return Err(ConvoError::not_found("response", response_id));
        }
        if !confirm.confirm(DELETE_RESPONSE_PROMPT).await {
            debug!(response_id = %response_id, "Response deletion declined");
            return Ok(false);
        }

        let responses: Vec<Response> = self
            .conversation
            .responses
            .iter()
            .filter(|r| r.id != response_id)
            .cloned()
            .collect();

        if let Err(e) = self.persist("delete response", &responses).await {
            warn!(response_id = %response_id, error = %e, "Deleting response failed");
            self.notices.error("Failed to delete response");
            return Err(e);
        }

        self.conversation.responses = responses;
        info!(response_id = %response_id, "Response deleted");
        self.notices.success("Response deleted");
        Ok(true)
    }

    async fn persist(&self, operation: &str, responses: &[Response]) -> Result<()> {
        let secs = self.config.save_timeout_secs.max(1);
        let update = self.store.update_responses(self.conversation.id, responses);
        match tokio::time::timeout(Duration::from_secs(secs), update).await {
            Ok(result) => result,
            Err(_) => Err(ConvoError::Timeout {
                operation: operation.to_string(),
                secs,
            }),
        }
    }

    // =========================================================================
    // Views and export
    // =========================================================================

    /// Responses of `topic_id`, oldest first.
    pub fn topic_responses(&self, topic_id: TopicId) -> Vec<&Response> {
        group_by_topic(&self.conversation.topics, &self.conversation.responses)
            .get(topic_id)
            .map(<[&Response]>::to_vec)
            .unwrap_or_default()
    }

    /// Topics with their response counts, in conversation order.
    pub fn topic_entries(&self) -> Vec<TopicEntry> {
        self.conversation
            .topics
            .iter()
            .map(|t| TopicEntry {
                id: t.id,
                content: t.content.clone(),
                response_count: self.conversation.response_count(t.id),
            })
            .collect()
    }

    /// De-duplicated key points of the selected topic.
    pub fn rollup(&self) -> Vec<String> {
        match self.selected_topic {
            Some(topic_id) => key_point_rollup(&self.topic_responses(topic_id)),
            None => Vec::new(),
        }
    }

    pub fn summary(&self) -> Option<MeetingSummary> {
        MeetingSummary::for_topic(&self.conversation, self.selected_topic?)
    }

    /// Export the selected topic's summary through the share sheet, falling
    /// back to the clipboard.
    pub async fn share_summary(&self) -> Result<ShareOutcome> {
        let Some(summary) = self.summary() else {
            return Err(ConvoError::Validation(
                "Please select a topic first".to_string(),
            ));
        };
        let text = summary.to_text();

        if self.devices.share.is_available() {
            match self.devices.share.share(SHARE_TITLE, &text).await {
                Ok(()) => {
                    info!(topic = %summary.title, "Summary shared");
                    return Ok(ShareOutcome::Shared);
                }
                Err(e) => warn!(error = %e, "Share sheet failed; copying instead"),
            }
        }

        match self.devices.clipboard.write_text(&text).await {
            Ok(()) => {
                self.notices.success("Summary copied to clipboard");
                Ok(ShareOutcome::Copied)
            }
            Err(e) => {
                warn!(error = %e, "Copying summary failed");
                self.notices.error("Failed to copy summary");
                Err(e)
            }
        }
    }

    /// End the session, releasing capture devices if still recording.
    pub async fn close(mut self) -> Conversation {
        if self.state.current() == SessionState::Recording {
            self.release_devices().await;
            self.state.force(SessionState::TopicSelected);
        }
        info!(conversation_id = %self.conversation.id, "Conversation session closed");
        self.conversation
    }
}

// =============================================================================
// Tests
// =============================================================================
