//! Session state machine.
//!
//! Valid transitions:
//! - Idle -> TopicSelected (pick a topic)
//! - TopicSelected -> Idle (clear the topic)
//! - TopicSelected -> Recording (start capture)
//! - Recording -> TopicSelected (stop, or capture error)
//! - TopicSelected -> Saving (analysis + persistence in flight)
//! - Saving -> TopicSelected (save finished, successfully or not)

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use convo_core::error::ConvoError;

/// Operational state of a conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No topic selected.
    Idle,
    /// Topic selected; speaker, recipients and the response are editable.
    TopicSelected,
    /// Live capture active.
    Recording,
    /// Key-point analysis and persistence in flight.
    Saving,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::TopicSelected => write!(f, "TopicSelected"),
            SessionState::Recording => write!(f, "Recording"),
            SessionState::Saving => write!(f, "Saving"),
        }
    }
}

impl SessionState {
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Idle, SessionState::TopicSelected)
                | (SessionState::TopicSelected, SessionState::Idle)
                | (SessionState::TopicSelected, SessionState::Recording)
                | (SessionState::Recording, SessionState::TopicSelected)
                | (SessionState::TopicSelected, SessionState::Saving)
                | (SessionState::Saving, SessionState::TopicSelected)
        )
    }
}

/// Shared, validated session state.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<SessionState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Idle)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn current(&self) -> SessionState {
        *self.lock()
    }

    /// Move to `target`, or fail with `ConvoError::InvalidState`.
    pub fn transition(&self, target: SessionState) -> Result<(), ConvoError> {
        let mut state = self.lock();
        if state.can_transition_to(&target) {
            tracing::debug!("Session state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(ConvoError::InvalidState(format!(
                "Invalid state transition: {} -> {}",
                *state, target
            )))
        }
    }

    /// Force `target` regardless of the current state (error recovery).
    pub fn force(&self, target: SessionState) {
        let mut state = self.lock();
        if *state != target {
            tracing::warn!("Session state forced: {} -> {}", *state, target);
            *state = target;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
