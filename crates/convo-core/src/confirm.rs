//! Confirmation seam for destructive operations.
//!
//! Deleting a conversation or a response never mutates state until the user
//! has answered a prompt affirmatively.

use async_trait::async_trait;

/// Asks the user a yes/no question.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Returns `true` only on an affirmative answer.
    async fn confirm(&self, prompt: &str) -> bool;
}

/// A fixed answer, for non-interactive callers that already collected
/// consent (e.g. a `--yes` flag).
#[derive(Debug, Clone, Copy)]
pub struct PresetAnswer(pub bool);

#[async_trait]
impl Confirm for PresetAnswer {
    async fn confirm(&self, prompt: &str) -> bool {
        tracing::debug!(prompt, answer = self.0, "Preset confirmation");
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_preset_answer() {
        assert!(PresetAnswer(true).confirm("Delete?").await);
        assert!(!PresetAnswer(false).confirm("Delete?").await);
    }
}
