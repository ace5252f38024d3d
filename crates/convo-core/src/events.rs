//! User-visible notices.
//!
//! Every remote-call failure, device failure and completed user action
//! produces a short transient notice. Notices are logged through `tracing`
//! and fanned out on a broadcast channel to whatever view is rendering them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Severity of a notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeLevel::Success => write!(f, "success"),
            NoticeLevel::Info => write!(f, "info"),
            NoticeLevel::Warning => write!(f, "warning"),
            NoticeLevel::Error => write!(f, "error"),
        }
    }
}

/// A transient user-visible notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast bus for notices. Cloning shares the same channel.
#[derive(Clone, Debug)]
pub struct NoticeBus {
    tx: broadcast::Sender<Notice>,
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl NoticeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to notices published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Publish a notice. Having no subscribers is not an error.
    pub fn publish(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::error!(notice = %notice.message, "User notice"),
            NoticeLevel::Warning => tracing::warn!(notice = %notice.message, "User notice"),
            NoticeLevel::Success | NoticeLevel::Info => {
                tracing::info!(notice = %notice.message, "User notice")
            }
        }
        let _ = self.tx.send(notice);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(Notice::new(NoticeLevel::Success, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(Notice::new(NoticeLevel::Info, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.publish(Notice::new(NoticeLevel::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(Notice::new(NoticeLevel::Error, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_display() {
        assert_eq!(NoticeLevel::Success.to_string(), "success");
        assert_eq!(NoticeLevel::Error.to_string(), "error");
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = NoticeBus::default();
        let mut rx = bus.subscribe();

        bus.error("Failed to save response");
        bus.success("Response deleted");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.level, NoticeLevel::Error);
        assert_eq!(first.message, "Failed to save response");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.level, NoticeLevel::Success);
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = NoticeBus::new(0);
        bus.info("nobody is listening");
    }

    #[test]
    fn test_clones_share_channel() {
        let bus = NoticeBus::default();
        let mut rx = bus.subscribe();
        bus.clone().warning("shared");
        assert_eq!(rx.try_recv().unwrap().message, "shared");
    }
}
