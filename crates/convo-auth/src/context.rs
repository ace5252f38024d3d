//! Explicit auth session context.
//!
//! Views hold a [`SessionSubscription`] while they are mounted and drop it
//! (or call `unsubscribe`) when they go away. Nothing global.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use convo_core::error::Result;

use crate::provider::{AuthProvider, AuthSession, AuthUser};

/// Current auth session plus change notification.
#[derive(Clone)]
pub struct SessionContext {
    provider: Arc<dyn AuthProvider>,
    tx: Arc<watch::Sender<Option<AuthSession>>>,
}

impl SessionContext {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            provider,
            tx: Arc::new(tx),
        }
    }

    pub fn provider(&self) -> Arc<dyn AuthProvider> {
        Arc::clone(&self.provider)
    }

    /// Retrieve the provider's current session and publish it.
    pub async fn init(&self) -> Result<Option<AuthSession>> {
        let session = self.provider.current_session().await?;
        info!(authenticated = session.is_some(), "Auth session initialised");
        self.set(session.clone());
        Ok(session)
    }

    /// Publish a new session (or `None` after sign-out).
    pub fn set(&self, session: Option<AuthSession>) {
        self.tx.send_replace(session);
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.tx.borrow().clone()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.tx.borrow().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Observe session changes until the subscription is dropped.
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Sign out and tell every subscriber the session is gone.
    ///
    /// Subscribers see `None` even when the provider call fails.
    pub async fn teardown(&self) -> Result<()> {
        let result = self.provider.sign_out().await;
        if let Err(e) = &result {
            warn!(error = %e, "Sign-out failed; clearing local session anyway");
        }
        self.set(None);
        info!("Auth session torn down");
        result
    }
}

/// Handle for observing auth session changes.
#[derive(Debug)]
pub struct SessionSubscription {
    rx: watch::Receiver<Option<AuthSession>>,
}

impl SessionSubscription {
    /// Wait for the next change. Returns `None` once the context is gone.
    pub async fn changed(&mut self) -> Option<Option<AuthSession>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Whether a change arrived that has not been observed yet.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.rx.borrow().clone()
    }

    pub fn unsubscribe(self) {}
}
