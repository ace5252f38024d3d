//! Auth provider seam and the in-memory mock.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use convo_core::error::{ConvoError, Result};

/// Authenticated user as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    /// Display name from the sign-up metadata, when present.
    pub full_name: Option<String>,
}

/// A signed-in session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}

/// Result of a sign-up. The session is absent when the provider requires
/// email confirmation first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

/// Hosted authentication.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<SignUpOutcome>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;

    async fn sign_out(&self) -> Result<()>;

    /// The session currently held by the provider, if any.
    async fn current_session(&self) -> Result<Option<AuthSession>>;

    /// Send password-reset instructions to `email`.
    async fn reset_password(&self, email: &str, redirect_to: Option<&str>) -> Result<()>;
}

// =============================================================================
// Mock implementation
// =============================================================================

#[derive(Debug, Default)]
struct MockState {
    accounts: HashMap<String, (String, AuthUser)>,
    session: Option<AuthSession>,
    resets: Vec<String>,
    fail_remote: bool,
}

/// Provider that keeps accounts in memory. Sign-up signs the user in
/// immediately.
#[derive(Debug, Default)]
pub struct MockAuthProvider {
    state: Mutex<MockState>,
}

impl MockAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account without going through `sign_up`.
    pub fn with_account(self, email: &str, password: &str, full_name: &str) -> Self {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            full_name: Some(full_name.to_string()),
        };
        self.with_state(|s| {
            s.accounts
                .insert(email.to_string(), (password.to_string(), user));
        });
        self
    }

    /// Start with `user` already signed in.
    pub fn signed_in_as(self, user: AuthUser) -> Self {
        self.with_state(|s| s.session = Some(Self::session_for(user)));
        self
    }

    /// Make every remote operation fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.with_state(|s| s.fail_remote = unavailable);
    }

    /// Emails that requested a password reset.
    pub fn reset_requests(&self) -> Vec<String> {
        self.with_state(|s| s.resets.clone())
    }

    pub fn user_id(&self, email: &str) -> Option<Uuid> {
        self.with_state(|s| s.accounts.get(email).map(|(_, u)| u.id))
    }

    fn session_for(user: AuthUser) -> AuthSession {
        AuthSession {
            access_token: format!("mock-token-{}", user.id),
            refresh_token: None,
            expires_at: None,
            user,
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn check_available(&self) -> Result<()> {
        if self.with_state(|s| s.fail_remote) {
            return Err(ConvoError::Auth("Auth service unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<SignUpOutcome> {
        self.check_available()?;
        self.with_state(|s| {
            if s.accounts.contains_key(email) {
                return Err(ConvoError::Auth("User already registered".to_string()));
            }
            let user = AuthUser {
                id: Uuid::new_v4(),
                email: Some(email.to_string()),
                full_name: Some(full_name.to_string()),
            };
            s.accounts
                .insert(email.to_string(), (password.to_string(), user.clone()));
            let session = Self::session_for(user.clone());
            s.session = Some(session.clone());
            Ok(SignUpOutcome {
                user,
                session: Some(session),
            })
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.check_available()?;
        self.with_state(|s| match s.accounts.get(email) {
            Some((stored, user)) if stored == password => {
                let session = Self::session_for(user.clone());
                s.session = Some(session.clone());
                Ok(session)
            }
            _ => Err(ConvoError::Auth("Invalid login credentials".to_string())),
        })
    }

    async fn sign_out(&self) -> Result<()> {
        self.with_state(|s| s.session = None);
        self.check_available()
    }

    async fn current_session(&self) -> Result<Option<AuthSession>> {
        self.check_available()?;
        Ok(self.with_state(|s| s.session.clone()))
    }

    async fn reset_password(&self, email: &str, _redirect_to: Option<&str>) -> Result<()> {
        self.check_available()?;
        self.with_state(|s| s.resets.push(email.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let provider = MockAuthProvider::new();
        let outcome = provider
            .sign_up("alice@example.com", "secret1", "Alice")
            .await
            .unwrap();
        assert_eq!(outcome.user.full_name.as_deref(), Some("Alice"));
        assert!(outcome.session.is_some());

        provider.sign_out().await.unwrap();
        assert!(provider.current_session().await.unwrap().is_none());

        let session = provider.sign_in("alice@example.com", "secret1").await.unwrap();
        assert_eq!(session.user.id, outcome.user.id);
        assert!(provider.current_session().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let provider = MockAuthProvider::new().with_account("a@b.c", "secret1", "A");
        let err = provider.sign_in("a@b.c", "nope").await.unwrap_err();
        assert!(matches!(err, ConvoError::Auth(_)));
    }

    #[tokio::test]
    async fn test_duplicate_sign_up() {
        let provider = MockAuthProvider::new().with_account("a@b.c", "secret1", "A");
        assert!(provider.sign_up("a@b.c", "secret1", "A").await.is_err());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let provider = MockAuthProvider::new();
        provider.set_unavailable(true);
        assert!(provider.current_session().await.is_err());
        assert!(provider.reset_password("a@b.c", None).await.is_err());
        assert!(provider.reset_requests().is_empty());
    }
}
