//! Supabase GoTrue auth provider.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use convo_core::error::{ConvoError, Result};
use convo_storage::SupabaseClient;

use crate::provider::{AuthProvider, AuthSession, AuthUser, SignUpOutcome};

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

impl From<GoTrueUser> for AuthUser {
    fn from(user: GoTrueUser) -> Self {
        let full_name = user
            .user_metadata
            .get("full_name")
            .and_then(|v| v.as_str())
            .map(String::from);
        AuthUser {
            id: user.id,
            email: user.email,
            full_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: GoTrueUser,
}

impl From<GoTrueSession> for AuthSession {
    fn from(session: GoTrueSession) -> Self {
        AuthSession {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
            user: session.user.into(),
        }
    }
}

/// Sign-up answers with a session, or with the bare user when email
/// confirmation is pending.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(GoTrueSession),
    User(GoTrueUser),
}

/// Auth provider backed by the Supabase auth API.
///
/// Keeps the session in memory and mirrors its access token into the shared
/// [`SupabaseClient`], so store requests run as the signed-in user.
#[derive(Debug)]
pub struct SupabaseAuth {
    client: SupabaseClient,
    session: RwLock<Option<AuthSession>>,
}

impl SupabaseAuth {
    pub fn new(client: SupabaseClient) -> Self {
        Self {
            client,
            session: RwLock::new(None),
        }
    }

    fn store_session(&self, session: Option<AuthSession>) {
        self.client
            .set_access_token(session.as_ref().map(|s| s.access_token.clone()));
        if let Ok(mut slot) = self.session.write() {
            *slot = session;
        }
    }

    fn session(&self) -> Option<AuthSession> {
        self.session.read().ok().and_then(|s| s.clone())
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    #[instrument(skip(self, password, full_name))]
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<SignUpOutcome> {
        let builder = self.client.request(Method::POST, "auth/v1/signup").json(&json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        }));
        let response = self
            .client
            .execute("sign up", builder, ConvoError::Auth)
            .await?;
        let body: SignUpBody = response
            .json()
            .await
            .map_err(|e| ConvoError::Auth(format!("sign up: {}", e)))?;

        let outcome = match body {
            SignUpBody::Session(session) => {
                let session = AuthSession::from(session);
                self.store_session(Some(session.clone()));
                SignUpOutcome {
                    user: session.user.clone(),
                    session: Some(session),
                }
            }
            SignUpBody::User(user) => {
                info!("Sign-up pending email confirmation");
                SignUpOutcome {
                    user: user.into(),
                    session: None,
                }
            }
        };
        info!(user_id = %outcome.user.id, "User signed up");
        Ok(outcome)
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let builder = self
            .client
            .request_with_query(Method::POST, "auth/v1/token", &[("grant_type", "password")])?
            .json(&json!({ "email": email, "password": password }));
        let response = self
            .client
            .execute("sign in", builder, ConvoError::Auth)
            .await?;
        let session: GoTrueSession = response
            .json()
            .await
            .map_err(|e| ConvoError::Auth(format!("sign in: {}", e)))?;

        let session = AuthSession::from(session);
        self.store_session(Some(session.clone()));
        info!(user_id = %session.user.id, "User signed in");
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        if self.session().is_none() {
            return Ok(());
        }
        let result = self
            .client
            .execute(
                "sign out",
                self.client.request(Method::POST, "auth/v1/logout"),
                ConvoError::Auth,
            )
            .await;
        // The local session is dropped even if the server call failed.
        self.store_session(None);
        if let Err(e) = &result {
            warn!(error = %e, "Remote sign-out failed");
        }
        result.map(|_| ())
    }

    async fn current_session(&self) -> Result<Option<AuthSession>> {
        let Some(session) = self.session() else {
            return Ok(None);
        };
        if session.expires_at.is_some_and(|at| at <= Utc::now()) {
            info!(user_id = %session.user.id, "Auth session expired");
            self.store_session(None);
            return Ok(None);
        }
        Ok(Some(session))
    }

    #[instrument(skip(self))]
    async fn reset_password(&self, email: &str, redirect_to: Option<&str>) -> Result<()> {
        let query: Vec<(&str, &str)> = redirect_to.map(|r| ("redirect_to", r)).into_iter().collect();
        let builder = self
            .client
            .request_with_query(Method::POST, "auth/v1/recover", &query)?
            .json(&json!({ "email": email }));
        self.client
            .execute("reset password", builder, ConvoError::Auth)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convo_core::config::BackendConfig;

    fn client() -> SupabaseClient {
        SupabaseClient::from_config(&BackendConfig {
            url: "https://demo.supabase.co".into(),
            anon_key: "anon".into(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_decode_session() {
        let body = json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": {
                "id": "33333333-3333-4333-8333-333333333333",
                "email": "alice@example.com",
                "user_metadata": { "full_name": "Alice" }
            }
        });
        let session: AuthSession = serde_json::from_value::<GoTrueSession>(body).unwrap().into();
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.user.full_name.as_deref(), Some("Alice"));
        assert!(session.expires_at.unwrap() > Utc::now());
    }

    #[test]
    fn test_sign_up_body_variants() {
        let user_only = json!({
            "id": "33333333-3333-4333-8333-333333333333",
            "email": "alice@example.com"
        });
        assert!(matches!(
            serde_json::from_value::<SignUpBody>(user_only).unwrap(),
            SignUpBody::User(_)
        ));

        let with_session = json!({
            "access_token": "jwt",
            "user": { "id": "33333333-3333-4333-8333-333333333333" }
        });
        assert!(matches!(
            serde_json::from_value::<SignUpBody>(with_session).unwrap(),
            SignUpBody::Session(_)
        ));
    }

    #[tokio::test]
    async fn test_session_token_is_mirrored_into_client() {
        let shared = client();
        let auth = SupabaseAuth::new(shared.clone());
        let session = AuthSession {
            access_token: "user-jwt".into(),
            refresh_token: None,
            expires_at: None,
            user: AuthUser {
                id: Uuid::new_v4(),
                email: None,
                full_name: None,
            },
        };

        auth.store_session(Some(session.clone()));
        assert_eq!(shared.access_token().as_deref(), Some("user-jwt"));
        assert_eq!(auth.current_session().await.unwrap(), Some(session));

        auth.store_session(None);
        assert!(shared.access_token().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_dropped() {
        let shared = client();
        let auth = SupabaseAuth::new(shared.clone());
        auth.store_session(Some(AuthSession {
            access_token: "old".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() - Duration::seconds(5)),
            user: AuthUser {
                id: Uuid::new_v4(),
                email: None,
                full_name: None,
            },
        }));

        assert!(auth.current_session().await.unwrap().is_none());
        assert!(shared.access_token().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_local() {
        let auth = SupabaseAuth::new(client());
        assert!(auth.sign_out().await.is_ok());
    }
}
