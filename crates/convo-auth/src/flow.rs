//! Sign-in, sign-up, password reset and sign-out as the user sees them.

use std::sync::Arc;

use tracing::{info, warn};

use convo_core::config::AuthConfig;
use convo_core::error::{ConvoError, Result};
use convo_core::events::NoticeBus;
use convo_core::types::Profile;
use convo_storage::DocumentStore;

use crate::context::SessionContext;
use crate::form::{validate_reset_email, AuthForm, AuthMode};
use crate::provider::AuthSession;

/// Orchestrates the credential forms against the provider and the store.
///
/// Validation errors are returned without a notice (they are shown inline);
/// remote errors are returned and also published as notices.
pub struct AuthFlow {
    context: SessionContext,
    store: Arc<dyn DocumentStore>,
    notices: NoticeBus,
    config: AuthConfig,
}

impl AuthFlow {
    pub fn new(
        context: SessionContext,
        store: Arc<dyn DocumentStore>,
        notices: NoticeBus,
        config: AuthConfig,
    ) -> Self {
        Self {
            context,
            store,
            notices,
            config,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Submit the form in whichever mode it is in.
    pub async fn submit(&self, form: &AuthForm) -> Result<Option<AuthSession>> {
        match form.mode {
            AuthMode::SignIn => self.sign_in(form).await.map(Some),
            AuthMode::SignUp => self.sign_up(form).await,
        }
    }

    pub async fn sign_in(&self, form: &AuthForm) -> Result<AuthSession> {
        form.validate(self.config.min_password_len)?;

        let session = self
            .context
            .provider()
            .sign_in(form.email(), form.password())
            .await
            .inspect_err(|e| self.remote_failure(e))?;

        self.context.set(Some(session.clone()));
        self.notices.success("Welcome back!");
        Ok(session)
    }

    /// Create the account, then its profile row.
    ///
    /// Returns the session when the provider signed the user in right away.
    pub async fn sign_up(&self, form: &AuthForm) -> Result<Option<AuthSession>> {
        form.validate(self.config.min_password_len)?;

        let outcome = self
            .context
            .provider()
            .sign_up(form.email(), form.password(), form.full_name())
            .await
            .inspect_err(|e| self.remote_failure(e))?;

        let profile = Profile {
            id: outcome.user.id,
            full_name: form.full_name().to_string(),
            email: form.email().to_string(),
            created_at: None,
        };
        self.store
            .insert_profile(&profile)
            .await
            .inspect_err(|e| self.remote_failure(e))?;
        info!(user_id = %profile.id, "Profile created");

        if outcome.session.is_some() {
            self.context.set(outcome.session.clone());
        }
        self.notices.success("Account created successfully!");
        Ok(outcome.session)
    }

    pub async fn reset_password(&self, email: &str) -> Result<()> {
        let email = validate_reset_email(email)?;
        let redirect = self.config.reset_redirect_url.as_deref();

        if let Err(e) = self.context.provider().reset_password(email, redirect).await {
            warn!(error = %e, "Password reset failed");
            self.notices.error("Failed to send reset instructions");
            return Err(e);
        }
        self.notices
            .success("Password reset instructions sent to your email");
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.context
            .teardown()
            .await
            .inspect_err(|e| self.remote_failure(e))
    }

    /// Display name of the signed-in user, used to pin the conversation owner.
    pub async fn owner_name(&self) -> Option<String> {
        let user = self.context.user()?;
        match self.store.get_profile(user.id).await {
            Ok(Some(profile)) => Some(profile.full_name),
            Ok(None) => user.full_name,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Loading profile failed");
                user.full_name
            }
        }
    }

    fn remote_failure(&self, err: &ConvoError) {
        warn!(error = %err, "Auth request failed");
        let message = match err {
            ConvoError::Auth(msg) | ConvoError::Storage(msg) => msg.clone(),
            other => other.to_string(),
        };
        self.notices.error(message);
    }
}
