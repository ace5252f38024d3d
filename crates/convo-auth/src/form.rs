//! Sign-in / sign-up form validation.

use convo_core::error::{ConvoError, Result};

/// Which variant of the credential form is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

/// Raw credential form input.
#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    pub full_name: String,
}

impl AuthForm {
    pub fn sign_in(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            mode: AuthMode::SignIn,
            email: email.into(),
            password: password.into(),
            full_name: String::new(),
        }
    }

    pub fn sign_up(
        full_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            mode: AuthMode::SignUp,
            email: email.into(),
            password: password.into(),
            full_name: full_name.into(),
        }
    }

    pub fn email(&self) -> &str {
        self.email.trim()
    }

    pub fn password(&self) -> &str {
        self.password.trim()
    }

    pub fn full_name(&self) -> &str {
        self.full_name.trim()
    }

    /// Check the form in the order the user sees the messages.
    pub fn validate(&self, min_password_len: usize) -> Result<()> {
        let invalid = |msg: &str| Err(ConvoError::Validation(msg.to_string()));

        if self.email().is_empty() || self.password().is_empty() {
            return invalid("Email and password are required");
        }
        if self.password.chars().count() < min_password_len {
            return Err(ConvoError::Validation(format!(
                "Password must be at least {} characters",
                min_password_len
            )));
        }
        if !self.email.contains('@') {
            return invalid("Please enter a valid email address");
        }
        if self.mode == AuthMode::SignUp && self.full_name().is_empty() {
            return invalid("Full name is required");
        }
        Ok(())
    }
}

/// Validate the email for a password-reset request.
pub fn validate_reset_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ConvoError::Validation(
            "Please enter your email address".to_string(),
        ));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: Result<()>) -> String {
        match result {
            Err(ConvoError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_required_fields() {
        let form = AuthForm::sign_in("  ", "secret1");
        assert_eq!(message(form.validate(6)), "Email and password are required");
        let form = AuthForm::sign_in("a@b.c", "   ");
        assert_eq!(message(form.validate(6)), "Email and password are required");
    }

    #[test]
    fn test_password_length() {
        let form = AuthForm::sign_in("a@b.c", "12345");
        assert_eq!(
            message(form.validate(6)),
            "Password must be at least 6 characters"
        );
        assert!(AuthForm::sign_in("a@b.c", "123456").validate(6).is_ok());
    }

    #[test]
    fn test_email_shape() {
        let form = AuthForm::sign_in("alice.example.com", "secret1");
        assert_eq!(
            message(form.validate(6)),
            "Please enter a valid email address"
        );
    }

    #[test]
    fn test_sign_up_requires_full_name() {
        let form = AuthForm::sign_up("  ", "alice@example.com", "secret1");
        assert_eq!(message(form.validate(6)), "Full name is required");
        let form = AuthForm::sign_up("Alice", "alice@example.com", "secret1");
        assert!(form.validate(6).is_ok());
        assert_eq!(form.mode, AuthMode::SignUp);
    }

    #[test]
    fn test_trimmed_accessors() {
        let form = AuthForm::sign_up(" Alice ", " alice@example.com ", " secret1 ");
        assert_eq!(form.full_name(), "Alice");
        assert_eq!(form.email(), "alice@example.com");
        assert_eq!(form.password(), "secret1");
    }

    #[test]
    fn test_reset_email() {
        assert!(validate_reset_email("  ").is_err());
        assert_eq!(validate_reset_email(" a@b.c ").unwrap(), "a@b.c");
    }
}
