use thiserror::Error;

/// Top-level error type for the Convo system.
///
/// Validation errors are raised before any remote call. Remote-call errors
/// (`Auth`, `Storage`, `Analysis`, `Timeout`) come from the backend or the
/// summarization API. `Device` covers microphone and transcription failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConvoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Share error: {0}")]
    Share(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Timed out after {secs}s: {operation}")]
    Timeout { operation: String, secs: u64 },

    #[error("Cancelled by user")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ConvoError {
    /// Shorthand for a missing record of the given kind.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        ConvoError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// True for errors raised by an external collaborator (backend, auth
    /// provider, summarization API), as opposed to local validation.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ConvoError::Auth(_)
                | ConvoError::Storage(_)
                | ConvoError::Analysis(_)
                | ConvoError::Timeout { .. }
        )
    }
}

impl From<toml::de::Error> for ConvoError {
    fn from(err: toml::de::Error) -> Self {
        ConvoError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ConvoError {
    fn from(err: toml::ser::Error) -> Self {
        ConvoError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ConvoError {
    fn from(err: serde_json::Error) -> Self {
        ConvoError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Convo operations.
pub type Result<T> = std::result::Result<T, ConvoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConvoError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(ConvoError, &str)> = vec![
            (
                ConvoError::Validation("title is required".into()),
                "Validation error: title is required",
            ),
            (
                ConvoError::Auth("invalid login".into()),
                "Authentication error: invalid login",
            ),
            (
                ConvoError::Storage("row not updated".into()),
                "Storage error: row not updated",
            ),
            (
                ConvoError::Analysis("quota".into()),
                "Analysis error: quota",
            ),
            (
                ConvoError::Device("microphone denied".into()),
                "Device error: microphone denied",
            ),
            (
                ConvoError::Share("no clipboard".into()),
                "Share error: no clipboard",
            ),
            (
                ConvoError::not_found("Response", "abc"),
                "Response not found: abc",
            ),
            (
                ConvoError::InvalidState("Saving".into()),
                "Invalid state: Saving",
            ),
            (
                ConvoError::Timeout {
                    operation: "save response".into(),
                    secs: 30,
                },
                "Timed out after 30s: save response",
            ),
            (ConvoError::Cancelled, "Cancelled by user"),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_is_remote() {
        assert!(ConvoError::Storage("x".into()).is_remote());
        assert!(ConvoError::Auth("x".into()).is_remote());
        assert!(ConvoError::Timeout {
            operation: "x".into(),
            secs: 1
        }
        .is_remote());
        assert!(!ConvoError::Validation("x".into()).is_remote());
        assert!(!ConvoError::Device("x".into()).is_remote());
        assert!(!ConvoError::Cancelled.is_remote());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ConvoError = io_err.into();
        assert!(matches!(err, ConvoError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let convo_err: ConvoError = err.unwrap_err().into();
        assert!(matches!(convo_err, ConvoError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let convo_err: ConvoError = err.unwrap_err().into();
        assert!(matches!(convo_err, ConvoError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let parsed: serde_json::Value = serde_json::from_str("[1, 2]")?;
            Ok(parsed.to_string())
        }

        assert_eq!(inner().unwrap(), "[1,2]");
    }
}
