use thiserror::Error;

/// Errors from the generative-language layer.
///
/// These never reach callers of the extractor; they only decide which
/// degenerate result it returns.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("no API key configured")]
    MissingCredential,
    #[error("http error: {0}")]
    Http(String),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("model returned no text")]
    EmptyResponse,
    #[error("timed out after {0}s")]
    Timeout(u64),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            LlmError::MissingCredential.to_string(),
            "no API key configured"
        );
        assert_eq!(
            LlmError::Api {
                status: 500,
                message: "boom".into()
            }
            .to_string(),
            "api error (500): boom"
        );
        assert_eq!(LlmError::Timeout(30).to_string(), "timed out after 30s");
        assert_eq!(
            LlmError::EmptyResponse.to_string(),
            "model returned no text"
        );
    }

    #[test]
    fn test_error_is_debug() {
        let debug = format!("{:?}", LlmError::RateLimited("slow down".into()));
        assert!(debug.contains("RateLimited"));
    }
}
