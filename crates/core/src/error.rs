//! Error types for the Stacks core crate.

use thiserror::Error;

/// Top-level error type for all Stacks operations.
#[derive(Debug, Error)]
pub enum StacksError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("harvest error: {0}")]
    Harvest(String),

    #[error("OAI-PMH error -- code: {code}, value: {message}")]
    Oai { code: String, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Coarse error category callers branch on without knowing which backend failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Deployment problem: missing driver, missing settings. Not retryable.
    Configuration,
    /// Connection failures, protocol mismatches, malformed responses.
    Technical,
    /// Wrong username/password; the user can correct it.
    InvalidCredentials,
    /// The active driver does not expose the requested operation.
    Unsupported,
}

impl StacksError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StacksError::Config(_) => ErrorKind::Configuration,
            StacksError::InvalidCredentials => ErrorKind::InvalidCredentials,
            StacksError::Unsupported(_) => ErrorKind::Unsupported,
            StacksError::Backend(_)
            | StacksError::Harvest(_)
            | StacksError::Oai { .. }
            | StacksError::Database(_)
            | StacksError::Io(_)
            | StacksError::Http(_)
            | StacksError::Serialization(_) => ErrorKind::Technical,
        }
    }

    /// Whether the end user can fix the failure by retrying with other input.
    pub fn is_user_correctable(&self) -> bool {
        self.kind() == ErrorKind::InvalidCredentials
    }
}

/// A convenience Result alias that defaults to [`StacksError`].
pub type Result<T> = std::result::Result<T, StacksError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = StacksError::Config("missing field".into());
        assert_eq!(err.to_string(), "configuration error: missing field");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = StacksError::from(io_err);
        assert!(matches!(err, StacksError::Io(_)));
        assert!(err.to_string().contains("file not found"));
        assert_eq!(err.kind(), ErrorKind::Technical);
    }

    #[test]
    fn oai_error_display() {
        let err = StacksError::Oai {
            code: "badArgument".into(),
            message: "Illegal argument".into(),
        };
        assert_eq!(
            err.to_string(),
            "OAI-PMH error -- code: badArgument, value: Illegal argument"
        );
        assert_eq!(err.kind(), ErrorKind::Technical);
    }

    #[test]
    fn invalid_credentials_is_user_correctable() {
        assert!(StacksError::InvalidCredentials.is_user_correctable());
        assert!(!StacksError::Backend("socket closed".into()).is_user_correctable());
        assert!(!StacksError::Config("no host".into()).is_user_correctable());
    }

    #[test]
    fn unsupported_kind() {
        let err = StacksError::Unsupported("placeHold".into());
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(err.to_string(), "unsupported operation: placeHold");
    }

    #[test]
    fn result_alias_works() {
        let ok: Result<i32> = Ok(42);
        assert!(ok.is_ok());

        let err: Result<i32> = Err(StacksError::Config("bad".into()));
        assert!(err.is_err());
    }
}
