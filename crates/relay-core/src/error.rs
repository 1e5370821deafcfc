//! Core error types for relay.

/// Core error type for all relay operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Handoff error: {message}")]
    Handoff { message: String },

    #[error("Template render error: {message}")]
    Template { message: String },

    #[error("Invalid action arguments: {message}")]
    Argument { message: String },

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] relay_local_db::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    /// Create a new session-related error.
    pub fn session<S: Into<String>>(message: S) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create a new handoff-related error.
    pub fn handoff<S: Into<String>>(message: S) -> Self {
        Self::Handoff {
            message: message.into(),
        }
    }

    /// Create a new template rendering error.
    pub fn template<S: Into<String>>(message: S) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create a new argument validation error.
    pub fn argument<S: Into<String>>(message: S) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }

    /// Create a new generic error.
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        Self::template(err.to_string())
    }
}
