//! Error types for BiasLab

/// Result type alias using BiasLab's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for BiasLab operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The bias classifier could not score a batch. Fatal to the request.
    #[error("classifier unavailable: {0}")]
    Classifier(String),

    /// Attributions could not be computed for a sentence. Recoverable.
    #[error("explanation unavailable: {0}")]
    Explanation(String),

    /// Image or video scoring errors
    #[error("media error: {0}")]
    Media(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout errors
    #[error("operation timed out")]
    Timeout,

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new explanation error
    pub fn explanation(msg: impl Into<String>) -> Self {
        Self::Explanation(msg.into())
    }

    /// Create a new media error
    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the request can still produce output after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Explanation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_explanation_errors_are_recoverable() {
        assert!(Error::explanation("shape mismatch").is_recoverable());
        assert!(!Error::classifier("model offline").is_recoverable());
        assert!(!Error::Timeout.is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::classifier("weights missing").to_string(),
            "classifier unavailable: weights missing"
        );
        assert_eq!(
            Error::config("batch_size must be positive").to_string(),
            "configuration error: batch_size must be positive"
        );
    }
}
