//! Error types for service-principal authentication.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while acquiring access tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// The token endpoint rejected the credentials.
    #[error("Token request rejected ({code}): {description}")]
    Rejected { code: String, description: String },

    /// The token endpoint returned something unexpected.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Network(e.to_string())
    }
}
