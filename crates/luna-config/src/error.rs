//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and secret resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// No `[workspace]` section in any loaded layer.
    #[error("no workspace configured; add a [workspace] section to luna.toml")]
    NoWorkspace,

    /// Missing required field.
    #[error("missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    /// Secret not found through any resolution method.
    #[error(
        "secret '{name}' not found. Set via keyring (service 'luna'), env var ({env_var}), or the [secrets] table"
    )]
    SecretNotFound { name: String, env_var: String },
}
