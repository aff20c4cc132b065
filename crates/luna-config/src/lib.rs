//! Configuration system for the Luna AML operations adapter.
//!
//! Provides TOML-based configuration with:
//! - Workspace identity (`[workspace]`): ARM resource id, tenant, service principal
//! - Experiment settings (`[experiment]`) with documented defaults
//! - Config file layering (user config + project-local overrides)
//! - Secret resolution (keyring → env var → config file) behind [`SecretStore`]

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{
    ChainSecretStore, ResolvedSecret, SecretSource, SecretStore, StaticSecretStore, secret_env_var,
};
pub use types::*;
