//! CLI command handlers.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use luna_aml::OperationsAdapter;
use luna_config::{ChainSecretStore, ConfigSource, LoadedConfig};

pub mod config;
pub mod output;
pub mod status;
pub mod submit;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file; bypasses discovery when set.
    pub config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load the config: the explicit file if given, otherwise every discovered layer.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        match &self.config_path {
            Some(path) => {
                let config = luna_config::load_config_file(path)
                    .with_context(|| format!("loading {}", path.display()))?;
                Ok(LoadedConfig {
                    config,
                    sources: vec![ConfigSource {
                        path: path.clone(),
                        loaded: true,
                    }],
                    warnings: Vec::new(),
                })
            }
            None => Ok(luna_config::load_config(None)?),
        }
    }

    /// Load the config and connect to the configured workspace.
    pub async fn connect(&self) -> Result<OperationsAdapter> {
        let loaded = self.load_config()?;
        for warning in &loaded.warnings {
            tracing::warn!("{}", warning);
        }
        let secrets = ChainSecretStore::with_config_secrets(loaded.config.secrets.clone());
        let adapter = OperationsAdapter::from_config(&loaded.config, &secrets)
            .await
            .context("connecting to workspace")?;
        Ok(adapter)
    }
}

/// Who the operation belongs to. Every lookup is scoped by both.
#[derive(Args, Debug, Clone)]
pub struct OwnerArgs {
    /// User id recorded on the operation
    #[arg(long = "user", env = "LUNA_USER_ID")]
    pub user_id: String,

    /// Subscription id recorded on the operation
    #[arg(long = "subscription", env = "LUNA_SUBSCRIPTION_ID")]
    pub subscription_id: String,
}

/// Print a serializable value as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
