//! Secret store: retrieval of the service-principal password by name.
//!
//! [`ChainSecretStore`] resolves in order:
//! 1. System keyring (if `keyring` feature enabled)
//! 2. Environment variable `LUNA_SECRET_<NAME>`
//! 3. The `[secrets]` table of the config file (with warning)
//!
//! Keyring entries are stored as service="luna", user="<secret name>".

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{ConfigError, Result};

/// Keyring service name.
const SERVICE_NAME: &str = "luna";

/// Prefix for secret environment variables.
const ENV_PREFIX: &str = "LUNA_SECRET_";

/// A secret value together with where it was found.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

impl std::fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// OS keyring (macOS Keychain, Linux secret-service, Windows Credential Manager).
    Keyring,
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, warned about).
    ConfigFile,
    /// Supplied directly by the caller.
    Static,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::Keyring => write!(f, "system keyring"),
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
            SecretSource::Static => write!(f, "static"),
        }
    }
}

// ============================================================================
// SecretStore Trait
// ============================================================================

/// Looks up secrets by name.
///
/// Values are passed through untouched; the store does not cache, rotate or
/// validate them.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the secret called `name`.
    async fn get_secret(&self, name: &str) -> Result<ResolvedSecret>;
}

/// Environment variable consulted for a secret name.
///
/// `aml-sp.secret` becomes `LUNA_SECRET_AML_SP_SECRET`.
pub fn secret_env_var(name: &str) -> String {
    let suffix: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{ENV_PREFIX}{suffix}")
}

// ============================================================================
// ChainSecretStore
// ============================================================================

/// Keyring → environment → config file resolution chain.
#[derive(Debug, Clone, Default)]
pub struct ChainSecretStore {
    config_secrets: BTreeMap<String, String>,
}

impl ChainSecretStore {
    /// Create a chain with no config-file fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chain that falls back to the given `[secrets]` table.
    pub fn with_config_secrets(config_secrets: BTreeMap<String, String>) -> Self {
        Self { config_secrets }
    }

    /// Resolve synchronously through the chain.
    pub fn resolve(&self, name: &str) -> Option<ResolvedSecret> {
        if let Some(secret) = get_from_keyring(name) {
            return Some(secret);
        }

        let env_var = secret_env_var(name);
        if let Ok(value) = std::env::var(&env_var)
            && !value.is_empty()
        {
            return Some(ResolvedSecret {
                value,
                source: SecretSource::EnvVar(env_var),
            });
        }

        self.config_secrets.get(name).map(|v| {
            tracing::warn!(secret = name, "Using plaintext secret from config file");
            ResolvedSecret {
                value: v.clone(),
                source: SecretSource::ConfigFile,
            }
        })
    }
}

#[async_trait]
impl SecretStore for ChainSecretStore {
    async fn get_secret(&self, name: &str) -> Result<ResolvedSecret> {
        let secret = self.resolve(name).ok_or_else(|| ConfigError::SecretNotFound {
            name: name.to_string(),
            env_var: secret_env_var(name),
        })?;
        tracing::debug!(secret = name, source = %secret.source, "Resolved secret");
        Ok(secret)
    }
}

// ============================================================================
// StaticSecretStore
// ============================================================================

/// Fixed name → value map, for tests and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: BTreeMap<String, String>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret.
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, name: &str) -> Result<ResolvedSecret> {
        self.secrets
            .get(name)
            .map(|value| ResolvedSecret {
                value: value.clone(),
                source: SecretSource::Static,
            })
            .ok_or_else(|| ConfigError::SecretNotFound {
                name: name.to_string(),
                env_var: secret_env_var(name),
            })
    }
}

// ============================================================================
// Keyring management
// ============================================================================

/// Store a secret in the system keyring.
pub fn store_in_keyring(name: &str, secret: &str) -> std::result::Result<(), String> {
    store_keyring_entry(SERVICE_NAME, name, secret)
}

/// Delete a secret from the system keyring.
pub fn delete_from_keyring(name: &str) -> std::result::Result<(), String> {
    delete_keyring_entry(SERVICE_NAME, name)
}

#[cfg(feature = "keyring")]
fn get_from_keyring(name: &str) -> Option<ResolvedSecret> {
    // Tests must not depend on local keychain state.
    if cfg!(test) {
        return None;
    }

    let entry = keyring::Entry::new(SERVICE_NAME, name).ok()?;
    let value = entry.get_password().ok()?;
    if value.is_empty() {
        return None;
    }
    Some(ResolvedSecret {
        value,
        source: SecretSource::Keyring,
    })
}

#[cfg(feature = "keyring")]
fn store_keyring_entry(service: &str, user: &str, secret: &str) -> std::result::Result<(), String> {
    if cfg!(test) {
        return Err("keyring access disabled in tests".to_string());
    }
    let entry = keyring::Entry::new(service, user).map_err(|e| format!("keyring error: {}", e))?;
    entry
        .set_password(secret)
        .map_err(|e| format!("failed to store in keyring: {}", e))
}

#[cfg(feature = "keyring")]
fn delete_keyring_entry(service: &str, user: &str) -> std::result::Result<(), String> {
    if cfg!(test) {
        return Err("keyring access disabled in tests".to_string());
    }
    let entry = keyring::Entry::new(service, user).map_err(|e| format!("keyring error: {}", e))?;
    entry
        .delete_credential()
        .map_err(|e| format!("failed to delete from keyring: {}", e))
}

#[cfg(not(feature = "keyring"))]
fn get_from_keyring(_name: &str) -> Option<ResolvedSecret> {
    None
}

#[cfg(not(feature = "keyring"))]
fn store_keyring_entry(
    _service: &str,
    _user: &str,
    _secret: &str,
) -> std::result::Result<(), String> {
    Err("keyring support not compiled in (enable the 'keyring' feature)".to_string())
}

#[cfg(not(feature = "keyring"))]
fn delete_keyring_entry(_service: &str, _user: &str) -> std::result::Result<(), String> {
    Err("keyring support not compiled in (enable the 'keyring' feature)".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
