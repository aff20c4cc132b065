//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [workspace]      # target Azure ML workspace + service principal
//! [experiment]     # experiment name and run type used for tagging/lookup
//! [http]           # REST client settings
//! [secrets]        # plaintext secret fallback (not recommended)
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Experiment every operation is submitted under unless configured otherwise.
pub const DEFAULT_EXPERIMENT_NAME: &str = "myexperiment";

/// Run type used to filter run queries.
pub const DEFAULT_RUN_TYPE: &str = "azureml.PipelineRun";

/// Default request timeout for the REST client, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LunaConfig {
    /// Workspace and service-principal identity.
    pub workspace: Option<WorkspaceSection>,

    /// Experiment settings.
    pub experiment: Option<ExperimentSection>,

    /// HTTP client settings.
    pub http: Option<HttpSection>,

    /// Plaintext secrets keyed by secret name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,
}

impl LunaConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced wholesale; secrets merge per key.
    pub fn merge(&mut self, other: LunaConfig) {
        if other.workspace.is_some() {
            self.workspace = other.workspace;
        }

        if other.experiment.is_some() {
            self.experiment = other.experiment;
        }

        if other.http.is_some() {
            self.http = other.http;
        }

        self.secrets.extend(other.secrets);
    }

    /// The workspace section, or an error if none was configured.
    pub fn require_workspace(&self) -> Result<&WorkspaceSection> {
        self.workspace.as_ref().ok_or(ConfigError::NoWorkspace)
    }

    /// Experiment settings, falling back to defaults.
    pub fn experiment(&self) -> ExperimentSection {
        self.experiment.clone().unwrap_or_default()
    }

    /// HTTP settings, falling back to defaults.
    pub fn http(&self) -> HttpSection {
        self.http.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workspace
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies the Azure ML workspace and the service principal used to reach it.
///
/// `secret_name` is a reference into the secret store, never the secret itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSection {
    /// Compound ARM resource id of the workspace.
    pub resource_id: String,
    /// Azure AD tenant.
    pub tenant_id: String,
    /// Service principal application (client) id.
    pub application_id: String,
    /// Name of the secret holding the service principal password.
    pub secret_name: String,
    /// Azure region, used to derive the API host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Explicit API base URL; takes precedence over `region`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    /// Azure AD authority host; the public cloud when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_host: Option<String>,
}

impl WorkspaceSection {
    /// Base URL of the workspace's regional API host.
    pub fn api_base_url(&self) -> Result<String> {
        if let Some(url) = &self.api_base_url {
            return Ok(url.clone());
        }
        match &self.region {
            Some(region) if !region.is_empty() => Ok(format!("https://{region}.api.azureml.ms/")),
            _ => Err(ConfigError::MissingField {
                field: "region or api_base_url".to_string(),
                context: "[workspace]".to_string(),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Experiment
// ─────────────────────────────────────────────────────────────────────────────

/// Experiment settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentSection {
    /// Experiment name all operations are submitted under.
    pub name: String,
    /// Run type that lookups filter on.
    pub run_type: String,
}

impl Default for ExperimentSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_EXPERIMENT_NAME.to_string(),
            run_type: DEFAULT_RUN_TYPE.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// REST client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Custom user agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl HttpSection {
    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
