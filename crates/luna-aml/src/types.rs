//! Domain types shared by the adapter and its backends.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Workspace identity as configured in `[workspace]`.
pub type WorkspaceConfig = luna_config::WorkspaceSection;

/// Experiment name and run type used for submission and lookup.
pub type ExperimentSettings = luna_config::ExperimentSection;

// ─────────────────────────────────────────────────────────────────────────────
// Tag vocabulary
// ─────────────────────────────────────────────────────────────────────────────

/// Tag and parameter keys correlating operations with backend runs.
pub mod tags {
    pub const USER_ID: &str = "userId";
    pub const PRODUCT_NAME: &str = "productName";
    pub const DEPLOYMENT_NAME: &str = "deploymentName";
    pub const API_VERSION: &str = "apiVersion";
    pub const OPERATION_NAME: &str = "operationName";
    pub const OPERATION_ID: &str = "operationId";
    pub const SUBSCRIPTION_ID: &str = "subscriptionId";
    /// Run parameter only.
    pub const MODEL_ID: &str = "modelId";
    /// Run parameter only.
    pub const USER_INPUT: &str = "userInput";
}

// ─────────────────────────────────────────────────────────────────────────────
// Resource id
// ─────────────────────────────────────────────────────────────────────────────

/// Workspace coordinates decomposed from an ARM resource id.
///
/// Fields are positional over the slash-split id: index 2 is the
/// subscription, index 4 the resource group, the last segment the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub workspace_name: String,
}

impl ResourceId {
    /// Parse a compound resource id such as
    /// `/subscriptions/SUB/resourceGroups/RG/providers/Microsoft.MachineLearningServices/workspaces/WS`.
    pub fn parse(resource_id: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidResourceId {
            resource_id: resource_id.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = resource_id.split('/').collect();
        if parts.len() < 6 {
            return Err(invalid("expected at least six '/'-separated segments"));
        }

        let subscription_id = parts[2];
        let resource_group = parts[4];
        let workspace_name = parts[parts.len() - 1];

        if subscription_id.is_empty() {
            return Err(invalid("empty subscription segment"));
        }
        if resource_group.is_empty() {
            return Err(invalid("empty resource group segment"));
        }
        if workspace_name.is_empty() {
            return Err(invalid("empty workspace name segment"));
        }

        Ok(Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            workspace_name: workspace_name.to_string(),
        })
    }

    /// Workspace-scoped path shared by the Azure ML data-plane services.
    pub fn scope_path(&self) -> String {
        format!(
            "subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}",
            self.subscription_id, self.resource_group, self.workspace_name
        )
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operation id
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier handed back to callers for a submitted operation.
///
/// Generated ids are 32 lowercase hex characters starting with `a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Generate a new id from a random v4 UUID with its first digit forced to `a`.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("a{}", &hex[1..]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OperationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OperationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests and results
// ─────────────────────────────────────────────────────────────────────────────

/// Everything needed to launch an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOperationRequest {
    pub product_name: String,
    pub deployment_name: String,
    pub api_version: String,
    /// Pipeline entry point; also recorded as the `operationName` tag.
    pub entry_point: String,
    pub user_input: String,
    /// Accepted for caller compatibility; not sent to the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor_operation_id: Option<String>,
    pub user_id: String,
    pub subscription_id: String,
}

impl SubmitOperationRequest {
    /// Run parameters for the pipeline.
    pub fn parameters(&self, operation_id: &OperationId) -> BTreeMap<String, String> {
        BTreeMap::from([
            (tags::MODEL_ID.to_string(), operation_id.to_string()),
            (tags::USER_INPUT.to_string(), self.user_input.clone()),
            (tags::OPERATION_ID.to_string(), operation_id.to_string()),
            (tags::PRODUCT_NAME.to_string(), self.product_name.clone()),
            (tags::DEPLOYMENT_NAME.to_string(), self.deployment_name.clone()),
            (tags::API_VERSION.to_string(), self.api_version.clone()),
            (tags::SUBSCRIPTION_ID.to_string(), self.subscription_id.clone()),
        ])
    }

    /// Tags correlating the run with the operation.
    pub fn tags(&self, operation_id: &OperationId) -> BTreeMap<String, String> {
        BTreeMap::from([
            (tags::USER_ID.to_string(), self.user_id.clone()),
            (tags::PRODUCT_NAME.to_string(), self.product_name.clone()),
            (tags::DEPLOYMENT_NAME.to_string(), self.deployment_name.clone()),
            (tags::API_VERSION.to_string(), self.api_version.clone()),
            (tags::OPERATION_NAME.to_string(), self.entry_point.clone()),
            (tags::OPERATION_ID.to_string(), operation_id.to_string()),
            (tags::SUBSCRIPTION_ID.to_string(), self.subscription_id.clone()),
        ])
    }
}

/// Tag filter selecting one operation or all operations of a kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFilter {
    pub operation_name: String,
    pub operation_id: Option<String>,
    pub user_id: String,
    pub subscription_id: String,
}

impl OperationFilter {
    /// Filter for every run of `operation_name` owned by the user.
    pub fn all(operation_name: &str, user_id: &str, subscription_id: &str) -> Self {
        Self {
            operation_name: operation_name.to_string(),
            operation_id: None,
            user_id: user_id.to_string(),
            subscription_id: subscription_id.to_string(),
        }
    }

    /// Filter for a single operation.
    pub fn one(
        operation_name: &str,
        operation_id: &str,
        user_id: &str,
        subscription_id: &str,
    ) -> Self {
        Self {
            operation_id: Some(operation_id.to_string()),
            ..Self::all(operation_name, user_id, subscription_id)
        }
    }

    /// Exact-match tags sent to the backend.
    pub fn to_tags(&self) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::from([
            (tags::USER_ID.to_string(), self.user_id.clone()),
            (tags::OPERATION_NAME.to_string(), self.operation_name.clone()),
            (tags::SUBSCRIPTION_ID.to_string(), self.subscription_id.clone()),
        ]);
        if let Some(id) = &self.operation_id {
            tags.insert(tags::OPERATION_ID.to_string(), id.clone());
        }
        tags
    }
}

impl fmt::Display for OperationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .to_tags()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{{{}}}", rendered)
    }
}

/// Status snapshot of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    pub operation_id: String,
    /// Backend run status, passed through verbatim (e.g. `Running`, `Completed`).
    pub status: String,
}

/// Output files of one operation, read from its first child run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutput {
    pub operation_id: String,
    pub files: Vec<String>,
}
