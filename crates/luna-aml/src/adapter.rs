//! The operations adapter.
//!
//! Translates domain operation requests into run-history calls. Operations
//! and runs are correlated only through tags under one configured
//! experiment; there is no stored operation → run mapping.

use std::sync::Arc;

use luna_auth::{ServicePrincipalConfig, ServicePrincipalTokenProvider, TokenProvider};
use luna_config::{HttpSection, LunaConfig, SecretStore};

use crate::backend::{RunBackend, RunQuery, RunRecord, RunSubmission, SharedRunBackend};
use crate::error::{Error, Result};
use crate::http::AzureMlBackend;
use crate::types::{
    ExperimentSettings, OperationFilter, OperationId, OperationOutput, OperationStatus,
    ResourceId, SubmitOperationRequest, WorkspaceConfig, tags,
};

/// Adapter between operation requests and a run backend.
///
/// Cheap to clone; holds no mutable state of its own.
#[derive(Clone)]
pub struct OperationsAdapter {
    backend: SharedRunBackend,
    experiment: ExperimentSettings,
}

impl std::fmt::Debug for OperationsAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationsAdapter")
            .field("backend", &self.backend.name())
            .field("experiment", &self.experiment)
            .finish()
    }
}

impl OperationsAdapter {
    /// Authenticate against a workspace and build an adapter over the REST backend.
    ///
    /// Fails if the resource id is malformed, the secret cannot be fetched, or
    /// the service principal is rejected. A token is requested eagerly so bad
    /// credentials surface here rather than on the first operation.
    pub async fn connect(
        workspace: &WorkspaceConfig,
        secrets: &dyn SecretStore,
        experiment: ExperimentSettings,
        http: &HttpSection,
    ) -> Result<Self> {
        let resource = ResourceId::parse(&workspace.resource_id)?;
        let base_url = workspace.api_base_url()?;
        let secret = secrets.get_secret(&workspace.secret_name).await?;

        let mut credential = ServicePrincipalConfig::new(
            &workspace.tenant_id,
            &workspace.application_id,
            secret.value,
        );
        if let Some(host) = &workspace.authority_host {
            credential = credential.with_authority_host(host);
        }

        let auth_http = reqwest::Client::builder().timeout(http.timeout()).build()?;
        let tokens = Arc::new(ServicePrincipalTokenProvider::with_client(credential, auth_http));
        tokens.get_token().await?;

        let mut builder = AzureMlBackend::builder()
            .base_url(base_url)
            .resource(resource.clone())
            .token_provider(tokens)
            .timeout(http.timeout());
        if let Some(agent) = &http.user_agent {
            builder = builder.user_agent(agent);
        }
        let backend = builder.build()?;

        tracing::info!(
            subscription = %resource.subscription_id,
            resource_group = %resource.resource_group,
            workspace = %resource.workspace_name,
            experiment = %experiment.name,
            "Connected to workspace"
        );

        Ok(Self::with_backend(Arc::new(backend), experiment))
    }

    /// Build an adapter from a loaded config.
    pub async fn from_config(config: &LunaConfig, secrets: &dyn SecretStore) -> Result<Self> {
        let workspace = config.require_workspace()?;
        Self::connect(workspace, secrets, config.experiment(), &config.http()).await
    }

    /// Build an adapter over any backend.
    pub fn with_backend(backend: SharedRunBackend, experiment: ExperimentSettings) -> Self {
        Self {
            backend,
            experiment,
        }
    }

    /// Get the backend.
    pub fn backend(&self) -> &dyn RunBackend {
        self.backend.as_ref()
    }

    /// Get the experiment settings.
    pub fn experiment(&self) -> &ExperimentSettings {
        &self.experiment
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Launch a pipeline run and return the new operation's id.
    ///
    /// Returns as soon as the backend accepts the submission; the run is not
    /// awaited. `predecessor_operation_id` is not forwarded.
    pub async fn submit_operation(&self, request: SubmitOperationRequest) -> Result<OperationId> {
        let operation_id = OperationId::generate();

        if let Some(predecessor) = &request.predecessor_operation_id {
            tracing::debug!(%predecessor, "Ignoring predecessor operation id");
        }

        let submission = RunSubmission {
            experiment: self.experiment.name.clone(),
            entry_point: request.entry_point.clone(),
            parameters: request.parameters(&operation_id),
            tags: request.tags(&operation_id),
        };
        let run_id = self.backend.submit_run(submission).await?;

        tracing::info!(
            operation_id = %operation_id,
            run_id = %run_id,
            entry_point = %request.entry_point,
            "Submitted operation"
        );
        Ok(operation_id)
    }

    /// Status of exactly one operation.
    pub async fn get_operation_status(
        &self,
        operation_name: &str,
        operation_id: &str,
        user_id: &str,
        subscription_id: &str,
    ) -> Result<OperationStatus> {
        let filter = OperationFilter::one(operation_name, operation_id, user_id, subscription_id);
        let run = self.find_single_run(&filter, operation_id).await?;
        Ok(OperationStatus {
            operation_id: operation_id.to_string(),
            status: run.status,
        })
    }

    /// Status of every operation of a kind, in backend order.
    ///
    /// No matching runs is an error, not an empty list.
    pub async fn list_operations(
        &self,
        operation_name: &str,
        user_id: &str,
        subscription_id: &str,
    ) -> Result<Vec<OperationStatus>> {
        let filter = OperationFilter::all(operation_name, user_id, subscription_id);
        let runs = self.find_runs(&filter).await?;

        runs.into_iter()
            .map(|run| {
                Ok(OperationStatus {
                    operation_id: operation_id_of(&run)?,
                    status: run.status,
                })
            })
            .collect()
    }

    /// Files of one operation, read from its first child run.
    pub async fn get_operation_output(
        &self,
        operation_name: &str,
        operation_id: &str,
        user_id: &str,
        subscription_id: &str,
    ) -> Result<OperationOutput> {
        let filter = OperationFilter::one(operation_name, operation_id, user_id, subscription_id);
        let run = self.find_single_run(&filter, operation_id).await?;
        let files = self.first_child_files(&run).await?;
        Ok(OperationOutput {
            operation_id: operation_id.to_string(),
            files,
        })
    }

    /// Files of every operation of a kind, in backend order.
    ///
    /// No matching runs is an error; so is any matched run without children.
    pub async fn list_operation_outputs(
        &self,
        operation_name: &str,
        user_id: &str,
        subscription_id: &str,
    ) -> Result<Vec<OperationOutput>> {
        let filter = OperationFilter::all(operation_name, user_id, subscription_id);
        let runs = self.find_runs(&filter).await?;

        let mut outputs = Vec::with_capacity(runs.len());
        for run in &runs {
            let operation_id = operation_id_of(run)?;
            let files = self.first_child_files(run).await?;
            outputs.push(OperationOutput {
                operation_id,
                files,
            });
        }
        Ok(outputs)
    }

    /// Does nothing. Outputs are never deleted.
    #[allow(clippy::too_many_arguments)]
    pub async fn delete_operation_output(
        &self,
        _product_name: &str,
        _deployment_name: &str,
        _api_version: &str,
        _operation_name: &str,
        operation_id: &str,
        _user_id: &str,
        _subscription_id: &str,
    ) -> Result<()> {
        tracing::debug!(%operation_id, "delete_operation_output is a no-op");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn query(&self, filter: &OperationFilter, limit: Option<usize>) -> RunQuery {
        RunQuery {
            experiment: self.experiment.name.clone(),
            run_type: self.experiment.run_type.clone(),
            tags: filter.to_tags(),
            limit,
        }
    }

    /// All runs matching the filter; at least one.
    async fn find_runs(&self, filter: &OperationFilter) -> Result<Vec<RunRecord>> {
        self.find_runs_limited(filter, None).await
    }

    /// Up to `limit` runs matching the filter; at least one.
    async fn find_runs_limited(
        &self,
        filter: &OperationFilter,
        limit: Option<usize>,
    ) -> Result<Vec<RunRecord>> {
        let runs = self.backend.query_runs(&self.query(filter, limit)).await?;
        tracing::debug!(filter = %filter, count = runs.len(), "Matched runs");
        if runs.is_empty() {
            return Err(Error::OperationNotFound {
                filter: filter.to_string(),
            });
        }
        Ok(runs)
    }

    /// The one run matching the filter.
    ///
    /// Two runs are enough to tell a unique match from an ambiguous one.
    async fn find_single_run(
        &self,
        filter: &OperationFilter,
        operation_id: &str,
    ) -> Result<RunRecord> {
        let mut runs = self.find_runs_limited(filter, Some(2)).await?;
        if runs.len() > 1 {
            tracing::warn!(
                %operation_id,
                count = runs.len(),
                "Operation tags match more than one run"
            );
            return Err(Error::AmbiguousOperation {
                operation_id: operation_id.to_string(),
                count: runs.len(),
            });
        }
        Ok(runs.remove(0))
    }

    async fn first_child_files(&self, run: &RunRecord) -> Result<Vec<String>> {
        let children = self
            .backend
            .child_runs(&self.experiment.name, &run.run_id)
            .await?;
        let child = children
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoChildRun {
                run_id: run.run_id.clone(),
            })?;
        self.backend.file_names(&child.run_id).await
    }
}

fn operation_id_of(run: &RunRecord) -> Result<String> {
    run.tag(tags::OPERATION_ID)
        .map(str::to_string)
        .ok_or_else(|| Error::MissingTag {
            run_id: run.run_id.clone(),
            tag: tags::OPERATION_ID.to_string(),
        })
}
