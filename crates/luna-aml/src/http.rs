//! REST implementation of [`RunBackend`] against the Azure ML data plane.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use luna_auth::SharedTokenProvider;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::backend::{RunBackend, RunQuery, RunRecord, RunSubmission};
use crate::error::{Error, ErrorResponse, Result};
use crate::types::ResourceId;

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs requested per page when querying.
const DEFAULT_PAGE_SIZE: usize = 100;

/// Service prefixes on the regional API host.
const HISTORY_SERVICE: &str = "history/v1.0";
const PIPELINES_SERVICE: &str = "pipelines/v1.0";
const ARTIFACT_SERVICE: &str = "artifact/v2.0";

/// Azure ML REST backend.
///
/// Cheap to clone; clones share the HTTP connection pool and token provider.
#[derive(Clone)]
pub struct AzureMlBackend {
    inner: Arc<BackendInner>,
}

struct BackendInner {
    http: reqwest::Client,
    base_url: Url,
    resource: ResourceId,
    tokens: SharedTokenProvider,
    timeout: Duration,
    page_size: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PipelineSubmitRequest<'a> {
    experiment_name: &'a str,
    parameter_assignments: &'a BTreeMap<String, String>,
    tags: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PipelineSubmitResponse {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunQueryRequest<'a> {
    filter: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    top: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    continuation_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(default)]
    continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtifactEntry {
    path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContinuationQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    continuation_token: Option<&'a str>,
}

/// Build the OData filter for an exact-match run query.
///
/// Clauses are `RunType eq '<type>'` followed by one `Tags/<key> eq '<value>'`
/// per tag in key order, joined with `and`. Single quotes are doubled.
pub fn build_run_filter(run_type: &str, tags: &BTreeMap<String, String>) -> String {
    let mut clauses = vec![format!("RunType eq '{}'", escape_literal(run_type))];
    for (key, value) in tags {
        clauses.push(format!("Tags/{} eq '{}'", key, escape_literal(value)));
    }
    clauses.join(" and ")
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Token for the next page, or `None` once paging is done.
///
/// A server handing back the token it was just given ends paging.
fn next_page_token(previous: Option<&str>, next: Option<String>) -> Option<String> {
    match next {
        Some(next) if next.is_empty() => None,
        Some(next) if previous == Some(next.as_str()) => {
            tracing::warn!(token = %next, "Continuation token repeated; stopping");
            None
        }
        next => next,
    }
}

impl AzureMlBackend {
    /// Create a new backend builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Get the workspace this backend targets.
    pub fn resource(&self) -> &ResourceId {
        &self.inner.resource
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for `service/<workspace scope>/<segments...>`.
    ///
    /// Segments are percent-encoded individually.
    pub(crate) fn url(&self, service: &str, segments: &[&str]) -> Result<Url> {
        let mut url = self
            .inner
            .base_url
            .join(&format!("{}/{}", service, self.inner.resource.scope_path()))?;
        url.path_segments_mut()
            .map_err(|_| Error::Backend("base URL cannot be a base".to_string()))?
            .extend(segments);
        Ok(url)
    }

    async fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.inner.tokens.get_token().await?))
    }

    /// Make a GET request with query parameters.
    async fn get_with_query<T, Q>(&self, url: Url, query: &Q) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        tracing::debug!(%url, "GET");
        let response = self
            .inner
            .http
            .get(url)
            .query(query)
            .header(reqwest::header::AUTHORIZATION, self.bearer().await?)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make a POST request.
    async fn post<T, B>(&self, url: Url, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize + ?Sized,
    {
        tracing::debug!(%url, "POST");
        let response = self
            .inner
            .http
            .post(url)
            .json(body)
            .header(reqwest::header::AUTHORIZATION, self.bearer().await?)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Follow continuation tokens on a GET listing until exhausted.
    async fn get_all_pages<T>(&self, url: Url) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page: Page<T> = self
                .get_with_query(
                    url.clone(),
                    &ContinuationQuery {
                        continuation_token: token.as_deref(),
                    },
                )
                .await?;
            items.extend(page.value);
            match next_page_token(token.as_deref(), page.continuation_token) {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(items)
    }

    /// Handle a response, extracting the body or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();

        match response.json::<ErrorResponse>().await {
            Ok(err) => match status {
                404 => Error::NotFound(err.error.message),
                401 | 403 => Error::Unauthorized(err.error.message),
                _ => Error::Api {
                    status,
                    code: err.error.code,
                    message: err.error.message,
                },
            },
            Err(_) => Error::Api {
                status,
                code: "unknown".to_string(),
                message: format!("HTTP {}", status),
            },
        }
    }
}

#[async_trait]
impl RunBackend for AzureMlBackend {
    async fn submit_run(&self, submission: RunSubmission) -> Result<String> {
        let url = self.url(
            PIPELINES_SERVICE,
            &[
                "PipelineRunsSubmit",
                "PipelineEndpointName",
                &submission.entry_point,
            ],
        )?;
        let body = PipelineSubmitRequest {
            experiment_name: &submission.experiment,
            parameter_assignments: &submission.parameters,
            tags: &submission.tags,
        };
        let response: PipelineSubmitResponse = self.post(url, &body).await?;
        Ok(response.id)
    }

    async fn query_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>> {
        let url = self.url(
            HISTORY_SERVICE,
            &["experiments", &query.experiment, "runs:query"],
        )?;
        let filter = build_run_filter(&query.run_type, &query.tags);
        if query.limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let top = match query.limit {
                Some(limit) => limit.saturating_sub(runs.len()).min(self.inner.page_size),
                None => self.inner.page_size,
            };
            let body = RunQueryRequest {
                filter: &filter,
                top: Some(top),
                continuation_token: token.as_deref(),
            };
            let page: Page<RunRecord> = self.post(url.clone(), &body).await?;
            runs.extend(page.value);

            if let Some(limit) = query.limit
                && runs.len() >= limit
            {
                runs.truncate(limit);
                break;
            }
            match next_page_token(token.as_deref(), page.continuation_token) {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        tracing::debug!(filter = %filter, count = runs.len(), "Queried runs");
        Ok(runs)
    }

    async fn child_runs(&self, experiment: &str, run_id: &str) -> Result<Vec<RunRecord>> {
        let url = self.url(
            HISTORY_SERVICE,
            &["experiments", experiment, "runs", run_id, "children"],
        )?;
        self.get_all_pages(url).await
    }

    async fn file_names(&self, run_id: &str) -> Result<Vec<String>> {
        let container = format!("dcid.{}", run_id);
        let url = self.url(
            ARTIFACT_SERVICE,
            &["artifacts", "origins", "ExperimentRun", "containers", &container],
        )?;
        let entries: Vec<ArtifactEntry> = self.get_all_pages(url).await?;
        Ok(entries.into_iter().map(|e| e.path).collect())
    }

    fn name(&self) -> &str {
        "azureml"
    }
}

/// Builder for creating an [`AzureMlBackend`].
pub struct ClientBuilder {
    base_url: Option<String>,
    resource: Option<ResourceId>,
    tokens: Option<SharedTokenProvider>,
    timeout: Duration,
    page_size: usize,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            resource: None,
            tokens: None,
            timeout: DEFAULT_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            user_agent: None,
        }
    }

    /// Set the regional API host, e.g. `https://eastus.api.azureml.ms`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the target workspace.
    pub fn resource(mut self, resource: ResourceId) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Set the token provider used for bearer auth.
    pub fn token_provider(mut self, tokens: SharedTokenProvider) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many runs to request per query page.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the backend.
    pub fn build(self) -> Result<AzureMlBackend> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Backend("base_url is required".to_string()))?;
        let resource = self
            .resource
            .ok_or_else(|| Error::Backend("workspace resource is required".to_string()))?;
        let tokens = self
            .tokens
            .ok_or_else(|| Error::Backend("token provider is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("luna-aml/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        Ok(AzureMlBackend {
            inner: Arc::new(BackendInner {
                http,
                base_url,
                resource,
                tokens,
                timeout: self.timeout,
                page_size: self.page_size,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
