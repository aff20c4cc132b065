//! Run backend abstraction.
//!
//! The adapter never talks to the wire directly; it goes through
//! [`RunBackend`], the subset of the remote run-history API it relies on.
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │  RunBackend trait                      │
//! │  - submit_run()   -> run id            │
//! │  - query_runs()   -> Vec<RunRecord>    │
//! │  - child_runs()   -> Vec<RunRecord>    │
//! │  - file_names()   -> Vec<String>       │
//! └────────────────────────────────────────┘
//!                   │
//!         ┌─────────┴─────────┐
//!         ▼                   ▼
//! ┌──────────────┐  ┌──────────────────┐
//! │AzureMlBackend│  │InMemoryRunBackend│
//! └──────────────┘  └──────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A pipeline run to launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSubmission {
    pub experiment: String,
    pub entry_point: String,
    pub parameters: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

/// Exact-match run query within one experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunQuery {
    pub experiment: String,
    pub run_type: String,
    pub tags: BTreeMap<String, String>,
    /// Stop after this many runs.
    pub limit: Option<usize>,
}

/// Backend projection of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_type: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_utc: Option<String>,
}

impl RunRecord {
    pub fn new(run_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: status.into(),
            run_type: None,
            tags: BTreeMap::new(),
            parent_run_id: None,
            created_utc: None,
        }
    }

    pub fn with_run_type(mut self, run_type: impl Into<String>) -> Self {
        self.run_type = Some(run_type.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Look up a tag value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Remote run-history operations used by the adapter.
#[async_trait]
pub trait RunBackend: Send + Sync {
    /// Launch a pipeline run and return its run id.
    async fn submit_run(&self, submission: RunSubmission) -> Result<String>;

    /// Runs matching the query, in backend order.
    async fn query_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>>;

    /// Direct children of a run, in backend order.
    async fn child_runs(&self, experiment: &str, run_id: &str) -> Result<Vec<RunRecord>>;

    /// Names of the files a run produced.
    async fn file_names(&self, run_id: &str) -> Result<Vec<String>>;

    /// Get the name of this backend.
    fn name(&self) -> &str;
}

/// A backend that can be shared across threads.
pub type SharedRunBackend = Arc<dyn RunBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// In-memory backend
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct StoredRun {
    experiment: String,
    record: RunRecord,
    files: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    runs: Vec<StoredRun>,
    submissions: Vec<RunSubmission>,
    next_id: u64,
}

/// In-memory run store for tests and offline use.
///
/// Runs are kept in insertion order and queries return them in that order.
/// Submitted runs get status `NotStarted` and the configured run type.
#[derive(Debug)]
pub struct InMemoryRunBackend {
    name: String,
    submitted_run_type: String,
    state: Mutex<State>,
}

impl InMemoryRunBackend {
    pub fn new() -> Self {
        Self {
            name: "in-memory".to_string(),
            submitted_run_type: luna_config::DEFAULT_RUN_TYPE.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Add a top-level run to an experiment.
    pub fn add_run(&self, experiment: &str, record: RunRecord) {
        self.state.lock().runs.push(StoredRun {
            experiment: experiment.to_string(),
            record,
            files: Vec::new(),
        });
    }

    /// Add a child run under `parent_run_id`, in the parent's experiment.
    pub fn add_child(&self, parent_run_id: &str, mut record: RunRecord) -> Result<()> {
        let mut state = self.state.lock();
        let experiment = state
            .runs
            .iter()
            .find(|r| r.record.run_id == parent_run_id)
            .map(|r| r.experiment.clone())
            .ok_or_else(|| Error::NotFound(format!("run {}", parent_run_id)))?;
        record.parent_run_id = Some(parent_run_id.to_string());
        state.runs.push(StoredRun {
            experiment,
            record,
            files: Vec::new(),
        });
        Ok(())
    }

    /// Replace the files recorded for a run.
    pub fn set_files(&self, run_id: &str, files: Vec<String>) -> Result<()> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.record.run_id == run_id)
            .ok_or_else(|| Error::NotFound(format!("run {}", run_id)))?;
        run.files = files;
        Ok(())
    }

    /// Update a run's status.
    pub fn set_status(&self, run_id: &str, status: &str) -> Result<()> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.record.run_id == run_id)
            .ok_or_else(|| Error::NotFound(format!("run {}", run_id)))?;
        run.record.status = status.to_string();
        Ok(())
    }

    /// Every submission received, in order.
    pub fn submissions(&self) -> Vec<RunSubmission> {
        self.state.lock().submissions.clone()
    }

    /// Total number of runs stored (including children).
    pub fn run_count(&self) -> usize {
        self.state.lock().runs.len()
    }
}

impl Default for InMemoryRunBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn tags_match(record: &RunRecord, wanted: &BTreeMap<String, String>) -> bool {
    wanted
        .iter()
        .all(|(k, v)| record.tags.get(k).is_some_and(|actual| actual == v))
}

#[async_trait]
impl RunBackend for InMemoryRunBackend {
    async fn submit_run(&self, submission: RunSubmission) -> Result<String> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let run_id = format!("{}_{}", submission.experiment, state.next_id);

        let record = RunRecord::new(&run_id, "NotStarted")
            .with_run_type(&self.submitted_run_type)
            .with_tags(submission.tags.clone());
        state.runs.push(StoredRun {
            experiment: submission.experiment.clone(),
            record,
            files: Vec::new(),
        });
        state.submissions.push(submission);
        Ok(run_id)
    }

    async fn query_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>> {
        let state = self.state.lock();
        let matches = state
            .runs
            .iter()
            .filter(|r| r.experiment == query.experiment)
            .filter(|r| r.record.run_type.as_deref() == Some(query.run_type.as_str()))
            .filter(|r| tags_match(&r.record, &query.tags))
            .map(|r| r.record.clone());

        Ok(match query.limit {
            Some(limit) => matches.take(limit).collect(),
            None => matches.collect(),
        })
    }

    async fn child_runs(&self, experiment: &str, run_id: &str) -> Result<Vec<RunRecord>> {
        let state = self.state.lock();
        Ok(state
            .runs
            .iter()
            .filter(|r| r.experiment == experiment)
            .filter(|r| r.record.parent_run_id.as_deref() == Some(run_id))
            .map(|r| r.record.clone())
            .collect())
    }

    async fn file_names(&self, run_id: &str) -> Result<Vec<String>> {
        let state = self.state.lock();
        state
            .runs
            .iter()
            .find(|r| r.record.run_id == run_id)
            .map(|r| r.files.clone())
            .ok_or_else(|| Error::NotFound(format!("run {}", run_id)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
