//! Operations adapter over the Azure Machine Learning run history.
//!
//! An *operation* is a unit of work (training, inference, evaluation)
//! requested against a deployed product. Each operation becomes a pipeline
//! run in one experiment and is found again purely by run tags.
//!
//! # Example
//!
//! ```no_run
//! use luna_aml::{OperationsAdapter, Result, SubmitOperationRequest};
//! use luna_config::{ChainSecretStore, load_config};
//!
//! # async fn example() -> Result<()> {
//! let loaded = load_config(None)?;
//! let secrets = ChainSecretStore::with_config_secrets(loaded.config.secrets.clone());
//! let adapter = OperationsAdapter::from_config(&loaded.config, &secrets).await?;
//!
//! // Launch a training run
//! let operation_id = adapter
//!     .submit_operation(SubmitOperationRequest {
//!         product_name: "churn".into(),
//!         deployment_name: "prod".into(),
//!         api_version: "v1".into(),
//!         entry_point: "train".into(),
//!         user_input: r#"{"epochs": 3}"#.into(),
//!         predecessor_operation_id: None,
//!         user_id: "user-1".into(),
//!         subscription_id: "sub-1".into(),
//!     })
//!     .await?;
//!
//! // Poll it
//! let status = adapter
//!     .get_operation_status("train", operation_id.as_str(), "user-1", "sub-1")
//!     .await?;
//! println!("{}: {}", status.operation_id, status.status);
//! # Ok(())
//! # }
//! ```
//!
//! # Backends
//!
//! - [`AzureMlBackend`]: the REST data plane, authenticated with a service principal
//! - [`InMemoryRunBackend`]: an in-process run store for tests and dry runs

pub mod adapter;
pub mod backend;
pub mod error;
pub mod http;
pub mod types;

pub use adapter::OperationsAdapter;
pub use backend::{
    InMemoryRunBackend, RunBackend, RunQuery, RunRecord, RunSubmission, SharedRunBackend,
};
pub use error::{Error, Result};
pub use http::{AzureMlBackend, ClientBuilder, build_run_filter};
pub use types::*;
