//! varsync - GitHub Actions Variable Migration
//!
//! varsync exports GitHub Actions configuration variables from a source
//! organization to a CSV transfer file and syncs that file into a target
//! organization, across GitHub.com and GitHub Enterprise Server instances.
//!
//! ## Core Features
//!
//! - **Export**: organization and repository variables to one CSV file
//! - **Sync**: create-only application of a CSV file to a target, with
//!   per-record success/failure/skip accounting
//! - **Resilience**: bounded exponential backoff with cancellation around
//!   every remote call
//! - **Enterprise Support**: optional GHES hostname and HTTP/HTTPS proxying
//!
//! ## Modules
//!
//! - [`config`]: per-run configuration values
//! - [`error`]: typed error kinds for outcome classification
//! - [`github`]: authenticated, proxy-aware API client
//! - [`retry`]: retry policy shared by all remote operations
//! - [`variables`]: record model, variable reader, and variable writer
//! - [`transfer`]: CSV transfer format
//! - [`export`]: export orchestrator
//! - [`sync`]: sync orchestrator

pub mod config;
pub mod error;
pub mod export;
pub mod github;
pub mod retry;
pub mod sync;
pub mod transfer;
pub mod variables;

pub use config::{Config, ProxyConfig, RetrySettings};
pub use error::Error;
pub use export::{run_export, ExportSummary};
pub use github::GitHubClient;
pub use retry::RetryPolicy;
pub use sync::{run_sync, SyncSummary};
pub use variables::{RemoteTarget, VariableReader, VariableRecord, VariableWriter};
