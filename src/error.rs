//! Error kinds for the variable migration engine
//!
//! Every failure surfaced by the core components is one of these variants,
//! so orchestrators classify outcomes by matching on the variant rather
//! than comparing formatted messages.

use thiserror::Error;

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds produced by the migration engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid token, hostname, or proxy setting. Fatal before
    /// any network call is made.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Malformed record or target. Fails the single item, never the run.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The existence probe came back negative. The sync orchestrator
    /// classifies this as a skip, not a failure.
    #[error("repository {repo} does not exist in organization {org}")]
    RepositoryNotFound { org: String, repo: String },

    /// A remote operation failed after retries were exhausted.
    #[error("{context}")]
    Remote {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Deadline elapsed or the run was cancelled mid-operation.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    /// Build a `Remote` error wrapping an underlying cause.
    pub fn remote(context: impl Into<String>, source: anyhow::Error) -> Self {
        Error::Remote {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Whether this error is the skip-classified missing-repository case
    /// for the given organization/repository pair.
    pub fn is_missing_repository(&self, org: &str, repo: &str) -> bool {
        matches!(
            self,
            Error::RepositoryNotFound { org: o, repo: r } if o == org && r == repo
        )
    }
}
