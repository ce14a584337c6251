//! Export orchestrator
//!
//! Drives the variable reader across an organization and all of its
//! repositories, aggregates the records, and hands them to the CSV writer.
//! Per-repository failures are counted and skipped over; only the
//! repository listing itself is fatal to the run.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Error;
use crate::github::GitHubClient;
use crate::retry::RetryPolicy;
use crate::transfer;
use crate::variables::VariableReader;

/// Counters for one export run.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub repositories_found: usize,
    pub repositories_succeeded: usize,
    pub repositories_failed: usize,
    pub variables_exported: usize,
    /// Set when a transfer file was produced; an export that found nothing
    /// writes no file and leaves this `None`.
    pub output_file: Option<PathBuf>,
    pub duration: Duration,
}

impl ExportSummary {
    /// Whether the run should surface a non-zero exit condition.
    pub fn has_failures(&self) -> bool {
        self.repositories_failed > 0
    }
}

/// Export all organization and repository variables to `output`.
pub async fn run_export(
    client: &GitHubClient,
    retry: &RetryPolicy,
    organization: &str,
    output: &Path,
    cancel: &CancellationToken,
) -> Result<ExportSummary> {
    let start = Instant::now();
    let reader = VariableReader::new(client, retry, cancel, organization)?;

    let mut all_variables = Vec::new();

    // Organization variables are best-effort: a failure here is logged and
    // the run continues with repository variables.
    println!("Fetching organization variables for {organization}...");
    match reader.fetch_org_variables().await {
        Ok(org_variables) => {
            println!("✅ Found {} organization variables", org_variables.len());
            all_variables.extend(org_variables);
        }
        Err(err) => {
            warn!(
                "Failed to fetch organization variables for {}: {:#}",
                organization, err
            );
            println!("⚠️  Warning: failed to fetch organization variables: {err}");
        }
    }

    // The repository listing is the backbone of the run; without it there
    // is nothing to iterate and the export aborts.
    println!("Fetching repository list for {organization}...");
    let repos = reader
        .list_repositories()
        .await
        .context("failed to fetch repositories")?;
    println!("Found {} repositories", repos.len());

    let mut succeeded = 0;
    let mut failed = 0;

    for repo in &repos {
        info!("Querying Actions API for variables in {}", repo);
        match reader.fetch_repo_variables(repo).await {
            Ok(repo_variables) => {
                if !repo_variables.is_empty() {
                    println!(
                        "✅ Found {} variables in repository {}",
                        repo_variables.len(),
                        repo
                    );
                    all_variables.extend(repo_variables);
                }
                succeeded += 1;
            }
            Err(err @ Error::Cancelled(_)) => {
                warn!("Export cancelled while processing {}: {:#}", repo, err);
                println!("⚠️  Cancelled while processing repository {repo}");
                failed += 1;
                break;
            }
            Err(err) => {
                warn!("Failed to fetch variables for repo {}: {:#}", repo, err);
                println!("⚠️  Warning: failed to fetch variables for repo {repo}: {err}");
                failed += 1;
            }
        }
    }

    let mut summary = ExportSummary {
        repositories_found: repos.len(),
        repositories_succeeded: succeeded,
        repositories_failed: failed,
        variables_exported: 0,
        output_file: None,
        duration: Duration::ZERO,
    };

    if all_variables.is_empty() {
        println!("No variables found to export.");
        summary.duration = start.elapsed();
        return Ok(summary);
    }

    let written = transfer::write_records(output, &all_variables)
        .with_context(|| format!("cannot write output file {}", output.display()))?;

    summary.variables_exported = written;
    summary.output_file = Some(output.to_path_buf());
    summary.duration = start.elapsed();
    Ok(summary)
}

/// Default output file name for an organization's export.
pub fn default_output_file(organization: &str) -> PathBuf {
    PathBuf::from(format!("{organization}_variables.csv"))
}
