//! Sync orchestrator
//!
//! Reads the desired-state records from a transfer file and applies them to
//! the target organization one at a time, classifying each outcome as
//! succeeded, failed, or skipped. Every record is processed; failures never
//! abort the run early.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Error;
use crate::github::GitHubClient;
use crate::retry::RetryPolicy;
use crate::transfer::{self, REQUIRED_FIELDS};
use crate::variables::{RemoteTarget, VariableRecord, VariableWriter};

/// Counters for one sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration: Duration,
}

impl SyncSummary {
    /// Whether the run should surface a non-zero exit condition.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Sync all records from `input` into `organization`.
pub async fn run_sync(
    client: &GitHubClient,
    retry: &RetryPolicy,
    organization: &str,
    input: &Path,
    cancel: &CancellationToken,
) -> Result<SyncSummary> {
    let start = Instant::now();

    let rows = transfer::read_rows(input)
        .with_context(|| format!("cannot read input file {}", input.display()))?;

    let writer = VariableWriter::new(client, retry, cancel);
    let mut summary = SyncSummary::default();

    for row in rows {
        summary.total += 1;

        if row.len() < REQUIRED_FIELDS {
            warn!("Record {:?} does not have enough columns, skipping", row);
            println!("⚠️  Warning: record {row:?} does not have enough columns. Skipping...");
            summary.skipped += 1;
            continue;
        }

        let record = VariableRecord {
            name: row[0].clone(),
            value: row[1].clone(),
            scope: row[2].clone(),
            visibility: row[3].clone(),
        };

        info!(
            "Syncing variable - Name: {}, Scope: {}, Visibility: {}",
            record.name, record.scope, record.visibility
        );

        let outcome = apply_record(&writer, organization, &record).await;
        match outcome {
            Ok(()) => {
                if record.is_organization_scope() {
                    println!("✅ Added organization variable: {}", record.name);
                } else {
                    println!(
                        "✅ Added repository variable: {} in {}",
                        record.name, record.scope
                    );
                }
                summary.succeeded += 1;
            }
            Err(err) if err.is_missing_repository(organization, &record.scope) => {
                println!("⚠️  Skipping variable {}: {}", record.name, err);
                summary.skipped += 1;
            }
            Err(err @ Error::Cancelled(_)) => {
                warn!("Sync cancelled while processing {}: {:#}", record.name, err);
                println!("❌ Cancelled while syncing variable {}", record.name);
                summary.failed += 1;
                break;
            }
            Err(err) => {
                println!(
                    "❌ Error adding {} variable {}: {:#}",
                    if record.is_organization_scope() {
                        "organization"
                    } else {
                        "repository"
                    },
                    record.name,
                    err
                );
                summary.failed += 1;
            }
        }
    }

    summary.duration = start.elapsed();
    Ok(summary)
}

/// Apply one record against the target organization.
async fn apply_record(
    writer: &VariableWriter<'_>,
    organization: &str,
    record: &VariableRecord,
) -> crate::error::Result<()> {
    let target = if record.is_organization_scope() {
        RemoteTarget::organization(organization)?
    } else {
        RemoteTarget::repository(organization, &record.scope)?
    };
    writer.create_variable(&target, record).await
}
