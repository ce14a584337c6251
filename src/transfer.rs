//! CSV transfer format
//!
//! The file produced by export and consumed by sync: a `Name,Value,Scope,
//! Visibility` header followed by one positional row per record. Reading is
//! deliberately lenient: short rows are handed back raw so the sync
//! orchestrator can count them as skipped instead of crashing the run.

use std::path::Path;

use anyhow::{Context, Result};

use crate::variables::VariableRecord;

/// Fixed header and column order of the transfer file.
pub const CSV_HEADER: [&str; 4] = ["Name", "Value", "Scope", "Visibility"];

/// Number of columns a row needs to be a valid record.
pub const REQUIRED_FIELDS: usize = 4;

/// Write records to `path` in the transfer format.
///
/// Records with an empty name are never written; the reader upholds the
/// same invariant on its side.
pub fn write_records(path: &Path, records: &[VariableRecord]) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("cannot create file {}", path.display()))?;

    writer
        .write_record(CSV_HEADER)
        .context("failed to write CSV header")?;

    let mut written = 0;
    for record in records {
        if record.name.is_empty() {
            continue;
        }
        writer
            .write_record([
                record.name.as_str(),
                record.value.as_str(),
                record.scope.as_str(),
                record.visibility.as_str(),
            ])
            .with_context(|| format!("failed to write variable {} to CSV", record.name))?;
        written += 1;
    }

    writer.flush().context("failed to flush CSV output")?;
    Ok(written)
}

/// Read the raw rows following the header from `path`.
///
/// Rows keep their positional fields as-is, including rows with fewer than
/// [`REQUIRED_FIELDS`] columns; classifying those is the caller's job.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("cannot open file {}", path.display()))?;

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("cannot read file {}", path.display()))?;
        rows.push(row.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
