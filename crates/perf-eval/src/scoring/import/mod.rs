//! CSV import of employee profiles and subscores.
//!
//! Rows that fail to parse or validate are logged and counted; a storage failure aborts the
//! import because later rows would hit the same unavailable store.

mod parser;

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::repository::{bounded, ScoreStore, StorageError};

pub use parser::RejectedRow;
use parser::ParsedRow;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Storage(StorageError),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read import file: {}", err),
            ImportError::Csv(err) => write!(f, "invalid CSV data: {}", err),
            ImportError::Storage(err) => write!(f, "could not store imported rows: {}", err),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::Storage(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<StorageError> for ImportError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

/// Per-file tally of stored and rejected rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub rejected: Vec<RejectedRow>,
}

impl ImportSummary {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    fn reject(&mut self, source: &str, rejection: RejectedRow) {
        warn!(source, line = rejection.line, reason = %rejection.reason, "skipping CSV row");
        self.rejected.push(rejection);
    }
}

/// Imports `user_id,job_id,tenure_years,org_id` rows.
pub async fn import_profiles<S, R>(
    store: &S,
    reader: R,
    timeout: Duration,
) -> Result<ImportSummary, ImportError>
where
    S: ScoreStore + ?Sized,
    R: Read,
{
    let mut summary = ImportSummary::default();
    for row in parser::parse_profiles(reader)? {
        match row {
            ParsedRow::Accepted(profile) => {
                bounded(timeout, "upsert_profile", store.upsert_profile(profile)).await?;
                summary.imported += 1;
            }
            ParsedRow::Rejected(rejection) => summary.reject("profiles", rejection),
        }
    }
    info!(
        imported = summary.imported,
        rejected = summary.rejected_count(),
        "profiles imported"
    );
    Ok(summary)
}

/// Imports `user_id,year,quarter,category,value` rows; an empty value means "not computed".
pub async fn import_subscores<S, R>(
    store: &S,
    reader: R,
    timeout: Duration,
) -> Result<ImportSummary, ImportError>
where
    S: ScoreStore + ?Sized,
    R: Read,
{
    let mut summary = ImportSummary::default();
    for row in parser::parse_subscores(reader)? {
        match row {
            ParsedRow::Accepted(record) => {
                bounded(timeout, "upsert_subscore", store.upsert_subscore(record)).await?;
                summary.imported += 1;
            }
            ParsedRow::Rejected(rejection) => summary.reject("subscores", rejection),
        }
    }
    info!(
        imported = summary.imported,
        rejected = summary.rejected_count(),
        "subscores imported"
    );
    Ok(summary)
}

pub async fn import_profiles_file<S>(
    store: &S,
    path: &Path,
    timeout: Duration,
) -> Result<ImportSummary, ImportError>
where
    S: ScoreStore + ?Sized,
{
    let file = File::open(path)?;
    import_profiles(store, file, timeout).await
}

pub async fn import_subscores_file<S>(
    store: &S,
    path: &Path,
    timeout: Duration,
) -> Result<ImportSummary, ImportError>
where
    S: ScoreStore + ?Sized,
{
    let file = File::open(path)?;
    import_subscores(store, file, timeout).await
}
