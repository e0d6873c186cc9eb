use async_trait::async_trait;

use super::domain::{
    AnnualScore, CompositeScore, EmployeeProfile, Period, RankEntry, ScoreKey, ScoredUser,
    SubscoreRecord, SubscoreSet, UserId,
};

/// Persistence boundary for subscores, composites, annual rollups, and ranks.
///
/// Expected absence is `Ok(None)` / an empty list; `Err` is reserved for infrastructure
/// failures. Implementations must apply `upsert_subscore` as a single-column merge so that
/// concurrent writers of different categories for the same key never lose updates.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn upsert_profile(&self, profile: EmployeeProfile) -> Result<(), StorageError>;
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<EmployeeProfile>, StorageError>;
    async fn list_profiles(&self) -> Result<Vec<EmployeeProfile>, StorageError>;

    /// Inserts the row or updates only `record.category`, leaving other columns untouched.
    async fn upsert_subscore(&self, record: SubscoreRecord) -> Result<(), StorageError>;
    async fn fetch_subscores(&self, key: ScoreKey) -> Result<Option<SubscoreSet>, StorageError>;

    /// Full replace of the composite row for its key.
    async fn upsert_composite(&self, composite: CompositeScore) -> Result<(), StorageError>;
    async fn fetch_composite(&self, key: ScoreKey) -> Result<Option<CompositeScore>, StorageError>;
    async fn fetch_composites(
        &self,
        user_id: UserId,
        year: i32,
    ) -> Result<Vec<CompositeScore>, StorageError>;

    async fn upsert_annual(&self, annual: AnnualScore) -> Result<(), StorageError>;
    async fn fetch_annual(&self, user_id: UserId, year: i32)
        -> Result<Option<AnnualScore>, StorageError>;

    /// Replaces every rank row of `period` with `entries`.
    async fn upsert_ranks(&self, period: Period, entries: Vec<RankEntry>) -> Result<(), StorageError>;
    async fn fetch_rank(&self, user_id: UserId, period: Period)
        -> Result<Option<RankEntry>, StorageError>;

    /// Users holding a final score for `period`, joined with their ranking attributes.
    async fn get_scored_users(&self, period: Period) -> Result<Vec<ScoredUser>, StorageError>;
}

/// Error enumeration for persistence failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("score store unavailable: {0}")]
    Unavailable(String),
    #[error("score store {operation} timed out after {after_ms} ms")]
    Timeout {
        operation: &'static str,
        after_ms: u128,
    },
}

impl StorageError {
    pub fn timeout(operation: &'static str, after: std::time::Duration) -> Self {
        Self::Timeout {
            operation,
            after_ms: after.as_millis(),
        }
    }
}

/// Runs a store call under `limit`, mapping expiry to [`StorageError::Timeout`].
pub(crate) async fn bounded<T, F>(
    limit: std::time::Duration,
    operation: &'static str,
    call: F,
) -> Result<T, StorageError>
where
    F: std::future::Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::timeout(operation, limit)),
    }
}
