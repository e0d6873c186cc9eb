use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;

use crate::config::ScoringConfig;
use crate::scoring::domain::{
    AnnualScore, CompositeScore, EmployeeProfile, Period, QuarterPeriod, RankEntry, ScoreKey,
    ScoredUser, SubscoreCategory, SubscoreRecord, SubscoreSet, UserId,
};
use crate::scoring::memory::InMemoryScoreStore;
use crate::scoring::providers::{
    NarrativeError, NarrativeGenerator, ProviderError, ProviderSet, SubscoreProvider,
};
use crate::scoring::report::NarrativeContext;
use crate::scoring::repository::{ScoreStore, StorageError};
use crate::scoring::router::scoring_router;
use crate::scoring::service::ScoringService;

pub(super) fn quarter(year: i32, quarter: u8) -> QuarterPeriod {
    QuarterPeriod::new(year, quarter).expect("valid quarter")
}

pub(super) fn key(user: i64, year: i32, q: u8) -> ScoreKey {
    ScoreKey::new(UserId(user), quarter(year, q))
}

pub(super) fn profile(user: i64, job_id: &str, tenure_years: u32, org_id: &str) -> EmployeeProfile {
    EmployeeProfile {
        user_id: UserId(user),
        job_id: job_id.to_string(),
        tenure_years,
        org_id: org_id.to_string(),
    }
}

pub(super) fn config() -> ScoringConfig {
    ScoringConfig {
        external_timeout: Duration::from_millis(200),
    }
}

pub(super) fn build_service(
    providers: ProviderSet,
) -> (Arc<ScoringService<InMemoryScoreStore>>, Arc<InMemoryScoreStore>) {
    let store = Arc::new(InMemoryScoreStore::new());
    let service = Arc::new(ScoringService::new(Arc::clone(&store), providers, config()));
    (service, store)
}

pub(super) fn router_with_service<S>(service: Arc<ScoringService<S>>) -> Router
where
    S: ScoreStore + 'static,
{
    scoring_router(service)
}

/// Writes subscores straight into the store, bypassing providers.
pub(super) async fn seed_subscores(
    store: &InMemoryScoreStore,
    key: ScoreKey,
    weekly: Option<f64>,
    qualitative: Option<f64>,
    peer: Option<f64>,
) {
    for (category, value) in [
        (SubscoreCategory::Weekly, weekly),
        (SubscoreCategory::Qualitative, qualitative),
        (SubscoreCategory::Peer, peer),
    ] {
        if value.is_some() {
            let record = SubscoreRecord::new(key, category, value).expect("valid subscore");
            store.upsert_subscore(record).await.expect("seed subscore");
        }
    }
}

pub(super) fn providers(weekly: Option<f64>, qualitative: Option<f64>, peer: Option<f64>) -> ProviderSet {
    ProviderSet::none()
        .with_provider(SubscoreCategory::Weekly, Arc::new(FixedProvider::new(weekly)))
        .with_provider(
            SubscoreCategory::Qualitative,
            Arc::new(FixedProvider::new(qualitative)),
        )
        .with_provider(SubscoreCategory::Peer, Arc::new(FixedProvider::new(peer)))
}

#[derive(Debug, Default)]
pub(super) struct FixedProvider {
    value: Option<f64>,
    calls: AtomicUsize,
}

impl FixedProvider {
    pub(super) fn new(value: Option<f64>) -> Self {
        Self {
            value,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscoreProvider for FixedProvider {
    async fn compute(&self, _key: &ScoreKey) -> Result<Option<f64>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value)
    }
}

pub(super) struct FailingProvider;

#[async_trait]
impl SubscoreProvider for FailingProvider {
    async fn compute(&self, _key: &ScoreKey) -> Result<Option<f64>, ProviderError> {
        Err(ProviderError::Status(502))
    }
}

pub(super) struct SlowProvider(pub(super) Duration);

#[async_trait]
impl SubscoreProvider for SlowProvider {
    async fn compute(&self, _key: &ScoreKey) -> Result<Option<f64>, ProviderError> {
        tokio::time::sleep(self.0).await;
        Ok(Some(5.0))
    }
}

pub(super) struct FixedNarrator(pub(super) &'static str);

#[async_trait]
impl NarrativeGenerator for FixedNarrator {
    async fn generate(&self, _context: &NarrativeContext) -> Result<String, NarrativeError> {
        Ok(self.0.to_string())
    }
}

pub(super) struct FailingNarrator;

#[async_trait]
impl NarrativeGenerator for FailingNarrator {
    async fn generate(&self, _context: &NarrativeContext) -> Result<String, NarrativeError> {
        Err(NarrativeError::Malformed("missing text".to_string()))
    }
}

pub(super) struct SlowNarrator(pub(super) Duration);

#[async_trait]
impl NarrativeGenerator for SlowNarrator {
    async fn generate(&self, _context: &NarrativeContext) -> Result<String, NarrativeError> {
        tokio::time::sleep(self.0).await;
        Ok("too late".to_string())
    }
}

/// Store whose every call fails as if the database were unreachable.
pub(super) struct UnavailableStore;

fn down<T>() -> Result<T, StorageError> {
    Err(StorageError::Unavailable("connection refused".to_string()))
}

#[async_trait]
impl ScoreStore for UnavailableStore {
    async fn upsert_profile(&self, _profile: EmployeeProfile) -> Result<(), StorageError> {
        down()
    }

    async fn fetch_profile(&self, _user_id: UserId) -> Result<Option<EmployeeProfile>, StorageError> {
        down()
    }

    async fn list_profiles(&self) -> Result<Vec<EmployeeProfile>, StorageError> {
        down()
    }

    async fn upsert_subscore(&self, _record: SubscoreRecord) -> Result<(), StorageError> {
        down()
    }

    async fn fetch_subscores(&self, _key: ScoreKey) -> Result<Option<SubscoreSet>, StorageError> {
        down()
    }

    async fn upsert_composite(&self, _composite: CompositeScore) -> Result<(), StorageError> {
        down()
    }

    async fn fetch_composite(&self, _key: ScoreKey) -> Result<Option<CompositeScore>, StorageError> {
        down()
    }

    async fn fetch_composites(
        &self,
        _user_id: UserId,
        _year: i32,
    ) -> Result<Vec<CompositeScore>, StorageError> {
        down()
    }

    async fn upsert_annual(&self, _annual: AnnualScore) -> Result<(), StorageError> {
        down()
    }

    async fn fetch_annual(
        &self,
        _user_id: UserId,
        _year: i32,
    ) -> Result<Option<AnnualScore>, StorageError> {
        down()
    }

    async fn upsert_ranks(&self, _period: Period, _entries: Vec<RankEntry>) -> Result<(), StorageError> {
        down()
    }

    async fn fetch_rank(
        &self,
        _user_id: UserId,
        _period: Period,
    ) -> Result<Option<RankEntry>, StorageError> {
        down()
    }

    async fn get_scored_users(&self, _period: Period) -> Result<Vec<ScoredUser>, StorageError> {
        down()
    }
}

pub(super) fn unavailable_service() -> Arc<ScoringService<UnavailableStore>> {
    Arc::new(ScoringService::new(
        Arc::new(UnavailableStore),
        ProviderSet::none(),
        config(),
    ))
}

/// In-memory store that stalls for `delay` before every call.
pub(super) struct SlowStore {
    inner: InMemoryScoreStore,
    delay: Duration,
}

impl SlowStore {
    pub(super) fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryScoreStore::new(),
            delay,
        }
    }

    async fn stall(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

#[async_trait]
impl ScoreStore for SlowStore {
    async fn upsert_profile(&self, profile: EmployeeProfile) -> Result<(), StorageError> {
        self.stall().await;
        self.inner.upsert_profile(profile).await
    }

    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<EmployeeProfile>, StorageError> {
        self.stall().await;
        self.inner.fetch_profile(user_id).await
    }

    async fn list_profiles(&self) -> Result<Vec<EmployeeProfile>, StorageError> {
        self.stall().await;
        self.inner.list_profiles().await
    }

    async fn upsert_subscore(&self, record: SubscoreRecord) -> Result<(), StorageError> {
        self.stall().await;
        self.inner.upsert_subscore(record).await
    }

    async fn fetch_subscores(&self, key: ScoreKey) -> Result<Option<SubscoreSet>, StorageError> {
        self.stall().await;
        self.inner.fetch_subscores(key).await
    }

    async fn upsert_composite(&self, composite: CompositeScore) -> Result<(), StorageError> {
        self.stall().await;
        self.inner.upsert_composite(composite).await
    }

    async fn fetch_composite(&self, key: ScoreKey) -> Result<Option<CompositeScore>, StorageError> {
        self.stall().await;
        self.inner.fetch_composite(key).await
    }

    async fn fetch_composites(
        &self,
        user_id: UserId,
        year: i32,
    ) -> Result<Vec<CompositeScore>, StorageError> {
        self.stall().await;
        self.inner.fetch_composites(user_id, year).await
    }

    async fn upsert_annual(&self, annual: AnnualScore) -> Result<(), StorageError> {
        self.stall().await;
        self.inner.upsert_annual(annual).await
    }

    async fn fetch_annual(
        &self,
        user_id: UserId,
        year: i32,
    ) -> Result<Option<AnnualScore>, StorageError> {
        self.stall().await;
        self.inner.fetch_annual(user_id, year).await
    }

    async fn upsert_ranks(&self, period: Period, entries: Vec<RankEntry>) -> Result<(), StorageError> {
        self.stall().await;
        self.inner.upsert_ranks(period, entries).await
    }

    async fn fetch_rank(
        &self,
        user_id: UserId,
        period: Period,
    ) -> Result<Option<RankEntry>, StorageError> {
        self.stall().await;
        self.inner.fetch_rank(user_id, period).await
    }

    async fn get_scored_users(&self, period: Period) -> Result<Vec<ScoredUser>, StorageError> {
        self.stall().await;
        self.inner.get_scored_users(period).await
    }
}

/// Service whose store outlasts the configured call timeout.
pub(super) fn slow_store_service() -> Arc<ScoringService<SlowStore>> {
    Arc::new(ScoringService::new(
        Arc::new(SlowStore::new(Duration::from_secs(2))),
        ProviderSet::none(),
        config(),
    ))
}
