use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::domain::{
    AnnualScore, CompositeScore, EmployeeProfile, Period, RankEntry, ScoreKey, ScoredUser,
    SubscoreRecord, SubscoreSet, Term, UserId,
};
use super::repository::{ScoreStore, StorageError};

#[derive(Debug, Default)]
struct StoreState {
    profiles: BTreeMap<UserId, EmployeeProfile>,
    subscores: BTreeMap<ScoreKey, SubscoreSet>,
    composites: BTreeMap<ScoreKey, CompositeScore>,
    annuals: BTreeMap<(UserId, i32), AnnualScore>,
    ranks: BTreeMap<Period, Vec<RankEntry>>,
}

/// Process-local [`ScoreStore`]. Every operation runs under one lock, which makes the
/// single-column subscore merge atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryScoreStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("score store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ScoreStore for InMemoryScoreStore {
    async fn upsert_profile(&self, profile: EmployeeProfile) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.profiles.insert(profile.user_id, profile);
        Ok(())
    }

    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<EmployeeProfile>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.profiles.get(&user_id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<EmployeeProfile>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.profiles.values().cloned().collect())
    }

    async fn upsert_subscore(&self, record: SubscoreRecord) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard
            .subscores
            .entry(record.key)
            .or_default()
            .set(record.category, record.value);
        Ok(())
    }

    async fn fetch_subscores(&self, key: ScoreKey) -> Result<Option<SubscoreSet>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.subscores.get(&key).copied())
    }

    async fn upsert_composite(&self, composite: CompositeScore) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.composites.insert(composite.key(), composite);
        Ok(())
    }

    async fn fetch_composite(&self, key: ScoreKey) -> Result<Option<CompositeScore>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.composites.get(&key).cloned())
    }

    async fn fetch_composites(
        &self,
        user_id: UserId,
        year: i32,
    ) -> Result<Vec<CompositeScore>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .composites
            .values()
            .filter(|composite| composite.user_id == user_id && composite.period.year == year)
            .cloned()
            .collect())
    }

    async fn upsert_annual(&self, annual: AnnualScore) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.annuals.insert((annual.user_id, annual.year), annual);
        Ok(())
    }

    async fn fetch_annual(
        &self,
        user_id: UserId,
        year: i32,
    ) -> Result<Option<AnnualScore>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.annuals.get(&(user_id, year)).cloned())
    }

    async fn upsert_ranks(&self, period: Period, entries: Vec<RankEntry>) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.ranks.insert(period, entries);
        Ok(())
    }

    async fn fetch_rank(
        &self,
        user_id: UserId,
        period: Period,
    ) -> Result<Option<RankEntry>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .ranks
            .get(&period)
            .and_then(|entries| entries.iter().find(|entry| entry.user_id == user_id))
            .cloned())
    }

    async fn get_scored_users(&self, period: Period) -> Result<Vec<ScoredUser>, StorageError> {
        let guard = self.lock()?;
        let scores: Vec<(UserId, f64)> = match period.term {
            Term::Quarter(quarter) => guard
                .composites
                .values()
                .filter(|c| c.period.year == period.year && c.period.quarter == quarter)
                .map(|c| (c.user_id, c.final_score))
                .collect(),
            Term::Annual => guard
                .annuals
                .values()
                .filter(|annual| annual.year == period.year)
                .map(|annual| (annual.user_id, annual.final_score))
                .collect(),
        };

        let mut users = Vec::with_capacity(scores.len());
        for (user_id, final_score) in scores {
            match guard.profiles.get(&user_id) {
                Some(profile) => users.push(ScoredUser::from_profile(profile, Some(final_score))),
                None => debug!(%user_id, %period, "scored user has no profile; not rankable"),
            }
        }
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::domain::{Quarter, QuarterPeriod, SubscoreCategory};
    use chrono::Utc;

    fn key(user: i64) -> ScoreKey {
        ScoreKey::new(UserId(user), QuarterPeriod::new(2025, 1).expect("valid"))
    }

    fn profile(user: i64) -> EmployeeProfile {
        EmployeeProfile {
            user_id: UserId(user),
            job_id: "eng".to_string(),
            tenure_years: 3,
            org_id: "platform".to_string(),
        }
    }

    #[tokio::test]
    async fn subscore_upserts_merge_columns() {
        let store = InMemoryScoreStore::new();
        store
            .upsert_subscore(SubscoreRecord::new(key(1), SubscoreCategory::Weekly, Some(3.0)).unwrap())
            .await
            .expect("weekly write");
        store
            .upsert_subscore(SubscoreRecord::new(key(1), SubscoreCategory::Peer, Some(4.0)).unwrap())
            .await
            .expect("peer write");

        let row = store
            .fetch_subscores(key(1))
            .await
            .expect("fetch")
            .expect("row present");
        assert_eq!(row.weekly, Some(3.0));
        assert_eq!(row.peer, Some(4.0));
        assert_eq!(row.qualitative, None);
    }

    #[tokio::test]
    async fn concurrent_category_writers_do_not_lose_updates() {
        let store = InMemoryScoreStore::new();
        let mut handles = Vec::new();
        for user in 0..20 {
            for (category, value) in [
                (SubscoreCategory::Weekly, 1.0),
                (SubscoreCategory::Qualitative, 2.0),
                (SubscoreCategory::Peer, 3.0),
            ] {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    let record = SubscoreRecord::new(key(user), category, Some(value)).unwrap();
                    store.upsert_subscore(record).await
                }));
            }
        }
        for handle in handles {
            handle.await.expect("task joins").expect("write succeeds");
        }

        for user in 0..20 {
            let row = store.fetch_subscores(key(user)).await.unwrap().unwrap();
            assert_eq!(
                (row.weekly, row.qualitative, row.peer),
                (Some(1.0), Some(2.0), Some(3.0))
            );
        }
    }

    #[tokio::test]
    async fn composite_upsert_is_idempotent() {
        let store = InMemoryScoreStore::new();
        let composite = CompositeScore::compute(
            key(1),
            &SubscoreSet {
                weekly: Some(4.0),
                qualitative: Some(3.0),
                peer: None,
            },
            Utc::now(),
        );

        store.upsert_composite(composite.clone()).await.unwrap();
        let once = store.fetch_composite(key(1)).await.unwrap();
        store.upsert_composite(composite.clone()).await.unwrap();
        let twice = store.fetch_composite(key(1)).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice, Some(composite));
        assert_eq!(store.fetch_composites(UserId(1), 2025).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rank_upsert_replaces_whole_period() {
        let store = InMemoryScoreStore::new();
        let period = Period::quarterly(2025, Quarter::Q1);
        let entry = |user: i64, rank: u32| RankEntry {
            user_id: UserId(user),
            period,
            cohort_rank: rank,
            cohort_size: 2,
            team_rank: rank,
            team_size: 2,
        };

        store
            .upsert_ranks(period, vec![entry(1, 1), entry(2, 2)])
            .await
            .unwrap();
        store.upsert_ranks(period, vec![entry(2, 1)]).await.unwrap();

        assert!(store.fetch_rank(UserId(1), period).await.unwrap().is_none());
        assert_eq!(
            store
                .fetch_rank(UserId(2), period)
                .await
                .unwrap()
                .map(|e| e.cohort_rank),
            Some(1)
        );
    }

    #[tokio::test]
    async fn scored_users_join_profiles_and_skip_unknown_users() {
        let store = InMemoryScoreStore::new();
        store.upsert_profile(profile(1)).await.unwrap();
        for user in [1, 2] {
            let composite = CompositeScore::compute(
                key(user),
                &SubscoreSet {
                    weekly: Some(2.0),
                    qualitative: None,
                    peer: None,
                },
                Utc::now(),
            );
            store.upsert_composite(composite).await.unwrap();
        }

        let users = store
            .get_scored_users(Period::quarterly(2025, Quarter::Q1))
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, UserId(1));
        assert_eq!(users[0].final_score, Some(0.8));
        assert_eq!(store.fetch_profile(UserId(1)).await.unwrap(), Some(profile(1)));
        assert!(store.fetch_profile(UserId(2)).await.unwrap().is_none());
        assert!(store
            .get_scored_users(Period::quarterly(2025, Quarter::Q2))
            .await
            .unwrap()
            .is_empty());
    }
}
