use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::annual;
use super::composite::degraded_warnings;
use super::domain::{
    AnnualScore, CompositeScore, Period, QuarterPeriod, ScoreKey, ScoreValidationError,
    SubscoreCategory, SubscoreRecord, Term, UserId,
};
use super::providers::ProviderSet;
use super::ranking::compute_ranks;
use super::report::ReportAssembler;
use super::repository::{bounded, ScoreStore, StorageError};
use super::views::{
    BatchSummary, EvaluationReport, PeriodRun, RankingSummary, ScoreEvaluation, SubscoreRefresh,
};
use crate::config::ScoringConfig;

/// Service composing subscore providers, the score store, ranking, and report assembly.
pub struct ScoringService<S> {
    store: Arc<S>,
    providers: ProviderSet,
    config: ScoringConfig,
    reports: ReportAssembler<S>,
    rank_locks: Mutex<HashMap<Period, Arc<Mutex<()>>>>,
}

impl<S> ScoringService<S>
where
    S: ScoreStore + 'static,
{
    pub fn new(store: Arc<S>, providers: ProviderSet, config: ScoringConfig) -> Self {
        let reports = ReportAssembler::new(
            Arc::clone(&store),
            providers.narrator().cloned(),
            config.external_timeout,
        );

        Self {
            store,
            providers,
            config,
            reports,
            rank_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    /// Asks every configured provider for a fresh subscore and persists the valid ones.
    ///
    /// A provider that finds no data, fails, times out, or returns an out-of-scale value leaves
    /// the stored column untouched. Storage failures propagate.
    pub async fn refresh_subscores(
        &self,
        key: ScoreKey,
    ) -> Result<SubscoreRefresh, ScoringServiceError> {
        let mut refresh = SubscoreRefresh::default();
        let limit = self.config.external_timeout;

        for category in SubscoreCategory::ALL {
            let Some(provider) = self.providers.provider(category) else {
                refresh.not_configured.push(category);
                continue;
            };

            let value = match tokio::time::timeout(limit, provider.compute(&key)).await {
                Ok(Ok(Some(value))) => value,
                Ok(Ok(None)) => {
                    debug!(user_id = %key.user_id, period = %key.period, %category, "provider found no data");
                    refresh.unavailable.push(category);
                    continue;
                }
                Ok(Err(err)) => {
                    warn!(user_id = %key.user_id, period = %key.period, %category, error = %err, "subscore provider failed");
                    refresh.unavailable.push(category);
                    continue;
                }
                Err(_) => {
                    warn!(
                        user_id = %key.user_id,
                        period = %key.period,
                        %category,
                        timeout_ms = limit.as_millis() as u64,
                        "subscore provider timed out"
                    );
                    refresh.unavailable.push(category);
                    continue;
                }
            };

            let record = match SubscoreRecord::new(key, category, Some(value)) {
                Ok(record) => record,
                Err(err) => {
                    warn!(user_id = %key.user_id, period = %key.period, %category, error = %err, "discarding invalid provider subscore");
                    refresh.unavailable.push(category);
                    continue;
                }
            };

            bounded(limit, "upsert_subscore", self.store.upsert_subscore(record)).await?;
            refresh.refreshed.push(category);
        }

        Ok(refresh)
    }

    /// Recomputes and persists the composite score for one user and quarter.
    pub async fn evaluate(&self, key: ScoreKey) -> Result<ScoreEvaluation, ScoringServiceError> {
        let limit = self.config.external_timeout;
        let refresh = self.refresh_subscores(key).await?;

        let subscores = bounded(limit, "fetch_subscores", self.store.fetch_subscores(key))
            .await?
            .unwrap_or_default();
        let composite = CompositeScore::compute(key, &subscores, Utc::now());
        bounded(
            limit,
            "upsert_composite",
            self.store.upsert_composite(composite.clone()),
        )
        .await?;

        let mut errors = degraded_warnings(&subscores);
        for category in &refresh.unavailable {
            if subscores.get(*category).is_some() {
                errors.push(format!(
                    "{category} provider unavailable; kept previously stored subscore"
                ));
            }
        }

        let usable = composite.is_usable();
        let message = if !usable {
            "insufficient data: no usable subscores for this period"
        } else if subscores.missing_categories().is_empty() {
            "evaluation complete"
        } else {
            "evaluation completed with partial data"
        };

        info!(
            user_id = %key.user_id,
            period = %key.period,
            final_score = composite.final_score,
            usable,
            "composite score stored"
        );

        Ok(ScoreEvaluation::from_composite(
            &composite, usable, message, errors,
        ))
    }

    /// Validated direct write of one subscore column.
    pub async fn record_subscore(&self, record: SubscoreRecord) -> Result<(), ScoringServiceError> {
        let record = SubscoreRecord::new(record.key, record.category, record.value)?;
        bounded(
            self.config.external_timeout,
            "upsert_subscore",
            self.store.upsert_subscore(record),
        )
        .await?;
        Ok(())
    }

    /// Evaluates each user in turn. Failures are logged and tallied, never raised.
    pub async fn evaluate_batch(&self, period: QuarterPeriod, users: &[UserId]) -> BatchSummary {
        let mut summary = BatchSummary::new(period.period());

        for user_id in users {
            match self.evaluate(ScoreKey::new(*user_id, period)).await {
                Ok(evaluation) if evaluation.success => summary.record_success(),
                Ok(evaluation) => {
                    warn!(%user_id, %period, message = %evaluation.message, "evaluation had no usable data");
                    summary.record_failure(*user_id, evaluation.message);
                }
                Err(err) => {
                    warn!(%user_id, %period, error = %err, "evaluation failed; continuing batch");
                    summary.record_failure(*user_id, err.to_string());
                }
            }
        }

        info!(
            %period,
            success_count = summary.success_count,
            failed_count = summary.failed_count,
            "batch evaluation finished"
        );
        summary
    }

    /// Every user with a stored profile.
    pub async fn enrolled_users(&self) -> Result<Vec<UserId>, ScoringServiceError> {
        let profiles = bounded(
            self.config.external_timeout,
            "list_profiles",
            self.store.list_profiles(),
        )
        .await?;
        Ok(profiles.into_iter().map(|profile| profile.user_id).collect())
    }

    /// Fully recomputes the ranks of `period`. Runs for the same period are serialized.
    pub async fn rank_period(&self, period: Period) -> Result<RankingSummary, ScoringServiceError> {
        let period_lock = {
            let mut locks = self.rank_locks.lock().await;
            Arc::clone(locks.entry(period).or_default())
        };
        let guard = period_lock.lock().await;
        let result = self.recompute_ranks(period).await;
        drop(guard);
        self.release_rank_lock(period, period_lock).await;

        let summary = result?;
        info!(%period, ranked = summary.ranked_count, "ranks recomputed");
        Ok(summary)
    }

    async fn recompute_ranks(&self, period: Period) -> Result<RankingSummary, ScoringServiceError> {
        let limit = self.config.external_timeout;
        let scored = bounded(limit, "get_scored_users", self.store.get_scored_users(period)).await?;
        let entries = compute_ranks(period, &scored);

        let scores: Vec<f64> = scored
            .iter()
            .filter_map(|user| user.final_score)
            .filter(|score| score.is_finite())
            .collect();
        let summary = RankingSummary::from_scores(period, entries.len(), &scores);

        bounded(limit, "upsert_ranks", self.store.upsert_ranks(period, entries)).await?;
        Ok(summary)
    }

    /// Drops the period's lock entry once no other run holds or waits on it.
    async fn release_rank_lock(&self, period: Period, period_lock: Arc<Mutex<()>>) {
        let mut locks = self.rank_locks.lock().await;
        // one reference in the map, one here; released under the map lock
        let idle = Arc::strong_count(&period_lock) == 2;
        drop(period_lock);
        if idle {
            locks.remove(&period);
        }
    }

    #[cfg(test)]
    pub(crate) async fn tracked_rank_periods(&self) -> usize {
        self.rank_locks.lock().await.len()
    }

    /// Weighted annual score over the quarters with a usable stored composite.
    ///
    /// A quarter whose composite had no usable subscore is skipped like a missing one.
    /// Returns `Ok(None)` when no quarter of `year` is usable.
    pub async fn rollup_annual(
        &self,
        user_id: UserId,
        year: i32,
    ) -> Result<Option<AnnualScore>, ScoringServiceError> {
        let limit = self.config.external_timeout;
        let composites = bounded(
            limit,
            "fetch_composites",
            self.store.fetch_composites(user_id, year),
        )
        .await?;

        let quarterly: Vec<(_, f64)> = composites
            .iter()
            .filter(|composite| {
                let usable = composite.is_usable();
                if !usable {
                    debug!(%user_id, period = %composite.period, "quarter has no usable subscores; skipped in rollup");
                }
                usable
            })
            .map(|composite| (composite.period.quarter, composite.final_score))
            .collect();

        let Some(annual) = annual::rollup_annual(user_id, year, &quarterly, Utc::now()) else {
            debug!(%user_id, year, "no usable quarterly composites to roll up");
            return Ok(None);
        };

        if !annual.missing_quarters.is_empty() {
            debug!(%user_id, year, missing = ?annual.missing_quarters, "annual rollup skipped quarters");
        }

        bounded(limit, "upsert_annual", self.store.upsert_annual(annual.clone())).await?;
        Ok(Some(annual))
    }

    /// Rolls up each user's year; users without quarterly data count as failures.
    pub async fn rollup_batch(&self, year: i32, users: &[UserId]) -> BatchSummary {
        let mut summary = BatchSummary::new(Period::annual(year));

        for user_id in users {
            match self.rollup_annual(*user_id, year).await {
                Ok(Some(_)) => summary.record_success(),
                Ok(None) => summary.record_failure(*user_id, "no usable quarterly scores for year"),
                Err(err) => {
                    warn!(%user_id, year, error = %err, "annual rollup failed; continuing batch");
                    summary.record_failure(*user_id, err.to_string());
                }
            }
        }

        summary
    }

    /// Scores every listed user for `period`, then recomputes the period's ranks.
    pub async fn run_period(
        &self,
        period: Period,
        users: &[UserId],
    ) -> Result<PeriodRun, ScoringServiceError> {
        let batch = match period.term {
            Term::Quarter(quarter) => {
                self.evaluate_batch(
                    QuarterPeriod {
                        year: period.year,
                        quarter,
                    },
                    users,
                )
                .await
            }
            Term::Annual => self.rollup_batch(period.year, users).await,
        };
        let ranking = self.rank_period(period).await?;
        Ok(PeriodRun { batch, ranking })
    }

    pub async fn report(
        &self,
        user_id: UserId,
        period: Period,
    ) -> Result<EvaluationReport, ScoringServiceError> {
        self.reports.assemble(user_id, period).await
    }
}

/// Error raised by the scoring service.
#[derive(Debug, thiserror::Error)]
pub enum ScoringServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Validation(#[from] ScoreValidationError),
}
