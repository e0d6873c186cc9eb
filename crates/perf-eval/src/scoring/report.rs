use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::composite::{degraded_warnings, Grade};
use super::domain::{Period, ScoreKey, SubscoreSet, UserId};
use super::providers::NarrativeGenerator;
use super::repository::{bounded, ScoreStore};
use super::service::ScoringServiceError;
use super::views::{EvaluationReport, RankingInfo, ReportScores};

/// Structured input handed to the narrative generator.
#[derive(Debug, Clone, Serialize)]
pub struct NarrativeContext {
    pub user_id: UserId,
    pub period: Period,
    pub final_score: f64,
    pub grade: Grade,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub individual_scores: Option<SubscoreSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking: Option<RankingInfo>,
    pub partial_data: bool,
}

/// Deterministic text used whenever the generator is absent or fails.
pub fn fallback_narrative(context: &NarrativeContext) -> String {
    let mut text = format!(
        "Final score for {} is {:.2} (grade {}).",
        context.period,
        context.final_score,
        context.grade.label()
    );

    if let Some(ranking) = &context.ranking {
        text.push_str(&format!(
            " Ranked {} of {} within the job cohort ({}) and {} of {} within the team ({}).",
            ranking.cohort_rank,
            ranking.cohort_size,
            ranking.cohort_percentile,
            ranking.team_rank,
            ranking.team_size,
            ranking.team_percentile
        ));
    }

    if context.partial_data {
        text.push_str(" Some evaluation inputs were unavailable, so this score reflects partial data.");
    }

    text
}

struct LoadedScores {
    scores: ReportScores,
    usable: bool,
    warnings: Vec<String>,
}

/// Reads persisted scores and ranks and attaches narrative text.
pub struct ReportAssembler<S> {
    store: Arc<S>,
    narrator: Option<Arc<dyn NarrativeGenerator>>,
    timeout: Duration,
}

impl<S> ReportAssembler<S>
where
    S: ScoreStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        narrator: Option<Arc<dyn NarrativeGenerator>>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            narrator,
            timeout,
        }
    }

    pub async fn assemble(
        &self,
        user_id: UserId,
        period: Period,
    ) -> Result<EvaluationReport, ScoringServiceError> {
        let Some(loaded) = self.load_scores(user_id, period).await? else {
            return Ok(EvaluationReport {
                user_id,
                period,
                success: false,
                message: format!("no score recorded for user {user_id} in {period}"),
                ranking_info: None,
                scores: None,
                result_text: None,
                warnings: Vec::new(),
            });
        };

        let rank = bounded(
            self.timeout,
            "fetch_rank",
            self.store.fetch_rank(user_id, period),
        )
        .await?;
        let ranking_info = rank.as_ref().map(RankingInfo::from);

        let partial_data = !loaded.warnings.is_empty();
        let mut warnings = loaded.warnings;
        if ranking_info.is_none() {
            warnings.push(format!("ranking has not been computed for {period}"));
        }

        let context = NarrativeContext {
            user_id,
            period,
            final_score: loaded.scores.final_score,
            grade: loaded.scores.grade,
            individual_scores: loaded.scores.individual_scores,
            ranking: ranking_info.clone(),
            partial_data,
        };
        let result_text = self.narrate(&context).await;

        let message = if !loaded.usable {
            "insufficient data: no usable subscores for this period".to_string()
        } else if partial_data {
            "report assembled from partial data".to_string()
        } else {
            "report assembled".to_string()
        };

        Ok(EvaluationReport {
            user_id,
            period,
            success: loaded.usable,
            message,
            ranking_info,
            scores: Some(loaded.scores),
            result_text: Some(result_text),
            warnings,
        })
    }

    async fn load_scores(
        &self,
        user_id: UserId,
        period: Period,
    ) -> Result<Option<LoadedScores>, ScoringServiceError> {
        let loaded = match period.as_quarter() {
            Some(quarter) => bounded(
                self.timeout,
                "fetch_composite",
                self.store.fetch_composite(ScoreKey::new(user_id, quarter)),
            )
            .await?
            .map(|composite| LoadedScores {
                usable: composite.is_usable(),
                warnings: degraded_warnings(&composite.subscores()),
                scores: ReportScores::from(&composite),
            }),
            None => bounded(
                self.timeout,
                "fetch_annual",
                self.store.fetch_annual(user_id, period.year),
            )
            .await?
            .map(|annual| LoadedScores {
                usable: !annual.contributions.is_empty(),
                warnings: annual
                    .missing_quarters
                    .iter()
                    .map(|quarter| {
                        format!("{} has no quarterly score; skipped in annual average", quarter.label())
                    })
                    .collect(),
                scores: ReportScores::from(&annual),
            }),
        };
        Ok(loaded)
    }

    async fn narrate(&self, context: &NarrativeContext) -> String {
        let Some(narrator) = &self.narrator else {
            debug!(user_id = %context.user_id, "no narrative generator configured; using template");
            return fallback_narrative(context);
        };

        match tokio::time::timeout(self.timeout, narrator.generate(context)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(Ok(_)) => {
                warn!(user_id = %context.user_id, "narrative generator returned blank text; using template");
                fallback_narrative(context)
            }
            Ok(Err(err)) => {
                warn!(user_id = %context.user_id, error = %err, "narrative generation failed; using template");
                fallback_narrative(context)
            }
            Err(_) => {
                warn!(
                    user_id = %context.user_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "narrative generation timed out; using template"
                );
                fallback_narrative(context)
            }
        }
    }
}
