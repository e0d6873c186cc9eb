use chrono::{DateTime, Utc};
use serde::Serialize;

use super::composite::{CategoryWeights, Grade};
use super::domain::{
    AnnualScore, CompositeScore, Period, QuarterContribution, QuarterPeriod, RankEntry,
    SubscoreCategory, SubscoreSet, UserId,
};
use super::ranking::percentile_label;

/// Outcome of asking every configured provider for a fresh subscore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubscoreRefresh {
    pub refreshed: Vec<SubscoreCategory>,
    pub unavailable: Vec<SubscoreCategory>,
    pub not_configured: Vec<SubscoreCategory>,
}

/// Response of a single-user quarterly evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreEvaluation {
    pub user_id: UserId,
    pub period: QuarterPeriod,
    pub success: bool,
    pub message: String,
    pub final_score: f64,
    pub grade: Grade,
    pub individual_scores: SubscoreSet,
    pub weights: CategoryWeights,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

impl ScoreEvaluation {
    pub fn from_composite(
        composite: &CompositeScore,
        success: bool,
        message: impl Into<String>,
        errors: Vec<String>,
    ) -> Self {
        Self {
            user_id: composite.user_id,
            period: composite.period,
            success,
            message: message.into(),
            final_score: composite.final_score,
            grade: composite.grade(),
            individual_scores: composite.subscores(),
            weights: CategoryWeights::STANDARD,
            errors,
            computed_at: composite.computed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub user_id: UserId,
    pub reason: String,
}

/// Tally of a batch run; one user's failure never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub period: Period,
    pub success_count: usize,
    pub failed_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            success_count: 0,
            failed_count: 0,
            failures: Vec::new(),
        }
    }

    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_failure(&mut self, user_id: UserId, reason: impl Into<String>) {
        self.failed_count += 1;
        self.failures.push(BatchFailure {
            user_id,
            reason: reason.into(),
        });
    }
}

/// Score statistics over the users ranked in one recompute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingSummary {
    pub period: Period,
    pub ranked_count: usize,
    pub average_score: Option<f64>,
    pub max_score: Option<f64>,
    pub min_score: Option<f64>,
}

impl RankingSummary {
    pub fn from_scores(period: Period, ranked_count: usize, scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self {
                period,
                ranked_count,
                average_score: None,
                max_score: None,
                min_score: None,
            };
        }

        let total: f64 = scores.iter().sum();
        let max = scores.iter().copied().fold(f64::MIN, f64::max);
        let min = scores.iter().copied().fold(f64::MAX, f64::min);
        Self {
            period,
            ranked_count,
            average_score: Some(super::composite::round_score(total / scores.len() as f64)),
            max_score: Some(max),
            min_score: Some(min),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodRun {
    pub batch: BatchSummary,
    pub ranking: RankingSummary,
}

/// Rank positions plus their one-decimal percentile labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingInfo {
    pub cohort_rank: u32,
    pub cohort_size: u32,
    pub cohort_percentile: String,
    pub team_rank: u32,
    pub team_size: u32,
    pub team_percentile: String,
}

impl From<&RankEntry> for RankingInfo {
    fn from(entry: &RankEntry) -> Self {
        Self {
            cohort_rank: entry.cohort_rank,
            cohort_size: entry.cohort_size,
            cohort_percentile: percentile_label(entry.cohort_rank, entry.cohort_size),
            team_rank: entry.team_rank,
            team_size: entry.team_size,
            team_percentile: percentile_label(entry.team_rank, entry.team_size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportScores {
    pub final_score: f64,
    pub grade: Grade,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub individual_scores: Option<SubscoreSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<CategoryWeights>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quarters: Vec<QuarterContribution>,
    pub computed_at: DateTime<Utc>,
}

impl From<&CompositeScore> for ReportScores {
    fn from(composite: &CompositeScore) -> Self {
        Self {
            final_score: composite.final_score,
            grade: composite.grade(),
            individual_scores: Some(composite.subscores()),
            weights: Some(CategoryWeights::STANDARD),
            quarters: Vec::new(),
            computed_at: composite.computed_at,
        }
    }
}

impl From<&AnnualScore> for ReportScores {
    fn from(annual: &AnnualScore) -> Self {
        Self {
            final_score: annual.final_score,
            grade: Grade::from_score(annual.final_score),
            individual_scores: None,
            weights: None,
            quarters: annual.contributions.clone(),
            computed_at: annual.computed_at,
        }
    }
}

/// Per-user evaluation report combining scores, ranks, and narrative text.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub user_id: UserId,
    pub period: Period,
    pub success: bool,
    pub message: String,
    pub ranking_info: Option<RankingInfo>,
    pub scores: Option<ReportScores>,
    pub result_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::domain::Quarter;

    #[test]
    fn ranking_summary_reports_spread() {
        let period = Period::quarterly(2025, Quarter::Q1);
        let summary = RankingSummary::from_scores(period, 3, &[4.5, 3.0, 2.0]);
        assert_eq!(summary.average_score, Some(3.17));
        assert_eq!(summary.max_score, Some(4.5));
        assert_eq!(summary.min_score, Some(2.0));

        let empty = RankingSummary::from_scores(period, 0, &[]);
        assert_eq!(empty.average_score, None);
    }

    #[test]
    fn ranking_info_formats_percentiles() {
        let entry = RankEntry {
            user_id: UserId(1),
            period: Period::quarterly(2025, Quarter::Q1),
            cohort_rank: 1,
            cohort_size: 4,
            team_rank: 3,
            team_size: 8,
        };
        let info = RankingInfo::from(&entry);
        assert_eq!(info.cohort_percentile, "top 25.0%");
        assert_eq!(info.team_percentile, "top 37.5%");
    }

    #[test]
    fn batch_summary_tallies() {
        let mut summary = BatchSummary::new(Period::annual(2025));
        summary.record_success();
        summary.record_failure(UserId(4), "no data");
        assert_eq!((summary.success_count, summary.failed_count), (1, 1));
        assert_eq!(summary.failures[0].user_id, UserId(4));
    }
}
