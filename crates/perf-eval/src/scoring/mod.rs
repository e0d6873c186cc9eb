//! Performance score aggregation and ranking.
//!
//! Subscores from three independent providers are combined into a weighted quarterly
//! composite, ranked within job/tenure cohorts and org teams, rolled up per year, and
//! assembled into per-user reports. Persistence sits behind [`ScoreStore`]; external
//! collaborators are resolved once into a [`ProviderSet`].

pub mod annual;
pub mod composite;
pub mod domain;
pub mod import;
pub mod memory;
pub mod providers;
pub mod ranking;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod views;

#[cfg(test)]
mod tests;

pub use composite::{compute_final_score, degraded_warnings, CategoryWeights, Grade};
pub use domain::{
    AnnualScore, CompositeScore, EmployeeProfile, Period, Quarter, QuarterContribution,
    QuarterPeriod, RankEntry, ScoreKey, ScoreValidationError, ScoredUser, SubscoreCategory,
    SubscoreRecord, SubscoreSet, Term, UserId,
};
pub use import::{ImportError, ImportSummary, RejectedRow};
pub use memory::InMemoryScoreStore;
pub use providers::{
    NarrativeError, NarrativeGenerator, ProviderError, ProviderSet, RemoteNarrativeGenerator,
    RemoteSubscoreProvider, SubscoreProvider,
};
pub use ranking::{compute_ranks, percentile, percentile_label};
pub use report::{fallback_narrative, NarrativeContext, ReportAssembler};
pub use repository::{ScoreStore, StorageError};
pub use router::scoring_router;
pub use service::{ScoringService, ScoringServiceError};
pub use views::{
    BatchFailure, BatchSummary, EvaluationReport, PeriodRun, RankingInfo, RankingSummary,
    ReportScores, ScoreEvaluation, SubscoreRefresh,
};
