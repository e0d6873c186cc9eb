use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{Period, QuarterPeriod, ScoreKey, SubscoreCategory, SubscoreRecord, Term, UserId};
use super::repository::ScoreStore;
use super::service::ScoringService;
use crate::error::AppError;

/// Router builder exposing scoring, ranking, and report endpoints.
pub fn scoring_router<S>(service: Arc<ScoringService<S>>) -> Router
where
    S: ScoreStore + 'static,
{
    Router::new()
        .route("/api/v1/score/evaluate", post(evaluate_handler::<S>))
        .route("/api/v1/score/subscore", put(subscore_handler::<S>))
        .route("/api/v1/score/batch", post(batch_handler::<S>))
        .route("/api/v1/score/annual", post(annual_handler::<S>))
        .route("/api/v1/ranking/compute", post(ranking_handler::<S>))
        .route("/api/v1/report/evaluate", post(report_handler::<S>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub user_id: UserId,
    pub year: i32,
    pub quarter: u8,
}

#[derive(Debug, Deserialize)]
pub struct SubscoreRequest {
    pub user_id: UserId,
    pub year: i32,
    pub quarter: u8,
    pub category: SubscoreCategory,
    pub value: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub year: i32,
    pub quarter: Term,
    /// Defaults to every user with a stored profile.
    #[serde(default)]
    pub user_ids: Option<Vec<UserId>>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodRequest {
    pub year: i32,
    pub quarter: Term,
}

#[derive(Debug, Deserialize)]
pub struct AnnualRequest {
    pub user_id: UserId,
    pub year: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub user_id: UserId,
    pub year: i32,
    pub quarter: Term,
}

pub(crate) async fn evaluate_handler<S>(
    State(service): State<Arc<ScoringService<S>>>,
    axum::Json(request): axum::Json<EvaluateRequest>,
) -> Result<Response, AppError>
where
    S: ScoreStore + 'static,
{
    let period = QuarterPeriod::new(request.year, request.quarter)?;
    let evaluation = service
        .evaluate(ScoreKey::new(request.user_id, period))
        .await?;
    Ok((StatusCode::OK, axum::Json(evaluation)).into_response())
}

pub(crate) async fn subscore_handler<S>(
    State(service): State<Arc<ScoringService<S>>>,
    axum::Json(request): axum::Json<SubscoreRequest>,
) -> Result<Response, AppError>
where
    S: ScoreStore + 'static,
{
    let period = QuarterPeriod::new(request.year, request.quarter)?;
    let record = SubscoreRecord::new(
        ScoreKey::new(request.user_id, period),
        request.category,
        request.value,
    )?;
    service.record_subscore(record).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn batch_handler<S>(
    State(service): State<Arc<ScoringService<S>>>,
    axum::Json(request): axum::Json<BatchRequest>,
) -> Result<Response, AppError>
where
    S: ScoreStore + 'static,
{
    let users = match request.user_ids {
        Some(users) => users,
        None => service.enrolled_users().await?,
    };

    let period = Period {
        year: request.year,
        term: request.quarter,
    };
    let run = service.run_period(period, &users).await?;
    Ok((StatusCode::OK, axum::Json(run)).into_response())
}

pub(crate) async fn ranking_handler<S>(
    State(service): State<Arc<ScoringService<S>>>,
    axum::Json(request): axum::Json<PeriodRequest>,
) -> Result<Response, AppError>
where
    S: ScoreStore + 'static,
{
    let period = Period {
        year: request.year,
        term: request.quarter,
    };
    let summary = service.rank_period(period).await?;
    Ok((StatusCode::OK, axum::Json(summary)).into_response())
}

pub(crate) async fn annual_handler<S>(
    State(service): State<Arc<ScoringService<S>>>,
    axum::Json(request): axum::Json<AnnualRequest>,
) -> Result<Response, AppError>
where
    S: ScoreStore + 'static,
{
    let response = match service.rollup_annual(request.user_id, request.year).await? {
        Some(annual) => (StatusCode::OK, axum::Json(annual)).into_response(),
        None => {
            let payload = json!({
                "success": false,
                "message": format!(
                    "no usable quarterly scores for user {} in {}",
                    request.user_id, request.year
                ),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
    };
    Ok(response)
}

pub(crate) async fn report_handler<S>(
    State(service): State<Arc<ScoringService<S>>>,
    axum::Json(request): axum::Json<ReportRequest>,
) -> Result<Response, AppError>
where
    S: ScoreStore + 'static,
{
    let period = Period {
        year: request.year,
        term: request.quarter,
    };
    let report = service.report(request.user_id, period).await?;
    Ok((StatusCode::OK, axum::Json(report)).into_response())
}
