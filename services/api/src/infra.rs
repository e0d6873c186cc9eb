use metrics_exporter_prometheus::PrometheusHandle;
use perf_eval::config::AppConfig;
use perf_eval::error::AppError;
use perf_eval::scoring::import::{import_profiles_file, import_subscores_file};
use perf_eval::scoring::{ImportSummary, InMemoryScoreStore, ProviderSet, ScoringService, Term};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wires the in-memory store and configured remote collaborators into a service.
pub(crate) fn build_service(
    config: &AppConfig,
    store: Arc<InMemoryScoreStore>,
) -> Result<ScoringService<InMemoryScoreStore>, AppError> {
    let providers =
        ProviderSet::from_endpoints(&config.providers, config.scoring.external_timeout)?;
    Ok(ScoringService::new(store, providers, config.scoring.clone()))
}

#[derive(Debug, Default)]
pub(crate) struct SeedSummary {
    pub(crate) profiles: Option<ImportSummary>,
    pub(crate) subscores: Option<ImportSummary>,
}

pub(crate) async fn seed_store(
    store: &InMemoryScoreStore,
    profiles: Option<&Path>,
    subscores: Option<&Path>,
    timeout: Duration,
) -> Result<SeedSummary, AppError> {
    let mut summary = SeedSummary::default();
    if let Some(path) = profiles {
        summary.profiles = Some(import_profiles_file(store, path, timeout).await?);
    }
    if let Some(path) = subscores {
        summary.subscores = Some(import_subscores_file(store, path, timeout).await?);
    }
    Ok(summary)
}

/// Accepts `1`..`4`, `Q1`..`Q4`, or `annual`.
pub(crate) fn parse_term(raw: &str) -> Result<Term, String> {
    Term::parse(raw).map_err(|err| err.to_string())
}
