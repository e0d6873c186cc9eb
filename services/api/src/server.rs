use crate::cli::ServeArgs;
use crate::infra::{build_service, seed_store, AppState};
use crate::routes::with_scoring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use perf_eval::config::AppConfig;
use perf_eval::error::AppError;
use perf_eval::scoring::InMemoryScoreStore;
use perf_eval::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryScoreStore::new());
    seed_store(
        &store,
        args.profiles.as_deref(),
        args.subscores.as_deref(),
        config.scoring.external_timeout,
    )
    .await?;
    let scoring_service = Arc::new(build_service(&config, store)?);

    let app = with_scoring_routes(scoring_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "performance evaluation service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
