mod cli;
mod infra;
mod pipeline;
mod routes;
mod server;

use perf_eval::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
