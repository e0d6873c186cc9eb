use crate::pipeline::{run_import, run_pipeline, ImportArgs, RunArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use perf_eval::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Performance Evaluation Engine",
    about = "Score, rank, and report on quarterly employee performance",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Validate and load profile and subscore CSV files, then print a summary
    Import(ImportArgs),
    /// Import CSV data, score a period, rank it, and print the results
    Run(RunArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Profiles CSV (user_id,job_id,tenure_years,org_id) to preload
    #[arg(long)]
    pub(crate) profiles: Option<PathBuf>,
    /// Subscores CSV (user_id,year,quarter,category,value) to preload
    #[arg(long)]
    pub(crate) subscores: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Import(args) => run_import(args).await,
        Command::Run(args) => run_pipeline(args).await,
    }
}
