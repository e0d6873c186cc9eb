use crate::infra::{build_service, parse_term, seed_store, SeedSummary};
use clap::Args;
use perf_eval::config::AppConfig;
use perf_eval::error::AppError;
use perf_eval::scoring::{
    BatchSummary, ImportSummary, InMemoryScoreStore, Period, PeriodRun, Quarter, RankingInfo,
    ScoreStore, ScoringService, Term,
};
use perf_eval::telemetry;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Profiles CSV (user_id,job_id,tenure_years,org_id)
    #[arg(long)]
    pub(crate) profiles: PathBuf,
    /// Subscores CSV (user_id,year,quarter,category,value)
    #[arg(long)]
    pub(crate) subscores: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// Profiles CSV (user_id,job_id,tenure_years,org_id)
    #[arg(long)]
    pub(crate) profiles: PathBuf,
    /// Subscores CSV (user_id,year,quarter,category,value)
    #[arg(long)]
    pub(crate) subscores: PathBuf,
    /// Calendar year to score
    #[arg(long)]
    pub(crate) year: i32,
    /// Quarter (1-4 or Q1-Q4) or `annual`
    #[arg(long, value_parser = parse_term)]
    pub(crate) quarter: Term,
    /// Print a per-user report after ranking
    #[arg(long)]
    pub(crate) reports: bool,
}

pub(crate) async fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let store = InMemoryScoreStore::new();
    let summary = seed_store(
        &store,
        Some(args.profiles.as_path()),
        Some(args.subscores.as_path()),
        config.scoring.external_timeout,
    )
    .await?;

    println!("Import summary");
    render_seed_summary(&summary);
    Ok(())
}

pub(crate) async fn run_pipeline(args: RunArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let store = Arc::new(InMemoryScoreStore::new());
    let seeded = seed_store(
        &store,
        Some(args.profiles.as_path()),
        Some(args.subscores.as_path()),
        config.scoring.external_timeout,
    )
    .await?;
    let service = build_service(&config, Arc::clone(&store))?;
    let users = service.enrolled_users().await?;

    println!("Performance evaluation run");
    render_seed_summary(&seeded);
    println!(
        "- live subscore providers: {:?}",
        service.providers().configured_categories()
    );

    let period = Period {
        year: args.year,
        term: args.quarter,
    };

    if period.term == Term::Annual {
        // the annual rollup reads quarterly composites, so score every quarter first
        for quarter in Quarter::ALL {
            let quarterly = service
                .run_period(Period::quarterly(args.year, quarter), &users)
                .await?;
            println!(
                "- {} {}: {} scored, {} failed",
                args.year,
                quarter.label(),
                quarterly.batch.success_count,
                quarterly.batch.failed_count
            );
        }
    }

    let run = service.run_period(period, &users).await?;
    render_run(&run);
    render_ranks(&store, &service, period).await?;

    if args.reports {
        println!("\nReports");
        for user_id in &users {
            let report = service.report(*user_id, period).await?;
            let status = if report.success { "ok" } else { "incomplete" };
            println!("- user {} [{}]: {}", user_id, status, report.message);
            if let Some(text) = &report.result_text {
                println!("  {}", text);
            }
            for warning in &report.warnings {
                println!("  ! {}", warning);
            }
        }
    }

    Ok(())
}

fn render_seed_summary(summary: &SeedSummary) {
    render_import_line("profiles", summary.profiles.as_ref());
    render_import_line("subscores", summary.subscores.as_ref());
}

fn render_import_line(label: &str, summary: Option<&ImportSummary>) {
    let Some(summary) = summary else {
        return;
    };
    println!(
        "- {}: {} imported | {} rejected",
        label,
        summary.imported,
        summary.rejected_count()
    );
    for rejection in &summary.rejected {
        println!("  line {}: {}", rejection.line, rejection.reason);
    }
}

fn render_run(run: &PeriodRun) {
    render_batch(&run.batch);
    let ranking = &run.ranking;
    println!("\nRanking for {}", ranking.period);
    println!("- {} users ranked", ranking.ranked_count);
    if let (Some(avg), Some(max), Some(min)) =
        (ranking.average_score, ranking.max_score, ranking.min_score)
    {
        println!("- average {:.2} | max {:.2} | min {:.2}", avg, max, min);
    }
}

fn render_batch(batch: &BatchSummary) {
    println!("\nScoring for {}", batch.period);
    println!(
        "- {} succeeded | {} failed",
        batch.success_count, batch.failed_count
    );
    for failure in &batch.failures {
        println!("  user {}: {}", failure.user_id, failure.reason);
    }
}

async fn render_ranks(
    store: &InMemoryScoreStore,
    service: &ScoringService<InMemoryScoreStore>,
    period: Period,
) -> Result<(), AppError> {
    let users = service.enrolled_users().await?;
    println!("\nUser | cohort | team");
    for user_id in users {
        if let Some(entry) = store.fetch_rank(user_id, period).await? {
            let info = RankingInfo::from(&entry);
            println!(
                "{} | {}/{} ({}) | {}/{} ({})",
                user_id,
                info.cohort_rank,
                info.cohort_size,
                info.cohort_percentile,
                info.team_rank,
                info.team_size,
                info.team_percentile
            );
        }
    }
    Ok(())
}
