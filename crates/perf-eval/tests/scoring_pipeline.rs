use std::sync::Arc;

use perf_eval::config::ScoringConfig;
use perf_eval::scoring::import::{import_profiles, import_subscores};
use perf_eval::scoring::{
    compute_final_score, compute_ranks, Grade, InMemoryScoreStore, Period, ProviderSet, Quarter,
    ScoreStore, ScoredUser, ScoringService, UserId,
};

const PROFILES: &str = "\
user_id,job_id,tenure_years,org_id
1,backend,3,platform
2,backend,3,platform
3,backend,3,growth
4,backend,3,growth
5,designer,1,growth
";

const SUBSCORES: &str = "\
user_id,year,quarter,category,value
1,2025,1,weekly,4.5
1,2025,1,qualitative,4.5
1,2025,1,peer,4.5
2,2025,1,weekly,4.5
2,2025,1,qualitative,4.5
2,2025,1,peer,4.5
3,2025,1,weekly,3.0
3,2025,1,qualitative,3.0
3,2025,1,peer,3.0
4,2025,1,weekly,2.0
4,2025,1,qualitative,2.0
4,2025,1,peer,2.0
5,2025,1,weekly,
5,2025,1,peer,3.0
6,2025,1,weekly,11
";

#[tokio::test]
async fn csv_import_to_ranked_reports() {
    let store = Arc::new(InMemoryScoreStore::new());
    let config = ScoringConfig::default();

    let profiles = import_profiles(store.as_ref(), PROFILES.as_bytes(), config.external_timeout)
        .await
        .expect("profiles import");
    assert_eq!(profiles.imported, 5);

    let subscores = import_subscores(store.as_ref(), SUBSCORES.as_bytes(), config.external_timeout)
        .await
        .expect("subscores import");
    assert_eq!(subscores.imported, 14);
    assert_eq!(subscores.rejected_count(), 1);

    let service = ScoringService::new(Arc::clone(&store), ProviderSet::none(), config);
    let users = service.enrolled_users().await.expect("profiles listed");
    let period = Period::quarterly(2025, Quarter::Q1);
    let run = service.run_period(period, &users).await.expect("period runs");

    assert_eq!(run.batch.success_count, 5);
    assert_eq!(run.ranking.ranked_count, 5);

    let cohort_ranks: Vec<u32> = {
        let mut ranks = Vec::new();
        for user in 1..=4 {
            let entry = store
                .fetch_rank(UserId(user), period)
                .await
                .expect("store reachable")
                .expect("rank stored");
            assert_eq!(entry.cohort_size, 4);
            ranks.push(entry.cohort_rank);
        }
        ranks
    };
    assert_eq!(cohort_ranks, vec![1, 1, 3, 4]);

    let designer = store
        .fetch_rank(UserId(5), period)
        .await
        .expect("store reachable")
        .expect("rank stored");
    assert_eq!((designer.cohort_rank, designer.cohort_size), (1, 1));
    assert_eq!((designer.team_rank, designer.team_size), (3, 3));

    let report = service.report(UserId(1), period).await.expect("report");
    let ranking = report.ranking_info.expect("ranked");
    assert_eq!(ranking.cohort_percentile, "top 25.0%");

    let partial = service.report(UserId(5), period).await.expect("report");
    assert!(partial.success);
    assert_eq!(partial.scores.map(|s| s.final_score), Some(0.9));
    assert!(!partial.warnings.is_empty());
}

#[test]
fn final_score_scenarios() {
    let full = compute_final_score(Some(4.0), Some(3.5), Some(4.5));
    assert_eq!(full, 4.0);
    assert_eq!(Grade::from_score(full), Grade::A);

    let peer_only = compute_final_score(None, None, Some(3.0));
    assert_eq!(peer_only, 0.9);
    assert_eq!(Grade::from_score(peer_only), Grade::D);

    assert_eq!(
        compute_final_score(None, Some(4.0), Some(4.0)),
        compute_final_score(Some(0.0), Some(4.0), Some(4.0))
    );
}

#[test]
fn competition_ranking_with_ties() {
    let period = Period::quarterly(2025, Quarter::Q2);
    let users: Vec<ScoredUser> = [5.0, 4.0, 4.0, 3.0, 2.0]
        .into_iter()
        .enumerate()
        .map(|(index, score)| ScoredUser {
            user_id: UserId(index as i64 + 1),
            final_score: Some(score),
            job_id: "analyst".to_string(),
            tenure_years: 2,
            org_id: "finance".to_string(),
        })
        .collect();

    let ranks: Vec<u32> = compute_ranks(period, &users)
        .iter()
        .map(|entry| entry.cohort_rank)
        .collect();
    assert_eq!(ranks, vec![1, 2, 2, 4, 5]);
}
