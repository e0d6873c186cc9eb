//! Cohort and team ranking for a period.
//!
//! Ranks use competition ordering: `rank(u) = 1 + |{v in group : score(v) > score(u)}|`.
//! Tied scores share a rank and the next distinct score skips ahead by the size of the tie
//! (`1, 2, 2, 4`), which is neither dense ranking nor row numbering.

use std::collections::HashMap;
use std::hash::Hash;

use super::domain::{Period, RankEntry, ScoredUser};

/// Ranks every user with a final score within their (job, tenure) cohort and their org.
///
/// Users without a score are dropped before partitioning, so they never count toward a
/// group size. Output follows the input order of the users that were kept. An empty input
/// yields an empty result.
pub fn compute_ranks(period: Period, scored_users: &[ScoredUser]) -> Vec<RankEntry> {
    let scored: Vec<(&ScoredUser, f64)> = scored_users
        .iter()
        .filter_map(|user| {
            user.final_score
                .filter(|score| score.is_finite())
                .map(|score| (user, score))
        })
        .collect();

    if scored.is_empty() {
        return Vec::new();
    }

    let cohort = competition_ranks(&scored, |user| (user.job_id.clone(), user.tenure_years));
    let team = competition_ranks(&scored, |user| user.org_id.clone());

    scored
        .iter()
        .enumerate()
        .map(|(idx, (user, _))| RankEntry {
            user_id: user.user_id,
            period,
            cohort_rank: cohort[idx].rank,
            cohort_size: cohort[idx].size,
            team_rank: team[idx].rank,
            team_size: team[idx].size,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
struct GroupRank {
    rank: u32,
    size: u32,
}

fn competition_ranks<K, F>(scored: &[(&ScoredUser, f64)], group_of: F) -> Vec<GroupRank>
where
    K: Eq + Hash,
    F: Fn(&ScoredUser) -> K,
{
    let mut groups: HashMap<K, Vec<usize>> = HashMap::new();
    for (idx, (user, _)) in scored.iter().enumerate() {
        groups.entry(group_of(user)).or_default().push(idx);
    }

    let mut ranks = vec![GroupRank::default(); scored.len()];
    for mut members in groups.into_values() {
        let size = members.len() as u32;
        // stable sort keeps input order inside a tie
        members.sort_by(|a, b| scored[*b].1.total_cmp(&scored[*a].1));

        let mut previous: Option<f64> = None;
        let mut rank = 0;
        for (position, idx) in members.into_iter().enumerate() {
            let score = scored[idx].1;
            if previous != Some(score) {
                rank = position as u32 + 1;
                previous = Some(score);
            }
            ranks[idx] = GroupRank { rank, size };
        }
    }

    ranks
}

/// `(rank / size) * 100`; a lower value is a better standing.
pub fn percentile(rank: u32, size: u32) -> f64 {
    if size == 0 {
        return 0.0;
    }
    f64::from(rank) / f64::from(size) * 100.0
}

/// Display form of [`percentile`], e.g. `top 25.0%`.
pub fn percentile_label(rank: u32, size: u32) -> String {
    format!("top {:.1}%", percentile(rank, size))
}

impl RankEntry {
    pub fn cohort_percentile(&self) -> f64 {
        percentile(self.cohort_rank, self.cohort_size)
    }

    pub fn team_percentile(&self) -> f64 {
        percentile(self.team_rank, self.team_size)
    }
}
