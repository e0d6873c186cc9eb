//! Annual rollup of quarterly composites.
//!
//! Quarter weights (20/25/25/30) are unrelated to the 40/30/30 category weights of the
//! quarterly composite. Unlike the quarterly path, a missing quarter is skipped and the
//! average is taken over the weights of the quarters present.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::composite::round_score;
use super::domain::{AnnualScore, Quarter, QuarterContribution, UserId};

pub const fn quarter_weight(quarter: Quarter) -> f64 {
    match quarter {
        Quarter::Q1 => 0.20,
        Quarter::Q2 => 0.25,
        Quarter::Q3 => 0.25,
        Quarter::Q4 => 0.30,
    }
}

/// Returns `None` when no quarter has a score. A quarter listed twice keeps its last score.
pub fn rollup_annual(
    user_id: UserId,
    year: i32,
    quarterly_scores: &[(Quarter, f64)],
    computed_at: DateTime<Utc>,
) -> Option<AnnualScore> {
    let present: BTreeMap<Quarter, f64> = quarterly_scores
        .iter()
        .filter(|(_, score)| score.is_finite())
        .copied()
        .collect();

    if present.is_empty() {
        return None;
    }

    let contributions: Vec<QuarterContribution> = present
        .iter()
        .map(|(quarter, score)| QuarterContribution {
            quarter: *quarter,
            final_score: *score,
            weight: quarter_weight(*quarter),
        })
        .collect();

    let weight_total: f64 = contributions.iter().map(|c| c.weight).sum();
    let weighted: f64 = contributions.iter().map(|c| c.weight * c.final_score).sum();

    let missing_quarters = Quarter::ALL
        .into_iter()
        .filter(|quarter| !present.contains_key(quarter))
        .collect();

    Some(AnnualScore {
        user_id,
        year,
        final_score: round_score(weighted / weight_total),
        contributions,
        missing_quarters,
        computed_at,
    })
}
