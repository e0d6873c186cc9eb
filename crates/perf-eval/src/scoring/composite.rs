//! Weighted composite score and its display grade.
//!
//! Missing subscores contribute `0.0` to the weighted sum; they are not excluded and the
//! remaining weights are not re-normalized. A user holding only a peer subscore therefore
//! tops out at 30% of the scale. Callers surface this through [`degraded_warnings`] rather
//! than presenting such a score as complete.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::domain::{CompositeScore, ScoreKey, SubscoreCategory, SubscoreSet};

/// Category weights for the quarterly composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryWeights {
    pub weekly: f64,
    pub qualitative: f64,
    pub peer: f64,
}

impl CategoryWeights {
    /// 40% weekly activity, 30% qualitative review, 30% peer keywords.
    pub const STANDARD: CategoryWeights = CategoryWeights {
        weekly: 0.4,
        qualitative: 0.3,
        peer: 0.3,
    };

    pub const fn weight(&self, category: SubscoreCategory) -> f64 {
        match category {
            SubscoreCategory::Weekly => self.weekly,
            SubscoreCategory::Qualitative => self.qualitative,
            SubscoreCategory::Peer => self.peer,
        }
    }

    pub fn total(&self) -> f64 {
        self.weekly + self.qualitative + self.peer
    }
}

/// Rounds half away from zero to two decimal places.
pub fn round_score(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `round(0.4*weekly + 0.3*qualitative + 0.3*peer, 2)` with absent inputs counted as `0.0`.
///
/// Never fails; three absent inputs yield `0.0`.
pub fn compute_final_score(weekly: Option<f64>, qualitative: Option<f64>, peer: Option<f64>) -> f64 {
    let weights = CategoryWeights::STANDARD;
    let raw = weights.weekly * weekly.unwrap_or(0.0)
        + weights.qualitative * qualitative.unwrap_or(0.0)
        + weights.peer * peer.unwrap_or(0.0);
    round_score(raw)
}

impl CompositeScore {
    pub fn compute(key: ScoreKey, subscores: &SubscoreSet, computed_at: DateTime<Utc>) -> Self {
        Self {
            user_id: key.user_id,
            period: key.period,
            final_score: compute_final_score(
                subscores.weekly,
                subscores.qualitative,
                subscores.peer,
            ),
            weekly: subscores.weekly,
            qualitative: subscores.qualitative,
            peer: subscores.peer,
            computed_at,
        }
    }

    pub fn grade(&self) -> Grade {
        Grade::from_score(self.final_score)
    }

    /// At least one subscore was non-null and non-zero.
    pub fn is_usable(&self) -> bool {
        !self.subscores().usable_categories().is_empty()
    }
}

/// One note per category that was counted as zero.
pub fn degraded_warnings(subscores: &SubscoreSet) -> Vec<String> {
    subscores
        .missing_categories()
        .into_iter()
        .map(|category| {
            format!(
                "{} subscore unavailable; counted as 0.0 ({:.0}% of final score)",
                category,
                CategoryWeights::STANDARD.weight(category) * 100.0
            )
        })
        .collect()
}

/// Letter grade derived from a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    APlus,
    A,
    BPlus,
    B,
    CPlus,
    C,
    D,
}

impl Grade {
    pub fn from_score(final_score: f64) -> Self {
        if final_score >= 4.5 {
            Grade::APlus
        } else if final_score >= 4.0 {
            Grade::A
        } else if final_score >= 3.5 {
            Grade::BPlus
        } else if final_score >= 3.0 {
            Grade::B
        } else if final_score >= 2.5 {
            Grade::CPlus
        } else if final_score >= 2.0 {
            Grade::C
        } else {
            Grade::D
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}
