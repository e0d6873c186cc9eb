use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Lowest value a subscore may take.
pub const SUBSCORE_MIN: f64 = 0.0;
/// Highest value a subscore may take.
pub const SUBSCORE_MAX: f64 = 5.0;

/// External employee identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Calendar quarter. Only 1..=4 are representable; the annual rollup is a separate [`Term`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    pub const fn number(self) -> u8 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 2,
            Quarter::Q3 => 3,
            Quarter::Q4 => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }
}

impl TryFrom<u8> for Quarter {
    type Error = ScoreValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Quarter::Q1),
            2 => Ok(Quarter::Q2),
            3 => Ok(Quarter::Q3),
            4 => Ok(Quarter::Q4),
            other => Err(ScoreValidationError::InvalidQuarter(other)),
        }
    }
}

impl From<Quarter> for u8 {
    fn from(value: Quarter) -> Self {
        value.number()
    }
}

/// A single quarter of a single year; the unit subscores and composites are keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuarterPeriod {
    pub year: i32,
    pub quarter: Quarter,
}

impl QuarterPeriod {
    pub fn new(year: i32, quarter: u8) -> Result<Self, ScoreValidationError> {
        Ok(Self {
            year,
            quarter: Quarter::try_from(quarter)?,
        })
    }

    pub const fn period(self) -> Period {
        Period {
            year: self.year,
            term: Term::Quarter(self.quarter),
        }
    }
}

impl fmt::Display for QuarterPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.year, self.quarter.label())
    }
}

/// Either one quarter or the annual rollup of a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "TermRepr")]
pub enum Term {
    Quarter(Quarter),
    Annual,
}

impl Term {
    /// Accepts `1`..`4`, `Q1`..`Q4`, or `annual` (case-insensitive).
    pub fn parse(raw: &str) -> Result<Self, ScoreValidationError> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized == "annual" || normalized == "year" {
            return Ok(Term::Annual);
        }

        let digits = normalized.strip_prefix('q').unwrap_or(&normalized);
        digits
            .parse::<u8>()
            .map_err(|_| ScoreValidationError::InvalidTerm(raw.to_string()))
            .and_then(Quarter::try_from)
            .map(Term::Quarter)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Term::Quarter(quarter) => quarter.label(),
            Term::Annual => "Annual",
        }
    }
}

impl Serialize for Term {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Term::Quarter(quarter) => serializer.serialize_u8(quarter.number()),
            Term::Annual => serializer.serialize_str("annual"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TermRepr {
    Number(u8),
    Label(String),
}

impl TryFrom<TermRepr> for Term {
    type Error = ScoreValidationError;

    fn try_from(value: TermRepr) -> Result<Self, Self::Error> {
        match value {
            TermRepr::Number(number) => Quarter::try_from(number).map(Term::Quarter),
            TermRepr::Label(label) => Term::parse(&label),
        }
    }
}

/// Scoring period: a quarter, or a year's annual rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    #[serde(rename = "quarter")]
    pub term: Term,
}

impl Period {
    pub const fn quarterly(year: i32, quarter: Quarter) -> Self {
        Self {
            year,
            term: Term::Quarter(quarter),
        }
    }

    pub const fn annual(year: i32) -> Self {
        Self {
            year,
            term: Term::Annual,
        }
    }

    pub const fn as_quarter(self) -> Option<QuarterPeriod> {
        match self.term {
            Term::Quarter(quarter) => Some(QuarterPeriod {
                year: self.year,
                quarter,
            }),
            Term::Annual => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.year, self.term.label())
    }
}

/// The three independently scored evaluation inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscoreCategory {
    Weekly,
    Qualitative,
    Peer,
}

impl SubscoreCategory {
    pub const ALL: [SubscoreCategory; 3] = [
        SubscoreCategory::Weekly,
        SubscoreCategory::Qualitative,
        SubscoreCategory::Peer,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            SubscoreCategory::Weekly => "weekly",
            SubscoreCategory::Qualitative => "qualitative",
            SubscoreCategory::Peer => "peer",
        }
    }
}

impl fmt::Display for SubscoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rejects values outside the 0.0..=5.0 subscore scale.
pub fn validate_subscore(category: SubscoreCategory, value: f64) -> Result<f64, ScoreValidationError> {
    if !value.is_finite() {
        return Err(ScoreValidationError::NonFinite { category });
    }
    if !(SUBSCORE_MIN..=SUBSCORE_MAX).contains(&value) {
        return Err(ScoreValidationError::OutOfRange { category, value });
    }
    Ok(value)
}

/// Identifies the stored row for one user in one quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScoreKey {
    pub user_id: UserId,
    pub period: QuarterPeriod,
}

impl ScoreKey {
    pub const fn new(user_id: UserId, period: QuarterPeriod) -> Self {
        Self { user_id, period }
    }
}

/// One category's subscore for a key; `value: None` marks "not computed".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubscoreRecord {
    pub key: ScoreKey,
    pub category: SubscoreCategory,
    pub value: Option<f64>,
}

impl SubscoreRecord {
    pub fn new(
        key: ScoreKey,
        category: SubscoreCategory,
        value: Option<f64>,
    ) -> Result<Self, ScoreValidationError> {
        let value = value
            .map(|raw| validate_subscore(category, raw))
            .transpose()?;
        Ok(Self {
            key,
            category,
            value,
        })
    }
}

/// The three subscore columns of a stored row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscoreSet {
    pub weekly: Option<f64>,
    pub qualitative: Option<f64>,
    pub peer: Option<f64>,
}

impl SubscoreSet {
    pub const fn get(&self, category: SubscoreCategory) -> Option<f64> {
        match category {
            SubscoreCategory::Weekly => self.weekly,
            SubscoreCategory::Qualitative => self.qualitative,
            SubscoreCategory::Peer => self.peer,
        }
    }

    /// Writes a single column, leaving the others as they were.
    pub fn set(&mut self, category: SubscoreCategory, value: Option<f64>) {
        match category {
            SubscoreCategory::Weekly => self.weekly = value,
            SubscoreCategory::Qualitative => self.qualitative = value,
            SubscoreCategory::Peer => self.peer = value,
        }
    }

    /// Categories with a non-null, non-zero value.
    pub fn usable_categories(&self) -> Vec<SubscoreCategory> {
        SubscoreCategory::ALL
            .into_iter()
            .filter(|category| self.get(*category).map(|v| v > 0.0).unwrap_or(false))
            .collect()
    }

    pub fn missing_categories(&self) -> Vec<SubscoreCategory> {
        SubscoreCategory::ALL
            .into_iter()
            .filter(|category| self.get(*category).is_none())
            .collect()
    }
}

/// Attributes used to place an employee into ranking groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub user_id: UserId,
    pub job_id: String,
    pub tenure_years: u32,
    pub org_id: String,
}

/// Ranking input row: a user's period score joined with their profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredUser {
    pub user_id: UserId,
    pub final_score: Option<f64>,
    pub job_id: String,
    pub tenure_years: u32,
    pub org_id: String,
}

impl ScoredUser {
    pub fn from_profile(profile: &EmployeeProfile, final_score: Option<f64>) -> Self {
        Self {
            user_id: profile.user_id,
            final_score,
            job_id: profile.job_id.clone(),
            tenure_years: profile.tenure_years,
            org_id: profile.org_id.clone(),
        }
    }
}

/// Weighted quarterly score. Superseded, not versioned, by later computations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub user_id: UserId,
    pub period: QuarterPeriod,
    pub final_score: f64,
    pub weekly: Option<f64>,
    pub qualitative: Option<f64>,
    pub peer: Option<f64>,
    pub computed_at: DateTime<Utc>,
}

impl CompositeScore {
    pub const fn key(&self) -> ScoreKey {
        ScoreKey::new(self.user_id, self.period)
    }

    pub const fn subscores(&self) -> SubscoreSet {
        SubscoreSet {
            weekly: self.weekly,
            qualitative: self.qualitative,
            peer: self.peer,
        }
    }
}

/// Relative standing of a user within their cohort and team for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub user_id: UserId,
    pub period: Period,
    pub cohort_rank: u32,
    pub cohort_size: u32,
    pub team_rank: u32,
    pub team_size: u32,
}

/// A quarter's contribution to an annual rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterContribution {
    pub quarter: Quarter,
    pub final_score: f64,
    pub weight: f64,
}

/// Yearly score built from the quarterly composites that exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualScore {
    pub user_id: UserId,
    pub year: i32,
    pub final_score: f64,
    pub contributions: Vec<QuarterContribution>,
    pub missing_quarters: Vec<Quarter>,
    pub computed_at: DateTime<Utc>,
}

/// Input rejected before it reaches the store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreValidationError {
    #[error("quarter must be between 1 and 4, got {0}")]
    InvalidQuarter(u8),
    #[error("'{0}' is not a quarter (1-4, Q1-Q4) or 'annual'")]
    InvalidTerm(String),
    #[error("{category} subscore {value} is outside 0.0..=5.0")]
    OutOfRange {
        category: SubscoreCategory,
        value: f64,
    },
    #[error("{category} subscore is not a finite number")]
    NonFinite { category: SubscoreCategory },
    #[error("{0} must not be empty")]
    MissingField(&'static str),
}
