use serde::{Deserialize, Deserializer, Serialize};
use std::io::Read;

use crate::scoring::domain::{
    EmployeeProfile, QuarterPeriod, ScoreKey, ScoreValidationError, SubscoreCategory,
    SubscoreRecord, UserId,
};

/// A row that could not be turned into a domain record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// 1-based line number in the source file, header included.
    pub line: u64,
    pub reason: String,
}

pub(crate) enum ParsedRow<T> {
    Accepted(T),
    Rejected(RejectedRow),
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    user_id: i64,
    job_id: String,
    tenure_years: u32,
    org_id: String,
}

impl ProfileRow {
    fn into_profile(self) -> Result<EmployeeProfile, ScoreValidationError> {
        if self.job_id.is_empty() {
            return Err(ScoreValidationError::MissingField("job_id"));
        }
        if self.org_id.is_empty() {
            return Err(ScoreValidationError::MissingField("org_id"));
        }
        Ok(EmployeeProfile {
            user_id: UserId(self.user_id),
            job_id: self.job_id,
            tenure_years: self.tenure_years,
            org_id: self.org_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SubscoreRow {
    user_id: i64,
    year: i32,
    quarter: u8,
    category: SubscoreCategory,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    value: Option<f64>,
}

impl SubscoreRow {
    fn into_record(self) -> Result<SubscoreRecord, ScoreValidationError> {
        let period = QuarterPeriod::new(self.year, self.quarter)?;
        SubscoreRecord::new(
            ScoreKey::new(UserId(self.user_id), period),
            self.category,
            self.value,
        )
    }
}

pub(crate) fn parse_profiles<R: Read>(
    reader: R,
) -> Result<Vec<ParsedRow<EmployeeProfile>>, csv::Error> {
    parse_rows(reader, ProfileRow::into_profile)
}

pub(crate) fn parse_subscores<R: Read>(
    reader: R,
) -> Result<Vec<ParsedRow<SubscoreRecord>>, csv::Error> {
    parse_rows(reader, SubscoreRow::into_record)
}

/// Malformed rows are collected as rejections; only read failures abort the parse.
fn parse_rows<R, Row, T>(
    reader: R,
    convert: impl Fn(Row) -> Result<T, ScoreValidationError>,
) -> Result<Vec<ParsedRow<T>>, csv::Error>
where
    R: Read,
    Row: for<'de> Deserialize<'de>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();
    let mut record = csv::StringRecord::new();

    loop {
        match csv_reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) if err.is_io_error() => return Err(err),
            Err(err) => {
                rows.push(ParsedRow::Rejected(RejectedRow {
                    line: err.position().map(|position| position.line()).unwrap_or_default(),
                    reason: err.to_string(),
                }));
                continue;
            }
        }

        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or_default();

        let parsed = record
            .deserialize::<Row>(Some(&headers))
            .map_err(|err| err.to_string())
            .and_then(|row| convert(row).map_err(|err| err.to_string()));

        match parsed {
            Ok(value) => rows.push(ParsedRow::Accepted(value)),
            Err(reason) => rows.push(ParsedRow::Rejected(RejectedRow { line, reason })),
        }
    }

    Ok(rows)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<f64>().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted<T>(rows: Vec<ParsedRow<T>>) -> Vec<T> {
        rows.into_iter()
            .filter_map(|row| match row {
                ParsedRow::Accepted(value) => Some(value),
                ParsedRow::Rejected(_) => None,
            })
            .collect()
    }

    fn rejected<T>(rows: Vec<ParsedRow<T>>) -> Vec<RejectedRow> {
        rows.into_iter()
            .filter_map(|row| match row {
                ParsedRow::Accepted(_) => None,
                ParsedRow::Rejected(rejection) => Some(rejection),
            })
            .collect()
    }

    #[test]
    fn parses_profiles_with_padding() {
        let data = "user_id,job_id,tenure_years,org_id\n 7 , backend , 3 , platform \n";
        let profiles = accepted(parse_profiles(data.as_bytes()).expect("csv parses"));
        assert_eq!(
            profiles,
            vec![EmployeeProfile {
                user_id: UserId(7),
                job_id: "backend".to_string(),
                tenure_years: 3,
                org_id: "platform".to_string(),
            }]
        );
    }

    #[test]
    fn empty_value_means_not_computed() {
        let data = "user_id,year,quarter,category,value\n1,2025,2,peer,\n1,2025,2,weekly,3.5\n";
        let records = accepted(parse_subscores(data.as_bytes()).expect("csv parses"));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, SubscoreCategory::Peer);
        assert_eq!(records[0].value, None);
        assert_eq!(records[1].value, Some(3.5));
    }

    #[test]
    fn rejects_out_of_range_and_malformed_rows() {
        let data = "user_id,year,quarter,category,value\n\
                    1,2025,5,weekly,3.0\n\
                    2,2025,1,peer,7.5\n\
                    3,2025,1,mystery,2.0\n\
                    4,2025,1,qualitative,4.0\n";
        let rows = parse_subscores(data.as_bytes()).expect("csv parses");
        let rejections = rejected(rows);
        assert_eq!(rejections.len(), 3);
        assert_eq!(rejections[0].line, 2);
        assert!(rejections[0].reason.contains("quarter"));
        assert!(rejections[1].reason.contains("outside"));
    }

    #[test]
    fn rejection_lines_follow_the_source_file() {
        let data = "user_id,year,quarter,category,value\n\
                    \n\
                    1,2025,1,weekly,3.0\n\
                    \n\
                    2,2025,1,peer,9.0\n\
                    3,2025,1\n";
        let rejections = rejected(parse_subscores(data.as_bytes()).expect("csv parses"));
        let lines: Vec<u64> = rejections.iter().map(|rejection| rejection.line).collect();
        assert_eq!(lines, vec![5, 6]);
    }

    #[test]
    fn rejects_profile_without_org() {
        let data = "user_id,job_id,tenure_years,org_id\n9,backend,2,\n";
        let rejections = rejected(parse_profiles(data.as_bytes()).expect("csv parses"));
        assert_eq!(rejections.len(), 1);
        assert!(rejections[0].reason.contains("org_id"));
    }
}
