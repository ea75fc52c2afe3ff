//! Run parameters and the run identifier derived from them

use chrono::NaiveDate;
use std::fmt;

/// Compact date format used by the pageviews API and in run identifiers
pub const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// Fixed date range over which a metric is aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MetricRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Parses a range from two `YYYYMMDD` strings
    pub fn parse(start: &str, end: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self {
            start: NaiveDate::parse_from_str(start, COMPACT_DATE_FORMAT)?,
            end: NaiveDate::parse_from_str(end, COMPACT_DATE_FORMAT)?,
        })
    }

    pub fn start_compact(&self) -> String {
        self.start.format(COMPACT_DATE_FORMAT).to_string()
    }

    pub fn end_compact(&self) -> String {
        self.end.format(COMPACT_DATE_FORMAT).to_string()
    }
}

/// Immutable parameters of a single crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParams {
    pub start_year: i32,
    /// Inclusive
    pub stop_year: i32,
    pub metric_range: MetricRange,
}

impl RunParams {
    pub fn new(start_year: i32, stop_year: i32, metric_range: MetricRange) -> Self {
        Self {
            start_year,
            stop_year,
            metric_range,
        }
    }

    /// Years covered by this run, ascending
    pub fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.start_year..=self.stop_year
    }

    /// The identifier that namespaces checkpoints and log files
    pub fn run_id(&self) -> RunId {
        RunId(
            format!(
                "{}-{}-{}-{}",
                self.start_year,
                self.stop_year,
                self.metric_range.start_compact(),
                self.metric_range.end_compact()
            )
            .to_lowercase(),
        )
    }
}

/// Identifier of a run, e.g. `1900-2020-20200101-20210101`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_lowercase())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
