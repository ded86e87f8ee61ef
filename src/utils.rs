use crate::error::{ReconcileError, Result};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// An inclusive calendar date range, as supplied by the routing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(ReconcileError::InvalidDateRange(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Parses a pair of ISO `YYYY-MM-DD` strings.
    pub fn parse_iso(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_iso_date(start)?, parse_iso_date(end)?)
    }

    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// The equally long range immediately preceding this one, used as the
    /// comparison baseline for period-over-period views.
    pub fn prior_equivalent(&self) -> Self {
        let len = self.num_days() as u64;
        Self {
            start: self
                .start
                .checked_sub_days(Days::new(len))
                .unwrap_or(self.start),
            end: self
                .end
                .checked_sub_days(Days::new(len))
                .unwrap_or(self.start),
        }
    }
}

pub fn parse_iso_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ReconcileError::InvalidDateRange(format!(
            "invalid date '{}': expected YYYY-MM-DD",
            value
        ))
    })
}

/// Formats a date in the commerce provider's wire format: `M/D/YY` with no
/// zero padding and a two-digit year.
pub fn commerce_wire_date(date: NaiveDate) -> String {
    format!(
        "{}/{}/{:02}",
        date.month(),
        date.day(),
        date.year().rem_euclid(100)
    )
}

/// The single-day range covering yesterday relative to `today`.
pub fn yesterday(today: NaiveDate) -> DateRange {
    let day = today
        .checked_sub_days(Days::new(1))
        .unwrap_or(today);
    DateRange::single_day(day)
}

/// The trailing seven full days ending yesterday relative to `today`.
pub fn trailing_week(today: NaiveDate) -> DateRange {
    let end = today
        .checked_sub_days(Days::new(1))
        .unwrap_or(today);
    let start = today
        .checked_sub_days(Days::new(7))
        .unwrap_or(today);
    DateRange { start, end }
}
