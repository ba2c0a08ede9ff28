use crate::stats::StatsError;
use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

pub const DEFAULT_WINDOW_DAYS: u32 = 7;
pub const MAX_WINDOW_DAYS: u32 = 365;
/// How many years before the current one the calendar may look back.
pub const YEAR_LOOKBACK: i32 = 2;

static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("year pattern is valid"));

/// Inclusive, contiguous range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// The `days` calendar days ending at `today`.
    pub fn rolling(today: NaiveDate, days: u32) -> Result<Self, StatsError> {
        if days == 0 {
            return Err(StatsError::InvalidDays("0".to_string()));
        }

        let days = days.min(MAX_WINDOW_DAYS);
        Ok(Self {
            start: today - Duration::days(i64::from(days) - 1),
            end: today,
        })
    }

    /// Jan 1 .. Dec 31 of `raw_year`, limited to the current year and the two before it.
    pub fn for_year(today: NaiveDate, raw_year: &str) -> Result<Self, StatsError> {
        let raw_year = raw_year.trim();
        if !YEAR_PATTERN.is_match(raw_year) {
            return Err(StatsError::InvalidYear(raw_year.to_string()));
        }

        let year = raw_year
            .parse::<i32>()
            .map_err(|_| StatsError::InvalidYear(raw_year.to_string()))?;
        let current_year = today.year();
        if !(current_year - YEAR_LOOKBACK..=current_year).contains(&year) {
            return Err(StatsError::YearNotAllowed {
                year,
                earliest: current_year - YEAR_LOOKBACK,
                latest: current_year,
            });
        }

        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| StatsError::InvalidYear(raw_year.to_string()))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| StatsError::InvalidYear(raw_year.to_string()))?;

        Ok(Self { start, end })
    }

    pub fn len(&self) -> usize {
        ((self.end - self.start).num_days() + 1).max(0) as usize
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let start = self.start;
        (0..self.len() as i64).map(move |offset| start + Duration::days(offset))
    }
}

/// Parses the `days` query parameter. Absent means the default window,
/// anything above the maximum is clamped, and zero, negative or
/// non-numeric input is rejected.
pub fn parse_days(raw: Option<&str>) -> Result<u32, StatsError> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(DEFAULT_WINDOW_DAYS);
    };

    let days = raw
        .parse::<i64>()
        .map_err(|_| StatsError::InvalidDays(raw.to_string()))?;
    if days <= 0 {
        return Err(StatsError::InvalidDays(raw.to_string()));
    }

    Ok(days.min(i64::from(MAX_WINDOW_DAYS)) as u32)
}
