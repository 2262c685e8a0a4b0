use chrono::{Datelike, NaiveDate};

use crate::indicator::{Indicator, pct_change};
use crate::model::PriceSeries;

/// Last close against the one before it.
pub struct DayChange;

impl Indicator for DayChange {
    fn name(&self) -> &str {
        "day_change"
    }

    fn required_samples(&self) -> usize {
        2
    }

    fn compute(&self, series: &PriceSeries) -> Option<f64> {
        let samples = series.samples();
        let previous = samples[samples.len() - 2].close;
        Some(pct_change(previous, series.last().close))
    }
}

/// Last close against the close `offset` positions earlier.
///
/// Position-based, not calendar-based: with `offset = 5` this compares to
/// index `len - 6`, roughly five trading days back. Series shorter than that
/// compare against their first sample.
pub struct PositionChange {
    name: &'static str,
    offset: usize,
}

impl PositionChange {
    pub fn new(name: &'static str, offset: usize) -> Self {
        Self { name, offset }
    }
}

impl Indicator for PositionChange {
    fn name(&self) -> &str {
        self.name
    }

    fn required_samples(&self) -> usize {
        1
    }

    fn compute(&self, series: &PriceSeries) -> Option<f64> {
        let samples = series.samples();
        let index = samples.len().saturating_sub(self.offset + 1);
        Some(pct_change(samples[index].close, series.last().close))
    }
}

/// Last close against the first sample on or after January 1 of `year`.
pub struct YearToDate {
    year_start: Option<NaiveDate>,
}

impl YearToDate {
    pub fn new(year: i32) -> Self {
        Self {
            year_start: NaiveDate::from_ymd_opt(year, 1, 1),
        }
    }
}

impl Indicator for YearToDate {
    fn name(&self) -> &str {
        "ytd_change"
    }

    fn required_samples(&self) -> usize {
        1
    }

    fn compute(&self, series: &PriceSeries) -> Option<f64> {
        let year_start = self.year_start?;
        let base = series.samples().iter().find(|s| s.date >= year_start)?;
        if base.date.year() != year_start.year() {
            return None;
        }
        Some(pct_change(base.close, series.last().close))
    }
}
