use std::fmt;
use std::num::NonZeroUsize;

use chrono::NaiveDate;
use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

/// How much history to request from a series source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lookback {
    #[serde(rename = "max")]
    Max,
    #[serde(rename = "1y")]
    OneYear,
}

impl Lookback {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::OneYear => "1y",
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One trading day. `high` falls back to `close` when the feed has no high.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSample {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: f64,
    pub low: Option<f64>,
    pub close: f64,
}

impl PriceSample {
    #[cfg(test)]
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: None,
            high: close,
            low: None,
            close,
        }
    }
}

/// A non-empty, strictly date-ordered series of positive prices.
///
/// Every computation in the drawdown engine and the indicators relies on
/// these invariants, so they are checked once here rather than at each
/// division.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    samples: Vec<PriceSample>,
}

#[allow(clippy::len_without_is_empty)]
impl PriceSeries {
    pub fn new(samples: Vec<PriceSample>) -> Result<Self, Report<SeriesError>> {
        if samples.is_empty() {
            bail!(SeriesError::EmptySeries);
        }

        for pair in samples.windows(2) {
            if pair[1].date <= pair[0].date {
                bail!(SeriesError::InvalidSeries {
                    reason: format!("dates not strictly increasing at {}", pair[1].date),
                });
            }
        }

        for sample in &samples {
            for (channel, price) in [("close", sample.close), ("high", sample.high)] {
                if !price.is_finite() || price <= 0.0 {
                    bail!(SeriesError::InvalidSeries {
                        reason: format!("non-positive {channel} price {price} on {}", sample.date),
                    });
                }
            }
        }

        Ok(Self { samples })
    }

    /// Build a series from `(date, close)` pairs, using each close as the high.
    #[cfg(test)]
    pub fn from_closes(
        points: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self, Report<SeriesError>> {
        Self::new(
            points
                .into_iter()
                .map(|(date, close)| PriceSample::from_close(date, close))
                .collect(),
        )
    }

    pub fn samples(&self) -> &[PriceSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn first(&self) -> &PriceSample {
        &self.samples[0]
    }

    pub fn last(&self) -> &PriceSample {
        &self.samples[self.samples.len() - 1]
    }

    pub fn closes(&self) -> impl DoubleEndedIterator<Item = f64> + ExactSizeIterator + '_ {
        self.samples.iter().map(|s| s.close)
    }

    /// The trailing `window` samples, or the whole series when it is shorter.
    pub fn tail(&self, window: NonZeroUsize) -> &[PriceSample] {
        let start = self.samples.len().saturating_sub(window.get());
        &self.samples[start..]
    }
}

/// Drawdown of one sample against the expanding maximum up to its date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownPoint {
    pub date: NaiveDate,
    pub drawdown_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownSummary {
    pub current_pct: f64,
    pub mean_daily_pct: f64,
    /// Most negative daily drawdown.
    pub max_pct: f64,
    pub windowed_pct: f64,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Days, NaiveDate};

    use super::PriceSeries;

    pub fn day(n: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(n)
    }

    /// Consecutive daily closes starting 2024-01-01.
    pub fn series(closes: &[f64]) -> PriceSeries {
        PriceSeries::from_closes(closes.iter().enumerate().map(|(i, &c)| (day(i as u64), c)))
            .unwrap()
    }
}
