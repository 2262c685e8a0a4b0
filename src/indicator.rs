pub mod change;
pub mod high;
pub mod ma;
pub mod rsi;

use std::num::NonZeroUsize;

use chrono::{Datelike, NaiveDate};
use error_stack::Report;

use crate::config::IndicatorConfig;
use crate::error::IndicatorError;
use crate::model::PriceSeries;

use change::{DayChange, PositionChange, YearToDate};
use high::HighGap;
use ma::MovingAverage;
use rsi::Rsi;

/// A single-valued indicator derived from a price series.
///
/// Samples must be in ascending date order, which [`PriceSeries`] guarantees.
pub trait Indicator {
    /// Unique name of this indicator (e.g., "rsi", "day_change").
    fn name(&self) -> &str;

    /// Minimum number of samples required to produce a value.
    fn required_samples(&self) -> usize;

    /// Raw value for a series that already has `required_samples()` samples.
    /// May still be `None` when the history lacks something other than length.
    fn compute(&self, series: &PriceSeries) -> Option<f64>;
}

/// Compute `indicator`, yielding `None` (reported as unavailable) on short history.
pub fn evaluate(indicator: &dyn Indicator, series: &PriceSeries) -> Option<f64> {
    let required = indicator.required_samples();
    if series.len() < required {
        tracing::debug!(
            indicator = indicator.name(),
            available = series.len(),
            required,
            "insufficient history for indicator"
        );
        return None;
    }
    indicator.compute(series)
}

/// Raw indicator values for one instrument. `None` means unavailable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Indicators {
    pub day_change_pct: Option<f64>,
    pub week_change_pct: Option<f64>,
    pub ytd_change_pct: Option<f64>,
    pub moving_average: Option<f64>,
    pub rsi: Option<f64>,
    pub all_time_high: f64,
    pub all_time_high_gap_pct: f64,
    pub window_high_gap_pct: f64,
}

/// Builds every per-instrument indicator from one configuration, fixed for a run.
pub struct IndicatorDeriver {
    day_change: DayChange,
    week_change: PositionChange,
    ytd_change: YearToDate,
    moving_average: MovingAverage,
    rsi: Rsi,
    high_window: NonZeroUsize,
}

impl IndicatorDeriver {
    /// `as_of` decides which calendar year counts as year-to-date.
    pub fn new(
        config: &IndicatorConfig,
        as_of: NaiveDate,
    ) -> Result<Self, Report<IndicatorError>> {
        Ok(Self {
            day_change: DayChange,
            week_change: PositionChange::new("week_change", config.week_lookback),
            ytd_change: YearToDate::new(as_of.year()),
            moving_average: MovingAverage::new(config.moving_average_window),
            rsi: Rsi::new(config.rsi_period.get(), config.rsi_smoothing)?,
            high_window: config.drawdown_window,
        })
    }

    /// Derive all indicators. `high_scale` corrects the high channel of
    /// instruments whose feed reports highs in a different unit.
    pub fn derive(&self, series: &PriceSeries, high_scale: f64) -> Indicators {
        let all_time = HighGap::all_time(high_scale);
        let windowed = HighGap::trailing(self.high_window);

        Indicators {
            day_change_pct: evaluate(&self.day_change, series),
            week_change_pct: evaluate(&self.week_change, series),
            ytd_change_pct: evaluate(&self.ytd_change, series),
            moving_average: evaluate(&self.moving_average, series),
            rsi: evaluate(&self.rsi, series),
            all_time_high: all_time.reference_high(series),
            all_time_high_gap_pct: all_time.gap_pct(series),
            window_high_gap_pct: windowed.gap_pct(series),
        }
    }
}

pub(crate) fn pct_change(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}
