use std::num::NonZeroUsize;

use crate::indicator::pct_change;
use crate::model::{PriceSample, PriceSeries};

/// Gap between the last close and the highest high of a span, in percent.
///
/// Uses the high channel, not closes. `scale` multiplies the reference high
/// before comparison (e.g. 0.1 for a feed whose historical highs are ten
/// times too large).
pub struct HighGap {
    window: Option<NonZeroUsize>,
    scale: f64,
}

impl HighGap {
    pub fn all_time(scale: f64) -> Self {
        Self {
            window: None,
            scale,
        }
    }

    /// Trailing `window` samples, or the whole series when shorter.
    pub fn trailing(window: NonZeroUsize) -> Self {
        Self {
            window: Some(window),
            scale: 1.0,
        }
    }

    fn span<'a>(&self, series: &'a PriceSeries) -> &'a [PriceSample] {
        match self.window {
            Some(window) => series.tail(window),
            None => series.samples(),
        }
    }

    pub fn reference_high(&self, series: &PriceSeries) -> f64 {
        let high = self
            .span(series)
            .iter()
            .map(|s| s.high)
            .fold(f64::NEG_INFINITY, f64::max);
        high * self.scale
    }

    pub fn gap_pct(&self, series: &PriceSeries) -> f64 {
        pct_change(self.reference_high(series), series.last().close)
    }
}
