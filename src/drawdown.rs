//! Running-maximum drawdown statistics over a [`PriceSeries`].
//!
//! All values are percentages: `(price - peak) / peak * 100`, so they are
//! never positive and equal zero exactly at a new high. Closes are used
//! throughout.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::slice;

use chrono::Datelike;

use crate::model::{DrawdownPoint, DrawdownSummary, PriceSample, PriceSeries};

fn drawdown_pct(price: f64, peak: f64) -> f64 {
    (price - peak) / peak * 100.0
}

fn max_close(samples: &[PriceSample]) -> f64 {
    samples
        .iter()
        .map(|s| s.close)
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Drawdown of the last close against the highest close of the whole series.
pub fn current_drawdown(series: &PriceSeries) -> f64 {
    drawdown_pct(series.last().close, max_close(series.samples()))
}

/// Same as [`current_drawdown`] restricted to the trailing `window` samples.
pub fn windowed_drawdown(series: &PriceSeries, window: NonZeroUsize) -> f64 {
    let tail = series.tail(window);
    drawdown_pct(tail[tail.len() - 1].close, max_close(tail))
}

/// One point per sample, each against the expanding maximum up to that date.
pub fn daily_drawdown(series: &PriceSeries) -> DailyDrawdown<'_> {
    DailyDrawdown {
        samples: series.samples().iter(),
        peak: f64::NEG_INFINITY,
    }
}

/// Lazy iterator returned by [`daily_drawdown`]. Holds no state beyond the
/// running peak, so calling [`daily_drawdown`] again yields the same points.
#[derive(Debug, Clone)]
pub struct DailyDrawdown<'a> {
    samples: slice::Iter<'a, PriceSample>,
    peak: f64,
}

impl Iterator for DailyDrawdown<'_> {
    type Item = DrawdownPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.samples.next()?;
        self.peak = self.peak.max(sample.close);
        Some(DrawdownPoint {
            date: sample.date,
            drawdown_pct: drawdown_pct(sample.close, self.peak),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.samples.size_hint()
    }
}

impl ExactSizeIterator for DailyDrawdown<'_> {}

/// Per calendar year: last close of the year against that year's own high.
///
/// Earlier years' peaks are deliberately ignored.
pub fn yearly_drawdown(series: &PriceSeries) -> BTreeMap<i32, f64> {
    let mut years: BTreeMap<i32, (f64, f64)> = BTreeMap::new();
    for sample in series.samples() {
        years
            .entry(sample.date.year())
            .and_modify(|(peak, last)| {
                *peak = peak.max(sample.close);
                *last = sample.close;
            })
            .or_insert((sample.close, sample.close));
    }

    years
        .into_iter()
        .map(|(year, (peak, last))| (year, drawdown_pct(last, peak)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownStats {
    pub mean_pct: f64,
    /// Most negative point.
    pub worst_pct: f64,
}

/// Arithmetic mean and minimum of a drawdown sequence. `None` when empty.
pub fn summary_statistics(
    points: impl IntoIterator<Item = DrawdownPoint>,
) -> Option<DrawdownStats> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut worst = f64::INFINITY;
    for point in points {
        count += 1;
        sum += point.drawdown_pct;
        worst = worst.min(point.drawdown_pct);
    }

    (count > 0).then(|| DrawdownStats {
        mean_pct: sum / count as f64,
        worst_pct: worst,
    })
}

/// All four drawdown fields from a single series.
pub fn summarize(series: &PriceSeries, window: NonZeroUsize) -> DrawdownSummary {
    // A PriceSeries always has at least one sample, so the fallback is unreachable.
    let stats = summary_statistics(daily_drawdown(series)).unwrap_or(DrawdownStats {
        mean_pct: 0.0,
        worst_pct: 0.0,
    });

    DrawdownSummary {
        current_pct: current_drawdown(series),
        mean_daily_pct: stats.mean_pct,
        max_pct: stats.worst_pct,
        windowed_pct: windowed_drawdown(series, window),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PriceSample;
    use crate::model::fixtures::series;
    use chrono::NaiveDate;
    use nonzero_ext::nonzero;

    fn round2(v: f64) -> f64 {
        (v * 100.0).round() / 100.0
    }

    #[test]
    fn scenario_peak_then_decline() {
        let s = series(&[100.0, 110.0, 90.0, 95.0]);
        let points: Vec<f64> = daily_drawdown(&s).map(|p| round2(p.drawdown_pct)).collect();
        assert_eq!(points, vec![0.0, 0.0, -18.18, -13.64]);

        assert_eq!(round2(current_drawdown(&s)), -13.64);

        let stats = summary_statistics(daily_drawdown(&s)).unwrap();
        assert_eq!(round2(stats.worst_pct), -18.18);
        assert_eq!(round2(stats.mean_pct), -7.95);
    }

    #[test]
    fn single_sample_is_at_its_high() {
        let s = series(&[42.0]);
        let points: Vec<DrawdownPoint> = daily_drawdown(&s).collect();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].drawdown_pct, 0.0);
        assert_eq!(current_drawdown(&s), 0.0);
    }

    #[test]
    fn daily_points_never_positive_and_start_at_zero() {
        let s = series(&[5.0, 3.0, 8.0, 2.0, 9.0, 9.0, 1.0]);
        let points: Vec<DrawdownPoint> = daily_drawdown(&s).collect();
        assert_eq!(points.len(), s.len());
        assert_eq!(points[0].drawdown_pct, 0.0);
        assert!(points.iter().all(|p| p.drawdown_pct <= 0.0));
    }

    #[test]
    fn current_matches_last_daily_point() {
        let s = series(&[10.0, 12.0, 7.0, 11.0, 6.5]);
        let last = daily_drawdown(&s).last().unwrap();
        assert!((current_drawdown(&s) - last.drawdown_pct).abs() < 1e-12);
        assert_eq!(last.date, s.last().date);
    }

    #[test]
    fn daily_drawdown_is_restartable() {
        let s = series(&[10.0, 8.0, 12.0]);
        let first: Vec<DrawdownPoint> = daily_drawdown(&s).collect();
        let second: Vec<DrawdownPoint> = daily_drawdown(&s).collect();
        assert_eq!(first, second);
        assert_eq!(daily_drawdown(&s).len(), 3);
    }

    #[test]
    fn increasing_series_has_no_drawdown() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(daily_drawdown(&s).all(|p| p.drawdown_pct == 0.0));
        let stats = summary_statistics(daily_drawdown(&s)).unwrap();
        assert_eq!(stats.worst_pct, 0.0);
    }

    #[test]
    fn windowed_short_series_equals_current() {
        let s = series(&[100.0, 110.0, 90.0, 95.0]);
        assert_eq!(windowed_drawdown(&s, nonzero!(20usize)), current_drawdown(&s));
    }

    #[test]
    fn windowed_ignores_peaks_before_window() {
        let s = series(&[200.0, 100.0, 110.0, 99.0]);
        let expected = (99.0 - 110.0) / 110.0 * 100.0;
        assert!((windowed_drawdown(&s, nonzero!(3usize)) - expected).abs() < 1e-9);
        assert!((current_drawdown(&s) - (99.0 - 200.0) / 200.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn yearly_drawdown_scopes_peak_to_the_year() {
        let d = |y, m, dd| NaiveDate::from_ymd_opt(y, m, dd).unwrap();
        let s = PriceSeries::new(vec![
            PriceSample::from_close(d(2022, 3, 1), 200.0),
            PriceSample::from_close(d(2022, 12, 30), 150.0),
            PriceSample::from_close(d(2023, 1, 2), 100.0),
            PriceSample::from_close(d(2023, 6, 1), 120.0),
            PriceSample::from_close(d(2023, 12, 29), 120.0),
        ])
        .unwrap();

        let yearly = yearly_drawdown(&s);
        assert_eq!(yearly.len(), 2);
        assert!((yearly[&2022] - (-25.0)).abs() < 1e-9);
        // 2023 is at its own high even though 2022 peaked higher.
        assert_eq!(yearly[&2023], 0.0);
    }

    #[test]
    fn summary_statistics_of_empty_sequence() {
        assert!(summary_statistics(std::iter::empty()).is_none());
    }

    #[test]
    fn summarize_fills_all_fields() {
        let s = series(&[100.0, 110.0, 90.0, 95.0]);
        let summary = summarize(&s, nonzero!(2usize));
        assert_eq!(round2(summary.current_pct), -13.64);
        assert_eq!(round2(summary.max_pct), -18.18);
        assert_eq!(round2(summary.mean_daily_pct), -7.95);
        assert_eq!(summary.windowed_pct, 0.0);
    }
}
