use error_stack::{Report, bail};
use serde::Deserialize;

use crate::error::IndicatorError;
use crate::indicator::Indicator;
use crate::model::PriceSeries;

/// How average gains and losses are formed from close-to-close deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiSmoothing {
    /// Plain mean of the last `period` deltas.
    #[default]
    Simple,
    /// Seed with the mean of the first `period` deltas, then apply Wilder's
    /// recursive smoothing over the rest of the series.
    Wilder,
}

/// RSI (Relative Strength Index), reporting the value at the last sample.
///
/// Zero-division convention: 100 when the average loss is zero and the
/// average gain is positive, 0 when both are zero.
pub struct Rsi {
    period: usize,
    smoothing: RsiSmoothing,
}

impl Rsi {
    pub fn new(period: usize, smoothing: RsiSmoothing) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "rsi period must be > 0".into(),
            });
        }
        Ok(Self { period, smoothing })
    }

    fn averages(&self, deltas: &[f64]) -> (f64, f64) {
        let period = self.period as f64;
        let mean = |window: &[f64]| {
            let gain = window.iter().map(|&d| d.max(0.0)).sum::<f64>() / period;
            let loss = window.iter().map(|&d| (-d).max(0.0)).sum::<f64>() / period;
            (gain, loss)
        };

        match self.smoothing {
            RsiSmoothing::Simple => mean(&deltas[deltas.len() - self.period..]),
            RsiSmoothing::Wilder => {
                let (mut avg_gain, mut avg_loss) = mean(&deltas[..self.period]);
                for &delta in &deltas[self.period..] {
                    avg_gain = (avg_gain * (period - 1.0) + delta.max(0.0)) / period;
                    avg_loss = (avg_loss * (period - 1.0) + (-delta).max(0.0)) / period;
                }
                (avg_gain, avg_loss)
            }
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    fn required_samples(&self) -> usize {
        self.period + 1
    }

    fn compute(&self, series: &PriceSeries) -> Option<f64> {
        let closes: Vec<f64> = series.closes().collect();
        let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        if deltas.len() < self.period {
            return None;
        }

        let (avg_gain, avg_loss) = self.averages(&deltas);
        Some(rsi_value(avg_gain, avg_loss))
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain > 0.0 { 100.0 } else { 0.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::evaluate;
    use crate::model::fixtures::series;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn rsi_period_zero_invalid() {
        assert!(Rsi::new(0, RsiSmoothing::Simple).is_err());
    }

    #[test]
    fn fourteen_points_unavailable() {
        let rsi = Rsi::new(14, RsiSmoothing::Simple).unwrap();
        assert_eq!(evaluate(&rsi, &series(&rising(14))), None);
    }

    #[test]
    fn fifteen_rising_closes_is_100() {
        for smoothing in [RsiSmoothing::Simple, RsiSmoothing::Wilder] {
            let rsi = Rsi::new(14, smoothing).unwrap();
            assert_eq!(evaluate(&rsi, &series(&rising(15))), Some(100.0));
        }
    }

    #[test]
    fn all_losses_is_0() {
        let rsi = Rsi::new(3, RsiSmoothing::Simple).unwrap();
        let value = evaluate(&rsi, &series(&[4.0, 3.0, 2.0, 1.0])).unwrap();
        assert!(value.abs() < 1e-9);
    }

    #[test]
    fn flat_series_is_0() {
        let rsi = Rsi::new(3, RsiSmoothing::Wilder).unwrap();
        assert_eq!(evaluate(&rsi, &series(&[5.0; 6])), Some(0.0));
    }

    #[test]
    fn simple_smoothing_uses_only_trailing_window() {
        let rsi = Rsi::new(2, RsiSmoothing::Simple).unwrap();
        // deltas: -50, +2, -1 -> last two: gain 1.0, loss 0.5 -> RS 2
        let value = evaluate(&rsi, &series(&[100.0, 50.0, 52.0, 51.0])).unwrap();
        assert!((value - (100.0 - 100.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn wilder_smoothing_carries_earlier_deltas() {
        let rsi = Rsi::new(2, RsiSmoothing::Wilder).unwrap();
        // seed from (-50, +2): gain 1, loss 25; then -1: gain 0.5, loss 13
        let value = evaluate(&rsi, &series(&[100.0, 50.0, 52.0, 51.0])).unwrap();
        let rs = 0.5 / 13.0;
        assert!((value - (100.0 - 100.0 / (1.0 + rs))).abs() < 1e-9);
    }
}
