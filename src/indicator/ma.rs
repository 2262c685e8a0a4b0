use std::num::NonZeroUsize;

use crate::indicator::Indicator;
use crate::model::PriceSeries;

/// Simple moving average of the trailing `window` closes.
///
/// Shorter series average every close they have.
pub struct MovingAverage {
    window: NonZeroUsize,
}

impl MovingAverage {
    pub fn new(window: NonZeroUsize) -> Self {
        Self { window }
    }
}

impl Indicator for MovingAverage {
    fn name(&self) -> &str {
        "moving_average"
    }

    fn required_samples(&self) -> usize {
        1
    }

    fn compute(&self, series: &PriceSeries) -> Option<f64> {
        let tail = series.tail(self.window);
        Some(tail.iter().map(|s| s.close).sum::<f64>() / tail.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::evaluate;
    use crate::model::fixtures::series;
    use nonzero_ext::nonzero;

    #[test]
    fn averages_trailing_window() {
        let ma = MovingAverage::new(nonzero!(3usize));
        let value = evaluate(&ma, &series(&[100.0, 1.0, 2.0, 3.0])).unwrap();
        assert!((value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn short_series_averages_everything() {
        let ma = MovingAverage::new(nonzero!(20usize));
        let s = series(&[1.0, 2.0, 3.0, 4.0]);
        let whole = s.closes().sum::<f64>() / s.len() as f64;
        assert!((evaluate(&ma, &s).unwrap() - whole).abs() < 1e-9);
    }

    #[test]
    fn flat_prices() {
        let ma = MovingAverage::new(nonzero!(5usize));
        let value = evaluate(&ma, &series(&[10.0; 8])).unwrap();
        assert!((value - 10.0).abs() < 1e-9);
    }
}
