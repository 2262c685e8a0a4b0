pub mod yahoo;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::SourceError;
use crate::model::{Lookback, PriceSeries};

/// Abstraction over a daily price-history provider.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn SeriesSource`).
pub trait SeriesSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch date-ordered daily history for `symbol`.
    ///
    /// A provider answer with no usable samples is an error whose chain
    /// contains [`crate::error::SeriesError::EmptySeries`].
    fn fetch_history(
        &self,
        symbol: &str,
        lookback: Lookback,
    ) -> BoxFuture<'_, Result<PriceSeries, Report<SourceError>>>;
}
