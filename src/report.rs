use std::num::NonZeroUsize;
use std::time::Duration;

use chrono::NaiveDate;
use error_stack::{Report, ResultExt};
use futures::{StreamExt, stream};
use tracing::{debug, info, warn};

use crate::config::{CategoryConfig, InstrumentConfig, ReportConfig};
use crate::drawdown;
use crate::error::ReportError;
use crate::indicator::{IndicatorDeriver, Indicators};
use crate::model::{DrawdownSummary, Lookback, PriceSeries};
use crate::source::SeriesSource;

/// One report row, built once per run and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentReport {
    pub identifier: String,
    pub display_name: String,
    pub category: String,
    /// Date of the latest sample.
    pub as_of: NaiveDate,
    pub current_price: f64,
    pub indicators: Indicators,
    /// Current and windowed fields use the report's lookback; mean and max
    /// always cover the maximum available history.
    pub drawdown: DrawdownSummary,
}

/// Maps configured instruments through a [`SeriesSource`] into report rows.
pub struct ReportAssembler<'a> {
    source: &'a dyn SeriesSource,
    deriver: &'a IndicatorDeriver,
    drawdown_window: NonZeroUsize,
    concurrency: NonZeroUsize,
    fetch_timeout: Duration,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(
        source: &'a dyn SeriesSource,
        deriver: &'a IndicatorDeriver,
        drawdown_window: NonZeroUsize,
        concurrency: NonZeroUsize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            deriver,
            drawdown_window,
            concurrency,
            fetch_timeout,
        }
    }

    /// Build every row of `report` that can be built.
    ///
    /// Instruments whose history cannot be fetched or is unusable are logged
    /// and left out. Rows come back in category order, then configured
    /// instrument order, regardless of which fetch finished first.
    pub async fn assemble(&self, report: &ReportConfig) -> Vec<InstrumentReport> {
        let lookback = report.lookback;
        let total = report.instruments().count();
        info!(report = %report.title, instruments = total, %lookback, "assembling report");

        let mut rows: Vec<(usize, InstrumentReport)> =
            stream::iter(report.instruments().enumerate())
                .map(|(position, (category, instrument))| async move {
                    let result = self
                        .build_row_within_timeout(category, instrument, lookback)
                        .await;
                    (position, instrument, result)
                })
                .buffer_unordered(self.concurrency.get())
                .filter_map(|(position, instrument, result)| async move {
                    match result {
                        Ok(row) => {
                            debug!(symbol = %row.identifier, as_of = %row.as_of, "row built");
                            Some((position, row))
                        }
                        Err(e) => {
                            warn!(symbol = %instrument.symbol, error = ?e, "skipping instrument");
                            None
                        }
                    }
                })
                .collect()
                .await;

        rows.sort_by_key(|(position, _)| *position);

        info!(
            report = %report.title,
            built = rows.len(),
            skipped = total - rows.len(),
            "report assembled"
        );

        rows.into_iter().map(|(_, row)| row).collect()
    }

    async fn fetch(
        &self,
        symbol: &str,
        lookback: Lookback,
    ) -> Result<PriceSeries, Report<ReportError>> {
        self.source
            .fetch_history(symbol, lookback)
            .await
            .change_context(ReportError::Fetch {
                symbol: symbol.to_owned(),
            })
    }

    /// The timeout covers every fetch a row needs, not each one separately.
    async fn build_row_within_timeout(
        &self,
        category: &CategoryConfig,
        instrument: &InstrumentConfig,
        lookback: Lookback,
    ) -> Result<InstrumentReport, Report<ReportError>> {
        let build = self.build_row(category, instrument, lookback);
        match tokio::time::timeout(self.fetch_timeout, build).await {
            Ok(result) => result,
            Err(_) => Err(Report::new(ReportError::Timeout {
                symbol: instrument.symbol.clone(),
            })
            .attach(format!("timeout: {:?}", self.fetch_timeout))),
        }
    }

    async fn build_row(
        &self,
        category: &CategoryConfig,
        instrument: &InstrumentConfig,
        lookback: Lookback,
    ) -> Result<InstrumentReport, Report<ReportError>> {
        let series = self.fetch(&instrument.symbol, lookback).await?;
        let full_history = match lookback {
            Lookback::Max => None,
            Lookback::OneYear => Some(self.fetch(&instrument.symbol, Lookback::Max).await?),
        };

        let recent = drawdown::summarize(&series, self.drawdown_window);
        let history = match &full_history {
            Some(history) => drawdown::summarize(history, self.drawdown_window),
            None => recent,
        };

        Ok(InstrumentReport {
            identifier: instrument.symbol.clone(),
            display_name: instrument.display_name().to_string(),
            category: category.name.clone(),
            as_of: series.last().date,
            current_price: series.last().close,
            indicators: self.deriver.derive(&series, instrument.high_scale),
            drawdown: DrawdownSummary {
                mean_daily_pct: history.mean_daily_pct,
                max_pct: history.max_pct,
                ..recent
            },
        })
    }
}
