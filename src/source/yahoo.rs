use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::error::{SeriesError, SourceError};
use crate::model::{Lookback, PriceSample, PriceSeries};
use crate::source::SeriesSource;

/// Start of the "max" range, as used by the chart API's own clients.
const MAX_PERIOD_START: i64 = -2_208_994_789;
const INITIAL_BACKOFF_MS: u64 = 500;

/// Daily history from the Yahoo Finance chart API.
pub struct YahooSource {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl YahooSource {
    pub fn new(config: &SourceConfig) -> Result<Self, Report<SourceError>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .change_context(SourceError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(
                config.requests_per_second,
            ))),
        })
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        lookback: Lookback,
    ) -> Result<ChartResult, Report<SourceError>> {
        // Wait for rate limiter before making the request
        self.rate_limiter.until_ready().await;

        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let mut params = vec![
            ("interval", "1d".to_string()),
            ("includePrePost", "false".to_string()),
        ];
        match lookback {
            Lookback::Max => {
                params.push(("period1", MAX_PERIOD_START.to_string()));
                params.push(("period2", Utc::now().timestamp().to_string()));
            }
            Lookback::OneYear => params.push(("range", "1y".to_string())),
        }

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .change_context(SourceError::Request {
                symbol: symbol.to_owned(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Report::new(SourceError::Status {
                symbol: symbol.to_owned(),
                status: status.as_u16(),
            })
            .attach(format!("response body: {body}")));
        }

        let envelope: ChartEnvelope =
            response
                .json()
                .await
                .change_context(SourceError::ResponseParse {
                    symbol: symbol.to_owned(),
                })?;

        envelope.into_result(symbol)
    }
}

fn is_retryable(report: &Report<SourceError>) -> bool {
    match report.current_context() {
        SourceError::Request { .. } => true,
        SourceError::Status { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

impl SeriesSource for YahooSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch_history(
        &self,
        symbol: &str,
        lookback: Lookback,
    ) -> BoxFuture<'_, Result<PriceSeries, Report<SourceError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
            let mut attempt = 0;

            let chart = loop {
                match self.fetch_chart(&symbol, lookback).await {
                    Ok(chart) => break chart,
                    Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                        attempt += 1;
                        warn!(symbol = %symbol, attempt, error = %e, "history fetch failed, retrying...");
                        sleep(backoff).await;
                        backoff *= 2;
                    }
                    Err(e) => return Err(e),
                }
            };

            let series = chart
                .into_series()
                .change_context(SourceError::Series {
                    symbol: symbol.clone(),
                })?;

            info!(
                symbol = %symbol,
                lookback = %lookback,
                samples = series.len(),
                first = %series.first().date,
                last = %series.last().date,
                "history fetch complete"
            );

            Ok(series)
        })
    }
}

// ── Chart API response ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartApiError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Seconds east of UTC for the listing exchange.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartEnvelope {
    fn into_result(self, symbol: &str) -> Result<ChartResult, Report<SourceError>> {
        if let Some(err) = self.chart.error {
            return Err(Report::new(SourceError::ResponseParse {
                symbol: symbol.to_owned(),
            })
            .attach(format!(
                "provider error {}: {}",
                err.code,
                err.description.unwrap_or_default()
            )));
        }

        self.chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| {
                Report::new(SourceError::Series {
                    symbol: symbol.to_owned(),
                })
                .attach("chart response has no result")
            })
    }
}

impl ChartResult {
    /// Drop days without a close, shift to exchange-local dates, sort, and
    /// keep the last sample when two share a date (the live quote for today
    /// is sometimes appended after the daily bar).
    fn into_series(self) -> Result<PriceSeries, Report<SeriesError>> {
        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();
        let offset = self.meta.gmtoffset;
        let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

        let mut samples: Vec<(i64, PriceSample)> = Vec::with_capacity(self.timestamp.len());
        for (i, &ts) in self.timestamp.iter().enumerate() {
            let Some(close) = at(&quote.close, i) else {
                continue;
            };
            let Some(local) = DateTime::from_timestamp(ts + offset, 0) else {
                debug!(timestamp = ts, "skipping sample with out-of-range timestamp");
                continue;
            };
            let high = at(&quote.high, i).filter(|h| *h > 0.0).unwrap_or(close);
            samples.push((
                ts,
                PriceSample {
                    date: local.date_naive(),
                    open: at(&quote.open, i),
                    high,
                    low: at(&quote.low, i),
                    close,
                },
            ));
        }
        samples.sort_by_key(|(ts, _)| *ts);

        let mut deduped: Vec<PriceSample> = Vec::with_capacity(samples.len());
        for (_, sample) in samples {
            match deduped.last_mut() {
                Some(prev) if prev.date == sample.date => *prev = sample,
                _ => deduped.push(sample),
            }
        }

        PriceSeries::new(deduped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(json: &str) -> ChartEnvelope {
        serde_json::from_str(json).expect("parse failed")
    }

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "currency": "USD", "symbol": "SPY", "gmtoffset": -14400 },
                "timestamp": [1717421400, 1717507800, 1717594200, 1717612000],
                "indicators": {
                    "quote": [{
                        "open":  [527.0, 526.0, null, 532.0],
                        "high":  [529.0, 528.5, null, 535.0],
                        "low":   [522.0, 523.0, null, 530.0],
                        "close": [527.8, 528.4, null, 534.7],
                        "volume": [1, 2, null, 3]
                    }],
                    "adjclose": [{ "adjclose": [527.8, 528.4, null, 534.7] }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn chart_response_parses_into_series() {
        let result = parse(SAMPLE).into_result("SPY").unwrap();
        let series = result.into_series().unwrap();

        // null close dropped
        assert_eq!(series.len(), 3);
        let first = series.first();
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert_eq!(first.close, 527.8);
        assert_eq!(first.high, 529.0);
        assert_eq!(first.open, Some(527.0));
    }

    #[test]
    fn same_day_samples_keep_latest() {
        let json = r#"{
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": 0 },
                    "timestamp": [1717459200, 1717480800, 1717545600],
                    "indicators": { "quote": [{
                        "high":  [10.0, 12.0, 11.0],
                        "close": [9.0, 11.5, 10.5]
                    }]}
                }],
                "error": null
            }
        }"#;
        let series = parse(json).into_result("X").unwrap().into_series().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.first().close, 11.5);
    }

    #[test]
    fn missing_high_falls_back_to_close() {
        let json = r#"{
            "chart": {
                "result": [{
                    "meta": { "gmtoffset": 0 },
                    "timestamp": [1717459200],
                    "indicators": { "quote": [{ "high": [null], "close": [9.0] }] }
                }],
                "error": null
            }
        }"#;
        let series = parse(json).into_result("X").unwrap().into_series().unwrap();
        assert_eq!(series.last().high, 9.0);
    }

    #[test]
    fn result_without_samples_is_empty_series() {
        let json = r#"{
            "chart": {
                "result": [{ "meta": { "gmtoffset": 0 }, "indicators": { "quote": [{}] } }],
                "error": null
            }
        }"#;
        let err = parse(json).into_result("X").unwrap().into_series().unwrap_err();
        assert!(matches!(err.current_context(), SeriesError::EmptySeries));
    }

    #[test]
    fn provider_error_is_reported() {
        let json = r#"{
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        }"#;
        assert!(parse(json).into_result("NOPE").is_err());
    }

    #[test]
    fn retry_policy_covers_transport_and_server_errors() {
        let request = Report::new(SourceError::Request { symbol: "X".into() });
        let throttled = Report::new(SourceError::Status {
            symbol: "X".into(),
            status: 429,
        });
        let missing = Report::new(SourceError::Status {
            symbol: "X".into(),
            status: 404,
        });
        assert!(is_retryable(&request));
        assert!(is_retryable(&throttled));
        assert!(!is_retryable(&missing));
    }

    /// Integration test: requires network access. Run with `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn integration_fetch_history() {
        let source = YahooSource::new(&SourceConfig::default()).unwrap();
        let series = source.fetch_history("SPY", Lookback::OneYear).await.unwrap();
        assert!(series.len() > 200);
    }
}
