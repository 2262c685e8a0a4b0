use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

/// Reasons a price series cannot be used for any computation.
#[derive(Debug, Display, Error)]
pub enum SeriesError {
    #[display("series has no samples")]
    EmptySeries,
    #[display("invalid series: {reason}")]
    InvalidSeries { reason: String },
}

#[derive(Debug, Display, Error)]
pub enum SourceError {
    #[display("failed to build http client")]
    Client,
    #[display("history request for {symbol} failed")]
    Request { symbol: String },
    #[display("history request for {symbol} returned HTTP {status}")]
    Status { symbol: String, status: u16 },
    #[display("failed to parse history response for {symbol}")]
    ResponseParse { symbol: String },
    #[display("history for {symbol} is not a usable series")]
    Series { symbol: String },
}

/// Per-instrument failure while assembling a report. Never fatal to the batch.
#[derive(Debug, Display, Error)]
pub enum ReportError {
    #[display("failed to fetch history for {symbol}")]
    Fetch { symbol: String },
    #[display("history fetch for {symbol} timed out")]
    Timeout { symbol: String },
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}

#[derive(Debug, Display, Error)]
pub enum RenderError {
    #[display("report table has no rows")]
    EmptyTable,
    #[display("failed to rasterize report image")]
    Rasterize,
    #[display("failed to write rendered image to {path}")]
    Write { path: String },
}

#[derive(Debug, Display, Error)]
pub enum DeliveryError {
    #[display("invalid mail address: {value}")]
    Address { value: String },
    #[display("failed to build mail message")]
    Build,
    #[display("missing mail credentials in ${var}")]
    Credentials { var: String },
    #[display("failed to send mail")]
    Transport,
}
