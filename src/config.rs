use std::collections::HashSet;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::Path;

use error_stack::{Report, ResultExt};
use nonzero_ext::nonzero;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::indicator::rsi::RsiSmoothing;
use crate::model::Lookback;
use crate::table::Column;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_output_dir() -> String {
    "./out".into()
}

fn default_concurrency() -> NonZeroUsize {
    nonzero!(4usize)
}

fn default_instrument_timeout_secs() -> u64 {
    60
}

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".into()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    2
}

fn default_requests_per_second() -> NonZeroU32 {
    nonzero!(5u32)
}

fn default_user_agent() -> String {
    concat!("mdd-monitor/", env!("CARGO_PKG_VERSION")).into()
}

fn default_window() -> NonZeroUsize {
    nonzero!(20usize)
}

fn default_rsi_period() -> NonZeroUsize {
    nonzero!(14usize)
}

fn default_week_lookback() -> usize {
    5
}

fn default_font_family() -> String {
    "NanumGothic, AppleGothic, Arial, sans-serif".into()
}

fn default_rsi_overbought() -> f64 {
    70.0
}

fn default_rsi_oversold() -> f64 {
    30.0
}

fn default_deep_drawdown_pct() -> f64 {
    -30.0
}

fn default_window_drawdown_alert_pct() -> f64 {
    -5.0
}

fn default_image_scale() -> f32 {
    2.0
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_password_env() -> String {
    "APP_PASSWORD".into()
}

fn default_subject() -> String {
    "Market drawdown report".into()
}

fn default_body() -> String {
    "See the attached report images.".into()
}

fn default_mail_timeout_secs() -> u64 {
    30
}

fn default_lookback() -> Lookback {
    Lookback::OneYear
}

fn default_columns() -> Vec<Column> {
    vec![
        Column::Name,
        Column::Price,
        Column::DayChange,
        Column::Rsi,
        Column::MovingAverage,
        Column::CurrentDrawdown,
        Column::MeanDrawdown,
        Column::YtdChange,
    ]
}

fn default_high_scale() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub styling: StylingConfig,
    pub mail: Option<MailConfig>,
    #[serde(default)]
    pub reports: Vec<ReportConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Instruments fetched at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: NonZeroUsize,
    /// Upper bound on building one instrument's row: every fetch it needs,
    /// retries included.
    #[serde(default = "default_instrument_timeout_secs")]
    pub instrument_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: NonZeroU32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            requests_per_second: default_requests_per_second(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_window")]
    pub moving_average_window: NonZeroUsize,
    /// Trailing window for windowed drawdown and the window-high gap.
    #[serde(default = "default_window")]
    pub drawdown_window: NonZeroUsize,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: NonZeroUsize,
    #[serde(default)]
    pub rsi_smoothing: RsiSmoothing,
    /// Positions back for the week-over-week change.
    #[serde(default = "default_week_lookback")]
    pub week_lookback: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            moving_average_window: default_window(),
            drawdown_window: default_window(),
            rsi_period: default_rsi_period(),
            rsi_smoothing: RsiSmoothing::default(),
            week_lookback: default_week_lookback(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StylingConfig {
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,
    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,
    #[serde(default = "default_deep_drawdown_pct")]
    pub deep_drawdown_pct: f64,
    #[serde(default = "default_window_drawdown_alert_pct")]
    pub window_drawdown_alert_pct: f64,
    /// Pixel density of the rasterized report image.
    #[serde(default = "default_image_scale")]
    pub image_scale: f32,
}

impl Default for StylingConfig {
    fn default() -> Self {
        Self {
            font_family: default_font_family(),
            rsi_overbought: default_rsi_overbought(),
            rsi_oversold: default_rsi_oversold(),
            deep_drawdown_pct: default_deep_drawdown_pct(),
            window_drawdown_alert_pct: default_window_drawdown_alert_pct(),
            image_scale: default_image_scale(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub from: String,
    pub to: Vec<String>,
    /// SMTP login; defaults to `from`.
    pub username: Option<String>,
    /// Environment variable holding the SMTP password.
    #[serde(default = "default_password_env")]
    pub password_env: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_body")]
    pub body: String,
    #[serde(default = "default_mail_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub title: String,
    /// Image file name without extension.
    pub file_name: String,
    #[serde(default = "default_lookback")]
    pub lookback: Lookback,
    #[serde(default = "default_columns")]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
}

impl ReportConfig {
    /// Instruments in canonical order: category order, then listed order.
    pub fn instruments(&self) -> impl Iterator<Item = (&CategoryConfig, &InstrumentConfig)> {
        self.categories
            .iter()
            .flat_map(|c| c.instruments.iter().map(move |i| (c, i)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    /// Shown in the report instead of the symbol.
    pub name: Option<String>,
    /// Multiplier applied to the all-time high before computing its gap.
    #[serde(default = "default_high_scale")]
    pub high_scale: f64,
}

impl InstrumentConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.symbol)
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_reports_present(config)?;
    validate_report_file_names_unique(config)?;
    validate_categories(config)?;
    validate_instruments(config)?;
    validate_styling(config)?;
    validate_mail(config)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not one of text, json",
            config.general.log_format
        )));
    }
    if config.general.instrument_timeout_secs == 0 {
        return Err(invalid("general.instrument_timeout_secs must be > 0".into()));
    }
    if config.source.request_timeout_secs == 0 {
        return Err(invalid("source.request_timeout_secs must be > 0".into()));
    }
    Ok(())
}

fn validate_reports_present(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.reports.is_empty() {
        return Err(invalid("reports: at least one report is required".into()));
    }
    Ok(())
}

fn validate_report_file_names_unique(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let mut seen = HashSet::new();
    for report in &config.reports {
        if report.file_name.trim().is_empty() {
            return Err(invalid(format!(
                "reports[\"{}\"].file_name must not be empty",
                report.title
            )));
        }
        if !seen.insert(report.file_name.as_str()) {
            return Err(invalid(format!(
                "reports: duplicate file_name \"{}\"",
                report.file_name
            )));
        }
    }
    Ok(())
}

fn validate_categories(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    for report in &config.reports {
        if report.columns.is_empty() {
            return Err(invalid(format!(
                "reports[\"{}\"].columns must not be empty",
                report.title
            )));
        }

        let mut seen = HashSet::new();
        for category in &report.categories {
            if category.name.trim().is_empty() {
                return Err(invalid(format!(
                    "reports[\"{}\"].categories: empty category name",
                    report.title
                )));
            }
            if !seen.insert(category.name.as_str()) {
                return Err(invalid(format!(
                    "reports[\"{}\"].categories: duplicate name \"{}\"",
                    report.title, category.name
                )));
            }
        }
    }
    Ok(())
}

fn validate_instruments(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    for report in &config.reports {
        for (category, instrument) in report.instruments() {
            if instrument.symbol.trim().is_empty() {
                return Err(invalid(format!(
                    "reports[\"{}\"].categories[\"{}\"]: empty symbol",
                    report.title, category.name
                )));
            }
            if !instrument.high_scale.is_finite() || instrument.high_scale <= 0.0 {
                return Err(invalid(format!(
                    "instrument \"{}\".high_scale must be a positive number",
                    instrument.symbol
                )));
            }
        }
    }
    Ok(())
}

fn validate_styling(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let styling = &config.styling;
    if styling.rsi_oversold >= styling.rsi_overbought {
        return Err(invalid(format!(
            "styling.rsi_oversold ({}) must be below rsi_overbought ({})",
            styling.rsi_oversold, styling.rsi_overbought
        )));
    }
    if !styling.image_scale.is_finite() || styling.image_scale <= 0.0 {
        return Err(invalid(format!(
            "styling.image_scale ({}) must be a positive number",
            styling.image_scale
        )));
    }
    Ok(())
}

fn validate_mail(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let Some(mail) = &config.mail else {
        return Ok(());
    };
    if mail.enabled && mail.to.is_empty() {
        return Err(invalid("mail.to needs at least one recipient".into()));
    }
    Ok(())
}
