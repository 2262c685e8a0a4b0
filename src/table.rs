//! Presentation boundary: turns raw [`InstrumentReport`] values into display
//! strings and semantic tones. Nothing upstream of this module rounds.

use serde::Deserialize;

use crate::config::{IndicatorConfig, StylingConfig};
use crate::report::InstrumentReport;

const UNAVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Name,
    Price,
    DayChange,
    WeekChange,
    Rsi,
    MovingAverage,
    CurrentDrawdown,
    WindowDrawdown,
    WindowHighGap,
    MeanDrawdown,
    MaxDrawdown,
    YtdChange,
    AllTimeHigh,
    AllTimeHighGap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Center,
    Right,
}

impl Column {
    pub fn header(self, indicators: &IndicatorConfig) -> String {
        match self {
            Self::Name => "Ticker".into(),
            Self::Price => "Price".into(),
            Self::DayChange => "1D".into(),
            Self::WeekChange => "1W".into(),
            Self::Rsi => format!("RSI({})", indicators.rsi_period),
            Self::MovingAverage => format!("MA({})", indicators.moving_average_window),
            Self::CurrentDrawdown => "MDD".into(),
            Self::WindowDrawdown => format!("{}D MDD", indicators.drawdown_window),
            Self::WindowHighGap => format!("vs {}D High", indicators.drawdown_window),
            Self::MeanDrawdown => "Avg MDD".into(),
            Self::MaxDrawdown => "Max MDD".into(),
            Self::YtdChange => "YTD".into(),
            Self::AllTimeHigh => "ATH".into(),
            Self::AllTimeHighGap => "vs ATH".into(),
        }
    }

    pub fn align(self) -> Align {
        match self {
            Self::Name | Self::Price | Self::Rsi | Self::MovingAverage | Self::AllTimeHigh => {
                Align::Center
            }
            _ => Align::Right,
        }
    }

    fn precision(self) -> usize {
        match self {
            Self::DayChange => 2,
            _ => 1,
        }
    }
}

/// Direction a value points, independent of any color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub tone: Tone,
    pub strong: bool,
}

impl Cell {
    fn plain(text: String) -> Self {
        Self {
            text,
            tone: Tone::Neutral,
            strong: false,
        }
    }

    fn toned(text: String, tone: Tone, strong: bool) -> Self {
        Self { text, tone, strong }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// Category tag used for visual grouping.
    pub category: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub title: String,
    pub caption: String,
    pub columns: Vec<Column>,
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

fn format_number(value: f64, precision: usize) -> String {
    // Avoid "-0.0" for values that round to zero.
    let scale = 10f64.powi(precision as i32);
    let value = if (value * scale).round() == 0.0 { 0.0 } else { value };
    format!("{value:.precision$}")
}

fn format_pct(value: f64, precision: usize) -> String {
    format!("{}%", format_number(value, precision))
}

fn format_optional(value: Option<f64>, render: impl Fn(f64) -> String) -> String {
    value.map_or_else(|| UNAVAILABLE.to_string(), render)
}

fn signed_tone(value: f64) -> Tone {
    if value > 0.0 { Tone::Up } else { Tone::Down }
}

fn cell(column: Column, report: &InstrumentReport, styling: &StylingConfig) -> Cell {
    let p = column.precision();
    let ind = &report.indicators;
    let dd = &report.drawdown;

    match column {
        Column::Name => Cell::toned(report.display_name.clone(), Tone::Neutral, true),
        Column::Price => Cell::toned(format_number(report.current_price, p), Tone::Neutral, true),
        Column::DayChange => {
            let text = format_optional(ind.day_change_pct, |v| format_pct(v, p));
            let tone = match ind.day_change_pct {
                Some(v) if v < 0.0 => Tone::Down,
                Some(_) => Tone::Up,
                None => Tone::Neutral,
            };
            Cell::toned(text, tone, false)
        }
        Column::WeekChange => {
            let text = format_optional(ind.week_change_pct, |v| format_pct(v, p));
            let tone = ind.week_change_pct.map_or(Tone::Neutral, signed_tone);
            Cell::toned(text, tone, false)
        }
        Column::Rsi => {
            let text = format_optional(ind.rsi, |v| format_number(v, p));
            match ind.rsi {
                Some(v) if v >= styling.rsi_overbought => Cell::toned(text, Tone::Up, true),
                Some(v) if v <= styling.rsi_oversold => Cell::toned(text, Tone::Down, true),
                _ => Cell::plain(text),
            }
        }
        Column::MovingAverage => {
            let text = format_optional(ind.moving_average, |v| format_number(v, p));
            match ind.moving_average {
                Some(avg) if avg > report.current_price => Cell::toned(text, Tone::Down, true),
                _ => Cell::plain(text),
            }
        }
        Column::CurrentDrawdown => {
            let text = format_pct(dd.current_pct, p);
            if dd.current_pct <= styling.deep_drawdown_pct {
                Cell::toned(text, Tone::Down, true)
            } else {
                Cell::plain(text)
            }
        }
        Column::WindowDrawdown => {
            let text = format_pct(dd.windowed_pct, p);
            if dd.windowed_pct <= styling.window_drawdown_alert_pct {
                Cell::toned(text, Tone::Down, true)
            } else {
                Cell::plain(text)
            }
        }
        Column::WindowHighGap => Cell::plain(format_pct(ind.window_high_gap_pct, p)),
        Column::MeanDrawdown => {
            let text = format_pct(dd.mean_daily_pct, p);
            if dd.mean_daily_pct > dd.current_pct {
                Cell::toned(text, Tone::Down, false)
            } else {
                Cell::plain(text)
            }
        }
        Column::MaxDrawdown => Cell::plain(format_pct(dd.max_pct, p)),
        Column::YtdChange => {
            let text = format_optional(ind.ytd_change_pct, |v| format_pct(v, p));
            let tone = ind.ytd_change_pct.map_or(Tone::Neutral, signed_tone);
            Cell::toned(text, tone, false)
        }
        Column::AllTimeHigh => Cell::plain(format_number(ind.all_time_high, p)),
        Column::AllTimeHighGap => {
            let text = format_pct(ind.all_time_high_gap_pct, p);
            if ind.all_time_high_gap_pct <= styling.deep_drawdown_pct {
                Cell::toned(text, Tone::Down, false)
            } else {
                Cell::plain(text)
            }
        }
    }
}

/// Lay out `reports` (already in canonical order) under `columns`.
pub fn build(
    title: &str,
    caption: String,
    columns: &[Column],
    reports: &[InstrumentReport],
    indicators: &IndicatorConfig,
    styling: &StylingConfig,
) -> ReportTable {
    ReportTable {
        title: title.to_string(),
        caption,
        columns: columns.to_vec(),
        headers: columns.iter().map(|c| c.header(indicators)).collect(),
        rows: reports
            .iter()
            .map(|report| TableRow {
                category: report.category.clone(),
                cells: columns.iter().map(|&c| cell(c, report, styling)).collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::Indicators;
    use crate::model::DrawdownSummary;
    use chrono::NaiveDate;

    fn report() -> InstrumentReport {
        InstrumentReport {
            identifier: "SPY".into(),
            display_name: "S&P500".into(),
            category: "Index".into(),
            as_of: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            current_price: 100.04,
            indicators: Indicators {
                day_change_pct: Some(-1.234),
                week_change_pct: Some(0.5),
                ytd_change_pct: None,
                moving_average: Some(101.0),
                rsi: Some(75.0),
                all_time_high: 130.0,
                all_time_high_gap_pct: -23.0,
                window_high_gap_pct: -2.0,
            },
            drawdown: DrawdownSummary {
                current_pct: -35.0,
                mean_daily_pct: -10.0,
                max_pct: -50.0,
                windowed_pct: -0.01,
            },
        }
    }

    #[test]
    fn formats_with_fixed_precision() {
        let table = build(
            "t",
            String::new(),
            &[
                Column::Name,
                Column::Price,
                Column::DayChange,
                Column::YtdChange,
                Column::WindowDrawdown,
            ],
            &[report()],
            &IndicatorConfig::default(),
            &StylingConfig::default(),
        );
        let texts: Vec<&str> = table.rows[0].cells.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["S&P500", "100.0", "-1.23%", "N/A", "0.0%"]);
        assert_eq!(table.rows[0].category, "Index");
    }

    #[test]
    fn headers_reflect_configured_windows() {
        let indicators = IndicatorConfig::default();
        assert_eq!(Column::Rsi.header(&indicators), "RSI(14)");
        assert_eq!(Column::MovingAverage.header(&indicators), "MA(20)");
        assert_eq!(Column::WindowDrawdown.header(&indicators), "20D MDD");
    }

    #[test]
    fn tones_follow_thresholds() {
        let styling = StylingConfig::default();
        let r = report();

        let rsi = cell(Column::Rsi, &r, &styling);
        assert_eq!((rsi.tone, rsi.strong), (Tone::Up, true));

        let ma = cell(Column::MovingAverage, &r, &styling);
        assert_eq!((ma.tone, ma.strong), (Tone::Down, true));

        let mdd = cell(Column::CurrentDrawdown, &r, &styling);
        assert_eq!((mdd.tone, mdd.strong), (Tone::Down, true));

        let mean = cell(Column::MeanDrawdown, &r, &styling);
        assert_eq!(mean.tone, Tone::Down);

        let day = cell(Column::DayChange, &r, &styling);
        assert_eq!(day.tone, Tone::Down);

        let ytd = cell(Column::YtdChange, &r, &styling);
        assert_eq!(ytd.tone, Tone::Neutral);

        let window = cell(Column::WindowDrawdown, &r, &styling);
        assert_eq!(window.tone, Tone::Neutral);
    }

    #[test]
    fn window_drawdown_alert_flags_cell() {
        let mut r = report();
        r.drawdown.windowed_pct = -5.0;
        let window = cell(Column::WindowDrawdown, &r, &StylingConfig::default());
        assert_eq!((window.tone, window.strong), (Tone::Down, true));
    }

    #[test]
    fn rows_keep_input_order() {
        let mut second = report();
        second.identifier = "GLD".into();
        second.category = "Commodity".into();
        let table = build(
            "t",
            String::new(),
            &[Column::Name],
            &[report(), second],
            &IndicatorConfig::default(),
            &StylingConfig::default(),
        );
        let categories: Vec<&str> = table.rows.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["Index", "Commodity"]);
    }
}
