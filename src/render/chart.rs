use std::fmt::Write as _;

use chrono::{Datelike, NaiveDate};
use error_stack::Report;

use super::{RenderedImage, escape_xml};
use crate::drawdown::DrawdownStats;
use crate::error::RenderError;
use crate::model::DrawdownPoint;

const WIDTH: f64 = 720.0;
const HEIGHT: f64 = 320.0;
const PADDING: f64 = 44.0;
const LINE_COLOR: &str = "#348dc1";
const MEAN_COLOR: &str = "#ff9933";
const WORST_COLOR: &str = "#d32f2f";
const GRID_COLOR: &str = "#dddddd";

struct Guide {
    value: f64,
    color: &'static str,
    label: String,
}

fn x_positions(len: usize) -> Vec<f64> {
    if len == 1 {
        return vec![WIDTH / 2.0];
    }
    let inner = WIDTH - 2.0 * PADDING;
    (0..len)
        .map(|i| PADDING + inner * (i as f64 / (len - 1) as f64))
        .collect()
}

/// Map a drawdown percentage onto the plot; 0% sits on the top edge.
fn scale_value(value: f64, floor: f64) -> f64 {
    let inner = HEIGHT - 2.0 * PADDING;
    PADDING + (value / floor) * inner
}

fn add_time_axis(svg: &mut String, dates: &[NaiveDate], xs: &[f64]) {
    let axis_y = HEIGHT - PADDING;
    let _ = write!(
        svg,
        r##"<line x1="{PADDING:.2}" y1="{axis_y:.2}" x2="{x2:.2}" y2="{axis_y:.2}" stroke="#000" stroke-width="1" />"##,
        x2 = WIDTH - PADDING,
    );

    // One label per year, thinned so long histories stay legible.
    let years: Vec<(usize, i32)> = dates
        .iter()
        .enumerate()
        .filter(|(i, d)| *i == 0 || dates[i - 1].year() != d.year())
        .map(|(i, d)| (i, d.year()))
        .collect();
    let step = years.len().div_ceil(10).max(1);

    for (idx, year) in years.into_iter().step_by(step) {
        let x = xs[idx];
        let _ = write!(
            svg,
            r#"<line x1="{x:.2}" y1="{PADDING:.2}" x2="{x:.2}" y2="{axis_y:.2}" stroke="{GRID_COLOR}" stroke-width="0.5" />"#
        );
        let _ = write!(
            svg,
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">{year}</text>"#,
            y = axis_y + 16.0,
        );
    }
}

/// Daily drawdown line with mean and worst guides, as a standalone SVG.
pub fn render_drawdown_chart(
    symbol: &str,
    points: &[DrawdownPoint],
    stats: DrawdownStats,
) -> Result<RenderedImage, Report<RenderError>> {
    if points.is_empty() {
        return Err(Report::new(RenderError::EmptyTable).attach(format!("symbol: {symbol}")));
    }

    let floor = stats.worst_pct.min(-1.0) * 1.05;
    let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
    let xs = x_positions(points.len());

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH:.0}" height="{HEIGHT:.0}" viewBox="0 0 {WIDTH:.0} {HEIGHT:.0}"><style>text{{font-family:Arial,sans-serif;font-size:10px;fill:#666}}</style>"#
    );
    let _ = write!(
        svg,
        r##"<text x="{PADDING:.2}" y="24" font-size="14" font-weight="700" fill="#222">{title}</text>"##,
        title = escape_xml(&format!("{symbol} drawdown")),
    );

    for tick in [0.0, floor / 2.0, floor] {
        let y = scale_value(tick, floor);
        let _ = write!(
            svg,
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end">{tick:.0}%</text>"#,
            x = PADDING - 6.0,
            y = y + 3.0,
        );
    }

    let guides = [
        Guide {
            value: stats.mean_pct,
            color: MEAN_COLOR,
            label: format!("mean {:.1}%", stats.mean_pct),
        },
        Guide {
            value: stats.worst_pct,
            color: WORST_COLOR,
            label: format!("worst {:.1}%", stats.worst_pct),
        },
    ];
    for guide in &guides {
        let y = scale_value(guide.value, floor);
        let _ = write!(
            svg,
            r#"<line x1="{PADDING:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="{color}" stroke-width="1" stroke-dasharray="4 3" />"#,
            x2 = WIDTH - PADDING,
            color = guide.color,
        );
        let _ = write!(
            svg,
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end" fill="{color}">{label}</text>"#,
            x = WIDTH - PADDING,
            y = y - 4.0,
            color = guide.color,
            label = guide.label,
        );
    }

    let coords = points
        .iter()
        .zip(&xs)
        .map(|(p, x)| format!("{x:.2},{:.2}", scale_value(p.drawdown_pct, floor)))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = write!(
        svg,
        r#"<polyline fill="none" stroke="{LINE_COLOR}" stroke-width="1.2" points="{coords}" />"#
    );

    add_time_axis(&mut svg, &dates, &xs);
    svg.push_str("</svg>");

    Ok(RenderedImage {
        file_name: format!("{}_drawdown.svg", symbol.replace(['^', '=', '/'], "_")),
        content_type: "image/svg+xml",
        bytes: svg.into_bytes(),
    })
}
