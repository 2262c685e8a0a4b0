use std::fmt::Write as _;

use error_stack::Report;

use super::{RenderedImage, Renderer, escape_xml};
use crate::error::RenderError;
use crate::table::{Align, ReportTable, TableRow, Tone};

const CAPTION_HEIGHT: f64 = 30.0;
const HEADER_HEIGHT: f64 = 34.0;
const ROW_HEIGHT: f64 = 30.0;
const CELL_PADDING: f64 = 12.0;
const MIN_COLUMN_WIDTH: f64 = 64.0;
const FONT_SIZE: f64 = 13.0;

const BACKGROUND: &str = "#ffffff";
const BORDER: &str = "#dddddd";
const HEADER_FILL: &str = "#444444";
const HEADER_TEXT: &str = "#ffffff";
const CAPTION_TEXT: &str = "#1565c0";
const BAND_COLORS: [&str; 3] = ["#E6F4FA", "#E9F9F0", "#FFF4E6"];

fn tone_color(tone: Tone) -> &'static str {
    match tone {
        Tone::Neutral => "#222222",
        Tone::Up => "#d32f2f",
        Tone::Down => "#1976d2",
    }
}

/// Approximate rendered width; wide glyphs (CJK) take about one em.
fn text_width(text: &str) -> f64 {
    text.chars()
        .map(|c| if c.is_ascii() { FONT_SIZE * 0.6 } else { FONT_SIZE })
        .sum()
}

/// Band index per row. A new band starts wherever the category differs from
/// the previous row's, so grouping follows the data rather than a fixed
/// row count.
pub(crate) fn category_bands(rows: &[TableRow]) -> Vec<usize> {
    let mut band = 0;
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            if i > 0 && row.category != rows[i - 1].category {
                band += 1;
            }
            band
        })
        .collect()
}

/// Renders a [`ReportTable`] as a standalone SVG document.
pub struct SvgTableRenderer {
    font_family: String,
}

impl SvgTableRenderer {
    pub fn new(font_family: impl Into<String>) -> Self {
        Self {
            font_family: font_family.into(),
        }
    }

    fn column_widths(table: &ReportTable) -> Vec<f64> {
        (0..table.headers.len())
            .map(|col| {
                let widest = table
                    .rows
                    .iter()
                    .filter_map(|row| row.cells.get(col))
                    .map(|cell| text_width(&cell.text))
                    .chain(std::iter::once(text_width(&table.headers[col])))
                    .fold(0.0, f64::max);
                (widest + 2.0 * CELL_PADDING).max(MIN_COLUMN_WIDTH)
            })
            .collect()
    }

    /// The complete SVG document for `table`.
    fn document(&self, table: &ReportTable) -> String {
        let widths = Self::column_widths(table);
        let width: f64 = widths.iter().sum();
        let height = CAPTION_HEIGHT + HEADER_HEIGHT + ROW_HEIGHT * table.rows.len() as f64;

        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.0} {height:.0}"><style>text{{font-family:{font};font-size:{FONT_SIZE}px}}</style>"#,
            font = escape_xml(&self.font_family),
        );
        let _ = write!(
            svg,
            r#"<rect x="0" y="0" width="{width:.0}" height="{height:.0}" fill="{BACKGROUND}" />"#
        );

        // Caption row: title on the left, timestamp on the right.
        let caption_y = CAPTION_HEIGHT / 2.0 + FONT_SIZE / 3.0;
        let _ = write!(
            svg,
            r#"<text x="{x:.1}" y="{caption_y:.1}" text-anchor="start" font-weight="700" fill="{HEADER_FILL}">{title}</text>"#,
            x = CELL_PADDING,
            title = escape_xml(&table.title),
        );
        let _ = write!(
            svg,
            r#"<text x="{x:.1}" y="{caption_y:.1}" text-anchor="end" fill="{CAPTION_TEXT}">{caption}</text>"#,
            x = width - CELL_PADDING,
            caption = escape_xml(&table.caption),
        );

        let _ = write!(
            svg,
            r#"<rect x="0" y="{CAPTION_HEIGHT:.1}" width="{width:.1}" height="{HEADER_HEIGHT:.1}" fill="{HEADER_FILL}" />"#
        );
        let mut x = 0.0;
        for (header, w) in table.headers.iter().zip(&widths) {
            let _ = write!(
                svg,
                r#"<text x="{cx:.1}" y="{cy:.1}" text-anchor="middle" font-weight="700" fill="{HEADER_TEXT}">{text}</text>"#,
                cx = x + w / 2.0,
                cy = CAPTION_HEIGHT + HEADER_HEIGHT / 2.0 + FONT_SIZE / 3.0,
                text = escape_xml(header),
            );
            x += w;
        }

        let bands = category_bands(&table.rows);
        for (i, (row, band)) in table.rows.iter().zip(bands).enumerate() {
            let top = CAPTION_HEIGHT + HEADER_HEIGHT + ROW_HEIGHT * i as f64;
            let _ = write!(
                svg,
                r#"<rect x="0" y="{top:.1}" width="{width:.1}" height="{ROW_HEIGHT:.1}" fill="{fill}" stroke="{BORDER}" stroke-width="1" />"#,
                fill = BAND_COLORS[band % BAND_COLORS.len()],
            );

            let mut x = 0.0;
            for ((cell, column), w) in row.cells.iter().zip(&table.columns).zip(&widths) {
                let (anchor, tx) = match column.align() {
                    Align::Center => ("middle", x + w / 2.0),
                    Align::Right => ("end", x + w - CELL_PADDING),
                };
                let weight = if cell.strong { "700" } else { "400" };
                let _ = write!(
                    svg,
                    r#"<text x="{tx:.1}" y="{ty:.1}" text-anchor="{anchor}" font-weight="{weight}" fill="{color}">{text}</text>"#,
                    ty = top + ROW_HEIGHT / 2.0 + FONT_SIZE / 3.0,
                    color = tone_color(cell.tone),
                    text = escape_xml(&cell.text),
                );
                x += w;
            }
        }

        // Vertical column separators over the body.
        let mut x = 0.0;
        for w in &widths[..widths.len().saturating_sub(1)] {
            x += w;
            let _ = write!(
                svg,
                r#"<line x1="{x:.1}" y1="{y1:.1}" x2="{x:.1}" y2="{height:.1}" stroke="{BORDER}" stroke-width="1" />"#,
                y1 = CAPTION_HEIGHT + HEADER_HEIGHT,
            );
        }

        svg.push_str("</svg>");
        svg
    }
}

impl Renderer for SvgTableRenderer {
    fn render(
        &self,
        table: &ReportTable,
        file_stem: &str,
    ) -> Result<RenderedImage, Report<RenderError>> {
        if table.headers.is_empty() || table.rows.is_empty() {
            return Err(Report::new(RenderError::EmptyTable)
                .attach(format!("report: {}", table.title)));
        }

        let svg = self.document(table);
        tracing::debug!(
            report = %table.title,
            rows = table.rows.len(),
            bytes = svg.len(),
            "table rendered"
        );

        Ok(RenderedImage {
            file_name: format!("{file_stem}.svg"),
            content_type: "image/svg+xml",
            bytes: svg.into_bytes(),
        })
    }
}
