use std::sync::Arc;

use error_stack::{Report, ResultExt};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, fontdb};

use super::{RenderedImage, Renderer};
use crate::error::RenderError;
use crate::table::ReportTable;

const PNG: &str = "image/png";

/// Rasterizes the SVG produced by an inner renderer into a PNG.
///
/// Mail clients preview PNG attachments inline; most ignore SVG.
pub struct PngRenderer<R> {
    inner: R,
    scale: f32,
    fontdb: Arc<fontdb::Database>,
}

impl<R: Renderer> PngRenderer<R> {
    /// `scale` multiplies the SVG's pixel size.
    pub fn new(inner: R, scale: f32) -> Self {
        let mut fonts = fontdb::Database::new();
        fonts.load_system_fonts();
        tracing::debug!(faces = fonts.len(), "system fonts loaded");

        Self {
            inner,
            scale,
            fontdb: Arc::new(fonts),
        }
    }

    fn rasterize(&self, svg: &[u8]) -> Result<Vec<u8>, Report<RenderError>> {
        let mut options = usvg::Options::default();
        options.fontdb = Arc::clone(&self.fontdb);
        let tree = usvg::Tree::from_data(svg, &options).change_context(RenderError::Rasterize)?;

        let size = tree
            .size()
            .to_int_size()
            .scale_by(self.scale)
            .ok_or_else(|| {
                Report::new(RenderError::Rasterize).attach(format!("scale: {}", self.scale))
            })?;
        let mut pixmap = Pixmap::new(size.width(), size.height()).ok_or_else(|| {
            Report::new(RenderError::Rasterize)
                .attach(format!("canvas: {}x{}", size.width(), size.height()))
        })?;

        resvg::render(
            &tree,
            Transform::from_scale(self.scale, self.scale),
            &mut pixmap.as_mut(),
        );
        pixmap.encode_png().change_context(RenderError::Rasterize)
    }
}

impl<R: Renderer> Renderer for PngRenderer<R> {
    fn render(
        &self,
        table: &ReportTable,
        file_stem: &str,
    ) -> Result<RenderedImage, Report<RenderError>> {
        let vector = self.inner.render(table, file_stem)?;
        let bytes = self
            .rasterize(&vector.bytes)
            .attach_with(|| format!("report: {}", table.title))?;

        tracing::debug!(report = %table.title, bytes = bytes.len(), "table rasterized");

        Ok(RenderedImage {
            file_name: format!("{file_stem}.png"),
            content_type: PNG,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::svg::SvgTableRenderer;
    use crate::table::{Cell, Column, TableRow, Tone};

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn table(rows: usize) -> ReportTable {
        ReportTable {
            title: "Stocks".into(),
            caption: "As of 2024-06-03 16:00".into(),
            columns: vec![Column::Name, Column::DayChange],
            headers: vec!["Ticker".into(), "1D".into()],
            rows: (0..rows)
                .map(|i| TableRow {
                    category: "Index".into(),
                    cells: vec![
                        Cell {
                            text: format!("T{i}"),
                            tone: Tone::Neutral,
                            strong: true,
                        },
                        Cell {
                            text: "1.25%".into(),
                            tone: Tone::Up,
                            strong: false,
                        },
                    ],
                })
                .collect(),
        }
    }

    #[test]
    fn renders_png_attachment() {
        let renderer = PngRenderer::new(SvgTableRenderer::new("Arial"), 2.0);
        let image = renderer.render(&table(3), "stocks").unwrap();

        assert_eq!(image.file_name, "stocks.png");
        assert_eq!(image.content_type, "image/png");
        assert_eq!(&image.bytes[..8], &PNG_SIGNATURE[..]);
    }

    #[test]
    fn empty_table_still_rejected() {
        let renderer = PngRenderer::new(SvgTableRenderer::new("Arial"), 1.0);
        let err = renderer.render(&table(0), "empty").unwrap_err();
        assert!(matches!(err.current_context(), RenderError::EmptyTable));
    }
}
