pub mod chart;
pub mod png;
pub mod svg;

use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};

use crate::error::RenderError;
use crate::table::ReportTable;

/// An encoded image ready to be written or attached.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Turns a laid-out table into an image artifact.
pub trait Renderer {
    fn render(&self, table: &ReportTable, file_stem: &str)
    -> Result<RenderedImage, Report<RenderError>>;
}

/// Write `image` into `dir`, creating it if needed.
pub fn write_image(dir: &Path, image: &RenderedImage) -> Result<PathBuf, Report<RenderError>> {
    let path = dir.join(&image.file_name);
    write_file(&path, &image.bytes)?;
    Ok(path)
}

/// Write `bytes` to `path`, creating missing parent directories.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), Report<RenderError>> {
    let error = || RenderError::Write {
        path: path.display().to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .change_context(error())
            .attach_with(|| format!("cannot create directory: {}", parent.display()))?;
    }
    std::fs::write(path, bytes).change_context(error())?;

    tracing::info!(path = %path.display(), bytes = bytes.len(), "file written");
    Ok(())
}

/// Escape text for inclusion in SVG/XML content or attribute values.
pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape_xml("S&P <500>"), "S&amp;P &lt;500&gt;");
        assert_eq!(escape_xml("\"a\" 'b'"), "&quot;a&quot; &apos;b&apos;");
    }

    #[test]
    fn write_image_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out");
        let image = RenderedImage {
            file_name: "report.svg".into(),
            content_type: "image/svg+xml",
            bytes: b"<svg/>".to_vec(),
        };
        let path = write_image(&nested, &image).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"<svg/>");
    }
}
