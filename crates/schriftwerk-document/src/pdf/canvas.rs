// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document canvas — the output surface reconstructed words are drawn onto.
//
// The layout engine only needs three primitives: start a page of a given size,
// draw a run of text at page margins, and persist the result. `PdfCanvas`
// implements them with `printpdf` 0.8, whose data-oriented API builds each
// page as a `Vec<Op>` and serialises the document via `PdfDocument::save()`.

use std::path::Path;

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use schriftwerk_core::Margins;
use schriftwerk_core::error::{Result, SchriftwerkError};
use tracing::{debug, info, instrument, warn};

/// Millimetres per PDF point.
const MM_PER_PT: f32 = 25.4 / 72.0;

/// Output surface for positioned text.
pub trait DocumentCanvas {
    /// Start a new page. Sizes are in output units (PDF points), one unit per
    /// hOCR pixel.
    fn create_page(&mut self, width: f64, height: f64) -> Result<()>;

    /// Draw `text` at the given page margins. `margins.left` is the x of the
    /// text start and `margins.top` the height of its baseline above the page
    /// bottom.
    fn draw_text(&mut self, text: &str, font_size: f64, margins: Margins) -> Result<()>;

    /// Serialise everything drawn so far to `path`.
    fn write_to_file(&self, path: &Path) -> Result<()>;
}

/// A page being assembled.
#[derive(Debug, Clone)]
struct CanvasPage {
    width: f64,
    height: f64,
    ops: Vec<Op>,
}

/// PDF implementation of [`DocumentCanvas`] using the built-in Helvetica font.
pub struct PdfCanvas {
    /// Title metadata embedded in the PDF /Info dictionary.
    title: String,
    pages: Vec<CanvasPage>,
}

impl Default for PdfCanvas {
    fn default() -> Self {
        Self::new("Schriftwerk Reconstruction")
    }
}

impl PdfCanvas {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Serialise the document to PDF bytes.
    #[instrument(skip(self), fields(pages = self.pages.len()))]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            return Err(SchriftwerkError::PdfError(
                "cannot serialise a document without pages".into(),
            ));
        }

        let mut doc = PdfDocument::new(&self.title);
        let pages = self
            .pages
            .iter()
            .map(|page| {
                PdfPage::new(
                    Mm(page.width as f32 * MM_PER_PT),
                    Mm(page.height as f32 * MM_PER_PT),
                    page.ops.clone(),
                )
            })
            .collect();
        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "PDF serialisation produced warnings");
        }

        debug!(output_bytes = output.len(), "PDF serialised");
        Ok(output)
    }
}

impl DocumentCanvas for PdfCanvas {
    fn create_page(&mut self, width: f64, height: f64) -> Result<()> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(SchriftwerkError::PdfError(format!(
                "invalid page size {width}x{height}"
            )));
        }
        debug!(width, height, "Starting canvas page");
        self.pages.push(CanvasPage {
            width,
            height,
            ops: Vec::new(),
        });
        Ok(())
    }

    fn draw_text(&mut self, text: &str, font_size: f64, margins: Margins) -> Result<()> {
        let page = self.pages.last_mut().ok_or_else(|| {
            SchriftwerkError::PdfError("draw_text called before create_page".into())
        })?;

        page.ops.push(Op::StartTextSection);
        page.ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(margins.left as f32),
                y: Pt(margins.top as f32),
            },
        });
        page.ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(font_size as f32),
            font: BuiltinFont::Helvetica,
        });
        page.ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(text.to_string())],
            font: BuiltinFont::Helvetica,
        });
        page.ops.push(Op::EndTextSection);
        Ok(())
    }

    fn write_to_file(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes)?;
        info!("Wrote reconstructed PDF to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn margins(left: f64, top: f64) -> Margins {
        Margins {
            left,
            top,
            ..Default::default()
        }
    }

    #[test]
    fn draw_before_page_fails() {
        let mut canvas = PdfCanvas::default();
        let result = canvas.draw_text("Hi", 12.0, margins(10.0, 70.0));
        assert!(matches!(result, Err(SchriftwerkError::PdfError(_))));
    }

    #[test]
    fn invalid_page_size_rejected() {
        let mut canvas = PdfCanvas::default();
        assert!(canvas.create_page(0.0, 100.0).is_err());
        assert!(canvas.create_page(100.0, f64::NAN).is_err());
        assert_eq!(canvas.page_count(), 0);
    }

    #[test]
    fn empty_canvas_cannot_be_serialised() {
        assert!(PdfCanvas::default().to_bytes().is_err());
    }

    #[test]
    fn text_page_serialises_to_pdf() {
        let mut canvas = PdfCanvas::new("test");
        canvas.create_page(200.0, 100.0).unwrap();
        canvas.draw_text("Hi", 12.0, margins(10.0, 70.0)).unwrap();
        let bytes = canvas.to_bytes().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn each_text_run_is_its_own_text_section() {
        let mut canvas = PdfCanvas::default();
        canvas.create_page(200.0, 100.0).unwrap();
        canvas.draw_text("a", 10.0, margins(1.0, 2.0)).unwrap();
        canvas.draw_text("b", 10.0, margins(3.0, 4.0)).unwrap();
        let ops = &canvas.pages[0].ops;
        assert_eq!(ops.len(), 10);
        assert!(matches!(ops[0], Op::StartTextSection));
        assert!(matches!(ops[1], Op::SetTextCursor { .. }));
        assert!(matches!(ops[9], Op::EndTextSection));
    }

    #[test]
    fn write_to_file_creates_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_1.pdf");
        let mut canvas = PdfCanvas::default();
        canvas.create_page(612.0, 792.0).unwrap();
        canvas.draw_text("Invoice", 24.0, margins(72.0, 700.0)).unwrap();
        canvas.write_to_file(&path).unwrap();
        let written = std::fs::read(&path).unwrap();
        assert!(written.starts_with(b"%PDF"));
    }

    #[test]
    fn write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("page.pdf");
        let mut canvas = PdfCanvas::default();
        canvas.create_page(10.0, 10.0).unwrap();
        assert!(matches!(
            canvas.write_to_file(&path),
            Err(SchriftwerkError::Io(_))
        ));
    }
}
