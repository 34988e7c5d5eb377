// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// schriftwerk-document — hOCR parsing and layout reconstruction.
//
// Provides the hOCR page model and `title` attribute decoding, the mapping from
// OCR pixel space to output-page margins, word-by-word page reconstruction onto
// a document canvas, the PDF canvas itself, and the input side: loading page
// images out of an existing PDF and preparing them for upload.

pub mod hocr;
pub mod image;
pub mod layout;
pub mod pdf;

// Re-export the primary types so callers can use `schriftwerk_document::OcrPage` etc.
pub use hocr::title::{TitleAttributes, parse_title};
pub use hocr::tree::{HocrDocument, OcrColumnArea, OcrLine, OcrPage, OcrParagraph, OcrWord};
pub use layout::mapper::CoordinateMapper;
pub use layout::reconstruct::{PageReconstructor, ReconstructionOutcome, ReconstructionStats};
pub use pdf::canvas::{DocumentCanvas, PdfCanvas};
pub use pdf::reader::{PageImages, PdfImageReader};
