// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — reading page images from existing PDFs and writing
// reconstructed text pages.

pub mod canvas;
pub mod reader;

pub use canvas::{DocumentCanvas, PdfCanvas};
pub use reader::PdfImageReader;
