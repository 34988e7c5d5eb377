// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// hOCR module — the page/area/paragraph/line/word tree and the decoder for the
// packed `title` attribute carried by every element.

pub mod title;
pub mod tree;

pub use title::{TitleAttributes, parse_title};
pub use tree::{HocrDocument, OcrColumnArea, OcrLine, OcrPage, OcrParagraph, OcrWord};
