// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// schriftwerk-ocr — talking to the OCR service.
//
// The `OcrBackend` trait is the seam between the batch runner and whatever
// produces hOCR; `HttpOcrService` is the multipart-upload implementation.
// Responses are unwrapped from their JSON envelope by `decode_payload`.

pub mod batch;
pub mod client;
pub mod response;

pub use batch::{BatchOutcome, BatchSummary, CancelToken, OcrBatchRunner, OcrInput};
pub use client::{HttpOcrService, OcrBackend};
pub use response::decode_payload;
