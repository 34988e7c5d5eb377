// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — preparing page rasters for the OCR service.

pub mod processor;

pub use processor::{encode_jpeg, rotate_upright};
