// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Schriftwerk.
//
// Every error is local to one unit of work (one image, one page). Callers
// aggregate them into a summary instead of aborting a whole batch.

use thiserror::Error;

/// Top-level error type for all Schriftwerk operations.
#[derive(Debug, Error)]
pub enum SchriftwerkError {
    // -- OCR transport --
    #[error("OCR request failed: {0}")]
    Transport(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("worker task failed: {0}")]
    TaskFailed(String),

    // -- Payload decoding --
    #[error("OCR response could not be decoded: {0}")]
    Decode(String),

    #[error("hOCR parse failed: {0}")]
    HocrParse(String),

    // -- Geometry --
    #[error("page has no bounding box; cannot establish a coordinate frame")]
    MissingPageGeometry,

    #[error("page bounding box is degenerate ({width}x{height})")]
    DegeneratePage { width: i64, height: i64 },

    // -- Input --
    #[error("cannot read input {path}: {source}")]
    InputRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // -- Documents and images --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification used when reporting failures per unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// An input image could not be read before any OCR request was made.
    Input,
    /// The OCR round-trip itself failed (network, timeout, cancellation).
    Transport,
    /// The payload came back but could not be decoded into a page tree.
    Decode,
    /// The page tree lacks the geometry needed to lay it out.
    Geometry,
    /// Producing or persisting output failed.
    Sink,
}

impl SchriftwerkError {
    /// Classify this error into an [`ErrorCategory`].
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InputRead { .. } => ErrorCategory::Input,
            Self::Transport(_) | Self::Cancelled | Self::TaskFailed(_) => {
                ErrorCategory::Transport
            }
            Self::Decode(_) | Self::HocrParse(_) | Self::Serialization(_) => {
                ErrorCategory::Decode
            }
            Self::MissingPageGeometry | Self::DegeneratePage { .. } => ErrorCategory::Geometry,
            // Image decoding happens on the input side, before any OCR
            // request, so it is reported alongside payload problems.
            Self::ImageError(_) => ErrorCategory::Decode,
            Self::PdfError(_) | Self::Config(_) | Self::Io(_) => ErrorCategory::Sink,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SchriftwerkError>;
