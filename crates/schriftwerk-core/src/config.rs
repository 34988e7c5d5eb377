// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchriftwerkError};

/// Settings for the whole reconstruction pipeline.
///
/// Every section has defaults, so a config file only needs to name the
/// values it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ocr: OcrServiceConfig,
    pub batch: BatchConfig,
    pub reconstruction: ReconstructionConfig,
    pub output: OutputConfig,
}

/// How to reach the HTTP OCR service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrServiceConfig {
    /// Endpoint receiving the image upload.
    pub url: String,
    /// HTTP method, `POST` or `PUT`.
    pub method: String,
    /// Multipart field name carrying the image.
    pub file_field_name: String,
    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Extra multipart form fields (e.g. `format = hocr`).
    pub form_fields: BTreeMap<String, String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OcrServiceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/file".to_string(),
            method: "POST".to_string(),
            file_field_name: "file".to_string(),
            headers: BTreeMap::from([("Accept".to_string(), "application/json".to_string())]),
            form_fields: BTreeMap::from([("format".to_string(), "hocr".to_string())]),
            timeout_secs: 30,
        }
    }
}

/// Concurrency limits for batch OCR.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of OCR requests in flight at once.
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Word placement policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Skip words whose `x_wconf` is below this value. `None` places every
    /// word regardless of confidence.
    pub min_word_confidence: Option<u32>,
    /// Font size used when neither the line's `x_size` nor its box height is
    /// available.
    pub fallback_font_size: f64,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            min_word_confidence: None,
            fallback_font_size: 10.0,
        }
    }
}

/// Where and how output is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving `page_<n>.pdf` files. Created if missing.
    pub output_dir: PathBuf,
    /// JPEG quality (1-100) for images uploaded to the OCR service.
    pub jpeg_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            jpeg_quality: 75,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a JSON file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.ocr.url.trim().is_empty() {
            return Err(SchriftwerkError::Config("ocr.url must not be empty".into()));
        }
        let method = self.ocr.method.to_ascii_uppercase();
        if method != "POST" && method != "PUT" {
            return Err(SchriftwerkError::Config(format!(
                "ocr.method must be POST or PUT, got {}",
                self.ocr.method
            )));
        }
        if self.ocr.file_field_name.is_empty() {
            return Err(SchriftwerkError::Config(
                "ocr.file_field_name must not be empty".into(),
            ));
        }
        if self.ocr.timeout_secs == 0 {
            return Err(SchriftwerkError::Config("ocr.timeout_secs must be > 0".into()));
        }
        if self.batch.max_concurrency == 0 {
            return Err(SchriftwerkError::Config(
                "batch.max_concurrency must be at least 1".into(),
            ));
        }
        if let Some(threshold) = self
            .reconstruction
            .min_word_confidence
            .filter(|threshold| *threshold > 100)
        {
            return Err(SchriftwerkError::Config(format!(
                "reconstruction.min_word_confidence must be 0-100, got {threshold}"
            )));
        }
        let fallback = self.reconstruction.fallback_font_size;
        if fallback.is_nan() || fallback <= 0.0 {
            return Err(SchriftwerkError::Config(
                "reconstruction.fallback_font_size must be positive".into(),
            ));
        }
        if self.output.jpeg_quality == 0 || self.output.jpeg_quality > 100 {
            return Err(SchriftwerkError::Config(format!(
                "output.jpeg_quality must be 1-100, got {}",
                self.output.jpeg_quality
            )));
        }
        Ok(())
    }
}
