// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end reconstruction pipeline.
//
//   scanned PDF → page images (upright) → JPEG → batch OCR → envelope decode
//   → hOCR page tree → word placement → one PDF per image in the output dir
//
// Each image is an independent unit. A unit that fails at any stage is
// reported with its error category and the rest carry on.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use schriftwerk_core::PipelineConfig;
use schriftwerk_core::error::{ErrorCategory, Result, SchriftwerkError};
use schriftwerk_document::image::encode_jpeg;
use schriftwerk_document::{
    OcrPage, PageReconstructor, PdfImageReader, ReconstructionOutcome, ReconstructionStats,
};
use schriftwerk_ocr::{
    BatchSummary, HttpOcrService, OcrBackend, OcrBatchRunner, OcrInput, decode_payload,
};
use tracing::{info, instrument, warn};

/// What happened to one unit of work.
#[derive(Debug)]
pub enum UnitStatus {
    /// A reconstructed page was written.
    Written {
        path: PathBuf,
        stats: ReconstructionStats,
    },
    /// OCR found no text regions, or none of its words could be placed;
    /// no file was written.
    Empty,
    /// Plain transcription (file batch mode).
    Transcribed { words: usize, text: String },
    Failed {
        category: ErrorCategory,
        message: String,
    },
}

#[derive(Debug)]
pub struct UnitReport {
    /// Output stem (`page_3`, `page_3_2`) or input file name.
    pub name: String,
    pub status: UnitStatus,
}

impl UnitReport {
    fn failed(name: String, err: &SchriftwerkError) -> Self {
        warn!(unit = %name, category = ?err.category(), error = %err, "Unit failed");
        Self {
            name,
            status: UnitStatus::Failed {
                category: err.category(),
                message: err.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.status, UnitStatus::Failed { .. })
    }
}

impl fmt::Display for UnitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            UnitStatus::Written { path, stats } => write!(
                f,
                "{}: wrote {} ({} words placed, {} skipped)",
                self.name,
                path.display(),
                stats.placed,
                stats.skipped_geometry + stats.skipped_confidence + stats.skipped_empty
            ),
            UnitStatus::Empty => write!(f, "{}: no text regions, nothing written", self.name),
            UnitStatus::Transcribed { words, text } => {
                write!(f, "{}: {} words\n{}", self.name, words, text)
            }
            UnitStatus::Failed { category, message } => {
                write!(f, "{}: FAILED [{:?}] {}", self.name, category, message)
            }
        }
    }
}

/// Per-unit outcomes of one pipeline run, in input order.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub units: Vec<UnitReport>,
}

impl PipelineReport {
    pub fn summary(&self) -> BatchSummary {
        let succeeded = self.units.iter().filter(|u| u.is_success()).count();
        BatchSummary {
            succeeded,
            failed: self.units.len() - succeeded,
            total: self.units.len(),
        }
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for unit in &self.units {
            writeln!(f, "{}", unit)?;
        }
        write!(f, "Summary: {}", self.summary())
    }
}

/// The configured pipeline: OCR backend, batch runner and reconstructor.
pub struct Pipeline {
    config: PipelineConfig,
    runner: OcrBatchRunner,
    reconstructor: PageReconstructor,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, backend: Arc<dyn OcrBackend>) -> Result<Self> {
        config.validate()?;
        let runner = OcrBatchRunner::new(backend, config.batch.clone())?;
        let reconstructor = PageReconstructor::new(config.reconstruction.clone());
        Ok(Self {
            config,
            runner,
            reconstructor,
        })
    }

    /// Pipeline backed by the HTTP OCR service named in `config.ocr`.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let backend = HttpOcrService::new(config.ocr.clone())?;
        Self::new(config, Arc::new(backend))
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output.output_dir
    }

    /// Rebuild every page image of `pdf_path` as a text-only PDF in the
    /// output directory.
    ///
    /// Fails as a whole only when the input PDF cannot be read or the output
    /// directory cannot be created.
    #[instrument(skip_all, fields(pdf = %pdf_path.as_ref().display()))]
    pub async fn reconstruct_pdf(&self, pdf_path: impl AsRef<Path>) -> Result<PipelineReport> {
        let reader = PdfImageReader::open(pdf_path.as_ref())?;
        let pages = reader.all_page_images()?;
        tokio::fs::create_dir_all(self.output_dir()).await?;

        let mut stems = Vec::new();
        let mut slots: Vec<Option<UnitReport>> = Vec::new();
        let mut inputs = Vec::new();
        // `batch_slots[i]` is the unit index of `inputs[i]`.
        let mut batch_slots = Vec::new();

        for page in &pages {
            let several = page.images.len() > 1;
            for (k, image) in page.images.iter().enumerate() {
                let stem = if several {
                    format!("page_{}_{}", page.page_number, k + 1)
                } else {
                    format!("page_{}", page.page_number)
                };
                match encode_jpeg(image, self.config.output.jpeg_quality) {
                    Ok(bytes) => {
                        batch_slots.push(slots.len());
                        inputs.push(OcrInput::new(format!("{stem}.jpg"), bytes));
                        slots.push(None);
                    }
                    Err(err) => slots.push(Some(UnitReport::failed(stem.clone(), &err))),
                }
                stems.push(stem);
            }
        }

        if stems.is_empty() {
            warn!("input PDF contains no decodable page images");
        }
        info!(units = stems.len(), uploads = inputs.len(), "Page images prepared");

        let outcome = self.runner.run(inputs).await;
        let handles: Vec<_> = batch_slots
            .into_iter()
            .zip(outcome.into_results())
            .map(|(slot, payload)| {
                let stem = stems[slot].clone();
                let path = self.output_dir().join(format!("{stem}.pdf"));
                let reconstructor = self.reconstructor.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    reconstruct_unit(&reconstructor, stem, path, payload)
                });
                (slot, handle)
            })
            .collect();
        for (slot, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(join_err) => {
                    let stem = stems[slot].clone();
                    let err = SchriftwerkError::TaskFailed(format!("{}: {}", stem, join_err));
                    UnitReport::failed(stem, &err)
                }
            };
            slots[slot] = Some(report);
        }

        let units = slots.into_iter().flatten().collect();
        let report = PipelineReport { units };
        let summary = report.summary();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Reconstruction finished"
        );
        Ok(report)
    }

    /// OCR image files directly and return their recognised text.
    #[instrument(skip_all, fields(files = paths.len()))]
    pub async fn transcribe_files(&self, paths: Vec<PathBuf>) -> PipelineReport {
        let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        let outcome = self.runner.run_paths(paths).await;

        let units = names
            .into_iter()
            .zip(outcome.into_results())
            .map(|(name, result)| match result.and_then(|body| decode_payload(&body)) {
                Ok(payload) => {
                    // Services may answer with plain text instead of hOCR.
                    let text = OcrPage::parse(&payload)
                        .map(|page| page.text())
                        .unwrap_or(payload);
                    let words = text.split_whitespace().count();
                    UnitReport {
                        name,
                        status: UnitStatus::Transcribed { words, text },
                    }
                }
                Err(err) => UnitReport::failed(name, &err),
            })
            .collect();

        PipelineReport { units }
    }
}

/// Decode, parse and lay out one unit's OCR payload, writing its PDF.
///
/// Blocking: runs on the blocking pool, one call per unit.
fn reconstruct_unit(
    reconstructor: &PageReconstructor,
    stem: String,
    path: PathBuf,
    payload: Result<Vec<u8>>,
) -> UnitReport {
    let result = payload
        .and_then(|body| decode_payload(&body))
        .and_then(|hocr| OcrPage::parse(&hocr))
        .and_then(|page| reconstructor.write_page(&page, &path));

    match result {
        Ok(ReconstructionOutcome::Placed(stats)) if stats.placed > 0 => UnitReport {
            name: stem,
            status: UnitStatus::Written { path, stats },
        },
        Ok(ReconstructionOutcome::Placed(stats)) => {
            info!(unit = %stem, ?stats, "No word could be placed; nothing written");
            UnitReport {
                name: stem,
                status: UnitStatus::Empty,
            }
        }
        Ok(ReconstructionOutcome::Empty) => UnitReport {
            name: stem,
            status: UnitStatus::Empty,
        },
        Err(err) => UnitReport::failed(stem, &err),
    }
}
