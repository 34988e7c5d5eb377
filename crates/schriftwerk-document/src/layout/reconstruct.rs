// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page reconstruction — re-emit every recognised word of an hOCR page as an
// independently positioned text run on a fresh output page.
//
// Per page: an empty page (no column areas) is a no-op; otherwise the page box
// sizes the output page, then areas → paragraphs → lines → words are walked
// depth-first in document order and each word is drawn at its page-relative
// margins, with the line's `x_size` as font size. Missing geometry below page
// level is handled by omission: a wrong placement is worse than no placement.

use std::path::Path;

use schriftwerk_core::config::ReconstructionConfig;
use schriftwerk_core::error::{Result, SchriftwerkError};
use tracing::{debug, info, instrument, trace};

use crate::hocr::tree::{OcrLine, OcrPage};
use crate::layout::mapper::CoordinateMapper;
use crate::pdf::canvas::{DocumentCanvas, PdfCanvas};

/// Counters describing one reconstructed page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructionStats {
    /// Words drawn onto the canvas.
    pub placed: usize,
    /// Words not drawn because they, their line or their area had no box.
    pub skipped_geometry: usize,
    /// Words below the configured confidence threshold.
    pub skipped_confidence: usize,
    /// Words whose trimmed text was empty.
    pub skipped_empty: usize,
}

/// Result of reconstructing one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructionOutcome {
    /// The page held no column areas; nothing was created.
    Empty,
    /// An output page was created and words placed on it.
    Placed(ReconstructionStats),
}

/// Places hOCR words onto a [`DocumentCanvas`].
#[derive(Debug, Clone, Default)]
pub struct PageReconstructor {
    config: ReconstructionConfig,
}

impl PageReconstructor {
    /// Reconstructor applying `config`'s confidence threshold and fallback
    /// font size.
    pub fn new(config: ReconstructionConfig) -> Self {
        Self { config }
    }

    /// Reconstruct `page` onto `canvas`.
    ///
    /// # Errors
    ///
    /// - [`SchriftwerkError::MissingPageGeometry`] if the page has no `bbox`.
    /// - [`SchriftwerkError::DegeneratePage`] if the page box has no area.
    /// - Any error the canvas reports while creating the page or drawing.
    #[instrument(skip_all, fields(page_id = %page.id, areas = page.areas.len()))]
    pub fn reconstruct<C>(&self, page: &OcrPage, canvas: &mut C) -> Result<ReconstructionOutcome>
    where
        C: DocumentCanvas + ?Sized,
    {
        if page.areas.is_empty() {
            debug!("page has no column areas; nothing to reconstruct");
            return Ok(ReconstructionOutcome::Empty);
        }

        let page_box = page
            .attributes()
            .bbox
            .ok_or(SchriftwerkError::MissingPageGeometry)?;
        let mapper = CoordinateMapper::new(page_box)?;
        let (width, height) = mapper.page_size();
        canvas.create_page(width, height)?;

        let mut stats = ReconstructionStats::default();
        for area in &page.areas {
            let area_words: usize = area
                .paragraphs
                .iter()
                .flat_map(|p| &p.lines)
                .map(|l| l.words.len())
                .sum();
            if mapper.margins(area.attributes().bbox.as_ref()).is_none() {
                trace!(area_id = %area.id, "column area has no bbox; skipping its words");
                stats.skipped_geometry += area_words;
                continue;
            }

            for paragraph in &area.paragraphs {
                for line in &paragraph.lines {
                    self.place_line(line, &mapper, canvas, &mut stats)?;
                }
            }
        }

        info!(
            placed = stats.placed,
            skipped_geometry = stats.skipped_geometry,
            skipped_confidence = stats.skipped_confidence,
            "Page reconstructed"
        );
        Ok(ReconstructionOutcome::Placed(stats))
    }

    /// Reconstruct `page` into a new single-page PDF written to `path`.
    ///
    /// Nothing is written when the page is empty or when none of its words
    /// could be placed; the outcome still reports what happened.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn write_page(
        &self,
        page: &OcrPage,
        path: impl AsRef<Path>,
    ) -> Result<ReconstructionOutcome> {
        let mut canvas = PdfCanvas::default();
        let outcome = self.reconstruct(page, &mut canvas)?;
        match outcome {
            ReconstructionOutcome::Placed(stats) if stats.placed > 0 => {
                canvas.write_to_file(path.as_ref())?;
            }
            _ => debug!("no words placed; skipping file"),
        }
        Ok(outcome)
    }

    fn place_line<C>(
        &self,
        line: &OcrLine,
        mapper: &CoordinateMapper,
        canvas: &mut C,
        stats: &mut ReconstructionStats,
    ) -> Result<()>
    where
        C: DocumentCanvas + ?Sized,
    {
        let line_attrs = line.attributes();
        let Some(line_box) = line_attrs.bbox else {
            trace!(line_id = %line.id, "line has no bbox; skipping its words");
            stats.skipped_geometry += line.words.len();
            return Ok(());
        };
        let font_size = line_attrs
            .x_size
            .filter(|size| *size > 0.0)
            .or_else(|| Some(line_box.height() as f64).filter(|h| *h > 0.0))
            .unwrap_or(self.config.fallback_font_size);

        for word in &line.words {
            let word_attrs = word.attributes();
            let Some(margins) = mapper.margins(word_attrs.bbox.as_ref()) else {
                trace!(word_id = %word.id, "word has no bbox; skipping");
                stats.skipped_geometry += 1;
                continue;
            };
            let below_threshold = matches!(
                (self.config.min_word_confidence, word_attrs.x_wconf),
                (Some(threshold), Some(confidence)) if confidence < threshold
            );
            if below_threshold {
                trace!(
                    word_id = %word.id,
                    confidence = ?word_attrs.x_wconf,
                    "word below confidence threshold"
                );
                stats.skipped_confidence += 1;
                continue;
            }
            let text = word.text();
            if text.is_empty() {
                stats.skipped_empty += 1;
                continue;
            }

            canvas.draw_text(text, font_size, margins)?;
            stats.placed += 1;
        }
        Ok(())
    }
}
