// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Coordinate mapping from OCR pixel space to output-page margins.
//
// hOCR boxes live in the pixel space of the source raster: origin top-left,
// y growing downward. The output canvas places content by margins measured in
// a frame whose vertical axis grows upward from the page bottom. For a page box
// P and an element box E:
//
//   left   = Ex0 - Px0
//   top    = Py1 - Ey1
//   right  = Px1 - Ex1
//   bottom = Ey0 - Py0
//
// Margins are always measured against the page box, never against the
// immediate parent, at every nesting level.

use schriftwerk_core::error::{Result, SchriftwerkError};
use schriftwerk_core::{BoundingBox, Margins};
use tracing::trace;

/// Maps element boxes onto one page's output frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    page: BoundingBox,
}

impl CoordinateMapper {
    /// Create a mapper for a page box.
    ///
    /// # Errors
    ///
    /// Returns [`SchriftwerkError::DegeneratePage`] when the page has zero
    /// width or height, since no output frame can be built from it.
    pub fn new(page: BoundingBox) -> Result<Self> {
        if page.is_degenerate() {
            return Err(SchriftwerkError::DegeneratePage {
                width: page.width(),
                height: page.height(),
            });
        }
        Ok(Self { page })
    }

    pub fn page(&self) -> &BoundingBox {
        &self.page
    }

    /// Output page size `(width, height)`.
    ///
    /// The output page spans from the origin to the page box's far corner,
    /// so a page box with a non-zero origin keeps its offset.
    pub fn page_size(&self) -> (f64, f64) {
        (self.page.x1 as f64, self.page.y1 as f64)
    }

    /// Page-relative margins for an element. `None` when the element has no
    /// box, which callers treat as "do not place".
    pub fn margins(&self, element: Option<&BoundingBox>) -> Option<Margins> {
        let element = element?;
        let margins = Margins::between(&self.page, element);
        if !self.page.contains(element) {
            trace!(page = %self.page, element = %element, "element box extends past the page");
        }
        Some(margins)
    }
}
