// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core geometry types shared by the hOCR parser and the layout engine.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in OCR pixel space.
///
/// Origin is the top-left corner of the source raster image and y grows
/// downward. Constructed boxes always satisfy `x1 >= x0` and `y1 >= y0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl BoundingBox {
    /// Build a box, returning `None` when the corners are inverted.
    pub fn new(x0: i64, y0: i64, x1: i64, y1: i64) -> Option<Self> {
        if x1 < x0 || y1 < y0 {
            return None;
        }
        Some(Self { x0, y0, x1, y1 })
    }

    /// Horizontal extent in pixels, `x1 - x0`.
    pub fn width(&self) -> i64 {
        self.x1 - self.x0
    }

    /// Vertical extent in pixels, `y1 - y0`.
    pub fn height(&self) -> i64 {
        self.y1 - self.y0
    }

    /// True when the box has zero width or zero height.
    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Whether `other` lies entirely within this box (edges inclusive).
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x0 >= self.x0 && other.y0 >= self.y0 && other.x1 <= self.x1 && other.y1 <= self.y1
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bbox {} {} {} {}", self.x0, self.y0, self.x1, self.y1)
    }
}

/// Text baseline of a line: `y = slope * x + offset`, relative to the
/// bottom-left corner of the line's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub slope: f64,
    pub offset: f64,
}

/// Distances from each edge of the output page, in output units.
///
/// The output canvas measures its vertical axis upward from the bottom edge,
/// so `top` is the height of the element's lower edge above the page bottom
/// (where text is anchored) and `bottom` is the distance from the page's top
/// edge in source pixel terms. See `layout::mapper` in `schriftwerk-document`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Margins {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Margins {
    /// Compute the page-relative margins placing `element` within `page`.
    pub fn between(page: &BoundingBox, element: &BoundingBox) -> Self {
        Self {
            left: (element.x0 - page.x0) as f64,
            top: (page.y1 - element.y1) as f64,
            right: (page.x1 - element.x1) as f64,
            bottom: (element.y0 - page.y0) as f64,
        }
    }

    /// Inverse of [`Margins::between`]: recover the element box from the
    /// margins and the page it was measured against.
    pub fn to_bbox(&self, page: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: (page.x0 as f64 + self.left).round() as i64,
            y0: (page.y0 as f64 + self.bottom).round() as i64,
            x1: (page.x1 as f64 - self.right).round() as i64,
            y1: (page.y1 as f64 - self.top).round() as i64,
        }
    }
}
