// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page raster preparation — turn page images upright and encode them for
// upload to the OCR service.

use image::DynamicImage;
use schriftwerk_core::error::{Result, SchriftwerkError};
use tracing::{debug, warn};

/// Rotate a page image clockwise by the page's `/Rotate` value so that the
/// OCR service sees it the way a viewer displays the page.
///
/// PDF only allows multiples of 90; anything else is logged and the image is
/// returned unchanged.
pub fn rotate_upright(image: DynamicImage, page_rotation: i64) -> DynamicImage {
    match page_rotation.rem_euclid(360) {
        0 => image,
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        other => {
            warn!(rotation = other, "ignoring page rotation that is not a multiple of 90");
            image
        }
    }
}

/// Encode an image as JPEG with the given quality (1-100).
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let rgb = image.to_rgb8();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder).map_err(|err| {
        SchriftwerkError::ImageError(format!("JPEG encoding failed: {}", err))
    })?;
    debug!(
        width = image.width(),
        height = image.height(),
        bytes = buffer.len(),
        "Page image encoded as JPEG"
    );
    Ok(buffer)
}
