// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page-image reader — pull the raster images out of each page of an
// existing (typically scanned) PDF using `lopdf`, decode them with `image`,
// and turn them upright according to the page's /Rotate entry.
//
// Supported encodings: DCTDecode (JPEG) and unfiltered or FlateDecode 8-bit
// samples in DeviceGray, DeviceRGB, DeviceCMYK or ICCBased colour spaces.
// Anything else is skipped with a warning rather than failing the page.

use std::path::Path;

use ::image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use schriftwerk_core::error::{Result, SchriftwerkError};
use tracing::{debug, info, instrument, warn};

use crate::image::processor::rotate_upright;

/// Upper bound on page-tree depth when resolving inherited attributes.
const MAX_TREE_DEPTH: usize = 32;

/// The upright images found on one page.
#[derive(Debug, Clone)]
pub struct PageImages {
    /// 1-indexed page number.
    pub page_number: u32,
    /// The page's effective /Rotate value.
    pub rotation: i64,
    pub images: Vec<DynamicImage>,
}

/// Reads page images out of an existing PDF.
pub struct PdfImageReader {
    /// The underlying lopdf document.
    document: Document,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl PdfImageReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            SchriftwerkError::PdfError(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self {
            document,
            source_path: Some(path_ref.display().to_string()),
        })
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            SchriftwerkError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self {
            document,
            source_path: None,
        })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Path the document was opened from, `None` for in-memory input.
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    // -- Extraction -----------------------------------------------------------

    /// Images on a single page (1-indexed), rotated upright.
    #[instrument(skip(self))]
    pub fn page_images(&self, page_number: u32) -> Result<PageImages> {
        let pages = self.document.get_pages();
        let page_id = *pages.get(&page_number).ok_or_else(|| {
            SchriftwerkError::PdfError(format!(
                "page {} out of range (document has {} pages)",
                page_number,
                pages.len()
            ))
        })?;

        let rotation = inherited(&self.document, page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0);

        let mut images = Vec::new();
        for (name, stream) in self.image_streams(page_id) {
            match decode_image_stream(&self.document, stream) {
                Ok(image) => images.push(rotate_upright(image, rotation)),
                Err(err) => {
                    warn!(page_number, xobject = %name, %err, "Skipping undecodable image");
                }
            }
        }

        debug!(page_number, rotation, images = images.len(), "Page images extracted");
        Ok(PageImages {
            page_number,
            rotation,
            images,
        })
    }

    /// Images of every page, in page order.
    #[instrument(skip(self))]
    pub fn all_page_images(&self) -> Result<Vec<PageImages>> {
        let mut page_numbers: Vec<u32> = self.document.get_pages().keys().copied().collect();
        page_numbers.sort_unstable();

        let mut result = Vec::with_capacity(page_numbers.len());
        for page_number in page_numbers {
            result.push(self.page_images(page_number)?);
        }

        let total: usize = result.iter().map(|p| p.images.len()).sum();
        info!(pages = result.len(), images = total, "Loaded images from PDF");
        Ok(result)
    }

    /// Image XObject streams referenced from the page's resources.
    fn image_streams(&self, page_id: ObjectId) -> Vec<(String, &Stream)> {
        let Some(xobjects) = inherited(&self.document, page_id, b"Resources")
            .and_then(|res| res.as_dict().ok())
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|obj| resolve(&self.document, obj))
            .and_then(|obj| obj.as_dict().ok())
        else {
            return Vec::new();
        };

        let mut streams = Vec::new();
        for (name, obj) in xobjects.iter() {
            let Some(Object::Stream(stream)) = resolve(&self.document, obj) else {
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .is_ok_and(|subtype| subtype == b"Image");
            if is_image {
                streams.push((String::from_utf8_lossy(name).into_owned(), stream));
            }
        }
        streams
    }
}

// -- Helpers ------------------------------------------------------------------

/// Follow a single indirect reference.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up a page attribute, walking up /Parent for inheritable entries.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return resolve(doc, value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Filter names applied to a stream, in application order.
fn stream_filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Number of colour components for a /ColorSpace entry.
fn colour_components(doc: &Document, colour_space: &Object) -> Option<usize> {
    match resolve(doc, colour_space)? {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" => Some(1),
            b"DeviceRGB" | b"CalRGB" => Some(3),
            b"DeviceCMYK" => Some(4),
            _ => None,
        },
        Object::Array(items) => {
            let family = items.first()?.as_name().ok()?;
            match family {
                b"ICCBased" => {
                    let Some(Object::Stream(profile)) = resolve(doc, items.get(1)?) else {
                        return None;
                    };
                    profile
                        .dict
                        .get(b"N")
                        .ok()?
                        .as_i64()
                        .ok()
                        .filter(|n| (1..=4).contains(n))
                        .map(|n| n as usize)
                }
                b"CalGray" => Some(1),
                b"CalRGB" => Some(3),
                _ => None,
            }
        }
        _ => None,
    }
}

fn dict_int(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).ok()?.as_i64().ok()
}

/// A positive /Width or /Height that fits in `u32`.
fn image_dimension(dict: &Dictionary, key: &[u8]) -> Result<u32> {
    dict_int(dict, key)
        .filter(|value| *value > 0)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            SchriftwerkError::ImageError(format!(
                "image has no valid /{}",
                String::from_utf8_lossy(key)
            ))
        })
}

/// Decode one image XObject into a `DynamicImage`.
fn decode_image_stream(doc: &Document, stream: &Stream) -> Result<DynamicImage> {
    let filters = stream_filters(&stream.dict);

    if filters.last().is_some_and(|f| f.as_slice() == b"DCTDecode") {
        // JPEG data is only directly usable when DCT is the sole filter.
        if filters.len() != 1 {
            return Err(SchriftwerkError::ImageError(
                "chained filters ending in DCTDecode are not supported".into(),
            ));
        }
        return ::image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg).map_err(
            |err| SchriftwerkError::ImageError(format!("failed to decode JPEG image: {}", err)),
        );
    }

    if let Some(unsupported) = filters.iter().find(|f| f.as_slice() != b"FlateDecode") {
        return Err(SchriftwerkError::ImageError(format!(
            "unsupported image filter {}",
            String::from_utf8_lossy(unsupported)
        )));
    }

    let width = image_dimension(&stream.dict, b"Width")?;
    let height = image_dimension(&stream.dict, b"Height")?;
    let bits = dict_int(&stream.dict, b"BitsPerComponent").unwrap_or(8);
    if bits != 8 {
        return Err(SchriftwerkError::ImageError(format!(
            "{} bits per component is not supported",
            bits
        )));
    }
    let components = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|cs| colour_components(doc, cs))
        .ok_or_else(|| SchriftwerkError::ImageError("unsupported image colour space".into()))?;

    let samples = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content().map_err(|err| {
            SchriftwerkError::ImageError(format!("failed to inflate image data: {}", err))
        })?
    };

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(components))
        .ok_or_else(|| {
            SchriftwerkError::ImageError(format!(
                "image size {}x{}x{} overflows",
                width, height, components
            ))
        })?;
    if samples.len() < expected {
        return Err(SchriftwerkError::ImageError(format!(
            "image data too short: expected {} bytes, got {}",
            expected,
            samples.len()
        )));
    }
    let mut samples = samples;
    samples.truncate(expected);

    let image = match components {
        1 => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        4 => RgbImage::from_raw(width, height, cmyk_to_rgb(&samples)).map(DynamicImage::ImageRgb8),
        other => {
            return Err(SchriftwerkError::ImageError(format!(
                "{} colour components are not supported",
                other
            )));
        }
    };
    image.ok_or_else(|| SchriftwerkError::ImageError("image buffer size mismatch".into()))
}

/// Naive CMYK → RGB conversion, sufficient for OCR input.
fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(samples.len() / 4 * 3);
    for px in samples.chunks_exact(4) {
        let k = 255 - px[3] as u16;
        for channel in &px[..3] {
            rgb.push(((255 - *channel as u16) * k / 255) as u8);
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::GenericImageView;
    use lopdf::dictionary;

    /// Build a one-page PDF whose page tree node carries the resources (so the
    /// page has to inherit them) and whose page carries `rotate`.
    fn pdf_with_image(image: Stream, rotate: i64) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let image_id = doc.add_object(image);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Rotate" => rotate,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "MediaBox" => vec![0.into(), 0.into(), 200.into(), 100.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn raw_rgb_stream(width: i64, height: i64, samples: Vec<u8>) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            samples,
        )
    }

    #[test]
    fn raw_rgb_image_is_extracted() {
        let samples = vec![255, 0, 0, 0, 255, 0];
        let pdf = pdf_with_image(raw_rgb_stream(2, 1, samples), 0);
        let reader = PdfImageReader::from_bytes(&pdf).unwrap();
        assert_eq!(reader.page_count(), 1);
        assert!(reader.source_path().is_none());

        let page = reader.page_images(1).unwrap();
        assert_eq!(page.rotation, 0);
        assert_eq!(page.images.len(), 1);
        let image = &page.images[0];
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.get_pixel(0, 0).0[..3], [255, 0, 0]);
    }

    #[test]
    fn rotated_page_yields_upright_image() {
        let samples = vec![255, 0, 0, 0, 255, 0];
        let pdf = pdf_with_image(raw_rgb_stream(2, 1, samples), 90);
        let reader = PdfImageReader::from_bytes(&pdf).unwrap();
        let page = reader.page_images(1).unwrap();
        assert_eq!(page.rotation, 90);
        assert_eq!(page.images[0].dimensions(), (1, 2));
    }

    #[test]
    fn jpeg_image_is_decoded() {
        let source =
            DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 4, ::image::Rgb([10, 20, 30])));
        let jpeg = crate::image::processor::encode_jpeg(&source, 90).unwrap();
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 4,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );
        let pdf = pdf_with_image(stream, 0);
        let pages = PdfImageReader::from_bytes(&pdf).unwrap().all_page_images().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[0].images[0].dimensions(), (8, 4));
    }

    #[test]
    fn truncated_samples_are_skipped_not_fatal() {
        let pdf = pdf_with_image(raw_rgb_stream(4, 4, vec![0; 5]), 0);
        let page = PdfImageReader::from_bytes(&pdf).unwrap().page_images(1).unwrap();
        assert!(page.images.is_empty());
    }

    #[test]
    fn page_out_of_range_is_an_error() {
        let pdf = pdf_with_image(raw_rgb_stream(1, 1, vec![0, 0, 0]), 0);
        let reader = PdfImageReader::from_bytes(&pdf).unwrap();
        assert!(matches!(
            reader.page_images(2),
            Err(SchriftwerkError::PdfError(_))
        ));
    }

    #[test]
    fn garbage_bytes_are_not_a_pdf() {
        assert!(PdfImageReader::from_bytes(b"definitely not a pdf").is_err());
    }

    fn image_with_colour_space(colour_space: Object, width: i64) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => 4,
                "ColorSpace" => colour_space,
                "BitsPerComponent" => 8,
            },
            vec![0; 48],
        )
    }

    #[test]
    fn negative_icc_component_count_is_rejected() {
        let mut doc = Document::with_version("1.5");
        let profile = doc.add_object(Stream::new(dictionary! { "N" => -1_i64 }, Vec::new()));
        let colour_space =
            Object::Array(vec![Object::Name(b"ICCBased".to_vec()), profile.into()]);
        let stream = image_with_colour_space(colour_space, 4);
        assert!(matches!(
            decode_image_stream(&doc, &stream),
            Err(SchriftwerkError::ImageError(_))
        ));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let doc = Document::with_version("1.5");
        let rgb = Object::Name(b"DeviceRGB".to_vec());
        let wide = image_with_colour_space(rgb.clone(), (1_i64 << 32) + 2);
        assert!(matches!(
            decode_image_stream(&doc, &wide),
            Err(SchriftwerkError::ImageError(_))
        ));

        let huge = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => i64::from(u32::MAX),
                "Height" => i64::from(u32::MAX),
                "ColorSpace" => rgb,
                "BitsPerComponent" => 8,
            },
            vec![0; 3],
        );
        assert!(matches!(
            decode_image_stream(&doc, &huge),
            Err(SchriftwerkError::ImageError(_))
        ));
    }

    #[test]
    fn cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0]), vec![255, 255, 255]);
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 255]), vec![0, 0, 0]);
        assert_eq!(cmyk_to_rgb(&[255, 0, 0, 0]), vec![0, 255, 255]);
    }
}
