//! Drawing extraction: enumerate the raster images embedded in a PDF.
//!
//! Pages are visited in page-tree order. Within a page the image XObjects
//! are visited in the order of the page's `/XObject` resource dictionary,
//! descending into Form XObjects, and each gets a 1-based per-page number.
//! An image that cannot be read still consumes its number, so skipping it
//! never shifts the numbers of the images after it.
//!
//! ## What "raw bytes" means here
//!
//! JPEG (`DCTDecode`) and JPEG 2000 (`JPXDecode`) streams are already image
//! files and are passed through untouched. Flate/LZW-compressed or
//! uncompressed samples are bare pixel rows, so they are wrapped as a PNG.
//! Everything else is reported as unsupported and skipped.

use crate::error::{DocumentError, ImageExtractionError};
use crate::output::{DrawingRecord, ImageFormatHint};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// Page-tree nodes walked upwards when looking for inherited resources.
const MAX_TREE_DEPTH: usize = 32;

/// Largest image (in pixels) the extractor will unpack.
const MAX_PIXELS: u64 = 100_000_000;

/// Filters whose output is bare samples.
const SAMPLE_FILTERS: &[&str] = &["FlateDecode", "Fl", "LZWDecode", "LZW"];

/// Output of [`extract_drawings`]: the drawings in document order plus one
/// warning per image that had to be skipped.
#[derive(Debug, Default)]
pub struct Extraction {
    pub drawings: Vec<DrawingRecord>,
    pub warnings: Vec<ImageExtractionError>,
}

/// One image slot on a page, before its bytes are read.
enum Slot {
    Image(ObjectId),
    Broken { id: ObjectId, reason: String },
}

/// Extract every embedded raster image from `bytes`.
///
/// # Errors
/// Returns [`DocumentError`] only when the document itself cannot be
/// opened. Per-image failures are collected in [`Extraction::warnings`].
pub fn extract_drawings(bytes: &[u8]) -> Result<Extraction, DocumentError> {
    let doc = Document::load_mem(bytes).map_err(|e| DocumentError::Unreadable {
        detail: e.to_string(),
    })?;

    let mut extraction = Extraction::default();

    for (page, page_id) in doc.get_pages() {
        let slots = page_slots(&doc, page_id);
        debug!("Page {}: {} image slot(s)", page, slots.len());

        for (idx, slot) in slots.into_iter().enumerate() {
            let drawing_number = idx as u32 + 1;
            let outcome = match slot {
                Slot::Image(id) => read_image(&doc, id),
                Slot::Broken { id, reason } => Err(format!("object {} {}: {}", id.0, id.1, reason)),
            };

            match outcome {
                Ok((image_bytes, format)) => extraction.drawings.push(DrawingRecord {
                    page,
                    drawing_number,
                    image_bytes,
                    format,
                }),
                Err(reason) => {
                    let warning = ImageExtractionError {
                        page,
                        drawing_number,
                        reason,
                    };
                    warn!("{}", warning);
                    extraction.warnings.push(warning);
                }
            }
        }
    }

    info!(
        "Extracted {} drawing(s), skipped {}",
        extraction.drawings.len(),
        extraction.warnings.len()
    );

    Ok(extraction)
}

// ── Enumeration ──────────────────────────────────────────────────────────

fn page_slots(doc: &Document, page_id: ObjectId) -> Vec<Slot> {
    let mut slots = Vec::new();
    let mut seen = HashSet::new();
    if let Some(resources) = page_resources(doc, page_id) {
        collect_slots(doc, resources, &mut slots, &mut seen);
    }
    slots
}

/// The page's `/Resources`, or the nearest ancestor's.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node_id = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(node_id).ok()?;
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => node_id = *parent,
            _ => return None,
        }
    }
    None
}

fn collect_slots(
    doc: &Document,
    resources: &Dictionary,
    slots: &mut Vec<Slot>,
    seen: &mut HashSet<ObjectId>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
    else {
        return;
    };

    for (_, value) in xobjects.iter() {
        let Object::Reference(id) = value else {
            continue;
        };
        if !seen.insert(*id) {
            continue;
        }

        match doc.get_object(*id) {
            Ok(Object::Stream(stream)) => match name_of(&stream.dict, b"Subtype") {
                Some(s) if s == b"Image" => slots.push(Slot::Image(*id)),
                Some(s) if s == b"Form" => {
                    if let Some(inner) = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|o| resolve_dict(doc, o))
                    {
                        collect_slots(doc, inner, slots, seen);
                    }
                }
                _ => {}
            },
            Ok(_) => slots.push(Slot::Broken {
                id: *id,
                reason: "XObject reference does not point to a stream".into(),
            }),
            Err(e) => slots.push(Slot::Broken {
                id: *id,
                reason: format!("broken reference ({e})"),
            }),
        }
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d),
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Dictionary(d) => Some(d),
            _ => None,
        },
        _ => None,
    }
}

fn name_of<'a>(dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    match dict.get(key) {
        Ok(Object::Name(n)) => Some(n.as_slice()),
        _ => None,
    }
}

fn int_of(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match dict.get(key) {
        Ok(Object::Integer(n)) => Some(*n),
        _ => None,
    }
}

fn filters_of(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).into_owned()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|f| match f {
                Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

// ── Byte extraction ──────────────────────────────────────────────────────

fn read_image(doc: &Document, id: ObjectId) -> Result<(Vec<u8>, ImageFormatHint), String> {
    let stream = match doc.get_object(id) {
        Ok(Object::Stream(s)) => s,
        _ => return Err("image stream disappeared".into()),
    };

    let filters = filters_of(&stream.dict);
    match filters.as_slice() {
        [f] if f == "DCTDecode" || f == "DCT" => Ok((stream.content.clone(), ImageFormatHint::Jpeg)),
        [f] if f == "JPXDecode" => Ok((stream.content.clone(), ImageFormatHint::Jpeg2000)),
        fs if fs.iter().all(|f| SAMPLE_FILTERS.contains(&f.as_str())) => {
            let png = samples_to_png(doc, stream, !fs.is_empty())?;
            Ok((png, ImageFormatHint::Png))
        }
        fs => Err(format!("unsupported encoding {}", fs.join(" + "))),
    }
}

fn samples_to_png(doc: &Document, stream: &Stream, compressed: bool) -> Result<Vec<u8>, String> {
    let dict = &stream.dict;
    let width = positive_dimension(dict, b"Width")?;
    let height = positive_dimension(dict, b"Height")?;
    if u64::from(width) * u64::from(height) > MAX_PIXELS {
        return Err(format!("image too large ({width}x{height})"));
    }

    let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let (components, bits) = if is_mask {
        (1, 1)
    } else {
        let components = match dict.get(b"ColorSpace") {
            Ok(cs) => color_components(doc, cs)?,
            Err(_) => return Err("missing /ColorSpace".into()),
        };
        (components, int_of(dict, b"BitsPerComponent").unwrap_or(8))
    };

    let data = if compressed {
        stream
            .decompressed_content()
            .map_err(|e| format!("decompression failed: {e}"))?
    } else {
        stream.content.clone()
    };

    let image = match (components, bits) {
        (1, 8) => {
            let len = (width * height) as usize;
            let pixels = data.get(..len).ok_or_else(|| short_data(data.len(), len))?;
            DynamicImage::ImageLuma8(
                GrayImage::from_raw(width, height, pixels.to_vec())
                    .ok_or("sample buffer does not match dimensions")?,
            )
        }
        (3, 8) => {
            let len = (width * height * 3) as usize;
            let pixels = data.get(..len).ok_or_else(|| short_data(data.len(), len))?;
            DynamicImage::ImageRgb8(
                RgbImage::from_raw(width, height, pixels.to_vec())
                    .ok_or("sample buffer does not match dimensions")?,
            )
        }
        (4, 8) => {
            let len = (width * height * 4) as usize;
            let pixels = data.get(..len).ok_or_else(|| short_data(data.len(), len))?;
            DynamicImage::ImageRgb8(
                RgbImage::from_raw(width, height, cmyk_to_rgb(pixels))
                    .ok_or("sample buffer does not match dimensions")?,
            )
        }
        (1, 1) => DynamicImage::ImageLuma8(unpack_bilevel(&data, width, height)?),
        (c, b) => {
            return Err(format!(
                "unsupported pixel layout ({c} component(s), {b} bit(s) per component)"
            ))
        }
    };

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| format!("PNG encoding failed: {e}"))?;
    Ok(png)
}

fn positive_dimension(dict: &Dictionary, key: &[u8]) -> Result<u32, String> {
    int_of(dict, key)
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| format!("missing or invalid /{}", String::from_utf8_lossy(key)))
}

fn short_data(got: usize, expected: usize) -> String {
    format!("sample data too short: got {got} bytes, expected {expected}")
}

/// Number of colour components of a `/ColorSpace` value.
fn color_components(doc: &Document, cs: &Object) -> Result<usize, String> {
    match cs {
        Object::Name(n) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(3),
            b"DeviceCMYK" | b"CMYK" => Ok(4),
            other => Err(format!(
                "unsupported colour space {}",
                String::from_utf8_lossy(other)
            )),
        },
        Object::Reference(id) => {
            let resolved = doc
                .get_object(*id)
                .map_err(|e| format!("broken colour space reference ({e})"))?;
            color_components(doc, resolved)
        }
        Object::Array(arr) => {
            let family = arr.first().and_then(|f| match f {
                Object::Name(n) => Some(n.as_slice()),
                _ => None,
            });
            match family {
                Some(b"ICCBased") => {
                    let n = match arr.get(1) {
                        Some(Object::Reference(id)) => match doc.get_object(*id) {
                            Ok(Object::Stream(s)) => int_of(&s.dict, b"N"),
                            _ => None,
                        },
                        Some(Object::Stream(s)) => int_of(&s.dict, b"N"),
                        _ => None,
                    };
                    match n {
                        Some(n @ (1 | 3 | 4)) => Ok(n as usize),
                        _ => Err("ICC profile without a usable /N".into()),
                    }
                }
                Some(b"CalGray") => Ok(1),
                Some(b"CalRGB") => Ok(3),
                Some(other) => Err(format!(
                    "unsupported colour space {}",
                    String::from_utf8_lossy(other)
                )),
                None => Err("empty colour space array".into()),
            }
        }
        _ => Err("malformed /ColorSpace".into()),
    }
}

fn cmyk_to_rgb(pixels: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
    for px in pixels.chunks_exact(4) {
        let k = 255 - u16::from(px[3]);
        for &c in &px[..3] {
            rgb.push(((255 - u16::from(c)) * k / 255) as u8);
        }
    }
    rgb
}

/// Expand 1-bit rows (each padded to a whole byte) to 8-bit gray.
fn unpack_bilevel(data: &[u8], width: u32, height: u32) -> Result<GrayImage, String> {
    let row_bytes = width.div_ceil(8) as usize;
    let needed = row_bytes * height as usize;
    if data.len() < needed {
        return Err(short_data(data.len(), needed));
    }

    let mut pixels = Vec::with_capacity((width * height) as usize);
    for row in data[..needed].chunks_exact(row_bytes) {
        for x in 0..width as usize {
            let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
            pixels.push(if bit == 1 { 255 } else { 0 });
        }
    }

    GrayImage::from_raw(width, height, pixels).ok_or_else(|| "bilevel unpack failed".to_string())
}
