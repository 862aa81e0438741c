//! Shared fixtures: in-memory PDFs with embedded images, and a scripted
//! analyzer that records what it was asked to analyse.

#![allow(dead_code)]

use edgequake_drawings::{DrawingAnalyzer, InferenceError};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

/// One image slot on a fixture page.
#[derive(Debug, Clone, Copy)]
pub enum Img {
    /// A `DCTDecode` stream of the given width (height 4).
    Jpeg(u32),
    /// A Flate-compressed 8-bit gray image of the given width (height 4).
    GrayFlate(u32),
    /// A `CCITTFaxDecode` stream: readable object, unsupported encoding.
    Fax,
    /// A reference to an object that does not exist.
    Dangling,
}

fn jpeg_stream(width: u32) -> Stream {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 4, Rgb([200, 40, 40])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .expect("jpeg encode");
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => 4,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        buf,
    )
}

fn gray_flate_stream(width: u32) -> Stream {
    let samples = vec![128u8; (width * 4) as usize];
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&samples).expect("deflate");
    let compressed = enc.finish().expect("deflate finish");
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => 4,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        compressed,
    )
}

fn fax_stream() -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 16,
            "Height" => 16,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 1,
            "Filter" => "CCITTFaxDecode",
        },
        vec![0x26, 0xA0, 0x01, 0x00],
    )
}

/// Build a PDF with one page per entry of `pages`, each page holding its
/// images in the given order.
pub fn pdf_with_pages(pages: &[&[Img]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for images in pages {
        let mut xobjects = Dictionary::new();
        let mut content = String::new();

        for (i, img) in images.iter().enumerate() {
            let name = format!("Im{}", i + 1);
            let id: ObjectId = match img {
                Img::Jpeg(w) => doc.add_object(jpeg_stream(*w)),
                Img::GrayFlate(w) => doc.add_object(gray_flate_stream(*w)),
                Img::Fax => doc.add_object(fax_stream()),
                Img::Dangling => (9999, 0),
            };
            xobjects.set(name.as_str(), Object::Reference(id));
            content.push_str(&format!("q 100 0 0 40 20 {} cm /{} Do Q\n", 700 - 50 * i, name));
        }

        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
            "Resources" => dictionary! { "XObject" => xobjects },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save fixture pdf");
    out
}

/// Analyzer that answers with the image width, failing on chosen calls.
///
/// `widths()` lists the width of every image it was asked about, in order,
/// including failed calls.
#[derive(Clone, Default)]
pub struct Scripted {
    log: Arc<Mutex<Vec<u32>>>,
    fail_on: Vec<usize>,
}

impl Scripted {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the listed calls (0-based call count).
    pub fn failing_on(fail_on: &[usize]) -> Self {
        Self {
            log: Arc::default(),
            fail_on: fail_on.to_vec(),
        }
    }

    pub fn widths(&self) -> Vec<u32> {
        self.log.lock().unwrap().clone()
    }
}

impl DrawingAnalyzer for Scripted {
    async fn analyze(&self, image: &DynamicImage) -> Result<String, InferenceError> {
        let call = {
            let mut log = self.log.lock().unwrap();
            log.push(image.width());
            log.len() - 1
        };
        if self.fail_on.contains(&call) {
            return Err(InferenceError::Provider {
                detail: "503 Service Unavailable".into(),
            });
        }
        Ok(format!("## Drawing Type and Purpose\nDetail view, {} px wide\n", image.width()))
    }
}
