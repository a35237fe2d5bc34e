//! PDF document builder on top of [`lopdf`].
//!
//! Pages, images and text are collected in memory; the page tree is
//! written when the document is serialized. JPEG snapshots are embedded
//! unchanged with the `DCTDecode` filter, other rasters are decoded and
//! stored as raw RGB. Captions use the standard Helvetica font with
//! `WinAnsiEncoding`.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use mapcutter_core::{Orientation, PaperFormat, paper};

use crate::document::{DocumentBuilder, DocumentError, RasterFormat, RasterImage};

/// PDF points per millimetre (72 points per inch).
pub const POINTS_PER_MM: f64 = 72.0 / 25.4;

/// Caption font size in points.
pub const FONT_SIZE_PT: f64 = 8.0;

/// Resource name of the caption font.
const FONT_NAME: &str = "F1";

/// Convert millimetres to PDF points.
#[must_use]
pub fn mm_to_pt(mm: f64) -> f64 {
    mm * POINTS_PER_MM
}

/// A page under construction.
#[derive(Debug)]
struct Page {
    width_pt: f64,
    height_pt: f64,
    operations: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
}

impl Page {
    /// PDF y coordinate of a point `y_mm` below the top edge.
    fn flip(&self, y_mm: f64) -> f64 {
        self.height_pt - mm_to_pt(y_mm)
    }
}

/// A multi-page PDF assembled from sheet snapshots and captions.
#[derive(Debug)]
pub struct PdfDocument {
    document: Document,
    font: ObjectId,
    pages: Vec<Page>,
    image_count: usize,
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfDocument {
    /// An empty document with no pages.
    #[must_use]
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let font = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            document,
            font,
            pages: Vec::new(),
            image_count: 0,
        }
    }

    /// Serialize the document to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NoPage`] for a document without pages,
    /// or [`DocumentError::Write`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let mut document = self.finish()?;
        let mut bytes = Vec::new();
        document
            .save_to(&mut bytes)
            .map_err(|e| DocumentError::Write(e.to_string()))?;
        Ok(bytes)
    }

    fn current_page(&mut self) -> Result<&mut Page, DocumentError> {
        self.pages.last_mut().ok_or(DocumentError::NoPage)
    }

    /// Embed `image` as an image XObject and return its id.
    fn image_object(&mut self, image: &RasterImage) -> Result<ObjectId, DocumentError> {
        let (filter, width, height, data) = match image.format {
            RasterFormat::Jpeg => (
                Some("DCTDecode"),
                image.width,
                image.height,
                image.bytes.clone(),
            ),
            RasterFormat::Png => {
                let rgb = image.decode_rgb()?;
                let (width, height) = rgb.dimensions();
                (None, width, height, rgb.into_raw())
            }
        };
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        };
        if let Some(filter) = filter {
            dict.set("Filter", filter);
        }
        let stream = Stream::new(dict, data).with_compression(false);
        Ok(self.document.add_object(stream))
    }

    /// Build the page tree into a finished [`Document`].
    fn finish(&self) -> Result<Document, DocumentError> {
        if self.pages.is_empty() {
            return Err(DocumentError::NoPage);
        }
        let mut document = self.document.clone();
        let pages_id = document.new_object_id();

        let mut kids = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let content = Content {
                operations: page.operations.clone(),
            };
            let encoded = content
                .encode()
                .map_err(|e| DocumentError::Write(e.to_string()))?;
            let content_id = document.add_object(Stream::new(Dictionary::new(), encoded));

            let mut xobjects = Dictionary::new();
            for (name, id) in &page.images {
                xobjects.set(name.as_bytes().to_vec(), Object::Reference(*id));
            }
            let resources = dictionary! {
                "Font" => dictionary! { FONT_NAME => self.font },
                "XObject" => xobjects,
            };

            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::from(page.width_pt),
                    Object::from(page.height_pt),
                ],
                "Contents" => content_id,
                "Resources" => resources,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = i64::try_from(kids.len()).map_err(|e| DocumentError::Write(e.to_string()))?;
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);
        Ok(document)
    }
}

impl DocumentBuilder for PdfDocument {
    fn add_page(&mut self, format: PaperFormat, orientation: Orientation) {
        let (width, height) = paper::dimensions(format, 0.0, orientation);
        tracing::debug!(%format, ?orientation, page = self.pages.len() + 1, "adding pdf page");
        self.pages.push(Page {
            width_pt: mm_to_pt(width),
            height_pt: mm_to_pt(height),
            operations: Vec::new(),
            images: Vec::new(),
        });
    }

    fn add_image(
        &mut self,
        image: &RasterImage,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<(), DocumentError> {
        self.current_page()?;
        let id = self.image_object(image)?;
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);

        let page = self.current_page()?;
        let bottom = page.flip(y + height);
        page.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    mm_to_pt(width).into(),
                    0.into(),
                    0.into(),
                    mm_to_pt(height).into(),
                    mm_to_pt(x).into(),
                    bottom.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
        page.images.push((name, id));
        Ok(())
    }

    fn add_text(&mut self, text: &str, x: f64, y: f64) -> Result<(), DocumentError> {
        let page = self.current_page()?;
        let baseline = page.flip(y);
        page.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![FONT_NAME.into(), FONT_SIZE_PT.into()]),
            Operation::new("Td", vec![mm_to_pt(x).into(), baseline.into()]),
            Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]),
            Operation::new("ET", vec![]),
        ]);
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn save(&mut self, path: &Path) -> Result<(), DocumentError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)
            .map_err(|e| DocumentError::Write(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), pages = self.pages.len(), "saved pdf");
        Ok(())
    }
}

/// Encode text for a `WinAnsiEncoding` font.
///
/// Latin-1 characters map to their own code; the few typographic
/// characters WinAnsi places in `0x80..=0x9F` are mapped explicitly and
/// everything else becomes `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            c => u8::try_from(u32::from(c))
                .ok()
                .filter(|&b| !(0x80..0xA0).contains(&b))
                .unwrap_or(b'?'),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mm_to_pt_converts_a4() {
        assert!((mm_to_pt(210.0) - 595.28).abs() < 0.01);
        assert!((mm_to_pt(25.4) - 72.0).abs() < 1e-9);
    }

    #[test]
    fn win_ansi_maps_latin1_and_typography() {
        assert_eq!(win_ansi("Map 1 · 2km"), b"Map 1 \xB7 2km".to_vec());
        assert_eq!(win_ansi("Zürich"), b"Z\xFCrich".to_vec());
        assert_eq!(win_ansi("€"), vec![0x80]);
        assert_eq!(win_ansi("Δ"), b"?".to_vec());
    }

    #[test]
    fn content_before_page_is_rejected() {
        let mut pdf = PdfDocument::new();
        assert!(matches!(pdf.add_text("x", 1.0, 1.0), Err(DocumentError::NoPage)));
        assert!(matches!(pdf.to_bytes(), Err(DocumentError::NoPage)));
    }

    #[test]
    fn text_is_positioned_from_the_top() {
        let mut pdf = PdfDocument::new();
        pdf.add_page(PaperFormat::A4, Orientation::Portrait);
        pdf.add_text("caption", 10.0, 20.0).unwrap();
        let page = pdf.pages.last().unwrap();
        let td = page.operations.iter().find(|op| op.operator == "Td").unwrap();
        let y = td.operands[1].as_float().unwrap();
        assert!((f64::from(y) - (mm_to_pt(297.0) - mm_to_pt(20.0))).abs() < 0.01);
    }

    #[test]
    fn landscape_page_swaps_sides() {
        let mut pdf = PdfDocument::new();
        pdf.add_page(PaperFormat::A5, Orientation::Landscape);
        let page = pdf.pages.last().unwrap();
        assert!(page.width_pt > page.height_pt);
    }
}
