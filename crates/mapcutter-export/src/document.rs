//! The document builder interface and raster sheet images.
//!
//! All positions and sizes are in millimetres measured from the
//! top-left corner of the current page.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, RgbImage};
use mapcutter_core::{Orientation, PaperFormat};

/// Errors that can occur while assembling or writing a document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Content was added before any page.
    #[error("no page to draw on, call add_page first")]
    NoPage,

    /// A raster image could not be encoded or decoded.
    #[error("image error: {0}")]
    Image(String),

    /// The document could not be serialized or written.
    #[error("failed to write document: {0}")]
    Write(String),
}

/// Encoding of a raster snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    /// Baseline JPEG, embedded as is.
    Jpeg,
    /// PNG, decoded and embedded as raw RGB.
    Png,
}

impl RasterFormat {
    const fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }
}

/// An encoded raster image of one rendered sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Encoding of `bytes`.
    pub format: RasterFormat,
    /// Encoded image data.
    pub bytes: Vec<u8>,
}

impl RasterImage {
    /// Encode an RGB image. `quality` (1..=100) applies to JPEG only.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Image`] if the encoder fails.
    pub fn encode(image: &RgbImage, format: RasterFormat, quality: u8) -> Result<Self, DocumentError> {
        let (width, height) = image.dimensions();
        let mut bytes = Vec::new();
        match format {
            RasterFormat::Jpeg => {
                JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
                    .write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| DocumentError::Image(e.to_string()))?;
            }
            RasterFormat::Png => {
                PngEncoder::new(Cursor::new(&mut bytes))
                    .write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| DocumentError::Image(e.to_string()))?;
            }
        }
        Ok(Self {
            width,
            height,
            format,
            bytes,
        })
    }

    /// Decode to 8-bit RGB pixels.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Image`] if the bytes are not a valid
    /// image of the declared format.
    pub fn decode_rgb(&self) -> Result<RgbImage, DocumentError> {
        image::load_from_memory_with_format(&self.bytes, self.format.image_format())
            .map(|img| img.to_rgb8())
            .map_err(|e| DocumentError::Image(e.to_string()))
    }
}

/// A paged output document.
pub trait DocumentBuilder {
    /// Start a new page of `format` in `orientation`. Later content goes
    /// onto this page.
    fn add_page(&mut self, format: PaperFormat, orientation: Orientation);

    /// Place `image` at `(x, y)` with size `(width, height)`, in mm.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NoPage`] before the first page, or
    /// [`DocumentError::Image`] if the image cannot be embedded.
    fn add_image(
        &mut self,
        image: &RasterImage,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<(), DocumentError>;

    /// Write one line of text with its baseline at `(x, y)`, in mm.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NoPage`] before the first page.
    fn add_text(&mut self, text: &str, x: f64, y: f64) -> Result<(), DocumentError>;

    /// Number of pages added so far.
    fn page_count(&self) -> usize;

    /// Serialize the document to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Write`] if serialization or the file
    /// write fails.
    fn save(&mut self, path: &Path) -> Result<(), DocumentError>;
}
