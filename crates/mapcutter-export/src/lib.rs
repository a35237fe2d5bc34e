//! mapcutter-export: Document and format serializers.
//!
//! Assembles rendered sheets into a printable document. Currently
//! supports PDF through [`PdfDocument`] and a single-page SVG overview
//! of the route and its sheets.
//!
//! Only [`PdfDocument::save`] touches the filesystem; everything else
//! works on in-memory bytes and strings.

pub mod document;
pub mod pdf;
pub mod svg;

pub use document::{DocumentBuilder, DocumentError, RasterFormat, RasterImage};
pub use pdf::PdfDocument;
pub use svg::{SvgMetadata, overview_svg};
