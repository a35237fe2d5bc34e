//! Paper format catalog.
//!
//! Maps format names to physical sheet sizes in millimeters (portrait
//! orientation) and answers which formats a rendering device can
//! rasterize.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::CutterError;

/// A physical paper format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperFormat {
    /// ISO A3, 297 x 420 mm.
    A3,
    /// ISO A4, 210 x 297 mm.
    #[default]
    A4,
    /// ISO A5, 148 x 210 mm.
    A5,
    /// ISO A6, 105 x 148 mm.
    A6,
    /// US Letter, 216 x 279 mm.
    Letter,
    /// US Legal, 216 x 356 mm.
    Legal,
}

impl PaperFormat {
    /// All formats in catalog order.
    pub const ALL: [Self; 6] = [
        Self::A3,
        Self::A4,
        Self::A5,
        Self::A6,
        Self::Letter,
        Self::Legal,
    ];

    /// Portrait `(width, height)` in millimeters.
    #[must_use]
    pub const fn size_mm(self) -> (f64, f64) {
        match self {
            Self::A3 => (297.0, 420.0),
            Self::A4 => (210.0, 297.0),
            Self::A5 => (148.0, 210.0),
            Self::A6 => (105.0, 148.0),
            Self::Letter => (216.0, 279.0),
            Self::Legal => (216.0, 356.0),
        }
    }

    /// Lowercase catalog name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A3 => "a3",
            Self::A4 => "a4",
            Self::A5 => "a5",
            Self::A6 => "a6",
            Self::Letter => "letter",
            Self::Legal => "legal",
        }
    }
}

impl fmt::Display for PaperFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaperFormat {
    type Err = CutterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CutterError::UnknownPaperFormat(s.to_owned()))
    }
}

/// Page orientation of a printed sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Long side vertical.
    #[default]
    Portrait,
    /// Long side horizontal.
    Landscape,
}

impl Orientation {
    /// Orientation of a `width` x `height` rectangle; squares are portrait.
    #[must_use]
    pub fn of(width: f64, height: f64) -> Self {
        if width > height {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }

    /// Single-letter code (`p` / `l`).
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Portrait => 'p',
            Self::Landscape => 'l',
        }
    }
}

/// Printable `(width, height)` in millimeters of `format` after removing
/// `margin` on every side, rotated for `orientation`.
#[must_use]
pub fn dimensions(format: PaperFormat, margin: f64, orientation: Orientation) -> (f64, f64) {
    let (w, h) = format.size_mm();
    let (w, h) = (w - 2.0 * margin, h - 2.0 * margin);
    match orientation {
        Orientation::Portrait => (w, h),
        Orientation::Landscape => (h, w),
    }
}

/// Formats whose longer side is at most `max_side_mm`, in catalog order.
///
/// Used to restrict the format choice to what a device's maximum raster
/// size can render at the requested resolution.
#[must_use]
pub fn valid_formats(max_side_mm: f64) -> Vec<PaperFormat> {
    PaperFormat::ALL
        .into_iter()
        .filter(|format| {
            let (w, h) = format.size_mm();
            w.max(h) <= max_side_mm
        })
        .collect()
}
