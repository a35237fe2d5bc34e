//! User-facing configuration for cutout planning, printing and the
//! derived route layers.
//!
//! All option structs deserialize with `#[serde(default)]`, so a partial
//! JSON document only overrides the fields it names.

use serde::{Deserialize, Serialize};

use crate::paper::{self, Orientation, PaperFormat};
use crate::types::CutterError;

/// Screen resolution the map widget's CSS pixels are defined at.
pub const CSS_DPI: f64 = 96.0;

/// Millimeters per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Options controlling sheet size, scale and print resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintOptions {
    /// Physical paper format of every sheet.
    pub format: PaperFormat,

    /// Blank border between the map image and the paper edge, in mm.
    ///
    /// Must lie within `[0, MAX_MARGIN]`.
    pub margin: f64,

    /// Scale denominator: `25000` means 1 mm on paper is 25 m on the
    /// ground. Must be at least [`MIN_SCALE`](Self::MIN_SCALE).
    pub scale: f64,

    /// Print resolution in dots per inch. Must be positive.
    pub dpi: f64,

    /// Clearance between the route and the edge of its cutout, in mm.
    pub padding: f64,
}

impl PrintOptions {
    /// Default paper format.
    pub const DEFAULT_FORMAT: PaperFormat = PaperFormat::A4;
    /// Default margin in mm.
    pub const DEFAULT_MARGIN: f64 = 5.0;
    /// Default scale denominator.
    pub const DEFAULT_SCALE: f64 = 50_000.0;
    /// Default print resolution.
    pub const DEFAULT_DPI: f64 = 300.0;
    /// Default route padding in mm.
    pub const DEFAULT_PADDING: f64 = 5.0;

    /// Finest accepted scale denominator.
    pub const MIN_SCALE: f64 = 5000.0;
    /// Largest accepted margin in mm.
    pub const MAX_MARGIN: f64 = 50.0;

    /// Check the option constraints.
    ///
    /// # Errors
    ///
    /// Returns [`CutterError::InvalidOptions`] naming the first violated
    /// constraint.
    pub fn validate(&self) -> Result<(), CutterError> {
        if !self.scale.is_finite() || self.scale < Self::MIN_SCALE {
            return Err(CutterError::InvalidOptions(format!(
                "scale must be at least 1:{}, got 1:{}",
                Self::MIN_SCALE,
                self.scale
            )));
        }
        if !(0.0..=Self::MAX_MARGIN).contains(&self.margin) {
            return Err(CutterError::InvalidOptions(format!(
                "margin must be within [0, {}] mm, got {}",
                Self::MAX_MARGIN,
                self.margin
            )));
        }
        if !self.dpi.is_finite() || self.dpi <= 0.0 {
            return Err(CutterError::InvalidOptions(format!(
                "dpi must be positive, got {}",
                self.dpi
            )));
        }
        if !self.padding.is_finite() || self.padding < 0.0 {
            return Err(CutterError::InvalidOptions(format!(
                "padding must be finite and not negative, got {}",
                self.padding
            )));
        }
        let (w, h) = self.padded_printable_mm();
        if w <= 0.0 || h <= 0.0 {
            return Err(CutterError::InvalidOptions(format!(
                "{} leaves no printable area with {} mm margin and {} mm padding",
                self.format, self.margin, self.padding
            )));
        }
        Ok(())
    }

    /// Portrait printable area in mm (paper minus margins).
    #[must_use]
    pub fn printable_mm(&self) -> (f64, f64) {
        paper::dimensions(self.format, self.margin, Orientation::Portrait)
    }

    /// Portrait area in mm the route itself must fit in (printable area
    /// minus padding).
    #[must_use]
    pub fn padded_printable_mm(&self) -> (f64, f64) {
        let (w, h) = self.printable_mm();
        (w - 2.0 * self.padding, h - 2.0 * self.padding)
    }

    /// Ground `(width, height)` in meters one sheet covers at scale.
    #[must_use]
    pub fn ground_size(&self) -> (f64, f64) {
        let (w, h) = self.printable_mm();
        (self.mm_to_ground(w), self.mm_to_ground(h))
    }

    /// Ground `(width, height)` in meters the route may occupy on one
    /// sheet.
    #[must_use]
    pub fn padded_ground_size(&self) -> (f64, f64) {
        let (w, h) = self.padded_printable_mm();
        (self.mm_to_ground(w), self.mm_to_ground(h))
    }

    /// Device pixel ratio that makes the map widget render at `dpi`.
    #[must_use]
    pub fn pixel_ratio(&self) -> f64 {
        self.dpi / CSS_DPI
    }

    fn mm_to_ground(&self, mm: f64) -> f64 {
        mm / 1000.0 * self.scale
    }
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            format: Self::DEFAULT_FORMAT,
            margin: Self::DEFAULT_MARGIN,
            scale: Self::DEFAULT_SCALE,
            dpi: Self::DEFAULT_DPI,
            padding: Self::DEFAULT_PADDING,
        }
    }
}

/// Options for slope section detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlopeOptions {
    /// Spline smoothing strength. Values in `(0, 1)` smooth the
    /// elevation profile before differentiating (smaller is smoother);
    /// `1` or more uses the raw windowed slope.
    pub lambda: f64,

    /// Minimum slope magnitude as a ratio (`0.08` is 8 %).
    pub min_slope: f64,

    /// Look-behind/look-ahead distance in meters for the windowed slope.
    pub window: f64,

    /// Minimum elevation change in meters for a section to be kept.
    pub min_elevation_change: f64,

    /// Merge consecutive same-direction sections separated by at most
    /// this many meters. `None` disables merging.
    pub merge_distance: Option<f64>,
}

impl SlopeOptions {
    /// Default smoothing strength (no smoothing).
    pub const DEFAULT_LAMBDA: f64 = 1.0;
    /// Default minimum slope ratio.
    pub const DEFAULT_MIN_SLOPE: f64 = 0.08;
    /// Default slope window in meters.
    pub const DEFAULT_WINDOW: f64 = 25.0;
    /// Default minimum elevation change in meters.
    pub const DEFAULT_MIN_ELEVATION_CHANGE: f64 = 10.0;
    /// Gap used when merging is requested without a distance.
    pub const DEFAULT_MERGE_DISTANCE: f64 = 500.0;
}

impl Default for SlopeOptions {
    fn default() -> Self {
        Self {
            lambda: Self::DEFAULT_LAMBDA,
            min_slope: Self::DEFAULT_MIN_SLOPE,
            window: Self::DEFAULT_WINDOW,
            min_elevation_change: Self::DEFAULT_MIN_ELEVATION_CHANGE,
            merge_distance: None,
        }
    }
}

/// Options for the milemarker layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilemarkerOptions {
    /// Distance between markers in km. `0` disables the layer.
    pub interval_km: f64,
}

impl MilemarkerOptions {
    /// Default interval (disabled).
    pub const DEFAULT_INTERVAL_KM: f64 = 0.0;
}

impl Default for MilemarkerOptions {
    fn default() -> Self {
        Self {
            interval_km: Self::DEFAULT_INTERVAL_KM,
        }
    }
}
