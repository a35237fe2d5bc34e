//! The map widget interface the print pipeline renders through.

use std::future::Future;

use mapcutter_core::options::{CSS_DPI, MM_PER_INCH};
use mapcutter_core::{Coordinate, Extent, Layer};
use mapcutter_export::RasterImage;

/// An error reported by a map widget, carrying its message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct WidgetError(pub String);

/// A map view that can be framed on a region and snapshotted.
///
/// Surface sizes are in CSS pixels; the raster a snapshot produces is
/// that size multiplied by the pixel ratio.
pub trait MapWidget {
    /// Device pixels per CSS pixel.
    fn pixel_ratio(&self) -> f64;

    /// Change the device pixels per CSS pixel for later frames.
    fn set_pixel_ratio(&mut self, ratio: f64);

    /// Largest raster side in device pixels the widget can produce.
    fn max_raster_size(&self) -> u32;

    /// Replace the data of one layer.
    fn set_layer_data(&mut self, layer: &Layer);

    /// Resize the rendering surface.
    fn resize_surface(&mut self, width: f64, height: f64);

    /// Move the camera center.
    fn set_center(&mut self, center: Coordinate);

    /// Frame `bounds` on the surface without animation.
    fn fit_bounds(&mut self, bounds: &Extent);

    /// Resolves once the current view is fully rendered, or with the
    /// error the widget reported instead.
    fn frame_rendered(&mut self) -> impl Future<Output = Result<(), WidgetError>>;

    /// Capture the rendered frame.
    ///
    /// # Errors
    ///
    /// Returns the widget's error if no frame can be captured.
    fn snapshot(&mut self) -> Result<RasterImage, WidgetError>;

    /// Free the rendering surface after a failed run.
    fn release(&mut self);
}

/// Convert millimetres to CSS pixels.
#[must_use]
pub fn mm_to_css_px(mm: f64) -> f64 {
    mm * CSS_DPI / MM_PER_INCH
}
