//! A self-contained raster map widget.
//!
//! Draws the layer data it was given onto a plain paper-coloured
//! background with a 1 km grid, using a local equirectangular
//! projection at the latitude of the framed bounds. It produces real
//! print-resolution snapshots without any tile service, which makes the
//! print pipeline usable from the command line and in tests.

use geojson::Value;
use image::RgbImage;
use mapcutter_core::layer::{Paint as LayerPaint, Rgb};
use mapcutter_core::{Coordinate, Extent, Layer, LayerKind, Ruler};
use mapcutter_export::{RasterFormat, RasterImage};
use tiny_skia::{
    Color, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, StrokeDash, Transform,
};

use crate::widget::{MapWidget, WidgetError};

/// Background colour of the sheet.
const BACKGROUND: Rgb = Rgb(0xf6, 0xf3, 0xec);

/// Grid line colour.
const GRID: Rgb = Rgb(0xc8, 0xd2, 0xdc);

/// Grid spacing in meters.
const GRID_SPACING_M: f64 = 1000.0;

/// Radius of point symbols in CSS pixels.
const SYMBOL_RADIUS: f32 = 4.0;

/// Largest raster side the sketch renderer accepts.
pub const DEFAULT_MAX_RASTER_SIZE: u32 = 8192;

/// Maps geographic coordinates to device pixels for one frame.
#[derive(Debug, Clone, Copy)]
struct View {
    ruler: Ruler,
    center: Coordinate,
    /// Device pixels per metre.
    scale: f64,
    width: f64,
    height: f64,
}

impl View {
    #[allow(clippy::cast_possible_truncation)]
    fn project(&self, c: Coordinate) -> (f32, f32) {
        let dx = (c.lon - self.center.lon) * self.ruler.meters_per_degree_lon();
        let dy = (self.center.lat - c.lat) * self.ruler.meters_per_degree_lat();
        (
            dx.mul_add(self.scale, self.width / 2.0) as f32,
            dy.mul_add(self.scale, self.height / 2.0) as f32,
        )
    }

    /// Geographic position of a device pixel.
    fn unproject(&self, x: f64, y: f64) -> Coordinate {
        Coordinate::new(
            self.center.lon + (x - self.width / 2.0) / self.scale / self.ruler.meters_per_degree_lon(),
            self.center.lat - (y - self.height / 2.0) / self.scale / self.ruler.meters_per_degree_lat(),
        )
    }
}

/// Raster map widget backed by `tiny-skia`.
#[derive(Debug)]
pub struct SketchMap {
    pixel_ratio: f64,
    max_raster_size: u32,
    jpeg_quality: u8,
    layers: Vec<Layer>,
    surface: (f64, f64),
    center: Coordinate,
    bounds: Option<Extent>,
    frame: Option<Pixmap>,
}

impl Default for SketchMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SketchMap {
    /// JPEG quality of snapshots.
    pub const DEFAULT_JPEG_QUALITY: u8 = 90;

    /// A widget with pixel ratio 1 and no layers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pixel_ratio: 1.0,
            max_raster_size: DEFAULT_MAX_RASTER_SIZE,
            jpeg_quality: Self::DEFAULT_JPEG_QUALITY,
            layers: Vec::new(),
            surface: (0.0, 0.0),
            center: Coordinate::new(0.0, 0.0),
            bounds: None,
            frame: None,
        }
    }

    /// Limit the raster size, e.g. to mimic a small graphics device.
    #[must_use]
    pub const fn with_max_raster_size(mut self, max: u32) -> Self {
        self.max_raster_size = max;
        self
    }

    /// Raster size in device pixels of the current surface.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn raster_size(&self) -> (u32, u32) {
        let (w, h) = self.surface;
        (
            (w * self.pixel_ratio).round().max(0.0) as u32,
            (h * self.pixel_ratio).round().max(0.0) as u32,
        )
    }

    fn view(&self, width: u32, height: u32) -> View {
        let (width, height) = (f64::from(width), f64::from(height));
        let ruler = Ruler::new(self.center.lat);
        let scale = self.bounds.map_or(1.0, |b| {
            let w_m = (b.east - b.west) * ruler.meters_per_degree_lon();
            let h_m = (b.north - b.south) * ruler.meters_per_degree_lat();
            let sx = if w_m > 0.0 { width / w_m } else { f64::INFINITY };
            let sy = if h_m > 0.0 { height / h_m } else { f64::INFINITY };
            let s = sx.min(sy);
            if s.is_finite() { s } else { 1.0 }
        });
        View {
            ruler,
            center: self.center,
            scale,
            width,
            height,
        }
    }

    fn render(&self) -> Result<Pixmap, WidgetError> {
        let (width, height) = self.raster_size();
        if width == 0 || height == 0 {
            return Err(WidgetError("rendering surface has no area".to_owned()));
        }
        if width.max(height) > self.max_raster_size {
            return Err(WidgetError(format!(
                "surface {width}x{height}px exceeds the maximum raster size {}px",
                self.max_raster_size
            )));
        }
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| WidgetError(format!("cannot allocate {width}x{height}px surface")))?;
        pixmap.fill(color(BACKGROUND, 1.0));

        let view = self.view(width, height);
        self.draw_grid(&mut pixmap, &view);
        for kind in LayerKind::ALL {
            for layer in self.layers.iter().filter(|l| l.kind == kind) {
                self.draw_layer(&mut pixmap, &view, layer);
            }
        }
        Ok(pixmap)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw_grid(&self, pixmap: &mut Pixmap, view: &View) {
        let top_left = view.unproject(0.0, 0.0);
        let bottom_right = view.unproject(view.width, view.height);
        let lon_step = GRID_SPACING_M / view.ruler.meters_per_degree_lon();
        let lat_step = GRID_SPACING_M / view.ruler.meters_per_degree_lat();

        let mut pb = PathBuilder::new();
        let mut lon = (top_left.lon / lon_step).ceil() * lon_step;
        while lon <= bottom_right.lon {
            let (x, _) = view.project(Coordinate::new(lon, view.center.lat));
            pb.move_to(x, 0.0);
            pb.line_to(x, view.height as f32);
            lon += lon_step;
        }
        let mut lat = (bottom_right.lat / lat_step).ceil() * lat_step;
        while lat <= top_left.lat {
            let (_, y) = view.project(Coordinate::new(view.center.lon, lat));
            pb.move_to(0.0, y);
            pb.line_to(view.width as f32, y);
            lat += lat_step;
        }
        let Some(path) = pb.finish() else {
            return;
        };
        let stroke = Stroke {
            width: self.px(1.0),
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint(GRID, 1.0), &stroke, Transform::identity(), None);
    }

    fn draw_layer(&self, pixmap: &mut Pixmap, view: &View, layer: &Layer) {
        let style = layer.style();
        let color_paint = paint(style.color, style.opacity);
        match style.paint {
            LayerPaint::Line { width, dash } => {
                let width = self.px(width);
                let stroke = Stroke {
                    width,
                    line_cap: LineCap::Round,
                    line_join: LineJoin::Round,
                    dash: dash
                        .and_then(|(on, off)| StrokeDash::new(vec![on * width, off * width], 0.0)),
                    ..Stroke::default()
                };
                for line in lines(&layer.data) {
                    if let Some(path) = polyline_path(view, &line) {
                        pixmap.stroke_path(&path, &color_paint, &stroke, Transform::identity(), None);
                    }
                }
            }
            LayerPaint::Symbol { .. } => {
                let outline = Stroke {
                    width: self.px(1.0),
                    ..Stroke::default()
                };
                let white = paint(Rgb(0xff, 0xff, 0xff), 1.0);
                for point in points(&layer.data) {
                    let (x, y) = view.project(point);
                    if let Some(circle) = PathBuilder::from_circle(x, y, self.px(SYMBOL_RADIUS)) {
                        pixmap.fill_path(
                            &circle,
                            &color_paint,
                            tiny_skia::FillRule::Winding,
                            Transform::identity(),
                            None,
                        );
                        pixmap.stroke_path(&circle, &white, &outline, Transform::identity(), None);
                    }
                }
            }
        }
    }

    /// CSS pixels to device pixels.
    #[allow(clippy::cast_possible_truncation)]
    fn px(&self, css: f32) -> f32 {
        css * self.pixel_ratio as f32
    }
}

impl MapWidget for SketchMap {
    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
    }

    fn max_raster_size(&self) -> u32 {
        self.max_raster_size
    }

    fn set_layer_data(&mut self, layer: &Layer) {
        self.layers.retain(|l| l.kind != layer.kind);
        self.layers.push(layer.clone());
    }

    fn resize_surface(&mut self, width: f64, height: f64) {
        self.surface = (width, height);
        self.frame = None;
    }

    fn set_center(&mut self, center: Coordinate) {
        self.center = center;
        self.frame = None;
    }

    fn fit_bounds(&mut self, bounds: &Extent) {
        self.center = bounds.center();
        self.bounds = Some(*bounds);
        self.frame = None;
    }

    async fn frame_rendered(&mut self) -> Result<(), WidgetError> {
        tokio::task::yield_now().await;
        let pixmap = self.render()?;
        tracing::debug!(width = pixmap.width(), height = pixmap.height(), "sketch frame rendered");
        self.frame = Some(pixmap);
        Ok(())
    }

    fn snapshot(&mut self) -> Result<RasterImage, WidgetError> {
        let pixmap = self
            .frame
            .as_ref()
            .ok_or_else(|| WidgetError("no rendered frame to capture".to_owned()))?;
        // The background is opaque, so premultiplied and straight colour agree.
        let rgb: Vec<u8> = pixmap
            .data()
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        let image = RgbImage::from_raw(pixmap.width(), pixmap.height(), rgb)
            .ok_or_else(|| WidgetError("frame buffer size mismatch".to_owned()))?;
        RasterImage::encode(&image, RasterFormat::Jpeg, self.jpeg_quality)
            .map_err(|e| WidgetError(e.to_string()))
    }

    fn release(&mut self) {
        self.frame = None;
        self.layers.clear();
    }
}

fn color(rgb: Rgb, opacity: f32) -> Color {
    let mut color = Color::from_rgba8(rgb.0, rgb.1, rgb.2, 255);
    color.set_alpha(opacity.clamp(0.0, 1.0));
    color
}

fn paint(rgb: Rgb, opacity: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color(rgb, opacity));
    paint.anti_alias = true;
    paint
}

fn polyline_path(view: &View, line: &[Coordinate]) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    let mut points = line.iter().map(|&c| view.project(c));
    let (x, y) = points.next()?;
    pb.move_to(x, y);
    for (x, y) in points {
        pb.line_to(x, y);
    }
    pb.finish()
}

fn coordinates(positions: &[Vec<f64>]) -> Vec<Coordinate> {
    positions
        .iter()
        .filter_map(|p| Coordinate::from_position(p))
        .collect()
}

/// Line work of a collection: line strings and polygon rings.
fn lines(data: &geojson::FeatureCollection) -> Vec<Vec<Coordinate>> {
    let mut result = Vec::new();
    for geometry in data.features.iter().filter_map(|f| f.geometry.as_ref()) {
        match &geometry.value {
            Value::LineString(line) => result.push(coordinates(line)),
            Value::MultiLineString(lines) | Value::Polygon(lines) => {
                result.extend(lines.iter().map(|l| coordinates(l)));
            }
            _ => {}
        }
    }
    result
}

fn points(data: &geojson::FeatureCollection) -> Vec<Coordinate> {
    data.features
        .iter()
        .filter_map(|f| match &f.geometry.as_ref()?.value {
            Value::Point(p) => Coordinate::from_position(p),
            _ => None,
        })
        .collect()
}
