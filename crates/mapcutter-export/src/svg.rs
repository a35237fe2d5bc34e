//! SVG overview sheet.
//!
//! Draws the route and the numbered outline of every cutout onto one
//! SVG document using the [`svg`] crate for document construction,
//! XML escaping, and path data formatting.
//!
//! Geographic coordinates are projected with a cheap ruler at the
//! centre latitude of the drawing, so distances are true to scale
//! across the overview. The longer side of the drawing is
//! [`DOCUMENT_SIZE_MM`] long.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Element, Group, Path, Rectangle, Text, Title};
use svg::node::{self, Node};

use mapcutter_core::layer::{LayerKind, Paint};
use mapcutter_core::{Coordinate, Cutout, Extent, Route, Ruler, Waypoint, metrics};

/// Length of the longer document side in millimetres.
pub const DOCUMENT_SIZE_MM: f64 = 200.0;

/// Blank border around the drawing in millimetres.
const BORDER_MM: f64 = 5.0;

/// Metadata to embed in the SVG document.
///
/// When present, a `<title>` and/or `<desc>` element is emitted
/// immediately after the opening `<svg>` tag.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, typically the route name.
    pub title: Option<&'a str>,

    /// Document description, e.g. scale and paper format.
    pub description: Option<&'a str>,

    /// Print options JSON, emitted inside `<metadata>` wrapped in a
    /// namespaced `<mapcutter:options>` element.
    pub options_json: Option<&'a str>,
}

/// Maps geographic coordinates into the millimetre drawing space.
struct Projection {
    ruler: Ruler,
    west: f64,
    north: f64,
    /// Millimetres per metre of ground.
    scale: f64,
}

impl Projection {
    fn fit(extent: &Extent) -> (Self, f64, f64) {
        let ruler = Ruler::new(extent.center().lat);
        let width_m = (extent.east - extent.west) * ruler.meters_per_degree_lon();
        let height_m = (extent.north - extent.south) * ruler.meters_per_degree_lat();
        let longer = width_m.max(height_m);
        let inner = 2.0f64.mul_add(-BORDER_MM, DOCUMENT_SIZE_MM);
        let scale = if longer > 0.0 { inner / longer } else { 1.0 };
        let projection = Self {
            ruler,
            west: extent.west,
            north: extent.north,
            scale,
        };
        let doc_width = 2.0f64.mul_add(BORDER_MM, width_m * scale);
        let doc_height = 2.0f64.mul_add(BORDER_MM, height_m * scale);
        (projection, doc_width, doc_height)
    }

    fn point(&self, c: Coordinate) -> (f64, f64) {
        let x = (c.lon - self.west) * self.ruler.meters_per_degree_lon();
        let y = (self.north - c.lat) * self.ruler.meters_per_degree_lat();
        (
            x.mul_add(self.scale, BORDER_MM),
            y.mul_add(self.scale, BORDER_MM),
        )
    }
}

fn line_width(kind: LayerKind) -> f32 {
    match kind.style().paint {
        Paint::Line { width, .. } => width,
        Paint::Symbol { .. } => 1.0,
    }
}

/// Serialize a route and its cutouts into an overview SVG string.
///
/// Cutouts are drawn as dashed rectangles labelled with their one-based
/// sheet number, the route on top of them, and waypoints as small
/// circles. Styles follow [`LayerKind::style`]; stroke widths given in
/// screen pixels are drawn as tenths of a millimetre.
///
/// # Examples
///
/// ```
/// use mapcutter_core::{Coordinate, Route, TrackLine};
/// use mapcutter_export::{SvgMetadata, overview_svg};
///
/// let route = Route::new(vec![TrackLine::new(vec![
///     Coordinate::new(8.0, 47.0),
///     Coordinate::new(8.1, 47.1),
/// ])])
/// .unwrap();
/// let metadata = SvgMetadata {
///     title: Some("Ridge"),
///     ..SvgMetadata::default()
/// };
/// let svg = overview_svg(&route, &[], &[], &metadata);
/// assert!(svg.contains("<title>Ridge</title>"));
/// assert!(svg.contains("<path"));
/// ```
#[must_use]
pub fn overview_svg(
    route: &Route,
    cutouts: &[Cutout],
    waypoints: &[Waypoint],
    metadata: &SvgMetadata<'_>,
) -> String {
    let extent = cutouts
        .iter()
        .fold(metrics::bounds(route), |acc, c| acc.union(c.extent));
    let (projection, width, height) = Projection::fit(&extent);

    let mut doc = Document::new()
        .set("width", format!("{width:.2}mm"))
        .set("height", format!("{height:.2}mm"))
        .set("viewBox", format!("0 0 {width:.2} {height:.2}"));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(node::Text::new(description)));
    }
    if let Some(options_json) = metadata.options_json {
        let mut options_el = Element::new("mapcutter:options");
        options_el.assign("xmlns:mapcutter", "https://mapcutter.app/ns/1");
        options_el.append(node::Text::new(options_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(options_el);
        doc = doc.add(metadata_el);
    }

    doc = doc.add(cutout_group(&projection, cutouts));
    doc = doc.add(route_group(&projection, route));
    if !waypoints.is_empty() {
        doc = doc.add(waypoint_group(&projection, waypoints));
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

fn cutout_group(projection: &Projection, cutouts: &[Cutout]) -> Group {
    let style = LayerKind::Cutouts.style();
    let width = f64::from(line_width(LayerKind::Cutouts)) / 10.0;
    let dash = match style.paint {
        Paint::Line {
            dash: Some((on, off)),
            ..
        } => format!("{} {}", f64::from(on) * width, f64::from(off) * width),
        _ => "none".to_owned(),
    };

    let mut group = Group::new()
        .set("id", LayerKind::Cutouts.id())
        .set("fill", "none")
        .set("stroke", style.color.hex())
        .set("stroke-opacity", style.opacity)
        .set("stroke-width", width)
        .set("stroke-dasharray", dash);

    for cutout in cutouts {
        let (x0, y0) = projection.point(Coordinate::new(cutout.extent.west, cutout.extent.north));
        let (x1, y1) = projection.point(Coordinate::new(cutout.extent.east, cutout.extent.south));
        group = group.add(
            Rectangle::new()
                .set("x", x0)
                .set("y", y0)
                .set("width", x1 - x0)
                .set("height", y1 - y0),
        );
        group = group.add(
            Text::new(format!("{}", cutout.index + 1))
                .set("x", x0 + 1.5)
                .set("y", y0 + 4.5)
                .set("font-family", "Helvetica, Arial, sans-serif")
                .set("font-size", 4)
                .set("fill", style.color.hex())
                .set("stroke", "none"),
        );
    }
    group
}

fn route_group(projection: &Projection, route: &Route) -> Group {
    let style = LayerKind::Route.style();
    let mut group = Group::new()
        .set("id", LayerKind::Route.id())
        .set("fill", "none")
        .set("stroke", style.color.hex())
        .set("stroke-opacity", style.opacity)
        .set("stroke-width", f64::from(line_width(LayerKind::Route)) / 10.0)
        .set("stroke-linejoin", "round")
        .set("stroke-linecap", "round");

    for line in route.lines() {
        if line.len() < 2 {
            continue;
        }
        let mut points = line.coordinates.iter().map(|&c| projection.point(c));
        let Some(first) = points.next() else {
            continue;
        };
        let data = points.fold(Data::new().move_to(first), |data, p| data.line_to(p));
        group = group.add(Path::new().set("d", data));
    }
    group
}

fn waypoint_group(projection: &Projection, waypoints: &[Waypoint]) -> Group {
    let style = LayerKind::Waypoints.style();
    let mut group = Group::new()
        .set("id", LayerKind::Waypoints.id())
        .set("fill", style.color.hex());
    for waypoint in waypoints {
        let (cx, cy) = projection.point(waypoint.position);
        let mut circle = Circle::new().set("cx", cx).set("cy", cy).set("r", 1.0);
        if let Some(name) = &waypoint.name {
            circle.append(Title::new(name.as_str()));
        }
        group = group.add(circle);
    }
    group
}
