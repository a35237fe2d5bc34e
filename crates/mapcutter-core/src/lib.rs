//! mapcutter-core: Pure cutout planning and route analysis (sans-IO).
//!
//! Turns a GPS track into a sequence of print-sized map sheets through:
//! parse -> reduce to lines -> grow bounding boxes along the route ->
//! resize each box to one sheet's ground size.
//!
//! Alongside the planner it computes route metrics (distance, climb,
//! milemarkers, route length per sheet) and steep slope sections.
//!
//! This crate has **no I/O dependencies**: it takes track text and
//! returns structured data. Rendering and document output live in
//! `mapcutter-print` and `mapcutter-export`.

pub mod bbox;
pub mod caption;
pub mod cutout;
pub mod layer;
pub mod metrics;
pub mod options;
pub mod paper;
pub mod parse;
pub mod ruler;
pub mod session;
pub mod slope;
pub mod types;

pub use bbox::GeoBbox;
pub use caption::{RouteDetails, SheetCaption};
pub use cutout::Cutout;
pub use layer::{Layer, LayerKind, LayerStyle, Paint, Rgb};
pub use metrics::ElevationStats;
pub use options::{MilemarkerOptions, PrintOptions, SlopeOptions};
pub use paper::{Orientation, PaperFormat};
pub use parse::TrackFormat;
pub use ruler::Ruler;
pub use session::Session;
pub use slope::SlopeSection;
pub use types::{Coordinate, CutterError, Extent, Route, TrackLine, Waypoint};

/// Load a track and plan its sheets in one step.
///
/// For callers that only need the cutouts; [`Session::open`] also
/// keeps the route, waypoints and derived layers.
///
/// # Errors
///
/// Returns [`CutterError::UnsupportedFormat`] for an unknown file
/// extension, [`CutterError::Parse`] for malformed track text,
/// [`CutterError::EmptyRoute`] if the track has no lines, or an options
/// error if `options` fail validation.
pub fn plan_track(
    raw: &str,
    filename: &str,
    options: &PrintOptions,
) -> Result<Vec<Cutout>, CutterError> {
    let format = TrackFormat::from_filename(filename)?;
    let collection = parse::parse(format, raw)?;
    let route = parse::reduce(&collection)?;
    cutout::plan(&route, options)
}
