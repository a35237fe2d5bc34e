//! The loaded track and everything derived from it.
//!
//! A [`Session`] owns the current route and options. Cutouts, the
//! milemarker layer and slope sections are recomputed whenever their
//! inputs change, so readers always see a consistent state. Failed
//! updates leave the session untouched.

use crate::caption::{self, RouteDetails, SheetCaption};
use crate::cutout::{self, Cutout};
use crate::layer::{Layer, LayerKind};
use crate::metrics;
use crate::options::{MilemarkerOptions, PrintOptions, SlopeOptions};
use crate::parse::{self, TrackFormat};
use crate::slope::{self, SlopeSection};
use crate::types::{CutterError, Extent, Route, Waypoint, feature_collection};

/// A loaded track with its derived cutouts and layers.
#[derive(Debug, Clone)]
pub struct Session {
    name: String,
    route: Route,
    waypoints: Vec<Waypoint>,
    print: PrintOptions,
    milemarker_options: MilemarkerOptions,
    slope_options: Option<SlopeOptions>,
    cutouts: Vec<Cutout>,
    milemarkers: geojson::FeatureCollection,
    slopes: Vec<SlopeSection>,
}

/// Route, waypoints and name read from a track file.
struct Loaded {
    name: String,
    route: Route,
    waypoints: Vec<Waypoint>,
}

fn load(raw: &str, filename: &str) -> Result<Loaded, CutterError> {
    let format = TrackFormat::from_filename(filename)?;
    let collection = parse::parse(format, raw)?;
    let route = parse::reduce(&collection)?;
    Ok(Loaded {
        name: parse::route_name(&collection, filename),
        waypoints: parse::waypoints(&collection),
        route,
    })
}

impl Session {
    /// Load a track file and plan it with `options`.
    ///
    /// The format is detected from the extension of `filename`.
    ///
    /// # Errors
    ///
    /// Returns [`CutterError::UnsupportedFormat`], [`CutterError::Parse`]
    /// or [`CutterError::EmptyRoute`] if the track cannot be loaded, or
    /// an options error if `options` fail validation.
    pub fn open(raw: &str, filename: &str, options: PrintOptions) -> Result<Self, CutterError> {
        let Loaded {
            name,
            route,
            waypoints,
        } = load(raw, filename)?;
        Self::from_route(name, route, waypoints, options)
    }

    /// Build a session around an already reduced route.
    ///
    /// # Errors
    ///
    /// Returns an options error if `options` fail validation.
    pub fn from_route(
        name: String,
        route: Route,
        waypoints: Vec<Waypoint>,
        options: PrintOptions,
    ) -> Result<Self, CutterError> {
        let cutouts = cutout::plan(&route, &options)?;
        tracing::info!(
            name = %name,
            lines = route.lines().len(),
            points = route.point_count(),
            waypoints = waypoints.len(),
            "loaded route"
        );
        Ok(Self {
            name,
            route,
            waypoints,
            print: options,
            milemarker_options: MilemarkerOptions::default(),
            slope_options: None,
            cutouts,
            milemarkers: feature_collection(Vec::new()),
            slopes: Vec::new(),
        })
    }

    /// Replace the route with a newly loaded track, keeping all options.
    ///
    /// # Errors
    ///
    /// Same as [`Session::open`]. On error the session is unchanged.
    pub fn load_track(&mut self, raw: &str, filename: &str) -> Result<(), CutterError> {
        let loaded = load(raw, filename)?;
        let cutouts = cutout::plan(&loaded.route, &self.print)?;
        self.name = loaded.name;
        self.route = loaded.route;
        self.waypoints = loaded.waypoints;
        self.cutouts = cutouts;
        self.milemarkers = metrics::milemarkers(&self.route, self.milemarker_options.interval_km);
        self.slopes = self
            .slope_options
            .as_ref()
            .map(|options| slope::slopes(&self.route, options))
            .unwrap_or_default();
        tracing::info!(name = %self.name, sheets = self.cutouts.len(), "replaced route");
        Ok(())
    }

    /// Replan the cutouts with new print options.
    ///
    /// # Errors
    ///
    /// Returns an options error if `options` fail validation. On error
    /// the previous options and cutouts are kept.
    pub fn update_cutouts(&mut self, options: PrintOptions) -> Result<(), CutterError> {
        self.cutouts = cutout::plan(&self.route, &options)?;
        self.print = options;
        Ok(())
    }

    /// Regenerate milemarkers every `interval_km`. Zero clears the layer.
    pub fn update_milemarkers(&mut self, interval_km: f64) {
        self.milemarker_options = MilemarkerOptions { interval_km };
        self.milemarkers = metrics::milemarkers(&self.route, interval_km);
    }

    /// Detect slope sections with `options`.
    pub fn update_slopes(&mut self, options: SlopeOptions) {
        self.slopes = slope::slopes(&self.route, &options);
        self.slope_options = Some(options);
    }

    /// Display name of the route.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current route.
    #[must_use]
    pub const fn route(&self) -> &Route {
        &self.route
    }

    /// Points of interest from the track file.
    #[must_use]
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Current print options.
    #[must_use]
    pub const fn options(&self) -> &PrintOptions {
        &self.print
    }

    /// Planned sheets in route order.
    #[must_use]
    pub fn cutouts(&self) -> &[Cutout] {
        &self.cutouts
    }

    /// Detected slope sections.
    #[must_use]
    pub fn slopes(&self) -> &[SlopeSection] {
        &self.slopes
    }

    /// Route summary for display.
    #[must_use]
    pub fn details(&self) -> RouteDetails {
        RouteDetails::new(&self.name, &self.route, &self.cutouts)
    }

    /// One caption per cutout.
    #[must_use]
    pub fn captions(&self) -> Vec<SheetCaption> {
        caption::sheet_captions(&self.route, &self.cutouts)
    }

    /// Extent covering every cutout, or the route bounds when there are
    /// none.
    #[must_use]
    pub fn cutout_bounds(&self) -> Extent {
        let extent = cutout::cutouts_extent(&self.cutouts);
        if extent.is_empty() {
            metrics::bounds(&self.route)
        } else {
            extent
        }
    }

    /// Data of one layer.
    #[must_use]
    pub fn layer(&self, kind: LayerKind) -> Layer {
        let data = match kind {
            LayerKind::Route => self.route.to_feature_collection(),
            LayerKind::Cutouts => cutout::to_feature_collection(&self.cutouts),
            LayerKind::Milemarkers => self.milemarkers.clone(),
            LayerKind::Waypoints => {
                feature_collection(self.waypoints.iter().map(Waypoint::to_feature).collect())
            }
            LayerKind::Slopes => slope::slope_features(&self.route, &self.slopes),
        };
        Layer { kind, data }
    }

    /// Every layer, bottom to top.
    #[must_use]
    pub fn layers(&self) -> Vec<Layer> {
        LayerKind::ALL.iter().map(|&kind| self.layer(kind)).collect()
    }
}
