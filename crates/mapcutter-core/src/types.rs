//! Shared types for mapcutter route processing.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};

use crate::parse::TrackFormat;

/// A WGS84 position.
///
/// Longitude and latitude are in degrees, elevation (when the source
/// track carries one) in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Longitude in degrees, east positive.
    pub lon: f64,
    /// Latitude in degrees, north positive.
    pub lat: f64,
    /// Elevation above sea level in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ele: Option<f64>,
}

impl Coordinate {
    /// Create a coordinate without elevation.
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            ele: None,
        }
    }

    /// Create a coordinate with elevation.
    #[must_use]
    pub const fn with_elevation(lon: f64, lat: f64, ele: f64) -> Self {
        Self {
            lon,
            lat,
            ele: Some(ele),
        }
    }

    /// Read a GeoJSON position (`[lon, lat]` or `[lon, lat, ele]`).
    ///
    /// Returns `None` for positions with fewer than two components or
    /// non-finite longitude/latitude.
    #[must_use]
    pub fn from_position(position: &[f64]) -> Option<Self> {
        let (&lon, &lat) = (position.first()?, position.get(1)?);
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        let ele = position.get(2).copied().filter(|e| e.is_finite());
        Some(Self { lon, lat, ele })
    }

    /// Write the coordinate as a GeoJSON position.
    #[must_use]
    pub fn to_position(self) -> Vec<f64> {
        match self.ele {
            Some(ele) => vec![self.lon, self.lat, ele],
            None => vec![self.lon, self.lat],
        }
    }

    /// The coordinate without its elevation, as a 2D `geo` coordinate.
    #[must_use]
    pub const fn xy(self) -> geo::Coord<f64> {
        geo::Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

impl From<geo::Coord<f64>> for Coordinate {
    fn from(c: geo::Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }
}

/// A geographic extent `[west, south, east, north]` in degrees.
///
/// [`Extent::EMPTY`] (`[+inf, +inf, -inf, -inf]`) is the identity for
/// [`include`](Self::include) and [`union`](Self::union).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    /// Minimum longitude.
    pub west: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum longitude.
    pub east: f64,
    /// Maximum latitude.
    pub north: f64,
}

impl Extent {
    /// An extent containing no points.
    pub const EMPTY: Self = Self {
        west: f64::INFINITY,
        south: f64::INFINITY,
        east: f64::NEG_INFINITY,
        north: f64::NEG_INFINITY,
    };

    /// Create an extent from its four edges.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Returns `true` if no point has been included yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.west > self.east || self.south > self.north
    }

    /// Grow the extent to cover `coord`.
    pub fn include(&mut self, coord: Coordinate) {
        self.west = self.west.min(coord.lon);
        self.south = self.south.min(coord.lat);
        self.east = self.east.max(coord.lon);
        self.north = self.north.max(coord.lat);
    }

    /// The smallest extent covering both `self` and `other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }

    /// Returns `true` if `coord` lies inside or on the boundary.
    #[must_use]
    pub fn contains(&self, coord: Coordinate) -> bool {
        (self.west..=self.east).contains(&coord.lon)
            && (self.south..=self.north).contains(&coord.lat)
    }

    /// The midpoint of the extent in degree space.
    #[must_use]
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            0.5 * (self.west + self.east),
            0.5 * (self.south + self.north),
        )
    }

    /// The closed boundary ring NW, NE, SE, SW, NW.
    #[must_use]
    pub const fn ring(&self) -> [Coordinate; 5] {
        let nw = Coordinate::new(self.west, self.north);
        [
            nw,
            Coordinate::new(self.east, self.north),
            Coordinate::new(self.east, self.south),
            Coordinate::new(self.west, self.south),
            nw,
        ]
    }

    /// The extent as a GeoJSON `bbox` member.
    #[must_use]
    pub fn to_bbox(&self) -> Vec<f64> {
        vec![self.west, self.south, self.east, self.north]
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// One continuous line of a track: a GPX track segment, a GPX route,
/// or one part of a GeoJSON/KML (Multi)LineString.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackLine {
    /// Name of the feature the line came from.
    pub name: Option<String>,
    /// Ordered positions along the line.
    pub coordinates: Vec<Coordinate>,
}

impl TrackLine {
    /// Create an unnamed line.
    #[must_use]
    pub const fn new(coordinates: Vec<Coordinate>) -> Self {
        Self {
            name: None,
            coordinates,
        }
    }

    /// Returns the number of positions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.coordinates.len()
    }

    /// Returns `true` if the line has no positions.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Latitude of the middle position, used as the reference latitude
    /// for distance measurements along this line.
    #[must_use]
    pub fn midpoint_latitude(&self) -> Option<f64> {
        self.coordinates.get(self.coordinates.len() / 2).map(|c| c.lat)
    }
}

/// A reduced track: the ordered line geometry a user loaded.
///
/// A route always holds at least one non-empty line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    lines: Vec<TrackLine>,
}

impl Route {
    /// Build a route, dropping lines without positions.
    ///
    /// # Errors
    ///
    /// Returns [`CutterError::EmptyRoute`] if no line has positions.
    pub fn new(lines: Vec<TrackLine>) -> Result<Self, CutterError> {
        let lines: Vec<TrackLine> = lines.into_iter().filter(|l| !l.is_empty()).collect();
        if lines.is_empty() {
            return Err(CutterError::EmptyRoute);
        }
        Ok(Self { lines })
    }

    /// The lines of the route in track order.
    #[must_use]
    pub fn lines(&self) -> &[TrackLine] {
        &self.lines
    }

    /// All positions of all lines, in order.
    pub fn coordinates(&self) -> impl Iterator<Item = &Coordinate> {
        self.lines.iter().flat_map(|l| l.coordinates.iter())
    }

    /// Total number of positions.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.lines.iter().map(TrackLine::len).sum()
    }

    /// Name of the first named line.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.lines.iter().find_map(|l| l.name.as_deref())
    }

    /// Export the route as one LineString feature per line.
    #[must_use]
    pub fn to_feature_collection(&self) -> FeatureCollection {
        feature_collection(
            self.lines
                .iter()
                .map(|line| {
                    let mut properties = JsonObject::new();
                    if let Some(name) = &line.name {
                        properties.insert("name".into(), name.clone().into());
                    }
                    feature(
                        Value::LineString(
                            line.coordinates.iter().map(|c| c.to_position()).collect(),
                        ),
                        properties,
                    )
                })
                .collect(),
        )
    }
}

/// A named point of interest carried by the track file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Position of the point.
    pub position: Coordinate,
    /// Display title.
    pub name: Option<String>,
    /// Symbol name hint from the source file.
    pub symbol: Option<String>,
}

impl Waypoint {
    /// Export as a Point feature with `title` and `symbol` properties.
    #[must_use]
    pub fn to_feature(&self) -> Feature {
        let mut properties = JsonObject::new();
        if let Some(name) = &self.name {
            properties.insert("title".into(), name.clone().into());
        }
        if let Some(symbol) = &self.symbol {
            properties.insert("symbol".into(), symbol.clone().into());
        }
        feature(Value::Point(self.position.to_position()), properties)
    }
}

/// Errors that can occur while loading a track or planning cutouts.
#[derive(Debug, thiserror::Error)]
pub enum CutterError {
    /// The file extension or format tag is not one of gpx, kml, geojson.
    #[error("unsupported track format: {0}")]
    UnsupportedFormat(String),

    /// The track text could not be parsed in the given format.
    #[error("failed to parse {format} track: {message}")]
    Parse {
        /// Format the text was parsed as.
        format: TrackFormat,
        /// Parser diagnostic.
        message: String,
    },

    /// The track contains no LineString or MultiLineString geometry.
    #[error("track contains no line geometry")]
    EmptyRoute,

    /// Print options violate a constraint.
    #[error("invalid print options: {0}")]
    InvalidOptions(String),

    /// The paper format name is not in the catalog.
    #[error("unknown paper format: {0}")]
    UnknownPaperFormat(String),

    /// A bounding box was created without a usable reference latitude.
    #[error("reference latitude must be finite and within [-90, 90], got {0}")]
    InvalidReferenceLatitude(f64),

    /// A measurement was requested on a bounding box with no points.
    #[error("bounding box is empty")]
    EmptyBbox,
}

/// Build a feature from a geometry value and properties.
pub(crate) fn feature(value: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Wrap features in a collection.
pub(crate) const fn feature_collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_from_position_with_and_without_elevation() {
        assert_eq!(
            Coordinate::from_position(&[8.0, 47.0]),
            Some(Coordinate::new(8.0, 47.0))
        );
        assert_eq!(
            Coordinate::from_position(&[8.0, 47.0, 512.0]),
            Some(Coordinate::with_elevation(8.0, 47.0, 512.0))
        );
        assert_eq!(Coordinate::from_position(&[8.0]), None);
        assert_eq!(Coordinate::from_position(&[f64::NAN, 47.0]), None);
    }

    #[test]
    fn coordinate_position_keeps_elevation() {
        assert_eq!(Coordinate::new(1.0, 2.0).to_position(), vec![1.0, 2.0]);
        assert_eq!(
            Coordinate::with_elevation(1.0, 2.0, 3.0).to_position(),
            vec![1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn empty_extent_grows_to_point() {
        let mut extent = Extent::EMPTY;
        assert!(extent.is_empty());
        extent.include(Coordinate::new(8.5, 47.3));
        assert!(!extent.is_empty());
        assert_eq!(extent, Extent::new(8.5, 47.3, 8.5, 47.3));
    }

    #[test]
    fn extent_union_and_contains() {
        let a = Extent::new(0.0, 0.0, 1.0, 1.0);
        let b = Extent::new(2.0, -1.0, 3.0, 0.5);
        let u = a.union(b);
        assert_eq!(u, Extent::new(0.0, -1.0, 3.0, 1.0));
        assert!(u.contains(Coordinate::new(1.5, 0.0)));
        assert!(u.contains(Coordinate::new(3.0, 1.0)));
        assert!(!u.contains(Coordinate::new(3.1, 0.0)));
        assert_eq!(Extent::EMPTY.union(a), a);
    }

    #[test]
    fn extent_ring_is_closed_clockwise_from_northwest() {
        let ring = Extent::new(0.0, 0.0, 2.0, 1.0).ring();
        assert_eq!(ring[0], Coordinate::new(0.0, 1.0));
        assert_eq!(ring[1], Coordinate::new(2.0, 1.0));
        assert_eq!(ring[2], Coordinate::new(2.0, 0.0));
        assert_eq!(ring[3], Coordinate::new(0.0, 0.0));
        assert_eq!(ring[4], ring[0]);
    }

    #[test]
    fn route_drops_empty_lines() {
        let route = Route::new(vec![
            TrackLine::new(vec![]),
            TrackLine::new(vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)]),
        ])
        .unwrap();
        assert_eq!(route.lines().len(), 1);
        assert_eq!(route.point_count(), 2);
    }

    #[test]
    fn route_without_positions_is_empty_route() {
        let result = Route::new(vec![TrackLine::new(vec![])]);
        assert!(matches!(result, Err(CutterError::EmptyRoute)));
    }

    #[test]
    fn route_name_is_first_named_line() {
        let route = Route::new(vec![
            TrackLine::new(vec![Coordinate::new(0.0, 0.0)]),
            TrackLine {
                name: Some("Stage 2".into()),
                coordinates: vec![Coordinate::new(1.0, 1.0)],
            },
        ])
        .unwrap();
        assert_eq!(route.name(), Some("Stage 2"));
    }

    #[test]
    fn route_feature_collection_has_one_linestring_per_line() {
        let route = Route::new(vec![TrackLine::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::with_elevation(0.0, 1.0, 100.0),
        ])])
        .unwrap();
        let fc = route.to_feature_collection();
        assert_eq!(fc.features.len(), 1);
        let geometry = fc.features[0].geometry.as_ref().unwrap();
        assert_eq!(
            geometry.value,
            Value::LineString(vec![vec![0.0, 0.0], vec![0.0, 1.0, 100.0]])
        );
    }

    #[test]
    fn error_display() {
        assert_eq!(
            CutterError::EmptyRoute.to_string(),
            "track contains no line geometry"
        );
        assert_eq!(
            CutterError::UnsupportedFormat("fit".into()).to_string(),
            "unsupported track format: fit"
        );
    }
}
