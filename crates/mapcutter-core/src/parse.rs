//! Track file adapter: GPX, KML and GeoJSON text to GeoJSON features,
//! and reduction of those features to a [`Route`].
//!
//! Parsing is a pure function of the raw text and a format tag. The
//! rest of the crate only ever sees the reduced line geometry and the
//! waypoint list.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, Value};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::types::{
    Coordinate, CutterError, Route, TrackLine, Waypoint, feature, feature_collection,
};

/// Supported track file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackFormat {
    /// GPS Exchange Format.
    Gpx,
    /// Keyhole Markup Language.
    Kml,
    /// GeoJSON (RFC 7946).
    #[serde(rename = "geojson")]
    GeoJson,
}

impl TrackFormat {
    /// Look up a format by file extension (case-insensitive, without
    /// the leading dot).
    ///
    /// # Errors
    ///
    /// Returns [`CutterError::UnsupportedFormat`] for any other tag.
    pub fn from_extension(ext: &str) -> Result<Self, CutterError> {
        match ext.to_ascii_lowercase().as_str() {
            "gpx" => Ok(Self::Gpx),
            "kml" => Ok(Self::Kml),
            "geojson" => Ok(Self::GeoJson),
            _ => Err(CutterError::UnsupportedFormat(ext.to_owned())),
        }
    }

    /// Detect the format from a file name's extension.
    ///
    /// # Errors
    ///
    /// Returns [`CutterError::UnsupportedFormat`] if the name has no
    /// extension or an unsupported one.
    pub fn from_filename(filename: &str) -> Result<Self, CutterError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| CutterError::UnsupportedFormat(filename.to_owned()))?;
        Self::from_extension(ext)
    }

    /// Lowercase format tag.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gpx => "gpx",
            Self::Kml => "kml",
            Self::GeoJson => "geojson",
        }
    }
}

impl fmt::Display for TrackFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrackFormat {
    type Err = CutterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s)
    }
}

/// Convert raw track text to a GeoJSON feature collection.
///
/// GPX tracks become LineString (one segment) or MultiLineString
/// features, GPX routes LineString features and waypoints Point
/// features carrying `name` and `sym`. KML placemarks become LineString,
/// MultiLineString or Point features. A GeoJSON Feature or Geometry is
/// wrapped in a collection.
///
/// # Errors
///
/// Returns [`CutterError::Parse`] if the text is not valid in `format`.
pub fn parse(format: TrackFormat, raw: &str) -> Result<FeatureCollection, CutterError> {
    let collection = match format {
        TrackFormat::Gpx => parse_gpx(raw),
        TrackFormat::Kml => parse_kml(raw),
        TrackFormat::GeoJson => parse_geojson(raw),
    }
    .map_err(|message| CutterError::Parse { format, message })?;
    tracing::debug!(%format, features = collection.features.len(), "parsed track");
    Ok(collection)
}

/// Keep only the line geometry of a collection.
///
/// Every LineString feature becomes one [`TrackLine`]; every part of a
/// MultiLineString becomes its own line carrying the feature's name.
///
/// # Errors
///
/// Returns [`CutterError::EmptyRoute`] if no line with coordinates
/// remains.
pub fn reduce(collection: &FeatureCollection) -> Result<Route, CutterError> {
    let mut lines = Vec::new();
    for feature in &collection.features {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let name = feature_name(feature);
        match &geometry.value {
            Value::LineString(positions) => lines.push(track_line(name, positions)),
            Value::MultiLineString(parts) => {
                lines.extend(parts.iter().map(|p| track_line(name.clone(), p)));
            }
            _ => {}
        }
    }
    let route = Route::new(lines)?;
    tracing::debug!(
        features = collection.features.len(),
        lines = route.lines().len(),
        points = route.point_count(),
        "reduced track"
    );
    Ok(route)
}

/// Point features of a collection as waypoints.
#[must_use]
pub fn waypoints(collection: &FeatureCollection) -> Vec<Waypoint> {
    collection
        .features
        .iter()
        .filter_map(|feature| {
            let Value::Point(position) = &feature.geometry.as_ref()?.value else {
                return None;
            };
            Some(Waypoint {
                position: Coordinate::from_position(position)?,
                name: feature_name(feature),
                symbol: string_property(feature, "sym"),
            })
        })
        .collect()
}

/// Display name of a track: the first line feature's `name`, falling
/// back to the file stem of `filename`.
#[must_use]
pub fn route_name(collection: &FeatureCollection, filename: &str) -> String {
    collection
        .features
        .iter()
        .filter(|feature| {
            feature.geometry.as_ref().is_some_and(|g| {
                matches!(g.value, Value::LineString(_) | Value::MultiLineString(_))
            })
        })
        .find_map(feature_name)
        .unwrap_or_else(|| file_stem(filename))
}

/// File name without directory and last extension.
#[must_use]
pub fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename)
        .to_owned()
}

fn track_line(name: Option<String>, positions: &[Vec<f64>]) -> TrackLine {
    TrackLine {
        name,
        coordinates: positions
            .iter()
            .filter_map(|p| Coordinate::from_position(p))
            .collect(),
    }
}

fn feature_name(feature: &Feature) -> Option<String> {
    string_property(feature, "name")
}

fn string_property(feature: &Feature, key: &str) -> Option<String> {
    feature
        .property(key)
        .and_then(|value| value.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn named(name: Option<&String>) -> JsonObject {
    let mut properties = JsonObject::new();
    if let Some(name) = name {
        properties.insert("name".into(), name.clone().into());
    }
    properties
}

/// Line value for one or more parts.
fn line_value(mut parts: Vec<Vec<Vec<f64>>>) -> Value {
    if parts.len() == 1 {
        Value::LineString(parts.remove(0))
    } else {
        Value::MultiLineString(parts)
    }
}

// --- GPX ---

fn parse_gpx(raw: &str) -> Result<FeatureCollection, String> {
    let gpx = gpx::read(raw.as_bytes()).map_err(|e| e.to_string())?;
    let mut features = Vec::new();

    for track in &gpx.tracks {
        let parts: Vec<Vec<Vec<f64>>> = track
            .segments
            .iter()
            .map(|segment| segment.points.iter().map(gpx_position).collect())
            .collect();
        if parts.is_empty() {
            continue;
        }
        features.push(feature(line_value(parts), named(track.name.as_ref())));
    }

    for route in &gpx.routes {
        let positions = route.points.iter().map(gpx_position).collect();
        features.push(feature(
            Value::LineString(positions),
            named(route.name.as_ref()),
        ));
    }

    for waypoint in &gpx.waypoints {
        let mut properties = named(waypoint.name.as_ref());
        if let Some(symbol) = &waypoint.symbol {
            properties.insert("sym".into(), symbol.clone().into());
        }
        features.push(feature(Value::Point(gpx_position(waypoint)), properties));
    }

    Ok(feature_collection(features))
}

fn gpx_position(waypoint: &gpx::Waypoint) -> Vec<f64> {
    let point = waypoint.point();
    let coordinate = Coordinate {
        lon: point.x(),
        lat: point.y(),
        ele: waypoint.elevation,
    };
    coordinate.to_position()
}

// --- KML ---

fn parse_kml(raw: &str) -> Result<FeatureCollection, String> {
    let document = Document::parse(raw).map_err(|e| e.to_string())?;
    let mut features = Vec::new();

    for placemark in document
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Placemark")
    {
        let name = child_text(placemark, "name");
        let mut lines = Vec::new();

        for geometry in placemark.descendants().filter(Node::is_element) {
            match geometry.tag_name().name() {
                "LineString" => {
                    let positions = kml_coordinates(geometry)?;
                    if !positions.is_empty() {
                        lines.push(positions);
                    }
                }
                "Point" => {
                    if let Some(position) = kml_coordinates(geometry)?.into_iter().next() {
                        features.push(feature(Value::Point(position), named(name.as_ref())));
                    }
                }
                _ => {}
            }
        }

        if !lines.is_empty() {
            features.push(feature(line_value(lines), named(name.as_ref())));
        }
    }

    Ok(feature_collection(features))
}

fn child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
        .and_then(|n| n.text())
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

/// Read a `<coordinates>` child: whitespace-separated `lon,lat[,ele]`.
fn kml_coordinates(geometry: Node<'_, '_>) -> Result<Vec<Vec<f64>>, String> {
    let Some(text) = child_text(geometry, "coordinates") else {
        return Ok(Vec::new());
    };
    text.split_whitespace()
        .map(|tuple| {
            tuple
                .split(',')
                .map(|v| {
                    v.trim()
                        .parse::<f64>()
                        .map_err(|e| format!("invalid coordinate {tuple:?}: {e}"))
                })
                .collect::<Result<Vec<f64>, String>>()
                .and_then(|position| {
                    if position.len() < 2 {
                        Err(format!("coordinate {tuple:?} needs longitude and latitude"))
                    } else {
                        Ok(position)
                    }
                })
        })
        .collect()
}

// --- GeoJSON ---

fn parse_geojson(raw: &str) -> Result<FeatureCollection, String> {
    let geojson: GeoJson = raw.parse().map_err(|e: geojson::Error| e.to_string())?;
    Ok(match geojson {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(feature) => feature_collection(vec![feature]),
        GeoJson::Geometry(geometry) => feature_collection(vec![Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }]),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <wpt lat="47.05" lon="8.05"><name>Hut</name><sym>Lodging</sym></wpt>
  <trk>
    <name>Ridge Walk</name>
    <trkseg>
      <trkpt lat="47.0" lon="8.0"><ele>500</ele></trkpt>
      <trkpt lat="47.01" lon="8.0"><ele>520</ele></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="47.02" lon="8.0"><ele>540</ele></trkpt>
      <trkpt lat="47.03" lon="8.0"><ele>530</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    const KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>Lakeside</name>
      <LineString>
        <coordinates>
          8.0,47.0,400 8.01,47.0,405
          8.02,47.01,410
        </coordinates>
      </LineString>
    </Placemark>
    <Placemark>
      <name>Viewpoint</name>
      <Point><coordinates>8.03,47.02</coordinates></Point>
    </Placemark>
  </Document>
</kml>"#;

    // --- Format detection tests ---

    #[test]
    fn format_from_filename_is_case_insensitive() {
        assert_eq!(TrackFormat::from_filename("tour.GPX").unwrap(), TrackFormat::Gpx);
        assert_eq!(TrackFormat::from_filename("a/b.kml").unwrap(), TrackFormat::Kml);
        assert_eq!(
            TrackFormat::from_filename("x.geojson").unwrap(),
            TrackFormat::GeoJson
        );
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        assert!(matches!(
            TrackFormat::from_filename("ride.fit"),
            Err(CutterError::UnsupportedFormat(ext)) if ext == "fit"
        ));
        assert!(matches!(
            TrackFormat::from_filename("README"),
            Err(CutterError::UnsupportedFormat(_))
        ));
    }

    // --- GPX tests ---

    #[test]
    fn gpx_track_segments_become_multilinestring() {
        let collection = parse(TrackFormat::Gpx, GPX).unwrap();
        assert_eq!(collection.features.len(), 2);
        let value = &collection.features[0].geometry.as_ref().unwrap().value;
        assert!(matches!(value, Value::MultiLineString(parts) if parts.len() == 2));
    }

    #[test]
    fn gpx_reduces_to_one_line_per_segment() {
        let collection = parse(TrackFormat::Gpx, GPX).unwrap();
        let route = reduce(&collection).unwrap();
        assert_eq!(route.lines().len(), 2);
        assert_eq!(route.point_count(), 4);
        assert_eq!(route.lines()[1].coordinates[0].ele, Some(540.0));
        assert_eq!(route.name(), Some("Ridge Walk"));
    }

    #[test]
    fn gpx_waypoints_carry_name_and_symbol() {
        let collection = parse(TrackFormat::Gpx, GPX).unwrap();
        let waypoints = waypoints(&collection);
        assert_eq!(waypoints.len(), 1);
        assert_eq!(waypoints[0].name.as_deref(), Some("Hut"));
        assert_eq!(waypoints[0].symbol.as_deref(), Some("Lodging"));
        assert!((waypoints[0].position.lon - 8.05).abs() < 1e-12);
    }

    #[test]
    fn malformed_gpx_is_parse_error() {
        let result = parse(TrackFormat::Gpx, "<gpx><trk>");
        assert!(matches!(
            result,
            Err(CutterError::Parse {
                format: TrackFormat::Gpx,
                ..
            })
        ));
    }

    // --- KML tests ---

    #[test]
    fn kml_placemarks_become_features() {
        let collection = parse(TrackFormat::Kml, KML).unwrap();
        let route = reduce(&collection).unwrap();
        assert_eq!(route.point_count(), 3);
        assert_eq!(route.lines()[0].coordinates[2].ele, Some(410.0));
        let waypoints = waypoints(&collection);
        assert_eq!(waypoints.len(), 1);
        assert_eq!(waypoints[0].name.as_deref(), Some("Viewpoint"));
    }

    #[test]
    fn kml_bad_coordinate_is_parse_error() {
        let kml = r"<kml><Placemark><LineString><coordinates>8.0,abc</coordinates></LineString></Placemark></kml>";
        assert!(parse(TrackFormat::Kml, kml).is_err());
    }

    // --- GeoJSON tests ---

    #[test]
    fn geojson_geometry_is_wrapped() {
        let raw = r#"{"type": "LineString", "coordinates": [[8.0, 47.0], [8.0, 47.1]]}"#;
        let collection = parse(TrackFormat::GeoJson, raw).unwrap();
        assert_eq!(collection.features.len(), 1);
        assert_eq!(reduce(&collection).unwrap().point_count(), 2);
    }

    #[test]
    fn geojson_points_only_is_empty_route() {
        let raw = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [8.0, 47.0]}}
        ]}"#;
        let collection = parse(TrackFormat::GeoJson, raw).unwrap();
        assert!(matches!(reduce(&collection), Err(CutterError::EmptyRoute)));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        assert!(matches!(
            parse(TrackFormat::GeoJson, "{not json"),
            Err(CutterError::Parse { .. })
        ));
    }

    // --- Naming tests ---

    #[test]
    fn route_name_prefers_line_feature_name() {
        let collection = parse(TrackFormat::Gpx, GPX).unwrap();
        assert_eq!(route_name(&collection, "x/tour.gpx"), "Ridge Walk");
    }

    #[test]
    fn route_name_falls_back_to_file_stem() {
        let raw = r#"{"type": "LineString", "coordinates": [[8.0, 47.0], [8.0, 47.1]]}"#;
        let collection = parse(TrackFormat::GeoJson, raw).unwrap();
        assert_eq!(route_name(&collection, "tracks/alps.2024.geojson"), "alps.2024");
    }
}
