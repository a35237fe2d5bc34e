//! Human-readable route summary and per-sheet captions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cutout::Cutout;
use crate::metrics::{self, ElevationStats};
use crate::types::Route;

/// Placeholder for values the track does not provide.
pub const UNKNOWN: &str = "unknown";

/// Format `value` with `decimals` fraction digits followed by `unit`,
/// or [`UNKNOWN`] when absent.
#[must_use]
pub fn round_with_unit(value: Option<f64>, decimals: usize, unit: &str) -> String {
    value.map_or_else(|| UNKNOWN.to_owned(), |v| format!("{v:.decimals$}{unit}"))
}

/// Summary figures of a loaded route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDetails {
    /// Display name of the route.
    pub name: String,
    /// Total length in km.
    pub distance_km: f64,
    /// Elevation summary, if the track has elevation.
    pub elevation: Option<ElevationStats>,
    /// Number of planned sheets.
    pub sheets: usize,
}

impl RouteDetails {
    /// Compute the summary of `route` planned into `cutouts`.
    #[must_use]
    pub fn new(name: &str, route: &Route, cutouts: &[Cutout]) -> Self {
        Self {
            name: name.to_owned(),
            distance_km: metrics::total_distance(route),
            elevation: metrics::elevation(route),
            sheets: cutouts.len(),
        }
    }

    /// Track length, e.g. `12.34km`.
    #[must_use]
    pub fn track_length(&self) -> String {
        round_with_unit(Some(self.distance_km), 2, "km")
    }

    /// Ascent and descent, e.g. `Δ120m, ∇80m`.
    #[must_use]
    pub fn ascent_descent(&self) -> String {
        format!(
            "Δ{}, ∇{}",
            round_with_unit(self.elevation.map(|e| e.ascent as f64), 0, "m"),
            round_with_unit(self.elevation.map(|e| e.descent as f64), 0, "m"),
        )
    }

    /// Elevation range, e.g. `⤓400m, ⤒1250m`.
    #[must_use]
    pub fn min_max_elevation(&self) -> String {
        format!(
            "⤓{}, ⤒{}",
            round_with_unit(self.elevation.map(|e| e.min as f64), 0, "m"),
            round_with_unit(self.elevation.map(|e| e.max as f64), 0, "m"),
        )
    }
}

impl fmt::Display for RouteDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "  length:     {}", self.track_length())?;
        writeln!(f, "  climb:      {}", self.ascent_descent())?;
        writeln!(f, "  elevation:  {}", self.min_max_elevation())?;
        write!(f, "  map sheets: {}", self.sheets)
    }
}

/// Caption data for one printed sheet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SheetCaption {
    /// One-based sheet number.
    pub number: usize,
    /// Total number of sheets.
    pub total: usize,
    /// Route length on this sheet in km.
    pub inside_km: f64,
    /// Route position where the route leaves this sheet, in km.
    pub intermediate_km: f64,
    /// Total route length in km.
    pub total_km: f64,
}

impl fmt::Display for SheetCaption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Map {} of {} · {:.2}km · {:.2}km of {:.2}km total",
            self.number, self.total, self.inside_km, self.intermediate_km, self.total_km
        )
    }
}

/// Captions for every cutout, in sheet order.
#[must_use]
pub fn sheet_captions(route: &Route, cutouts: &[Cutout]) -> Vec<SheetCaption> {
    let total_km = metrics::total_distance(route);
    cutouts
        .iter()
        .enumerate()
        .map(|(i, cutout)| {
            let (inside_km, intermediate_km) = metrics::distance_in_bounds(&cutout.extent, route);
            SheetCaption {
                number: i + 1,
                total: cutouts.len(),
                inside_km,
                intermediate_km,
                total_km,
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Coordinate, Extent, TrackLine};

    fn route(with_elevation: bool) -> Route {
        let ele = |e: f64| with_elevation.then_some(e);
        Route::new(vec![TrackLine::new(vec![
            Coordinate { lon: 8.0, lat: 47.0, ele: ele(400.0) },
            Coordinate { lon: 8.0, lat: 47.01, ele: ele(520.0) },
            Coordinate { lon: 8.0, lat: 47.02, ele: ele(440.0) },
        ])])
        .unwrap()
    }

    #[test]
    fn round_with_unit_formats_or_reports_unknown() {
        assert_eq!(round_with_unit(Some(12.345_6), 2, "km"), "12.35km");
        assert_eq!(round_with_unit(Some(120.0), 0, "m"), "120m");
        assert_eq!(round_with_unit(None, 2, "km"), "unknown");
    }

    #[test]
    fn details_with_elevation() {
        let details = RouteDetails::new("Test", &route(true), &[]);
        assert_eq!(details.ascent_descent(), "Δ120m, ∇80m");
        assert_eq!(details.min_max_elevation(), "⤓400m, ⤒520m");
        assert!(details.track_length().ends_with("km"));
    }

    #[test]
    fn details_without_elevation_are_unknown() {
        let details = RouteDetails::new("Test", &route(false), &[]);
        assert_eq!(details.ascent_descent(), "Δunknown, ∇unknown");
        assert!(details.to_string().contains("map sheets: 0"));
    }

    #[test]
    fn caption_format() {
        let caption = SheetCaption {
            number: 3,
            total: 7,
            inside_km: 36.7,
            intermediate_km: 123.4,
            total_km: 2156.5,
        };
        assert_eq!(
            caption.to_string(),
            "Map 3 of 7 · 36.70km · 123.40km of 2156.50km total"
        );
    }

    #[test]
    fn captions_per_cutout() {
        let route = route(false);
        let cutout = Cutout {
            index: 0,
            extent: Extent::new(7.9, 46.9, 8.1, 47.1),
            width: 0.0,
            height: 0.0,
        };
        let captions = sheet_captions(&route, &[cutout]);
        assert_eq!(captions.len(), 1);
        let total = metrics::total_distance(&route);
        assert!((captions[0].inside_km - total).abs() < 1e-9);
        assert!((captions[0].intermediate_km - total).abs() < 1e-9);
        assert_eq!(captions[0].number, 1);
    }
}
