//! Route metrics: length, elevation summary, bounds, milemarkers and
//! the share of the route inside one cutout.
//!
//! Every line is measured with its own [`Ruler`] at the line's midpoint
//! latitude, so all functions here agree with [`total_distance`] to
//! floating point precision.

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::Line;
use geojson::{FeatureCollection, JsonObject, Value};
use serde::{Deserialize, Serialize};

use crate::ruler::Ruler;
use crate::types::{Coordinate, Extent, Route, TrackLine, feature, feature_collection};

/// Interior milemarkers closer than this to the route end (km) are
/// replaced by the end marker.
const END_MARKER_TOLERANCE_KM: f64 = 0.001;

/// Ruler for measurements along `line`.
#[must_use]
pub fn line_ruler(line: &TrackLine) -> Ruler {
    Ruler::new(line.midpoint_latitude().unwrap_or_default())
}

/// Total route length in kilometers.
#[must_use]
pub fn total_distance(route: &Route) -> f64 {
    route
        .lines()
        .iter()
        .map(|line| line_ruler(line).line_distance(&line.coordinates))
        .sum::<f64>()
        / 1000.0
}

/// The `[w, s, e, n]` extent of all route coordinates.
#[must_use]
pub fn bounds(route: &Route) -> Extent {
    let mut extent = Extent::EMPTY;
    for &coord in route.coordinates() {
        extent.include(coord);
    }
    extent
}

/// Elevation summary in whole meters (truncated toward zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevationStats {
    /// Sum of all elevation gains.
    pub ascent: i64,
    /// Sum of all elevation losses, as a positive number.
    pub descent: i64,
    /// Lowest elevation.
    pub min: i64,
    /// Highest elevation.
    pub max: i64,
}

/// Ascent, descent and elevation range of the route.
///
/// Returns `None` when the first coordinate carries no elevation.
/// Coordinates without elevation further along contribute nothing, and
/// no delta is taken across the gap between two lines.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn elevation(route: &Route) -> Option<ElevationStats> {
    route.coordinates().next()?.ele?;

    let (mut ascent, mut descent) = (0.0_f64, 0.0_f64);
    let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
    for line in route.lines() {
        let mut previous: Option<f64> = None;
        for ele in line.coordinates.iter().filter_map(|c| c.ele) {
            if let Some(previous) = previous {
                let delta = ele - previous;
                if delta > 0.0 {
                    ascent += delta;
                } else {
                    descent -= delta;
                }
            }
            min = min.min(ele);
            max = max.max(ele);
            previous = Some(ele);
        }
    }

    Some(ElevationStats {
        ascent: ascent as i64,
        descent: descent as i64,
        min: min as i64,
        max: max as i64,
    })
}

/// Linear interpolation between two coordinates in degree space.
///
/// Elevation is interpolated when both ends carry one.
#[must_use]
pub fn interpolate(a: Coordinate, b: Coordinate, t: f64) -> Coordinate {
    Coordinate {
        lon: lerp(a.lon, b.lon, t),
        lat: lerp(a.lat, b.lat, t),
        ele: a.ele.zip(b.ele).map(|(ea, eb)| lerp(ea, eb, t)),
    }
}

/// Point features every `interval_km` along the route, titled with the
/// distance from the start in km.
///
/// A marker titled `0` sits on the first coordinate and one titled with
/// the truncated total distance on the last. An interval of zero or
/// less yields an empty collection.
#[must_use]
pub fn milemarkers(route: &Route, interval_km: f64) -> FeatureCollection {
    if !interval_km.is_finite() || interval_km <= 0.0 {
        return feature_collection(Vec::new());
    }
    let total_km = total_distance(route);
    let interval_m = interval_km * 1000.0;

    let mut markers = Vec::new();
    if let Some(&start) = route.coordinates().next() {
        markers.push(marker(start, 0.0));
    }

    let mut travelled = 0.0;
    let mut count = 1_u32;
    for line in route.lines() {
        let ruler = line_ruler(line);
        for pair in line.coordinates.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let d = ruler.distance(a, b);
            loop {
                let next = f64::from(count) * interval_m;
                if travelled + d < next || next / 1000.0 >= total_km - END_MARKER_TOLERANCE_KM {
                    break;
                }
                let t = (next - travelled) / d;
                markers.push(marker(
                    interpolate(a, b, t),
                    round_km(f64::from(count) * interval_km),
                ));
                count += 1;
            }
            travelled += d;
        }
    }

    if let Some(end) = route.lines().last().and_then(|l| l.coordinates.last()) {
        markers.push(marker(*end, (total_km * 1000.0).trunc() / 1000.0));
    }
    tracing::debug!(interval_km, markers = markers.len(), "generated milemarkers");
    feature_collection(markers)
}

/// Length of route inside `cutout` and the route position where it
/// first leaves the cutout, both in km.
///
/// Returns `(inside, intermediate)`. `intermediate` is the distance from
/// the start of the route to its first exit from the cutout, or the
/// total length if the route never leaves it after entering. Boundary
/// points count as inside; crossings are found by intersecting each
/// segment with the cutout's edges.
#[must_use]
pub fn distance_in_bounds(cutout: &Extent, route: &Route) -> (f64, f64) {
    let ring = cutout.ring();
    let edges: Vec<Line<f64>> = ring
        .windows(2)
        .map(|pair| Line::new(pair[0].xy(), pair[1].xy()))
        .collect();

    let mut inside = 0.0;
    let mut travelled = 0.0;
    let mut first_exit: Option<f64> = None;

    for line in route.lines() {
        let ruler = line_ruler(line);
        for pair in line.coordinates.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let d = ruler.distance(a, b);
            let (a_in, b_in) = (cutout.contains(a), cutout.contains(b));

            let exit_at = match (a_in, b_in) {
                (true, true) => {
                    inside += d;
                    None
                }
                (true, false) => {
                    let t = crossings(&edges, a, b).last().copied().unwrap_or(0.0);
                    inside += t * d;
                    Some(t)
                }
                (false, true) => {
                    let t = crossings(&edges, a, b).first().copied().unwrap_or(1.0);
                    inside += (1.0 - t) * d;
                    None
                }
                (false, false) => {
                    let ts = crossings(&edges, a, b);
                    match (ts.first(), ts.last()) {
                        (Some(&t0), Some(&t1)) if t1 > t0 => {
                            inside += (t1 - t0) * d;
                            Some(t1)
                        }
                        _ => None,
                    }
                }
            };

            if let (None, Some(t)) = (first_exit, exit_at) {
                first_exit = Some(t.mul_add(d, travelled));
            }
            travelled += d;
        }
    }

    let intermediate = first_exit.unwrap_or(travelled);
    (inside / 1000.0, intermediate / 1000.0)
}

/// Sorted segment parameters in `[0, 1]` where `a -> b` meets an edge.
fn crossings(edges: &[Line<f64>], a: Coordinate, b: Coordinate) -> Vec<f64> {
    let segment = Line::new(a.xy(), b.xy());
    let mut ts: Vec<f64> = edges
        .iter()
        .filter_map(|edge| line_intersection(segment, *edge))
        .flat_map(|hit| match hit {
            LineIntersection::SinglePoint { intersection, .. } => vec![intersection],
            LineIntersection::Collinear { intersection } => {
                vec![intersection.start, intersection.end]
            }
        })
        .map(|p| segment_parameter(&segment, p))
        .collect();
    ts.sort_by(f64::total_cmp);
    ts
}

/// Position of `p` along `segment` as a fraction of its length.
fn segment_parameter(segment: &Line<f64>, p: geo::Coord<f64>) -> f64 {
    let delta = segment.delta();
    let length2 = delta.x.mul_add(delta.x, delta.y * delta.y);
    if length2 == 0.0 {
        return 0.0;
    }
    let rel = p - segment.start;
    (rel.x.mul_add(delta.x, rel.y * delta.y) / length2).clamp(0.0, 1.0)
}

fn marker(position: Coordinate, title: f64) -> geojson::Feature {
    let mut properties = JsonObject::new();
    properties.insert("title".into(), title.into());
    feature(Value::Point(vec![position.lon, position.lat]), properties)
}

fn round_km(km: f64) -> f64 {
    (km * 1000.0).round() / 1000.0
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    (b - a).mul_add(t, a)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// A meridian line from `start_lat` with `n` points `step_m` apart.
    fn meridian(start_lat: f64, step_m: f64, n: usize) -> TrackLine {
        let ruler = Ruler::new(start_lat);
        let start = Coordinate::new(8.0, start_lat);
        TrackLine::new(
            (0..n)
                .map(|i| {
                    #[allow(clippy::cast_precision_loss)]
                    let dy = step_m * i as f64;
                    ruler.offset(start, 0.0, dy)
                })
                .collect(),
        )
    }

    fn titles(collection: &FeatureCollection) -> Vec<f64> {
        collection
            .features
            .iter()
            .map(|f| f.property("title").unwrap().as_f64().unwrap())
            .collect()
    }

    // --- Distance tests ---

    #[test]
    fn total_distance_in_km() {
        let route = Route::new(vec![meridian(0.0, 1000.0, 4)]).unwrap();
        // The line ruler uses the midpoint latitude, not the start.
        assert!((total_distance(&route) - 3.0).abs() < 0.001);
    }

    #[test]
    fn total_distance_reversal_invariant() {
        let line = TrackLine::new(vec![
            Coordinate::new(8.0, 47.0),
            Coordinate::new(8.013, 47.004),
            Coordinate::new(8.021, 47.019),
            Coordinate::new(8.05, 47.02),
            Coordinate::new(8.06, 47.031),
        ]);
        let mut reversed = line.clone();
        reversed.coordinates.reverse();
        let forward = total_distance(&Route::new(vec![line]).unwrap());
        let backward = total_distance(&Route::new(vec![reversed]).unwrap());
        assert!((forward - backward).abs() < 1e-9);
    }

    #[test]
    fn total_distance_sums_lines() {
        let a = meridian(10.0, 500.0, 3);
        let b = meridian(20.0, 250.0, 5);
        let both = total_distance(&Route::new(vec![a.clone(), b.clone()]).unwrap());
        let separate = total_distance(&Route::new(vec![a]).unwrap())
            + total_distance(&Route::new(vec![b]).unwrap());
        assert!((both - separate).abs() < 1e-12);
    }

    #[test]
    fn bounds_cover_all_lines() {
        let route = Route::new(vec![
            TrackLine::new(vec![Coordinate::new(1.0, 2.0), Coordinate::new(3.0, 1.0)]),
            TrackLine::new(vec![Coordinate::new(-1.0, 5.0)]),
        ])
        .unwrap();
        assert_eq!(bounds(&route), Extent::new(-1.0, 1.0, 3.0, 5.0));
    }

    // --- Elevation tests ---

    #[test]
    fn elevation_without_data_is_none() {
        let route = Route::new(vec![meridian(0.0, 100.0, 3)]).unwrap();
        assert_eq!(elevation(&route), None);
    }

    #[test]
    fn elevation_accumulates_gain_and_loss() {
        let route = Route::new(vec![TrackLine::new(vec![
            Coordinate::with_elevation(0.0, 0.0, 100.5),
            Coordinate::with_elevation(0.0, 0.001, 150.9),
            Coordinate::with_elevation(0.0, 0.002, 120.0),
            Coordinate::new(0.0, 0.003),
            Coordinate::with_elevation(0.0, 0.004, 130.0),
        ])])
        .unwrap();
        let stats = elevation(&route).unwrap();
        assert_eq!(stats.ascent, 60);
        assert_eq!(stats.descent, 30);
        assert_eq!(stats.min, 100);
        assert_eq!(stats.max, 150);
    }

    #[test]
    fn elevation_skips_gap_between_lines() {
        let route = Route::new(vec![
            TrackLine::new(vec![
                Coordinate::with_elevation(0.0, 0.0, 100.0),
                Coordinate::with_elevation(0.0, 0.001, 110.0),
            ]),
            TrackLine::new(vec![
                Coordinate::with_elevation(1.0, 0.0, 500.0),
                Coordinate::with_elevation(1.0, 0.001, 490.0),
            ]),
        ])
        .unwrap();
        let stats = elevation(&route).unwrap();
        assert_eq!(stats.ascent, 10);
        assert_eq!(stats.descent, 10);
        assert_eq!(stats.max, 500);
    }

    // --- Milemarker tests ---

    #[test]
    fn milemarkers_on_five_km_line() {
        let route = Route::new(vec![meridian(46.0, 500.0, 11)]).unwrap();
        let markers = milemarkers(&route, 1.0);
        let titles = titles(&markers);
        assert_eq!(titles.len(), 6, "{titles:?}");
        for (i, &title) in titles.iter().take(5).enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let expected = i as f64;
            assert!((title - expected).abs() < 1e-9);
        }
        assert!((titles[5] - 5.0).abs() < 0.01);
    }

    #[test]
    fn milemarker_positions_are_interpolated() {
        let route = Route::new(vec![meridian(0.0, 1500.0, 3)]).unwrap();
        let markers = milemarkers(&route, 1.0);
        let ruler = line_ruler(&route.lines()[0]);
        let start = route.lines()[0].coordinates[0];
        let Some(Value::Point(p)) = markers.features[1].geometry.as_ref().map(|g| g.value.clone())
        else {
            unreachable!("marker is a point");
        };
        let d = ruler.distance(start, Coordinate::new(p[0], p[1]));
        assert!((d - 1000.0).abs() < 0.01, "got {d}");
    }

    #[test]
    fn milemarkers_end_title_is_truncated_total() {
        let route = Route::new(vec![meridian(0.0, 1234.5678, 2)]).unwrap();
        let titles = titles(&milemarkers(&route, 1.0));
        let total = total_distance(&route);
        assert_eq!(titles.len(), 3);
        assert!((titles[2] - (total * 1000.0).trunc() / 1000.0).abs() < 1e-12);
    }

    #[test]
    fn milemarkers_non_positive_interval_is_empty() {
        let route = Route::new(vec![meridian(0.0, 1000.0, 3)]).unwrap();
        assert!(milemarkers(&route, 0.0).features.is_empty());
        assert!(milemarkers(&route, -1.0).features.is_empty());
    }

    #[test]
    fn milemarkers_continue_across_lines() {
        let route = Route::new(vec![meridian(0.0, 600.0, 2), meridian(1.0, 600.0, 2)]).unwrap();
        let titles = titles(&milemarkers(&route, 1.0));
        // 0, 1 (inside the second line), end at 1.2.
        assert_eq!(titles.len(), 3, "{titles:?}");
        assert!((titles[1] - 1.0).abs() < 1e-12);
    }

    // --- Distance in bounds tests ---

    #[test]
    fn full_cover_matches_total() {
        let route = Route::new(vec![
            meridian(47.0, 300.0, 8),
            TrackLine::new(vec![
                Coordinate::new(8.01, 47.0),
                Coordinate::new(8.02, 47.01),
            ]),
        ])
        .unwrap();
        let total = total_distance(&route);
        let (inside, intermediate) = distance_in_bounds(&bounds(&route), &route);
        assert!((inside - total).abs() < 1e-9);
        assert!((intermediate - total).abs() < 1e-9);
    }

    #[test]
    fn route_leaving_cutout() {
        // 4 km north along a meridian; the cutout covers the first 1.5 km.
        let line = meridian(0.0, 1000.0, 5);
        let exit_lat = Ruler::new(0.0).offset(line.coordinates[0], 0.0, 1500.0).lat;
        let route = Route::new(vec![line]).unwrap();
        let cutout = Extent::new(7.99, -0.01, 8.01, exit_lat);
        let (inside, intermediate) = distance_in_bounds(&cutout, &route);
        assert!((inside - 1.5).abs() < 0.01, "inside {inside}");
        assert!((intermediate - 1.5).abs() < 0.01, "intermediate {intermediate}");
    }

    #[test]
    fn route_entering_cutout_counts_inside_part() {
        let line = meridian(0.0, 1000.0, 5);
        let ruler = Ruler::new(0.0);
        let enter_lat = ruler.offset(line.coordinates[0], 0.0, 2500.0).lat;
        let route = Route::new(vec![line]).unwrap();
        let cutout = Extent::new(7.99, enter_lat, 8.01, 1.0);
        let total = total_distance(&route);
        let (inside, intermediate) = distance_in_bounds(&cutout, &route);
        assert!((inside - 1.5).abs() < 0.01, "inside {inside}");
        // Never leaves after entering.
        assert!((intermediate - total).abs() < 1e-9);
    }

    #[test]
    fn segment_crossing_cutout_adds_chord() {
        // One 10 km segment passing through a 2 km tall box.
        let ruler = Ruler::new(0.0);
        let a = Coordinate::new(8.0, 0.0);
        let b = ruler.offset(a, 0.0, 10_000.0);
        let south = ruler.offset(a, 0.0, 4000.0).lat;
        let north = ruler.offset(a, 0.0, 6000.0).lat;
        let route = Route::new(vec![TrackLine::new(vec![a, b])]).unwrap();
        let cutout = Extent::new(7.99, south, 8.01, north);
        let (inside, intermediate) = distance_in_bounds(&cutout, &route);
        assert!((inside - 2.0).abs() < 0.01, "inside {inside}");
        assert!((intermediate - 6.0).abs() < 0.01, "intermediate {intermediate}");
    }

    #[test]
    fn disjoint_cutout_has_nothing_inside() {
        let route = Route::new(vec![meridian(0.0, 1000.0, 3)]).unwrap();
        let cutout = Extent::new(20.0, 20.0, 21.0, 21.0);
        let (inside, intermediate) = distance_in_bounds(&cutout, &route);
        assert!(inside.abs() < 1e-12);
        assert!((intermediate - total_distance(&route)).abs() < 1e-9);
    }

    #[test]
    fn interpolate_midpoint_with_elevation() {
        let p = interpolate(
            Coordinate::with_elevation(0.0, 0.0, 100.0),
            Coordinate::with_elevation(2.0, 4.0, 200.0),
            0.5,
        );
        assert_eq!(p, Coordinate::with_elevation(1.0, 2.0, 150.0));
    }
}
