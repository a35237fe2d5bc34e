//! Slope detection along a route.
//!
//! Each line is turned into an elevation profile (distance from start,
//! elevation), a slope is assigned to every profile point, and runs of
//! points steeper than a threshold become [`SlopeSection`]s. The slope
//! is either a windowed difference quotient or the derivative of a
//! natural cubic smoothing spline fitted to the profile.
//!
//! The smoothing spline follows D.S.G. Pollock, "Smoothing with Cubic
//! Splines": the second-derivative coefficients solve a pentadiagonal
//! system (the "quincunx" solver below), and slope is accumulated
//! segment by segment from those coefficients.

use geojson::{FeatureCollection, JsonObject, Value};
use serde::{Deserialize, Serialize};

use crate::metrics::line_ruler;
use crate::options::SlopeOptions;
use crate::types::{Coordinate, Route, TrackLine, feature, feature_collection};

/// One sample of an elevation profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    /// Distance from the start of the line in meters.
    pub distance: f64,
    /// Elevation in meters.
    pub elevation: f64,
    /// Slope as a ratio (rise over run).
    pub slope: f64,
}

/// A run of profile points `[start, end)` steeper than the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlopeSection {
    /// Index of the route line the section belongs to.
    pub line: usize,
    /// First coordinate index in the section.
    pub start: usize,
    /// One past the last coordinate index.
    pub end: usize,
    /// Signed slope of largest magnitude inside the section.
    pub slope: f64,
}

impl SlopeSection {
    /// Number of profile points in the section.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the section holds no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Distance/elevation profile of one line.
///
/// Returns `None` if any coordinate lacks elevation. Slopes are zero
/// until [`add_slope`] or [`spline_smoother`] fills them in.
#[must_use]
pub fn elevation_profile(line: &TrackLine) -> Option<Vec<ProfilePoint>> {
    let ruler = line_ruler(line);
    let mut distance = 0.0;
    let mut previous: Option<Coordinate> = None;
    line.coordinates
        .iter()
        .map(|&c| {
            if let Some(p) = previous {
                distance += ruler.distance(p, c);
            }
            previous = Some(c);
            Some(ProfilePoint {
                distance,
                elevation: c.ele?,
                slope: 0.0,
            })
        })
        .collect()
}

/// Set each point's slope to the elevation difference between the
/// nearest points at least `window` meters behind and ahead, divided
/// by their distance.
///
/// Near the ends, where no point lies a full window away, the point
/// itself stands in for the missing side.
pub fn add_slope(profile: &mut [ProfilePoint], window: f64) {
    let slopes: Vec<f64> = (0..profile.len())
        .map(|i| {
            let current = profile[i];
            let mut distance = 0.0;

            let behind = profile[..=i]
                .iter()
                .rev()
                .find(|p| current.distance - p.distance >= window);
            let e1 = behind.map_or(current.elevation, |p| {
                distance += current.distance - p.distance;
                p.elevation
            });

            let ahead = profile[i..]
                .iter()
                .find(|p| p.distance - current.distance >= window);
            let e2 = ahead.map_or(current.elevation, |p| {
                distance += p.distance - current.distance;
                p.elevation
            });

            if distance > 0.0 { (e2 - e1) / distance } else { 0.0 }
        })
        .collect();

    for (point, slope) in profile.iter_mut().zip(slopes) {
        point.slope = slope;
    }
}

/// Fit a natural cubic smoothing spline and return the smoothed
/// elevation and its slope at every point.
///
/// `lambda` in `(0, 1)` sets the trade-off between fidelity and
/// smoothness; smaller values smooth more. Points that repeat the
/// previous distance share the smoothed value of that point. Profiles
/// with fewer than three distinct distances fall back to the windowed
/// slope.
#[must_use]
pub fn spline_smoother(profile: &[ProfilePoint], lambda: f64, window: f64) -> Vec<ProfilePoint> {
    // Indices of points with strictly increasing distance.
    let mut kept: Vec<usize> = Vec::with_capacity(profile.len());
    for (i, p) in profile.iter().enumerate() {
        if kept.last().is_none_or(|&k| p.distance > profile[k].distance) {
            kept.push(i);
        }
    }

    if kept.len() < 3 {
        let mut result = profile.to_vec();
        add_slope(&mut result, window);
        return result;
    }

    let distinct: Vec<ProfilePoint> = kept.iter().map(|&i| profile[i]).collect();
    let smoothed = smooth_distinct(&distinct, lambda);

    let mut result = Vec::with_capacity(profile.len());
    let mut source = 0;
    for (i, p) in profile.iter().enumerate() {
        if source + 1 < kept.len() && kept[source + 1] == i {
            source += 1;
        }
        result.push(ProfilePoint {
            distance: p.distance,
            ..smoothed[source]
        });
    }
    result
}

/// Smoothing spline over a profile with at least three points and
/// strictly increasing distances.
#[allow(clippy::many_single_char_names)]
fn smooth_distinct(profile: &[ProfilePoint], lambda: f64) -> Vec<ProfilePoint> {
    let n = profile.len();
    let mu = 2.0 * (1.0 - lambda) / (3.0 * lambda);
    let d = |i: usize| profile[i].distance;
    let e = |i: usize| profile[i].elevation;

    let mut h = vec![0.0; n];
    let mut r = vec![0.0; n];
    let mut u = vec![0.0; n];
    let mut v = vec![0.0; n];
    let mut w = vec![0.0; n];
    let mut q = vec![0.0; n + 1];

    h[0] = d(1) - d(0);
    r[0] = 3.0 / h[0];
    for i in 1..n - 1 {
        h[i] = d(i + 1) - d(i);
        r[i] = 3.0 / h[i];
        q[i] = 3.0 * (e(i + 1) - e(i)) / h[i] - 3.0 * (e(i) - e(i - 1)) / h[i - 1];
    }

    for i in 1..n - 1 {
        let a = r[i - 1] + r[i];
        u[i] = mu.mul_add(
            r[i - 1] * r[i - 1] + a * a + r[i] * r[i],
            2.0 * (d(i + 1) - d(i - 1)),
        );
        v[i] = mu.mul_add(-a * r[i] - r[i] * (r[i] + r[i + 1]), h[i]);
        w[i] = mu * r[i] * r[i + 1];
    }

    quincunx(&mut u, &mut v, &mut w, &mut q);

    let mut result: Vec<ProfilePoint> = Vec::with_capacity(n);

    let p0 = (mu * r[0]).mul_add(-q[1], e(0));
    let dd = mu.mul_add(-((-r[0] - r[1]) * q[1] + r[1] * q[2]), e(1));
    let p1 = (dd - p0) / h[0] - q[1] * h[0] / 3.0;
    result.push(ProfilePoint {
        distance: d(0),
        elevation: p0,
        slope: p1,
    });

    for j in 1..n - 1 {
        let slope = (q[j] + q[j - 1]).mul_add(h[j - 1], result[j - 1].slope);
        let c = r[j].mul_add(q[j + 1], r[j - 1].mul_add(q[j - 1], (-r[j - 1] - r[j]) * q[j]));
        result.push(ProfilePoint {
            distance: d(j),
            elevation: mu.mul_add(-c, e(j)),
            slope,
        });
    }

    // Last point: evaluate the final cubic piece at its right end.
    let j = n - 1;
    let p3 = (q[j] - q[j - 1]) / (3.0 * h[j - 1]);
    let p2 = q[j - 1];
    let hn = d(n - 1) - d(n - 2);
    let prev = result[n - 2];
    let slope = hn.mul_add(2.0f64.mul_add(p2, 3.0 * hn * p3), prev.slope);
    let elevation = hn.mul_add(hn.mul_add(hn.mul_add(p3, p2), prev.slope), prev.elevation);
    result.push(ProfilePoint {
        distance: d(j),
        elevation,
        slope,
    });

    result
}

/// Solve the symmetric pentadiagonal system with diagonal `u`,
/// off-diagonals `v` and `w`, overwriting `q` with the solution.
///
/// Rows `1..n-1` are solved; `q[0]`, `q[n-1]` and `q[n]` are zero.
fn quincunx(u: &mut [f64], v: &mut [f64], w: &mut [f64], q: &mut [f64]) {
    let n = u.len();
    u[0] = 0.0;
    v[1] /= u[1];
    w[1] /= u[1];

    for j in 2..n - 1 {
        u[j] = u[j - 1].mul_add(
            -(v[j - 1] * v[j - 1]),
            u[j - 2].mul_add(-(w[j - 2] * w[j - 2]), u[j]),
        );
        v[j] = (u[j - 1] * v[j - 1]).mul_add(-w[j - 1], v[j]) / u[j];
        w[j] /= u[j];
    }

    // Forward substitution.
    q[1] = v[0].mul_add(-q[0], q[1]);
    for j in 2..n - 1 {
        q[j] = w[j - 2].mul_add(-q[j - 2], v[j - 1].mul_add(-q[j - 1], q[j]));
    }
    for j in 1..n - 1 {
        q[j] /= u[j];
    }

    // Back substitution.
    q[n - 1] = 0.0;
    for j in (1..n.saturating_sub(2)).rev() {
        q[j] = w[j].mul_add(-q[j + 2], v[j].mul_add(-q[j + 1], q[j]));
    }
    q[n] = 0.0;
}

/// Group points with `|slope| >= min_slope` into sections, keeping only
/// those with nonzero length and an elevation change above
/// `min_elevation_change` meters.
///
/// The sections carry `line` index 0; [`slopes`] sets the real index.
#[must_use]
pub fn slope_sections(
    profile: &[ProfilePoint],
    min_slope: f64,
    min_elevation_change: f64,
) -> Vec<SlopeSection> {
    segments(profile, |p| p.slope.abs() >= min_slope)
        .into_iter()
        .filter_map(|(start, end)| {
            let section = &profile[start..end];
            let (first, last) = (section.first()?, section.last()?);
            let length = last.distance - first.distance;
            let change = last.elevation - first.elevation;
            if length <= 0.0 || change.abs() <= min_elevation_change {
                return None;
            }
            Some(SlopeSection {
                line: 0,
                start,
                end,
                slope: signed_max(section.iter().map(|p| p.slope)),
            })
        })
        .collect()
}

/// Merge consecutive sections of the same direction whose gap is at
/// most `max_gap` meters of profile distance.
///
/// The gap runs from the first point after the earlier section to the
/// first point of the later one; both points must slope the same way.
#[must_use]
pub fn merge_sections(
    profile: &[ProfilePoint],
    sections: &[SlopeSection],
    max_gap: f64,
) -> Vec<SlopeSection> {
    let mut result: Vec<SlopeSection> = Vec::with_capacity(sections.len());
    for &current in sections {
        if let Some(last) = result.last_mut() {
            let after_last = profile.get(last.end);
            let start_current = profile.get(current.start);
            if let (Some(after_last), Some(start_current)) = (after_last, start_current) {
                if last.slope * current.slope > 0.0
                    && after_last.slope * start_current.slope > 0.0
                    && start_current.distance - after_last.distance <= max_gap
                {
                    last.end = current.end;
                    last.slope = signed_max([last.slope, current.slope].into_iter());
                    continue;
                }
            }
        }
        result.push(current);
    }
    result
}

/// Slope sections of every line of the route that carries elevation.
#[must_use]
pub fn slopes(route: &Route, options: &SlopeOptions) -> Vec<SlopeSection> {
    let mut result = Vec::new();
    for (index, line) in route.lines().iter().enumerate() {
        let Some(mut profile) = elevation_profile(line) else {
            tracing::debug!(line = index, "line has no elevation, skipping slopes");
            continue;
        };
        if options.lambda > 0.0 && options.lambda < 1.0 {
            profile = spline_smoother(&profile, options.lambda, options.window);
        } else {
            add_slope(&mut profile, options.window);
        }

        let mut sections =
            slope_sections(&profile, options.min_slope, options.min_elevation_change);
        if let Some(max_gap) = options.merge_distance {
            sections = merge_sections(&profile, &sections, max_gap);
        }
        result.extend(sections.into_iter().map(|s| SlopeSection { line: index, ..s }));
    }
    tracing::debug!(sections = result.len(), "detected slope sections");
    result
}

/// LineString features for slope sections, with the `slope` property
/// in percent.
#[must_use]
pub fn slope_features(route: &Route, sections: &[SlopeSection]) -> FeatureCollection {
    feature_collection(
        sections
            .iter()
            .filter_map(|section| {
                let coords = route
                    .lines()
                    .get(section.line)?
                    .coordinates
                    .get(section.start..section.end)?;
                let mut properties = JsonObject::new();
                properties.insert("slope".into(), (section.slope * 100.0).into());
                Some(feature(
                    Value::LineString(coords.iter().map(|c| c.to_position()).collect()),
                    properties,
                ))
            })
            .collect(),
    )
}

/// Half-open index ranges of maximal runs where `pred` holds.
fn segments<T>(items: &[T], pred: impl Fn(&T) -> bool) -> Vec<(usize, usize)> {
    let mut result = Vec::new();
    let mut start: Option<usize> = None;
    for (i, item) in items.iter().enumerate() {
        match (start, pred(item)) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                result.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        result.push((s, items.len()));
    }
    result
}

/// The value of largest magnitude, keeping its sign. Ties keep the
/// maximum.
fn signed_max(values: impl Iterator<Item = f64>) -> f64 {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s), hi.max(s))
    });
    if min.abs() > max.abs() { min } else { max }
}
