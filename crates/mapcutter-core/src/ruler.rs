//! Local distance approximation around one reference latitude.
//!
//! Implements the "cheap ruler" approximation of the WGS84 ellipsoid:
//! near a fixed latitude, meters per degree of longitude and latitude are
//! treated as constants, so distances and offsets become plain planar
//! arithmetic. Accuracy is well below a meter over the 1-50 km spans a
//! single map sheet covers, which is all the cutout math needs.

use std::f64::consts::PI;

use crate::types::Coordinate;

/// Equatorial radius of the WGS84 ellipsoid in kilometers.
const EQUATORIAL_RADIUS_KM: f64 = 6378.137;

/// WGS84 flattening.
const FLATTENING: f64 = 1.0 / 298.257_223_563;

/// Squared first eccentricity.
const E2: f64 = FLATTENING * (2.0 - FLATTENING);

const RAD: f64 = PI / 180.0;

/// Meters per degree of arc on the equatorial radius.
const METERS_PER_DEGREE: f64 = RAD * EQUATORIAL_RADIUS_KM * 1000.0;

/// A distance calculator fixed to one reference latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ruler {
    /// Meters per degree of longitude.
    kx: f64,
    /// Meters per degree of latitude.
    ky: f64,
}

impl Ruler {
    /// Create a ruler for measurements near `latitude` (degrees).
    #[must_use]
    pub fn new(latitude: f64) -> Self {
        let coslat = (latitude * RAD).cos();
        let w2 = 1.0 / E2.mul_add(-(1.0 - coslat * coslat), 1.0);
        let w = w2.sqrt();
        Self {
            kx: METERS_PER_DEGREE * w * coslat,
            ky: METERS_PER_DEGREE * w * w2 * (1.0 - E2),
        }
    }

    /// Meters per degree of longitude at the reference latitude.
    #[must_use]
    pub const fn meters_per_degree_lon(&self) -> f64 {
        self.kx
    }

    /// Meters per degree of latitude at the reference latitude.
    #[must_use]
    pub const fn meters_per_degree_lat(&self) -> f64 {
        self.ky
    }

    /// Distance between two points in meters.
    #[must_use]
    pub fn distance(&self, a: Coordinate, b: Coordinate) -> f64 {
        let dx = wrap(a.lon - b.lon) * self.kx;
        let dy = (a.lat - b.lat) * self.ky;
        dx.hypot(dy)
    }

    /// Total length of a polyline in meters.
    #[must_use]
    pub fn line_distance(&self, points: &[Coordinate]) -> f64 {
        points
            .windows(2)
            .map(|pair| self.distance(pair[0], pair[1]))
            .sum()
    }

    /// Bearing from `a` to `b` in degrees, clockwise from north.
    #[must_use]
    pub fn bearing(&self, a: Coordinate, b: Coordinate) -> f64 {
        let dx = wrap(b.lon - a.lon) * self.kx;
        let dy = (b.lat - a.lat) * self.ky;
        dx.atan2(dy) / RAD
    }

    /// The point `distance` meters from `point` along `bearing`
    /// (degrees clockwise from north).
    #[must_use]
    pub fn destination(&self, point: Coordinate, distance: f64, bearing: f64) -> Coordinate {
        let a = bearing * RAD;
        self.offset(point, a.sin() * distance, a.cos() * distance)
    }

    /// Shift `point` by `dx` meters east and `dy` meters north.
    #[must_use]
    pub fn offset(&self, point: Coordinate, dx: f64, dy: f64) -> Coordinate {
        Coordinate {
            lon: point.lon + dx / self.kx,
            lat: point.lat + dy / self.ky,
            ele: point.ele,
        }
    }
}

/// Normalize a longitude delta into `[-180, 180)`.
fn wrap(deg: f64) -> f64 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}
