//! Growable geographic bounding box measured in meters.
//!
//! A [`GeoBbox`] is an [`Extent`] plus a [`Ruler`] fixed to the latitude
//! the box was started at. All width/height math goes through that
//! ruler, so the box can be measured and resized in meters without
//! projecting the route. This is the building block of the cutout
//! planner: include points until the box outgrows the sheet, then
//! resize it to the exact ground size of one sheet.

use geojson::{Feature, JsonObject, Value};

use crate::ruler::Ruler;
use crate::types::{Coordinate, CutterError, Extent, feature};

/// A bounding box with metric measurement around a reference latitude.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoBbox {
    reference_latitude: f64,
    ruler: Ruler,
    extent: Extent,
}

impl GeoBbox {
    /// Create an empty box measured around `reference_latitude`.
    ///
    /// # Errors
    ///
    /// Returns [`CutterError::InvalidReferenceLatitude`] if the latitude
    /// is not finite or lies outside `[-90, 90]`.
    pub fn new(reference_latitude: f64) -> Result<Self, CutterError> {
        if !reference_latitude.is_finite() || reference_latitude.abs() > 90.0 {
            return Err(CutterError::InvalidReferenceLatitude(reference_latitude));
        }
        Ok(Self {
            reference_latitude,
            ruler: Ruler::new(reference_latitude),
            extent: Extent::EMPTY,
        })
    }

    /// Create a box at the latitude of `coord` that already covers it.
    ///
    /// # Errors
    ///
    /// Returns [`CutterError::InvalidReferenceLatitude`] if the
    /// coordinate's latitude is unusable.
    pub fn seeded(coord: Coordinate) -> Result<Self, CutterError> {
        let mut bbox = Self::new(coord.lat)?;
        bbox.include(coord);
        Ok(bbox)
    }

    /// The latitude the box measures around.
    #[must_use]
    pub const fn reference_latitude(&self) -> f64 {
        self.reference_latitude
    }

    /// The current `[w, s, e, n]` extent. Doubles as the snapshot for
    /// [`revert_to`](Self::revert_to).
    #[must_use]
    pub const fn extent(&self) -> Extent {
        self.extent
    }

    /// Returns `true` if nothing has been included yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extent.is_empty()
    }

    /// Extend the box to cover `coord`.
    pub fn include(&mut self, coord: Coordinate) {
        self.extent.include(coord);
    }

    /// Restore a snapshot taken with [`extent`](Self::extent).
    pub const fn revert_to(&mut self, state: Extent) {
        self.extent = state;
    }

    /// Width (NW to NE) and height (NW to SW) in meters.
    ///
    /// # Errors
    ///
    /// Returns [`CutterError::EmptyBbox`] if nothing has been included.
    pub fn dimensions(&self) -> Result<(f64, f64), CutterError> {
        if self.is_empty() {
            return Err(CutterError::EmptyBbox);
        }
        let [nw, ne, _, sw, _] = self.extent.ring();
        Ok((self.ruler.distance(nw, ne), self.ruler.distance(nw, sw)))
    }

    /// Returns `true` if the box fits a `max_width` x `max_height`
    /// rectangle in neither orientation.
    ///
    /// An empty box fits everything.
    #[must_use]
    pub fn larger_than(&self, max_width: f64, max_height: f64) -> bool {
        let Ok((w, h)) = self.dimensions() else {
            return false;
        };
        (w > max_width || h > max_height) && (h > max_width || w > max_height)
    }

    /// Recenter the box and set its size to exactly `width` x `height`
    /// meters.
    ///
    /// When the box is landscape and the target portrait (or the other
    /// way round) the target is transposed, so the result always keeps
    /// the orientation of its content. Each edge moves along a cardinal
    /// bearing by half the size difference.
    ///
    /// # Errors
    ///
    /// Returns [`CutterError::EmptyBbox`] if nothing has been included.
    pub fn resize(&mut self, width: f64, height: f64) -> Result<(), CutterError> {
        let (w, h) = self.dimensions()?;
        let (width, height) = if (w > h) == (width > height) {
            (width, height)
        } else {
            (height, width)
        };
        let w_diff = 0.5 * (width - w);
        let h_diff = 0.5 * (height - h);

        let Extent {
            west,
            south,
            east,
            north,
        } = self.extent;
        let nw = Coordinate::new(west, north);
        self.extent = Extent {
            west: self.ruler.destination(nw, w_diff, 270.0).lon,
            south: self
                .ruler
                .destination(Coordinate::new(west, south), h_diff, 180.0)
                .lat,
            east: self
                .ruler
                .destination(Coordinate::new(east, north), w_diff, 90.0)
                .lon,
            north: self.ruler.destination(nw, h_diff, 0.0).lat,
        };
        Ok(())
    }

    /// The closed boundary ring NW, NE, SE, SW, NW.
    #[must_use]
    pub const fn linestring(&self) -> [Coordinate; 5] {
        self.extent.ring()
    }

    /// Export the box as a Polygon feature with `name`, `width` and
    /// `height` (meters) properties and a GeoJSON `bbox`.
    ///
    /// # Errors
    ///
    /// Returns [`CutterError::EmptyBbox`] if nothing has been included.
    pub fn to_feature(&self) -> Result<Feature, CutterError> {
        let (width, height) = self.dimensions()?;
        let mut properties = JsonObject::new();
        properties.insert("name".into(), "cutout".into());
        properties.insert("width".into(), width.into());
        properties.insert("height".into(), height.into());
        let ring = self.linestring().iter().map(|c| c.to_position()).collect();
        let mut feature = feature(Value::Polygon(vec![ring]), properties);
        feature.bbox = Some(self.extent.to_bbox());
        Ok(feature)
    }
}
