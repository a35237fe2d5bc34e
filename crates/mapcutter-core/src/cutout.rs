//! Cutout planning: split a route into map sheets.
//!
//! Walks every line of the route point by point, growing a [`GeoBbox`]
//! until the route no longer fits the padded sheet area. The box as it
//! was before the overflowing point is resized to the full ground size
//! of one sheet and emitted as a [`Cutout`]; a new box starts at the
//! overflowing point. The last box of each line is emitted as well.
//!
//! A single step longer than the padded sheet is not subdivided: the
//! box is cut before the step and the next box starts at its far end,
//! so the stretch in between may run outside both sheets' padding.

use geojson::{Feature, FeatureCollection, JsonObject, Value};
use serde::{Deserialize, Serialize};

use crate::bbox::GeoBbox;
use crate::options::PrintOptions;
use crate::paper::Orientation;
use crate::types::{CutterError, Extent, Route, feature, feature_collection};

/// One map sheet: a ground rectangle of exactly one sheet's size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cutout {
    /// Zero-based position in the sheet sequence.
    pub index: usize,
    /// Geographic extent of the sheet.
    pub extent: Extent,
    /// Ground width in meters.
    pub width: f64,
    /// Ground height in meters.
    pub height: f64,
}

impl Cutout {
    /// Page orientation: landscape when wider than tall.
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        Orientation::of(self.width, self.height)
    }

    /// Export as a closed Polygon feature with `name`, `index`, `width`
    /// and `height` properties.
    #[must_use]
    pub fn to_feature(&self) -> Feature {
        let ring = self.extent.ring().iter().map(|c| c.to_position()).collect();
        let mut properties = JsonObject::new();
        properties.insert("name".into(), "cutout".into());
        properties.insert("index".into(), self.index.into());
        properties.insert("width".into(), self.width.into());
        properties.insert("height".into(), self.height.into());
        let mut feature = feature(Value::Polygon(vec![ring]), properties);
        feature.bbox = Some(self.extent.to_bbox());
        feature
    }
}

/// Plan the sheets covering `route` at the given options.
///
/// # Errors
///
/// Returns [`CutterError::InvalidOptions`] if the options fail
/// validation, or [`CutterError::InvalidReferenceLatitude`] if a line
/// starts at an unusable latitude.
pub fn plan(route: &Route, options: &PrintOptions) -> Result<Vec<Cutout>, CutterError> {
    options.validate()?;
    let (rw, rh) = options.ground_size();
    let (rwp, rhp) = options.padded_ground_size();

    let mut boxes: Vec<GeoBbox> = Vec::new();
    for line in route.lines() {
        let Some(&first) = line.coordinates.first() else {
            continue;
        };
        let mut bbox = GeoBbox::new(first.lat)?;
        for &coord in &line.coordinates {
            let saved = bbox.extent();
            bbox.include(coord);
            if bbox.larger_than(rwp, rhp) {
                bbox.revert_to(saved);
                boxes.push(bbox);
                bbox = GeoBbox::seeded(coord)?;
            }
        }
        boxes.push(bbox);
    }

    let cutouts = boxes
        .into_iter()
        .enumerate()
        .map(|(index, mut bbox)| {
            bbox.resize(rw, rh)?;
            let (width, height) = bbox.dimensions()?;
            Ok(Cutout {
                index,
                extent: bbox.extent(),
                width,
                height,
            })
        })
        .collect::<Result<Vec<_>, CutterError>>()?;

    tracing::info!(
        sheets = cutouts.len(),
        scale = options.scale,
        format = %options.format,
        "planned cutouts"
    );
    Ok(cutouts)
}

/// Cutouts as a GeoJSON collection, in sheet order.
#[must_use]
pub fn to_feature_collection(cutouts: &[Cutout]) -> FeatureCollection {
    feature_collection(cutouts.iter().map(Cutout::to_feature).collect())
}

/// Extent covering all cutouts.
#[must_use]
pub fn cutouts_extent(cutouts: &[Cutout]) -> Extent {
    cutouts
        .iter()
        .fold(Extent::EMPTY, |acc, cutout| acc.union(cutout.extent))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::paper::PaperFormat;
    use crate::ruler::Ruler;
    use crate::types::{Coordinate, TrackLine};

    fn options(scale: f64) -> PrintOptions {
        PrintOptions {
            format: PaperFormat::A4,
            margin: 10.0,
            scale,
            padding: 5.0,
            ..PrintOptions::default()
        }
    }

    /// A line heading along `bearing` from `start` with `n` points
    /// `step` meters apart.
    fn heading(start: Coordinate, bearing: f64, step: f64, n: u32) -> TrackLine {
        let ruler = Ruler::new(start.lat);
        TrackLine::new(
            (0..n)
                .map(|i| ruler.destination(start, step * f64::from(i), bearing))
                .collect(),
        )
    }

    /// The cutout extent shrunk by the padding distance on every side.
    fn padded_contains(cutout: &Cutout, options: &PrintOptions, c: Coordinate) -> bool {
        let (rw, rh) = options.ground_size();
        let (rwp, rhp) = options.padded_ground_size();
        let (pad_w, pad_h) = if cutout.width > cutout.height {
            ((rh - rhp) / 2.0, (rw - rwp) / 2.0)
        } else {
            ((rw - rwp) / 2.0, (rh - rhp) / 2.0)
        };
        let ruler = Ruler::new(c.lat);
        let inner = Extent::new(
            cutout.extent.west + pad_w / ruler.meters_per_degree_lon(),
            cutout.extent.south + pad_h / ruler.meters_per_degree_lat(),
            cutout.extent.east - pad_w / ruler.meters_per_degree_lon(),
            cutout.extent.north - pad_h / ruler.meters_per_degree_lat(),
        );
        // Boxes are measured at their own reference latitude, not at `c`.
        let slack = 1e-4;
        (inner.west - slack..=inner.east + slack).contains(&c.lon)
            && (inner.south - slack..=inner.north + slack).contains(&c.lat)
    }

    #[test]
    fn short_route_is_one_sheet() {
        let route = Route::new(vec![heading(Coordinate::new(8.0, 47.0), 0.0, 1000.0, 3)]).unwrap();
        let options = options(25_000.0);
        let cutouts = plan(&route, &options).unwrap();
        assert_eq!(cutouts.len(), 1);
        let (rw, rh) = options.ground_size();
        assert!((cutouts[0].width - rw).abs() < 0.5);
        assert!((cutouts[0].height - rh).abs() < 0.5);
        assert_eq!(cutouts[0].orientation(), Orientation::Portrait);
    }

    #[test]
    fn every_cutout_has_sheet_dimensions() {
        let route = Route::new(vec![
            heading(Coordinate::new(8.0, 47.0), 30.0, 250.0, 200),
            heading(Coordinate::new(9.0, 46.5), 100.0, 250.0, 120),
        ])
        .unwrap();
        let options = options(25_000.0);
        let (rw, rh) = options.ground_size();
        let cutouts = plan(&route, &options).unwrap();
        assert!(cutouts.len() > 2);
        for cutout in &cutouts {
            let (w, h) = if cutout.width > cutout.height {
                (rh, rw)
            } else {
                (rw, rh)
            };
            assert!((cutout.width - w).abs() < 0.5, "{cutout:?}");
            assert!((cutout.height - h).abs() < 0.5, "{cutout:?}");
        }
    }

    #[test]
    fn indices_follow_sheet_order() {
        let route = Route::new(vec![heading(Coordinate::new(8.0, 47.0), 0.0, 300.0, 100)]).unwrap();
        let cutouts = plan(&route, &options(25_000.0)).unwrap();
        for (i, cutout) in cutouts.iter().enumerate() {
            assert_eq!(cutout.index, i);
        }
        // Heading north, sheets advance north.
        for pair in cutouts.windows(2) {
            assert!(pair[1].extent.center().lat > pair[0].extent.center().lat);
        }
    }

    #[test]
    fn every_coordinate_lies_in_a_padded_sheet() {
        let route = Route::new(vec![heading(Coordinate::new(11.0, 48.0), 60.0, 200.0, 300)]).unwrap();
        let options = options(25_000.0);
        let cutouts = plan(&route, &options).unwrap();
        for &coord in route.coordinates() {
            assert!(
                cutouts
                    .iter()
                    .any(|cutout| padded_contains(cutout, &options, coord)),
                "{coord:?} not covered"
            );
        }
    }

    #[test]
    fn east_west_route_gets_landscape_sheets() {
        let route = Route::new(vec![heading(Coordinate::new(8.0, 47.0), 90.0, 100.0, 60)]).unwrap();
        let cutouts = plan(&route, &options(25_000.0)).unwrap();
        assert_eq!(cutouts.len(), 1);
        assert_eq!(cutouts[0].orientation(), Orientation::Landscape);
    }

    #[test]
    fn lines_are_planned_independently() {
        let route = Route::new(vec![
            heading(Coordinate::new(8.0, 47.0), 0.0, 500.0, 3),
            heading(Coordinate::new(8.0, 47.0), 0.0, 500.0, 3),
        ])
        .unwrap();
        let cutouts = plan(&route, &options(25_000.0)).unwrap();
        assert_eq!(cutouts.len(), 2);
        assert_eq!(cutouts[0].extent, cutouts[1].extent);
    }

    #[test]
    fn overlarge_step_is_not_subdivided() {
        // Two points 100 km apart at 1:25000: one sheet per point, the
        // stretch between them is covered by neither sheet.
        let route = Route::new(vec![heading(Coordinate::new(8.0, 47.0), 0.0, 100_000.0, 2)]).unwrap();
        let options = options(25_000.0);
        let cutouts = plan(&route, &options).unwrap();
        assert_eq!(cutouts.len(), 2);
        let start = route.lines()[0].coordinates[0];
        let end = route.lines()[0].coordinates[1];
        assert!(cutouts[0].extent.contains(start));
        assert!(cutouts[1].extent.contains(end));
        let midway = crate::metrics::interpolate(start, end, 0.5);
        assert!(!cutouts.iter().any(|c| c.extent.contains(midway)));
    }

    #[test]
    fn invalid_options_are_rejected() {
        let route = Route::new(vec![heading(Coordinate::new(8.0, 47.0), 0.0, 500.0, 3)]).unwrap();
        assert!(matches!(
            plan(&route, &options(1000.0)),
            Err(CutterError::InvalidOptions(_))
        ));
    }

    #[test]
    fn feature_collection_keeps_order_and_properties() {
        let route = Route::new(vec![heading(Coordinate::new(8.0, 47.0), 0.0, 300.0, 100)]).unwrap();
        let cutouts = plan(&route, &options(25_000.0)).unwrap();
        let fc = to_feature_collection(&cutouts);
        assert_eq!(fc.features.len(), cutouts.len());
        let last = fc.features.last().unwrap();
        assert_eq!(
            last.property("index").unwrap().as_u64().unwrap(),
            (cutouts.len() - 1) as u64
        );
    }

    #[test]
    fn extent_covers_all_sheets() {
        let route = Route::new(vec![heading(Coordinate::new(8.0, 47.0), 45.0, 300.0, 100)]).unwrap();
        let cutouts = plan(&route, &options(25_000.0)).unwrap();
        let extent = cutouts_extent(&cutouts);
        for cutout in &cutouts {
            assert_eq!(extent.union(cutout.extent), extent);
        }
    }
}
