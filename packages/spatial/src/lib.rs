#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index for soil polygon attribution.
//!
//! Loads the soil map polygons once at startup, builds an R-tree over their
//! bounding boxes, and answers "which polygon holds this point" queries
//! with an exact containment test on the R-tree candidates.
//!
//! Polygons are expected not to overlap. When they do, the feature that
//! came first in the source collection wins, on every call.

use std::path::Path;

use geo::{BoundingRect, Intersects, MultiPolygon};
use geojson::GeoJson;
use landslide_projection::{Crs, Point2D};
use rstar::{AABB, RTree, RTreeObject};

/// Attribute payload of a polygon feature (`GeoJSON` `properties`).
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Label reported when a point falls outside every polygon.
pub const UNKNOWN_ATTRIBUTE: &str = "Unknown";

/// Errors from loading or querying a [`PolygonAttributeIndex`].
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// The query point is malformed.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The polygon file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The polygon file is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),

    /// The document parsed but is not a feature collection.
    #[error("Unsupported GeoJSON document: {0}")]
    UnsupportedDocument(String),
}

/// A polygon with its attribute payload, in load order.
#[derive(Debug, Clone)]
pub struct PolygonFeature {
    /// Polygon rings. Single polygons are stored as a one-member
    /// [`MultiPolygon`].
    pub geometry: MultiPolygon<f64>,
    /// Field name to value mapping.
    pub attributes: Attributes,
}

/// Outcome of a point lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeLookup<'a> {
    /// The point is inside a polygon carrying the configured field.
    Found(&'a serde_json::Value),
    /// No polygon holds the point, or the matching polygon lacks the field.
    Unknown,
}

impl AttributeLookup<'_> {
    /// Renders the lookup the way the API reports soil types.
    ///
    /// Strings are returned as-is, other values in their JSON form, an
    /// explicit `null` attribute as `None`, and [`AttributeLookup::Unknown`]
    /// as [`UNKNOWN_ATTRIBUTE`].
    #[must_use]
    pub fn to_label(&self) -> Option<String> {
        match self {
            Self::Found(serde_json::Value::Null) => None,
            Self::Found(serde_json::Value::String(s)) => Some(s.clone()),
            Self::Found(value) => Some(value.to_string()),
            Self::Unknown => Some(UNKNOWN_ATTRIBUTE.to_string()),
        }
    }
}

/// A polygon stored in the R-tree with its load position.
struct IndexedPolygon {
    position: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
    attributes: Attributes,
}

impl RTreeObject for IndexedPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over the soil polygons.
///
/// Constructed once and shared read-only across request workers.
pub struct PolygonAttributeIndex {
    tree: RTree<IndexedPolygon>,
    crs: Crs,
    attribute_field: String,
}

impl PolygonAttributeIndex {
    /// Builds an index from features in load order.
    ///
    /// Features with an empty geometry are skipped but do not shift the
    /// positions of the features after them.
    #[must_use]
    pub fn new(features: Vec<PolygonFeature>, attribute_field: &str, crs: Crs) -> Self {
        Self::build(features.into_iter().enumerate(), attribute_field, crs)
    }

    /// Loads a `GeoJSON` feature collection from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a `GeoJSON`
    /// feature collection.
    pub fn load_geojson(path: &Path, attribute_field: &str, crs: Crs) -> Result<Self, SpatialError> {
        let contents = std::fs::read_to_string(path)?;
        let index = Self::from_geojson_str(&contents, attribute_field, crs)?;
        log::info!(
            "Loaded {} soil polygons from {} into spatial index",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    /// Parses a `GeoJSON` feature collection (or a single feature).
    ///
    /// Only `Polygon` and `MultiPolygon` geometries are indexed; other
    /// features are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not `GeoJSON` or is a bare geometry.
    pub fn from_geojson_str(
        geojson_str: &str,
        attribute_field: &str,
        crs: Crs,
    ) -> Result<Self, SpatialError> {
        let geojson: GeoJson = geojson_str.parse().map_err(Box::new)?;

        let features = match geojson {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => {
                return Err(SpatialError::UnsupportedDocument(
                    "expected a FeatureCollection, found a bare geometry".to_string(),
                ));
            }
        };

        let entries = features
            .into_iter()
            .enumerate()
            .filter_map(|(position, feature)| {
                let Some(geometry) = feature.geometry.and_then(to_multipolygon) else {
                    log::warn!("Skipping feature {position}: missing or non-polygon geometry");
                    return None;
                };
                Some((
                    position,
                    PolygonFeature {
                        geometry,
                        attributes: feature.properties.unwrap_or_default(),
                    },
                ))
            });

        Ok(Self::build(entries, attribute_field, crs))
    }

    fn build(
        features: impl IntoIterator<Item = (usize, PolygonFeature)>,
        attribute_field: &str,
        crs: Crs,
    ) -> Self {
        let entries: Vec<IndexedPolygon> = features
            .into_iter()
            .filter_map(|(position, feature)| {
                let Some(envelope) = compute_envelope(&feature.geometry) else {
                    log::warn!("Skipping feature {position}: empty geometry");
                    return None;
                };
                Some(IndexedPolygon {
                    position,
                    envelope,
                    polygon: feature.geometry,
                    attributes: feature.attributes,
                })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
            crs,
            attribute_field: attribute_field.to_string(),
        }
    }

    /// Looks up the configured attribute of the polygon holding `point`.
    ///
    /// Points on a polygon boundary count as inside. When several polygons
    /// hold the point, the one loaded first wins.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidGeometry`] if the point is non-finite
    /// or not expressed in the index's reference system.
    pub fn lookup(&self, point: &Point2D) -> Result<AttributeLookup<'_>, SpatialError> {
        if !point.is_finite() {
            return Err(SpatialError::InvalidGeometry(format!(
                "non-finite query point {point}"
            )));
        }
        if !point.is_in(&self.crs) {
            return Err(SpatialError::InvalidGeometry(format!(
                "query point {point} is not in the index reference system {}",
                self.crs
            )));
        }

        let query = geo::Point::new(point.x, point.y);
        let query_env = AABB::from_point([point.x, point.y]);

        let best = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(&query))
            .min_by_key(|entry| entry.position);

        Ok(best
            .and_then(|entry| entry.attributes.get(&self.attribute_field))
            .map_or(AttributeLookup::Unknown, AttributeLookup::Found))
    }

    /// Number of indexed polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no polygons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Reference system of the polygon coordinates.
    #[must_use]
    pub const fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Attribute field returned by [`Self::lookup`].
    #[must_use]
    pub fn attribute_field(&self) -> &str {
        &self.attribute_field
    }
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Bounding box envelope for a [`MultiPolygon`], `None` when it is empty.
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Polygon, polygon};
    use serde_json::json;

    use super::*;

    fn square(min_x: f64, min_y: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: min_x, y: min_y),
            (x: min_x + size, y: min_y),
            (x: min_x + size, y: min_y + size),
            (x: min_x, y: min_y + size),
            (x: min_x, y: min_y),
        ]])
    }

    fn feature(geometry: MultiPolygon<f64>, snum: serde_json::Value) -> PolygonFeature {
        let mut attributes = Attributes::new();
        attributes.insert("SNUM".to_string(), snum);
        PolygonFeature {
            geometry,
            attributes,
        }
    }

    fn wgs(x: f64, y: f64) -> Point2D {
        Point2D::lon_lat(x, y)
    }

    #[test]
    fn point_inside_polygon_returns_attribute() {
        let index = PolygonAttributeIndex::new(
            vec![
                feature(square(0.0, 0.0, 1.0), json!("S12")),
                feature(square(5.0, 5.0, 1.0), json!("S40")),
            ],
            "SNUM",
            Crs::WGS84,
        );

        assert_eq!(
            index.lookup(&wgs(0.5, 0.5)).unwrap(),
            AttributeLookup::Found(&json!("S12"))
        );
        assert_eq!(
            index.lookup(&wgs(5.25, 5.75)).unwrap(),
            AttributeLookup::Found(&json!("S40"))
        );
    }

    #[test]
    fn point_outside_all_boxes_is_unknown() {
        let index = PolygonAttributeIndex::new(
            vec![feature(square(0.0, 0.0, 1.0), json!("S12"))],
            "SNUM",
            Crs::WGS84,
        );
        let result = index.lookup(&wgs(50.0, -20.0)).unwrap();
        assert_eq!(result, AttributeLookup::Unknown);
        assert_eq!(result.to_label().as_deref(), Some(UNKNOWN_ATTRIBUTE));
    }

    #[test]
    fn inside_box_but_outside_polygon_is_unknown() {
        let triangle = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 0.0, y: 4.0),
            (x: 0.0, y: 0.0),
        ]]);
        let index =
            PolygonAttributeIndex::new(vec![feature(triangle, json!(7))], "SNUM", Crs::WGS84);

        assert_eq!(index.lookup(&wgs(3.5, 3.5)).unwrap(), AttributeLookup::Unknown);
        assert_eq!(
            index.lookup(&wgs(0.5, 0.5)).unwrap(),
            AttributeLookup::Found(&json!(7))
        );
    }

    #[test]
    fn overlapping_polygons_resolve_to_first_loaded() {
        let first = feature(square(0.0, 0.0, 2.0), json!("FIRST"));
        let second = feature(square(1.0, 1.0, 2.0), json!("SECOND"));

        let index = PolygonAttributeIndex::new(vec![first.clone(), second.clone()], "SNUM", Crs::WGS84);
        for _ in 0..16 {
            assert_eq!(
                index.lookup(&wgs(1.5, 1.5)).unwrap(),
                AttributeLookup::Found(&json!("FIRST"))
            );
        }

        let reversed = PolygonAttributeIndex::new(vec![second, first], "SNUM", Crs::WGS84);
        assert_eq!(
            reversed.lookup(&wgs(1.5, 1.5)).unwrap(),
            AttributeLookup::Found(&json!("SECOND"))
        );
    }

    #[test]
    fn tie_break_survives_many_overlaps() {
        // Enough entries that the R-tree splits into several nodes.
        let features: Vec<PolygonFeature> = (0..200)
            .map(|i| feature(square(-10.0, -10.0, 20.0), json!(i)))
            .collect();
        let index = PolygonAttributeIndex::new(features, "SNUM", Crs::WGS84);

        assert_eq!(
            index.lookup(&wgs(0.0, 0.0)).unwrap(),
            AttributeLookup::Found(&json!(0))
        );
    }

    #[test]
    fn boundary_point_counts_as_inside() {
        let index = PolygonAttributeIndex::new(
            vec![feature(square(0.0, 0.0, 1.0), json!("EDGE"))],
            "SNUM",
            Crs::WGS84,
        );
        assert_eq!(
            index.lookup(&wgs(1.0, 0.5)).unwrap(),
            AttributeLookup::Found(&json!("EDGE"))
        );
        assert_eq!(
            index.lookup(&wgs(0.0, 0.0)).unwrap(),
            AttributeLookup::Found(&json!("EDGE"))
        );
    }

    #[test]
    fn point_in_hole_is_unknown() {
        let exterior = LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0), (4.0, 4.0)]);
        let donut = MultiPolygon(vec![Polygon::new(exterior, vec![hole])]);

        let index = PolygonAttributeIndex::new(vec![feature(donut, json!("RING"))], "SNUM", Crs::WGS84);
        assert_eq!(index.lookup(&wgs(5.0, 5.0)).unwrap(), AttributeLookup::Unknown);
        assert_eq!(
            index.lookup(&wgs(2.0, 2.0)).unwrap(),
            AttributeLookup::Found(&json!("RING"))
        );
    }

    #[test]
    fn non_finite_point_is_invalid_geometry() {
        let index = PolygonAttributeIndex::new(
            vec![feature(square(0.0, 0.0, 1.0), json!("S12"))],
            "SNUM",
            Crs::WGS84,
        );
        assert!(matches!(
            index.lookup(&wgs(f64::NAN, 0.5)),
            Err(SpatialError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn point_in_other_crs_is_invalid_geometry() {
        let index = PolygonAttributeIndex::new(
            vec![feature(square(0.0, 0.0, 1.0), json!("S12"))],
            "SNUM",
            Crs::WGS84,
        );
        let projected = Point2D::new(0.5, 0.5, Crs::Epsg(32614));
        assert!(matches!(
            index.lookup(&projected),
            Err(SpatialError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn labels() {
        assert_eq!(AttributeLookup::Found(&json!("S12")).to_label().as_deref(), Some("S12"));
        assert_eq!(AttributeLookup::Found(&json!(123)).to_label().as_deref(), Some("123"));
        assert_eq!(AttributeLookup::Found(&json!(12.5)).to_label().as_deref(), Some("12.5"));
        assert_eq!(AttributeLookup::Found(&serde_json::Value::Null).to_label(), None);
    }

    #[test]
    fn loads_geojson_and_keeps_source_positions() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "SNUM": "POINT" },
                    "geometry": { "type": "Point", "coordinates": [0.5, 0.5] }
                },
                {
                    "type": "Feature",
                    "properties": { "SNUM": 101 },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "SNUM": 202, "NAME": "overlap" },
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [[[[1.0, 1.0], [3.0, 1.0], [3.0, 3.0], [1.0, 3.0], [1.0, 1.0]]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": null,
                    "geometry": null
                }
            ]
        });

        let index =
            PolygonAttributeIndex::from_geojson_str(&doc.to_string(), "SNUM", Crs::WGS84).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.attribute_field(), "SNUM");
        assert_eq!(
            index.lookup(&wgs(1.5, 1.5)).unwrap(),
            AttributeLookup::Found(&json!(101))
        );
        assert_eq!(
            index.lookup(&wgs(2.5, 2.5)).unwrap(),
            AttributeLookup::Found(&json!(202))
        );
    }

    #[test]
    fn matched_polygon_without_field_is_unknown() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "MUKEY": "X" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                }
            }]
        });
        let index =
            PolygonAttributeIndex::from_geojson_str(&doc.to_string(), "SNUM", Crs::WGS84).unwrap();
        assert_eq!(index.lookup(&wgs(0.5, 0.5)).unwrap(), AttributeLookup::Unknown);
    }

    #[test]
    fn rejects_bare_geometry_documents() {
        let doc = r#"{ "type": "Point", "coordinates": [0.0, 0.0] }"#;
        assert!(matches!(
            PolygonAttributeIndex::from_geojson_str(doc, "SNUM", Crs::WGS84),
            Err(SpatialError::UnsupportedDocument(_))
        ));
        assert!(PolygonAttributeIndex::from_geojson_str("not json", "SNUM", Crs::WGS84).is_err());
    }

    #[test]
    fn index_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PolygonAttributeIndex>();
    }
}
