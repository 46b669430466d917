//! Point-in-polygon borough lookup.
//!
//! Borough polygons come from a `GeoJSON` `FeatureCollection` whose features
//! carry a `name` property. Polygons are bulk-loaded into an R-tree keyed by
//! bounding box; a lookup tests only the candidates whose box contains the
//! point.

use std::path::Path;

use geo::{BoundingRect as _, Contains as _, MultiPolygon};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};

use crate::IndexError;

struct BoroughEntry {
    order: usize,
    name: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for BoroughEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree of borough boundaries.
pub struct BoroughLocator {
    boroughs: RTree<BoroughEntry>,
}

impl BoroughLocator {
    /// Loads boundaries from a `GeoJSON` file.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the file cannot be read or is not a
    /// `FeatureCollection`.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let contents = std::fs::read_to_string(path)?;
        let locator = Self::from_geojson_str(&contents)?;
        log::info!(
            "Loaded {} borough boundaries from {}",
            locator.len(),
            path.display()
        );
        Ok(locator)
    }

    /// Builds the locator from `GeoJSON` text.
    ///
    /// Features without a `name` or without a polygonal geometry are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if the text is not a `GeoJSON`
    /// `FeatureCollection`.
    pub fn from_geojson_str(geojson: &str) -> Result<Self, IndexError> {
        let GeoJson::FeatureCollection(collection) = geojson.parse::<GeoJson>()? else {
            return Err(IndexError::Boundaries {
                message: "expected a FeatureCollection".to_string(),
            });
        };

        let mut entries = Vec::with_capacity(collection.features.len());
        for (order, feature) in collection.features.into_iter().enumerate() {
            let Some(name) = feature
                .property("name")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string)
            else {
                log::warn!("Skipping boundary feature without a name");
                continue;
            };
            let Some(polygon) = feature.geometry.and_then(to_multipolygon) else {
                log::warn!("Skipping boundary {name}: not a polygon");
                continue;
            };
            let envelope = compute_envelope(&polygon);
            entries.push(BoroughEntry {
                order,
                name,
                envelope,
                polygon,
            });
        }

        Ok(Self {
            boroughs: RTree::bulk_load(entries),
        })
    }

    /// Name of the borough containing the point, if any.
    ///
    /// When polygons overlap, the first in file order wins.
    #[must_use]
    pub fn lookup(&self, latitude: f64, longitude: f64) -> Option<&str> {
        let point = geo::Point::new(longitude, latitude);
        let query_env = AABB::from_point([longitude, latitude]);

        self.boroughs
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .min_by_key(|entry| entry.order)
            .map(|entry| entry.name.as_str())
    }

    /// Number of boroughs loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boroughs.size()
    }

    /// Returns `true` if no borough was loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boroughs.size() == 0
    }
}

fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geometry: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geometry {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(name: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> String {
        format!(
            r#"{{"type":"Feature","properties":{{"name":"{name}"}},"geometry":{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}}}"#
        )
    }

    fn collection(features: &[String]) -> String {
        format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        )
    }

    #[test]
    fn finds_containing_borough() {
        let geojson = collection(&[
            square("Camden", -0.20, 51.51, -0.10, 51.57),
            square("Hackney", -0.10, 51.52, 0.00, 51.58),
        ]);
        let locator = BoroughLocator::from_geojson_str(&geojson).unwrap();
        assert_eq!(locator.len(), 2);
        assert_eq!(locator.lookup(51.54, -0.15), Some("Camden"));
        assert_eq!(locator.lookup(51.55, -0.05), Some("Hackney"));
        assert_eq!(locator.lookup(52.00, -0.05), None);
    }

    #[test]
    fn skips_unnamed_features() {
        let unnamed = r#"{"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}}"#;
        let geojson = collection(&[unnamed.to_string(), square("Camden", 0.0, 0.0, 1.0, 1.0)]);
        let locator = BoroughLocator::from_geojson_str(&geojson).unwrap();
        assert_eq!(locator.len(), 1);
        assert_eq!(locator.lookup(0.5, 0.5), Some("Camden"));
    }

    #[test]
    fn rejects_bare_geometry() {
        let geojson = r#"{"type":"Point","coordinates":[0,0]}"#;
        assert!(matches!(
            BoroughLocator::from_geojson_str(geojson),
            Err(IndexError::Boundaries { .. })
        ));
    }
}
