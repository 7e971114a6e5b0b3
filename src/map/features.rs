//! Reading the raw political map: one feature per geographic unit.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use geo::{Geometry, MultiPolygon};
use geojson::GeoJson;
use serde_json::{Map, Value};
use tracing::info;

use super::crs::SourceCrs;
use super::geometry::to_multi_polygon;
use super::shp::ShapefileParts;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::io::open_with_auto_compression;

/// Property names identifying a feature's unit and sovereign.
#[derive(Debug, Clone)]
pub struct FeatureKeys {
    pub unit: String,
    pub sovereign: String,
}

impl Default for FeatureKeys {
    fn default() -> Self {
        Self {
            unit: "GU_A3".to_string(),
            sovereign: "SOV_A3".to_string(),
        }
    }
}

/// One geographic unit as it appears in the map, before merging.
#[derive(Debug, Clone)]
pub struct RawFeature {
    pub unit: String,
    pub sovereign: String,
    pub geometry: MultiPolygon<f64>,
}

/// The whole map: its features in file order plus the CRS they are in.
#[derive(Debug, Clone)]
pub struct RawMap {
    pub crs: SourceCrs,
    pub features: Vec<RawFeature>,
}

impl RawMap {
    /// Load the map, choosing the reader by extension: `.shp` and `.zip`
    /// are ESRI shapefiles, anything else is GeoJSON (possibly compressed).
    pub fn load(path: &Path, keys: &FeatureKeys) -> Result<Self> {
        info!("Loading map from {}", path.display());
        let source_name = path.display().to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let map = match ext.as_deref() {
            Some("shp") => {
                Self::from_shapefile(ShapefileParts::from_shp_path(path)?, &source_name, keys)?
            }
            Some("zip") => {
                let file = File::open(path).map_err(|e| Error::io(path, e))?;
                let parts = ShapefileParts::from_zip(BufReader::new(file), &source_name)?;
                Self::from_shapefile(parts, &source_name, keys)?
            }
            _ => Self::from_reader(open_with_auto_compression(path)?, &source_name, keys)?,
        };
        info!(
            "Loaded {} geographic units ({})",
            map.features.len(),
            map.crs.name
        );
        Ok(map)
    }

    /// Read a GeoJSON FeatureCollection.
    pub fn from_reader<R: Read>(reader: R, source_name: &str, keys: &FeatureKeys) -> Result<Self> {
        let geojson = GeoJson::from_reader(reader).map_err(|e| Error::Map {
            path: source_name.to_string(),
            message: e.to_string(),
        })?;
        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => {
                return Err(Error::Map {
                    path: source_name.to_string(),
                    message: "expected a FeatureCollection".to_string(),
                })
            }
        };

        let crs = match collection.foreign_members.as_ref().and_then(crs_name) {
            None => SourceCrs::wgs84(),
            Some(name) => SourceCrs::from_name(name).ok_or_else(|| Error::Map {
                path: source_name.to_string(),
                message: format!("unsupported coordinate reference system {}", name),
            })?,
        };

        let mut diag = Diagnostics::new(source_name);
        let mut features = Vec::with_capacity(collection.features.len());

        for (i, feature) in collection.features.into_iter().enumerate() {
            let unit = string_property(&feature, &keys.unit);
            let sovereign = string_property(&feature, &keys.sovereign);
            let geometry = feature.geometry.map(|g| {
                Geometry::<f64>::try_from(g.value).map_err(|e| e.to_string())
            });
            if let Some(f) = accept(&mut diag, keys, i, unit, sovereign, geometry) {
                features.push(f);
            }
        }

        diag.finish()?;
        Ok(Self { crs, features })
    }
}

/// Check one feature's parts, recording every problem in `diag`. `geometry`
/// is `None` when the feature has none at all.
pub(super) fn accept(
    diag: &mut Diagnostics,
    keys: &FeatureKeys,
    index: usize,
    unit: Option<String>,
    sovereign: Option<String>,
    geometry: Option<std::result::Result<Geometry<f64>, String>>,
) -> Option<RawFeature> {
    let (unit, sovereign) = match (unit, sovereign) {
        (Some(u), Some(s)) => (u, s),
        _ => {
            diag.push(format!(
                "feature {}: missing {} or {} property",
                index, keys.unit, keys.sovereign
            ));
            return None;
        }
    };

    let geometry = match geometry {
        Some(Ok(g)) => g,
        Some(Err(e)) => {
            diag.push(format!("GU '{}': {}", unit, e));
            return None;
        }
        None => {
            diag.push(format!("GU '{}' has no geometry", unit));
            return None;
        }
    };
    match to_multi_polygon(geometry) {
        Some(geometry) => Some(RawFeature {
            unit,
            sovereign,
            geometry,
        }),
        None => {
            diag.push(format!("GU '{}' is not a polygon", unit));
            None
        }
    }
}

/// Name from a legacy `{"crs": {"type": "name", "properties": {"name": ...}}}`
/// member.
fn crs_name(members: &Map<String, Value>) -> Option<&str> {
    members
        .get("crs")
        .and_then(|crs| crs.pointer("/properties/name"))
        .and_then(Value::as_str)
}

fn string_property(feature: &geojson::Feature, key: &str) -> Option<String> {
    feature
        .property(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::crs::Ellipsoid;

    const TWO_UNITS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"GU_A3": "fra", "SOV_A3": "FR1"},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}
            },
            {
                "type": "Feature",
                "properties": {"GU_A3": "GUF", "SOV_A3": "FR1"},
                "geometry": {"type": "MultiPolygon", "coordinates": [[[[5,5],[6,5],[6,6],[5,6],[5,5]]]]}
            }
        ]
    }"#;

    #[test]
    fn test_reads_units() {
        let map = RawMap::from_reader(TWO_UNITS.as_bytes(), "map.geojson", &FeatureKeys::default())
            .unwrap();
        assert_eq!(map.crs, SourceCrs::wgs84());
        assert_eq!(map.features.len(), 2);
        assert_eq!(map.features[0].unit, "FRA");
        assert_eq!(map.features[0].sovereign, "FR1");
        assert_eq!(map.features[1].geometry.0.len(), 1);
    }

    #[test]
    fn test_honours_legacy_crs_member() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::4269"}},
            "features": []
        }"#;
        let map = RawMap::from_reader(text.as_bytes(), "map.geojson", &FeatureKeys::default())
            .unwrap();
        assert_eq!(map.crs.ellipsoid, Ellipsoid::GRS80);
    }

    #[test]
    fn test_reports_every_bad_feature() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"GU_A3": "AAA"},
                 "geometry": {"type": "Point", "coordinates": [0, 0]}},
                {"type": "Feature", "properties": {"GU_A3": "BBB", "SOV_A3": "BBB"},
                 "geometry": {"type": "Point", "coordinates": [0, 0]}},
                {"type": "Feature", "properties": {"GU_A3": "CCC", "SOV_A3": "CCC"},
                 "geometry": null}
            ]
        }"#;
        match RawMap::from_reader(text.as_bytes(), "map.geojson", &FeatureKeys::default()) {
            Err(Error::Config(errs)) => assert_eq!(errs.messages.len(), 3),
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
