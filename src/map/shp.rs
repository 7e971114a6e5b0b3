//! Reading the map from an ESRI shapefile, either as loose files or packed
//! in a zip archive the way Natural Earth ships it.

use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use geo::Geometry;
use shapefile::dbase::{self, FieldValue, Record};
use shapefile::{Shape, ShapeReader};
use tracing::warn;
use zip::ZipArchive;

use super::crs::SourceCrs;
use super::features::{accept, FeatureKeys, RawMap};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};

/// The member files of one shapefile, read into memory.
#[derive(Debug, Clone)]
pub struct ShapefileParts {
    pub shp: Vec<u8>,
    pub dbf: Vec<u8>,
    /// WKT from the `.prj`, if there is one
    pub prj: Option<String>,
}

impl ShapefileParts {
    /// A `.shp` file with its `.dbf` and optional `.prj` next to it.
    pub fn from_shp_path(path: &Path) -> Result<Self> {
        let shp = fs::read(path).map_err(|e| Error::io(path, e))?;
        let dbf_path = path.with_extension("dbf");
        let dbf = fs::read(&dbf_path).map_err(|e| Error::io(&dbf_path, e))?;
        let prj_path = path.with_extension("prj");
        let prj = match fs::read_to_string(&prj_path) {
            Ok(wkt) => Some(wkt),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::io(&prj_path, e)),
        };
        Ok(Self { shp, dbf, prj })
    }

    /// The first `.shp` in the archive (by name) and its sibling members.
    pub fn from_zip<R: Read + Seek>(reader: R, source_name: &str) -> Result<Self> {
        let zip_err = |e: zip::result::ZipError| Error::Map {
            path: source_name.to_string(),
            message: e.to_string(),
        };
        let mut archive = ZipArchive::new(reader).map_err(zip_err)?;
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();

        let shp_name = names
            .iter()
            .filter(|n| has_extension(n, "shp"))
            .min()
            .ok_or_else(|| Error::Map {
                path: source_name.to_string(),
                message: "no .shp file in archive".to_string(),
            })?;
        let stem = &shp_name[..shp_name.len() - ".shp".len()];
        let sibling = |ext: &str| {
            names
                .iter()
                .find(|n| n.len() == shp_name.len() && n.starts_with(stem) && has_extension(n, ext))
        };

        let shp = read_member(&mut archive, shp_name).map_err(zip_err)?;
        let dbf_name = sibling("dbf").ok_or_else(|| Error::Map {
            path: source_name.to_string(),
            message: format!("{} has no .dbf alongside it", shp_name),
        })?;
        let dbf = read_member(&mut archive, dbf_name).map_err(zip_err)?;
        let prj = match sibling("prj") {
            Some(name) => {
                let bytes = read_member(&mut archive, name).map_err(zip_err)?;
                Some(String::from_utf8_lossy(&bytes).into_owned())
            }
            None => None,
        };
        Ok(Self { shp, dbf, prj })
    }
}

fn has_extension(name: &str, ext: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, e)| e.eq_ignore_ascii_case(ext))
}

fn read_member<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> zip::result::ZipResult<Vec<u8>> {
    let mut member = archive.by_name(name)?;
    let mut buf = Vec::new();
    member.read_to_end(&mut buf)?;
    Ok(buf)
}

impl RawMap {
    /// Build the map from shapefile members. A missing `.prj` means WGS 84.
    pub fn from_shapefile(parts: ShapefileParts, source_name: &str, keys: &FeatureKeys) -> Result<Self> {
        let map_err = |message: String| Error::Map {
            path: source_name.to_string(),
            message,
        };

        let crs = match &parts.prj {
            Some(wkt) => SourceCrs::from_wkt(wkt).ok_or_else(|| {
                map_err(format!("unsupported coordinate reference system {}", wkt.trim()))
            })?,
            None => {
                warn!("{}: no .prj, assuming WGS 84", source_name);
                SourceCrs::wgs84()
            }
        };

        let shapes = ShapeReader::new(Cursor::new(parts.shp)).map_err(|e| map_err(e.to_string()))?;
        let records = dbase::Reader::new(Cursor::new(parts.dbf)).map_err(|e| map_err(e.to_string()))?;
        let mut reader = shapefile::Reader::new(shapes, records);

        let mut diag = Diagnostics::new(source_name);
        let mut features = Vec::new();
        for (i, item) in reader.iter_shapes_and_records().enumerate() {
            let (shape, record) = item.map_err(|e| map_err(format!("record {}: {}", i, e)))?;
            let unit = text_field(&record, &keys.unit);
            let sovereign = text_field(&record, &keys.sovereign);
            let geometry = match shape {
                Shape::NullShape => None,
                shape => Some(Geometry::<f64>::try_from(shape).map_err(|e| e.to_string())),
            };
            if let Some(f) = accept(&mut diag, keys, i, unit, sovereign, geometry) {
                features.push(f);
            }
        }

        diag.finish()?;
        Ok(Self { crs, features })
    }
}

fn text_field(record: &Record, key: &str) -> Option<String> {
    match record.get(key)? {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => Some(s.trim().to_uppercase()),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::crs::Ellipsoid;
    use geo::Area;
    use shapefile::dbase::TableWriterBuilder;
    use shapefile::{Point, Polygon, PolygonRing};
    use std::io::Write;
    use std::path::PathBuf;

    const NAD83: &str = r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

    fn square(x0: f64, y0: f64) -> Polygon {
        // Shapefile outer rings run clockwise.
        Polygon::new(PolygonRing::Outer(vec![
            Point::new(x0, y0),
            Point::new(x0, y0 + 1.0),
            Point::new(x0 + 1.0, y0 + 1.0),
            Point::new(x0 + 1.0, y0),
            Point::new(x0, y0),
        ]))
    }

    fn record(unit: &str, sovereign: &str) -> Record {
        let mut record = Record::default();
        record.insert("GU_A3".to_string(), FieldValue::Character(Some(unit.to_string())));
        record.insert("SOV_A3".to_string(), FieldValue::Character(Some(sovereign.to_string())));
        record
    }

    /// Write `units.shp` (+ .shx, .dbf and optionally .prj) into `dir`.
    fn write_units(dir: &Path, prj: Option<&str>) -> PathBuf {
        let path = dir.join("units.shp");
        let table = TableWriterBuilder::new()
            .add_character_field("GU_A3".try_into().unwrap(), 3)
            .add_character_field("SOV_A3".try_into().unwrap(), 3);
        let mut writer = shapefile::Writer::from_path(&path, table).unwrap();
        writer
            .write_shape_and_record(&square(0.0, 0.0), &record("fra", "FR1"))
            .unwrap();
        writer
            .write_shape_and_record(&square(5.0, 5.0), &record("GUF", "FR1"))
            .unwrap();
        drop(writer);
        if let Some(wkt) = prj {
            fs::write(dir.join("units.prj"), wkt).unwrap();
        }
        path
    }

    #[test]
    fn test_loose_shapefile() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_units(dir.path(), None);

        let map = RawMap::load(&path, &FeatureKeys::default()).unwrap();
        assert_eq!(map.crs, SourceCrs::wgs84());
        assert_eq!(map.features.len(), 2);
        assert_eq!(map.features[0].unit, "FRA");
        assert_eq!(map.features[0].sovereign, "FR1");
        assert!((map.features[1].geometry.unsigned_area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zipped_shapefile_with_prj() {
        let dir = tempfile::tempdir().unwrap();
        write_units(dir.path(), Some(NAD83));

        let zip_path = dir.path().join("ne_units.zip");
        let mut zw = zip::ZipWriter::new(fs::File::create(&zip_path).unwrap());
        for ext in ["shp", "shx", "dbf", "prj"] {
            zw.start_file(
                format!("ne_units.{}", ext),
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
            zw.write_all(&fs::read(dir.path().join(format!("units.{}", ext))).unwrap())
                .unwrap();
        }
        zw.finish().unwrap();

        let map = RawMap::load(&zip_path, &FeatureKeys::default()).unwrap();
        assert_eq!(map.crs.ellipsoid, Ellipsoid::GRS80);
        assert_eq!(map.crs.name, "EPSG:4269");
        let units: Vec<&str> = map.features.iter().map(|f| f.unit.as_str()).collect();
        assert_eq!(units, vec!["FRA", "GUF"]);
    }

    #[test]
    fn test_projected_prj_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_units(
            dir.path(),
            Some(r#"PROJCS["WGS_1984_Web_Mercator",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]]]"#),
        );
        match RawMap::load(&path, &FeatureKeys::default()) {
            Err(Error::Map { message, .. }) => assert!(message.contains("unsupported")),
            other => panic!("expected map error, got {:?}", other),
        }
    }

    #[test]
    fn test_archive_without_shapefile() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zw = zip::ZipWriter::new(&mut buf);
            zw.start_file("readme.txt", zip::write::SimpleFileOptions::default())
                .unwrap();
            zw.write_all(b"nothing here").unwrap();
            zw.finish().unwrap();
        }
        buf.set_position(0);
        assert!(ShapefileParts::from_zip(buf, "empty.zip").is_err());
    }
}
