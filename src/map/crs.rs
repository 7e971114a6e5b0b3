//! Geographic coordinate reference systems the map may be expressed in.

use serde::{Deserialize, Serialize};

/// A reference ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    /// Semi-major axis in metres
    pub a: f64,
    /// Flattening
    pub f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };
    pub const GRS80: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_222_101,
    };
    pub const CLARKE_1866: Ellipsoid = Ellipsoid {
        a: 6_378_206.4,
        f: 1.0 / 294.978_698_213_898,
    };
}

/// The geodetic CRS of the source map: longitude/latitude in degrees on a
/// particular datum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCrs {
    pub name: String,
    pub ellipsoid: Ellipsoid,
}

impl SourceCrs {
    pub fn wgs84() -> Self {
        Self {
            name: "EPSG:4326".to_string(),
            ellipsoid: Ellipsoid::WGS84,
        }
    }

    /// Resolve a CRS identifier such as `EPSG:4269` or
    /// `urn:ogc:def:crs:OGC:1.3:CRS84`.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_uppercase();
        let code = upper
            .rsplit(|c| c == ':' || c == '/')
            .next()
            .unwrap_or(upper.as_str());

        let (canonical, ellipsoid) = match code {
            "CRS84" | "4326" => ("EPSG:4326", Ellipsoid::WGS84),
            "4269" => ("EPSG:4269", Ellipsoid::GRS80),
            "4258" => ("EPSG:4258", Ellipsoid::GRS80),
            "4267" => ("EPSG:4267", Ellipsoid::CLARKE_1866),
            _ => return None,
        };
        Some(Self {
            name: canonical.to_string(),
            ellipsoid,
        })
    }

    /// Resolve the WKT of a shapefile `.prj` by its datum. Projected systems
    /// are not supported.
    pub fn from_wkt(wkt: &str) -> Option<Self> {
        let upper = wkt.to_uppercase();
        if upper.trim_start().starts_with("PROJCS") || upper.contains("PROJCRS[") {
            return None;
        }
        let start = upper.find("DATUM[\"")? + "DATUM[\"".len();
        let datum = &upper[start..start + upper[start..].find('"')?];
        let datum = datum.strip_prefix("D_").unwrap_or(datum).replace(' ', "_");

        let code = match datum.as_str() {
            "WGS_1984" | "WORLD_GEODETIC_SYSTEM_1984" => "EPSG:4326",
            "NORTH_AMERICAN_1983" | "NORTH_AMERICAN_DATUM_1983" => "EPSG:4269",
            "ETRS_1989" | "EUROPEAN_TERRESTRIAL_REFERENCE_SYSTEM_1989" => "EPSG:4258",
            "NORTH_AMERICAN_1927" | "NORTH_AMERICAN_DATUM_1927" => "EPSG:4267",
            _ => return None,
        };
        Self::from_name(code)
    }
}

impl Default for SourceCrs {
    fn default() -> Self {
        Self::wgs84()
    }
}
