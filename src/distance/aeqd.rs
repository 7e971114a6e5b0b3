//! Azimuthal-equidistant projection on an ellipsoid.
//!
//! Every point is placed at its geodesic distance from the centre, along
//! its forward azimuth, so the planar distance from the origin to any
//! projected point is the true surface distance in metres.

use geo::{Coord, MapCoords, MultiPolygon};
use geographiclib_rs::{Geodesic, InverseGeodesic};

use crate::map::Ellipsoid;

pub struct AzimuthalEquidistant {
    geodesic: Geodesic,
    lon0: f64,
    lat0: f64,
}

impl AzimuthalEquidistant {
    /// Projection centred on (`lon0`, `lat0`) in degrees.
    pub fn new(lon0: f64, lat0: f64, ellipsoid: &Ellipsoid) -> Self {
        Self {
            geodesic: Geodesic::new(ellipsoid.a, ellipsoid.f),
            lon0,
            lat0,
        }
    }

    /// Project one longitude/latitude coordinate to metres east/north of
    /// the centre.
    pub fn project(&self, c: Coord<f64>) -> Coord<f64> {
        let (s12, azi1, _azi2, _a12): (f64, f64, f64, f64) =
            self.geodesic.inverse(self.lat0, self.lon0, c.y, c.x);
        let azi = azi1.to_radians();
        Coord {
            x: s12 * azi.sin(),
            y: s12 * azi.cos(),
        }
    }

    pub fn project_shape(&self, shape: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        shape.map_coords(|c| self.project(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn test_centre_maps_to_origin() {
        let proj = AzimuthalEquidistant::new(13.4, 52.5, &Ellipsoid::WGS84);
        let p = proj.project(coord! { x: 13.4, y: 52.5 });
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);
    }

    #[test]
    fn test_one_degree_east_on_equator() {
        let proj = AzimuthalEquidistant::new(0.0, 0.0, &Ellipsoid::WGS84);
        let p = proj.project(coord! { x: 1.0, y: 0.0 });
        // a * pi / 180 on the WGS 84 equator
        assert!((p.x - 111_319.49).abs() < 0.1, "{:?}", p);
        assert!(p.y.abs() < 1e-6);
    }

    #[test]
    fn test_north_is_positive_y() {
        let proj = AzimuthalEquidistant::new(0.0, 0.0, &Ellipsoid::WGS84);
        let p = proj.project(coord! { x: 0.0, y: 1.0 });
        // Meridian arc from 0 to 1 degree north
        assert!((p.y - 110_574.4).abs() < 1.0, "{:?}", p);
        assert!(p.x.abs() < 1e-6);
    }

    #[test]
    fn test_datum_matters() {
        let wgs = AzimuthalEquidistant::new(0.0, 0.0, &Ellipsoid::WGS84);
        let clarke = AzimuthalEquidistant::new(0.0, 0.0, &Ellipsoid::CLARKE_1866);
        let c = coord! { x: 1.0, y: 0.0 };
        assert!((wgs.project(c).x - clarke.project(c).x).abs() > 1.0);
    }
}
