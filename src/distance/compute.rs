//! Per-landmark distance computation over a shared map snapshot.

use std::collections::BTreeMap;

use geo::{Distance, Euclidean, Intersects, MultiPolygon, Point};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::aeqd::AzimuthalEquidistant;
use crate::map::geometry::ensure_valid_screened;
use crate::map::{CountryMap, SourceCrs};
use crate::models::Landmark;

/// Everything a worker needs, built once by the coordinator and shared
/// read-only with every worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub crs: SourceCrs,
    pub countries: BTreeMap<String, MultiPolygon<f64>>,
    /// Distances are rounded to a multiple of this many metres.
    pub resolution: f64,
}

impl MapSnapshot {
    pub fn new(map: CountryMap, resolution: f64) -> Self {
        Self {
            crs: map.crs,
            countries: map.countries,
            resolution,
        }
    }
}

/// A (landmark, country) pair that could not be measured this run.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPair {
    pub code: String,
    pub reason: String,
}

/// Result of analysing one landmark.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub landmark: Landmark,
    pub skipped: Vec<SkippedPair>,
}

/// Fill in every unknown country distance for `landmark`.
///
/// Known distances are never touched, so calling this again on its own
/// output is a no-op. Countries whose projected shape cannot be made valid
/// are left unknown and reported in `skipped`.
pub fn analyze_landmark(mut landmark: Landmark, snapshot: &MapSnapshot) -> Analysis {
    let proj = AzimuthalEquidistant::new(
        landmark.longitude,
        landmark.latitude,
        &snapshot.crs.ellipsoid,
    );
    // Location of the landmark on the projected map
    let origin = Point::new(0.0, 0.0);
    let mut skipped = Vec::new();

    for (code, slot) in landmark.distances.iter_mut() {
        if slot.is_some() {
            continue;
        }
        let Some(shape) = snapshot.countries.get(code) else {
            warn!(
                "no map for {}, distance from ({},{}) left unknown",
                code, landmark.longitude, landmark.latitude
            );
            skipped.push(SkippedPair {
                code: code.clone(),
                reason: "country not in map".to_string(),
            });
            continue;
        };

        let projected = match ensure_valid_screened(proj.project_shape(shape)) {
            Ok(p) => p,
            Err(why) => {
                warn!(
                    "aeqd({},{}) map for {} invalid: {}",
                    landmark.longitude, landmark.latitude, code, why
                );
                skipped.push(SkippedPair {
                    code: code.clone(),
                    reason: why,
                });
                continue;
            }
        };

        let dist = Euclidean.distance(&origin, &projected);
        let inside = origin.intersects(&projected);
        *slot = Some(signed_distance(dist, snapshot.resolution, inside));
    }

    Analysis { landmark, skipped }
}

/// Round to the nearest multiple of `resolution`; negate when the
/// landmark is inside the country. Zero is always positive zero.
pub fn signed_distance(dist: f64, resolution: f64, inside: bool) -> f64 {
    let rounded = (dist / resolution).round() * resolution;
    if rounded == 0.0 {
        0.0
    } else if inside {
        -rounded
    } else {
        rounded
    }
}
