//! Merging a fresh landmark list with previously computed distances.

use geo::{Distance, Haversine, Point};
use tracing::debug;

use crate::models::{CountryTable, Landmark, LandmarkTable};

/// Landmarks that moved further than this have their old distances thrown
/// away.
pub const MOVE_THRESHOLD_KM: f64 = 10.0;

#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Every country distance is known
    pub complete: Vec<Landmark>,
    /// At least one country distance still has to be computed
    pub incomplete: Vec<Landmark>,
    /// Addresses present in both lists whose location changed
    pub moved: usize,
    /// Addresses from the old list that are no longer active
    pub dropped: usize,
}

impl Reconciliation {
    pub fn len(&self) -> usize {
        self.complete.len() + self.incomplete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Great-circle distance in km between two (longitude, latitude) points on
/// the spherical Earth (GRS 80 mean radius).
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    Haversine.distance(Point::from(from), Point::from(to)) / 1000.0
}

/// Give every landmark in `new` one distance slot per country, carrying
/// over values from `old` for landmarks that have not moved, and split the
/// result into complete and incomplete records.
pub fn reconcile(old: &LandmarkTable, new: LandmarkTable, countries: &CountryTable) -> Reconciliation {
    reconcile_with_threshold(old, new, countries, MOVE_THRESHOLD_KM)
}

pub fn reconcile_with_threshold(
    old: &LandmarkTable,
    new: LandmarkTable,
    countries: &CountryTable,
    threshold_km: f64,
) -> Reconciliation {
    let mut out = Reconciliation {
        dropped: old.keys().filter(|addr| !new.contains_key(*addr)).count(),
        ..Default::default()
    };

    for (addr, mut landmark) in new {
        let prior = match old.get(&addr) {
            Some(prev) => {
                let moved_km = haversine_km(
                    (prev.longitude, prev.latitude),
                    (landmark.longitude, landmark.latitude),
                );
                if moved_km > threshold_km {
                    debug!("{} moved {:.1} km, discarding old distances", addr, moved_km);
                    out.moved += 1;
                    None
                } else {
                    Some(prev)
                }
            }
            None => None,
        };

        landmark.distances = countries
            .codes()
            .map(|code| {
                let carried = prior.and_then(|p| p.distances.get(code).copied().flatten());
                (code.to_string(), carried)
            })
            .collect();

        if landmark.is_complete() {
            out.complete.push(landmark);
        } else {
            out.incomplete.push(landmark);
        }
    }

    out
}
