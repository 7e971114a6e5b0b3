//! Landmark records: a located network address plus per-country distances.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Signed distance in metres to a country's land area. Negative (or zero)
/// means the landmark lies inside the country. `None` is not yet computed.
pub type Distance = Option<f64>;

/// Landmarks keyed (and therefore ordered) by address.
pub type LandmarkTable = BTreeMap<IpAddr, Landmark>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub addr: IpAddr,
    pub longitude: f64,
    pub latitude: f64,

    /// Passthrough columns from the landmark list, kept verbatim
    pub metadata: BTreeMap<String, String>,

    /// Country code -> distance
    pub distances: BTreeMap<String, Distance>,
}

impl Landmark {
    pub fn new(addr: IpAddr, longitude: f64, latitude: f64) -> Self {
        Self {
            addr,
            longitude,
            latitude,
            metadata: BTreeMap::new(),
            distances: BTreeMap::new(),
        }
    }

    /// Every known country has a distance.
    pub fn is_complete(&self) -> bool {
        self.distances.values().all(Option::is_some)
    }

    /// Country codes whose distance is still unknown, in code order.
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.distances
            .iter()
            .filter(|(_, d)| d.is_none())
            .map(|(code, _)| code.as_str())
    }

    /// Names of every output column this record would produce, other than
    /// `addr`, `longitude` and `latitude`.
    pub fn column_keys(&self) -> impl Iterator<Item = &str> {
        self.metadata
            .keys()
            .chain(self.distances.keys())
            .map(|k| k.as_str())
    }
}

/// Render a distance for CSV output. Whole numbers lose their fractional
/// part, negative zero becomes `0`, unknown is empty.
pub fn format_distance(distance: Distance) -> String {
    match distance {
        None => String::new(),
        Some(d) if d == 0.0 => "0".to_string(),
        Some(d) if d.fract() == 0.0 && d.abs() < 1e15 => format!("{}", d as i64),
        Some(d) => d.to_string(),
    }
}
