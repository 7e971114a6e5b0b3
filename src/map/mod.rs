//! The political world map: raw geographic units, merge rules applied,
//! one land-area shape per country.

mod builder;
mod crs;
mod features;
pub mod geometry;
mod shp;

pub use builder::CountryMap;
pub use crs::{Ellipsoid, SourceCrs};
pub use features::{FeatureKeys, RawFeature, RawMap};
