//! Core data models for the distance analysis.

pub mod country;
pub mod landmark;

pub use country::{CountryInfo, CountryTable};
pub use landmark::{format_distance, Distance, Landmark, LandmarkTable};
