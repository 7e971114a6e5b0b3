//! Shortest surface distance from a landmark to each country's land area.

mod aeqd;
mod compute;

pub use aeqd::AzimuthalEquidistant;
pub use compute::{analyze_landmark, signed_distance, Analysis, MapSnapshot, SkippedPair};
