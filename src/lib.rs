//! Landmark distances - shortest surface distance from located network
//! landmarks to every country's land area.
//!
//! This library provides the building blocks used by the `analyze` binary.

pub mod config;
pub mod diagnostics;
pub mod distance;
pub mod error;
pub mod io;
pub mod landmarks;
pub mod map;
pub mod models;
pub mod pipeline;
pub mod reconcile;
pub mod results;
pub mod rules;
pub mod scheduler;

pub use error::{Error, Result};
pub use models::{CountryTable, Landmark, LandmarkTable};
pub use pipeline::{run, RunOptions, RunSummary};
