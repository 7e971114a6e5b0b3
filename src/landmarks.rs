//! Loading landmark lists and previous result files.
//!
//! Both use the same schema: mandatory `addr`, `longitude` and `latitude`
//! columns, one optional distance column per known country code, and any
//! number of metadata columns that are carried through untouched.

use std::collections::HashSet;
use std::io::Read;
use std::net::IpAddr;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::info;

use crate::error::{Error, Result};
use crate::io::open_with_auto_compression;
use crate::models::{CountryTable, Landmark, LandmarkTable};

pub const ADDR: &str = "addr";
pub const LONGITUDE: &str = "longitude";
pub const LATITUDE: &str = "latitude";

/// Column layout of one landmark CSV, resolved from its header row.
#[derive(Debug)]
struct Schema {
    addr: usize,
    longitude: usize,
    latitude: usize,
    distances: Vec<(usize, String)>,
    metadata: Vec<(usize, String)>,
}

impl Schema {
    fn from_headers(headers: &StringRecord, countries: &CountryTable) -> std::result::Result<Self, String> {
        let mut seen = HashSet::new();
        let mut addr = None;
        let mut longitude = None;
        let mut latitude = None;
        let mut distances = Vec::new();
        let mut metadata = Vec::new();

        for (idx, name) in headers.iter().enumerate() {
            if !seen.insert(name) {
                return Err(format!("duplicate column '{}'", name));
            }
            match name {
                ADDR => addr = Some(idx),
                LONGITUDE => longitude = Some(idx),
                LATITUDE => latitude = Some(idx),
                _ if countries.contains(name) => distances.push((idx, name.to_string())),
                _ => metadata.push((idx, name.to_string())),
            }
        }

        let missing: Vec<&str> = [(ADDR, addr), (LONGITUDE, longitude), (LATITUDE, latitude)]
            .iter()
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| *name)
            .collect();

        match (addr, longitude, latitude) {
            (Some(addr), Some(longitude), Some(latitude)) => Ok(Self {
                addr,
                longitude,
                latitude,
                distances,
                metadata,
            }),
            _ => Err(format!(
                "wrong set of columns: missing {}",
                missing.join(", ")
            )),
        }
    }

    fn parse(&self, record: &StringRecord) -> std::result::Result<Landmark, String> {
        let addr_str = record[self.addr].trim();
        let addr: IpAddr = addr_str
            .parse()
            .map_err(|_| format!("invalid address '{}'", addr_str))?;
        let longitude = parse_coord(&record[self.longitude], LONGITUDE, 180.0)?;
        let latitude = parse_coord(&record[self.latitude], LATITUDE, 90.0)?;

        let mut landmark = Landmark::new(addr, longitude, latitude);
        for (idx, name) in &self.metadata {
            landmark
                .metadata
                .insert(name.clone(), record[*idx].to_string());
        }
        for (idx, code) in &self.distances {
            let cell = record[*idx].trim();
            let value = if cell.is_empty() {
                None
            } else {
                Some(
                    cell.parse::<f64>()
                        .map_err(|_| format!("invalid distance '{}' for {}", cell, code))?,
                )
            };
            landmark.distances.insert(code.clone(), value);
        }
        Ok(landmark)
    }
}

fn parse_coord(cell: &str, what: &str, limit: f64) -> std::result::Result<f64, String> {
    let value: f64 = cell
        .trim()
        .parse()
        .map_err(|_| format!("invalid {} '{}'", what, cell))?;
    if !value.is_finite() || value.abs() > limit {
        return Err(format!("{} {} out of range", what, value));
    }
    Ok(value)
}

/// Load a landmark CSV (possibly compressed) keyed by address.
pub fn load_landmarks(path: &Path, countries: &CountryTable) -> Result<LandmarkTable> {
    let reader = open_with_auto_compression(path)?;
    let table = read_landmarks(reader, &path.display().to_string(), countries)?;
    info!("Loaded {} landmarks from {}", table.len(), path.display());
    Ok(table)
}

/// Load a previous result file. A missing file means no prior data.
pub fn load_previous_results(path: &Path, countries: &CountryTable) -> Result<LandmarkTable> {
    match load_landmarks(path, countries) {
        Err(e) if e.is_not_found() => {
            info!("No previous results at {}", path.display());
            Ok(LandmarkTable::new())
        }
        other => other,
    }
}

pub fn read_landmarks<R: Read>(
    reader: R,
    source_name: &str,
    countries: &CountryTable,
) -> Result<LandmarkTable> {
    let mut rd = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rd.headers().map_err(|e| Error::csv(source_name, e))?.clone();
    let schema =
        Schema::from_headers(&headers, countries).map_err(|m| Error::input(source_name, m))?;

    let mut table = LandmarkTable::new();
    for (i, result) in rd.records().enumerate() {
        let record = result.map_err(|e| Error::csv(source_name, e))?;
        let line = i + 2;
        let landmark = schema
            .parse(&record)
            .map_err(|m| Error::input(source_name, format!("line {}: {}", line, m)))?;

        if table.contains_key(&landmark.addr) {
            return Err(Error::input(
                source_name,
                format!("duplicate entry for landmark {}", landmark.addr),
            ));
        }
        table.insert(landmark.addr, landmark);
    }
    Ok(table)
}
