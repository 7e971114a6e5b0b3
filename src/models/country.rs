//! The authoritative table of countries we measure distances to.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::io::open_with_auto_compression;

const EXPECTED_COLUMNS: [&str; 3] = ["ISO_A2", "ISO_A3", "NAME"];

/// One row of the country table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryInfo {
    /// ISO 3166-1 alpha-3 code, the key used everywhere else
    pub iso_a3: String,
    /// ISO 3166-1 alpha-2 code
    pub iso_a2: String,
    /// Informal English name
    pub name: String,
}

/// Countries keyed by alpha-3 code. Iteration is in code order.
#[derive(Debug, Clone, Default)]
pub struct CountryTable {
    countries: BTreeMap<String, CountryInfo>,
}

impl CountryTable {
    pub fn get(&self, iso_a3: &str) -> Option<&CountryInfo> {
        self.countries.get(iso_a3)
    }

    pub fn contains(&self, iso_a3: &str) -> bool {
        self.countries.contains_key(iso_a3)
    }

    /// Alpha-3 codes in ascending order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.countries.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CountryInfo> {
        self.countries.values()
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Load the country table from a CSV file with exactly the columns
    /// `ISO_A3`, `ISO_A2` and `NAME`, in any order.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading country table from {}", path.display());
        let reader = open_with_auto_compression(path)?;
        Self::from_reader(reader, &path.display().to_string())
    }

    pub fn from_reader<R: Read>(reader: R, source_name: &str) -> Result<Self> {
        let mut rd = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers = rd.headers().map_err(|e| Error::csv(source_name, e))?.clone();
        let mut fields: Vec<&str> = headers.iter().collect();
        fields.sort_unstable();
        if fields != EXPECTED_COLUMNS {
            return Err(Error::input(
                source_name,
                format!(
                    "wrong set of fields: expected ISO_A3, ISO_A2, NAME, found {}",
                    headers.iter().collect::<Vec<_>>().join(", ")
                ),
            ));
        }
        let a3_idx = column(&headers, "ISO_A3");
        let a2_idx = column(&headers, "ISO_A2");
        let name_idx = column(&headers, "NAME");

        let mut diag = Diagnostics::new(source_name);
        let mut countries = BTreeMap::new();
        let mut seen_a2 = HashSet::new();
        let mut seen_names = HashSet::new();

        for (i, result) in rd.records().enumerate() {
            let record = result.map_err(|e| Error::csv(source_name, e))?;
            let line = i + 2;
            let iso_a3 = record[a3_idx].trim().to_uppercase();
            let iso_a2 = record[a2_idx].trim().to_uppercase();
            let name = record[name_idx].trim().to_string();

            if !is_alpha_code(&iso_a3, 3) {
                diag.push(format!("line {}: malformed ISO_A3 code '{}'", line, iso_a3));
            }
            if !is_alpha_code(&iso_a2, 2) {
                diag.push(format!("line {}: malformed ISO_A2 code '{}'", line, iso_a2));
            }
            if name.is_empty() {
                diag.push(format!("line {}: empty name", line));
            }

            if !seen_names.insert(name.clone()) {
                diag.push(format!("duplicate name {}", name));
            }
            if !seen_a2.insert(iso_a2.clone()) {
                diag.push(format!("duplicate ISO_A2 code {}", iso_a2));
            }
            if countries.contains_key(&iso_a3) {
                diag.push(format!("duplicate ISO_A3 code {}", iso_a3));
                continue;
            }
            countries.insert(
                iso_a3.clone(),
                CountryInfo {
                    iso_a3,
                    iso_a2,
                    name,
                },
            );
        }

        diag.finish()?;
        info!("Loaded {} countries", countries.len());
        Ok(Self { countries })
    }
}

impl FromIterator<CountryInfo> for CountryTable {
    fn from_iter<I: IntoIterator<Item = CountryInfo>>(iter: I) -> Self {
        Self {
            countries: iter
                .into_iter()
                .map(|c| (c.iso_a3.clone(), c))
                .collect(),
        }
    }
}

fn column(headers: &csv::StringRecord, name: &str) -> usize {
    // Presence was checked against EXPECTED_COLUMNS.
    headers.iter().position(|h| h == name).unwrap_or(0)
}

fn is_alpha_code(code: &str, len: usize) -> bool {
    code.len() == len && code.bytes().all(|b| b.is_ascii_uppercase())
}
