//! Building one land-area shape per country from the raw map and the merge
//! rules.

use std::collections::BTreeMap;

use geo::MultiPolygon;
use hashbrown::HashMap;
use rayon::prelude::*;
use tracing::{debug, info};

use super::crs::SourceCrs;
use super::features::RawMap;
use super::geometry::{ensure_valid, merge};
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::models::CountryTable;
use crate::rules::MergeRules;

/// Merged country shapes, one per code in the country table, all in the
/// map's CRS.
#[derive(Debug, Clone)]
pub struct CountryMap {
    pub crs: SourceCrs,
    pub countries: BTreeMap<String, MultiPolygon<f64>>,
}

impl CountryMap {
    /// Group the map's geographic units by rule and merge each group.
    ///
    /// Units whose sovereign is a known country without an explicit rule are
    /// assigned to that sovereign. Every problem found is reported before
    /// failing; on error no partial map is returned.
    pub fn build(
        raw: RawMap,
        rules: &MergeRules,
        countries: &CountryTable,
        source_name: &str,
    ) -> Result<Self> {
        let mut diag = Diagnostics::new(source_name);
        let mut rules = rules.clone();

        // Confirm we know every country an explicit rule names.
        for (code, _) in rules.iter() {
            if !countries.contains(code) {
                diag.push(format!("unknown ISO_A3 code {}", code));
            }
        }

        let crs = raw.crs;
        let mut units: HashMap<String, MultiPolygon<f64>> = HashMap::with_capacity(raw.features.len());
        let mut implicit: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for feature in raw.features {
            if units.contains_key(&feature.unit) {
                diag.push(format!("duplicate GU_A3 code {}", feature.unit));
                continue;
            }
            if countries.contains(&feature.sovereign) && !rules.contains(&feature.sovereign) {
                implicit
                    .entry(feature.sovereign.clone())
                    .or_default()
                    .push(feature.unit.clone());
            }
            units.insert(feature.unit, feature.geometry);
        }

        for (code, members) in implicit {
            debug!("implicit rule {} = {:?}", code, members);
            rules.insert(code, members);
        }

        for country in countries.iter() {
            if !rules.contains(&country.iso_a3) {
                diag.push(format!(
                    "no features for ISO_A3 code {} ({})",
                    country.iso_a3, country.name
                ));
            }
        }

        info!("Checking geographic units");
        let mut claimed: HashMap<&str, &str> = HashMap::new();
        let mut groups: Vec<(String, Vec<MultiPolygon<f64>>)> = Vec::with_capacity(rules.len());

        for (code, members) in rules.iter() {
            let mut group = Vec::with_capacity(members.len());
            for unit in members {
                if let Some(other) = claimed.insert(unit.as_str(), code) {
                    diag.push(format!(
                        "GU '{}' is claimed by both {} and {}",
                        unit, other, code
                    ));
                    continue;
                }
                let Some(shape) = units.get(unit) else {
                    diag.push(format!("GU '{}' not found in map", unit));
                    continue;
                };
                match ensure_valid(shape.clone()) {
                    Ok(shape) => group.push(shape),
                    Err(why) => diag.push(format!("GU '{}' is invalid: {}", unit, why)),
                }
            }
            if countries.contains(code) {
                groups.push((code.to_string(), group));
            }
        }

        diag.checkpoint()?;

        info!("Merging geographic units for {} countries", groups.len());
        let merged: Vec<(String, std::result::Result<MultiPolygon<f64>, String>)> = groups
            .into_par_iter()
            .map(|(code, group)| {
                let shape = merge(&group);
                let shape = ensure_valid(shape).and_then(|shape| {
                    if shape.0.is_empty() {
                        Err("no land area".to_string())
                    } else {
                        Ok(shape)
                    }
                });
                (code, shape)
            })
            .collect();

        let mut out = BTreeMap::new();
        for (code, shape) in merged {
            match shape {
                Ok(shape) => {
                    out.insert(code, shape);
                }
                Err(why) => diag.push(format!("map for '{}' is invalid after merge: {}", code, why)),
            }
        }
        diag.finish()?;

        Ok(Self {
            crs,
            countries: out,
        })
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::map::features::RawFeature;
    use crate::models::CountryInfo;
    use geo::{polygon, Area};

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]])
    }

    fn unit(code: &str, sovereign: &str, geometry: MultiPolygon<f64>) -> RawFeature {
        RawFeature {
            unit: code.to_string(),
            sovereign: sovereign.to_string(),
            geometry,
        }
    }

    fn countries(codes: &[&str]) -> CountryTable {
        codes
            .iter()
            .map(|c| CountryInfo {
                iso_a3: c.to_string(),
                iso_a2: c[..2].to_string(),
                name: format!("Country {}", c),
            })
            .collect()
    }

    fn raw(features: Vec<RawFeature>) -> RawMap {
        RawMap {
            crs: SourceCrs::wgs84(),
            features,
        }
    }

    #[test]
    fn test_explicit_and_implicit_rules() {
        let map = raw(vec![
            unit("FRA", "FR1", square(0.0, 0.0, 1.0)),
            unit("GUF", "FR1", square(10.0, 0.0, 1.0)),
            unit("DEU", "DEU", square(1.0, 0.0, 1.0)),
            unit("XAB", "DEU", square(2.0, 0.0, 1.0)),
            unit("ATA", "ATA", square(50.0, 50.0, 1.0)),
        ]);
        let rules: MergeRules = [("fra".to_string(), vec!["fra".to_string(), "guf".to_string()])]
            .into_iter()
            .collect();

        let built = CountryMap::build(map, &rules, &countries(&["DEU", "FRA"]), "map").unwrap();
        assert_eq!(built.len(), 2);
        // Two disjoint parts for France.
        assert_eq!(built.countries["FRA"].0.len(), 2);
        // Adjacent DEU + XAB merge into a single 2x1 polygon.
        assert_eq!(built.countries["DEU"].0.len(), 1);
        assert!((built.countries["DEU"].unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregates_all_problems() {
        let map = raw(vec![
            unit("FRA", "FRA", square(0.0, 0.0, 1.0)),
            unit("FRA", "FRA", square(3.0, 0.0, 1.0)),
            unit("ESP", "ESP", square(5.0, 0.0, 1.0)),
        ]);
        let rules: MergeRules = [
            ("ZZZ".to_string(), vec!["ESP".to_string()]),
            ("ESP".to_string(), vec!["ESP".to_string(), "AND".to_string()]),
        ]
        .into_iter()
        .collect();

        let err = CountryMap::build(map, &rules, &countries(&["ESP", "FRA", "ITA"]), "map")
            .unwrap_err();
        let Error::Config(errs) = err else {
            panic!("expected config error, got {:?}", err);
        };
        let all = errs.messages.join("\n");
        assert!(all.contains("unknown ISO_A3 code ZZZ"), "{}", all);
        assert!(all.contains("duplicate GU_A3 code FRA"), "{}", all);
        assert!(all.contains("no features for ISO_A3 code ITA"), "{}", all);
        assert!(all.contains("GU 'AND' not found"), "{}", all);
        assert!(all.contains("claimed by both"), "{}", all);
    }
}
