//! Merge rules: which geographic units of the map make up each country.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};

/// Country code -> geographic unit codes, in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRules {
    rules: BTreeMap<String, Vec<String>>,
}

impl MergeRules {
    /// Load rules from YAML (`.yml`/`.yaml`) or TOML (anything else).
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading merge rules from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let source_name = path.display().to_string();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Self::from_yaml(&content, &source_name),
            _ => Self::from_toml(&content, &source_name),
        }
    }

    pub fn from_yaml(content: &str, source_name: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_yaml::from_str(content)
            .map_err(|e| Error::input(source_name, format!("failed to parse rules: {}", e)))?;
        Ok(Self::normalize(raw))
    }

    pub fn from_toml(content: &str, source_name: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = toml::from_str(content)
            .map_err(|e| Error::input(source_name, format!("failed to parse rules: {}", e)))?;
        Ok(Self::normalize(raw))
    }

    /// Uppercase everything to match the map's unit codes, and drop repeated
    /// units within a rule.
    fn normalize(raw: BTreeMap<String, Vec<String>>) -> Self {
        let rules = raw
            .into_iter()
            .map(|(code, units)| {
                let mut seen = Vec::with_capacity(units.len());
                for unit in units {
                    let unit = unit.trim().to_uppercase();
                    if !seen.contains(&unit) {
                        seen.push(unit);
                    }
                }
                (code.trim().to_uppercase(), seen)
            })
            .collect();
        Self { rules }
    }

    pub fn get(&self, code: &str) -> Option<&[String]> {
        self.rules.get(code).map(|v| v.as_slice())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rules.contains_key(code)
    }

    pub fn insert(&mut self, code: String, units: Vec<String>) {
        self.rules.insert(code, units);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for MergeRules {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self::normalize(iter.into_iter().collect())
    }
}
