use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::map::FeatureKeys;
use crate::reconcile::MOVE_THRESHOLD_KM;

/// Tunables for one analysis run. Every key is optional in the settings
/// file; command-line flags override whatever the file says.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Worker threads for the distance phase
    pub parallel: usize,
    /// Distances are rounded to a multiple of this many metres
    pub resolution: f64,
    pub move_threshold_km: f64,
    pub progress_interval_secs: u64,
    /// Map feature property holding the geographic unit code
    pub unit_property: String,
    /// Map feature property holding the sovereign country code
    pub sovereign_property: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parallel: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            resolution: 10.0,
            move_threshold_km: MOVE_THRESHOLD_KM,
            progress_interval_secs: 10,
            unit_property: "GU_A3".to_string(),
            sovereign_property: "SOV_A3".to_string(),
        }
    }
}

impl Settings {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&content, &path.display().to_string())
    }

    pub fn from_toml(content: &str, source_name: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| Error::input(source_name, e.to_string()))?;
        settings.validate(source_name)?;
        Ok(settings)
    }

    /// Reject values no run could work with, listing all of them.
    pub fn validate(&self, source_name: &str) -> Result<()> {
        let mut diag = Diagnostics::new(source_name);
        if self.parallel == 0 {
            diag.push("parallel must be at least 1");
        }
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            diag.push(format!("resolution must be positive, not {}", self.resolution));
        }
        if !(self.move_threshold_km.is_finite() && self.move_threshold_km >= 0.0) {
            diag.push(format!(
                "move_threshold_km must be non-negative, not {}",
                self.move_threshold_km
            ));
        }
        if self.unit_property.trim().is_empty() || self.sovereign_property.trim().is_empty() {
            diag.push("map property names must not be empty");
        }
        diag.finish()
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    pub fn feature_keys(&self) -> FeatureKeys {
        FeatureKeys {
            unit: self.unit_property.clone(),
            sovereign: self.sovereign_property.clone(),
        }
    }
}
