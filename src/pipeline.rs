//! One complete analysis run, from input files to the rewritten result
//! file.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::distance::MapSnapshot;
use crate::error::{Error, Result};
use crate::landmarks::{load_landmarks, load_previous_results};
use crate::map::{CountryMap, RawMap};
use crate::models::CountryTable;
use crate::reconcile::reconcile_with_threshold;
use crate::results::write_results;
use crate::rules::MergeRules;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Result file, read for prior distances and then rewritten
    pub results: PathBuf,
    pub landmarks: PathBuf,
    pub map: PathBuf,
    pub rules: PathBuf,
    pub countries: PathBuf,
    pub settings: Settings,
    pub show_progress: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Landmarks whose distances were all carried over
    pub already_complete: usize,
    /// Landmarks sent to the workers
    pub analyzed: usize,
    /// (landmark, country) pairs still unknown after this run
    pub unresolved_pairs: usize,
    pub dropped: usize,
    pub moved: usize,
    /// False when nothing changed and the result file was left alone
    pub written: bool,
}

pub fn run(opts: &RunOptions) -> Result<RunSummary> {
    let settings = &opts.settings;
    settings.validate("settings")?;

    let rules = MergeRules::load(&opts.rules)?;
    let countries = CountryTable::load(&opts.countries)?;

    let new = load_landmarks(&opts.landmarks, &countries)?;
    let old = load_previous_results(&opts.results, &countries)?;

    let expected = new.len();
    let same_addresses = old.len() == new.len() && old.keys().all(|a| new.contains_key(a));

    let rec = reconcile_with_threshold(&old, new, &countries, settings.move_threshold_km);
    drop(old);

    info!(
        "{} already analyzed, {} dropped, {} to analyze",
        rec.complete.len(),
        rec.dropped,
        rec.incomplete.len()
    );
    if rec.moved > 0 {
        info!("{} landmarks moved and will be re-analyzed", rec.moved);
    }

    let mut summary = RunSummary {
        already_complete: rec.complete.len(),
        analyzed: rec.incomplete.len(),
        dropped: rec.dropped,
        moved: rec.moved,
        ..Default::default()
    };

    if rec.incomplete.is_empty() && same_addresses {
        info!("no update required");
        return Ok(summary);
    }

    let mut records = rec.complete;
    if !rec.incomplete.is_empty() {
        let snapshot = load_snapshot(opts, &rules, &countries)?;
        let outcome = Scheduler::new(settings.parallel)
            .progress_interval(settings.progress_interval())
            .show_progress_bar(opts.show_progress)
            .run(snapshot, rec.incomplete)?;
        summary.unresolved_pairs = outcome.skipped_pairs;
        if outcome.skipped_pairs > 0 {
            info!(
                "{} landmark/country pairs could not be measured; they will be retried next run",
                outcome.skipped_pairs
            );
        }
        records.extend(outcome.landmarks);
    }

    if records.len() != expected {
        return Err(Error::Internal(format!(
            "expected {} landmarks, have {}",
            expected,
            records.len()
        )));
    }
    let unique: HashSet<IpAddr> = records.iter().map(|lm| lm.addr).collect();
    if unique.len() != records.len() {
        return Err(Error::Internal("duplicate landmark addresses in results".to_string()));
    }

    write_results(&opts.results, records)?;
    summary.written = true;
    Ok(summary)
}

/// Read and merge the map. Only called when there is work to do.
fn load_snapshot(opts: &RunOptions, rules: &MergeRules, countries: &CountryTable) -> Result<Arc<MapSnapshot>> {
    let raw = RawMap::load(&opts.map, &opts.settings.feature_keys())?;
    let map = CountryMap::build(raw, rules, countries, &opts.map.display().to_string())?;
    info!("Built {} country shapes", map.len());
    Ok(Arc::new(MapSnapshot::new(map, opts.settings.resolution)))
}
