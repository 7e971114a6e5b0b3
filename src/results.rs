//! Writing the analysed landmarks back out.

use std::collections::BTreeSet;
use std::path::Path;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::info;

use crate::error::{Error, Result, SchemaMismatch};
use crate::io::atomic_rewrite;
use crate::landmarks::{ADDR, LATITUDE, LONGITUDE};
use crate::models::{format_distance, Landmark};

/// Check that every record has exactly the first record's columns.
pub fn check_consistency(records: &[Landmark]) -> Result<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let expected: BTreeSet<&str> = first.column_keys().collect();

    for record in records {
        let keys: BTreeSet<&str> = record.column_keys().collect();
        if keys != expected {
            return Err(SchemaMismatch {
                addr: record.addr.to_string(),
                extra: keys.difference(&expected).map(|k| k.to_string()).collect(),
                missing: expected.difference(&keys).map(|k| k.to_string()).collect(),
            }
            .into());
        }
    }
    Ok(())
}

/// Column order: `addr`, metadata (alphabetical), `longitude`, `latitude`,
/// country codes (alphabetical).
pub fn columns(first: Option<&Landmark>) -> Vec<String> {
    let mut cols = vec![ADDR.to_string()];
    if let Some(lm) = first {
        cols.extend(lm.metadata.keys().cloned());
    }
    cols.push(LONGITUDE.to_string());
    cols.push(LATITUDE.to_string());
    if let Some(lm) = first {
        cols.extend(lm.distances.keys().cloned());
    }
    cols
}

/// Validate, sort by address and atomically write `records` to `path`.
pub fn write_results(path: &Path, mut records: Vec<Landmark>) -> Result<()> {
    check_consistency(&records)?;
    records.sort_by(|a, b| a.addr.cmp(&b.addr));

    let header = columns(records.first());
    let source_name = path.display().to_string();

    atomic_rewrite(path, |out| {
        let mut wr = WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(out);

        wr.write_record(&header)
            .map_err(|e| Error::csv(&source_name, e))?;

        let mut row: Vec<String> = Vec::with_capacity(header.len());
        for lm in &records {
            row.clear();
            row.push(lm.addr.to_string());
            row.extend(lm.metadata.values().cloned());
            row.push(lm.longitude.to_string());
            row.push(lm.latitude.to_string());
            row.extend(lm.distances.values().map(|d| format_distance(*d)));
            wr.write_record(&row)
                .map_err(|e| Error::csv(&source_name, e))?;
        }
        wr.flush().map_err(|e| Error::io(path, e))?;
        Ok(())
    })?;

    info!("Wrote {} landmarks to {}", records.len(), path.display());
    Ok(())
}
