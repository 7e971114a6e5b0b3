//! Crash-safe file replacement.

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::Builder;
use tracing::debug;

use super::compression::Compression;
use crate::error::{Error, Result};

/// Create `path`, or atomically replace it, with whatever `write` emits.
///
/// The data goes to a temporary file in the same directory, compressed
/// according to the destination's extension. The temporary file is flushed
/// and fsync'ed and only then renamed over `path`. If `write` fails, or any
/// step before the rename does, the temporary file is removed and `path` is
/// left exactly as it was.
pub fn atomic_rewrite<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::input(path.display(), "not a file name"))?;
    let (stem, ext) = match file_name.rfind('.') {
        Some(i) if i > 0 => (&file_name[..i], &file_name[i..]),
        _ => (file_name, ""),
    };

    let mut tmp = Builder::new()
        .prefix(&format!("{}-", stem))
        .suffix(ext)
        .tempfile_in(dir)
        .map_err(|e| Error::io(dir, e))?;
    debug!("writing {} via {}", path.display(), tmp.path().display());

    {
        let buffered = BufWriter::new(tmp.as_file_mut());
        let mut out = Compression::from_path(path)
            .writer(buffered)
            .map_err(|e| Error::io(path, e))?;
        write(&mut out)?;
        let mut buffered = out.finish().map_err(|e| Error::io(path, e))?;
        buffered.flush().map_err(|e| Error::io(path, e))?;
    }

    tmp.as_file().sync_all().map_err(|e| Error::io(path, e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}
