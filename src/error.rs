//! Error types shared by every stage of the analysis.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// One or more configuration problems, reported all at once.
    #[error(transparent)]
    Config(#[from] ConfigErrors),

    /// A malformed input file.
    #[error("{path}: {message}")]
    Input { path: String, message: String },

    /// Records disagree about which columns exist.
    #[error(transparent)]
    Schema(#[from] SchemaMismatch),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: {message}")]
    Map { path: String, message: String },

    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn input(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::Input {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl fmt::Display, source: csv::Error) -> Self {
        Error::Csv {
            path: path.to_string(),
            source,
        }
    }

    /// True when the error means the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            Error::Csv { source, .. } => match source.kind() {
                csv::ErrorKind::Io(e) => e.kind() == io::ErrorKind::NotFound,
                _ => false,
            },
            _ => false,
        }
    }
}

/// Every configuration problem found while validating one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigErrors {
    pub source_name: String,
    pub messages: Vec<String>,
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} configuration error(s)",
            self.source_name,
            self.messages.len()
        )?;
        for msg in &self.messages {
            write!(f, "\n  {}", msg)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrors {}

/// A result record whose key set differs from the first record's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMismatch {
    pub addr: String,
    pub extra: Vec<String>,
    pub missing: Vec<String>,
}

impl fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal error: bad record for {}:", self.addr)?;
        if !self.extra.is_empty() {
            write!(f, "\n    extra keys: {}", self.extra.join(", "))?;
        }
        if !self.missing.is_empty() {
            write!(f, "\n  missing keys: {}", self.missing.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaMismatch {}
