//! Accumulates validation failures so a whole pass can report every problem
//! before aborting.

use std::fmt::Display;

use tracing::error;

use crate::error::{ConfigErrors, Error, Result};

#[derive(Debug)]
pub struct Diagnostics {
    source_name: String,
    messages: Vec<String>,
}

impl Diagnostics {
    pub fn new(source_name: impl Display) -> Self {
        Self {
            source_name: source_name.to_string(),
            messages: Vec::new(),
        }
    }

    /// Record one problem. It is logged immediately and kept for the
    /// aggregate error.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}: {}", self.source_name, message);
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Fail with every problem recorded so far, or succeed if there were
    /// none. The accumulator is left empty either way.
    pub fn checkpoint(&mut self) -> Result<()> {
        if self.messages.is_empty() {
            return Ok(());
        }
        Err(Error::Config(ConfigErrors {
            source_name: self.source_name.clone(),
            messages: std::mem::take(&mut self.messages),
        }))
    }

    pub fn finish(mut self) -> Result<()> {
        self.checkpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_ok() {
        let diag = Diagnostics::new("rules.yml");
        assert!(diag.is_empty());
        assert!(diag.finish().is_ok());
    }

    #[test]
    fn test_reports_every_message() {
        let mut diag = Diagnostics::new("map.geojson");
        diag.push("unknown ISO_A3 code XXA");
        diag.push("unknown ISO_A3 code XXB");
        assert_eq!(diag.len(), 2);

        match diag.finish() {
            Err(Error::Config(errs)) => {
                assert_eq!(errs.source_name, "map.geojson");
                assert_eq!(errs.messages.len(), 2);
                let text = errs.to_string();
                assert!(text.contains("XXA"));
                assert!(text.contains("XXB"));
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_checkpoint_drains() {
        let mut diag = Diagnostics::new("iso3166.csv");
        diag.push("duplicate ISO_A2 code FR");
        assert!(diag.checkpoint().is_err());
        assert!(diag.is_empty());
        assert!(diag.checkpoint().is_ok());
    }
}
