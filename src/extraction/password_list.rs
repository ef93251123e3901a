use std::path::Path;
use tracing::{debug, warn};

/// Ordered password candidates for archive extraction
///
/// Collected in priority order:
/// 1. Passwords given in the configuration (or on the command line)
/// 2. Global password file (one password per line, taken verbatim)
///
/// Duplicates and empty entries are dropped; the first occurrence keeps its position.
/// The list is read-only once built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PasswordList {
    passwords: Vec<String>,
}

impl PasswordList {
    /// Build a list from candidates, keeping their order
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::default();
        for candidate in candidates {
            list.push_unique(candidate.into());
        }
        list
    }

    /// Parse a comma-separated list such as `"secret, hunter2,,other"`
    ///
    /// Each candidate is trimmed; empty items are skipped.
    pub fn parse_list(value: &str) -> Self {
        Self::new(value.split(',').map(str::trim))
    }

    /// Collect passwords from all sources, de-duplicated, in priority order
    pub async fn collect(configured: &[String], password_file: Option<&Path>) -> Self {
        let mut list = Self::new(configured.iter().cloned());

        if let Some(path) = password_file {
            match tokio::fs::read_to_string(path).await {
                Ok(content) => {
                    // whitespace can be part of a password; only line endings are dropped
                    for line in content.lines() {
                        let line = line.strip_suffix('\r').unwrap_or(line);
                        list.push_unique(line.to_string());
                    }
                }
                Err(e) => {
                    warn!(?path, error = %e, "failed to read password file, ignoring it");
                }
            }
        }

        debug!(
            "collected {} unique passwords for extraction",
            list.passwords.len()
        );

        list
    }

    fn push_unique(&mut self, candidate: String) {
        if !candidate.is_empty() && !self.passwords.contains(&candidate) {
            self.passwords.push(candidate);
        }
    }

    /// Get an iterator over passwords
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.passwords.iter().map(String::as_str)
    }

    /// Check if there are any passwords to try
    pub fn is_empty(&self) -> bool {
        self.passwords.is_empty()
    }

    /// Get the number of passwords
    pub fn len(&self) -> usize {
        self.passwords.len()
    }
}
