//! Persisted per-rule counters.
//!
//! Both the failure counter and the skip tracker are flat JSON objects
//! mapping a rule to a non-negative integer. The whole mapping is read at
//! the start of a shard run and rewritten wholesale at the end; the last
//! full save wins. A missing file is created empty, and an unreadable or
//! corrupt file is treated as empty and overwritten, which resets the
//! history it held.

use ahash::AHashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;

/// Rule -> count mapping.
pub type Counts = AHashMap<String, u32>;

/// JSON file holding a [`Counts`] mapping.
#[derive(Debug, Clone)]
pub struct CounterStore {
    path: PathBuf,
}

impl CounterStore {
    /// Create a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the mapping, recovering from a missing or corrupt file.
    pub fn load(&self) -> Result<Counts> {
        if !self.path.exists() {
            log::debug!("Counter file {:?} missing, creating it", self.path);
            self.save(&Counts::new())?;
            return Ok(Counts::new());
        }

        match self.read() {
            Ok(counts) => Ok(counts),
            Err(e) => {
                log::warn!(
                    "Counter file {:?} is unreadable ({}), starting from empty",
                    self.path,
                    e
                );
                self.save(&Counts::new())?;
                Ok(Counts::new())
            }
        }
    }

    fn read(&self) -> Result<Counts> {
        let content = fs::read_to_string(&self.path)?;
        let sorted: BTreeMap<String, u32> = serde_json::from_str(&content)?;
        Ok(sorted.into_iter().collect())
    }

    /// Overwrite the file with the full mapping, keys sorted.
    pub fn save(&self, counts: &Counts) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let sorted: BTreeMap<&str, u32> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        let mut content = serde_json::to_string_pretty(&sorted)?;
        content.push('\n');
        fs::write(&self.path, content)?;
        Ok(())
    }
}
