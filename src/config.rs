//! Runtime configuration.
//!
//! Every field has a default, so an empty (or absent) YAML file yields a
//! working setup. The binary applies CLI overrides on top.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Highest shard count supported by the two-digit file naming.
pub const MAX_PARTS: usize = 99;

/// Where failure counters and skip trackers are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CounterLayout {
    /// One file shared by every shard. Shard runs must be serialized.
    #[default]
    Shared,
    /// One file per shard index. Shard runs may execute concurrently.
    PerShard,
}

impl CounterLayout {
    /// Parse a layout name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "shared" => Some(CounterLayout::Shared),
            "per_shard" | "per-shard" | "pershard" => Some(CounterLayout::PerShard),
            _ => None,
        }
    }
}

/// Validation back-off for rules that have been failing for a long time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SkipConfig {
    /// Enable skipping
    pub enabled: bool,
    /// Rules with a failure count strictly above this are skipped
    pub threshold: u32,
    /// Consecutive skipped runs before a rule is validated again
    pub rounds: u32,
    /// Failure count assigned to a rule when it resumes validation
    pub resume_count: u32,
}

impl Default for SkipConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 7,
            rounds: 10,
            resume_count: 6,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Newline-delimited list of rule source URLs
    pub urls_file: PathBuf,
    /// Aggregated, sorted, deduplicated rule corpus
    pub master_file: PathBuf,
    /// Directory holding `part_NN.txt` shard files
    pub shard_dir: PathBuf,
    /// Directory holding validated output and persisted state
    pub output_dir: PathBuf,
    /// Number of shards
    pub parts: usize,
    /// Concurrent DNS lookups
    pub workers: usize,
    /// Per-lookup timeout in seconds
    pub dns_timeout_secs: u64,
    /// Per-source download timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Consecutive failures at which a rule is removed
    pub delete_threshold: u32,
    /// Log validation progress every N completed lookups (0 disables)
    pub progress_every: usize,
    /// Nameserver IPs to query; empty uses the system configuration
    pub nameservers: Vec<IpAddr>,
    /// Failure counter persistence layout
    pub counter_layout: CounterLayout,
    /// Drop counter entries for rules that left the shard
    pub prune_stale: bool,
    /// Validation back-off
    pub skip: SkipConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            urls_file: PathBuf::from("urls.txt"),
            master_file: PathBuf::from("merged_rules.txt"),
            shard_dir: PathBuf::from("tmp"),
            output_dir: PathBuf::from("dist"),
            parts: 16,
            workers: 50,
            dns_timeout_secs: 2,
            fetch_timeout_secs: 20,
            delete_threshold: 4,
            progress_every: 500,
            nameservers: Vec::new(),
            counter_layout: CounterLayout::Shared,
            prune_stale: true,
            skip: SkipConfig::default(),
        }
    }
}

impl Config {
    /// Parse a configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.parts == 0 || self.parts > MAX_PARTS {
            return Err(Error::Config(format!(
                "parts must be in 1..={}, got {}",
                MAX_PARTS, self.parts
            )));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be positive".to_string()));
        }
        if self.delete_threshold == 0 {
            return Err(Error::Config(
                "delete_threshold must be positive".to_string(),
            ));
        }
        if self.dns_timeout_secs == 0 || self.fetch_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be positive".to_string()));
        }
        if self.skip.rounds == 0 {
            return Err(Error::Config("skip.rounds must be positive".to_string()));
        }
        Ok(())
    }

    /// Per-lookup DNS timeout.
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    /// Per-source download timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Shard file for a 1-based index.
    pub fn shard_path(&self, index: usize) -> PathBuf {
        self.shard_dir.join(format!("part_{:02}.txt", index))
    }

    /// Validated output file for a 1-based index.
    pub fn output_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("validated_part_{:02}.txt", index))
    }

    /// Failure counter file used by a shard.
    pub fn counter_path(&self, index: usize) -> PathBuf {
        self.state_path("delete_counter", index)
    }

    /// Skip tracker file used by a shard.
    pub fn skip_path(&self, index: usize) -> PathBuf {
        self.state_path("skip_tracker", index)
    }

    /// Refresh metadata file.
    pub fn metadata_path(&self) -> PathBuf {
        self.output_dir.join("corpus.meta")
    }

    fn state_path(&self, stem: &str, index: usize) -> PathBuf {
        match self.counter_layout {
            CounterLayout::Shared => self.output_dir.join(format!("{}.json", stem)),
            CounterLayout::PerShard => self.output_dir.join(format!("{}_{:02}.json", stem, index)),
        }
    }

    /// Re-root every relative path under `base`.
    pub fn rooted_at(mut self, base: &Path) -> Self {
        self.urls_file = base.join(&self.urls_file);
        self.master_file = base.join(&self.master_file);
        self.shard_dir = base.join(&self.shard_dir);
        self.output_dir = base.join(&self.output_dir);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.parts, 16);
        assert_eq!(config.workers, 50);
        assert_eq!(config.delete_threshold, 4);
        assert_eq!(config.dns_timeout(), Duration::from_secs(2));
        assert_eq!(config.counter_layout, CounterLayout::Shared);
        assert!(config.skip.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
parts: 4
workers: 8
counter_layout: per_shard
nameservers: ["1.1.1.1", "8.8.8.8"]
skip:
  enabled: false
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.parts, 4);
        assert_eq!(config.workers, 8);
        assert_eq!(config.counter_layout, CounterLayout::PerShard);
        assert_eq!(config.nameservers.len(), 2);
        assert!(!config.skip.enabled);
        // Unspecified fields keep their defaults
        assert_eq!(config.skip.rounds, 10);
        assert_eq!(config.delete_threshold, 4);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = Config::from_yaml("  \n").unwrap();
        assert_eq!(config.parts, 16);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Config::from_yaml("parts: 0").is_err());
        assert!(Config::from_yaml("parts: 100").is_err());
        assert!(Config::from_yaml("workers: 0").is_err());
        assert!(Config::from_yaml("delete_threshold: 0").is_err());
        assert!(Config::from_yaml("dns_timeout_secs: 0").is_err());
        assert!(Config::from_yaml("skip:\n  rounds: 0").is_err());
    }

    #[test]
    fn test_paths() {
        let config = Config::default();
        assert_eq!(config.shard_path(1), PathBuf::from("tmp/part_01.txt"));
        assert_eq!(config.shard_path(16), PathBuf::from("tmp/part_16.txt"));
        assert_eq!(
            config.output_path(3),
            PathBuf::from("dist/validated_part_03.txt")
        );
        assert_eq!(
            config.counter_path(3),
            PathBuf::from("dist/delete_counter.json")
        );
        assert_eq!(config.skip_path(3), PathBuf::from("dist/skip_tracker.json"));
    }

    #[test]
    fn test_per_shard_paths() {
        let config = Config {
            counter_layout: CounterLayout::PerShard,
            ..Config::default()
        };
        assert_eq!(
            config.counter_path(7),
            PathBuf::from("dist/delete_counter_07.json")
        );
        assert_eq!(
            config.skip_path(12),
            PathBuf::from("dist/skip_tracker_12.json")
        );
    }

    #[test]
    fn test_counter_layout_from_str() {
        assert_eq!(
            CounterLayout::from_str("shared"),
            Some(CounterLayout::Shared)
        );
        assert_eq!(
            CounterLayout::from_str("per-shard"),
            Some(CounterLayout::PerShard)
        );
        assert_eq!(CounterLayout::from_str("bogus"), None);
    }

    #[test]
    fn test_rooted_at() {
        let config = Config::default().rooted_at(Path::new("/work"));
        assert_eq!(config.master_file, PathBuf::from("/work/merged_rules.txt"));
        assert_eq!(config.shard_path(2), PathBuf::from("/work/tmp/part_02.txt"));
    }
}
