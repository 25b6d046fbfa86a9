//! Deterministic corpus partitioning.
//!
//! The corpus is cut into `parts` contiguous, order-preserving slices of
//! `ceil(total / parts)` rules each; the last non-empty shard takes the
//! remainder and any trailing shards are empty. Given the same ordered
//! corpus and shard count, every rule always lands in the same shard, which
//! is what lets per-shard history accumulate across runs.

use std::fs;

use crate::config::Config;
use crate::corpus::{write_rules, RuleCorpus};
use crate::{Error, Result};

/// Rules per shard for a corpus of `total` rules.
pub fn chunk_size(total: usize, parts: usize) -> usize {
    if parts == 0 {
        return 0;
    }
    total.div_ceil(parts)
}

/// Split rules into exactly `parts` slices.
pub fn partition<T>(rules: &[T], parts: usize) -> Vec<&[T]> {
    let per_part = chunk_size(rules.len(), parts);
    (0..parts)
        .map(|i| {
            let start = (i * per_part).min(rules.len());
            let end = ((i + 1) * per_part).min(rules.len());
            &rules[start..end]
        })
        .collect()
}

/// Writes shard files from the master corpus.
pub struct Partitioner<'a> {
    config: &'a Config,
}

impl<'a> Partitioner<'a> {
    /// Create a partitioner for the configured shard layout.
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Split the master corpus into shard files, overwriting existing ones.
    ///
    /// Returns the number of rules written to each shard.
    pub fn split(&self) -> Result<Vec<usize>> {
        let master = &self.config.master_file;
        if !master.exists() {
            return Err(Error::CorpusMissing(master.clone()));
        }

        let corpus = RuleCorpus::load(master)?;
        self.write_shards(&corpus)
    }

    /// Write shard files for an in-memory corpus.
    pub fn write_shards(&self, corpus: &RuleCorpus) -> Result<Vec<usize>> {
        fs::create_dir_all(&self.config.shard_dir)?;

        let parts = self.config.parts;
        log::info!(
            "Splitting {} rules into {} shards, {} per shard",
            corpus.len(),
            parts,
            chunk_size(corpus.len(), parts)
        );

        let mut sizes = Vec::with_capacity(parts);
        for (i, shard) in partition(corpus.rules(), parts).into_iter().enumerate() {
            let path = self.config.shard_path(i + 1);
            write_rules(&path, shard)?;
            log::debug!("Shard {}: {} rules -> {:?}", i + 1, shard.len(), path);
            sizes.push(shard.len());
        }
        Ok(sizes)
    }
}
