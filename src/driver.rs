//! Orchestration of the two run modes: refresh and validate one shard.

use ahash::AHashSet;
use std::cell::Cell;
use std::sync::Arc;

use crate::config::{Config, CounterLayout};
use crate::corpus::{first_rule, load_rule_set, load_rules, write_rules};
use crate::counter::CounterStore;
use crate::metadata::RefreshMetadata;
use crate::partition::Partitioner;
use crate::reconcile::{Reconciler, StateScope};
use crate::skip;
use crate::source::{read_url_list, SourceFetcher};
use crate::validate::{DomainResolver, HickoryResolver, Validator};
use crate::{Error, Result};

/// Outcome of validating one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardReport {
    /// 1-based shard index
    pub index: usize,
    /// Rules in the new output
    pub kept: usize,
    /// Rules newly kept
    pub added: usize,
    /// Rules dropped at the delete threshold
    pub removed: usize,
    /// Rules looked up this run
    pub validated: usize,
    /// Rules sitting out this run
    pub skipped: usize,
    /// Stale state entries forgotten
    pub pruned: usize,
}

impl ShardReport {
    /// Summary line consumed by the publish step.
    pub fn commit_stats(&self) -> String {
        format!(
            "COMMIT_STATS: total {}, added {}, removed {}",
            self.kept, self.added, self.removed
        )
    }
}

/// Drives corpus refreshes and shard validation.
///
/// A pruner refreshes at most once on its own: after any refresh, a
/// missing shard fails validation instead of downloading every source
/// again.
pub struct Pruner {
    config: Config,
    resolver: Option<Arc<dyn DomainResolver>>,
    refreshed: Cell<bool>,
}

impl Pruner {
    /// Create a pruner resolving through hickory.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            resolver: None,
            refreshed: Cell::new(false),
        }
    }

    /// Create a pruner resolving through a custom resolver.
    pub fn with_resolver(config: Config, resolver: impl DomainResolver) -> Self {
        Self {
            config,
            resolver: Some(Arc::new(resolver)),
            refreshed: Cell::new(false),
        }
    }

    /// Re-fetch rule sources and re-partition the corpus.
    ///
    /// Returns `true` if shard files were written. When no source can be
    /// fetched the existing corpus is kept and re-partitioned as-is.
    pub fn refresh(&self) -> Result<bool> {
        self.refreshed.set(true);
        self.aggregate()?;

        match Partitioner::new(&self.config).split() {
            Ok(sizes) => {
                log::info!("Wrote {} shards", sizes.len());
                Ok(true)
            }
            Err(Error::CorpusMissing(path)) => {
                log::warn!("No rule corpus at {:?}, cannot split", path);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Download every source into the master corpus.
    ///
    /// Returns `true` if the master corpus was rewritten.
    pub fn aggregate(&self) -> Result<bool> {
        let urls_file = &self.config.urls_file;
        if !urls_file.exists() {
            log::warn!("Source list {:?} not found", urls_file);
            return Ok(false);
        }

        let urls = read_url_list(urls_file)?;
        let fetcher = SourceFetcher::new(self.config.fetch_timeout())?;
        let aggregate = fetcher.aggregate(&urls);

        if aggregate.sources_ok == 0 {
            log::error!("No source could be fetched, keeping existing corpus");
            return Ok(false);
        }

        aggregate.corpus.save(&self.config.master_file)?;
        RefreshMetadata::now(
            aggregate.sources_ok,
            aggregate.sources_failed,
            aggregate.corpus.len(),
        )
        .save(self.config.metadata_path())?;

        log::info!(
            "Saved {} rules to {:?}",
            aggregate.corpus.len(),
            self.config.master_file
        );
        Ok(true)
    }

    /// Check that the master corpus and shard files are present.
    pub fn has_corpus(&self) -> bool {
        self.config.master_file.exists() && self.config.shard_path(1).exists()
    }

    /// Refresh when the corpus or the requested shard is missing.
    fn ensure_shard(&self, index: usize) -> Result<()> {
        let shard = self.config.shard_path(index);
        if (!self.has_corpus() || !shard.exists()) && !self.refreshed.get() {
            log::warn!("Rule corpus or shard {} missing, refreshing", index);
            self.refresh()?;
        }

        if !shard.exists() {
            log::error!("Shard {} still missing after refresh, aborting", index);
            return Err(Error::ShardMissing(shard));
        }
        Ok(())
    }

    /// Validate one shard and persist its new output and state.
    ///
    /// Nothing is written for the shard if its file cannot be produced.
    pub fn validate_shard(&self, index: usize) -> Result<ShardReport> {
        let parts = self.config.parts;
        if index == 0 || index > parts {
            return Err(Error::InvalidShard { index, parts });
        }
        self.ensure_shard(index)?;

        let source = load_rules(self.config.shard_path(index))?;
        let output_path = self.config.output_path(index);
        let previous = load_rule_set(&output_path)?;
        log::info!(
            "Validating shard {}: {} rules, {} previously kept",
            index,
            source.len(),
            previous.len()
        );

        let counter_store = CounterStore::new(self.config.counter_path(index));
        let skip_store = CounterStore::new(self.config.skip_path(index));
        let mut counters = counter_store.load()?;
        let mut skips = skip_store.load()?;

        let plan = skip::plan(&source, &mut counters, &mut skips, &self.config.skip);
        if !plan.skipped.is_empty() {
            log::info!("Skipping {} long-failing rules", plan.skipped.len());
        }

        let valid = self.run_validation(&plan.to_validate)?;

        let reconciler = Reconciler::new(self.config.delete_threshold);
        let mut result = reconciler.reconcile(&source, &valid, &previous, &counters);
        let pruned = if self.config.prune_stale {
            let scope = self.state_scope(index, &source)?;
            reconciler.prune(&mut result, &source, &mut skips, &scope)
        } else {
            0
        };
        if pruned > 0 {
            log::info!("Pruned state of {} rules that left shard {}", pruned, index);
        }

        counter_store.save(&result.counters)?;
        skip_store.save(&skips)?;
        write_rules(&output_path, &result.kept)?;

        let report = ShardReport {
            index,
            kept: result.total(),
            added: result.added,
            removed: result.removed,
            validated: plan.to_validate.len(),
            skipped: plan.skipped.len(),
            pruned,
        };
        log::info!(
            "Shard {} done: total {}, added {}, removed {}",
            index,
            report.kept,
            report.added,
            report.removed
        );
        Ok(report)
    }

    /// State entries shard `index` is responsible for.
    ///
    /// Under the shared layout a shard owns the keys sorting inside its
    /// slice of the master corpus, up to the first rule of the next
    /// non-empty shard.
    fn state_scope(&self, index: usize, source: &[String]) -> Result<StateScope> {
        if self.config.counter_layout == CounterLayout::PerShard {
            return Ok(StateScope::Whole);
        }
        let Some(first) = source.first() else {
            return Ok(StateScope::Empty);
        };

        let mut upper = None;
        for next in index + 1..=self.config.parts {
            let path = self.config.shard_path(next);
            if !path.exists() {
                continue;
            }
            upper = first_rule(&path)?;
            if upper.is_some() {
                break;
            }
        }

        Ok(StateScope::Range {
            lower: (index > 1).then(|| first.clone()),
            upper,
        })
    }

    /// Resolve `rules` on a dedicated runtime.
    fn run_validation(&self, rules: &[String]) -> Result<AHashSet<String>> {
        if rules.is_empty() {
            return Ok(AHashSet::new());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        runtime.block_on(async {
            let resolver: Arc<dyn DomainResolver> = match &self.resolver {
                Some(resolver) => Arc::clone(resolver),
                None => Arc::new(HickoryResolver::new(
                    &self.config.nameservers,
                    self.config.dns_timeout(),
                )?),
            };

            let validator =
                Validator::shared(resolver, self.config.workers, self.config.dns_timeout())
                    .with_progress_every(self.config.progress_every);
            Ok::<_, Error>(validator.validate(rules).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::RuleCorpus;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct NoResolve;

    #[async_trait]
    impl DomainResolver for NoResolve {
        async fn resolves(&self, _domain: &str) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_commit_stats() {
        let report = ShardReport {
            index: 3,
            kept: 120,
            added: 4,
            removed: 7,
            validated: 130,
            skipped: 1,
            pruned: 0,
        };
        assert_eq!(
            report.commit_stats(),
            "COMMIT_STATS: total 120, added 4, removed 7"
        );
    }

    #[test]
    fn test_invalid_shard_index() {
        let dir = tempdir().unwrap();
        let config = Config::default().rooted_at(dir.path());
        let pruner = Pruner::with_resolver(config, NoResolve);

        let err = pruner.validate_shard(0).unwrap_err();
        assert!(matches!(err, Error::InvalidShard { index: 0, .. }));
        let err = pruner.validate_shard(17).unwrap_err();
        assert!(matches!(err, Error::InvalidShard { index: 17, .. }));
    }

    #[test]
    fn test_missing_shard_aborts_without_output() {
        let dir = tempdir().unwrap();
        let config = Config::default().rooted_at(dir.path());
        let pruner = Pruner::with_resolver(config.clone(), NoResolve);

        let err = pruner.validate_shard(2).unwrap_err();
        assert!(matches!(err, Error::ShardMissing(_)));
        assert!(!config.output_path(2).exists());
        assert!(!config.counter_path(2).exists());
    }

    #[test]
    fn test_validate_after_refresh_does_not_refresh_again() {
        let dir = tempdir().unwrap();
        let config = Config {
            parts: 1,
            ..Config::default()
        }
        .rooted_at(dir.path());
        let pruner = Pruner::with_resolver(config.clone(), NoResolve);
        assert!(!pruner.refresh().unwrap());

        // A second refresh would split this corpus into the missing shard
        RuleCorpus::from_lines(["a.com"])
            .save(&config.master_file)
            .unwrap();
        let err = pruner.validate_shard(1).unwrap_err();
        assert!(matches!(err, Error::ShardMissing(_)));
        assert!(!config.shard_path(1).exists());
    }

    #[test]
    fn test_refresh_without_sources_splits_existing_corpus() {
        let dir = tempdir().unwrap();
        let config = Config {
            parts: 2,
            ..Config::default()
        }
        .rooted_at(dir.path());
        RuleCorpus::from_lines(["a.com", "b.com", "c.com"])
            .save(&config.master_file)
            .unwrap();

        let pruner = Pruner::with_resolver(config.clone(), NoResolve);
        assert!(!pruner.aggregate().unwrap());
        assert!(pruner.refresh().unwrap());
        assert!(pruner.has_corpus());
        assert_eq!(load_rules(config.shard_path(2)).unwrap(), vec!["c.com"]);
    }

    #[test]
    fn test_refresh_without_anything() {
        let dir = tempdir().unwrap();
        let config = Config::default().rooted_at(dir.path());
        let pruner = Pruner::with_resolver(config, NoResolve);
        assert!(!pruner.refresh().unwrap());
        assert!(!pruner.has_corpus());
    }

    #[test]
    fn test_aggregate_all_sources_failing_keeps_corpus() {
        let dir = tempdir().unwrap();
        let config = Config::default().rooted_at(dir.path());
        std::fs::write(&config.urls_file, "not a url\n").unwrap();
        RuleCorpus::from_lines(["keep.com"])
            .save(&config.master_file)
            .unwrap();

        let pruner = Pruner::with_resolver(config.clone(), NoResolve);
        assert!(!pruner.aggregate().unwrap());
        assert_eq!(load_rules(&config.master_file).unwrap(), vec!["keep.com"]);
        assert!(!config.metadata_path().exists());
    }
}
