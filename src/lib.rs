//! dnsprune - keep a domain blocklist free of dead entries.
//!
//! Third-party rule lists are merged into one sorted corpus, the corpus is
//! cut into fixed shards, and each shard is periodically checked against
//! live DNS. Rules whose hostname keeps failing to resolve are dropped,
//! while a failure counter persisted across runs keeps transient DNS
//! hiccups from churning long-standing rules.
//!
//! # Pipeline
//!
//! 1. [`source`] downloads the configured lists into a [`RuleCorpus`]
//! 2. [`partition`] splits the corpus into `part_NN.txt` shard files
//! 3. [`validate`] resolves one shard's hostnames with bounded concurrency
//! 4. [`reconcile`] merges the results with the previous output and the
//!    persisted failure counters
//!
//! # Quick Start
//!
//! ```ignore
//! use dnsprune::{Config, Pruner};
//!
//! let pruner = Pruner::new(Config::default());
//! let report = pruner.validate_shard(1)?;
//! println!("{}", report.commit_stats());
//! ```
//!
//! # Failure Counting
//!
//! With the default delete threshold of 4:
//! - a rule that resolves is kept and its counter reset to 0
//! - a kept rule that stops resolving survives three failed runs and is
//!   dropped on the fourth
//! - a rule with no history that fails is seeded at 4 and dropped at once

mod error;

pub mod config;
pub mod corpus;
pub mod counter;
pub mod driver;
pub mod metadata;
pub mod partition;
pub mod reconcile;
pub mod rule;
pub mod skip;
pub mod source;
pub mod validate;

// Re-export core types
pub use error::{Error, Result};

pub use config::{Config, CounterLayout, SkipConfig};
pub use corpus::RuleCorpus;
pub use counter::{CounterStore, Counts};
pub use driver::{Pruner, ShardReport};
pub use metadata::RefreshMetadata;
pub use partition::Partitioner;
pub use reconcile::{Reconciler, Reconciliation, StateScope};
pub use rule::extract_domain;
pub use validate::{DomainResolver, HickoryResolver, Validator};
