//! Merge of one validation run into a shard's persisted state.
//!
//! The reconciler is a hysteresis filter over DNS results. A rule that
//! resolves is kept and its failure count drops to zero. A rule that does
//! not resolve has its count bumped by one and is only removed once the
//! count reaches the delete threshold, so a long-trusted rule survives a
//! few transient failures. A failing rule with no history at all is seeded
//! directly at the threshold and removed on its first failure.
//!
//! The working universe is the previous output together with the shard's
//! current source list: a rule may still be in the output after leaving
//! the upstream lists, or be new upstream without ever having been kept.

use ahash::AHashSet;
use std::collections::BTreeSet;

use crate::counter::Counts;

/// Result of reconciling one shard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// New shard output, sorted
    pub kept: Vec<String>,
    /// Updated failure counters
    pub counters: Counts,
    /// Rules kept now that were not in the previous output
    pub added: usize,
    /// Rules dropped for reaching the delete threshold
    pub removed: usize,
    /// Rules that are in neither the source list nor the new output
    pub stale: Vec<String>,
}

impl Reconciliation {
    /// Number of rules in the new output.
    pub fn total(&self) -> usize {
        self.kept.len()
    }
}

/// Persisted state entries a shard is responsible for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateScope {
    /// The state files hold this shard only.
    Whole,
    /// Keys sorting in `lower..upper`, unbounded where `None`.
    Range {
        lower: Option<String>,
        upper: Option<String>,
    },
    /// Nothing outside the working universe.
    Empty,
}

impl StateScope {
    /// Check if `rule` falls in this scope.
    pub fn contains(&self, rule: &str) -> bool {
        match self {
            StateScope::Whole => true,
            StateScope::Range { lower, upper } => {
                lower.as_deref().map_or(true, |l| rule >= l)
                    && upper.as_deref().map_or(true, |u| rule < u)
            }
            StateScope::Empty => false,
        }
    }
}

/// Applies the failure counting policy.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    delete_threshold: u32,
}

impl Reconciler {
    /// Create a reconciler removing rules at `delete_threshold` failures.
    pub fn new(delete_threshold: u32) -> Self {
        Self { delete_threshold }
    }

    /// Failure count after one more failed run.
    pub fn next_failure_count(&self, prior: Option<u32>) -> u32 {
        match prior {
            None => self.delete_threshold,
            Some(count) => count.saturating_add(1),
        }
    }

    /// Merge this run's results into the shard state.
    ///
    /// * `source` - the shard's current rule list
    /// * `valid` - rules that resolved this run
    /// * `previous` - the shard's previous output
    /// * `counters` - failure counters before this run
    pub fn reconcile(
        &self,
        source: &[String],
        valid: &AHashSet<String>,
        previous: &AHashSet<String>,
        counters: &Counts,
    ) -> Reconciliation {
        let universe: BTreeSet<&String> = previous.iter().chain(source.iter()).collect();
        let in_source: AHashSet<&String> = source.iter().collect();

        let mut result = Reconciliation {
            counters: counters.clone(),
            ..Reconciliation::default()
        };

        for rule in universe {
            if valid.contains(rule) {
                result.counters.insert(rule.clone(), 0);
                result.kept.push(rule.clone());
                if !previous.contains(rule) {
                    result.added += 1;
                }
                continue;
            }

            let count = self.next_failure_count(counters.get(rule).copied());
            result.counters.insert(rule.clone(), count);
            log::debug!("Failure count {} for {}", count, rule);

            if count >= self.delete_threshold {
                result.removed += 1;
                if !in_source.contains(rule) {
                    result.stale.push(rule.clone());
                }
                continue;
            }
            result.kept.push(rule.clone());
        }

        result
    }

    /// Forget counter and skip entries of rules that left the shard.
    ///
    /// Drops every entry in `scope` whose rule is neither in `source` nor
    /// kept, plus the stale rules of the working universe. Outside
    /// [`StateScope::Whole`] an entry still below the threshold may back a
    /// neighbouring shard's output and is left alone.
    ///
    /// A pruned rule that shows up again and fails is re-seeded at the
    /// threshold, which yields the same verdict as a count already at or
    /// past it.
    pub fn prune(
        &self,
        result: &mut Reconciliation,
        source: &[String],
        skips: &mut Counts,
        scope: &StateScope,
    ) -> usize {
        let in_source: AHashSet<&str> = source.iter().map(String::as_str).collect();
        let kept: AHashSet<&str> = result.kept.iter().map(String::as_str).collect();
        let owned = |rule: &str, count: Option<u32>| {
            !in_source.contains(rule)
                && !kept.contains(rule)
                && scope.contains(rule)
                && (matches!(scope, StateScope::Whole)
                    || count.map_or(true, |c| c >= self.delete_threshold))
        };

        let mut gone: BTreeSet<String> = result.stale.iter().cloned().collect();
        for (rule, count) in &result.counters {
            if owned(rule.as_str(), Some(*count)) {
                gone.insert(rule.clone());
            }
        }
        for rule in skips.keys() {
            if owned(rule.as_str(), result.counters.get(rule).copied()) {
                gone.insert(rule.clone());
            }
        }

        let mut pruned = 0;
        for rule in &gone {
            let had_counter = result.counters.remove(rule).is_some();
            let had_skip = skips.remove(rule).is_some();
            if had_counter || had_skip {
                pruned += 1;
            }
        }
        pruned
    }
}
