//! Concurrent DNS validation of a shard.
//!
//! One lookup task is spawned per rule; a semaphore caps how many run at
//! once and every lookup is bounded by its own timeout, so total wall time
//! is roughly `rules / workers * timeout` in the worst case. There is no
//! global deadline. Any lookup error, timeout, empty hostname or panicking
//! task simply leaves that rule out of the result.

pub mod resolver;

use ahash::AHashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::rule::extract_domain;

pub use resolver::{DomainResolver, HickoryResolver};

/// Bounded-concurrency DNS validator.
pub struct Validator<R: ?Sized> {
    resolver: Arc<R>,
    workers: usize,
    timeout: Duration,
    progress_every: usize,
}

impl<R: DomainResolver> Validator<R> {
    /// Create a validator running at most `workers` lookups at once.
    pub fn new(resolver: R, workers: usize, timeout: Duration) -> Self {
        Self::shared(Arc::new(resolver), workers, timeout)
    }
}

impl<R: DomainResolver + ?Sized> Validator<R> {
    /// Create a validator around an already shared resolver.
    pub fn shared(resolver: Arc<R>, workers: usize, timeout: Duration) -> Self {
        Self {
            resolver,
            workers: workers.max(1),
            timeout,
            progress_every: 500,
        }
    }

    /// Log progress every `n` completed lookups (0 disables).
    pub fn with_progress_every(mut self, n: usize) -> Self {
        self.progress_every = n;
        self
    }

    /// Return the subset of `rules` whose hostname resolved.
    ///
    /// Results are gathered in completion order; the returned set carries
    /// no ordering.
    pub async fn validate(&self, rules: &[String]) -> AHashSet<String> {
        let total = rules.len();
        log::info!(
            "Validating {} rules with {} concurrent lookups",
            total,
            self.workers
        );

        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for rule in rules {
            let rule = rule.clone();
            let resolver = Arc::clone(&self.resolver);
            let permits = Arc::clone(&permits);
            let timeout = self.timeout;

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                check_rule(resolver.as_ref(), &rule, timeout)
                    .await
                    .then_some(rule)
            });
        }

        let mut valid = AHashSet::with_capacity(total);
        let mut done = 0;
        while let Some(joined) = tasks.join_next().await {
            done += 1;
            match joined {
                Ok(Some(rule)) => {
                    valid.insert(rule);
                }
                Ok(None) => {}
                Err(e) => log::warn!("Lookup task failed: {}", e),
            }
            if self.progress_every > 0 && done % self.progress_every == 0 {
                log::info!("Validated {}/{}, {} resolved", done, total, valid.len());
            }
        }

        log::info!("Validation finished: {}/{} resolved", valid.len(), total);
        valid
    }
}

/// Check a single rule. Never fails: every problem is a `false`.
pub async fn check_rule<R: DomainResolver + ?Sized>(
    resolver: &R,
    rule: &str,
    timeout: Duration,
) -> bool {
    let domain = extract_domain(rule);
    if domain.is_empty() {
        log::debug!("No checkable hostname in {}", rule);
        return false;
    }

    match tokio::time::timeout(timeout, resolver.resolves(&domain)).await {
        Ok(Ok(resolved)) => resolved,
        Ok(Err(e)) => {
            log::debug!("Lookup of {} failed: {}", domain, e);
            false
        }
        Err(_) => {
            log::debug!("Lookup of {} timed out", domain);
            false
        }
    }
}
