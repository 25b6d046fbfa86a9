//! DNS resolvers used by the validator.

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use std::time::Duration;

use crate::{Error, Result};

/// Answers whether a hostname currently resolves.
#[async_trait]
pub trait DomainResolver: Send + Sync + 'static {
    /// Resolve `domain`, returning `Ok(true)` if at least one record came back.
    async fn resolves(&self, domain: &str) -> Result<bool>;
}

/// Resolver backed by hickory, querying A/AAAA records.
pub struct HickoryResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryResolver {
    /// Build a resolver.
    ///
    /// With no explicit nameservers the system configuration is used,
    /// falling back to hickory's default upstreams when it cannot be read.
    /// Each lookup makes a single attempt bounded by `timeout`, and answers
    /// are not cached so every run observes live DNS.
    pub fn new(nameservers: &[IpAddr], timeout: Duration) -> Result<Self> {
        let (config, mut opts) = if nameservers.is_empty() {
            match hickory_resolver::system_conf::read_system_conf() {
                Ok(conf) => conf,
                Err(e) => {
                    log::warn!("Cannot read system resolver config ({}), using defaults", e);
                    (ResolverConfig::default(), ResolverOpts::default())
                }
            }
        } else {
            let group = NameServerConfigGroup::from_ips_clear(nameservers, 53, true);
            (
                ResolverConfig::from_parts(None, vec![], group),
                ResolverOpts::default(),
            )
        };

        opts.timeout = timeout;
        opts.attempts = 1;
        opts.cache_size = 0;

        if config.name_servers().is_empty() {
            return Err(Error::Resolver("no nameservers configured".to_string()));
        }

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        })
    }
}

#[async_trait]
impl DomainResolver for HickoryResolver {
    async fn resolves(&self, domain: &str) -> Result<bool> {
        let lookup = self
            .resolver
            .lookup_ip(domain)
            .await
            .map_err(|e| Error::Resolver(e.to_string()))?;
        Ok(lookup.iter().next().is_some())
    }
}
