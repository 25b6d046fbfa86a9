//! Rule source aggregation.
//!
//! Downloads every URL listed in the sources file and merges the bodies
//! into one sorted, deduplicated [`RuleCorpus`]. A source that cannot be
//! fetched is logged and contributes nothing; it never fails the run.

use flate2::read::GzDecoder;
use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use crate::corpus::RuleCorpus;
use crate::rule::parse_line;
use crate::{Error, Result};

/// Outcome of fetching every configured source.
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    /// Merged rules
    pub corpus: RuleCorpus,
    /// Sources fetched successfully
    pub sources_ok: usize,
    /// Sources that failed and were skipped
    pub sources_failed: usize,
}

/// Downloads rule sources over HTTP.
pub struct SourceFetcher {
    client: reqwest::blocking::Client,
}

impl SourceFetcher {
    /// Create a fetcher with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dnsprune/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Fetch one source and return its decoded text.
    pub fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send()?.error_for_status()?;
        let body = response.bytes()?;
        decode_body(&body)
    }

    /// Fetch every URL and merge the results.
    pub fn aggregate(&self, urls: &[String]) -> Aggregate {
        let mut merged = BTreeSet::new();
        let mut sources_ok = 0;
        let mut sources_failed = 0;

        for url in urls {
            log::info!("Fetching {}", url);
            match self.fetch(url) {
                Ok(body) => {
                    let before = merged.len();
                    merge_body(&mut merged, &body);
                    log::info!("  {} new rules from {}", merged.len() - before, url);
                    sources_ok += 1;
                }
                Err(e) => {
                    log::warn!("Failed to fetch {}: {}", url, e);
                    sources_failed += 1;
                }
            }
        }

        log::info!(
            "Merged {} rules from {} sources ({} failed)",
            merged.len(),
            sources_ok,
            sources_failed
        );

        Aggregate {
            corpus: RuleCorpus::from_lines(merged),
            sources_ok,
            sources_failed,
        }
    }
}

/// Read the source list, skipping blank and comment lines.
pub fn read_url_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Check if data is gzip compressed.
fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

/// Decode a response body, transparently gunzipping `.gz` payloads.
pub fn decode_body(data: &[u8]) -> Result<String> {
    if is_gzip(data) {
        let mut decoder = GzDecoder::new(data);
        let mut text = String::new();
        decoder.read_to_string(&mut text)?;
        return Ok(text);
    }
    String::from_utf8(data.to_vec())
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Merge the rules of one source body into the accumulated set.
pub fn merge_body(merged: &mut BTreeSet<String>, body: &str) {
    for line in body.lines() {
        if let Some(rule) = parse_line(line) {
            merged.insert(rule.to_string());
        }
    }
}
