//! Newline-delimited rule files.
//!
//! The master corpus, shard files and validated outputs all share the same
//! text format: one rule per line, comments and blank lines ignored on read.

use std::collections::BTreeSet;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use ahash::AHashSet;

use crate::rule::parse_line;
use crate::Result;

/// Sorted, deduplicated rule corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleCorpus {
    rules: Vec<String>,
}

impl RuleCorpus {
    /// Build a corpus from arbitrary lines, sorting and deduplicating.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = lines
            .into_iter()
            .filter_map(|l| parse_line(l.as_ref()).map(str::to_string))
            .collect();
        Self {
            rules: set.into_iter().collect(),
        }
    }

    /// Load a corpus file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = fs::File::open(path)?;
        Ok(Self::from_lines(read_rules(file)?))
    }

    /// Write the corpus to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_rules(path, &self.rules)
    }

    /// Rules in sorted order.
    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the corpus is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Read rules from a reader, preserving file order and duplicates.
pub fn read_rules<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut rules = Vec::new();
    for line in BufReader::new(reader).lines() {
        let line = line?;
        if let Some(rule) = parse_line(&line) {
            rules.push(rule.to_string());
        }
    }
    Ok(rules)
}

/// Read a rule file in file order.
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<String>> {
    read_rules(fs::File::open(path)?)
}

/// First rule of a rule file, if it holds any.
pub fn first_rule(path: impl AsRef<Path>) -> Result<Option<String>> {
    let file = fs::File::open(path)?;
    for line in BufReader::new(file).lines() {
        if let Some(rule) = parse_line(&line?) {
            return Ok(Some(rule.to_string()));
        }
    }
    Ok(None)
}

/// Read a rule file as a set, treating a missing file as empty.
pub fn load_rule_set(path: impl AsRef<Path>) -> Result<AHashSet<String>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(AHashSet::new());
    }
    Ok(load_rules(path)?.into_iter().collect())
}

/// Write rules one per line, creating parent directories as needed.
pub fn write_rules<S: AsRef<str>>(path: impl AsRef<Path>, rules: &[S]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut content = String::new();
    for rule in rules {
        content.push_str(rule.as_ref());
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}
