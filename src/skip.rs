//! Validation back-off for long-dead rules.
//!
//! A rule whose failure count has climbed past the skip threshold is not
//! looked up again on every run. Each run it is skipped, its skip count is
//! bumped; once the skip count reaches the configured number of rounds its
//! failure count is lowered to the resume value and it is validated again.
//! A skipped rule is reported to the reconciler as unresolved, so its
//! failure count keeps climbing while it sits out.

use crate::config::SkipConfig;
use crate::counter::Counts;

/// Which rules of a shard get looked up this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipPlan {
    /// Rules to resolve
    pub to_validate: Vec<String>,
    /// Rules sitting out this run
    pub skipped: Vec<String>,
}

/// Decide which rules to validate, updating both mappings in place.
pub fn plan(
    rules: &[String],
    failures: &mut Counts,
    skips: &mut Counts,
    config: &SkipConfig,
) -> SkipPlan {
    if !config.enabled {
        return SkipPlan {
            to_validate: rules.to_vec(),
            skipped: Vec::new(),
        };
    }

    let mut plan = SkipPlan::default();
    for rule in rules {
        let failing = failures.get(rule).copied().unwrap_or(0);
        if failing <= config.threshold {
            plan.to_validate.push(rule.clone());
            continue;
        }

        let skip_count = skips.entry(rule.clone()).or_insert(0);
        *skip_count += 1;

        if *skip_count >= config.rounds {
            log::debug!(
                "Resuming validation of {} after {} skipped runs",
                rule,
                skip_count
            );
            skips.remove(rule);
            failures.insert(rule.clone(), config.resume_count);
            plan.to_validate.push(rule.clone());
        } else {
            log::debug!(
                "Skipping validation of {} ({}/{})",
                rule,
                skip_count,
                config.rounds
            );
            plan.skipped.push(rule.clone());
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_disabled_validates_everything() {
        let mut failures = Counts::new();
        failures.insert("dead.com".to_string(), 50);
        let mut skips = Counts::new();
        let config = SkipConfig {
            enabled: false,
            ..SkipConfig::default()
        };

        let listed = rules(&["dead.com", "ok.com"]);
        let plan = plan(&listed, &mut failures, &mut skips, &config);
        assert_eq!(plan.to_validate.len(), 2);
        assert!(plan.skipped.is_empty());
        assert!(skips.is_empty());
    }

    #[test]
    fn test_at_threshold_is_validated() {
        let mut failures = Counts::new();
        failures.insert("edge.com".to_string(), 7);
        let mut skips = Counts::new();

        let listed = rules(&["edge.com"]);
        let config = SkipConfig::default();
        let plan = plan(&listed, &mut failures, &mut skips, &config);
        assert_eq!(plan.to_validate, rules(&["edge.com"]));
        assert!(skips.is_empty());
    }

    #[test]
    fn test_above_threshold_is_skipped() {
        let mut failures = Counts::new();
        failures.insert("dead.com".to_string(), 8);
        let mut skips = Counts::new();

        let listed = rules(&["dead.com", "new.com"]);
        let config = SkipConfig::default();
        let plan = plan(&listed, &mut failures, &mut skips, &config);
        assert_eq!(plan.to_validate, rules(&["new.com"]));
        assert_eq!(plan.skipped, rules(&["dead.com"]));
        assert_eq!(skips.get("dead.com"), Some(&1));
        assert_eq!(failures.get("dead.com"), Some(&8));
    }

    #[test]
    fn test_resumes_after_rounds() {
        let mut failures = Counts::new();
        failures.insert("dead.com".to_string(), 17);
        let mut skips = Counts::new();
        skips.insert("dead.com".to_string(), 9);

        let listed = rules(&["dead.com"]);
        let config = SkipConfig::default();
        let plan = plan(&listed, &mut failures, &mut skips, &config);
        assert_eq!(plan.to_validate, rules(&["dead.com"]));
        assert!(plan.skipped.is_empty());
        assert_eq!(failures.get("dead.com"), Some(&6));
        assert!(!skips.contains_key("dead.com"));
    }
}
