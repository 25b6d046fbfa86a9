//! Rule strings and the hostname each one is checked against.
//!
//! Rules are opaque adblock-style tokens such as `||ads.example.com^`.
//! Only a hostname substring is ever interpreted; everything else about
//! the rule syntax is preserved as-is.

/// Leading anchor marker stripped before extraction.
const ANCHOR: char = '|';

/// Separator ending the hostname part of a rule.
const SEPARATOR: char = '^';

/// Literal wildcard removed from the hostname.
const WILDCARD: char = '*';

/// Check if a line is a comment rather than a rule.
pub fn is_comment(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('#')
}

/// Normalize a raw line into a rule.
///
/// Returns `None` for blank lines and comments.
pub fn parse_line(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || is_comment(line) {
        return None;
    }
    Some(line)
}

/// Derive the hostname that decides whether a rule is still alive.
///
/// Leading anchor characters are stripped, the remainder is cut at the
/// first separator, and wildcards are removed. An empty result means the
/// rule cannot be checked and counts as a resolution failure.
///
/// # Examples
/// ```
/// use dnsprune::rule::extract_domain;
///
/// assert_eq!(extract_domain("||ads.example.com^"), "ads.example.com");
/// assert_eq!(extract_domain("||*.tracker.net^$third-party"), ".tracker.net");
/// assert_eq!(extract_domain("^"), "");
/// ```
pub fn extract_domain(rule: &str) -> String {
    let rest = rule.trim_start_matches(ANCHOR);
    let host = match rest.find(SEPARATOR) {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    host.replace(WILDCARD, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_adblock_rule() {
        assert_eq!(extract_domain("||example.com^"), "example.com");
        assert_eq!(extract_domain("|example.com^"), "example.com");
        assert_eq!(extract_domain("example.com"), "example.com");
    }

    #[test]
    fn test_extract_keeps_prefix_before_first_separator() {
        assert_eq!(extract_domain("||a.com^b.com^"), "a.com");
        assert_eq!(extract_domain("||ads.net^$important"), "ads.net");
    }

    #[test]
    fn test_extract_removes_wildcards() {
        assert_eq!(extract_domain("||*.ads.com^"), ".ads.com");
        assert_eq!(extract_domain("||ad*s.com^"), "ads.com");
        assert_eq!(extract_domain("||ads.com^*"), "ads.com");
    }

    #[test]
    fn test_extract_empty() {
        assert_eq!(extract_domain(""), "");
        assert_eq!(extract_domain("||"), "");
        assert_eq!(extract_domain("||^"), "");
        assert_eq!(extract_domain("||*^"), "");
    }

    #[test]
    fn test_is_comment() {
        assert!(is_comment("! Title: list"));
        assert!(is_comment("# hosts comment"));
        assert!(!is_comment("||example.com^"));
        assert!(!is_comment(""));
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("  ||example.com^  "), Some("||example.com^"));
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("! comment"), None);
        assert_eq!(parse_line("#comment"), None);
    }
}
