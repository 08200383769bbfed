//! Site exclusions: which domains bypass (or exclusively use) the tunnel.

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::ansi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExclusionMode {
    /// Listed domains are excluded from the tunnel.
    #[default]
    General,
    /// Only listed domains go through the tunnel.
    Selective,
}

impl ExclusionMode {
    /// Argument accepted by `site-exclusions mode`.
    pub fn as_arg(self) -> &'static str {
        match self {
            ExclusionMode::General => "general",
            ExclusionMode::Selective => "selective",
        }
    }

    /// Compact tag for tray labels.
    pub fn short_label(self) -> &'static str {
        match self {
            ExclusionMode::General => "GEN",
            ExclusionMode::Selective => "SEL",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ExclusionMode::General => ExclusionMode::Selective,
            ExclusionMode::Selective => ExclusionMode::General,
        }
    }
}

impl fmt::Display for ExclusionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

impl FromStr for ExclusionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(ExclusionMode::General),
            "selective" => Ok(ExclusionMode::Selective),
            other => Err(format!("unknown exclusion mode '{other}'")),
        }
    }
}

/// Mode and domain list as reported by one `site-exclusions show`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteExclusions {
    pub mode: ExclusionMode,
    pub domains: Vec<String>,
}

impl SiteExclusions {
    /// Case-insensitive membership test, matching how the tool treats domains.
    pub fn contains(&self, domain: &str) -> bool {
        self.domains.iter().any(|d| d.eq_ignore_ascii_case(domain))
    }
}

/// Parses `site-exclusions show` output.
///
/// Every line that reads as a single domain-like token (optionally bulleted)
/// is collected in order. Of the remaining lines, the first shaped like
/// `Mode: selective` sets the mode; without one the tool's default
/// (general) is assumed.
pub fn parse_site_exclusions(output: &str) -> SiteExclusions {
    let mut mode = None;
    let mut domains = Vec::new();

    for raw in output.lines() {
        let line = ansi::strip(raw);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(domain) = domain_from_line(line) {
            domains.push(domain);
        } else if mode.is_none() {
            mode = mode_from_line(line);
        }
    }

    if mode.is_none() {
        debug!("no exclusion mode line found, assuming general");
    }

    SiteExclusions {
        mode: mode.unwrap_or_default(),
        domains,
    }
}

/// `<label> mode: <value>`, where the label is optional and the value is
/// the first word after the colon.
fn mode_from_line(line: &str) -> Option<ExclusionMode> {
    let (label, value) = line.split_once(':')?;
    if !label.trim_end().to_ascii_lowercase().ends_with("mode") {
        return None;
    }
    value
        .split_whitespace()
        .next()?
        .trim_end_matches('.')
        .parse()
        .ok()
}

fn domain_from_line(line: &str) -> Option<String> {
    let token = ["- ", "* ", "• "]
        .iter()
        .find_map(|bullet| line.strip_prefix(bullet))
        .unwrap_or(line)
        .trim();
    if token.ends_with(':') || !token.contains('.') {
        return None;
    }
    normalize_domain(token)
}

/// Trims a user-supplied domain and rejects empty or multi-word input.
pub fn normalize_domain(domain: &str) -> Option<String> {
    let domain = domain.trim();
    if domain.is_empty() || domain.chars().any(char::is_whitespace) {
        None
    } else {
        Some(domain.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_and_domains() {
        let output = "Site exclusions mode: \x1b[1mSELECTIVE\x1b[0m\n\
                      Site exclusions:\n\
                      example.com\n\
                      *.internal.example.org\n";
        let parsed = parse_site_exclusions(output);
        assert_eq!(parsed.mode, ExclusionMode::Selective);
        assert_eq!(parsed.domains, ["example.com", "*.internal.example.org"]);
    }

    #[test]
    fn bulleted_domains() {
        let output = "Current mode: general\n  - example.com\n  • news.example.net\n";
        let parsed = parse_site_exclusions(output);
        assert_eq!(parsed.mode, ExclusionMode::General);
        assert_eq!(parsed.domains, ["example.com", "news.example.net"]);
    }

    #[test]
    fn missing_mode_defaults_to_general() {
        let parsed = parse_site_exclusions("example.com\n");
        assert_eq!(parsed.mode, ExclusionMode::General);
        assert_eq!(parsed.domains, ["example.com"]);
    }

    #[test]
    fn prose_lines_are_not_domains() {
        let output = "Mode: general\nThe list of site exclusions is empty.\n";
        let parsed = parse_site_exclusions(output);
        assert!(parsed.domains.is_empty());
    }

    #[test]
    fn domains_mentioning_mode_words_are_kept() {
        let output = "Mode: general\n\
                      example.com\n\
                      modernizr.com\n\
                      models.example.org\n\
                      general-selective.net\n";
        let parsed = parse_site_exclusions(output);
        assert_eq!(parsed.mode, ExclusionMode::General);
        assert_eq!(
            parsed.domains,
            [
                "example.com",
                "modernizr.com",
                "models.example.org",
                "general-selective.net"
            ]
        );
    }

    #[test]
    fn domain_before_mode_line_does_not_set_mode() {
        let parsed = parse_site_exclusions("selectivemodels.com\nMode: general\n");
        assert_eq!(parsed.mode, ExclusionMode::General);
        assert_eq!(parsed.domains, ["selectivemodels.com"]);
    }

    #[test]
    fn prose_mentioning_modes_is_ignored() {
        let output = "Use selective mode to route only listed sites\nMode: selective\n";
        let parsed = parse_site_exclusions(output);
        assert_eq!(parsed.mode, ExclusionMode::Selective);
        assert!(parsed.domains.is_empty());
    }

    #[test]
    fn contains_ignores_case() {
        let parsed = SiteExclusions {
            mode: ExclusionMode::General,
            domains: vec!["Example.com".to_string()],
        };
        assert!(parsed.contains("example.COM"));
        assert!(!parsed.contains("example.org"));
    }

    #[test]
    fn mode_round_trips_through_arg() {
        for mode in [ExclusionMode::General, ExclusionMode::Selective] {
            assert_eq!(mode.as_arg().parse::<ExclusionMode>(), Ok(mode));
        }
        assert!("both".parse::<ExclusionMode>().is_err());
        assert_eq!(ExclusionMode::General.toggled(), ExclusionMode::Selective);
    }

    #[test]
    fn normalize_rejects_blank_and_spaced() {
        assert_eq!(normalize_domain("  example.com "), Some("example.com".to_string()));
        assert_eq!(normalize_domain("   "), None);
        assert_eq!(normalize_domain("exa mple.com"), None);
    }
}
