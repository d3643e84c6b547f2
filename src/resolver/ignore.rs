//! Tag ignore rules
//!
//! A tag is ignored when it is one of the built-in floating markers or when an
//! applicable rule matches it. A rule applies to every repository unless it
//! names image patterns, in which case at least one of them must match.

use crate::error::{RegistryError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Markers that never name an immutable version, compared case-insensitively
pub const BUILTIN_IGNORED: &[&str] = &["latest", "stable"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Exact,
    Regex,
}

/// Ignore rule as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRule {
    #[serde(rename = "version")]
    pub pattern: String,
    #[serde(rename = "type", default)]
    pub match_type: MatchType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl IgnoreRule {
    pub fn exact(version: impl Into<String>) -> Self {
        Self {
            pattern: version.into(),
            match_type: MatchType::Exact,
            images: Vec::new(),
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            match_type: MatchType::Regex,
            images: Vec::new(),
        }
    }

    pub fn for_images<I, S>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images = images.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone)]
enum VersionMatcher {
    Exact(String),
    Regex(Regex),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    version: VersionMatcher,
    scope: Vec<Regex>,
}

impl CompiledRule {
    fn applies_to(&self, registry: &str, repository: &str) -> bool {
        if self.scope.is_empty() {
            return true;
        }
        let qualified = format!("{}/{}", registry, repository);
        self.scope
            .iter()
            .any(|re| re.is_match(repository) || re.is_match(&qualified))
    }

    fn matches(&self, tag: &str) -> bool {
        match &self.version {
            VersionMatcher::Exact(version) => version == tag,
            VersionMatcher::Regex(re) => re.is_match(tag),
        }
    }
}

/// Validated, compiled set of ignore rules
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<CompiledRule>,
}

impl IgnoreRules {
    pub fn none() -> Self {
        Self::default()
    }

    /// Compile rules, rejecting empty versions and invalid patterns.
    pub fn compile(rules: &[IgnoreRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                if rule.pattern.trim().is_empty() {
                    return Err(RegistryError::Validation(
                        "ignore rule version cannot be empty".to_string(),
                    ));
                }
                let version = match rule.match_type {
                    MatchType::Exact => VersionMatcher::Exact(rule.pattern.clone()),
                    MatchType::Regex => VersionMatcher::Regex(full_match(&rule.pattern)?),
                };
                let scope = rule
                    .images
                    .iter()
                    .map(|p| full_match(p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(CompiledRule { version, scope })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `tag` should be excluded from candidates for this repository.
    pub fn is_ignored(&self, tag: &str, floating_tag: &str, registry: &str, repository: &str) -> bool {
        if tag.eq_ignore_ascii_case(floating_tag)
            || BUILTIN_IGNORED.iter().any(|marker| tag.eq_ignore_ascii_case(marker))
        {
            return true;
        }
        self.rules
            .iter()
            .any(|rule| rule.applies_to(registry, repository) && rule.matches(tag))
    }

    /// Split tags into (relevant, ignored), keeping their order.
    pub fn partition(
        &self,
        tags: Vec<String>,
        floating_tag: &str,
        registry: &str,
        repository: &str,
    ) -> (Vec<String>, Vec<String>) {
        tags.into_iter()
            .partition(|tag| !self.is_ignored(tag, floating_tag, registry, repository))
    }
}

// Patterns must match the whole string
fn full_match(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{})$", pattern))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_markers_are_case_insensitive() {
        let rules = IgnoreRules::none();
        for tag in ["latest", "LATEST", "Stable", "edge"] {
            assert!(rules.is_ignored(tag, "edge", "docker.io", "library/nginx"), "{}", tag);
        }
        assert!(!rules.is_ignored("1.25", "latest", "docker.io", "library/nginx"));
    }

    #[test]
    fn exact_and_regex_rules() {
        let rules = IgnoreRules::compile(&[IgnoreRule::exact("1.0-beta"), IgnoreRule::regex(r".*-rc\d+")]).unwrap();
        assert!(rules.is_ignored("1.0-beta", "latest", "r.io", "app"));
        assert!(!rules.is_ignored("1.0-BETA", "latest", "r.io", "app"));
        assert!(rules.is_ignored("2.0-rc1", "latest", "r.io", "app"));
        // Regex must match the whole tag
        assert!(!rules.is_ignored("2.0-rc1-fixed", "latest", "r.io", "app"));
    }

    #[test]
    fn scoped_rule_only_applies_to_matching_images() {
        let rules = IgnoreRules::compile(&[IgnoreRule::regex(r"\d+\.\d+").for_images(["app/foo"])]).unwrap();
        let tags: Vec<String> = ["1.2", "1.2.3", "latest"].iter().map(|s| s.to_string()).collect();

        let (foo, foo_ignored) = rules.partition(tags.clone(), "latest", "registry.example.com", "app/foo");
        assert_eq!(foo, vec!["1.2.3"]);
        assert_eq!(foo_ignored, vec!["1.2", "latest"]);

        let (bar, _) = rules.partition(tags, "latest", "registry.example.com", "app/bar");
        assert_eq!(bar, vec!["1.2", "1.2.3"]);
    }

    #[test]
    fn scope_can_name_the_registry() {
        let rules = IgnoreRules::compile(&[IgnoreRule::exact("old").for_images([r"registry\.example\.com/.*"])]).unwrap();
        assert!(rules.is_ignored("old", "latest", "registry.example.com", "app/foo"));
        assert!(!rules.is_ignored("old", "latest", "ghcr.io", "app/foo"));
    }

    #[test]
    fn invalid_rules_are_rejected() {
        assert!(IgnoreRules::compile(&[IgnoreRule::regex("(")]).is_err());
        assert!(IgnoreRules::compile(&[IgnoreRule::exact(" ")]).is_err());
        assert!(IgnoreRules::compile(&[IgnoreRule::exact("x").for_images(["["])]).is_err());
    }

    #[test]
    fn rule_deserializes_from_config_shape() {
        let rule: IgnoreRule =
            serde_json::from_str(r#"{"version": ".*-alpine", "type": "regex", "images": ["library/.*"]}"#).unwrap();
        assert_eq!(rule.match_type, MatchType::Regex);
        assert_eq!(rule.images, vec!["library/.*"]);

        let rule: IgnoreRule = serde_json::from_str(r#"{"version": "1.0"}"#).unwrap();
        assert_eq!(rule.match_type, MatchType::Exact);
        assert!(rule.images.is_empty());
    }
}
