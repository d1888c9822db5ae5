//! Single censor rule: a literal key or a regular expression

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{NoExpand, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Result, VcrError};

/// How a [`CensorElement`] compares against keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Whole-key equality
    #[default]
    Literal,
    /// Regular expression, matching anywhere in the key
    Regex,
}

/// A key (or key pattern) to redact
///
/// The regex behind a rule is compiled on first use and reused after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CensorElement {
    pattern: String,
    #[serde(default)]
    kind: MatchKind,
    #[serde(default)]
    case_sensitive: bool,
    #[serde(skip)]
    compiled: OnceLock<Option<Regex>>,
}

impl PartialEq for CensorElement {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
            && self.kind == other.kind
            && self.case_sensitive == other.case_sensitive
    }
}

impl Eq for CensorElement {}

impl CensorElement {
    /// Literal key rule
    pub fn new(name: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            pattern: name.into(),
            kind: MatchKind::Literal,
            case_sensitive,
            compiled: OnceLock::new(),
        }
    }

    /// Regular expression rule
    ///
    /// # Errors
    ///
    /// Returns error if the pattern does not compile
    pub fn regex(pattern: impl Into<String>, case_sensitive: bool) -> Result<Self> {
        let element = Self {
            pattern: pattern.into(),
            kind: MatchKind::Regex,
            case_sensitive,
            compiled: OnceLock::new(),
        };
        element.validate()?;
        Ok(element)
    }

    /// Key name or regular expression
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Literal or regex comparison
    #[must_use]
    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    /// Whether comparison respects case
    #[must_use]
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Check that a regex rule compiles
    ///
    /// # Errors
    ///
    /// Returns error if the pattern does not compile
    pub fn validate(&self) -> Result<()> {
        if let Some(Some(_)) = self.compiled.get() {
            return Ok(());
        }
        let regex = self.build_regex()?;
        let _ = self.compiled.set(Some(regex));
        Ok(())
    }

    /// Whether `key` is covered by this rule
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        match self.kind {
            MatchKind::Literal if self.case_sensitive => key == self.pattern,
            MatchKind::Literal => key.eq_ignore_ascii_case(&self.pattern),
            MatchKind::Regex => self.compiled().is_some_and(|regex| regex.is_match(key)),
        }
    }

    /// Replace every occurrence of this rule inside `value`
    ///
    /// Literal rules replace the literal text; regex rules replace each match.
    pub fn replace_all<'a>(&self, value: &'a str, replacement: &str) -> Cow<'a, str> {
        match self.compiled() {
            Some(regex) => match regex.replace_all(value, NoExpand(replacement)) {
                Cow::Borrowed(_) => Cow::Borrowed(value),
                Cow::Owned(replaced) => Cow::Owned(replaced),
            },
            None => Cow::Borrowed(value),
        }
    }

    fn compiled(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| match self.build_regex() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!("Skipping censor rule: {e}");
                    None
                }
            })
            .as_ref()
    }

    fn build_regex(&self) -> Result<Regex> {
        let source = match self.kind {
            MatchKind::Literal => Cow::Owned(regex::escape(&self.pattern)),
            MatchKind::Regex => Cow::Borrowed(self.pattern.as_str()),
        };
        RegexBuilder::new(&source)
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|source| VcrError::InvalidPattern {
                pattern: self.pattern.clone(),
                source,
            })
    }
}

/// Whether any rule in `elements` covers `key`
pub(crate) fn any_matches(key: &str, elements: &[CensorElement]) -> bool {
    elements.iter().any(|element| element.matches(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_case_insensitive() {
        let element = CensorElement::new("Authorization", false);
        assert!(element.matches("authorization"));
        assert!(element.matches("AUTHORIZATION"));
        assert!(!element.matches("Authorization-Extra"));
    }

    #[test]
    fn test_literal_case_sensitive() {
        let element = CensorElement::new("apiKey", true);
        assert!(element.matches("apiKey"));
        assert!(!element.matches("apikey"));
    }

    #[test]
    fn test_regex_partial_match() {
        let element = CensorElement::regex(r"_token$", false).unwrap();
        assert!(element.matches("access_token"));
        assert!(element.matches("REFRESH_TOKEN"));
        assert!(!element.matches("token_type"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let result = CensorElement::regex("(unclosed", false);
        assert!(matches!(result, Err(VcrError::InvalidPattern { .. })));
    }

    #[test]
    fn test_replace_all_regex() {
        let element = CensorElement::regex(r"\d{4,}", false).unwrap();
        let replaced = element.replace_all("example.com/users/12345/orders/6789", "*****");
        assert_eq!(replaced, "example.com/users/*****/orders/*****");
    }

    #[test]
    fn test_replace_all_does_not_expand_groups() {
        let element = CensorElement::regex(r"(secret)", true).unwrap();
        let replaced = element.replace_all("a/secret/b", "$1-hidden");
        assert_eq!(replaced, "a/$1-hidden/b");
    }

    #[test]
    fn test_replace_all_literal_escapes() {
        let element = CensorElement::new("v1.0", false);
        assert_eq!(element.replace_all("api/v1.0/v100", "X"), "api/X/v100");
    }

    #[test]
    fn test_replace_without_match_borrows() {
        let element = CensorElement::new("missing", false);
        assert!(matches!(
            element.replace_all("nothing/here", "X"),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_regex_compiled_once() {
        let element = CensorElement::regex(r"^x-.*-key$", false).unwrap();
        assert!(element.matches("X-Api-Key"));
        let first = element.compiled().unwrap();
        assert!(!element.matches("x-api-token"));
        assert!(std::ptr::eq(element.compiled().unwrap(), first));
    }

    #[test]
    fn test_clone_compares_by_rule() {
        let element = CensorElement::regex("secret", true).unwrap();
        assert!(element.matches("secret"));
        assert_eq!(element.clone(), CensorElement::regex("secret", true).unwrap());
        assert_ne!(element, CensorElement::regex("secret", false).unwrap());
    }
}
