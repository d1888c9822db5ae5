//! Rules deciding whether a live request corresponds to a recorded one

mod rule;

pub use rule::MatchRule;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::censor::CensorElement;
use crate::interaction::Request;

/// Ordered, AND-combined list of [`MatchRule`]s
///
/// An empty rule set matches every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchRules {
    rules: Vec<MatchRule>,
}

impl MatchRules {
    /// Empty rule set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Method and full URL (query order ignored)
    #[must_use]
    pub fn regular() -> Self {
        Self::new().by_method().by_full_url(false)
    }

    /// Method, full URL (query order ignored) and body
    #[must_use]
    pub fn strict() -> Self {
        Self::regular().by_body(Vec::new())
    }

    /// Build from an explicit rule list
    #[must_use]
    pub fn from_rules(rules: Vec<MatchRule>) -> Self {
        Self { rules }
    }

    /// Configured rules, in evaluation order
    #[must_use]
    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    /// Whether no rule is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn by(mut self, rule: MatchRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Compare methods
    #[must_use]
    pub fn by_method(self) -> Self {
        self.by(MatchRule::Method)
    }

    /// Compare scheme, host, port and path
    #[must_use]
    pub fn by_base_url(self) -> Self {
        self.by(MatchRule::BaseUrl)
    }

    /// Compare full URLs
    ///
    /// With `exact`, query parameters must appear in the same order.
    /// Otherwise the base URL and the set of query parameters must agree.
    #[must_use]
    pub fn by_full_url(self, exact: bool) -> Self {
        if exact {
            self.by(MatchRule::FullUrl)
        } else {
            self.by_base_url().by(MatchRule::QueryParameters)
        }
    }

    /// Compare one header
    #[must_use]
    pub fn by_header(self, name: impl Into<String>) -> Self {
        self.by(MatchRule::Header { name: name.into() })
    }

    /// Compare headers
    ///
    /// With `exact`, both requests must carry the same headers. Otherwise the
    /// recorded request may carry extra headers.
    #[must_use]
    pub fn by_headers(self, exact: bool) -> Self {
        let rules = if exact { self.by(MatchRule::HeaderCount) } else { self };
        rules.by(MatchRule::Headers)
    }

    /// Compare bodies, ignoring the given JSON keys at any depth
    #[must_use]
    pub fn by_body(self, ignored: Vec<CensorElement>) -> Self {
        self.by(MatchRule::Body { ignored })
    }

    /// Compare entire serialized requests
    ///
    /// Very strict; prefer combining the narrower rules.
    #[must_use]
    pub fn by_everything(self) -> Self {
        self.by(MatchRule::Everything)
    }

    /// Whether `received` matches `recorded` under every rule
    #[must_use]
    pub fn requests_match(&self, received: &Request, recorded: &Request) -> bool {
        for rule in &self.rules {
            if !rule.matches(received, recorded) {
                trace!("Rule {:?} rejected {} {}", rule, recorded.method, recorded.uri);
                return false;
            }
        }
        true
    }
}
