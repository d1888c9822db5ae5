//! Individual match predicates

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::censor::{query_parameters, remove_json_elements, CensorElement, UrlParts};
use crate::interaction::Request;

/// One predicate over a (received, recorded) request pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum MatchRule {
    /// Case-insensitive method equality
    Method,
    /// Scheme, host, port and path equality (case-insensitive, query ignored)
    BaseUrl,
    /// Byte-for-byte URI equality, query order included
    FullUrl,
    /// Same query parameters and values, in any order
    QueryParameters,
    /// Both requests carry the named header with identical values
    Header {
        /// Header name
        name: String,
    },
    /// Both requests carry the same number of headers
    HeaderCount,
    /// Every received header exists on the recorded request with identical values
    Headers,
    /// Bodies equal after dropping ignored JSON keys
    Body {
        /// Keys removed from both bodies before comparing
        #[serde(default)]
        ignored: Vec<CensorElement>,
    },
    /// Entire serialized request equality
    Everything,
}

impl MatchRule {
    /// Evaluate this rule
    #[must_use]
    pub fn matches(&self, received: &Request, recorded: &Request) -> bool {
        match self {
            Self::Method => received.method.eq_ignore_ascii_case(&recorded.method),
            Self::BaseUrl => base_url(&received.uri).eq_ignore_ascii_case(&base_url(&recorded.uri)),
            Self::FullUrl => base64_eq(&received.uri, &recorded.uri),
            Self::QueryParameters => same_query_parameters(&received.uri, &recorded.uri),
            Self::Header { name } => match (received.headers.get(name), recorded.headers.get(name)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            Self::HeaderCount => received.headers.len() == recorded.headers.len(),
            Self::Headers => received
                .headers
                .iter()
                .all(|(name, values)| recorded.headers.get(name) == Some(values)),
            Self::Body { ignored } => bodies_match(&received.body, &recorded.body, ignored),
            Self::Everything => match (received.to_json(), recorded.to_json()) {
                (Ok(a), Ok(b)) => a.eq_ignore_ascii_case(&b),
                _ => false,
            },
        }
    }
}

/// `scheme://host[:port]/path` of a URL
pub(crate) fn base_url(url: &str) -> String {
    let parts = UrlParts::split(url);
    match parts.scheme {
        Some(scheme) => format!("{scheme}://{}", parts.location),
        None => parts.location.to_string(),
    }
}

fn base64_eq(a: &str, b: &str) -> bool {
    BASE64_STANDARD
        .encode(a)
        .eq_ignore_ascii_case(&BASE64_STANDARD.encode(b))
}

fn same_query_parameters(received: &str, recorded: &str) -> bool {
    let mut received = query_parameters(received);
    let mut recorded = query_parameters(recorded);
    if received.len() != recorded.len() {
        return false;
    }
    received.sort_unstable();
    recorded.sort_unstable();
    received == recorded
}

fn bodies_match(received: &str, recorded: &str, ignored: &[CensorElement]) -> bool {
    match (received.is_empty(), recorded.is_empty()) {
        (true, true) => return true,
        (true, false) | (false, true) => return false,
        (false, false) => {}
    }

    if ignored.is_empty() {
        return base64_eq(received, recorded);
    }

    let received = remove_json_elements(received, ignored).unwrap_or_else(|| received.to_string());
    let recorded = remove_json_elements(recorded, ignored).unwrap_or_else(|| recorded.to_string());
    base64_eq(&received, &recorded)
}
