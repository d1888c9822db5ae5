//! URL splitting, query parsing and URL redaction

use std::borrow::Cow;

use url::form_urlencoded;

use super::element::{any_matches, CensorElement};

/// A URL cut into the pieces censoring works on
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UrlParts<'a> {
    /// Scheme without `://`, if present
    pub scheme: Option<&'a str>,
    /// Authority and path (everything between the scheme and `?`)
    pub location: &'a str,
    /// Raw query string without `?`
    pub query: Option<&'a str>,
    /// Fragment without `#`
    pub fragment: Option<&'a str>,
}

impl<'a> UrlParts<'a> {
    /// Split a URL without validating it
    pub fn split(url: &'a str) -> Self {
        let (rest, fragment) = match url.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (url, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };
        let (scheme, location) = match rest.split_once("://") {
            Some((scheme, location)) => (Some(scheme), location),
            None => (None, rest),
        };
        Self {
            scheme,
            location,
            query,
            fragment,
        }
    }

    /// Reassemble with replacement location and query
    pub fn join(&self, location: &str, query: Option<&str>) -> String {
        let mut url = String::with_capacity(self.location.len() + 16);
        if let Some(scheme) = self.scheme {
            url.push_str(scheme);
            url.push_str("://");
        }
        url.push_str(location);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        if let Some(fragment) = self.fragment {
            url.push('#');
            url.push_str(fragment);
        }
        url
    }
}

/// Decode a query string into ordered `(key, value)` pairs
///
/// Repeated keys are kept; `+` decodes to a space.
pub(crate) fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

/// Encode `(key, value)` pairs as a query string
///
/// Form encoding: spaces become `+`, and `*`, `-`, `_`, `.` stay literal, so
/// the default censor text is stored as written.
pub(crate) fn encode_query(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Query parameters of a full URL
pub(crate) fn query_parameters(url: &str) -> Vec<(String, String)> {
    UrlParts::split(url)
        .query
        .map(parse_query)
        .unwrap_or_default()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Redact path segments and query values of a URL
///
/// Path rules run first, as find-and-replace over host and path. Query rules
/// replace the value of every matching key.
pub(crate) fn censor_url(
    url: &str,
    censor_text: &str,
    query_elements: &[CensorElement],
    path_elements: &[CensorElement],
) -> String {
    if url.is_empty() || (query_elements.is_empty() && path_elements.is_empty()) {
        return url.to_string();
    }

    let parts = UrlParts::split(url);

    let mut location = Cow::Borrowed(parts.location);
    for element in path_elements {
        if let Cow::Owned(replaced) = element.replace_all(&location, censor_text) {
            location = Cow::Owned(replaced);
        }
    }

    let query = match parts.query {
        Some(raw) if !query_elements.is_empty() => {
            let mut pairs = parse_query(raw);
            for (key, value) in &mut pairs {
                if any_matches(key, query_elements) {
                    censor_text.clone_into(value);
                }
            }
            Some(Cow::Owned(encode_query(&pairs)))
        }
        other => other.map(Cow::Borrowed),
    };

    parts.join(&location, query.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_full_url() {
        let parts = UrlParts::split("https://api.example.com:8443/v1/items?limit=5&page=2#top");
        assert_eq!(parts.scheme, Some("https"));
        assert_eq!(parts.location, "api.example.com:8443/v1/items");
        assert_eq!(parts.query, Some("limit=5&page=2"));
        assert_eq!(parts.fragment, Some("top"));
    }

    #[test]
    fn test_split_relative() {
        let parts = UrlParts::split("/x");
        assert_eq!(parts.scheme, None);
        assert_eq!(parts.location, "/x");
        assert_eq!(parts.query, None);
    }

    #[test]
    fn test_parse_query_decodes() {
        let pairs = parse_query("q=hello+world&name=a%26b&flag&&empty=");
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "hello world".to_string()),
                ("name".to_string(), "a&b".to_string()),
                ("flag".to_string(), String::new()),
                ("empty".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_censor_query_value() {
        let url = "https://example.com/search?api_key=abc123&q=rust";
        let censored = censor_url(url, "*****", &[CensorElement::new("api_key", false)], &[]);

        assert!(censored.starts_with("https://example.com/search?"));
        let pairs = query_parameters(&censored);
        assert_eq!(pairs[0], ("api_key".to_string(), "*****".to_string()));
        assert_eq!(pairs[1], ("q".to_string(), "rust".to_string()));
    }

    #[test]
    fn test_censor_text_stored_literally() {
        let url = "http://example.com/a?api_key=abc&q=a+b";
        let censored = censor_url(url, "*****", &[CensorElement::new("api_key", false)], &[]);
        assert_eq!(censored, "http://example.com/a?api_key=*****&q=a+b");
    }

    #[test]
    fn test_encode_query_escapes_reserved() {
        let pairs = vec![
            ("name".to_string(), "a&b=c".to_string()),
            ("path".to_string(), "/x y".to_string()),
        ];
        assert_eq!(encode_query(&pairs), "name=a%26b%3Dc&path=%2Fx+y");
    }

    #[test]
    fn test_censor_path_before_query() {
        let url = "https://example.com/users/123456/profile?token=x";
        let path_rule = CensorElement::regex(r"\d{6}", false).unwrap();
        let censored = censor_url(url, "ID", &[], &[path_rule]);
        assert_eq!(censored, "https://example.com/users/ID/profile?token=x");
    }

    #[test]
    fn test_no_rules_is_identity() {
        let url = "https://example.com/a?b=c%20d";
        assert_eq!(censor_url(url, "*****", &[], &[]), url);
    }

    #[test]
    fn test_no_query_keeps_url() {
        let url = "http://example.com/a";
        let censored = censor_url(url, "*****", &[CensorElement::new("key", false)], &[]);
        assert_eq!(censored, url);
    }
}
