//! Redaction of sensitive data before it reaches a cassette
//!
//! Four independent passes: headers, query parameters, path segments and JSON
//! body fields. A pass with no rules does no parsing at all.

mod body;
mod element;
mod url;

pub use element::{CensorElement, MatchKind};

pub(crate) use body::remove_json_elements;
pub(crate) use url::{query_parameters, UrlParts};

use serde::{Deserialize, Serialize};

use crate::interaction::{Headers, Request, Response};
use crate::Result;

use element::any_matches;

/// Replacement text used when none is configured
pub const DEFAULT_CENSOR_TEXT: &str = "*****";

/// Headers hidden by [`Censors::strict`]
pub const DEFAULT_CREDENTIAL_HEADERS: &[&str] = &["Authorization"];

/// Body and query keys hidden by [`Censors::strict`]
pub const DEFAULT_CREDENTIAL_PARAMETERS: &[&str] = &[
    "api_key",
    "apiKey",
    "key",
    "api_token",
    "apiToken",
    "token",
    "access_token",
    "client_id",
    "client_secret",
    "password",
    "secret",
    "username",
];

/// Redaction rule set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Censors {
    censor_text: String,
    headers: Vec<CensorElement>,
    query_parameters: Vec<CensorElement>,
    body_elements: Vec<CensorElement>,
    path_elements: Vec<CensorElement>,
}

impl Default for Censors {
    fn default() -> Self {
        Self::new(DEFAULT_CENSOR_TEXT)
    }
}

impl Censors {
    /// Empty rule set using `censor_text` as the replacement
    pub fn new(censor_text: impl Into<String>) -> Self {
        Self {
            censor_text: censor_text.into(),
            headers: Vec::new(),
            query_parameters: Vec::new(),
            body_elements: Vec::new(),
            path_elements: Vec::new(),
        }
    }

    /// Censor nothing
    #[must_use]
    pub fn regular() -> Self {
        Self::default()
    }

    /// Censor common credentials (auth header, API keys, tokens, passwords)
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
            .censor_headers_by_keys(DEFAULT_CREDENTIAL_HEADERS.iter().copied(), false)
            .censor_body_elements_by_keys(DEFAULT_CREDENTIAL_PARAMETERS.iter().copied(), false)
            .censor_query_parameters_by_keys(DEFAULT_CREDENTIAL_PARAMETERS.iter().copied(), false)
    }

    /// Replacement text
    #[must_use]
    pub fn censor_text(&self) -> &str {
        &self.censor_text
    }

    /// Add header rules (applied to request and response headers)
    #[must_use]
    pub fn censor_headers(mut self, elements: impl IntoIterator<Item = CensorElement>) -> Self {
        self.headers.extend(elements);
        self
    }

    /// Add literal header rules
    #[must_use]
    pub fn censor_headers_by_keys<I, S>(self, keys: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.censor_headers(literals(keys, case_sensitive))
    }

    /// Add query parameter rules
    #[must_use]
    pub fn censor_query_parameters(
        mut self,
        elements: impl IntoIterator<Item = CensorElement>,
    ) -> Self {
        self.query_parameters.extend(elements);
        self
    }

    /// Add literal query parameter rules
    #[must_use]
    pub fn censor_query_parameters_by_keys<I, S>(self, keys: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.censor_query_parameters(literals(keys, case_sensitive))
    }

    /// Add JSON body rules
    #[must_use]
    pub fn censor_body_elements(mut self, elements: impl IntoIterator<Item = CensorElement>) -> Self {
        self.body_elements.extend(elements);
        self
    }

    /// Add literal JSON body rules
    #[must_use]
    pub fn censor_body_elements_by_keys<I, S>(self, keys: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.censor_body_elements(literals(keys, case_sensitive))
    }

    /// Add path rules
    #[must_use]
    pub fn censor_path_elements(mut self, elements: impl IntoIterator<Item = CensorElement>) -> Self {
        self.path_elements.extend(elements);
        self
    }

    /// Add path rules from regular expressions
    ///
    /// # Errors
    ///
    /// Returns error if any pattern fails to compile
    pub fn censor_path_elements_by_pattern<I, S>(self, patterns: I, case_sensitive: bool) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let elements = patterns
            .into_iter()
            .map(|pattern| CensorElement::regex(pattern, case_sensitive))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.censor_path_elements(elements))
    }

    /// Check every regex rule compiles
    ///
    /// # Errors
    ///
    /// Returns the first rule that does not compile
    pub fn validate(&self) -> Result<()> {
        self.headers
            .iter()
            .chain(&self.query_parameters)
            .chain(&self.body_elements)
            .chain(&self.path_elements)
            .try_for_each(CensorElement::validate)
    }

    /// Replace values of matching headers with the censor text
    #[must_use]
    pub fn apply_header_censors(&self, headers: &Headers) -> Headers {
        if self.headers.is_empty() || headers.is_empty() {
            return headers.clone();
        }

        headers
            .iter()
            .map(|(key, values)| {
                if any_matches(key, &self.headers) {
                    (key.clone(), vec![self.censor_text.clone()])
                } else {
                    (key.clone(), values.clone())
                }
            })
            .collect()
    }

    /// Redact path segments and query values
    #[must_use]
    pub fn apply_url_censors(&self, url: &str) -> String {
        url::censor_url(
            url,
            &self.censor_text,
            &self.query_parameters,
            &self.path_elements,
        )
    }

    /// Redact JSON body fields
    ///
    /// Bodies that are not a JSON object or array are returned unchanged.
    #[must_use]
    pub fn apply_body_censors(&self, body: &str) -> String {
        if body.is_empty() || self.body_elements.is_empty() {
            return body.to_string();
        }

        body::censor_json(body, &self.censor_text, &self.body_elements)
            .unwrap_or_else(|| body.to_string())
    }

    /// Censored copy of a request
    #[must_use]
    pub fn censor_request(&self, request: &Request) -> Request {
        Request {
            method: request.method.clone(),
            uri: self.apply_url_censors(&request.uri),
            headers: self.apply_header_censors(&request.headers),
            body: self.apply_body_censors(&request.body),
        }
    }

    /// Censored copy of a response
    #[must_use]
    pub fn censor_response(&self, response: &Response) -> Response {
        Response {
            status: response.status.clone(),
            uri: self.apply_url_censors(&response.uri),
            headers: self.apply_header_censors(&response.headers),
            body: response.body.as_deref().map(|b| self.apply_body_censors(b)),
            errors: response.errors.as_deref().map(|e| self.apply_body_censors(e)),
        }
    }
}

fn literals<I, S>(keys: I, case_sensitive: bool) -> Vec<CensorElement>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    keys.into_iter()
        .map(|key| CensorElement::new(key, case_sensitive))
        .collect()
}
