//! Recorded request/response pairs and the cassette file layout

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Header name injected into every response served from a cassette
pub const VIA_RECORDING_HEADER: &str = "X-Via-HttpVcr-Recording";

/// Header multimap: name to every value sent under that name
pub type Headers = BTreeMap<String, Vec<String>>;

/// Outgoing HTTP request as stored in a cassette
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// HTTP method (e.g., "GET", "POST")
    pub method: String,
    /// Full request URI
    pub uri: String,
    /// Request headers
    #[serde(default)]
    pub headers: Headers,
    /// Request body, empty when none was sent
    #[serde(default)]
    pub body: String,
}

impl Request {
    /// Create a request with no headers and an empty body
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers: Headers::new(),
            body: String::new(),
        }
    }

    /// Serialized form used by the strictest match rule
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be serialized
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// HTTP status line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Status code
    pub code: u16,
    /// Reason phrase
    #[serde(default)]
    pub message: String,
}

impl Status {
    /// Create a status line
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Whether the server reported an error (4xx/5xx)
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.code >= 400
    }
}

/// HTTP response as stored in a cassette
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Status line
    pub status: Status,
    /// URI the response was served from
    pub uri: String,
    /// Response headers
    #[serde(default)]
    pub headers: Headers,
    /// Body of a successful response
    #[serde(default)]
    pub body: Option<String>,
    /// Body of an error response
    #[serde(default)]
    pub errors: Option<String>,
}

impl Response {
    /// Mark this response as served from a recording
    pub fn add_replay_headers(&mut self) {
        self.headers
            .insert(VIA_RECORDING_HEADER.to_string(), vec!["true".to_string()]);
    }
}

/// One recorded exchange with timing metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Epoch seconds when the exchange was recorded
    pub recorded_at: i64,
    /// Time to first status read, in milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// Recorded request
    pub request: Request,
    /// Recorded response
    pub response: Response,
}

impl Interaction {
    /// Create an interaction stamped with the current time
    #[must_use]
    pub fn new(request: Request, response: Response, duration_ms: u64) -> Self {
        Self {
            recorded_at: Utc::now().timestamp(),
            duration_ms,
            request,
            response,
        }
    }
}

/// Whether a set of response headers carries the replay marker
#[must_use]
pub fn served_from_recording(headers: &Headers) -> bool {
    headers.contains_key(VIA_RECORDING_HEADER)
}
