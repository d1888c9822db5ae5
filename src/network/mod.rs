//! Network layer for httpvcr
//!
//! The controller never talks to the network directly; it hands the buffered
//! request to a [`Transport`] and gets a complete response back.

mod client;

pub use client::HttpTransport;

use std::time::Duration;

use crate::interaction::{Headers, Request, Response, Status};
use crate::Result;

/// Maximum redirect hops followed by [`HttpTransport`]
pub const MAX_REDIRECTS: usize = 10;

/// How the request body is framed on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamingMode {
    /// Whole body sent with a computed `Content-Length`
    #[default]
    Buffered,
    /// Body length declared up front
    FixedLength(u64),
    /// Chunked transfer encoding with the given chunk size hint
    Chunked(usize),
}

/// Complete response returned by a [`Transport`]
///
/// HTTP error statuses (4xx/5xx) are still responses: the payload lands in
/// `errors` and `body` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    /// Status line
    pub status: Status,
    /// URI the response came from, after redirects
    pub uri: String,
    /// Response headers
    pub headers: Headers,
    /// Body of a successful response
    pub body: Option<String>,
    /// Body of an error response
    pub errors: Option<String>,
}

impl From<TransportResponse> for Response {
    fn from(response: TransportResponse) -> Self {
        Self {
            status: response.status,
            uri: response.uri,
            headers: response.headers,
            body: response.body,
            errors: response.errors,
        }
    }
}

/// Blocking executor of a fully buffered request
pub trait Transport {
    /// Send `request` and read the whole response
    ///
    /// # Errors
    ///
    /// Returns [`crate::VcrError::Transport`] when no HTTP status could be
    /// obtained
    fn dispatch(&mut self, request: &Request) -> Result<TransportResponse>;

    /// Set the connect timeout; `None` waits indefinitely
    fn set_connect_timeout(&mut self, timeout: Option<Duration>);

    /// Connect timeout
    fn connect_timeout(&self) -> Option<Duration>;

    /// Set the read timeout; `None` waits indefinitely
    fn set_read_timeout(&mut self, timeout: Option<Duration>);

    /// Read timeout
    fn read_timeout(&self) -> Option<Duration>;

    /// Whether redirects are followed
    fn set_follow_redirects(&mut self, follow: bool);

    /// Whether redirects are followed
    fn follow_redirects(&self) -> bool;

    /// Set the body framing
    fn set_streaming_mode(&mut self, mode: StreamingMode);

    /// Whether requests go through a proxy
    fn using_proxy(&self) -> bool {
        false
    }

    /// Release any open connection
    fn disconnect(&mut self) {}
}
