//! Default HTTP/1 transport over hyper

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{CONTENT_LENGTH, LOCATION, TRANSFER_ENCODING};
use hyper::{Method, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};
use url::Url;

use super::{StreamingMode, Transport, TransportResponse, MAX_REDIRECTS};
use crate::interaction::{Headers, Request, Status};
use crate::{Result, VcrError};

type HyperClient = Client<HttpConnector, Full<Bytes>>;

/// Blocking `http://` transport
///
/// Owns a private current-thread tokio runtime and drives hyper's legacy
/// client on it for each dispatch.
pub struct HttpTransport {
    runtime: Runtime,
    client: Option<HyperClient>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    follow_redirects: bool,
    streaming_mode: StreamingMode,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("follow_redirects", &self.follow_redirects)
            .field("streaming_mode", &self.streaming_mode)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a new transport
    ///
    /// # Errors
    ///
    /// Returns error if the runtime cannot be started
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| VcrError::Transport(format!("Failed to start runtime: {e}")))?;

        Ok(Self {
            runtime,
            client: None,
            connect_timeout: None,
            read_timeout: None,
            follow_redirects: true,
            streaming_mode: StreamingMode::Buffered,
        })
    }

    fn client(&mut self) -> HyperClient {
        if let Some(client) = &self.client {
            return client.clone();
        }

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(self.connect_timeout);
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build(connector);

        self.client = Some(client.clone());
        client
    }

    async fn send(&self, client: &HyperClient, request: &Request) -> Result<TransportResponse> {
        let mut method = request
            .method
            .to_ascii_uppercase()
            .parse::<Method>()
            .map_err(|e| {
                VcrError::Transport(format!("Invalid HTTP method '{}': {e}", request.method))
            })?;
        let mut uri = parse_http_uri(&request.uri)?;
        let mut body = Bytes::from(request.body.clone());

        for _ in 0..=MAX_REDIRECTS {
            debug!("Sending {} {}", method, uri);

            let http_request = self.build_request(&method, &uri, &request.headers, body.clone())?;
            let response = self.within_read_timeout(client.request(http_request)).await?;
            let response = response.map_err(|e| {
                warn!("Request failed: {e}");
                VcrError::Transport(format!("Request failed: {e}"))
            })?;

            let status = response.status();
            if self.follow_redirects && status.is_redirection() {
                if let Some(location) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                {
                    uri = resolve_location(&uri, location)?;
                    if rewrites_to_get(status, &method) {
                        method = Method::GET;
                        body = Bytes::new();
                    }
                    debug!("Following {} redirect to {}", status.as_u16(), uri);
                    continue;
                }
            }

            return self.read_response(uri, response).await;
        }

        Err(VcrError::Transport(format!(
            "Too many redirects (> {MAX_REDIRECTS}) for {}",
            request.uri
        )))
    }

    fn build_request(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &Headers,
        body: Bytes,
    ) -> Result<hyper::Request<Full<Bytes>>> {
        let mut builder = hyper::Request::builder().method(method.clone()).uri(uri.clone());

        for (name, values) in headers {
            if is_framing_header(name) {
                continue;
            }
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        match self.streaming_mode {
            StreamingMode::Buffered => {}
            StreamingMode::FixedLength(length) => {
                if length != body.len() as u64 {
                    return Err(VcrError::Transport(format!(
                        "Body is {} bytes but fixed length is {length}",
                        body.len()
                    )));
                }
                builder = builder.header(CONTENT_LENGTH, length);
            }
            StreamingMode::Chunked(_) => {
                builder = builder.header(TRANSFER_ENCODING, "chunked");
            }
        }

        builder
            .body(Full::new(body))
            .map_err(|e| VcrError::Transport(format!("Failed to build request: {e}")))
    }

    async fn read_response(
        &self,
        uri: Uri,
        response: hyper::Response<Incoming>,
    ) -> Result<TransportResponse> {
        let status = response.status();

        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            headers
                .entry(name.to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let collected = self.within_read_timeout(response.into_body().collect()).await?;
        let bytes = collected
            .map_err(|e| VcrError::Transport(format!("Failed to read response body: {e}")))?
            .to_bytes();
        let payload = String::from_utf8_lossy(&bytes).into_owned();

        let status = Status::new(status.as_u16(), status.canonical_reason().unwrap_or(""));
        let (body, errors) = if status.is_error() {
            (None, Some(payload))
        } else {
            (Some(payload), None)
        };

        Ok(TransportResponse {
            status,
            uri: uri.to_string(),
            headers,
            body,
            errors,
        })
    }

    async fn within_read_timeout<F: std::future::Future>(&self, future: F) -> Result<F::Output> {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| VcrError::Transport(format!("Read timed out after {limit:?}"))),
            None => Ok(future.await),
        }
    }
}

impl Transport for HttpTransport {
    fn dispatch(&mut self, request: &Request) -> Result<TransportResponse> {
        let client = self.client();
        let this = &*self;
        this.runtime.block_on(this.send(&client, request))
    }

    fn set_connect_timeout(&mut self, timeout: Option<Duration>) {
        self.connect_timeout = timeout;
        // connector is rebuilt with the new timeout
        self.client = None;
    }

    fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    fn set_follow_redirects(&mut self, follow: bool) {
        self.follow_redirects = follow;
    }

    fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    fn set_streaming_mode(&mut self, mode: StreamingMode) {
        self.streaming_mode = mode;
    }

    fn disconnect(&mut self) {
        self.client = None;
    }
}

fn parse_http_uri(raw: &str) -> Result<Uri> {
    let uri = raw
        .parse::<Uri>()
        .map_err(|e| VcrError::Transport(format!("Invalid URI '{raw}': {e}")))?;

    match uri.scheme_str() {
        Some("http") => Ok(uri),
        Some(other) => Err(VcrError::Transport(format!(
            "Unsupported scheme '{other}' in {raw}"
        ))),
        None => Err(VcrError::Transport(format!("URI has no scheme: {raw}"))),
    }
}

/// Resolve a `Location` header against the URI that produced it
fn resolve_location(base: &Uri, location: &str) -> Result<Uri> {
    let resolved = Url::parse(&base.to_string())
        .and_then(|base| base.join(location))
        .map_err(|e| {
            VcrError::Transport(format!("Invalid redirect location '{location}': {e}"))
        })?;
    parse_http_uri(resolved.as_str())
}

fn rewrites_to_get(status: StatusCode, method: &Method) -> bool {
    status == StatusCode::SEE_OTHER
        || (matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND)
            && *method == Method::POST)
}

fn is_framing_header(name: &str) -> bool {
    name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str())
        || name.eq_ignore_ascii_case(TRANSFER_ENCODING.as_str())
}
