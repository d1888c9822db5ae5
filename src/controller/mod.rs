//! Per-exchange interception state machine
//!
//! An [`InteractionController`] buffers one outgoing request. The first
//! read-style call resolves it into an [`Interaction`], by replaying a
//! recording, by performing and recording a real request, or (in bypass mode)
//! by simply performing it. Every later read is answered from that
//! interaction, and the request can no longer be changed.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cassette::Cassette;
use crate::config::{Mode, Settings};
use crate::expiration::{check_compatible, ExpirationAction};
use crate::interaction::{self, Headers, Interaction, Request};
use crate::network::{StreamingMode, Transport};
use crate::{Result, VcrError};

#[derive(Debug)]
enum State {
    /// Request is still being configured
    Building,
    /// Interaction resolved; request frozen
    Cached(Box<Interaction>),
    /// Disconnected; the next read resolves again
    Closed,
}

/// One logical HTTP exchange routed through a cassette
#[derive(Debug)]
pub struct InteractionController<T: Transport> {
    transport: T,
    cassette: Cassette,
    mode: Mode,
    settings: Arc<Settings>,
    request: Request,
    state: State,
}

impl<T: Transport> InteractionController<T> {
    /// Create a controller for a `GET` to `url`
    ///
    /// The mode is resolved against `HTTPVCR_MODE` once, here.
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::Configuration`] if the expiration action cannot be
    /// honored in the resolved mode
    pub fn new(
        url: impl Into<String>,
        transport: T,
        cassette: Cassette,
        mode: Mode,
        settings: Arc<Settings>,
    ) -> Result<Self> {
        let mode = Mode::from_env(mode);
        Self::with_resolved_mode(url, transport, cassette, mode, settings)
    }

    /// Create a controller with no environment override
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::Configuration`] if the expiration action cannot be
    /// honored in `mode`
    pub fn with_resolved_mode(
        url: impl Into<String>,
        transport: T,
        cassette: Cassette,
        mode: Mode,
        settings: Arc<Settings>,
    ) -> Result<Self> {
        check_compatible(settings.when_expired, mode)?;
        Ok(Self {
            transport,
            cassette,
            mode,
            settings,
            request: Request::new("GET", url),
            state: State::Building,
        })
    }

    /// Mode in effect for this exchange
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether an interaction has been resolved
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, State::Cached(_))
    }

    /// Resolved interaction, if any
    #[must_use]
    pub fn interaction(&self) -> Option<&Interaction> {
        match &self.state {
            State::Cached(interaction) => Some(&**interaction),
            State::Building | State::Closed => None,
        }
    }

    /// Whether the resolved response was served from a recording
    ///
    /// `false` until something is resolved.
    #[must_use]
    pub fn served_from_recording(&self) -> bool {
        self.interaction()
            .is_some_and(|i| interaction::served_from_recording(&i.response.headers))
    }

    // -- request configuration --

    /// Set the request method
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidState`] once the interaction is resolved
    pub fn set_request_method(&mut self, method: &str) -> Result<()> {
        self.ensure_building("set request method")?;
        if method.is_empty() {
            return Err(VcrError::InvalidState(
                "Request method cannot be empty".to_string(),
            ));
        }
        self.request.method = method.to_ascii_uppercase();
        Ok(())
    }

    /// Set a request header, replacing any existing values
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidState`] once the interaction is resolved
    pub fn set_request_property(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_building("set request property")?;
        self.request
            .headers
            .insert(key.to_string(), vec![value.to_string()]);
        Ok(())
    }

    /// Add a value to a request header
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidState`] once the interaction is resolved
    pub fn add_request_property(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_building("add request property")?;
        self.request
            .headers
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    /// Set the transport connect timeout
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidState`] once the interaction is resolved
    pub fn set_connect_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.ensure_building("set connect timeout")?;
        self.transport.set_connect_timeout(timeout);
        Ok(())
    }

    /// Set the transport read timeout
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidState`] once the interaction is resolved
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.ensure_building("set read timeout")?;
        self.transport.set_read_timeout(timeout);
        Ok(())
    }

    /// Whether the transport follows redirects
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidState`] once the interaction is resolved
    pub fn set_instance_follow_redirects(&mut self, follow: bool) -> Result<()> {
        self.ensure_building("set redirect policy")?;
        self.transport.set_follow_redirects(follow);
        Ok(())
    }

    /// Declare the body length up front
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidState`] once the interaction is resolved
    pub fn set_fixed_length_streaming_mode(&mut self, length: u64) -> Result<()> {
        self.ensure_building("set streaming mode")?;
        self.transport
            .set_streaming_mode(StreamingMode::FixedLength(length));
        Ok(())
    }

    /// Send the body with chunked transfer encoding
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidState`] once the interaction is resolved
    pub fn set_chunked_streaming_mode(&mut self, chunk_size: usize) -> Result<()> {
        self.ensure_building("set streaming mode")?;
        self.transport
            .set_streaming_mode(StreamingMode::Chunked(chunk_size));
        Ok(())
    }

    /// Append bytes to the buffered request body
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidState`] once the interaction is resolved
    pub fn write_body(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_building("write body")?;
        self.request.body.push_str(&String::from_utf8_lossy(bytes));
        Ok(())
    }

    /// Replace the buffered request body
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidState`] once the interaction is resolved
    pub fn set_body(&mut self, body: impl Into<String>) -> Result<()> {
        self.ensure_building("set body")?;
        self.request.body = body.into();
        Ok(())
    }

    // -- request views (never resolve) --

    /// Request URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.request.uri
    }

    /// Request method
    #[must_use]
    pub fn request_method(&self) -> &str {
        &self.request.method
    }

    /// Buffered request headers
    #[must_use]
    pub fn request_properties(&self) -> &Headers {
        &self.request.headers
    }

    // -- transport-only views --

    /// Connect timeout configured on the transport
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.transport.connect_timeout()
    }

    /// Read timeout configured on the transport
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        self.transport.read_timeout()
    }

    /// Whether the transport follows redirects
    #[must_use]
    pub fn instance_follow_redirects(&self) -> bool {
        self.transport.follow_redirects()
    }

    /// Whether the transport uses a proxy
    #[must_use]
    pub fn using_proxy(&self) -> bool {
        self.transport.using_proxy()
    }

    // -- response views (resolve on first use) --

    /// Resolve the interaction now
    ///
    /// # Errors
    ///
    /// Returns the failure of the replay or record procedure
    pub fn connect(&mut self) -> Result<()> {
        self.resolve().map(|_| ())
    }

    /// Release the transport connection and drop the resolved interaction
    pub fn disconnect(&mut self) {
        self.transport.disconnect();
        self.state = State::Closed;
    }

    /// Status code
    ///
    /// # Errors
    ///
    /// Returns the failure of resolving the interaction
    pub fn response_code(&mut self) -> Result<u16> {
        Ok(self.resolve()?.response.status.code)
    }

    /// Status reason phrase
    ///
    /// # Errors
    ///
    /// Returns the failure of resolving the interaction
    pub fn response_message(&mut self) -> Result<String> {
        Ok(self.resolve()?.response.status.message.clone())
    }

    /// All response headers
    ///
    /// # Errors
    ///
    /// Returns the failure of resolving the interaction
    pub fn header_fields(&mut self) -> Result<Headers> {
        Ok(self.resolve()?.response.headers.clone())
    }

    /// Last value of a response header, matched case-insensitively
    ///
    /// # Errors
    ///
    /// Returns the failure of resolving the interaction
    pub fn header_field(&mut self, name: &str) -> Result<Option<String>> {
        let headers = &self.resolve()?.response.headers;
        Ok(headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.last().cloned()))
    }

    /// Name of the `n`th response header
    ///
    /// # Errors
    ///
    /// Returns the failure of resolving the interaction
    pub fn header_field_key(&mut self, n: usize) -> Result<Option<String>> {
        Ok(self.resolve()?.response.headers.keys().nth(n).cloned())
    }

    /// Last value of the `n`th response header
    ///
    /// # Errors
    ///
    /// Returns the failure of resolving the interaction
    pub fn header_field_at(&mut self, n: usize) -> Result<Option<String>> {
        Ok(self
            .resolve()?
            .response
            .headers
            .values()
            .nth(n)
            .and_then(|values| values.last().cloned()))
    }

    /// `Content-Type` header
    ///
    /// # Errors
    ///
    /// Returns the failure of resolving the interaction
    pub fn content_type(&mut self) -> Result<Option<String>> {
        self.header_field("Content-Type")
    }

    /// `Content-Encoding` header
    ///
    /// # Errors
    ///
    /// Returns the failure of resolving the interaction
    pub fn content_encoding(&mut self) -> Result<Option<String>> {
        self.header_field("Content-Encoding")
    }

    /// `Content-Length` header, if present and numeric
    ///
    /// # Errors
    ///
    /// Returns the failure of resolving the interaction
    pub fn content_length(&mut self) -> Result<Option<u64>> {
        Ok(self
            .header_field("Content-Length")?
            .and_then(|value| value.trim().parse().ok()))
    }

    /// Body of a successful response
    ///
    /// # Errors
    ///
    /// Returns the failure of resolving the interaction
    pub fn body(&mut self) -> Result<Option<String>> {
        Ok(self.resolve()?.response.body.clone())
    }

    /// Body of an error response
    ///
    /// # Errors
    ///
    /// Returns the failure of resolving the interaction
    pub fn error_body(&mut self) -> Result<Option<String>> {
        Ok(self.resolve()?.response.errors.clone())
    }

    // -- resolution --

    fn ensure_building(&self, action: &str) -> Result<()> {
        match self.state {
            State::Cached(_) => Err(VcrError::InvalidState(format!(
                "Cannot {action} after the response has been read"
            ))),
            State::Building | State::Closed => Ok(()),
        }
    }

    fn resolve(&mut self) -> Result<&Interaction> {
        if !self.is_resolved() {
            let interaction = self.build()?;
            self.state = State::Cached(Box::new(interaction));
        }
        match &self.state {
            State::Cached(interaction) => Ok(&**interaction),
            State::Building | State::Closed => Err(VcrError::InvalidState(
                "Interaction was not resolved".to_string(),
            )),
        }
    }

    fn build(&mut self) -> Result<Interaction> {
        match self.mode {
            Mode::Bypass => self.pass_through(),
            Mode::Record => self.record(true),
            Mode::Replay => self.replay(),
            Mode::Auto => match self.replay() {
                Err(e) if e.is_no_match() => {
                    debug!("No recording for {}, recording", self.request.uri);
                    self.record(true)
                }
                other => other,
            },
        }
    }

    fn dispatch(&mut self) -> Result<Interaction> {
        let started = Instant::now();
        let response = self.transport.dispatch(&self.request)?;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(Interaction::new(
            self.request.clone(),
            response.into(),
            duration_ms,
        ))
    }

    fn pass_through(&mut self) -> Result<Interaction> {
        debug!("Bypassing cassette for {} {}", self.request.method, self.request.uri);
        self.dispatch()
    }

    fn record(&mut self, bypass_search: bool) -> Result<Interaction> {
        let live = self.dispatch()?;

        let censors = &self.settings.censors;
        let interaction = Interaction {
            request: censors.censor_request(&live.request),
            response: censors.censor_response(&live.response),
            ..live
        };

        self.cassette.upsert(
            interaction.clone(),
            &self.settings.match_rules,
            bypass_search,
        )?;
        info!(
            "Recorded {} {} ({} ms) into cassette {}",
            interaction.request.method,
            interaction.request.uri,
            interaction.duration_ms,
            self.cassette.name()
        );
        Ok(interaction)
    }

    fn replay(&mut self) -> Result<Interaction> {
        let received = self.settings.censors.censor_request(&self.request);

        let found = self
            .cassette
            .read()?
            .into_iter()
            .find(|stored| {
                self.settings
                    .match_rules
                    .requests_match(&received, &stored.request)
            })
            .ok_or_else(|| VcrError::NoMatch {
                method: received.method.clone(),
                uri: received.uri.clone(),
            })?;

        if self.settings.time_frame.has_lapsed(found.recorded_at) {
            match self.settings.when_expired {
                ExpirationAction::Warn => {
                    warn!(
                        "Recording for {} {} has expired, serving it anyway",
                        found.request.method, found.request.uri
                    );
                }
                ExpirationAction::ThrowException => {
                    return Err(VcrError::ExpiredRecording {
                        uri: found.request.uri,
                        recorded_at: found.recorded_at,
                    });
                }
                ExpirationAction::RecordAgain => {
                    info!(
                        "Recording for {} {} has expired, recording again",
                        found.request.method, found.request.uri
                    );
                    return self.record(false);
                }
            }
        }

        if let Some(delay) = self.settings.delay.for_recorded(found.duration_ms) {
            debug!("Delaying replay by {:?}", delay);
            thread::sleep(delay);
        }

        let mut interaction = found;
        interaction.response.add_replay_headers();
        debug!(
            "Replaying {} {} from cassette {}",
            interaction.request.method,
            interaction.request.uri,
            self.cassette.name()
        );
        Ok(interaction)
    }
}
