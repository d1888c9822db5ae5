//! Entry point: holds a cassette, a mode and settings, and hands out one
//! controller per request

use std::sync::Arc;

use tracing::debug;

use crate::cassette::Cassette;
use crate::config::{Mode, Settings};
use crate::controller::InteractionController;
use crate::network::{HttpTransport, Transport};
use crate::{Result, VcrError};

/// Record/replay recorder
///
/// Starts in [`Mode::Bypass`] with no cassette inserted.
#[derive(Debug, Default)]
pub struct Vcr {
    cassette: Option<Cassette>,
    mode: Mode,
    settings: Arc<Settings>,
}

impl Vcr {
    /// Create a recorder with the given settings
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            cassette: None,
            mode: Mode::Bypass,
            settings: Arc::new(settings),
        }
    }

    /// Insert a cassette, replacing any current one
    pub fn insert(&mut self, cassette: Cassette) {
        debug!("Inserted cassette {}", cassette.name());
        self.cassette = Some(cassette);
    }

    /// Remove the current cassette
    pub fn eject(&mut self) -> Option<Cassette> {
        self.cassette.take()
    }

    /// Erase the current cassette's file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be removed
    pub fn erase(&self) -> Result<()> {
        match &self.cassette {
            Some(cassette) => cassette.erase(),
            None => Ok(()),
        }
    }

    /// Name of the current cassette
    #[must_use]
    pub fn cassette_name(&self) -> Option<&str> {
        self.cassette.as_ref().map(Cassette::name)
    }

    /// Current cassette
    #[must_use]
    pub fn cassette(&self) -> Option<&Cassette> {
        self.cassette.as_ref()
    }

    /// Record every request
    pub fn record(&mut self) {
        self.mode = Mode::Record;
    }

    /// Serve every request from the cassette
    pub fn replay(&mut self) {
        self.mode = Mode::Replay;
    }

    /// Replay when possible, record otherwise
    pub fn record_if_needed(&mut self) {
        self.mode = Mode::Auto;
    }

    /// Pass requests straight through
    pub fn pause(&mut self) {
        self.mode = Mode::Bypass;
    }

    /// Configured mode with the environment override applied
    #[must_use]
    pub fn mode(&self) -> Mode {
        Mode::from_env(self.mode)
    }

    /// Settings handed to new connections
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace settings for connections created from now on
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = Arc::new(settings);
    }

    /// Controller for `url` over the default HTTP transport
    ///
    /// # Errors
    ///
    /// Returns error if no cassette is inserted, the settings conflict with the
    /// mode, or the transport cannot start
    pub fn connection(&self, url: &str) -> Result<InteractionController<HttpTransport>> {
        self.connection_with(url, HttpTransport::new()?)
    }

    /// Controller for `url` over a caller-supplied transport
    ///
    /// # Errors
    ///
    /// Returns error if no cassette is inserted or the settings conflict with
    /// the mode
    pub fn connection_with<T: Transport>(
        &self,
        url: &str,
        transport: T,
    ) -> Result<InteractionController<T>> {
        let cassette = self.cassette.clone().ok_or_else(|| {
            VcrError::Configuration("No cassette is loaded".to_string())
        })?;
        InteractionController::new(
            url,
            transport,
            cassette,
            self.mode,
            Arc::clone(&self.settings),
        )
    }
}
