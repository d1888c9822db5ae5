//! httpvcr - record and replay HTTP interactions for tests
//!
//! Requests go through an [`InteractionController`] handed out by a [`Vcr`].
//! Depending on the [`Mode`], the controller performs the request and stores
//! it in a JSON [`Cassette`], serves it from the cassette, or both.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod cassette;
pub mod censor;
pub mod config;
pub mod controller;
pub mod error;
pub mod expiration;
pub mod interaction;
pub mod matching;
pub mod network;
pub mod vcr;

pub use cassette::Cassette;
pub use censor::{CensorElement, Censors};
pub use config::{Mode, ReplayDelay, Settings, VcrConfig};
pub use controller::InteractionController;
pub use error::{Result, VcrError};
pub use expiration::{ExpirationAction, TimeFrame};
pub use interaction::{served_from_recording, Interaction, Request, Response, Status};
pub use matching::{MatchRule, MatchRules};
pub use network::{HttpTransport, StreamingMode, Transport, TransportResponse};
pub use vcr::Vcr;
