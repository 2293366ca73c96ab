//! # Transport Abstraction
//!
//! The engine drives a hardware-backed audio transport through
//! [`AudioTransport`] and consumes the transport's callbacks as
//! [`TransportCallback`]s: a [`TransportEvent`] tagged with the locator the
//! transport was playing when it fired. Callbacks for any locator other than
//! the current song's are dropped, so a late `Ended` from a superseded song
//! cannot advance the queue twice.
//!
//! ## Threading Model
//!
//! Transports must be `Send + Sync`; the engine calls them from async tasks.
//! Transport callbacks are funnelled through a single channel
//! (see [`spawn_transport_pump`](crate::pump::spawn_transport_pump)) so that
//! they are serialized with user actions.
//!
//! ## Example
//!
//! ```rust,no_run
//! # use core_playback::{AudioTransport, Result};
//! # use core_library::PlayableLocator;
//! struct SilentTransport;
//!
//! #[async_trait::async_trait]
//! impl AudioTransport for SilentTransport {
//!     async fn play(&self, _locator: &PlayableLocator) -> Result<()> { Ok(()) }
//!     async fn pause(&self) -> Result<()> { Ok(()) }
//!     async fn resume(&self) -> Result<()> { Ok(()) }
//!     async fn stop(&self) -> Result<()> { Ok(()) }
//!     async fn seek(&self, _position_secs: f64) -> Result<()> { Ok(()) }
//!     async fn set_volume(&self, _volume: f64) -> Result<()> { Ok(()) }
//! }
//! ```

use crate::error::Result;
use async_trait::async_trait;
use core_library::PlayableLocator;
use serde::{Deserialize, Serialize};

/// Hardware-backed audio output.
///
/// `play` resolves once the device has started producing audio for the
/// locator. If a later `play` supersedes a pending one, the pending call should
/// fail with [`PlaybackError::Interrupted`](crate::PlaybackError::Interrupted).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioTransport: Send + Sync {
    /// Set the transport source and start playback from the beginning.
    async fn play(&self, locator: &PlayableLocator) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    /// Stop playback and release the source.
    async fn stop(&self) -> Result<()>;

    /// Move the playhead. `position_secs` is already clamped by the engine.
    async fn seek(&self, position_secs: f64) -> Result<()>;

    /// Output volume in `[0.0, 1.0]`.
    async fn set_volume(&self, volume: f64) -> Result<()>;
}

/// Callbacks reported by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransportEvent {
    /// Source metadata is available; `duration` is the real length in seconds.
    Loaded { duration: f64 },
    /// Periodic position update in seconds.
    TimeUpdate(f64),
    /// The source reached its end.
    Ended,
    /// The device reported a failure.
    Error(String),
}

impl TransportEvent {
    /// Tag this event with the locator it was raised for.
    pub fn for_source(self, source: &PlayableLocator) -> TransportCallback {
        TransportCallback::new(source.clone(), self)
    }
}

/// A transport callback and the locator that was loaded when it fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportCallback {
    /// The locator last passed to [`AudioTransport::play`].
    pub source: PlayableLocator,
    pub event: TransportEvent,
}

impl TransportCallback {
    pub fn new(source: PlayableLocator, event: TransportEvent) -> Self {
        Self { source, event }
    }
}
