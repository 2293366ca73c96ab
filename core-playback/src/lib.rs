//! # Playback Module
//!
//! Playback state machine and queue navigation over a hardware-backed
//! transport.
//!
//! ## Overview
//!
//! This module handles:
//! - The [`AudioTransport`] contract and its callbacks
//! - Session state (current song, status, position, volume, queue, modes)
//! - Next/previous selection, including repeat and prefer-unplayed shuffle
//! - The [`PlaybackEngine`], with supersession of stale play requests
//! - A task that serializes transport callbacks onto the engine

pub mod engine;
pub mod error;
pub mod navigation;
pub mod pump;
pub mod session;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use engine::{DurationCorrection, PlaybackEngine};
pub use error::{PlaybackError, Result};
pub use navigation::{NextStep, PrevStep};
pub use pump::{spawn_transport_pump, TransportEventHandler};
pub use session::{AdvanceTrigger, PlaybackStatus, RepeatMode, SessionState};
pub use traits::{AudioTransport, TransportCallback, TransportEvent};
