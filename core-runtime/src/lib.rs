//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the player core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system (subscribe/notify for session and library changes)
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions and the event broadcasting
//! mechanism used by the library, playback and lyrics crates.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
