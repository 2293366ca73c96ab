//! # Core Configuration Module
//!
//! Provides configuration management for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding every setting the core needs at startup. `build()` fails
//! fast with an actionable message when a value is out of range, so the
//! service never starts half-configured.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{CoreConfig, PlaybackSettings};
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/muse.db")
//!     .event_buffer_size(256)
//!     .playback(PlaybackSettings::default().with_prefer_unplayed(true))
//!     .build()
//!     .expect("valid config");
//!
//! assert!(config.playback.prefer_unplayed);
//! ```
//!
//! Omitting `database_path` selects an in-memory SQLite database, which is
//! what tests and throwaway sessions use.
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Zero-capacity event channels are rejected
//! let config = CoreConfig::builder()
//!     .event_buffer_size(0)
//!     .build()
//!     .expect("Should fail - empty event buffer");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::LoggingConfig;
use std::path::PathBuf;

/// Default output volume for a fresh session.
pub const DEFAULT_VOLUME: f64 = 0.8;

/// Position (seconds) past which `prev()` restarts the current song.
pub const DEFAULT_RESTART_THRESHOLD_SECS: f64 = 3.0;

/// Core configuration for the player.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Path to the SQLite database file. `None` keeps the library in memory.
    pub database_path: Option<PathBuf>,

    /// Capacity of the broadcast channel behind the event bus.
    pub event_buffer_size: usize,

    /// Initial playback session settings.
    pub playback: PlaybackSettings,

    /// Logging setup applied by the host via `init_logging`.
    pub logging: LoggingConfig,
}

/// Settings applied to the playback session at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    /// Volume in `[0.0, 1.0]`.
    pub initial_volume: f64,

    /// Shuffle draws from unplayed songs before repeating any.
    pub prefer_unplayed: bool,

    /// `prev()` restarts the current song when the position exceeds this.
    pub restart_threshold_secs: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            initial_volume: DEFAULT_VOLUME,
            prefer_unplayed: false,
            restart_threshold_secs: DEFAULT_RESTART_THRESHOLD_SECS,
        }
    }
}

impl PlaybackSettings {
    /// Sets the initial volume
    pub fn with_initial_volume(mut self, volume: f64) -> Self {
        self.initial_volume = volume;
        self
    }

    /// Enables or disables prefer-unplayed shuffle
    pub fn with_prefer_unplayed(mut self, enabled: bool) -> Self {
        self.prefer_unplayed = enabled;
        self
    }

    /// Sets the `prev()` restart threshold in seconds
    pub fn with_restart_threshold_secs(mut self, secs: f64) -> Self {
        self.restart_threshold_secs = secs;
        self
    }

    /// Validates the settings
    pub fn validate(&self) -> Result<()> {
        if !self.initial_volume.is_finite() || !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::Config(format!(
                "Initial volume must be between 0.0 and 1.0, got {}",
                self.initial_volume
            )));
        }

        if !self.restart_threshold_secs.is_finite() || self.restart_threshold_secs < 0.0 {
            return Err(Error::Config(format!(
                "Restart threshold must be a non-negative number of seconds, got {}",
                self.restart_threshold_secs
            )));
        }

        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path, when given, is not empty
    /// - Event buffer size is greater than zero
    /// - Playback settings are in range
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config(
                    "Database path cannot be empty. Omit it to use an in-memory database."
                        .to_string(),
                ));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        self.playback.validate()
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    event_buffer_size: Option<usize>,
    playback: Option<PlaybackSettings>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/path/to/muse.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the initial playback settings.
    pub fn playback(mut self, settings: PlaybackSettings) -> Self {
        self.playback = Some(settings);
        self
    }

    /// Sets the logging configuration.
    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when any value is out of range.
    pub fn build(self) -> Result<CoreConfig> {
        let config = CoreConfig {
            database_path: self.database_path,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            playback: self.playback.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}
