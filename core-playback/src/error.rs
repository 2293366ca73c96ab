//! # Playback Error Types

use core_library::LibraryError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// A newer play request superseded this one before the device was ready.
    ///
    /// Expected during rapid song switching; the engine never surfaces it.
    #[error("Playback request interrupted: {0}")]
    Interrupted(String),

    /// Playback operation failed (decoding, unsupported payload, ...).
    #[error("Playback operation failed: {0}")]
    PlaybackFailed(String),

    /// Audio payload is unavailable (e.g. the locator is no longer live).
    #[error("Audio source unavailable: {0}")]
    SourceUnavailable(String),

    /// Platform audio device encountered an error.
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Attempted operation that needs a current song.
    #[error("No song loaded")]
    NoSongLoaded,

    /// Queue index out of range.
    #[error("Queue index {index} out of range (queue length {len})")]
    QueueIndexOutOfRange { index: usize, len: usize },

    /// Library error from core-library.
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
}

impl PlaybackError {
    /// Returns `true` for supersession, which callers must swallow.
    pub fn is_interruption(&self) -> bool {
        matches!(self, PlaybackError::Interrupted(_))
    }

    /// Returns `true` if retrying the same request might succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlaybackError::SourceUnavailable(_) | PlaybackError::Interrupted(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
