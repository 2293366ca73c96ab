//! # Playback Session State
//!
//! The single owned state object behind the engine. The engine mutates it
//! under a lock; readers get cloned snapshots.

use core_library::Song;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    /// No current song
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Repeat mode, cycled off → all → one → off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// The mode after this one in the cycle.
    pub fn cycled(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "all",
            RepeatMode::One => "one",
        }
    }
}

/// Who asked to advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvanceTrigger {
    /// The user pressed "next"
    Manual,
    /// The transport reached the end of the song
    Auto,
}

/// Snapshot of the playback session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub current: Option<Song>,
    pub status: PlaybackStatus,
    /// Seconds, clamped to `[0, duration]`
    pub position: f64,
    /// `[0.0, 1.0]`
    pub volume: f64,
    /// Active playback list, separate from the library
    pub queue: Vec<Song>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    /// Shuffle draws from songs not yet played before repeating any
    pub prefer_unplayed: bool,
    /// Song ids played since the last pool reset
    pub played: HashSet<String>,
    /// Ids of previously-current songs, oldest first
    pub history: Vec<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current: None,
            status: PlaybackStatus::Idle,
            position: 0.0,
            volume: 1.0,
            queue: Vec::new(),
            shuffle: false,
            repeat: RepeatMode::Off,
            prefer_unplayed: false,
            played: HashSet::new(),
            history: Vec::new(),
        }
    }
}

impl SessionState {
    pub fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|song| song.id.as_str())
    }

    /// Index of the current song in the queue.
    pub fn current_index(&self) -> Option<usize> {
        let id = self.current_id()?;
        self.queue.iter().position(|song| song.id == id)
    }

    /// Duration of the current song, 0 when idle or unknown.
    pub fn duration(&self) -> f64 {
        self.current.as_ref().map(|song| song.duration).unwrap_or(0.0)
    }

    /// Clamp `position` into `[0, duration]`. Unknown durations only clamp below.
    pub fn clamp_position(&self, position: f64) -> f64 {
        if !position.is_finite() {
            return 0.0;
        }

        let position = position.max(0.0);
        let duration = self.duration();
        if duration > 0.0 {
            position.min(duration)
        } else {
            position
        }
    }
}

/// Seconds to whole milliseconds for events.
pub(crate) fn to_millis(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::song;

    #[test]
    fn repeat_cycle() {
        assert_eq!(RepeatMode::Off.cycled(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycled(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycled(), RepeatMode::Off);
    }

    #[test]
    fn clamp_position_uses_duration() {
        let mut state = SessionState::default();
        assert_eq!(state.clamp_position(12.0), 12.0);
        assert_eq!(state.clamp_position(-3.0), 0.0);

        state.current = Some(song("a", 10.0));
        assert_eq!(state.clamp_position(12.0), 10.0);
        assert_eq!(state.clamp_position(f64::NAN), 0.0);
    }

    #[test]
    fn current_index_tracks_queue() {
        let mut state = SessionState::default();
        state.queue = vec![song("a", 1.0), song("b", 1.0)];
        assert_eq!(state.current_index(), None);

        state.current = Some(song("b", 1.0));
        assert_eq!(state.current_index(), Some(1));
    }

    #[test]
    fn millis_conversion() {
        assert_eq!(to_millis(1.5), 1500);
        assert_eq!(to_millis(-1.0), 0);
        assert_eq!(to_millis(f64::INFINITY), 0);
    }
}
