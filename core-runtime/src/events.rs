//! Broadcast notifications for library, playback and lyric changes.
//!
//! Producers (library, playback engine, lyrics follower) hold a clone of the
//! [`EventBus`] and push [`CoreEvent`]s into a `tokio::sync::broadcast`
//! channel. Observers call [`EventBus::subscribe`] and only see events sent
//! after they subscribed.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(32);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Started {
//!     track_id: "song-1".to_string(),
//!     title: "Intro".to_string(),
//! }))
//! .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.label(), "playback.started");
//! # }
//! ```
//!
//! A slow receiver gets `RecvError::Lagged(n)` and continues from the oldest
//! retained event. Position updates are the bulk of traffic and each one
//! supersedes the last, so lagging is not fatal. `emit` fails only when nobody
//! is listening; publishers discard that with `.ok()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::trace;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Events retained per receiver before it starts lagging.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Library(LibraryEvent),
    Playback(PlaybackEvent),
    Lyrics(LyricsEvent),
}

impl CoreEvent {
    /// Stable dotted name, used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            CoreEvent::Library(e) => e.label(),
            CoreEvent::Playback(e) => e.label(),
            CoreEvent::Lyrics(e) => e.label(),
        }
    }
}

/// Library and playlist content changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    TrackAdded {
        track_id: String,
        title: String,
        artist: String,
    },
    /// `updated_fields` names the columns that changed, e.g. `liked`.
    TrackUpdated {
        track_id: String,
        updated_fields: Vec<String>,
    },
    TrackDeleted {
        track_id: String,
    },
    PlaylistCreated {
        playlist_id: String,
        name: String,
    },
    /// `change_type` is one of `renamed`, `song_added`, `song_removed`, `cover`.
    PlaylistUpdated {
        playlist_id: String,
        change_type: String,
    },
    PlaylistDeleted {
        playlist_id: String,
    },
    /// The database could not be opened; nothing will be persisted.
    StorageDegraded {
        reason: String,
    },
}

impl LibraryEvent {
    fn label(&self) -> &'static str {
        match self {
            LibraryEvent::TrackAdded { .. } => "library.track_added",
            LibraryEvent::TrackUpdated { .. } => "library.track_updated",
            LibraryEvent::TrackDeleted { .. } => "library.track_deleted",
            LibraryEvent::PlaylistCreated { .. } => "library.playlist_created",
            LibraryEvent::PlaylistUpdated { .. } => "library.playlist_updated",
            LibraryEvent::PlaylistDeleted { .. } => "library.playlist_deleted",
            LibraryEvent::StorageDegraded { .. } => "library.storage_degraded",
        }
    }
}

/// Playback session changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    Started {
        track_id: String,
        title: String,
    },
    Paused {
        track_id: String,
        position_ms: u64,
    },
    Resumed {
        track_id: String,
        position_ms: u64,
    },
    /// The session is idle.
    Stopped {
        track_id: Option<String>,
    },
    /// The queue ran out; the last song stays current, paused.
    Completed {
        track_id: String,
    },
    /// Repeat-one or a late `prev` sent the song back to 0.
    Restarted {
        track_id: String,
    },
    PositionChanged {
        track_id: String,
        position_ms: u64,
        duration_ms: u64,
    },
    QueueChanged {
        length: usize,
    },
    ModeChanged {
        shuffle: bool,
        /// `off`, `all` or `one`
        repeat: String,
        prefer_unplayed: bool,
    },
    VolumeChanged {
        volume_percent: u8,
    },
    /// The session went idle because playback failed.
    Error {
        track_id: Option<String>,
        message: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn label(&self) -> &'static str {
        match self {
            PlaybackEvent::Started { .. } => "playback.started",
            PlaybackEvent::Paused { .. } => "playback.paused",
            PlaybackEvent::Resumed { .. } => "playback.resumed",
            PlaybackEvent::Stopped { .. } => "playback.stopped",
            PlaybackEvent::Completed { .. } => "playback.completed",
            PlaybackEvent::Restarted { .. } => "playback.restarted",
            PlaybackEvent::PositionChanged { .. } => "playback.position",
            PlaybackEvent::QueueChanged { .. } => "playback.queue_changed",
            PlaybackEvent::ModeChanged { .. } => "playback.mode_changed",
            PlaybackEvent::VolumeChanged { .. } => "playback.volume_changed",
            PlaybackEvent::Error { .. } => "playback.error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LyricsEvent {
    /// `track_id` is `None` once lyrics are cleared.
    Loaded {
        track_id: Option<String>,
        line_count: usize,
        timed: bool,
    },
    /// `index` is `None` before the first timestamp.
    ActiveLineChanged {
        track_id: Option<String>,
        index: Option<usize>,
    },
}

impl LyricsEvent {
    fn label(&self) -> &'static str {
        match self {
            LyricsEvent::Loaded { .. } => "lyrics.loaded",
            LyricsEvent::ActiveLineChanged { .. } => "lyrics.active_line",
        }
    }
}

/// Cloneable handle on one broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// # Panics
    ///
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Deliver `event` to current subscribers, returning how many there were.
    ///
    /// # Errors
    ///
    /// `SendError` when there are no subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        trace!(event = event.label(), "emit");
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(ms: u64) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::PositionChanged {
            track_id: "song-1".to_string(),
            position_ms: ms,
            duration_ms: 180_000,
        })
    }

    #[test]
    fn emitting_without_listeners_fails() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(position(0)).is_err());
    }

    #[tokio::test]
    async fn every_subscriber_gets_a_copy() {
        let bus = EventBus::new(4);
        let mut first = bus.subscribe();
        let mut second = bus.clone().subscribe();

        let event = CoreEvent::Library(LibraryEvent::PlaylistCreated {
            playlist_id: "pl-1".to_string(),
            name: "Road Trip".to_string(),
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn late_subscribers_miss_earlier_events() {
        let bus = EventBus::new(4);
        let _keepalive = bus.subscribe();
        bus.emit(position(1)).unwrap();

        let mut late = bus.subscribe();
        bus.emit(position(2)).unwrap();
        assert_eq!(late.recv().await.unwrap(), position(2));
    }

    #[tokio::test]
    async fn slow_subscriber_lags_then_recovers() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for ms in 0..5 {
            bus.emit(position(ms * 250)).ok();
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(rx.recv().await.unwrap(), position(750));
    }

    #[test]
    fn labels_are_namespaced() {
        let degraded = CoreEvent::Library(LibraryEvent::StorageDegraded {
            reason: "disk full".to_string(),
        });
        assert_eq!(degraded.label(), "library.storage_degraded");
        assert_eq!(position(0).label(), "playback.position");
    }

    #[test]
    fn json_shape_is_tagged() {
        let event = CoreEvent::Playback(PlaybackEvent::ModeChanged {
            shuffle: true,
            repeat: "all".to_string(),
            prefer_unplayed: false,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Playback");
        assert_eq!(json["payload"]["event"], "ModeChanged");
        assert_eq!(serde_json::from_value::<CoreEvent>(json).unwrap(), event);
    }
}
