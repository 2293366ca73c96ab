//! # Lyrics Synchronizer
//!
//! Tracks the active lyric line for the current song. Recomputation is driven
//! by playback position updates only; there is no polling loop.

use crate::lrc::Lyrics;
use core_runtime::events::{CoreEvent, EventBus, LyricsEvent, PlaybackEvent, RecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Lookup of raw lyric text by song id.
pub trait LyricsSource: Send + Sync {
    fn lyrics_for(&self, track_id: &str) -> Option<String>;
}

impl<F> LyricsSource for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn lyrics_for(&self, track_id: &str) -> Option<String> {
        self(track_id)
    }
}

/// Reported by [`LyricsSynchronizer::update`] when the active line moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveLineChange {
    pub previous: Option<usize>,
    pub current: Option<usize>,
}

#[derive(Debug, Default)]
pub struct LyricsSynchronizer {
    track_id: Option<String>,
    lyrics: Lyrics,
    active: Option<usize>,
}

impl LyricsSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the lyrics. The active line resets to none.
    pub fn load(&mut self, track_id: Option<String>, text: Option<&str>) -> &Lyrics {
        self.lyrics = text.map(Lyrics::parse).unwrap_or_default();
        self.track_id = track_id;
        self.active = None;
        debug!(
            track_id = ?self.track_id,
            lines = self.lyrics.len(),
            timed = self.lyrics.is_timed(),
            "Loaded lyrics"
        );
        &self.lyrics
    }

    pub fn clear(&mut self) {
        self.load(None, None);
    }

    /// Recompute the active line for `position`, returning the change if any.
    pub fn update(&mut self, position: f64) -> Option<ActiveLineChange> {
        let current = self.lyrics.active_line_index(position);
        if current == self.active {
            return None;
        }

        let change = ActiveLineChange {
            previous: self.active,
            current,
        };
        self.active = current;
        Some(change)
    }

    /// Pure lookup; does not move the tracked active line.
    pub fn active_line_index(&self, position: f64) -> Option<usize> {
        self.lyrics.active_line_index(position)
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn lyrics(&self) -> &Lyrics {
        &self.lyrics
    }

    pub fn track_id(&self) -> Option<&str> {
        self.track_id.as_deref()
    }
}

/// Follow playback events on `bus`.
///
/// - `Started` loads the song's lyrics through `source`
/// - `PositionChanged` for the loaded song recomputes the active line
/// - `Stopped` and `Error` clear the lyrics
///
/// Emits [`LyricsEvent`]s for every load and active-line change. The task
/// runs until aborted or the bus closes.
pub fn spawn_lyrics_follower(
    bus: &EventBus,
    synchronizer: Arc<Mutex<LyricsSynchronizer>>,
    source: Arc<dyn LyricsSource>,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    let bus = bus.clone();

    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(CoreEvent::Playback(event)) => event,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Lyrics follower lagged behind playback events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            match event {
                PlaybackEvent::Started { track_id, .. } => {
                    let text = source.lyrics_for(&track_id);
                    let (line_count, timed) = {
                        let mut sync = synchronizer.lock();
                        let lyrics = sync.load(Some(track_id.clone()), text.as_deref());
                        (lyrics.len(), lyrics.is_timed())
                    };
                    emit(
                        &bus,
                        LyricsEvent::Loaded {
                            track_id: Some(track_id),
                            line_count,
                            timed,
                        },
                    );
                }
                PlaybackEvent::PositionChanged {
                    track_id,
                    position_ms,
                    ..
                } => {
                    let change = {
                        let mut sync = synchronizer.lock();
                        if sync.track_id() == Some(track_id.as_str()) {
                            sync.update(position_ms as f64 / 1000.0)
                        } else {
                            None
                        }
                    };
                    if let Some(change) = change {
                        emit(
                            &bus,
                            LyricsEvent::ActiveLineChanged {
                                track_id: Some(track_id),
                                index: change.current,
                            },
                        );
                    }
                }
                PlaybackEvent::Stopped { .. } | PlaybackEvent::Error { .. } => {
                    synchronizer.lock().clear();
                    emit(
                        &bus,
                        LyricsEvent::Loaded {
                            track_id: None,
                            line_count: 0,
                            timed: false,
                        },
                    );
                }
                _ => {}
            }
        }
        debug!("Lyrics follower stopped");
    })
}

fn emit(bus: &EventBus, event: LyricsEvent) {
    bus.emit(CoreEvent::Lyrics(event)).ok();
}
