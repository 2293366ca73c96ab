//! # Playback Engine
//!
//! Owns the [`SessionState`] and drives an [`AudioTransport`].
//!
//! ## Supersession
//!
//! Every `load` bumps a generation counter. A transport failure is only acted
//! upon if it belongs to the newest generation; a failure from a superseded
//! request, and any [`PlaybackError::Interrupted`], is dropped silently. The
//! session therefore always reflects the most recently requested song.
//!
//! Transport callbacks carry the locator they were raised for. Anything not
//! raised for the current song's locator is ignored.
//!
//! ## Locking
//!
//! State lives behind a `parking_lot::Mutex` that is never held across an
//! `.await`. Decisions are taken under the lock, transport calls happen after
//! it is released.

use crate::error::{PlaybackError, Result};
use crate::navigation::{self, NextStep, PrevStep};
use crate::session::{to_millis, AdvanceTrigger, PlaybackStatus, RepeatMode, SessionState};
use crate::traits::{AudioTransport, TransportCallback, TransportEvent};
use core_library::{PlayableLocator, Song};
use core_runtime::config::PlaybackSettings;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// A song whose real length differed from the stored one.
///
/// Returned by [`PlaybackEngine::handle_transport_event`] so the caller can
/// persist the correction.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationCorrection {
    pub song_id: String,
    pub duration: f64,
}

/// Playback state machine and queue navigator.
pub struct PlaybackEngine {
    transport: Arc<dyn AudioTransport>,
    events: EventBus,
    state: Mutex<SessionState>,
    generation: AtomicU64,
    rng: Mutex<StdRng>,
    restart_threshold: f64,
}

impl PlaybackEngine {
    pub fn new(
        transport: Arc<dyn AudioTransport>,
        events: EventBus,
        settings: &PlaybackSettings,
    ) -> Self {
        Self::with_rng(transport, events, settings, StdRng::from_entropy())
    }

    /// Deterministic shuffle for tests and reproducible sessions.
    pub fn with_seed(
        transport: Arc<dyn AudioTransport>,
        events: EventBus,
        settings: &PlaybackSettings,
        seed: u64,
    ) -> Self {
        Self::with_rng(transport, events, settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        transport: Arc<dyn AudioTransport>,
        events: EventBus,
        settings: &PlaybackSettings,
        rng: StdRng,
    ) -> Self {
        let state = SessionState {
            volume: settings.initial_volume.clamp(0.0, 1.0),
            prefer_unplayed: settings.prefer_unplayed,
            ..SessionState::default()
        };

        Self {
            transport,
            events,
            state: Mutex::new(state),
            generation: AtomicU64::new(0),
            rng: Mutex::new(rng),
            restart_threshold: settings.restart_threshold_secs,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> SessionState {
        self.state.lock().clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.lock().status
    }

    pub fn current_song(&self) -> Option<Song> {
        self.state.lock().current.clone()
    }

    pub fn position(&self) -> f64 {
        self.state.lock().position
    }

    pub fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    pub fn queue(&self) -> Vec<Song> {
        self.state.lock().queue.clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.state.lock().history.clone()
    }

    pub fn played_ids(&self) -> HashSet<String> {
        self.state.lock().played.clone()
    }

    // ------------------------------------------------------------------
    // Transport controls
    // ------------------------------------------------------------------

    /// Make `song` current and start it from 0. The queue is left untouched.
    pub async fn play(&self, song: Song) -> Result<()> {
        self.load(song, false).await
    }

    pub async fn play_at(&self, index: usize) -> Result<()> {
        let song = {
            let state = self.state.lock();
            state
                .queue
                .get(index)
                .cloned()
                .ok_or(PlaybackError::QueueIndexOutOfRange {
                    index,
                    len: state.queue.len(),
                })?
        };
        self.load(song, false).await
    }

    pub async fn pause(&self) -> Result<()> {
        let (track_id, position) = {
            let mut state = self.state.lock();
            if state.status != PlaybackStatus::Playing {
                return Ok(());
            }
            state.status = PlaybackStatus::Paused;
            (state.current_id().map(str::to_string), state.position)
        };

        let generation = self.generation();
        self.drive(generation, self.transport.pause().await).await?;

        if let Some(track_id) = track_id {
            self.emit(PlaybackEvent::Paused {
                track_id,
                position_ms: to_millis(position),
            });
        }
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        let (track_id, position) = {
            let mut state = self.state.lock();
            if state.status != PlaybackStatus::Paused {
                return Ok(());
            }
            state.status = PlaybackStatus::Playing;
            (state.current_id().map(str::to_string), state.position)
        };

        let generation = self.generation();
        self.drive(generation, self.transport.resume().await).await?;

        if let Some(track_id) = track_id {
            self.emit(PlaybackEvent::Resumed {
                track_id,
                position_ms: to_millis(position),
            });
        }
        Ok(())
    }

    /// Play/pause toggle. From idle, starts the head of the queue.
    pub async fn toggle(&self) -> Result<()> {
        let (status, has_queue) = {
            let state = self.state.lock();
            (state.status, !state.queue.is_empty())
        };

        match status {
            PlaybackStatus::Playing => self.pause().await,
            PlaybackStatus::Paused => self.resume().await,
            PlaybackStatus::Idle if has_queue => self.play_at(0).await,
            PlaybackStatus::Idle => Ok(()),
        }
    }

    /// Move the playhead. `position` is clamped into `[0, duration]`.
    pub async fn seek(&self, position: f64) -> Result<()> {
        let (track_id, position, duration) = {
            let mut state = self.state.lock();
            let Some(track_id) = state.current_id().map(str::to_string) else {
                return Ok(());
            };
            state.position = state.clamp_position(position);
            (track_id, state.position, state.duration())
        };

        let generation = self.generation();
        self.drive(generation, self.transport.seek(position).await).await?;

        self.emit(PlaybackEvent::PositionChanged {
            track_id,
            position_ms: to_millis(position),
            duration_ms: to_millis(duration),
        });
        Ok(())
    }

    /// Set the output volume, clamped into `[0, 1]`. Non-finite input is ignored.
    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        if !volume.is_finite() {
            warn!(volume, "Ignoring non-finite volume");
            return Ok(());
        }

        let volume = volume.clamp(0.0, 1.0);
        self.state.lock().volume = volume;

        let generation = self.generation();
        self.drive(generation, self.transport.set_volume(volume).await)
            .await?;

        self.emit(PlaybackEvent::VolumeChanged {
            volume_percent: (volume * 100.0).round() as u8,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------

    /// Flip shuffle, returning the new value.
    pub fn toggle_shuffle(&self) -> bool {
        let shuffle = {
            let mut state = self.state.lock();
            state.shuffle = !state.shuffle;
            state.shuffle
        };
        self.emit_mode();
        shuffle
    }

    /// Advance repeat off → all → one → off, returning the new mode.
    pub fn cycle_repeat(&self) -> RepeatMode {
        let repeat = {
            let mut state = self.state.lock();
            state.repeat = state.repeat.cycled();
            state.repeat
        };
        self.emit_mode();
        repeat
    }

    pub fn set_prefer_unplayed(&self, enabled: bool) {
        self.state.lock().prefer_unplayed = enabled;
        self.emit_mode();
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Advance to the next song.
    ///
    /// `Manual` is a user skip; `Auto` is the transport reaching the end of
    /// the current song. See [`crate::navigation`] for the selection rules.
    #[instrument(skip(self))]
    pub async fn next(&self, trigger: AdvanceTrigger) -> Result<()> {
        let step = {
            let state = self.state.lock();
            let mut rng = self.rng.lock();
            navigation::next_step(&state, trigger, &mut *rng)
        };
        debug!(?step, "Next step decided");

        match step {
            NextStep::Nothing => Ok(()),
            NextStep::Replay => self.replay().await,
            NextStep::Stop => self.complete().await,
            NextStep::Play {
                index,
                reset_played,
            } => {
                let song = self.state.lock().queue.get(index).cloned();
                match song {
                    Some(song) => self.load(song, reset_played).await,
                    None => Ok(()),
                }
            }
        }
    }

    /// Go back: restart the current song past the threshold, otherwise move to
    /// the previous queue entry (wrapping to the last).
    #[instrument(skip(self))]
    pub async fn prev(&self) -> Result<()> {
        let step = {
            let state = self.state.lock();
            navigation::previous_step(&state, self.restart_threshold)
        };

        match step {
            PrevStep::Nothing => Ok(()),
            PrevStep::Restart => self.restart().await,
            PrevStep::Play { index } => {
                let song = self.state.lock().queue.get(index).cloned();
                match song {
                    Some(song) => self.load(song, false).await,
                    None => Ok(()),
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------

    /// Replace the queue. Duplicate ids keep their first occurrence and the
    /// played-set starts over. The current song keeps playing.
    pub fn set_queue(&self, songs: Vec<Song>) {
        let length = {
            let mut state = self.state.lock();
            let mut seen = HashSet::new();
            state.queue = songs
                .into_iter()
                .filter(|song| seen.insert(song.id.clone()))
                .collect();
            state.played.clear();
            if let Some(id) = state.current_id().map(str::to_string) {
                state.played.insert(id);
            }
            state.queue.len()
        };
        self.emit(PlaybackEvent::QueueChanged { length });
    }

    /// Append a song; returns `false` if it is already queued.
    pub fn enqueue(&self, song: Song) -> bool {
        let length = {
            let mut state = self.state.lock();
            if state.queue.iter().any(|queued| queued.id == song.id) {
                return false;
            }
            state.queue.push(song);
            state.queue.len()
        };
        self.emit(PlaybackEvent::QueueChanged { length });
        true
    }

    /// Remove the entry at `index`. Playback of the current song is unaffected.
    pub fn remove_from_queue(&self, index: usize) -> Result<Song> {
        let (removed, length) = {
            let mut state = self.state.lock();
            if index >= state.queue.len() {
                return Err(PlaybackError::QueueIndexOutOfRange {
                    index,
                    len: state.queue.len(),
                });
            }
            let removed = state.queue.remove(index);
            state.played.remove(&removed.id);
            (removed, state.queue.len())
        };
        self.emit(PlaybackEvent::QueueChanged { length });
        Ok(removed)
    }

    /// Propagate edited metadata (likes, lyrics, duration) into the queue and
    /// the current song. Existing locators are kept.
    pub fn update_song(&self, song: &Song) {
        let mut state = self.state.lock();
        let SessionState { current, queue, .. } = &mut *state;
        for slot in queue
            .iter_mut()
            .chain(current.iter_mut())
            .filter(|slot| slot.id == song.id)
        {
            let locator = slot.locator.take();
            *slot = song.clone();
            if slot.locator.is_none() {
                slot.locator = locator;
            }
        }
    }

    /// Engine side of deleting a song from the library.
    ///
    /// If the song is current and anything else is queued, playback advances
    /// first. The song then leaves the queue, the played-set and the history.
    /// If it is still current afterwards, playback stops and the session goes idle.
    #[instrument(skip(self))]
    pub async fn remove_song(&self, song_id: &str) -> Result<()> {
        let (is_current, has_others) = {
            let state = self.state.lock();
            (
                state.current_id() == Some(song_id),
                state.queue.iter().any(|song| song.id != song_id),
            )
        };

        let advanced = if is_current && has_others {
            self.next(AdvanceTrigger::Manual).await
        } else {
            Ok(())
        };

        let (still_current, length) = {
            let mut state = self.state.lock();
            state.queue.retain(|song| song.id != song_id);
            state.played.remove(song_id);
            state.history.retain(|id| id != song_id);

            let still_current = state.current_id() == Some(song_id);
            if still_current {
                state.current = None;
                state.status = PlaybackStatus::Idle;
                state.position = 0.0;
            }
            (still_current, state.queue.len())
        };

        if still_current {
            self.generation.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = self.transport.stop().await {
                warn!(error = %e, "Failed to stop transport for deleted song");
            }
            self.emit(PlaybackEvent::Stopped {
                track_id: Some(song_id.to_string()),
            });
        }

        self.emit(PlaybackEvent::QueueChanged { length });
        advanced
    }

    // ------------------------------------------------------------------
    // Transport callbacks
    // ------------------------------------------------------------------

    /// Apply a transport callback.
    ///
    /// Callbacks whose source is not the current song's locator are dropped.
    /// Returns a [`DurationCorrection`] when the transport reports a length
    /// that differs from the stored one.
    pub async fn handle_transport_event(
        &self,
        callback: TransportCallback,
    ) -> Result<Option<DurationCorrection>> {
        let TransportCallback { source, event } = callback;
        if !self.is_current_source(&source) {
            debug!(source = %source, event = ?event, "Ignoring callback for a superseded source");
            return Ok(None);
        }

        match event {
            TransportEvent::TimeUpdate(position) => {
                let update = {
                    let mut state = self.state.lock();
                    if state.status == PlaybackStatus::Idle {
                        None
                    } else {
                        state.position = state.clamp_position(position);
                        state
                            .current_id()
                            .map(|id| (id.to_string(), state.position, state.duration()))
                    }
                };

                if let Some((track_id, position, duration)) = update {
                    self.emit(PlaybackEvent::PositionChanged {
                        track_id,
                        position_ms: to_millis(position),
                        duration_ms: to_millis(duration),
                    });
                }
                Ok(None)
            }
            TransportEvent::Ended => {
                self.next(AdvanceTrigger::Auto).await?;
                Ok(None)
            }
            TransportEvent::Error(reason) => {
                let generation = self.generation();
                self.fail(generation, PlaybackError::AudioDeviceError(reason))
                    .await?;
                Ok(None)
            }
            TransportEvent::Loaded { duration } => Ok(self.correct_duration(duration)),
        }
    }

    fn is_current_source(&self, source: &PlayableLocator) -> bool {
        let state = self.state.lock();
        state
            .current
            .as_ref()
            .and_then(|song| song.locator.as_ref())
            .is_some_and(|locator| locator == source)
    }

    fn correct_duration(&self, duration: f64) -> Option<DurationCorrection> {
        if !duration.is_finite() || duration <= 0.0 {
            return None;
        }

        let mut state = self.state.lock();
        let current = state.current.as_mut()?;
        if (current.duration - duration).abs() < f64::EPSILON {
            return None;
        }

        current.duration = duration;
        let song_id = current.id.clone();
        for queued in state.queue.iter_mut().filter(|song| song.id == song_id) {
            queued.duration = duration;
        }
        state.position = state.clamp_position(state.position);

        debug!(track_id = %song_id, duration, "Corrected song duration");
        Some(DurationCorrection { song_id, duration })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn load(&self, song: Song, reset_played: bool) -> Result<()> {
        let generation = {
            let mut state = self.state.lock();
            if let Some(previous) = state.current.take() {
                state.history.push(previous.id);
            }
            if reset_played {
                state.played.clear();
            }
            state.played.insert(song.id.clone());
            state.current = Some(song.clone());
            state.status = PlaybackStatus::Playing;
            state.position = 0.0;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        info!(track_id = %song.id, title = %song.title, "Loading song");
        self.emit(PlaybackEvent::Started {
            track_id: song.id.clone(),
            title: song.title.clone(),
        });

        let outcome = match &song.locator {
            Some(locator) => self.transport.play(locator).await,
            None => Err(PlaybackError::SourceUnavailable(format!(
                "song {} has no playable locator",
                song.id
            ))),
        };
        self.drive(generation, outcome).await
    }

    async fn replay(&self) -> Result<()> {
        let track_id = {
            let mut state = self.state.lock();
            state.position = 0.0;
            state.status = PlaybackStatus::Playing;
            state.current_id().map(str::to_string)
        };

        let generation = self.generation();
        self.drive(generation, self.transport.seek(0.0).await).await?;
        self.drive(generation, self.transport.resume().await).await?;

        if let Some(track_id) = track_id {
            self.emit(PlaybackEvent::Restarted { track_id });
        }
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        let track_id = {
            let mut state = self.state.lock();
            state.position = 0.0;
            state.current_id().map(str::to_string)
        };

        let generation = self.generation();
        self.drive(generation, self.transport.seek(0.0).await).await?;

        if let Some(track_id) = track_id {
            self.emit(PlaybackEvent::Restarted { track_id });
        }
        Ok(())
    }

    /// End of queue: pause in place on the last song.
    async fn complete(&self) -> Result<()> {
        let track_id = {
            let mut state = self.state.lock();
            state.status = PlaybackStatus::Paused;
            state.current_id().map(str::to_string)
        };

        let generation = self.generation();
        self.drive(generation, self.transport.pause().await).await?;

        if let Some(track_id) = track_id {
            info!(track_id = %track_id, "Reached end of queue");
            self.emit(PlaybackEvent::Completed { track_id });
        }
        Ok(())
    }

    async fn drive(&self, generation: u64, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => Ok(()),
            Err(e) => self.fail(generation, e).await,
        }
    }

    /// Resolve a transport failure to a terminal state.
    ///
    /// Interruptions and failures of superseded requests are swallowed. Any
    /// other failure stops the transport, idles the session, and is returned.
    async fn fail(&self, generation: u64, error: PlaybackError) -> Result<()> {
        if error.is_interruption() {
            debug!(error = %error, "Playback request superseded");
            return Ok(());
        }

        let track_id = {
            let mut state = self.state.lock();
            if self.generation() != generation {
                debug!(error = %error, generation, "Ignoring failure of superseded request");
                return Ok(());
            }
            state.status = PlaybackStatus::Idle;
            state.position = 0.0;
            state.current.take().map(|song| song.id)
        };

        error!(track_id = ?track_id, error = %error, "Playback failed");

        if self.generation() == generation {
            if let Err(e) = self.transport.stop().await {
                warn!(error = %e, "Failed to stop transport after playback failure");
            }
        }

        self.emit(PlaybackEvent::Error {
            track_id,
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        });
        Err(error)
    }

    fn emit_mode(&self) {
        let (shuffle, repeat, prefer_unplayed) = {
            let state = self.state.lock();
            (state.shuffle, state.repeat, state.prefer_unplayed)
        };
        self.emit(PlaybackEvent::ModeChanged {
            shuffle,
            repeat: repeat.as_str().to_string(),
            prefer_unplayed,
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        self.events.emit(CoreEvent::Playback(event)).ok();
    }
}
