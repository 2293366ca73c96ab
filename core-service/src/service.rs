use crate::error::Result;
use async_trait::async_trait;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{
    InMemoryLibraryStore, Library, LibraryError, LibraryStore, NewSong, Playlist, PlaylistManager,
    ResolvedPlaylist, Song, SqliteLibraryStore,
};
use core_lyrics::{spawn_lyrics_follower, LyricsSynchronizer};
use core_playback::{
    spawn_transport_pump, AudioTransport, PlaybackEngine, PlaybackStatus, TransportCallback,
    TransportEventHandler,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, LyricsEvent, Receiver};
use core_runtime::logging::strip_path;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Primary façade exposed to host applications.
///
/// Wires the library, playlists, playback engine and lyrics synchronizer to
/// one [`EventBus`] and keeps them consistent across cascading operations.
pub struct MuseCore {
    config: CoreConfig,
    events: EventBus,
    library: Arc<Library>,
    playlists: Arc<PlaylistManager>,
    engine: Arc<PlaybackEngine>,
    lyrics: Arc<Mutex<LyricsSynchronizer>>,
    degraded: Option<String>,
}

impl MuseCore {
    /// Open the configured SQLite library and start a session over it.
    ///
    /// Storage failures are not fatal: the core logs a warning, emits
    /// [`LibraryEvent::StorageDegraded`] and continues with an empty
    /// in-memory library.
    pub async fn bootstrap(config: CoreConfig, transport: Arc<dyn AudioTransport>) -> Result<Self> {
        config.validate()?;
        let events = EventBus::new(config.event_buffer_size);

        match config.database_path.as_ref().and_then(|path| path.to_str()) {
            Some(path) => info!(database = strip_path(path), "Opening library database"),
            None => info!("Opening in-memory library database"),
        }

        let opened = match Self::open_sqlite(&config).await {
            Ok(store) => Self::load_catalog(store, &events).await,
            Err(e) => Err(e),
        };

        let (library, playlists, degraded) = match opened {
            Ok((library, playlists)) => (library, playlists, None),
            Err(e) if e.is_storage_failure() => {
                warn!(error = %e, "Library storage unavailable; continuing in memory");
                let store: Arc<dyn LibraryStore> = Arc::new(InMemoryLibraryStore::new());
                let (library, playlists) = Self::load_catalog(store, &events).await?;
                (library, playlists, Some(e.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Self::assemble(config, events, library, playlists, transport, degraded).await
    }

    /// Start a session over an explicit store.
    pub async fn with_store(
        config: CoreConfig,
        store: Arc<dyn LibraryStore>,
        transport: Arc<dyn AudioTransport>,
    ) -> Result<Self> {
        config.validate()?;
        let events = EventBus::new(config.event_buffer_size);
        let (library, playlists) = Self::load_catalog(store, &events).await?;
        Self::assemble(config, events, library, playlists, transport, None).await
    }

    async fn open_sqlite(config: &CoreConfig) -> core_library::Result<Arc<dyn LibraryStore>> {
        let pool = create_pool(DatabaseConfig::for_path(config.database_path.as_ref())).await?;
        Ok(Arc::new(SqliteLibraryStore::new(pool)))
    }

    /// Read every song and playlist. A table that migrated but cannot be read
    /// fails here, before anything else is wired up.
    async fn load_catalog(
        store: Arc<dyn LibraryStore>,
        events: &EventBus,
    ) -> core_library::Result<(Arc<Library>, Arc<PlaylistManager>)> {
        let library = Arc::new(Library::load(store.clone(), events.clone()).await?);
        let playlists = Arc::new(PlaylistManager::load(store, events.clone()).await?);
        Ok((library, playlists))
    }

    async fn assemble(
        config: CoreConfig,
        events: EventBus,
        library: Arc<Library>,
        playlists: Arc<PlaylistManager>,
        transport: Arc<dyn AudioTransport>,
        degraded: Option<String>,
    ) -> Result<Self> {
        let engine = Arc::new(PlaybackEngine::new(transport, events.clone(), &config.playback));
        engine.set_queue(library.songs());
        if let Err(e) = engine.set_volume(config.playback.initial_volume).await {
            warn!(error = %e, "Could not apply initial volume");
        }

        if let Some(reason) = &degraded {
            events
                .emit(CoreEvent::Library(LibraryEvent::StorageDegraded {
                    reason: reason.clone(),
                }))
                .ok();
        }

        info!(
            songs = library.len(),
            playlists = playlists.list().len(),
            degraded = degraded.is_some(),
            "Core ready"
        );

        Ok(Self {
            config,
            events,
            library,
            playlists,
            engine,
            lyrics: Arc::new(Mutex::new(LyricsSynchronizer::new())),
            degraded,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn library(&self) -> &Arc<Library> {
        &self.library
    }

    pub fn playlists(&self) -> &Arc<PlaylistManager> {
        &self.playlists
    }

    /// Transport controls (`pause`, `seek`, `next`, modes, ...) live on the engine.
    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    /// Why storage degraded to memory at startup, if it did.
    pub fn storage_degraded(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    // ------------------------------------------------------------------
    // Background tasks
    // ------------------------------------------------------------------

    /// Drain transport callbacks onto this core in order.
    pub fn spawn_transport_pump(
        self: &Arc<Self>,
        rx: mpsc::UnboundedReceiver<TransportCallback>,
    ) -> JoinHandle<()> {
        spawn_transport_pump(self.clone(), rx)
    }

    /// Keep the lyrics synchronizer following playback events.
    pub fn spawn_lyrics_follower(&self) -> JoinHandle<()> {
        let library = self.library.clone();
        let source = Arc::new(move |id: &str| library.get(id).and_then(|song| song.lyrics));
        spawn_lyrics_follower(&self.events, self.lyrics.clone(), source)
    }

    // ------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------

    /// Import one song and append it to the queue.
    pub async fn import_song(&self, new_song: NewSong) -> Result<Song> {
        let song = self.library.import(new_song).await?;
        self.engine.enqueue(song.clone());
        Ok(song)
    }

    /// Import a batch. If nothing is playing, the first imported song starts.
    pub async fn import_songs(&self, new_songs: Vec<NewSong>) -> Result<Vec<Song>> {
        let mut imported = Vec::with_capacity(new_songs.len());
        for new_song in new_songs {
            imported.push(self.import_song(new_song).await?);
        }

        if self.engine.status() == PlaybackStatus::Idle {
            if let Some(first) = imported.first() {
                self.engine.play(first.clone()).await?;
            }
        }
        Ok(imported)
    }

    pub async fn toggle_like(&self, song_id: &str) -> Result<bool> {
        let liked = self.library.toggle_like(song_id).await?;
        self.sync_engine_song(song_id);
        Ok(liked)
    }

    /// Replace a song's lyric text. Reloads the synchronizer when the song is
    /// the one playing.
    pub async fn update_lyrics(&self, song_id: &str, lyrics: Option<String>) -> Result<Song> {
        let song = self.library.update_lyrics(song_id, lyrics).await?;
        self.engine.update_song(&song);

        let is_current = self
            .engine
            .current_song()
            .is_some_and(|current| current.id == song.id);
        if is_current {
            let position = self.engine.position();
            let (line_count, timed, active) = {
                let mut sync = self.lyrics.lock();
                sync.load(Some(song.id.clone()), song.lyrics.as_deref());
                let active = sync.update(position).and_then(|change| change.current);
                (sync.lyrics().len(), sync.lyrics().is_timed(), active)
            };

            self.emit_lyrics(LyricsEvent::Loaded {
                track_id: Some(song.id.clone()),
                line_count,
                timed,
            });
            if active.is_some() {
                self.emit_lyrics(LyricsEvent::ActiveLineChanged {
                    track_id: Some(song.id.clone()),
                    index: active,
                });
            }
        }
        Ok(song)
    }

    /// Delete a song everywhere: library, every playlist, and the session.
    ///
    /// If it is playing, playback advances to another queued song or stops.
    #[instrument(skip(self))]
    pub async fn delete_song(&self, song_id: &str) -> Result<()> {
        self.library.delete(song_id).await?;
        // The song is gone from the library, so the queue must drop it even
        // when a playlist could not be rewritten.
        let pruned = self.playlists.prune_song(song_id).await;

        if let Err(e) = self.engine.remove_song(song_id).await {
            // Already reported on the bus; the delete itself succeeded.
            warn!(error = %e, "Playback failed while advancing past deleted song");
        }

        let pruned = pruned?;
        info!(song_id, pruned, "Deleted song cascaded to playlists and queue");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Playlists
    // ------------------------------------------------------------------

    pub async fn create_playlist(&self, name: &str) -> Result<Playlist> {
        Ok(self.playlists.create(name).await?)
    }

    /// Add a library song to a playlist. Unknown song ids are rejected.
    pub async fn add_to_playlist(&self, playlist_id: &str, song_id: &str) -> Result<bool> {
        if !self.library.contains(song_id) {
            return Err(LibraryError::NotFound {
                entity_type: "Song".to_string(),
                id: song_id.to_string(),
            }
            .into());
        }
        Ok(self.playlists.add_song(playlist_id, song_id).await?)
    }

    pub async fn remove_from_playlist(&self, playlist_id: &str, song_id: &str) -> Result<bool> {
        Ok(self.playlists.remove_song(playlist_id, song_id).await?)
    }

    pub fn resolve_playlist(&self, playlist_id: &str) -> Result<ResolvedPlaylist> {
        Ok(self.playlists.resolve(playlist_id, &self.library)?)
    }

    /// Replace the queue with a playlist's songs and start the first one.
    ///
    /// An empty playlist leaves the queue and the session untouched.
    pub async fn play_playlist(&self, playlist_id: &str) -> Result<()> {
        let resolved = self.resolve_playlist(playlist_id)?;
        if resolved.songs.is_empty() {
            info!(playlist_id, "Playlist is empty; nothing to play");
            return Ok(());
        }

        self.engine.set_queue(resolved.songs);
        self.engine.play_at(0).await?;
        Ok(())
    }

    /// Replace the queue with the whole library.
    pub fn queue_library(&self) {
        self.engine.set_queue(self.library.songs());
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    pub async fn play_song(&self, song_id: &str) -> Result<()> {
        let song = self.library.get(song_id).ok_or_else(|| LibraryError::NotFound {
            entity_type: "Song".to_string(),
            id: song_id.to_string(),
        })?;
        Ok(self.engine.play(song).await?)
    }

    /// Forward a transport callback and persist duration corrections.
    pub async fn handle_transport_event(&self, callback: TransportCallback) -> Result<()> {
        let correction = self.engine.handle_transport_event(callback).await?;

        if let Some(correction) = correction {
            match self
                .library
                .correct_duration(&correction.song_id, correction.duration)
                .await
            {
                Ok(_) => {}
                Err(LibraryError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lyrics
    // ------------------------------------------------------------------

    /// Load lyric text into the synchronizer for the current song.
    pub fn load_lyrics(&self, text: &str) -> usize {
        let track_id = self.engine.current_song().map(|song| song.id);
        let (line_count, timed) = {
            let mut sync = self.lyrics.lock();
            let lyrics = sync.load(track_id.clone(), Some(text));
            (lyrics.len(), lyrics.is_timed())
        };
        self.emit_lyrics(LyricsEvent::Loaded {
            track_id,
            line_count,
            timed,
        });
        line_count
    }

    /// Active lyric line at `position` seconds for the loaded lyrics.
    pub fn active_line_index(&self, position: f64) -> Option<usize> {
        self.lyrics.lock().active_line_index(position)
    }

    pub fn lyrics(&self) -> &Arc<Mutex<LyricsSynchronizer>> {
        &self.lyrics
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn sync_engine_song(&self, song_id: &str) {
        if let Some(song) = self.library.get(song_id) {
            self.engine.update_song(&song);
        }
    }

    fn emit_lyrics(&self, event: LyricsEvent) {
        self.events.emit(CoreEvent::Lyrics(event)).ok();
    }
}

#[async_trait]
impl TransportEventHandler for MuseCore {
    async fn on_transport_event(&self, callback: TransportCallback) {
        if let Err(e) = self.handle_transport_event(callback).await {
            warn!(error = %e, "Transport event handling failed");
        }
    }
}

impl std::fmt::Debug for MuseCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuseCore")
            .field("songs", &self.library.len())
            .field("playlists", &self.playlists.list().len())
            .field("status", &self.engine.status())
            .field("degraded", &self.degraded)
            .finish()
    }
}
