//! # Library service
//!
//! Owns the in-memory, ordered song list (the "library") and keeps it in step
//! with the [`LibraryStore`]. Every mutation writes through to the store
//! first; when the store rejects a write the in-memory list is left untouched
//! and the error is returned to the caller.

use crate::error::{LibraryError, Result};
use crate::models::{NewSong, Song, SortOption};
use crate::repositories::LibraryStore;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct Library {
    store: Arc<dyn LibraryStore>,
    events: EventBus,
    songs: RwLock<Vec<Song>>,
}

impl Library {
    /// Load every song from `store`.
    pub async fn load(store: Arc<dyn LibraryStore>, events: EventBus) -> Result<Self> {
        let songs = store.get_all_songs().await?;
        info!(count = songs.len(), "Library loaded");

        Ok(Self {
            store,
            events,
            songs: RwLock::new(songs),
        })
    }

    pub fn store(&self) -> &Arc<dyn LibraryStore> {
        &self.store
    }

    /// Snapshot of the library in order.
    pub fn songs(&self) -> Vec<Song> {
        self.songs.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Song> {
        self.songs.read().iter().find(|song| song.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.songs.read().iter().any(|song| song.id == id)
    }

    pub fn len(&self) -> usize {
        self.songs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.read().is_empty()
    }

    /// Import a decoded song. Assigns its id and creation time.
    #[instrument(skip(self, new_song), fields(title = %new_song.title))]
    pub async fn import(&self, new_song: NewSong) -> Result<Song> {
        let mut song = new_song.into_song();
        self.store.put_song(&song).await?;

        song.locator = Some(self.store.locators().issue(&song.id, song.audio.clone()));
        self.songs.write().push(song.clone());

        info!(song_id = %song.id, "Song imported");
        self.emit(LibraryEvent::TrackAdded {
            track_id: song.id.clone(),
            title: song.title.clone(),
            artist: song.artist.clone(),
        });

        Ok(song)
    }

    /// Flip the liked flag. Returns the new value.
    pub async fn toggle_like(&self, id: &str) -> Result<bool> {
        let song = self
            .modify(id, "liked", |song| {
                song.liked = !song.liked;
                true
            })
            .await?;
        Ok(song.liked)
    }

    /// Replace the song's lyric text.
    pub async fn update_lyrics(&self, id: &str, lyrics: Option<String>) -> Result<Song> {
        self.modify(id, "lyrics", |song| {
            if song.lyrics == lyrics {
                return false;
            }
            song.lyrics = lyrics;
            true
        })
        .await
    }

    /// Store the duration reported by the transport.
    ///
    /// Returns `false` without touching storage when the value is unchanged,
    /// non-finite or not positive.
    pub async fn correct_duration(&self, id: &str, duration: f64) -> Result<bool> {
        if !duration.is_finite() || duration <= 0.0 {
            return Ok(false);
        }

        let current = self.get(id).ok_or_else(|| LibraryError::not_found("Song", id))?;
        if current.duration == duration {
            return Ok(false);
        }

        self.modify(id, "duration", |song| {
            song.duration = duration;
            true
        })
        .await?;
        debug!(song_id = id, duration, "Duration corrected");
        Ok(true)
    }

    /// Remove a song from storage and from the library.
    pub async fn delete(&self, id: &str) -> Result<Song> {
        let song = self.get(id).ok_or_else(|| LibraryError::not_found("Song", id))?;
        self.store.delete_song(id).await?;

        self.songs.write().retain(|song| song.id != id);

        info!(song_id = id, "Song deleted");
        self.emit(LibraryEvent::TrackDeleted {
            track_id: id.to_string(),
        });
        Ok(song)
    }

    /// Liked songs in library order.
    pub fn liked_songs(&self) -> Vec<Song> {
        self.songs
            .read()
            .iter()
            .filter(|song| song.liked)
            .cloned()
            .collect()
    }

    /// Case-insensitive search over title, artist and album.
    pub fn search(&self, query: &str) -> Vec<Song> {
        self.songs
            .read()
            .iter()
            .filter(|song| song.matches(query))
            .cloned()
            .collect()
    }

    /// Library snapshot in the requested order.
    pub fn sorted(&self, option: SortOption) -> Vec<Song> {
        let mut songs = self.songs();
        match option {
            SortOption::Title => {
                songs.sort_by_key(|song| song.title.to_lowercase());
            }
            SortOption::Artist => {
                songs.sort_by_key(|song| song.artist.to_lowercase());
            }
            SortOption::DateAdded => {
                songs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
        }
        songs
    }

    /// Apply `change` to a copy of the song, persist it, then commit it in memory.
    ///
    /// `change` returns whether anything changed; unchanged songs skip the write.
    async fn modify<F>(&self, id: &str, field: &str, change: F) -> Result<Song>
    where
        F: FnOnce(&mut Song) -> bool,
    {
        let mut song = self.get(id).ok_or_else(|| LibraryError::not_found("Song", id))?;
        if !change(&mut song) {
            return Ok(song);
        }

        self.store.put_song(&song).await?;

        {
            let mut songs = self.songs.write();
            if let Some(slot) = songs.iter_mut().find(|existing| existing.id == id) {
                *slot = song.clone();
            }
        }

        self.emit(LibraryEvent::TrackUpdated {
            track_id: id.to_string(),
            updated_fields: vec![field.to_string()],
        });
        Ok(song)
    }

    fn emit(&self, event: LibraryEvent) {
        self.events.emit(CoreEvent::Library(event)).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryLibraryStore;

    async fn setup() -> (Library, Arc<InMemoryLibraryStore>, EventBus) {
        let store = Arc::new(InMemoryLibraryStore::new());
        let events = EventBus::new(32);
        let library = Library::load(store.clone(), events.clone()).await.unwrap();
        (library, store, events)
    }

    fn new_song(title: &str, artist: &str) -> NewSong {
        NewSong::new(title, vec![1u8, 2, 3])
            .with_artist(artist)
            .with_album("Album")
            .with_duration(180.0)
    }

    #[tokio::test]
    async fn test_import_assigns_id_and_locator() {
        let (library, store, events) = setup().await;
        let mut rx = events.subscribe();

        let song = library.import(new_song("Intro", "A")).await.unwrap();

        assert!(!song.id.is_empty());
        let locator = song.locator.clone().unwrap();
        assert!(store.locators().is_live(&locator));
        assert_eq!(library.len(), 1);
        assert!(matches!(
            rx.recv().await.unwrap(),
            CoreEvent::Library(LibraryEvent::TrackAdded { .. })
        ));
    }

    #[tokio::test]
    async fn test_toggle_like_persists() {
        let (library, store, _) = setup().await;
        let song = library.import(new_song("Intro", "A")).await.unwrap();

        assert!(library.toggle_like(&song.id).await.unwrap());
        assert_eq!(library.liked_songs().len(), 1);
        assert!(store.get_all_songs().await.unwrap()[0].liked);

        assert!(!library.toggle_like(&song.id).await.unwrap());
        assert!(library.liked_songs().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_untouched() {
        let (library, store, _) = setup().await;
        let song = library.import(new_song("Intro", "A")).await.unwrap();

        store.set_available(false);
        let err = library.toggle_like(&song.id).await.unwrap_err();
        assert!(err.is_storage_failure());
        assert!(!library.get(&song.id).unwrap().liked);

        assert!(library.import(new_song("Other", "B")).await.is_err());
        assert_eq!(library.len(), 1);

        assert!(library.delete(&song.id).await.is_err());
        assert!(library.contains(&song.id));
    }

    #[tokio::test]
    async fn test_correct_duration() {
        let (library, _, _) = setup().await;
        let song = library.import(new_song("Intro", "A")).await.unwrap();

        assert!(!library.correct_duration(&song.id, 180.0).await.unwrap());
        assert!(!library.correct_duration(&song.id, f64::NAN).await.unwrap());
        assert!(!library.correct_duration(&song.id, 0.0).await.unwrap());
        assert!(library.correct_duration(&song.id, 181.25).await.unwrap());
        assert_eq!(library.get(&song.id).unwrap().duration, 181.25);
    }

    #[tokio::test]
    async fn test_update_lyrics_keeps_locator() {
        let (library, _, _) = setup().await;
        let song = library.import(new_song("Intro", "A")).await.unwrap();

        let updated = library
            .update_lyrics(&song.id, Some("[00:01.00]Hi".to_string()))
            .await
            .unwrap();

        assert_eq!(updated.lyrics.as_deref(), Some("[00:01.00]Hi"));
        assert_eq!(updated.locator, song.locator);
    }

    #[tokio::test]
    async fn test_delete_unknown_song() {
        let (library, _, _) = setup().await;
        let result = library.delete("missing").await;
        assert!(matches!(result, Err(LibraryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_search_and_sort() {
        let (library, _, _) = setup().await;
        let b = library.import(new_song("beta", "Zed")).await.unwrap();
        let a = library.import(new_song("Alpha", "Yan")).await.unwrap();

        assert_eq!(library.search("ALP").len(), 1);
        assert_eq!(library.search("album").len(), 2);

        let by_title: Vec<_> = library.sorted(SortOption::Title).into_iter().map(|s| s.id).collect();
        assert_eq!(by_title, vec![a.id.clone(), b.id.clone()]);

        let by_artist: Vec<_> = library.sorted(SortOption::Artist).into_iter().map(|s| s.id).collect();
        assert_eq!(by_artist, vec![a.id.clone(), b.id.clone()]);
    }

    #[tokio::test]
    async fn test_reload_reflects_persisted_state() {
        let (library, store, events) = setup().await;
        let song = library.import(new_song("Intro", "A")).await.unwrap();
        library.toggle_like(&song.id).await.unwrap();

        let reloaded = Library::load(store, events).await.unwrap();
        let again = reloaded.get(&song.id).unwrap();
        assert!(again.liked);
        assert_ne!(again.locator, song.locator);
    }
}
