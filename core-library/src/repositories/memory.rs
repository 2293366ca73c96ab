//! In-memory implementation of the library store
//!
//! Used as the degraded fallback when persistent storage cannot be opened, and
//! as a lightweight store in tests. Availability can be toggled to simulate a
//! storage outage.

use crate::error::{LibraryError, Result};
use crate::locator::LocatorRegistry;
use crate::models::{Playlist, Song};
use crate::repositories::{hydrate, LibraryStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Map-backed [`LibraryStore`]
pub struct InMemoryLibraryStore {
    songs: RwLock<HashMap<String, Song>>,
    playlists: RwLock<HashMap<String, Playlist>>,
    locators: Arc<LocatorRegistry>,
    available: AtomicBool,
}

impl Default for InMemoryLibraryStore {
    fn default() -> Self {
        Self {
            songs: RwLock::new(HashMap::new()),
            playlists: RwLock::new(HashMap::new()),
            locators: Arc::new(LocatorRegistry::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryLibraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable every operation fails with `StorageUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LibraryError::StorageUnavailable(
                "in-memory store marked unavailable".to_string(),
            ))
        }
    }
}

#[async_trait]
impl LibraryStore for InMemoryLibraryStore {
    async fn put_song(&self, song: &Song) -> Result<()> {
        self.ensure_available()?;
        song.validate().map_err(|message| LibraryError::InvalidInput {
            field: "Song".to_string(),
            message,
        })?;

        self.songs
            .write()
            .insert(song.id.clone(), song.without_locator());
        Ok(())
    }

    async fn get_all_songs(&self) -> Result<Vec<Song>> {
        self.ensure_available()?;

        let mut songs: Vec<Song> = self.songs.read().values().cloned().collect();
        songs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        hydrate(&self.locators, &mut songs);

        Ok(songs)
    }

    async fn delete_song(&self, id: &str) -> Result<()> {
        self.ensure_available()?;

        self.songs.write().remove(id);
        self.locators.release(id);
        Ok(())
    }

    async fn put_playlist(&self, playlist: &Playlist) -> Result<()> {
        self.ensure_available()?;
        playlist
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "Playlist".to_string(),
                message,
            })?;

        self.playlists
            .write()
            .insert(playlist.id.clone(), playlist.clone());
        Ok(())
    }

    async fn get_all_playlists(&self) -> Result<Vec<Playlist>> {
        self.ensure_available()?;

        let mut playlists: Vec<Playlist> = self.playlists.read().values().cloned().collect();
        playlists.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(playlists)
    }

    async fn delete_playlist(&self, id: &str) -> Result<()> {
        self.ensure_available()?;

        self.playlists.write().remove(id);
        Ok(())
    }

    fn locators(&self) -> Arc<LocatorRegistry> {
        Arc::clone(&self.locators)
    }
}
