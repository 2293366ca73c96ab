//! # Library Store
//!
//! Persistence contract for songs and playlists.
//!
//! ## Architecture
//!
//! - [`LibraryStore`] defines two keyed collections: songs and playlists
//! - [`SqliteLibraryStore`] persists them with sqlx
//! - [`InMemoryLibraryStore`] keeps them in maps; used when storage is
//!   unavailable and in tests
//!
//! Both implementations mint a fresh [`PlayableLocator`] for every song they
//! return from [`LibraryStore::get_all_songs`], releasing the previous one.
//! Locators are never written to storage.
//!
//! [`PlayableLocator`]: crate::locator::PlayableLocator

pub mod memory;
pub mod sqlite;

use crate::error::Result;
use crate::locator::LocatorRegistry;
use crate::models::{Playlist, Song};
use async_trait::async_trait;
use std::sync::Arc;

pub use memory::InMemoryLibraryStore;
pub use sqlite::SqliteLibraryStore;

/// Keyed persistence for songs and playlists.
///
/// All writes are upserts keyed by id.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Insert or replace a song. Any locator on `song` is ignored.
    async fn put_song(&self, song: &Song) -> Result<()>;

    /// Load every song ordered by creation time, then id, each with a fresh locator.
    async fn get_all_songs(&self) -> Result<Vec<Song>>;

    /// Delete a song and release its locator. Deleting a missing id succeeds.
    async fn delete_song(&self, id: &str) -> Result<()>;

    /// Insert or replace a playlist together with its ordered references.
    async fn put_playlist(&self, playlist: &Playlist) -> Result<()>;

    /// Load every playlist ordered by creation time, then id.
    async fn get_all_playlists(&self) -> Result<Vec<Playlist>>;

    /// Delete a playlist. Deleting a missing id succeeds.
    async fn delete_playlist(&self, id: &str) -> Result<()>;

    /// Registry that owns the locators this store hands out.
    fn locators(&self) -> Arc<LocatorRegistry>;
}

/// Attach a freshly minted locator to each song.
pub(crate) fn hydrate(registry: &LocatorRegistry, songs: &mut [Song]) {
    for song in songs.iter_mut() {
        song.locator = Some(registry.issue(&song.id, song.audio.clone()));
    }
}
