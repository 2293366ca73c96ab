//! # Playlist Manager
//!
//! CRUD over user playlists plus the computed "liked" playlist.
//!
//! Playlists store song ids only. Reads resolve those ids against the
//! [`Library`] and silently skip ids that no longer exist; deleting a song
//! prunes it from every playlist through [`PlaylistManager::prune_song`].
//! The "liked" playlist is resolvable like any other but every mutation
//! targeting it fails with [`LibraryError::ReadOnlyPlaylist`].

use crate::error::{LibraryError, Result};
use crate::library::Library;
use crate::models::{Playlist, ResolvedPlaylist, Song, LIKED_PLAYLIST_ID, LIKED_PLAYLIST_NAME};
use crate::repositories::LibraryStore;
use bytes::Bytes;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

pub struct PlaylistManager {
    store: Arc<dyn LibraryStore>,
    events: EventBus,
    playlists: RwLock<Vec<Playlist>>,
}

impl PlaylistManager {
    /// Load every stored playlist.
    pub async fn load(store: Arc<dyn LibraryStore>, events: EventBus) -> Result<Self> {
        let playlists = store.get_all_playlists().await?;
        info!(count = playlists.len(), "Playlists loaded");

        Ok(Self {
            store,
            events,
            playlists: RwLock::new(playlists),
        })
    }

    /// Stored playlists in creation order. The "liked" playlist is not included.
    pub fn list(&self) -> Vec<Playlist> {
        self.playlists.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Playlist> {
        self.playlists.read().iter().find(|p| p.id == id).cloned()
    }

    /// Create an empty playlist.
    pub async fn create(&self, name: &str) -> Result<Playlist> {
        let playlist = Playlist::new(name);
        playlist
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "name".to_string(),
                message,
            })?;

        self.store.put_playlist(&playlist).await?;
        self.playlists.write().push(playlist.clone());

        info!(playlist_id = %playlist.id, "Playlist created");
        self.emit(LibraryEvent::PlaylistCreated {
            playlist_id: playlist.id.clone(),
            name: playlist.name.clone(),
        });
        Ok(playlist)
    }

    /// Append a song reference. Returns `false` if it was already present.
    pub async fn add_song(&self, playlist_id: &str, song_id: &str) -> Result<bool> {
        let changed = self
            .modify(playlist_id, "song_added", |playlist| {
                if playlist.contains(song_id) {
                    return Ok(false);
                }
                playlist.song_ids.push(song_id.to_string());
                Ok(true)
            })
            .await?;
        Ok(changed.is_some())
    }

    /// Remove a song reference. Returns `false` if it was not present.
    pub async fn remove_song(&self, playlist_id: &str, song_id: &str) -> Result<bool> {
        let changed = self
            .modify(playlist_id, "song_removed", |playlist| {
                let before = playlist.song_ids.len();
                playlist.song_ids.retain(|id| id != song_id);
                Ok(playlist.song_ids.len() != before)
            })
            .await?;
        Ok(changed.is_some())
    }

    pub async fn rename(&self, playlist_id: &str, name: &str) -> Result<Playlist> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "name".to_string(),
                message: "Playlist name cannot be empty".to_string(),
            });
        }

        self.modify_or_current(playlist_id, "renamed", |playlist| {
            if playlist.name == name {
                return Ok(false);
            }
            playlist.name = name.to_string();
            Ok(true)
        })
        .await
    }

    pub async fn describe(&self, playlist_id: &str, description: Option<String>) -> Result<Playlist> {
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        self.modify_or_current(playlist_id, "description", |playlist| {
            if playlist.description == description {
                return Ok(false);
            }
            playlist.description = description;
            Ok(true)
        })
        .await
    }

    /// `Some` installs a custom cover and turns off first-song derivation;
    /// `None` clears it and derives the cover from the first song.
    pub async fn set_cover(&self, playlist_id: &str, cover: Option<Bytes>) -> Result<Playlist> {
        self.modify_or_current(playlist_id, "cover", |playlist| {
            playlist.use_first_song_cover = cover.is_none();
            playlist.cover = cover;
            Ok(true)
        })
        .await
    }

    pub async fn set_use_first_song_cover(&self, playlist_id: &str, enabled: bool) -> Result<Playlist> {
        self.modify_or_current(playlist_id, "cover", |playlist| {
            if playlist.use_first_song_cover == enabled {
                return Ok(false);
            }
            playlist.use_first_song_cover = enabled;
            Ok(true)
        })
        .await
    }

    pub async fn delete(&self, playlist_id: &str) -> Result<()> {
        ensure_mutable(playlist_id)?;
        if self.get(playlist_id).is_none() {
            return Err(LibraryError::not_found("Playlist", playlist_id));
        }

        self.store.delete_playlist(playlist_id).await?;
        self.playlists.write().retain(|p| p.id != playlist_id);

        info!(playlist_id, "Playlist deleted");
        self.emit(LibraryEvent::PlaylistDeleted {
            playlist_id: playlist_id.to_string(),
        });
        Ok(())
    }

    /// Remove `song_id` from every playlist that references it, persisting each.
    ///
    /// Returns the number of playlists changed. Stops at the first store failure;
    /// playlists already written stay pruned.
    pub async fn prune_song(&self, song_id: &str) -> Result<usize> {
        let affected: Vec<String> = self
            .playlists
            .read()
            .iter()
            .filter(|p| p.contains(song_id))
            .map(|p| p.id.clone())
            .collect();

        let mut pruned = 0;
        for playlist_id in affected {
            if self.remove_song(&playlist_id, song_id).await? {
                pruned += 1;
            }
        }

        debug!(song_id, pruned, "Pruned song from playlists");
        Ok(pruned)
    }

    /// Resolve a playlist (or the "liked" playlist) against the library.
    pub fn resolve(&self, playlist_id: &str, library: &Library) -> Result<ResolvedPlaylist> {
        if playlist_id == LIKED_PLAYLIST_ID {
            let songs = library.liked_songs();
            return Ok(ResolvedPlaylist {
                id: LIKED_PLAYLIST_ID.to_string(),
                name: LIKED_PLAYLIST_NAME.to_string(),
                description: None,
                cover: first_cover(&songs),
                songs,
                is_virtual: true,
            });
        }

        let playlist = self
            .get(playlist_id)
            .ok_or_else(|| LibraryError::not_found("Playlist", playlist_id))?;

        let songs: Vec<Song> = playlist
            .song_ids
            .iter()
            .filter_map(|id| {
                let song = library.get(id);
                if song.is_none() {
                    debug!(playlist_id, song_id = %id, "Skipping dangling song reference");
                }
                song
            })
            .collect();

        let cover = if playlist.use_first_song_cover {
            first_cover(&songs)
        } else {
            playlist.cover.clone()
        };

        Ok(ResolvedPlaylist {
            id: playlist.id,
            name: playlist.name,
            description: playlist.description,
            cover,
            songs,
            is_virtual: false,
        })
    }

    async fn modify_or_current<F>(&self, playlist_id: &str, change_type: &str, change: F) -> Result<Playlist>
    where
        F: FnOnce(&mut Playlist) -> Result<bool>,
    {
        match self.modify(playlist_id, change_type, change).await? {
            Some(playlist) => Ok(playlist),
            None => self
                .get(playlist_id)
                .ok_or_else(|| LibraryError::not_found("Playlist", playlist_id)),
        }
    }

    /// Apply `change` to a copy, persist, then commit in memory.
    ///
    /// Returns `None` when `change` reports nothing changed.
    async fn modify<F>(&self, playlist_id: &str, change_type: &str, change: F) -> Result<Option<Playlist>>
    where
        F: FnOnce(&mut Playlist) -> Result<bool>,
    {
        ensure_mutable(playlist_id)?;
        let mut playlist = self
            .get(playlist_id)
            .ok_or_else(|| LibraryError::not_found("Playlist", playlist_id))?;

        if !change(&mut playlist)? {
            return Ok(None);
        }

        self.store.put_playlist(&playlist).await?;

        {
            let mut playlists = self.playlists.write();
            if let Some(slot) = playlists.iter_mut().find(|p| p.id == playlist_id) {
                *slot = playlist.clone();
            }
        }

        self.emit(LibraryEvent::PlaylistUpdated {
            playlist_id: playlist_id.to_string(),
            change_type: change_type.to_string(),
        });
        Ok(Some(playlist))
    }

    fn emit(&self, event: LibraryEvent) {
        self.events.emit(CoreEvent::Library(event)).ok();
    }
}

fn ensure_mutable(playlist_id: &str) -> Result<()> {
    if playlist_id == LIKED_PLAYLIST_ID {
        return Err(LibraryError::ReadOnlyPlaylist(playlist_id.to_string()));
    }
    Ok(())
}

fn first_cover(songs: &[Song]) -> Option<Bytes> {
    songs.iter().find_map(|song| song.cover.clone())
}
