//! Domain models for the music library
//!
//! The library is the single owner of [`Song`] records. Playlists hold only
//! ordered song-id references that are resolved by lookup.

use crate::locator::PlayableLocator;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Identifier of the computed "liked" playlist. It has no backing record.
pub const LIKED_PLAYLIST_ID: &str = "liked";

/// Display name of the computed "liked" playlist.
pub const LIKED_PLAYLIST_NAME: &str = "Liked Songs";

/// Current wall clock in unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// Song
// =============================================================================

/// A song in the library together with its audio payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// Unique, immutable identifier
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Duration in seconds. Authoritative once the transport has loaded the song.
    pub duration: f64,
    /// Encoded audio payload
    pub audio: Bytes,
    /// Optional cover art payload
    pub cover: Option<Bytes>,
    /// LRC or plain-text lyrics
    pub lyrics: Option<String>,
    pub liked: bool,
    /// Import time in unix milliseconds
    pub created_at: i64,
    /// Process-local playable locator. Never persisted.
    #[serde(skip)]
    pub locator: Option<PlayableLocator>,
}

impl Song {
    /// Validate song data
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Song id cannot be empty".to_string());
        }

        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(format!("Invalid duration: {}", self.duration));
        }

        Ok(())
    }

    /// Copy of this song without its locator, as written to storage.
    pub fn without_locator(&self) -> Song {
        Song {
            locator: None,
            ..self.clone()
        }
    }

    /// Case-insensitive match against title, artist and album.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        [&self.title, &self.artist, &self.album]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Input for importing a song. Metadata extraction happens outside the core.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: f64,
    pub audio: Bytes,
    pub cover: Option<Bytes>,
    pub lyrics: Option<String>,
}

impl NewSong {
    pub fn new(title: impl Into<String>, audio: impl Into<Bytes>) -> Self {
        Self {
            title: title.into(),
            audio: audio.into(),
            ..Self::default()
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_cover(mut self, cover: impl Into<Bytes>) -> Self {
        self.cover = Some(cover.into());
        self
    }

    pub fn with_lyrics(mut self, lyrics: impl Into<String>) -> Self {
        self.lyrics = Some(lyrics.into());
        self
    }

    pub(crate) fn into_song(self) -> Song {
        Song {
            id: Uuid::new_v4().to_string(),
            title: self.title,
            artist: self.artist,
            album: self.album,
            duration: self.duration,
            audio: self.audio,
            cover: self.cover,
            lyrics: self.lyrics,
            liked: false,
            created_at: now_millis(),
            locator: None,
        }
    }
}

/// Library sort orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOption {
    Title,
    Artist,
    /// Newest first
    #[default]
    DateAdded,
}

// =============================================================================
// Playlist
// =============================================================================

/// User playlist: an ordered list of song-id references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Custom user cover
    pub cover: Option<Bytes>,
    /// Derive the cover from the first referenced song instead of `cover`
    pub use_first_song_cover: bool,
    /// Ordered song ids, no duplicates
    pub song_ids: Vec<String>,
    /// Creation time in unix milliseconds
    pub created_at: i64,
}

impl Playlist {
    /// Create a new, empty playlist
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into().trim().to_string(),
            description: None,
            cover: None,
            use_first_song_cover: true,
            song_ids: Vec::new(),
            created_at: now_millis(),
        }
    }

    /// Validate playlist data
    pub fn validate(&self) -> Result<(), String> {
        if self.id == LIKED_PLAYLIST_ID {
            return Err(format!("Playlist id '{}' is reserved", LIKED_PLAYLIST_ID));
        }

        if self.name.trim().is_empty() {
            return Err("Playlist name cannot be empty".to_string());
        }

        let mut seen = HashSet::with_capacity(self.song_ids.len());
        if let Some(duplicate) = self.song_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(format!("Duplicate song reference: {}", duplicate));
        }

        Ok(())
    }

    pub fn contains(&self, song_id: &str) -> bool {
        self.song_ids.iter().any(|id| id == song_id)
    }
}

/// A playlist resolved against the library, ready for display or playback.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlaylist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Effective cover after applying the first-song rule
    pub cover: Option<Bytes>,
    /// Songs in playlist order; dangling references are skipped
    pub songs: Vec<Song>,
    /// `true` for the computed "liked" playlist
    pub is_virtual: bool,
}
