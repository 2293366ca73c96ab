//! # Library Management Module
//!
//! Owns the music library and its persistence.
//!
//! ## Overview
//!
//! This module manages:
//! - Song and playlist models, including the computed "liked" playlist
//! - Process-local playable locators for stored audio payloads
//! - The [`LibraryStore`](repositories::LibraryStore) contract with SQLite
//!   and in-memory implementations
//! - The [`Library`](library::Library) service (import, likes, lyrics,
//!   duration correction, search, sorting)
//! - The [`PlaylistManager`](playlists::PlaylistManager)

pub mod db;
pub mod error;
pub mod library;
pub mod locator;
pub mod models;
pub mod playlists;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use library::Library;
pub use locator::{LocatorRegistry, PlayableLocator};
pub use models::{
    NewSong, Playlist, ResolvedPlaylist, Song, SortOption, LIKED_PLAYLIST_ID, LIKED_PLAYLIST_NAME,
};
pub use playlists::PlaylistManager;
pub use repositories::{InMemoryLibraryStore, LibraryStore, SqliteLibraryStore};
