//! Song fixtures shared by unit tests.

use bytes::Bytes;
use core_library::{LocatorRegistry, Song};

pub(crate) fn song(id: &str, duration: f64) -> Song {
    Song {
        id: id.to_string(),
        title: id.to_string(),
        artist: String::new(),
        album: String::new(),
        duration,
        audio: Bytes::new(),
        cover: None,
        lyrics: None,
        liked: false,
        created_at: 0,
        locator: None,
    }
}

/// A song carrying a live-looking locator, as the library hands them out.
pub(crate) fn playable(registry: &LocatorRegistry, id: &str, duration: f64) -> Song {
    let audio = Bytes::from(id.as_bytes().to_vec());
    Song {
        locator: Some(registry.issue(id, audio.clone())),
        audio,
        ..song(id, duration)
    }
}
