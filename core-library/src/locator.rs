//! Playable locators
//!
//! A locator is a process-local handle the transport uses to reach a song's
//! decoded audio. Locators are minted from the stored payload every time
//! songs are read, never persisted, and never reused across loads.
//!
//! The registry guarantees at most one live locator per song id: issuing a
//! new locator for a song releases the previous one, so stale handles from an
//! earlier load stop resolving.

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::trace;
use uuid::Uuid;

const LOCATOR_SCHEME: &str = "blob:muse/";

/// Opaque, process-local reference to a song's audio payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayableLocator(String);

impl PlayableLocator {
    fn generate() -> Self {
        Self(format!("{}{}", LOCATOR_SCHEME, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayableLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Default)]
struct RegistryState {
    by_song: HashMap<String, PlayableLocator>,
    payloads: HashMap<PlayableLocator, Bytes>,
}

/// Issues and tracks live [`PlayableLocator`]s.
#[derive(Default)]
pub struct LocatorRegistry {
    state: Mutex<RegistryState>,
}

impl LocatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh locator for `song_id`, releasing any previous one.
    pub fn issue(&self, song_id: &str, payload: Bytes) -> PlayableLocator {
        let locator = PlayableLocator::generate();
        let mut state = self.state.lock();

        if let Some(stale) = state.by_song.insert(song_id.to_string(), locator.clone()) {
            state.payloads.remove(&stale);
            trace!(song_id, locator = %stale, "Released stale locator");
        }
        state.payloads.insert(locator.clone(), payload);

        locator
    }

    /// Release the live locator for `song_id`. Returns `false` if none was live.
    pub fn release(&self, song_id: &str) -> bool {
        let mut state = self.state.lock();
        match state.by_song.remove(song_id) {
            Some(locator) => {
                state.payloads.remove(&locator);
                true
            }
            None => false,
        }
    }

    /// Audio payload behind a live locator.
    pub fn resolve(&self, locator: &PlayableLocator) -> Option<Bytes> {
        self.state.lock().payloads.get(locator).cloned()
    }

    pub fn is_live(&self, locator: &PlayableLocator) -> bool {
        self.state.lock().payloads.contains_key(locator)
    }

    /// The live locator currently issued for `song_id`, if any.
    pub fn current(&self, song_id: &str) -> Option<PlayableLocator> {
        self.state.lock().by_song.get(song_id).cloned()
    }

    /// Number of live locators.
    pub fn live_count(&self) -> usize {
        self.state.lock().by_song.len()
    }
}

impl fmt::Debug for LocatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocatorRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_resolve() {
        let registry = LocatorRegistry::new();
        let locator = registry.issue("song-1", Bytes::from_static(b"abc"));

        assert!(locator.as_str().starts_with("blob:muse/"));
        assert_eq!(registry.resolve(&locator), Some(Bytes::from_static(b"abc")));
        assert_eq!(registry.current("song-1"), Some(locator));
    }

    #[test]
    fn reissue_releases_previous_locator() {
        let registry = LocatorRegistry::new();
        let first = registry.issue("song-1", Bytes::from_static(b"abc"));
        let second = registry.issue("song-1", Bytes::from_static(b"abc"));

        assert_ne!(first, second);
        assert!(!registry.is_live(&first));
        assert!(registry.is_live(&second));
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn release_drops_payload() {
        let registry = LocatorRegistry::new();
        let locator = registry.issue("song-1", Bytes::from_static(b"abc"));

        assert!(registry.release("song-1"));
        assert!(!registry.release("song-1"));
        assert_eq!(registry.resolve(&locator), None);
        assert_eq!(registry.live_count(), 0);
    }
}
