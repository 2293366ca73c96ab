//! # Lyrics Module
//!
//! Time-synchronized lyric display.
//!
//! ## Overview
//!
//! - [`lrc`]: LRC parsing, timed/untimed detection and active-line selection
//! - [`sync`]: the [`LyricsSynchronizer`] and a task that follows playback
//!   events on the [`EventBus`](core_runtime::events::EventBus)

pub mod error;
pub mod lrc;
pub mod sync;

pub use error::{LyricsError, Result};
pub use lrc::{active_line_index, is_timed, parse_lrc, LyricLine, Lyrics};
pub use sync::{spawn_lyrics_follower, ActiveLineChange, LyricsSource, LyricsSynchronizer};
