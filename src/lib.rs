//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates (`core-service`, `core-lyrics`). Host applications can depend on
//! `muse-workspace` and enable the documented features without wiring each
//! crate individually.

#[cfg(feature = "service")]
pub use core_service as service;

#[cfg(feature = "lyrics")]
pub use core_lyrics as lyrics;
