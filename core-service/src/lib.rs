//! Core service façade and bootstrap helpers.
//!
//! [`MuseCore`] wires the library store, playlist manager, playback engine and
//! lyrics synchronizer together. Hosts supply an
//! [`AudioTransport`](core_playback::AudioTransport) and a
//! [`CoreConfig`](core_runtime::config::CoreConfig); everything else is
//! built here.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # async fn example(transport: Arc<dyn core_playback::AudioTransport>) -> core_service::Result<()> {
//! use core_runtime::config::CoreConfig;
//! use core_service::MuseCore;
//!
//! let config = CoreConfig::builder().database_path("muse.db").build()?;
//! core_runtime::logging::init_logging(config.logging.clone())?;
//! let core = Arc::new(MuseCore::bootstrap(config, transport).await?);
//! let _lyrics = core.spawn_lyrics_follower();
//! core.engine().toggle().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
mod service;

pub use error::{CoreError, Result};
pub use service::MuseCore;
