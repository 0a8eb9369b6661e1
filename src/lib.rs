//! Bible Annotations Library
//!
//! Core of a Bible reader's collaborative annotations: resolving text
//! selections into verse offsets, rendering overlapping highlights, caching
//! notes and highlights per chapter, and syncing them with the service.
//!
//! # Modules
//!
//! - `anchoring`: Selection to character offsets
//! - `highlights`: Render plans over highlighted verse text
//! - `annotations`: Notes, highlights, bookmarks and the session store
//! - `sync`: Service transport and the sync client
//! - `html`: Markup output and markup-based measurement

pub mod anchoring;
pub mod annotations;
pub mod config;
pub mod error;
pub mod highlights;
pub mod html;
pub mod sync;

pub use error::{ConfigError, OffsetError, Result, SyncError};
