// Keepsake photo backup engine.
// Copyright 2024-2026 The Keepsake Authors.

// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

//! Keepsake backup engine.
//!
//! Serializes a photo vault's categories, photos, and settings into a
//! portable archive, and reconstructs vault state from such an archive
//! under either a merge or a replace strategy. The engine is platform
//! neutral: it talks to the host application only through the
//! collaborator traits in [`store`].

pub mod checksum;
pub mod container;
pub mod counters;
pub mod delta;
pub mod document;
mod engine;
pub mod errors;
pub mod export;
pub mod history;
pub mod import;
mod jsonio;
pub mod monitor;
mod oplock;
pub mod stats;
pub mod store;
pub mod test_fixtures;

pub use crate::container::CompressionLevel;
pub use crate::counters::Counter;
pub use crate::delta::IncrementalBackupMetadata;
pub use crate::document::{
    BackupCategory, BackupDocument, BackupPhoto, BackupSettings, ContainerFormat, ManifestEntry,
};
pub use crate::engine::{Engine, Stores};
pub use crate::errors::{Error, Result};
pub use crate::export::{ExportOptions, ExportOutcome, ExportPhase};
pub use crate::history::{BackupHistory, BackupHistoryEntry};
pub use crate::import::{ImportPhase, ImportStrategy};
pub use crate::monitor::{Monitor, Progress};
pub use crate::stats::ImportResult;
pub use crate::store::{
    AppSettings, Category, CategoryStore, DeletionLog, DeletionRecord, EntityKind, MediaStore,
    Photo, PhotoStore, SettingsStore, StoreError,
};

/// Current backup document format version, written into every export.
pub const FORMAT_VERSION: u32 = 2;

/// Oldest document format version this engine can still import.
pub const MIN_SUPPORTED_FORMAT_VERSION: u32 = 1;

/// Name of the manifest document inside a container, and of a
/// document-only (JSON) export.
pub static METADATA_FILENAME: &str = "metadata.json";

/// Container subdirectory holding archived photo files.
pub static PHOTOS_DIR: &str = "photos";

/// Container subdirectory holding archived thumbnail files.
pub static THUMBNAILS_DIR: &str = "thumbnails";

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the engine crate, recorded in exported documents.
pub fn version() -> &'static str {
    VERSION
}
