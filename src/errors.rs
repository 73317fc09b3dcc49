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

//! Errors for backup and restore operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Fatal failures from export, import, delta, and history operations.
///
/// A single category or photo failing during an import is not an
/// `Error`: item-scoped problems accumulate in the operation's result
/// value and never abort the surrounding loop.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("Not a backup archive: {path:?}")]
    NotAnArchive { path: PathBuf },

    #[error("Archive contains no metadata document")]
    MissingMetadata,

    #[error("Unsupported backup format version: {version}")]
    UnsupportedVersion { version: u32 },

    #[error("Archive entry name escapes the extraction directory: {name:?}")]
    UnsafeEntryName { name: String },

    #[error("Another backup or restore operation is already in flight")]
    OperationInFlight,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Failed to clear existing data before replace: {source}")]
    ClearFailed { source: StoreError },

    #[error("No backup history entry with id {base_id}")]
    NoSuchBaseBackup { base_id: u64 },

    #[error("No changes since the base backup")]
    NoChanges,

    #[error("Failed to write container to {path:?}: {source}")]
    ContainerWrite {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Container error: {source}")]
    Container {
        #[from]
        source: zip::result::ZipError,
    },

    #[error("JSON serialization error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
