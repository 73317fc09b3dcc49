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

//! Interfaces to the host application's data stores.
//!
//! The engine is platform neutral; each platform supplies these
//! collaborators. Every operation is independently transactional — the
//! engine never assumes a transaction spanning a whole import, which is
//! why item failures are scoped to single records.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure inside a collaborator store.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflicting record: {0}")]
    Conflict(String),

    #[error("Store backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A photo category as the host application stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    /// Stable key, lowercase with underscores, unique in the store.
    pub name: String,
    pub display_name: String,
    pub position: u32,
    pub color_hex: String,
    pub icon_ref: Option<String>,
    pub is_default: bool,
    /// Unix seconds.
    pub created_at: i64,
}

/// A photo record as the host application stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: i64,
    pub path: String,
    pub category_id: i64,
    pub name: String,
    pub is_from_bundled_assets: bool,
    /// Unix seconds.
    pub created_at: i64,
    pub file_size_bytes: u64,
    pub width: u32,
    pub height: u32,
    pub is_favorite: bool,
}

/// App settings with sensitive fields pre-sealed by the host's
/// encryption collaborator. The engine moves the blobs verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSettings {
    pub theme: Option<String>,
    pub pin_lock: Option<String>,
    pub pattern_lock: Option<String>,
    pub kid_safe_mode: Option<String>,
}

/// Which entity type a deletion-log record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Category,
    Photo,
}

/// One append-only record of an entity deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRecord {
    pub kind: EntityKind,
    pub entity_id: i64,
    /// Unix seconds.
    pub deleted_at: i64,
}

/// CRUD over the host's category table.
pub trait CategoryStore: Send + Sync {
    /// Insert a category, assigning and returning a fresh id.
    fn insert(&self, category: Category) -> StoreResult<i64>;

    /// Insert a category keeping the id it carries.
    fn insert_with_id(&self, category: Category) -> StoreResult<()>;

    fn update(&self, category: &Category) -> StoreResult<()>;

    fn delete(&self, id: i64) -> StoreResult<()>;

    /// Delete every category. Used only by replace imports, after all
    /// photos are gone.
    fn delete_all(&self) -> StoreResult<()>;

    fn get_all(&self) -> StoreResult<Vec<Category>>;

    fn get_by_id(&self, id: i64) -> StoreResult<Option<Category>>;

    fn get_by_name(&self, name: &str) -> StoreResult<Option<Category>>;

    fn count(&self) -> StoreResult<usize>;
}

/// CRUD over the host's photo table.
pub trait PhotoStore: Send + Sync {
    /// Insert a photo, assigning and returning a fresh id.
    fn insert(&self, photo: Photo) -> StoreResult<i64>;

    /// Insert a photo keeping the id it carries.
    fn insert_with_id(&self, photo: Photo) -> StoreResult<()>;

    fn update(&self, photo: &Photo) -> StoreResult<()>;

    fn delete(&self, id: i64) -> StoreResult<()>;

    /// Delete every photo. Used only by replace imports, before the
    /// categories they reference are cleared.
    fn delete_all(&self) -> StoreResult<()>;

    fn get_all(&self) -> StoreResult<Vec<Photo>>;

    fn get_by_id(&self, id: i64) -> StoreResult<Option<Photo>>;

    fn get_by_path(&self, path: &str) -> StoreResult<Option<Photo>>;

    fn count(&self) -> StoreResult<usize>;
}

/// Access to the binary photo files behind the metadata records.
pub trait MediaStore: Send + Sync {
    /// Does the underlying binary resource still exist?
    fn exists(&self, path: &str) -> bool;

    /// Copy a restored file into permanent photo storage and return its
    /// new path.
    fn import_file(&self, source: &Path, file_name: &str) -> StoreResult<PathBuf>;

    /// Produce thumbnail bytes for a photo, if the host can.
    ///
    /// `Ok(None)` means no thumbnail is available; that is not a failure.
    fn thumbnail(&self, photo: &Photo) -> StoreResult<Option<Vec<u8>>>;
}

/// Load and store the host's settings snapshot.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> StoreResult<AppSettings>;

    fn store(&self, settings: &AppSettings) -> StoreResult<()>;
}

/// Append-only log of entity deletions, consulted for delta backups.
pub trait DeletionLog: Send + Sync {
    fn deletions(&self) -> StoreResult<Vec<DeletionRecord>>;
}
