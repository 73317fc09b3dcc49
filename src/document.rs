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

//! The backup manifest document and its codec.
//!
//! Every export writes exactly one document, either standalone (JSON
//! exports) or at a well-known entry inside the container. Decoding
//! tolerates unknown fields so newer documents still open in older
//! engines, and older documents missing newer fields decode with
//! defaults.

use serde::{Deserialize, Serialize};

use crate::delta::IncrementalBackupMetadata;
use crate::errors::{Error, Result};
use crate::{FORMAT_VERSION, MIN_SUPPORTED_FORMAT_VERSION};

/// Fallback category color when a document predates color support.
pub static DEFAULT_COLOR_HEX: &str = "#9E9E9E";

/// Physical shape of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    /// A standalone metadata document with no archived files.
    Json,
    /// A compressed container holding the document plus photo files.
    Zip,
}

/// The manifest document at the heart of every backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDocument {
    pub format_version: u32,

    /// Unix seconds at which the export ran.
    pub exported_at: i64,

    /// Version of the engine that wrote this document.
    pub app_version: String,

    pub container_format: ContainerFormat,

    #[serde(default)]
    pub categories: Vec<BackupCategory>,

    #[serde(default)]
    pub photos: Vec<BackupPhoto>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<BackupSettings>,

    /// Empty for JSON exports: there are no archived files to describe.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_manifest: Vec<ManifestEntry>,

    /// Present only on differential exports derived from a prior backup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental: Option<IncrementalBackupMetadata>,
}

impl BackupDocument {
    /// Find the category carrying `id` within this document.
    pub fn category_by_id(&self, id: i64) -> Option<&BackupCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Find this photo's manifest entry, if the export archived its file.
    pub fn manifest_entry_for(&self, photo_id: i64) -> Option<&ManifestEntry> {
        self.file_manifest.iter().find(|e| e.photo_id == photo_id)
    }
}

/// One category as recorded in a backup document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupCategory {
    pub id: i64,

    /// Stable key, lowercase with underscores; unique within a document.
    /// This is the natural key a merge import resolves against, since
    /// numeric ids are not portable across stores.
    pub name: String,

    pub display_name: String,

    #[serde(default)]
    pub position: u32,

    #[serde(default = "default_color_hex")]
    pub color_hex: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_ref: Option<String>,

    #[serde(default)]
    pub is_default: bool,

    /// Unix seconds.
    #[serde(default)]
    pub created_at: i64,
}

fn default_color_hex() -> String {
    DEFAULT_COLOR_HEX.to_string()
}

/// One photo as recorded in a backup document.
///
/// `category_id` references a [BackupCategory] in the same document;
/// that is validated at import, not at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPhoto {
    pub id: i64,

    /// Source path on the exporting device.
    pub path: String,

    pub category_id: i64,

    pub name: String,

    /// Bundled-asset photos ship with the app and have no archived file.
    #[serde(default)]
    pub is_from_bundled_assets: bool,

    /// Unix seconds.
    #[serde(default)]
    pub created_at: i64,

    #[serde(default)]
    pub file_size_bytes: u64,

    #[serde(default)]
    pub width: u32,

    #[serde(default)]
    pub height: u32,

    #[serde(default)]
    pub is_favorite: bool,
}

/// App settings snapshot carried in a backup document.
///
/// The lock fields are opaque blobs sealed by the host's encryption
/// collaborator; the engine only moves them around.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_lock: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_lock: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid_safe_mode: Option<String>,
}

/// Links one photo's metadata record to its archived file and digest.
///
/// Exists only for container exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub photo_id: i64,

    /// Where the file lived on the exporting device.
    pub original_path: String,

    /// Entry path inside the container, e.g. `photos/7_cat.jpg`.
    pub container_entry_name: String,

    pub file_name: String,

    pub file_size_bytes: u64,

    /// Hex BLAKE2b-256 digest of the archived file content.
    pub checksum: String,
}

/// Serialize a document to bytes.
pub fn encode(document: &BackupDocument) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(document)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Deserialize a document from bytes.
///
/// Fails only on structurally invalid input; unknown fields are ignored.
pub fn decode(bytes: &[u8]) -> Result<BackupDocument> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Check that this engine can import the document.
pub fn validate_version(document: &BackupDocument) -> Result<()> {
    let version = document.format_version;
    if !(MIN_SUPPORTED_FORMAT_VERSION..=FORMAT_VERSION).contains(&version) {
        return Err(Error::UnsupportedVersion { version });
    }
    Ok(())
}
