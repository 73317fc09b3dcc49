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

//! Compute which entities changed or were deleted since a base backup,
//! for differential exports.
//!
//! "Changed" means created after the base backup ran: creation time is
//! the only change signal the stores carry. An entity edited in place,
//! with its creation time unchanged, is not detected by this scheme.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::Stores;
use crate::errors::{Error, Result};
use crate::history::BackupHistory;
use crate::store::EntityKind;

/// The subset of entities a differential export should carry, computed
/// against a prior backup. Not persisted as primary state: it annotates
/// the export derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalBackupMetadata {
    pub base_backup_id: u64,
    /// Unix seconds of the base backup.
    pub base_backup_date: i64,
    pub changed_photo_ids: Vec<i64>,
    pub deleted_photo_ids: Vec<i64>,
    pub changed_category_ids: Vec<i64>,
    pub deleted_category_ids: Vec<i64>,
}

impl IncrementalBackupMetadata {
    pub fn is_empty(&self) -> bool {
        self.changed_photo_ids.is_empty()
            && self.deleted_photo_ids.is_empty()
            && self.changed_category_ids.is_empty()
            && self.deleted_category_ids.is_empty()
    }
}

/// Compute the delta since the history entry `base_backup_id`.
///
/// Fails with [Error::NoSuchBaseBackup] when the entry is gone from the
/// bounded history, and with [Error::NoChanges] when nothing changed —
/// a vacuous backup is not worth producing.
pub(crate) fn compute_delta(
    stores: &Stores,
    history: &BackupHistory,
    base_backup_id: u64,
) -> Result<IncrementalBackupMetadata> {
    let base = history
        .get(base_backup_id)
        .ok_or(Error::NoSuchBaseBackup {
            base_id: base_backup_id,
        })?;

    let changed_category_ids: Vec<i64> = stores
        .categories
        .get_all()?
        .iter()
        .filter(|c| c.created_at > base.timestamp)
        .map(|c| c.id)
        .sorted()
        .collect();
    let changed_photo_ids: Vec<i64> = stores
        .photos
        .get_all()?
        .iter()
        .filter(|p| p.created_at > base.timestamp)
        .map(|p| p.id)
        .sorted()
        .collect();

    let deletions = stores.deletions.deletions()?;
    let deleted_of = |kind: EntityKind| -> Vec<i64> {
        deletions
            .iter()
            .filter(|d| d.kind == kind && d.deleted_at > base.timestamp)
            .map(|d| d.entity_id)
            .sorted()
            .dedup()
            .collect()
    };
    let metadata = IncrementalBackupMetadata {
        base_backup_id,
        base_backup_date: base.timestamp,
        changed_photo_ids,
        deleted_photo_ids: deleted_of(EntityKind::Photo),
        changed_category_ids,
        deleted_category_ids: deleted_of(EntityKind::Category),
    };
    if metadata.is_empty() {
        return Err(Error::NoChanges);
    }
    debug!(
        base_backup_id,
        changed_photos = metadata.changed_photo_ids.len(),
        deleted_photos = metadata.deleted_photo_ids.len(),
        changed_categories = metadata.changed_category_ids.len(),
        deleted_categories = metadata.deleted_category_ids.len(),
        "computed incremental delta"
    );
    Ok(metadata)
}
