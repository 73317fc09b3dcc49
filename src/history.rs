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

//! Bounded, persisted history of export operations.
//!
//! The history answers two needs: a base backup to compute incremental
//! deltas against, and a user-facing list of past exports. It keeps the
//! most recent [HISTORY_CAPACITY] entries and drops the oldest beyond
//! that.

use std::fs::create_dir_all;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::container::CompressionLevel;
use crate::document::ContainerFormat;
use crate::errors::Result;
use crate::jsonio;

/// Most entries the history retains; the oldest are dropped first.
pub const HISTORY_CAPACITY: usize = 50;

/// One past export, successful or attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupHistoryEntry {
    /// Assigned by the store at append time, monotonically increasing.
    pub id: u64,
    /// Unix seconds at which the export ran.
    pub timestamp: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_size_bytes: u64,
    pub container_format: ContainerFormat,
    pub photos_count: usize,
    pub categories_count: usize,
    pub compression: CompressionLevel,
    pub success: bool,
}

/// Load-on-first-use, persist-on-mutation store of [BackupHistoryEntry].
///
/// The interior mutex makes appends atomic with respect to concurrent
/// reads of the list.
#[derive(Debug)]
pub struct BackupHistory {
    path: PathBuf,
    entries: Mutex<Option<Vec<BackupHistoryEntry>>>,
}

impl BackupHistory {
    /// Open a history backed by the given file. No I/O happens until
    /// the first read or append.
    pub fn open<P: Into<PathBuf>>(path: P) -> BackupHistory {
        BackupHistory {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    /// Append an entry, assigning it the next id and pruning the oldest
    /// entries beyond capacity. Returns the assigned id.
    pub fn append(&self, mut entry: BackupHistoryEntry) -> Result<u64> {
        let mut guard = self.entries.lock().unwrap();
        let entries = self.loaded(&mut guard);
        let id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        entry.id = id;
        entries.push(entry);
        if entries.len() > HISTORY_CAPACITY {
            let excess = entries.len() - HISTORY_CAPACITY;
            entries.drain(..excess);
        }
        if let Some(parent) = self.path.parent() {
            create_dir_all(parent)?;
        }
        jsonio::write_json(&self.path, entries)?;
        Ok(id)
    }

    /// All retained entries, most recent first.
    pub fn list(&self) -> Vec<BackupHistoryEntry> {
        let mut guard = self.entries.lock().unwrap();
        let mut entries = self.loaded(&mut guard).clone();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        entries
    }

    /// Look up one entry by id.
    pub fn get(&self, id: u64) -> Option<BackupHistoryEntry> {
        let mut guard = self.entries.lock().unwrap();
        self.loaded(&mut guard).iter().find(|e| e.id == id).cloned()
    }

    /// Load from disk on first use. A missing file is an empty history;
    /// an unreadable one degrades to empty rather than failing.
    fn loaded<'a>(
        &self,
        guard: &'a mut Option<Vec<BackupHistoryEntry>>,
    ) -> &'a mut Vec<BackupHistoryEntry> {
        guard.get_or_insert_with(|| {
            if !self.path.exists() {
                return Vec::new();
            }
            match jsonio::read_json(&self.path) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = ?self.path, ?err, "backup history unreadable, starting empty");
                    Vec::new()
                }
            }
        })
    }
}
