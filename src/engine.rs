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

//! The engine ties the pipelines to one set of collaborators and holds
//! the single in-flight-operation lock over them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::delta::{self, IncrementalBackupMetadata};
use crate::errors::Result;
use crate::export::{self, ExportOptions, ExportOutcome};
use crate::history::BackupHistory;
use crate::import::{self, ImportStrategy};
use crate::monitor::Monitor;
use crate::oplock::OperationLock;
use crate::stats::ImportResult;
use crate::store::{CategoryStore, DeletionLog, MediaStore, PhotoStore, SettingsStore};

/// The collaborator stores one engine operates against.
#[derive(Clone)]
pub struct Stores {
    pub categories: Arc<dyn CategoryStore>,
    pub photos: Arc<dyn PhotoStore>,
    pub media: Arc<dyn MediaStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub deletions: Arc<dyn DeletionLog>,
}

/// Backup engine over one set of collaborator stores.
///
/// At most one export or import runs at a time; a second call while one
/// is in flight fails with [Error::OperationInFlight](crate::Error::OperationInFlight)
/// rather than racing it.
pub struct Engine {
    stores: Stores,
    history: BackupHistory,
    lock: OperationLock,
}

impl Engine {
    /// Build an engine whose backup history persists at `history_path`.
    pub fn new<P: Into<PathBuf>>(stores: Stores, history_path: P) -> Engine {
        Engine {
            stores,
            history: BackupHistory::open(history_path),
            lock: OperationLock::new(),
        }
    }

    /// Export vault data into an archive under `destination`.
    ///
    /// Returns the archive path and statistics; appends a history entry
    /// for the attempt whether or not it succeeds.
    pub fn export(
        &self,
        destination: &Path,
        options: &ExportOptions,
        monitor: Arc<dyn Monitor>,
    ) -> Result<ExportOutcome> {
        let _guard = self.lock.acquire()?;
        export::export(&self.stores, &self.history, destination, options, monitor)
    }

    /// Reconstruct vault state from an archive.
    pub fn import(
        &self,
        archive_path: &Path,
        strategy: ImportStrategy,
        monitor: Arc<dyn Monitor>,
    ) -> Result<ImportResult> {
        let _guard = self.lock.acquire()?;
        import::import(&self.stores, archive_path, strategy, monitor)
    }

    /// Compute the set of entities changed or deleted since a prior
    /// backup, for a differential export.
    pub fn compute_delta(&self, base_backup_id: u64) -> Result<IncrementalBackupMetadata> {
        delta::compute_delta(&self.stores, &self.history, base_backup_id)
    }

    pub fn history(&self) -> &BackupHistory {
        &self.history
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }
}
