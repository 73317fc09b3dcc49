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

//! Reconstruct vault state from an archive.
//!
//! The import runs as a state machine: validate the container, extract
//! to a temporary workspace, parse and version-check the document,
//! optionally clear existing data, then import categories and photos
//! sequentially. Only an invalid archive, an unparsable or unsupported
//! document, or a failed replace-clear abort the whole operation; every
//! later failure is scoped to a single item. Category import fully
//! completes before photo import begins, because photo category
//! resolution depends on the final category ids.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::checksum;
use crate::container;
use crate::counters::Counter;
use crate::document::{self, BackupDocument, ContainerFormat};
use crate::engine::Stores;
use crate::errors::{Error, Result};
use crate::monitor::{Monitor, Progress};
use crate::stats::ImportResult;
use crate::store::{AppSettings, Category, Photo};
use crate::METADATA_FILENAME;

/// How an import treats data already in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStrategy {
    /// Preserve existing data: remap ids, update categories in place by
    /// name, skip duplicate and missing-source photos with a warning.
    Merge,
    /// Purge all existing categories and photos first, then insert at
    /// the document's original ids.
    Replace,
}

/// States of the import pipeline, reported through the progress stream.
///
/// `RestoringFiles` is interleaved with `ImportingPhotos` rather than a
/// separate pass; it is a distinct state only for progress reporting.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Validating,
    Extracting,
    ParsingMetadata,
    Clearing,
    ImportingCategories,
    ImportingPhotos,
    RestoringFiles,
    Completed,
    Failed,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportPhase::Validating => write!(f, "Validate archive"),
            ImportPhase::Extracting => write!(f, "Extract archive"),
            ImportPhase::ParsingMetadata => write!(f, "Parse metadata"),
            ImportPhase::Clearing => write!(f, "Clear existing data"),
            ImportPhase::ImportingCategories => write!(f, "Import categories"),
            ImportPhase::ImportingPhotos => write!(f, "Import photos"),
            ImportPhase::RestoringFiles => write!(f, "Restore files"),
            ImportPhase::Completed => write!(f, "Completed"),
            ImportPhase::Failed => write!(f, "Failed"),
        }
    }
}

pub(crate) fn import(
    stores: &Stores,
    archive_path: &Path,
    strategy: ImportStrategy,
    monitor: Arc<dyn Monitor>,
) -> Result<ImportResult> {
    match run_import(stores, archive_path, strategy, monitor.as_ref()) {
        Ok(result) => Ok(result),
        Err(err) => {
            monitor.progress(Progress::Import {
                phase: ImportPhase::Failed,
                processed_items: 0,
                total_items: 0,
            });
            Err(err)
        }
    }
}

fn run_import(
    stores: &Stores,
    archive_path: &Path,
    strategy: ImportStrategy,
    monitor: &dyn Monitor,
) -> Result<ImportResult> {
    info!(?archive_path, ?strategy, "import starting");

    monitor.progress(Progress::Import {
        phase: ImportPhase::Validating,
        processed_items: 0,
        total_items: 0,
    });
    let format = sniff_format(archive_path)?;
    if format == ContainerFormat::Zip {
        container::validate_structure(archive_path)?;
    }

    // The workspace is exclusively owned by this operation and dropped
    // on every exit path, including cancellation and fatal failure.
    let workspace: Option<TempDir> = match format {
        ContainerFormat::Zip => {
            monitor.progress(Progress::Import {
                phase: ImportPhase::Extracting,
                processed_items: 0,
                total_items: 0,
            });
            let workspace = tempfile::Builder::new().prefix("keepsake-import-").tempdir()?;
            container::extract_container(archive_path, workspace.path())?;
            Some(workspace)
        }
        ContainerFormat::Json => None,
    };

    monitor.progress(Progress::Import {
        phase: ImportPhase::ParsingMetadata,
        processed_items: 0,
        total_items: 0,
    });
    let document_bytes = match &workspace {
        Some(workspace) => {
            let metadata_path = workspace.path().join(METADATA_FILENAME);
            if !metadata_path.exists() {
                return Err(Error::MissingMetadata);
            }
            fs::read(metadata_path)?
        }
        None => fs::read(archive_path)?,
    };
    let doc = document::decode(&document_bytes)?;
    document::validate_version(&doc)?;
    let total_items = doc.categories.len() + doc.photos.len();
    debug!(
        format_version = doc.format_version,
        categories = doc.categories.len(),
        photos = doc.photos.len(),
        total_items,
        "document parsed"
    );

    // From here on, nothing below aborts the operation except a failed
    // replace-clear, which risks a half-cleared store.
    if strategy == ImportStrategy::Replace {
        monitor.progress(Progress::Import {
            phase: ImportPhase::Clearing,
            processed_items: 0,
            total_items,
        });
        // Photos first: they hold the category foreign key.
        stores
            .photos
            .delete_all()
            .and_then(|()| stores.categories.delete_all())
            .map_err(|source| Error::ClearFailed { source })?;
    }

    let mut result = ImportResult::default();

    let id_map = import_categories(stores, &doc, strategy, monitor, &mut result, total_items)?;
    import_photos(
        stores,
        &doc,
        strategy,
        workspace.as_ref().map(|w| w.path()),
        &id_map,
        monitor,
        &mut result,
        total_items,
    )?;

    if let Some(settings) = &doc.settings {
        apply_settings(stores, settings, strategy, &mut result);
    }

    monitor.set_counter(Counter::ItemsFailed, result.failed);
    monitor.progress(Progress::Import {
        phase: ImportPhase::Completed,
        processed_items: result.processed(),
        total_items,
    });
    monitor.progress(Progress::Finished {
        errors: result.errors.clone(),
        warnings: result.warnings.clone(),
    });
    info!(
        imported = result.imported,
        skipped = result.skipped,
        failed = result.failed,
        files_restored = result.files_restored,
        "import complete"
    );
    Ok(result)
}

/// A container starts with the zip magic; anything else is treated as a
/// standalone metadata document.
fn sniff_format(archive_path: &Path) -> Result<ContainerFormat> {
    let mut magic = [0u8; 2];
    let mut file = fs::File::open(archive_path)?;
    file.read_exact(&mut magic).map_err(|_| Error::NotAnArchive {
        path: archive_path.to_path_buf(),
    })?;
    if &magic == b"PK" {
        Ok(ContainerFormat::Zip)
    } else {
        Ok(ContainerFormat::Json)
    }
}

/// Import every category, returning the map from document category id
/// to the id it now has in the store.
///
/// A merge resolves categories by `name`, the stable natural key:
/// numeric ids are not portable across stores.
fn import_categories(
    stores: &Stores,
    doc: &BackupDocument,
    strategy: ImportStrategy,
    monitor: &dyn Monitor,
    result: &mut ImportResult,
    total_items: usize,
) -> Result<HashMap<i64, i64>> {
    let mut id_map = HashMap::new();
    for backup_category in &doc.categories {
        if monitor.should_cancel() {
            return Err(Error::Cancelled);
        }
        match strategy {
            ImportStrategy::Merge => {
                match stores.categories.get_by_name(&backup_category.name) {
                    Ok(Some(existing)) => {
                        let updated = Category {
                            id: existing.id,
                            created_at: existing.created_at,
                            ..category_record(backup_category)
                        };
                        match stores.categories.update(&updated) {
                            Ok(()) => {
                                id_map.insert(backup_category.id, existing.id);
                                result.imported += 1;
                                result.record_warning(format!(
                                    "Updated existing category '{}'",
                                    backup_category.name
                                ));
                                monitor.count(Counter::CategoriesUpdated, 1);
                            }
                            Err(err) => {
                                result.record_error(format!(
                                    "Category '{}' failed to update: {err}",
                                    backup_category.name
                                ));
                            }
                        }
                    }
                    Ok(None) => match stores.categories.insert(category_record(backup_category)) {
                        Ok(new_id) => {
                            id_map.insert(backup_category.id, new_id);
                            result.imported += 1;
                            monitor.count(Counter::CategoriesImported, 1);
                        }
                        Err(err) => {
                            result.record_error(format!(
                                "Category '{}' failed to import: {err}",
                                backup_category.name
                            ));
                        }
                    },
                    Err(err) => {
                        result.record_error(format!(
                            "Category '{}' failed to import: {err}",
                            backup_category.name
                        ));
                    }
                }
            }
            ImportStrategy::Replace => {
                match stores.categories.insert_with_id(category_record(backup_category)) {
                    Ok(()) => {
                        id_map.insert(backup_category.id, backup_category.id);
                        result.imported += 1;
                        monitor.count(Counter::CategoriesImported, 1);
                    }
                    Err(err) => {
                        result.record_error(format!(
                            "Category '{}' failed to import: {err}",
                            backup_category.name
                        ));
                    }
                }
            }
        }
        monitor.progress(Progress::Import {
            phase: ImportPhase::ImportingCategories,
            processed_items: result.processed(),
            total_items,
        });
    }
    Ok(id_map)
}

#[allow(clippy::too_many_arguments)]
fn import_photos(
    stores: &Stores,
    doc: &BackupDocument,
    strategy: ImportStrategy,
    workspace: Option<&Path>,
    id_map: &HashMap<i64, i64>,
    monitor: &dyn Monitor,
    result: &mut ImportResult,
    total_items: usize,
) -> Result<()> {
    // Duplicate detection compares source paths of photos already in
    // the store and those imported earlier in this run.
    let mut existing_paths: HashSet<String> = match strategy {
        ImportStrategy::Merge => match stores.photos.get_all() {
            Ok(photos) => photos.into_iter().map(|p| p.path).collect(),
            Err(err) => {
                result.record_warning(format!(
                    "Existing photos unreadable, duplicate detection degraded: {err}"
                ));
                HashSet::new()
            }
        },
        ImportStrategy::Replace => HashSet::new(),
    };

    for backup_photo in &doc.photos {
        if monitor.should_cancel() {
            return Err(Error::Cancelled);
        }
        let progress = |phase, result: &ImportResult| {
            monitor.progress(Progress::Import {
                phase,
                processed_items: result.processed(),
                total_items,
            });
        };
        let manifest_entry = doc.manifest_entry_for(backup_photo.id);

        // Photos without an archived file must still have a live source.
        if manifest_entry.is_none()
            && !backup_photo.is_from_bundled_assets
            && !stores.media.exists(&backup_photo.path)
        {
            result.record_warning(format!(
                "Source for photo '{}' no longer exists, skipped",
                backup_photo.name
            ));
            result.skipped += 1;
            monitor.count(Counter::PhotosSkipped, 1);
            progress(ImportPhase::ImportingPhotos, result);
            continue;
        }

        if strategy == ImportStrategy::Merge && existing_paths.contains(&backup_photo.path) {
            result.record_warning(format!(
                "Duplicate photo '{}' at {}, skipped",
                backup_photo.name, backup_photo.path
            ));
            result.skipped += 1;
            monitor.count(Counter::PhotosSkipped, 1);
            progress(ImportPhase::ImportingPhotos, result);
            continue;
        }

        // Resolve the effective category id. A merge re-resolves through
        // the document category's name, since the merge may have mapped
        // it onto a different store id.
        let category_id = match doc
            .category_by_id(backup_photo.category_id)
            .and_then(|c| id_map.get(&c.id))
        {
            Some(id) => *id,
            None => {
                result.record_error(format!(
                    "Photo '{}' references missing category {}",
                    backup_photo.name, backup_photo.category_id
                ));
                progress(ImportPhase::ImportingPhotos, result);
                continue;
            }
        };

        // Restore the archived file, if the manifest has one. Failure
        // degrades to "imported metadata, file not restored".
        let restored_path = match (manifest_entry, workspace) {
            (Some(entry), Some(workspace)) => {
                progress(ImportPhase::RestoringFiles, result);
                restore_file(stores, entry, workspace, monitor, result)
            }
            _ => None,
        };
        let file_restored = restored_path.is_some();

        let path = restored_path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| backup_photo.path.clone());
        if strategy == ImportStrategy::Merge && existing_paths.contains(&path) {
            result.record_warning(format!(
                "Duplicate photo '{}' at {path}, skipped",
                backup_photo.name
            ));
            result.skipped += 1;
            monitor.count(Counter::PhotosSkipped, 1);
            progress(ImportPhase::ImportingPhotos, result);
            continue;
        }

        let record = Photo {
            category_id,
            path: path.clone(),
            ..photo_record(backup_photo)
        };
        let inserted = match strategy {
            ImportStrategy::Merge => stores.photos.insert(record).map(|_| ()),
            ImportStrategy::Replace => stores.photos.insert_with_id(record),
        };
        match inserted {
            Ok(()) => {
                result.imported += 1;
                monitor.count(Counter::PhotosImported, 1);
                if file_restored {
                    result.files_restored += 1;
                    monitor.count(Counter::FilesRestored, 1);
                }
                existing_paths.insert(backup_photo.path.clone());
                existing_paths.insert(path);
            }
            Err(err) => {
                result.record_error(format!(
                    "Photo '{}' failed to import: {err}",
                    backup_photo.name
                ));
            }
        }
        progress(ImportPhase::ImportingPhotos, result);
    }
    Ok(())
}

/// Copy one archived file out of the workspace into permanent photo
/// storage, verifying its digest against the manifest. Returns the new
/// path, or None (with a warning recorded) when the file could not be
/// restored.
fn restore_file(
    stores: &Stores,
    entry: &crate::document::ManifestEntry,
    workspace: &Path,
    monitor: &dyn Monitor,
    result: &mut ImportResult,
) -> Option<PathBuf> {
    // Manifest entry names come from the document: never let one reach
    // outside the workspace.
    let entry_path = Path::new(&entry.container_entry_name);
    if entry_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        result.record_warning(format!(
            "Unsafe manifest entry name {:?}, file not restored",
            entry.container_entry_name
        ));
        return None;
    }
    let staged = workspace.join(entry_path);
    if !staged.exists() {
        result.record_warning(format!(
            "File {} missing from archive, metadata imported without it",
            entry.container_entry_name
        ));
        return None;
    }
    match checksum::digest_file(&staged) {
        Ok(digest) if digest != entry.checksum => {
            monitor.count(Counter::ChecksumMismatches, 1);
            result.record_warning(format!(
                "Checksum mismatch for {}, restoring anyway",
                entry.file_name
            ));
        }
        Ok(_) => {}
        Err(err) => {
            result.record_warning(format!("File {} unreadable: {err}", entry.file_name));
            return None;
        }
    }
    match stores.media.import_file(&staged, &entry.file_name) {
        Ok(path) => Some(path),
        Err(err) => {
            warn!(file = %entry.file_name, ?err, "file not restored");
            result.record_warning(format!("File {} not restored: {err}", entry.file_name));
            None
        }
    }
}

/// Restore the settings snapshot. A merge only overwrites fields the
/// document carries; a replace takes the snapshot wholesale. Failures
/// degrade to a warning.
fn apply_settings(
    stores: &Stores,
    settings: &crate::document::BackupSettings,
    strategy: ImportStrategy,
    result: &mut ImportResult,
) {
    let restored = AppSettings {
        theme: settings.theme.clone(),
        pin_lock: settings.pin_lock.clone(),
        pattern_lock: settings.pattern_lock.clone(),
        kid_safe_mode: settings.kid_safe_mode.clone(),
    };
    let to_store = match strategy {
        ImportStrategy::Replace => restored,
        ImportStrategy::Merge => {
            let current = stores.settings.load().unwrap_or_default();
            AppSettings {
                theme: restored.theme.or(current.theme),
                pin_lock: restored.pin_lock.or(current.pin_lock),
                pattern_lock: restored.pattern_lock.or(current.pattern_lock),
                kid_safe_mode: restored.kid_safe_mode.or(current.kid_safe_mode),
            }
        }
    };
    if let Err(err) = stores.settings.store(&to_store) {
        result.record_warning(format!("Settings not restored: {err}"));
    }
}

fn category_record(backup: &crate::document::BackupCategory) -> Category {
    Category {
        id: backup.id,
        name: backup.name.clone(),
        display_name: backup.display_name.clone(),
        position: backup.position,
        color_hex: backup.color_hex.clone(),
        icon_ref: backup.icon_ref.clone(),
        is_default: backup.is_default,
        created_at: backup.created_at,
    }
}

fn photo_record(backup: &crate::document::BackupPhoto) -> Photo {
    Photo {
        id: backup.id,
        path: backup.path.clone(),
        category_id: backup.category_id,
        name: backup.name.clone(),
        is_from_bundled_assets: backup.is_from_bundled_assets,
        created_at: backup.created_at,
        file_size_bytes: backup.file_size_bytes,
        width: backup.width,
        height: backup.height,
        is_favorite: backup.is_favorite,
    }
}
