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

//! Serialize vault data into a portable archive.
//!
//! The pipeline gathers categories and photos, optionally filters them,
//! stages photo files with checksummed manifest entries, writes the
//! metadata document, and packs the container. One photo failing to
//! copy is logged and skipped; it never aborts the export. The staging
//! tree is removed on every exit path.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::container::{self, CompressionLevel};
use crate::counters::Counter;
use crate::delta::IncrementalBackupMetadata;
use crate::document::{
    self, BackupCategory, BackupDocument, BackupPhoto, BackupSettings, ContainerFormat,
    ManifestEntry,
};
use crate::engine::Stores;
use crate::errors::{Error, Result};
use crate::history::{BackupHistory, BackupHistoryEntry};
use crate::monitor::{Monitor, Progress};
use crate::stats::{mb_string, ExportStats};
use crate::store::{Category, Photo};
use crate::{jsonio, METADATA_FILENAME, PHOTOS_DIR, THUMBNAILS_DIR};

static ARCHIVE_STAMP: &[FormatItem<'static>] =
    format_description!("[year][month][day]-[hour][minute][second][subsecond digits:3]");

/// Coarse milestones of an export, for progress reporting.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Gather,
    CopyFiles,
    Thumbnails,
    WriteMetadata,
    Pack,
    Done,
}

impl fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportPhase::Gather => write!(f, "Gather data"),
            ExportPhase::CopyFiles => write!(f, "Copy photo files"),
            ExportPhase::Thumbnails => write!(f, "Store thumbnails"),
            ExportPhase::WriteMetadata => write!(f, "Write metadata"),
            ExportPhase::Pack => write!(f, "Pack container"),
            ExportPhase::Done => write!(f, "Done"),
        }
    }
}

/// What to export and how to pack it.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: ContainerFormat,

    /// Only these categories (and their photos); `None` exports all.
    pub selected_category_ids: Option<HashSet<i64>>,

    /// Only photos created inside this range, both bounds inclusive,
    /// unix seconds.
    pub date_range: Option<(i64, i64)>,

    pub include_photos: bool,

    pub include_thumbnails: bool,

    pub include_settings: bool,

    pub compression: CompressionLevel,

    /// Present on differential exports: restricts the data set to the
    /// delta and annotates the document with it.
    pub incremental: Option<IncrementalBackupMetadata>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            format: ContainerFormat::Zip,
            selected_category_ids: None,
            date_range: None,
            include_photos: true,
            include_thumbnails: false,
            include_settings: true,
            compression: CompressionLevel::default(),
            incremental: None,
        }
    }
}

/// What one export run produced.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub archive_path: PathBuf,

    /// Id of the history entry recorded for this export, when the
    /// history was writable.
    pub history_id: Option<u64>,

    pub stats: ExportStats,

    /// Item-scoped degradations: photos whose file could not be copied,
    /// thumbnails that failed to render.
    pub warnings: Vec<String>,
}

pub(crate) fn export(
    stores: &Stores,
    history: &BackupHistory,
    destination: &Path,
    options: &ExportOptions,
    monitor: Arc<dyn Monitor>,
) -> Result<ExportOutcome> {
    let started = OffsetDateTime::now_utc();
    let file_name = archive_file_name(options.format, started);
    let archive_path = destination.join(&file_name);

    let result = run_export(stores, &archive_path, options, monitor.as_ref(), started);

    // Every attempt is recorded, failures included.
    let (stats, success) = match &result {
        Ok((stats, _)) => (*stats, true),
        Err(_) => (ExportStats::default(), false),
    };
    let entry = BackupHistoryEntry {
        id: 0,
        timestamp: started.unix_timestamp(),
        file_name,
        file_path: archive_path.to_string_lossy().into_owned(),
        file_size_bytes: fs::metadata(&archive_path).map(|m| m.len()).unwrap_or(0),
        container_format: options.format,
        photos_count: stats.photos,
        categories_count: stats.categories,
        compression: options.compression,
        success,
    };
    let history_id = match history.append(entry) {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(?err, "failed to record backup history entry");
            None
        }
    };

    let (stats, warnings) = result?;
    monitor.progress(Progress::Export {
        phase: ExportPhase::Done,
        percent: 100,
    });
    monitor.progress(Progress::Finished {
        errors: Vec::new(),
        warnings: warnings.clone(),
    });
    info!(
        path = ?archive_path,
        categories = stats.categories,
        photos = stats.photos,
        files = stats.files_archived,
        size = %mb_string(stats.file_bytes),
        "export complete"
    );
    Ok(ExportOutcome {
        archive_path,
        history_id,
        stats,
        warnings,
    })
}

fn run_export(
    stores: &Stores,
    archive_path: &Path,
    options: &ExportOptions,
    monitor: &dyn Monitor,
    started: OffsetDateTime,
) -> Result<(ExportStats, Vec<String>)> {
    let mut warnings = Vec::new();
    let mut stats = ExportStats::default();

    create_dir_all(archive_path.parent().unwrap_or_else(|| Path::new(".")))?;
    monitor.progress(Progress::Export {
        phase: ExportPhase::Gather,
        percent: 0,
    });
    let categories = gather_categories(stores, options)?;
    let photos = gather_photos(stores, options, &categories)?;
    monitor.set_counter(Counter::Categories, categories.len());
    monitor.set_counter(Counter::Photos, photos.len());
    stats.categories = categories.len();
    stats.photos = photos.len();
    if categories.is_empty() && photos.is_empty() {
        // An empty but valid document is still exportable.
        info!("nothing matches the export filter, producing an empty backup");
    }
    monitor.progress(Progress::Export {
        phase: ExportPhase::Gather,
        percent: 20,
    });

    let staging = tempfile::Builder::new().prefix("keepsake-export-").tempdir()?;
    let mut file_manifest = Vec::new();

    if options.include_photos && options.format == ContainerFormat::Zip {
        monitor.progress(Progress::Export {
            phase: ExportPhase::CopyFiles,
            percent: 30,
        });
        let file_stats = stage_photo_files(
            &photos,
            staging.path(),
            &mut file_manifest,
            &mut warnings,
            monitor,
        )?;
        stats += file_stats;
        monitor.progress(Progress::Export {
            phase: ExportPhase::CopyFiles,
            percent: 70,
        });
    }

    if options.include_thumbnails && options.format == ContainerFormat::Zip {
        monitor.progress(Progress::Export {
            phase: ExportPhase::Thumbnails,
            percent: 70,
        });
        stats += stage_thumbnails(stores, &photos, staging.path(), &mut warnings, monitor)?;
    }

    let settings = if options.include_settings {
        match stores.settings.load() {
            Ok(s) => Some(BackupSettings {
                theme: s.theme,
                pin_lock: s.pin_lock,
                pattern_lock: s.pattern_lock,
                kid_safe_mode: s.kid_safe_mode,
            }),
            Err(err) => {
                warnings.push(format!("Settings not exported: {err}"));
                None
            }
        }
    } else {
        None
    };

    monitor.progress(Progress::Export {
        phase: ExportPhase::WriteMetadata,
        percent: 80,
    });
    let document = BackupDocument {
        format_version: crate::FORMAT_VERSION,
        exported_at: started.unix_timestamp(),
        app_version: crate::version().to_string(),
        container_format: options.format,
        categories: categories.iter().map(backup_category).collect(),
        photos: photos.iter().map(backup_photo).collect(),
        settings,
        file_manifest,
        incremental: options.incremental.clone(),
    };

    match options.format {
        ContainerFormat::Json => {
            jsonio::write_json(archive_path, &document)?;
        }
        ContainerFormat::Zip => {
            fs::write(
                staging.path().join(METADATA_FILENAME),
                document::encode(&document)?,
            )?;
            monitor.progress(Progress::Export {
                phase: ExportPhase::Pack,
                percent: 80,
            });
            container::create_container(
                staging.path(),
                archive_path,
                options.compression,
                monitor,
            )?;
        }
    }
    // The staging tree is removed when `staging` drops, on success and
    // on every error path above.
    Ok((stats, warnings))
}

fn gather_categories(stores: &Stores, options: &ExportOptions) -> Result<Vec<Category>> {
    let mut categories = stores.categories.get_all()?;
    if let Some(selected) = &options.selected_category_ids {
        categories.retain(|c| selected.contains(&c.id));
    }
    if let Some(inc) = &options.incremental {
        // Keep changed categories, plus any category a changed photo
        // still needs for referential integrity.
        let changed: HashSet<i64> = inc.changed_category_ids.iter().copied().collect();
        let photo_categories: HashSet<i64> = stores
            .photos
            .get_all()?
            .iter()
            .filter(|p| inc.changed_photo_ids.contains(&p.id))
            .map(|p| p.category_id)
            .collect();
        categories.retain(|c| changed.contains(&c.id) || photo_categories.contains(&c.id));
    }
    categories.sort_by_key(|c| (c.position, c.id));
    Ok(categories)
}

fn gather_photos(
    stores: &Stores,
    options: &ExportOptions,
    categories: &[Category],
) -> Result<Vec<Photo>> {
    let category_ids: HashSet<i64> = categories.iter().map(|c| c.id).collect();
    let mut photos = stores.photos.get_all()?;
    photos.retain(|p| category_ids.contains(&p.category_id));
    if let Some((start, end)) = options.date_range {
        photos.retain(|p| p.created_at >= start && p.created_at <= end);
    }
    if let Some(inc) = &options.incremental {
        photos.retain(|p| inc.changed_photo_ids.contains(&p.id));
    }
    photos.sort_by_key(|p| p.id);
    Ok(photos)
}

/// Copy each non-bundled photo's file into the staging tree under a
/// collision-resistant name and record a checksummed manifest entry.
///
/// A single copy failure is logged and skipped.
fn stage_photo_files(
    photos: &[Photo],
    staging: &Path,
    file_manifest: &mut Vec<ManifestEntry>,
    warnings: &mut Vec<String>,
    monitor: &dyn Monitor,
) -> Result<ExportStats> {
    let mut stats = ExportStats::default();
    let photos_dir = staging.join(PHOTOS_DIR);
    create_dir_all(&photos_dir)?;
    for photo in photos {
        if monitor.should_cancel() {
            return Err(Error::Cancelled);
        }
        if photo.is_from_bundled_assets {
            continue;
        }
        let file_name = staged_file_name(photo);
        let staged_path = photos_dir.join(&file_name);
        if let Err(err) = fs::copy(&photo.path, &staged_path) {
            warn!(photo = %photo.name, path = %photo.path, ?err, "photo file not archived");
            warnings.push(format!(
                "Photo '{}' not archived, source unreadable: {err}",
                photo.name
            ));
            continue;
        }
        let checksum = crate::checksum::digest_file(&staged_path)?;
        let file_size_bytes = fs::metadata(&staged_path)?.len();
        file_manifest.push(ManifestEntry {
            photo_id: photo.id,
            original_path: photo.path.clone(),
            container_entry_name: format!("{PHOTOS_DIR}/{file_name}"),
            file_name,
            file_size_bytes,
            checksum,
        });
        stats.files_archived += 1;
        stats.file_bytes += file_size_bytes;
        monitor.count(Counter::FilesArchived, 1);
        monitor.count(Counter::FileBytes, file_size_bytes as usize);
        debug!(photo = %photo.name, "archived photo file");
    }
    Ok(stats)
}

/// Store companion thumbnails where the host can produce them.
/// Failures here are never fatal.
fn stage_thumbnails(
    stores: &Stores,
    photos: &[Photo],
    staging: &Path,
    warnings: &mut Vec<String>,
    monitor: &dyn Monitor,
) -> Result<ExportStats> {
    let mut stats = ExportStats::default();
    let thumbs_dir = staging.join(THUMBNAILS_DIR);
    create_dir_all(&thumbs_dir)?;
    for photo in photos {
        if monitor.should_cancel() {
            return Err(Error::Cancelled);
        }
        match stores.media.thumbnail(photo) {
            Ok(Some(bytes)) => {
                let path = thumbs_dir.join(staged_file_name(photo));
                if let Err(err) = fs::write(&path, bytes) {
                    warnings.push(format!("Thumbnail for '{}' not stored: {err}", photo.name));
                    continue;
                }
                stats.thumbnails += 1;
                monitor.count(Counter::ThumbnailsArchived, 1);
            }
            Ok(None) => {}
            Err(err) => {
                warnings.push(format!("Thumbnail for '{}' not rendered: {err}", photo.name));
            }
        }
    }
    Ok(stats)
}

/// `{photoId}_{originalFileName}`: collision-resistant inside one
/// archive even when two photos share a file name.
fn staged_file_name(photo: &Photo) -> String {
    let original = Path::new(&photo.path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| photo.name.clone());
    format!("{}_{}", photo.id, original)
}

fn archive_file_name(format: ContainerFormat, at: OffsetDateTime) -> String {
    let stamp = at
        .format(ARCHIVE_STAMP)
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    let extension = match format {
        ContainerFormat::Json => "json",
        ContainerFormat::Zip => "zip",
    };
    format!("keepsake-{stamp}.{extension}")
}

fn backup_category(category: &Category) -> BackupCategory {
    BackupCategory {
        id: category.id,
        name: category.name.clone(),
        display_name: category.display_name.clone(),
        position: category.position,
        color_hex: category.color_hex.clone(),
        icon_ref: category.icon_ref.clone(),
        is_default: category.is_default,
        created_at: category.created_at,
    }
}

fn backup_photo(photo: &Photo) -> BackupPhoto {
    BackupPhoto {
        id: photo.id,
        path: photo.path.clone(),
        category_id: photo.category_id,
        name: photo.name.clone(),
        is_from_bundled_assets: photo.is_from_bundled_assets,
        created_at: photo.created_at,
        file_size_bytes: photo.file_size_bytes,
        width: photo.width,
        height: photo.height,
        is_favorite: photo.is_favorite,
    }
}
