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

//! Create, validate, and extract the compressed backup container.
//!
//! A container is a zip of the export staging tree: `metadata.json` at
//! the root, photo files under `photos/`, thumbnails under
//! `thumbnails/`. Extraction rejects entry names that would escape the
//! destination directory.

use std::fs::{create_dir_all, File};
use std::io;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::{Error, Result};
use crate::monitor::{Monitor, Progress};
use crate::METADATA_FILENAME;

/// User-selectable compression effort, mapped to the deflate scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Fast,
    #[default]
    Balanced,
    Maximum,
}

impl CompressionLevel {
    fn deflate_level(self) -> i64 {
        match self {
            CompressionLevel::Fast => 1,
            CompressionLevel::Balanced => 6,
            CompressionLevel::Maximum => 9,
        }
    }
}

/// Pack a staging directory into a container file.
pub fn create_container(
    source_dir: &Path,
    container_path: &Path,
    level: CompressionLevel,
    monitor: &dyn Monitor,
) -> Result<()> {
    let mut files = Vec::new();
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    let total_files = files.len();
    debug!(?container_path, total_files, "pack container");

    let out = File::create(container_path)?;
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level.deflate_level()));
    for (files_done, path) in files.iter().enumerate() {
        let entry_name = entry_name(source_dir, path);
        zip.start_file(&*entry_name, options)
            .map_err(|source| Error::ContainerWrite {
                path: container_path.to_path_buf(),
                source,
            })?;
        let mut f = File::open(path)?;
        io::copy(&mut f, &mut zip)?;
        monitor.progress(Progress::PackContainer {
            files_done: files_done + 1,
            total_files,
        });
    }
    zip.finish().map_err(|source| Error::ContainerWrite {
        path: container_path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Relative entry name with `/` separators, as zip requires.
fn entry_name(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Check a container is well-formed before trusting any of its entries:
/// it must open as an archive and contain the metadata document.
pub fn validate_structure(container_path: &Path) -> Result<()> {
    let file = File::open(container_path)?;
    let archive = ZipArchive::new(file).map_err(|err| {
        warn!(?container_path, ?err, "container failed to open");
        Error::NotAnArchive {
            path: container_path.to_path_buf(),
        }
    })?;
    if archive.index_for_name(METADATA_FILENAME).is_none() {
        return Err(Error::MissingMetadata);
    }
    Ok(())
}

/// Unpack a container into a destination directory.
///
/// Entry names that traverse outside the destination (`..`, absolute
/// paths) abort the extraction.
pub fn extract_container(container_path: &Path, destination: &Path) -> Result<()> {
    let file = File::open(container_path)?;
    let mut archive = ZipArchive::new(file).map_err(|_| Error::NotAnArchive {
        path: container_path.to_path_buf(),
    })?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .filter(|p| {
                p.components()
                    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            })
            .ok_or_else(|| Error::UnsafeEntryName {
                name: entry.name().to_string(),
            })?;
        let out_path = destination.join(relative);
        if entry.is_dir() {
            create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assert_matches::assert_matches;
    use tempfile::TempDir;

    use crate::monitor::test::TestMonitor;

    use super::*;

    fn staging_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(METADATA_FILENAME), b"{}\n").unwrap();
        fs::create_dir(tmp.path().join("photos")).unwrap();
        fs::write(tmp.path().join("photos/1_cat.jpg"), b"cat bytes").unwrap();
        fs::write(tmp.path().join("photos/2_dog.jpg"), b"dog bytes").unwrap();
        tmp
    }

    #[test]
    fn create_validate_extract_round_trip() {
        let staging = staging_tree();
        let out = TempDir::new().unwrap();
        let container = out.path().join("backup.zip");
        let monitor = TestMonitor::new();
        create_container(
            staging.path(),
            &container,
            CompressionLevel::Balanced,
            &monitor,
        )
        .unwrap();
        validate_structure(&container).unwrap();

        let dest = TempDir::new().unwrap();
        extract_container(&container, dest.path()).unwrap();
        assert_eq!(
            fs::read(dest.path().join("photos/1_cat.jpg")).unwrap(),
            b"cat bytes"
        );
        assert_eq!(fs::read(dest.path().join(METADATA_FILENAME)).unwrap(), b"{}\n");

        // Sub-progress covered every file and never went backwards.
        let packed: Vec<(usize, usize)> = monitor
            .take_progress()
            .into_iter()
            .filter_map(|p| match p {
                Progress::PackContainer {
                    files_done,
                    total_files,
                } => Some((files_done, total_files)),
                _ => None,
            })
            .collect();
        assert_eq!(packed.last(), Some(&(3, 3)));
        assert!(packed.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn validate_rejects_non_archive() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("junk.zip");
        fs::write(&path, b"this is not a zip file").unwrap();
        assert_matches!(
            validate_structure(&path),
            Err(Error::NotAnArchive { .. })
        );
    }

    #[test]
    fn validate_requires_metadata_entry() {
        let tmp = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        fs::write(staging.path().join("unrelated.txt"), b"hi").unwrap();
        let container = tmp.path().join("no-metadata.zip");
        create_container(
            staging.path(),
            &container,
            CompressionLevel::Fast,
            &TestMonitor::new(),
        )
        .unwrap();
        assert_matches!(validate_structure(&container), Err(Error::MissingMetadata));
    }

    #[test]
    fn extract_rejects_path_traversal() {
        let tmp = TempDir::new().unwrap();
        let container = tmp.path().join("evil.zip");
        let mut zip = ZipWriter::new(File::create(&container).unwrap());
        let options = SimpleFileOptions::default();
        zip.start_file("../escape.txt", options).unwrap();
        use std::io::Write;
        zip.write_all(b"escaped").unwrap();
        zip.finish().unwrap();

        let dest = TempDir::new().unwrap();
        assert_matches!(
            extract_container(&container, dest.path()),
            Err(Error::UnsafeEntryName { .. })
        );
        assert!(!tmp.path().join("escape.txt").exists());
    }

    #[test]
    fn compression_levels_map_to_deflate_scale() {
        assert_eq!(CompressionLevel::Fast.deflate_level(), 1);
        assert_eq!(CompressionLevel::Balanced.deflate_level(), 6);
        assert_eq!(CompressionLevel::Maximum.deflate_level(), 9);
        assert_eq!(CompressionLevel::default(), CompressionLevel::Balanced);
    }
}
