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

//! Tests focussed on the import pipeline and its merge/replace
//! strategies.

use std::fs;
use std::path::PathBuf;

use assert_matches::assert_matches;
use keepsake::monitor::test::TestMonitor;
use keepsake::test_fixtures::VaultFixture;
use keepsake::*;
use pretty_assertions::assert_eq;

/// A vault holding a small reference data set: categories `family`
/// and `pets`, three photos, with real backing files.
fn seeded_vault() -> VaultFixture {
    let vault = VaultFixture::new();
    let family = vault.add_category("family");
    let pets = vault.add_category("pets");
    vault.add_photo(family.id, "mum", b"mum bytes");
    vault.add_photo(family.id, "dad", b"dad bytes");
    vault.add_photo(pets.id, "rex", b"rex bytes");
    vault
}

fn export_json(vault: &VaultFixture) -> PathBuf {
    let options = ExportOptions {
        format: ContainerFormat::Json,
        ..ExportOptions::default()
    };
    vault
        .engine()
        .export(&vault.dest_dir(), &options, TestMonitor::arc())
        .unwrap()
        .archive_path
}

fn export_zip(vault: &VaultFixture) -> PathBuf {
    vault
        .engine()
        .export(&vault.dest_dir(), &ExportOptions::default(), TestMonitor::arc())
        .unwrap()
        .archive_path
}

#[test]
fn merge_into_empty_vault_imports_everything() {
    let source = seeded_vault();
    let archive = export_json(&source);

    let target = VaultFixture::new();
    let monitor = TestMonitor::arc();
    let result = target
        .engine()
        .import(&archive, ImportStrategy::Merge, monitor.clone())
        .unwrap();

    assert_eq!(result.imported, 5);
    assert_eq!(result.skipped, 0);
    assert_eq!(result.failed, 0);
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty());
    monitor.assert_counter(Counter::CategoriesImported, 2);
    monitor.assert_counter(Counter::PhotosImported, 3);
    assert_eq!(target.categories.count().unwrap(), 2);
    assert_eq!(target.photos.count().unwrap(), 3);
}

#[test]
fn merging_twice_updates_categories_and_skips_duplicate_photos() {
    let source = seeded_vault();
    let archive = export_json(&source);

    let target = VaultFixture::new();
    target
        .engine()
        .import(&archive, ImportStrategy::Merge, TestMonitor::arc())
        .unwrap();

    let monitor = TestMonitor::arc();
    let result = target
        .engine()
        .import(&archive, ImportStrategy::Merge, monitor.clone())
        .unwrap();

    monitor.assert_counter(Counter::CategoriesUpdated, 2);
    monitor.assert_counter(Counter::CategoriesImported, 0);
    monitor.assert_counter(Counter::PhotosSkipped, 3);
    assert_eq!(result.skipped, 3);
    assert!(result.errors.is_empty());
    assert_eq!(
        result
            .warnings
            .iter()
            .filter(|w| w.contains("Updated existing category"))
            .count(),
        2
    );
    assert_eq!(
        result.warnings.iter().filter(|w| w.contains("Duplicate")).count(),
        3
    );
    // No duplicates were created.
    assert_eq!(target.categories.count().unwrap(), 2);
    assert_eq!(target.photos.count().unwrap(), 3);
}

#[test]
fn merge_remaps_photo_category_ids_through_the_category_name() {
    let source = seeded_vault();
    let archive = export_json(&source);

    // The target already has a `family` category under a different id.
    let target = VaultFixture::new();
    target.add_category("holiday");
    target.add_category("scans");
    let existing_family = target.add_category("family");

    let result = target
        .engine()
        .import(&archive, ImportStrategy::Merge, TestMonitor::arc())
        .unwrap();
    assert!(result.errors.is_empty());

    // Family photos landed under the pre-existing family id, not the
    // document's id.
    let family_photos: Vec<Photo> = target
        .photos
        .get_all()
        .unwrap()
        .into_iter()
        .filter(|p| p.name == "mum" || p.name == "dad")
        .collect();
    assert_eq!(family_photos.len(), 2);
    assert!(family_photos
        .iter()
        .all(|p| p.category_id == existing_family.id));
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("Updated existing category 'family'")));
}

#[test]
fn replace_purges_existing_data_and_keeps_document_ids() {
    let source = seeded_vault();
    let archive = export_json(&source);
    let expected_categories = {
        let mut c = source.categories.get_all().unwrap();
        c.sort_by_key(|c| c.id);
        c
    };
    let expected_photos = {
        let mut p = source.photos.get_all().unwrap();
        p.sort_by_key(|p| p.id);
        p
    };

    let target = VaultFixture::new();
    let stale = target.add_category("stale");
    target.add_photo(stale.id, "stale_photo", b"s");

    let result = target
        .engine()
        .import(&archive, ImportStrategy::Replace, TestMonitor::arc())
        .unwrap();
    assert_eq!(result.imported, 5);
    assert!(result.errors.is_empty());

    // Round-trip idempotence: ids and fields all survive.
    let mut categories = target.categories.get_all().unwrap();
    categories.sort_by_key(|c| c.id);
    assert_eq!(categories, expected_categories);
    let mut photos = target.photos.get_all().unwrap();
    photos.sort_by_key(|p| p.id);
    assert_eq!(photos, expected_photos);
    assert!(target.categories.get_by_name("stale").unwrap().is_none());
}

#[test]
fn zip_replace_restores_files_from_the_archive() {
    let source = seeded_vault();
    let original_photos = source.photos.get_all().unwrap();
    let archive = export_zip(&source);

    // Delete the source files: restoration must come from the archive.
    for photo in &original_photos {
        fs::remove_file(&photo.path).unwrap();
    }

    let monitor = TestMonitor::arc();
    let result = source
        .engine()
        .import(&archive, ImportStrategy::Replace, monitor.clone())
        .unwrap();
    assert_eq!(result.imported, 5);
    assert_eq!(result.files_restored, 3);
    assert!(result.errors.is_empty());
    monitor.assert_counter(Counter::FilesRestored, 3);
    monitor.assert_counter(Counter::ChecksumMismatches, 0);

    let mut restored = source.photos.get_all().unwrap();
    restored.sort_by_key(|p| p.id);
    for (restored, original) in restored.iter().zip(&original_photos) {
        // Identity preserved for everything except the file location,
        // which now points into permanent photo storage.
        assert_eq!(restored.id, original.id);
        assert_eq!(restored.name, original.name);
        assert_eq!(restored.category_id, original.category_id);
        assert_ne!(restored.path, original.path);
        assert!(restored.path.starts_with(&*source.media.root().to_string_lossy()));
        assert!(fs::metadata(&restored.path).is_ok());
    }
    let rex = restored.iter().find(|p| p.name == "rex").unwrap();
    assert_eq!(fs::read(&rex.path).unwrap(), b"rex bytes");
}

#[test]
fn replace_photo_with_unknown_category_fails_only_that_item() {
    let source = seeded_vault();
    let archive = export_json(&source);

    // Corrupt one photo's category reference in the document.
    let mut doc = document::decode(&fs::read(&archive).unwrap()).unwrap();
    doc.photos[1].category_id = 999;
    fs::write(&archive, document::encode(&doc).unwrap()).unwrap();

    let target = VaultFixture::new();
    let result = target
        .engine()
        .import(&archive, ImportStrategy::Replace, TestMonitor::arc())
        .unwrap();

    assert_eq!(result.failed, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("missing category 999"));
    // All the other items still processed.
    assert_eq!(result.imported, 4);
    assert_eq!(target.photos.count().unwrap(), 2);
    assert_eq!(target.categories.count().unwrap(), 2);
}

#[test]
fn missing_source_photo_is_skipped_with_a_warning() {
    let source = seeded_vault();
    let archive = export_json(&source);
    // One source file disappears between export and import.
    let mum = source.photos.get_by_id(1).unwrap().unwrap();
    fs::remove_file(&mum.path).unwrap();

    let target = VaultFixture::new();
    let result = target
        .engine()
        .import(&archive, ImportStrategy::Merge, TestMonitor::arc())
        .unwrap();
    assert_eq!(result.skipped, 1);
    assert_eq!(result.failed, 0);
    assert!(result.errors.is_empty());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("no longer exists")));
    assert_eq!(target.photos.count().unwrap(), 2);
}

#[test]
fn version_gate_rejects_documents_without_touching_data() {
    let source = seeded_vault();
    let archive = export_json(&source);
    let mut doc = document::decode(&fs::read(&archive).unwrap()).unwrap();
    doc.format_version = FORMAT_VERSION + 1;
    fs::write(&archive, document::encode(&doc).unwrap()).unwrap();

    let target = VaultFixture::new();
    let survivor = target.add_category("survivor");

    for strategy in [ImportStrategy::Merge, ImportStrategy::Replace] {
        let err = target
            .engine()
            .import(&archive, strategy, TestMonitor::arc())
            .unwrap_err();
        assert_matches!(
            err,
            Error::UnsupportedVersion { version } if version == FORMAT_VERSION + 1
        );
    }
    // Zero data mutation, even under replace.
    assert_eq!(target.categories.count().unwrap(), 1);
    assert!(target
        .categories
        .get_by_name(&survivor.name)
        .unwrap()
        .is_some());
}

#[test]
fn unparsable_archives_are_rejected_up_front() {
    let vault = VaultFixture::new();

    let junk = vault.tempdir.path().join("junk.zip");
    fs::write(&junk, b"PK\x03\x04 but not really a zip").unwrap();
    assert_matches!(
        vault
            .engine()
            .import(&junk, ImportStrategy::Merge, TestMonitor::arc())
            .unwrap_err(),
        Error::NotAnArchive { .. }
    );

    let garbage = vault.tempdir.path().join("garbage.json");
    fs::write(&garbage, b"{ definitely broken").unwrap();
    assert_matches!(
        vault
            .engine()
            .import(&garbage, ImportStrategy::Merge, TestMonitor::arc())
            .unwrap_err(),
        Error::Json { .. }
    );
}

#[test]
fn containers_without_metadata_fail_before_any_mutation() {
    let vault = VaultFixture::new();
    let staging = tempfile::TempDir::new().unwrap();
    fs::write(staging.path().join("stray.txt"), b"no metadata here").unwrap();
    let bad = vault.tempdir.path().join("bad.zip");
    container::create_container(
        staging.path(),
        &bad,
        CompressionLevel::Fast,
        &monitor::void::VoidMonitor,
    )
    .unwrap();

    let survivor = vault.add_category("survivor");
    assert_matches!(
        vault
            .engine()
            .import(&bad, ImportStrategy::Replace, TestMonitor::arc())
            .unwrap_err(),
        Error::MissingMetadata
    );
    assert!(vault
        .categories
        .get_by_name(&survivor.name)
        .unwrap()
        .is_some());
}

#[test]
fn import_progress_is_monotonic_and_reaches_the_total() {
    let source = seeded_vault();
    let archive = export_json(&source);

    let target = VaultFixture::new();
    let monitor = TestMonitor::arc();
    target
        .engine()
        .import(&archive, ImportStrategy::Merge, monitor.clone())
        .unwrap();

    let mut last_processed = 0;
    let mut final_event = None;
    for progress in monitor.take_progress() {
        if let Progress::Import {
            phase,
            processed_items,
            total_items,
        } = progress
        {
            assert!(
                processed_items >= last_processed,
                "processed went backwards: {processed_items} < {last_processed}"
            );
            last_processed = processed_items;
            if phase == ImportPhase::Completed {
                final_event = Some((processed_items, total_items));
            }
        }
    }
    // 2 categories + 3 photos.
    assert_eq!(final_event, Some((5, 5)));
}

#[test]
fn terminal_progress_element_snapshots_all_warnings() {
    let source = seeded_vault();
    let archive = export_json(&source);

    let target = VaultFixture::new();
    target
        .engine()
        .import(&archive, ImportStrategy::Merge, TestMonitor::arc())
        .unwrap();
    let monitor = TestMonitor::arc();
    let result = target
        .engine()
        .import(&archive, ImportStrategy::Merge, monitor.clone())
        .unwrap();

    let finished: Vec<Progress> = monitor
        .take_progress()
        .into_iter()
        .filter(|p| matches!(p, Progress::Finished { .. }))
        .collect();
    assert_eq!(
        finished,
        vec![Progress::Finished {
            errors: result.errors.clone(),
            warnings: result.warnings.clone(),
        }]
    );
}

#[test]
fn settings_restore_merges_and_replaces() {
    let source = seeded_vault();
    source.settings.set(AppSettings {
        theme: None,
        pin_lock: Some("sealed-pin".to_string()),
        pattern_lock: None,
        kid_safe_mode: Some("sealed-kidsafe".to_string()),
    });
    let archive = export_json(&source);

    // Merge keeps target fields the document does not carry.
    let target = VaultFixture::new();
    target.settings.set(AppSettings {
        theme: Some("dark".to_string()),
        ..AppSettings::default()
    });
    target
        .engine()
        .import(&archive, ImportStrategy::Merge, TestMonitor::arc())
        .unwrap();
    let merged = target.settings.snapshot();
    assert_eq!(merged.theme.as_deref(), Some("dark"));
    assert_eq!(merged.pin_lock.as_deref(), Some("sealed-pin"));

    // Replace takes the snapshot wholesale.
    let target = VaultFixture::new();
    target.settings.set(AppSettings {
        theme: Some("dark".to_string()),
        ..AppSettings::default()
    });
    target
        .engine()
        .import(&archive, ImportStrategy::Replace, TestMonitor::arc())
        .unwrap();
    let replaced = target.settings.snapshot();
    assert_eq!(replaced.theme, None);
    assert_eq!(replaced.kid_safe_mode.as_deref(), Some("sealed-kidsafe"));
}

#[test]
fn import_can_be_cancelled_between_items() {
    let source = seeded_vault();
    let archive = export_json(&source);

    let target = VaultFixture::new();
    let monitor = TestMonitor::arc();
    monitor.cancel();
    assert_matches!(
        target
            .engine()
            .import(&archive, ImportStrategy::Merge, monitor)
            .unwrap_err(),
        Error::Cancelled
    );
}
