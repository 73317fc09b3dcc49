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

//! Property tests on history bounds and progress monotonicity.

use keepsake::history::{BackupHistory, BackupHistoryEntry, HISTORY_CAPACITY};
use keepsake::monitor::test::TestMonitor;
use keepsake::test_fixtures::VaultFixture;
use keepsake::*;
use proptest::prelude::*;

fn entry(timestamp: i64) -> BackupHistoryEntry {
    BackupHistoryEntry {
        id: 0,
        timestamp,
        file_name: format!("keepsake-{timestamp}.zip"),
        file_path: format!("/backups/keepsake-{timestamp}.zip"),
        file_size_bytes: 0,
        container_format: ContainerFormat::Zip,
        photos_count: 0,
        categories_count: 0,
        compression: CompressionLevel::Balanced,
        success: true,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn history_is_bounded_and_ordered(appends in 0usize..120) {
        let tmp = tempfile::TempDir::new().unwrap();
        let history = BackupHistory::open(tmp.path().join("history.json"));
        for i in 0..appends {
            history.append(entry(i as i64)).unwrap();
        }
        let listed = history.list();
        prop_assert!(listed.len() <= HISTORY_CAPACITY);
        prop_assert_eq!(listed.len(), appends.min(HISTORY_CAPACITY));
        // Most recent first, ids strictly decreasing.
        prop_assert!(listed.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[test]
    fn import_progress_never_decreases(
        categories in 1usize..4,
        photos_per_category in 0usize..4,
    ) {
        let source = VaultFixture::new();
        for c in 0..categories {
            let category = source.add_category(&format!("category_{c}"));
            for p in 0..photos_per_category {
                source.add_photo(category.id, &format!("photo_{c}_{p}"), b"bytes");
            }
        }
        let options = ExportOptions {
            format: ContainerFormat::Json,
            ..ExportOptions::default()
        };
        let archive = source
            .engine()
            .export(&source.dest_dir(), &options, TestMonitor::arc())
            .unwrap()
            .archive_path;

        let target = VaultFixture::new();
        let monitor = TestMonitor::arc();
        let result = target
            .engine()
            .import(&archive, ImportStrategy::Merge, monitor.clone())
            .unwrap();

        let total = categories + categories * photos_per_category;
        prop_assert_eq!(result.processed(), total);

        let mut last = 0;
        let mut final_total = None;
        for progress in monitor.take_progress() {
            if let Progress::Import { processed_items, total_items, phase } = progress {
                prop_assert!(processed_items >= last);
                last = processed_items;
                if phase == ImportPhase::Completed {
                    final_total = Some((processed_items, total_items));
                }
            }
        }
        prop_assert_eq!(final_total, Some((total, total)));
    }
}
