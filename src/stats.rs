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

//! Result and statistics types for export and import runs.

use derive_more::{Add, AddAssign};
use thousands::Separable;

pub fn mb_string(s: u64) -> String {
    let mut s = (s / 1_000_000).separate_with_commas();
    s.push_str(" MB");
    s
}

/// What one import run did.
///
/// Errors and warnings are distinct lists: errors are items that failed,
/// warnings are expected conditions of a normal merge (duplicates,
/// missing sources, updated-instead-of-inserted). An import that returns
/// `Ok` with a non-empty `errors` list succeeded as an operation but
/// lost individual items; callers must present that distinction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportResult {
    /// Categories and photos inserted or updated.
    pub imported: usize,
    /// Items deliberately not imported: duplicates, missing sources.
    pub skipped: usize,
    /// Items that failed to import.
    pub failed: usize,
    /// Photo files restored out of the container.
    pub files_restored: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ImportResult {
    pub(crate) fn record_error(&mut self, message: String) {
        tracing::warn!("{message}");
        self.failed += 1;
        self.errors.push(message);
    }

    pub(crate) fn record_warning(&mut self, message: String) {
        tracing::debug!("{message}");
        self.warnings.push(message);
    }

    /// Items handled so far, for progress reporting.
    pub fn processed(&self) -> usize {
        self.imported + self.skipped + self.failed
    }
}

/// Sizes of data gathered and archived by one export.
#[derive(Add, AddAssign, Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ExportStats {
    pub categories: usize,
    pub photos: usize,
    /// Photo files copied into the staging tree.
    pub files_archived: usize,
    /// Total bytes of archived photo files.
    pub file_bytes: u64,
    pub thumbnails: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mb_strings() {
        assert_eq!(mb_string(0), "0 MB");
        assert_eq!(mb_string(4_000_000), "4 MB");
        assert_eq!(mb_string(1_234_567_890), "1,234 MB");
    }

    #[test]
    fn stats_add() {
        let a = ExportStats {
            photos: 2,
            file_bytes: 100,
            ..Default::default()
        };
        let b = ExportStats {
            photos: 3,
            file_bytes: 50,
            thumbnails: 1,
            ..Default::default()
        };
        let sum = a + b;
        assert_eq!(sum.photos, 5);
        assert_eq!(sum.file_bytes, 150);
        assert_eq!(sum.thumbnails, 1);
    }

    #[test]
    fn result_tracks_processed_items() {
        let mut result = ImportResult::default();
        result.imported = 3;
        result.record_warning("duplicate".into());
        result.skipped += 1;
        result.record_error("bad category".into());
        assert_eq!(result.processed(), 5);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.warnings.len(), 1);
    }
}
