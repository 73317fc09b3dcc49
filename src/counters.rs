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

//! Counters of categories, photos, bytes, and files processed.
//!
//! Engine code sets counters through the [Monitor](crate::monitor::Monitor)
//! interface.

#![warn(missing_docs)]

use std::fmt::{self, Debug};
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;

use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{EnumCount, EnumIter};

/// Counters of events or bytes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, EnumCount, EnumIter)]
pub enum Counter {
    /// Number of categories gathered for an export.
    Categories,
    /// Number of photos gathered for an export.
    Photos,
    /// Number of photo files copied into an export's staging tree.
    FilesArchived,
    /// Total bytes of photo files copied into an export's staging tree.
    FileBytes,
    /// Number of thumbnail files written into an export's staging tree.
    ThumbnailsArchived,
    /// Number of categories newly inserted by an import.
    CategoriesImported,
    /// Number of existing categories updated in place by a merge import.
    CategoriesUpdated,
    /// Number of photos inserted by an import.
    PhotosImported,
    /// Number of photos skipped by an import (duplicates, missing sources).
    PhotosSkipped,
    /// Number of items that failed to import.
    ItemsFailed,
    /// Number of photo files restored out of an archive.
    FilesRestored,
    /// Number of restored files whose content digest did not match the
    /// manifest.
    ChecksumMismatches,
}

/// Counter values, identified by a [Counter].
#[derive(Default)]
pub struct Counters {
    counters: [AtomicUsize; Counter::COUNT],
}

impl Counters {
    /// Increase the value for a given counter by an amount.
    pub fn count(&self, counter: Counter, increment: usize) {
        self.counters[counter as usize].fetch_add(increment, Relaxed);
    }

    /// Set the absolute value of a counter.
    pub fn set(&self, counter: Counter, value: usize) {
        self.counters[counter as usize].store(value, Relaxed);
    }

    /// Return the current value of a counter.
    pub fn get(&self, counter: Counter) -> usize {
        self.counters[counter as usize].load(Relaxed)
    }
}

impl Debug for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Counters");
        for counter in Counter::iter() {
            s.field(&format!("{counter:?}"), &self.get(counter));
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_and_get() {
        let counters = Counters::default();
        assert_eq!(counters.get(Counter::Photos), 0);
        counters.count(Counter::Photos, 1);
        counters.count(Counter::Photos, 2);
        assert_eq!(counters.get(Counter::Photos), 3);
        counters.set(Counter::Photos, 1);
        assert_eq!(counters.get(Counter::Photos), 1);
    }

    #[test]
    fn debug_lists_all_counters() {
        let counters = Counters::default();
        counters.count(Counter::FilesRestored, 7);
        let repr = format!("{counters:?}");
        assert!(repr.contains("FilesRestored"));
        assert!(repr.contains('7'));
    }
}
