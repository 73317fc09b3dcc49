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

//! Communication from the engine to a monitor: a test, a UI, etc.
//!
//! Export and import are long-running operations; they report progress
//! through this interface rather than blocking on a UI. Within one
//! operation the stream of [Progress] values is ordered and monotonic:
//! `processed_items` never decreases and `total_items` is fixed once
//! known.

pub mod void;

use crate::counters::Counter;
use crate::errors::Error;
use crate::export::ExportPhase;
use crate::import::ImportPhase;

/// One element of an operation's progress stream.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// No operation underway, or progress cleared.
    None,

    /// An export passed a coarse milestone.
    Export {
        /// The pipeline step the export just entered.
        phase: ExportPhase,
        /// Completion in percent, at coarse milestones.
        percent: usize,
    },

    /// Files are being packed into the container.
    PackContainer {
        /// Files packed so far.
        files_done: usize,
        /// Total files to pack.
        total_files: usize,
    },

    /// An import advanced by one item or entered a new phase.
    Import {
        /// The state the import pipeline is in.
        phase: ImportPhase,
        /// Items handled so far across categories and photos.
        processed_items: usize,
        /// Total items in the document, fixed once the document is parsed.
        total_items: usize,
    },

    /// Terminal element of an operation's stream: the full accumulated
    /// error and warning lists for the run, as a snapshot.
    Finished {
        /// Item-scoped failures, in the order they occurred.
        errors: Vec<String>,
        /// Informational conditions: duplicates, missing sources,
        /// updated-instead-of-inserted.
        warnings: Vec<String>,
    },
}

/// An interface by which the engine informs a UI or tests about
/// operation progress and problems.
pub trait Monitor: Send + Sync {
    /// Notify that a counter increased by a given amount.
    fn count(&self, counter: Counter, increment: usize);

    /// Set the absolute value of a counter.
    fn set_counter(&self, counter: Counter, value: usize);

    /// Notify that a non-fatal problem occurred.
    fn error(&self, error: Error);

    /// Notify that the operation advanced.
    fn progress(&self, progress: Progress);

    /// Polled between items: returning true makes the operation stop
    /// with [Error::Cancelled] after cleaning up its workspace.
    fn should_cancel(&self) -> bool {
        false
    }
}
