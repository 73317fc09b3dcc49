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

//! Exclusive lock over export and import operations.
//!
//! At most one operation may run against a store at a time: two
//! concurrent replace imports could interleave their clearing phases
//! and leave the store half-cleared. The lock is released when the
//! guard drops, on every exit path.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::{Acquire, Release};

use crate::errors::{Error, Result};

#[derive(Debug, Default)]
pub(crate) struct OperationLock {
    busy: AtomicBool,
}

impl OperationLock {
    pub fn new() -> OperationLock {
        OperationLock::default()
    }

    /// Take the lock, failing immediately with [Error::OperationInFlight]
    /// if another operation holds it.
    pub fn acquire(&self) -> Result<OperationGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Acquire, Acquire)
            .is_err()
        {
            return Err(Error::OperationInFlight);
        }
        Ok(OperationGuard { lock: self })
    }
}

#[derive(Debug)]
pub(crate) struct OperationGuard<'a> {
    lock: &'a OperationLock,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.lock.busy.store(false, Release);
    }
}
