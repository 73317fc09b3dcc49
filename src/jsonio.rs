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

//! Read and write JSON metadata files.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::Result;

/// Write an object as JSON to a file, atomically.
///
/// The content lands under a temporary name in the same directory and is
/// renamed into place, so a crash never leaves a half-written file.
pub fn write_json<T: Serialize>(path: &Path, obj: &T) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut f = tempfile::Builder::new().prefix("tmp-").tempfile_in(dir)?;
    let mut s = serde_json::to_string_pretty(obj)?;
    s.push('\n');
    f.write_all(s.as_bytes())?;
    f.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read a JSON file into an object.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path)?;
    Ok(serde_json::from_reader(f)?)
}
