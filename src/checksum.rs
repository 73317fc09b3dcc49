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

//! Content digests for archived photo files.
//!
//! The same digest populates manifest entries at export time and
//! verifies restored files at import time.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use blake2_rfc::blake2b::Blake2b;

use crate::errors::Result;

/// Digest length: 256 bits.
const DIGEST_LENGTH_BYTES: usize = 32;

/// Files are hashed in chunks of this size, never held in memory whole.
const CHUNK_SIZE: usize = 1 << 16;

/// Hex-encoded BLAKE2b-256 digest of a file's content.
pub fn digest_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    digest_reader(&mut file)
}

/// Hex-encoded BLAKE2b-256 digest of everything readable from `source`.
pub fn digest_reader<R: Read>(source: &mut R) -> Result<String> {
    let mut hasher = Blake2b::new(DIGEST_LENGTH_BYTES);
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let read = source.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize().as_bytes()))
}
