// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Store metadata file
//!
//! ```text
//! ┌───────────────┬───────────────────┬──────────────────┐
//! │ last_id (i64) │ save_interval_sec │ reserved (16 B)  │
//! └───────────────┴───────────────────┴──────────────────┘
//!  0               8                   16               32
//! ```

use crate::error::{Result, StoreError};
use byteorder::{ByteOrder, LittleEndian};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Encoded metadata size in bytes
pub const META_SIZE: usize = 32;

/// Flush interval used when none is stored
pub const DEFAULT_SAVE_INTERVAL_SECS: i64 = 60;

/// Append cursor and flush interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreMeta {
    pub last_id: i64,
    pub save_interval_sec: i64,
}

impl Default for StoreMeta {
    fn default() -> Self {
        Self {
            last_id: 0,
            save_interval_sec: DEFAULT_SAVE_INTERVAL_SECS,
        }
    }
}

impl StoreMeta {
    pub fn to_bytes(&self) -> [u8; META_SIZE] {
        let mut bytes = [0u8; META_SIZE];
        LittleEndian::write_i64(&mut bytes[0..8], self.last_id);
        LittleEndian::write_i64(&mut bytes[8..16], self.save_interval_sec);
        bytes
    }

    /// Decode a possibly truncated metadata file
    ///
    /// Missing fields keep their defaults and a non-positive interval is
    /// replaced by the default.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut meta = Self::default();
        if bytes.len() >= 8 {
            meta.last_id = LittleEndian::read_i64(&bytes[0..8]);
        }
        if bytes.len() >= 16 {
            let interval = LittleEndian::read_i64(&bytes[8..16]);
            if interval > 0 {
                meta.save_interval_sec = interval;
            }
        }
        meta
    }

    /// Load metadata, `None` if the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(Self::from_bytes(&bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Rewrite the metadata file and sync it
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path).map_err(|e| StoreError::io(path, e))?;
        file.write_all(&self.to_bytes())
            .map_err(|e| StoreError::io(path, e))?;
        file.sync_data().map_err(|e| StoreError::io(path, e))?;
        Ok(())
    }
}
