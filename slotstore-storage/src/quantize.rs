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

//! Persisted quantization table
//!
//! 64 entries, each a unit byte plus an i64 offset. The file is rewritten
//! in full on every update:
//!
//! ```text
//! ┌────────────────────┬──────────────────────────────┐
//! │ units (64 x u8)    │ offsets (64 x i64, LE)       │
//! └────────────────────┴──────────────────────────────┘
//!  0                    64                           576
//! ```

use crate::error::{Result, StoreError};
use byteorder::{ByteOrder, LittleEndian};
use slotstore_core::{quantized_id, MAX_UNIT, QUANTIZE_ENTRIES};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Encoded table size in bytes
pub const QUANTIZE_FILE_SIZE: usize = QUANTIZE_ENTRIES + QUANTIZE_ENTRIES * 8;

pub struct QuantizeTable {
    path: PathBuf,
    units: [u8; QUANTIZE_ENTRIES],
    offsets: [i64; QUANTIZE_ENTRIES],
}

impl QuantizeTable {
    /// Load the table from `path`
    ///
    /// A missing or short file yields an all-zero table.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut table = Self {
            path,
            units: [0; QUANTIZE_ENTRIES],
            offsets: [0; QUANTIZE_ENTRIES],
        };

        let bytes = match fs::read(&table.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(table),
            Err(e) => return Err(StoreError::io(&table.path, e)),
        };

        if bytes.len() < QUANTIZE_FILE_SIZE {
            tracing::warn!(
                "Quantization file {:?} is {} bytes, expected {}; using defaults",
                table.path,
                bytes.len(),
                QUANTIZE_FILE_SIZE
            );
            return Ok(table);
        }

        table.units.copy_from_slice(&bytes[..QUANTIZE_ENTRIES]);
        LittleEndian::read_i64_into(
            &bytes[QUANTIZE_ENTRIES..QUANTIZE_FILE_SIZE],
            &mut table.offsets,
        );
        Ok(table)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn index(n: i64) -> Option<usize> {
        usize::try_from(n).ok().filter(|&i| i < QUANTIZE_ENTRIES)
    }

    /// Unit of entry `n`, 0 when `n` is out of range
    pub fn unit(&self, n: i64) -> u8 {
        Self::index(n).map(|i| self.units[i]).unwrap_or(0)
    }

    /// Offset of entry `n`, 0 when `n` is out of range
    pub fn offset(&self, n: i64) -> i64 {
        Self::index(n).map(|i| self.offsets[i]).unwrap_or(0)
    }

    /// Set the unit of entry `n` and persist the table
    ///
    /// Returns `Ok(false)` without touching anything when `n` or `unit` is
    /// out of range. On a write error the new unit stays in memory.
    pub fn set_unit(&mut self, n: i64, unit: u8) -> Result<bool> {
        let Some(i) = Self::index(n) else {
            return Ok(false);
        };
        if unit > MAX_UNIT {
            return Ok(false);
        }
        self.units[i] = unit;
        self.persist()?;
        Ok(true)
    }

    /// Store the distance between the current bucket id of entry `n` and
    /// `offset`, then persist the table
    ///
    /// Returns `Ok(false)` when `n` is out of range or its unit produces no id.
    pub fn set_offset(&mut self, n: i64, offset: i64, now: i64) -> Result<bool> {
        let Some(i) = Self::index(n) else {
            return Ok(false);
        };
        let Some(current) = quantized_id(self.units[i], now) else {
            return Ok(false);
        };
        self.offsets[i] = current.wrapping_sub(offset);
        self.persist()?;
        Ok(true)
    }

    pub fn to_bytes(&self) -> [u8; QUANTIZE_FILE_SIZE] {
        let mut bytes = [0u8; QUANTIZE_FILE_SIZE];
        bytes[..QUANTIZE_ENTRIES].copy_from_slice(&self.units);
        LittleEndian::write_i64_into(&self.offsets, &mut bytes[QUANTIZE_ENTRIES..]);
        bytes
    }

    /// Rewrite the whole table file
    pub fn persist(&self) -> Result<()> {
        let mut file = File::create(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(&self.to_bytes())
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.sync_data().map_err(|e| StoreError::io(&self.path, e))?;
        Ok(())
    }
}
