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

//! Durable slot regions
//!
//! The data file is a flat array of little-endian i64 values, slot `i` at
//! byte offset `i * 8`. A [`SlotRegion`] gives indexed access to that array
//! and knows how to push it to durable media. Exactly one backend is used
//! per deployment:
//!
//! - [`MmapRegion`]: shared writable mapping, synced with msync (default)
//! - [`FileRegion`]: positioned reads and writes, synced with fdatasync
//!
//! Both backends create the file when it is missing, extend it when it is
//! shorter than the configured capacity, and hold an exclusive lock on it
//! until the region is dropped.

use crate::error::{Result, StoreError};
use byteorder::{ByteOrder, LittleEndian};
use memmap2::{MmapMut, MmapOptions};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::str::FromStr;

/// Size of one slot in bytes
pub const SLOT_SIZE: u64 = 8;

/// Indexed access to the persisted slot array
///
/// Callers bounds-check `index` against [`SlotRegion::slots`].
pub trait SlotRegion: Send + Sync {
    /// Number of addressable slots
    fn slots(&self) -> u64;

    fn read_slot(&self, index: u64) -> io::Result<i64>;

    fn write_slot(&mut self, index: u64, value: i64) -> io::Result<()>;

    /// Push every written slot to durable media
    fn sync(&mut self) -> io::Result<()>;

    fn backend(&self) -> SlotBackend;
}

/// Slot region backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotBackend {
    /// Memory-mapped data file
    #[default]
    Mmap,
    /// Positioned file IO
    File,
}

impl SlotBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotBackend::Mmap => "mmap",
            SlotBackend::File => "file",
        }
    }
}

impl fmt::Display for SlotBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mmap" => Ok(SlotBackend::Mmap),
            "file" => Ok(SlotBackend::File),
            other => Err(format!("unknown slot backend {other:?} (expected mmap or file)")),
        }
    }
}

/// Open the region for `path` with the selected backend
pub fn open_region(
    backend: SlotBackend,
    path: &Path,
    slots: u64,
) -> Result<Box<dyn SlotRegion>> {
    match backend {
        SlotBackend::Mmap => Ok(Box::new(MmapRegion::open(path, slots)?)),
        #[cfg(unix)]
        SlotBackend::File => Ok(Box::new(FileRegion::open(path, slots)?)),
        #[cfg(not(unix))]
        SlotBackend::File => Err(StoreError::UnsupportedBackend("file")),
    }
}

/// Byte length of a region with `slots` slots
fn region_len(slots: u64) -> Result<u64> {
    slots
        .checked_mul(SLOT_SIZE)
        .filter(|len| usize::try_from(*len).is_ok() && slots > 0)
        .ok_or_else(|| StoreError::InvalidCapacity(i64::try_from(slots).unwrap_or(i64::MAX)))
}

/// Open (or create) the data file, lock it, and make it at least `len` bytes
fn open_data_file(path: &Path, len: u64) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;

    fs2::FileExt::try_lock_exclusive(&file).map_err(|e| {
        if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
            StoreError::Locked {
                path: path.to_path_buf(),
            }
        } else {
            StoreError::io(path, e)
        }
    })?;

    let actual = file.metadata().map_err(|e| StoreError::io(path, e))?.len();
    if actual < len {
        tracing::debug!("Extending {:?} from {} to {} bytes", path, actual, len);
        file.set_len(len).map_err(|e| StoreError::io(path, e))?;
    }

    Ok(file)
}

/// Memory-mapped slot region
pub struct MmapRegion {
    // Keeps the lock alive for as long as the mapping exists.
    _file: File,
    mmap: MmapMut,
    slots: u64,
}

impl MmapRegion {
    pub fn open(path: impl AsRef<Path>, slots: u64) -> Result<Self> {
        let path = path.as_ref();
        let len = region_len(slots)?;
        let file = open_data_file(path, len)?;

        // SAFETY: the file is exclusively locked by this process and is
        // never truncated while mapped.
        let mmap = unsafe {
            MmapOptions::new()
                .len(len as usize)
                .map_mut(&file)
                .map_err(|e| StoreError::io(path, e))?
        };

        Ok(Self {
            _file: file,
            mmap,
            slots,
        })
    }

    fn range(index: u64) -> std::ops::Range<usize> {
        let start = (index * SLOT_SIZE) as usize;
        start..start + SLOT_SIZE as usize
    }
}

impl SlotRegion for MmapRegion {
    fn slots(&self) -> u64 {
        self.slots
    }

    fn read_slot(&self, index: u64) -> io::Result<i64> {
        Ok(LittleEndian::read_i64(&self.mmap[Self::range(index)]))
    }

    fn write_slot(&mut self, index: u64, value: i64) -> io::Result<()> {
        LittleEndian::write_i64(&mut self.mmap[Self::range(index)], value);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.mmap.flush()
    }

    fn backend(&self) -> SlotBackend {
        SlotBackend::Mmap
    }
}

/// Slot region backed by positioned reads and writes
#[cfg(unix)]
pub struct FileRegion {
    file: File,
    slots: u64,
}

#[cfg(unix)]
impl FileRegion {
    pub fn open(path: impl AsRef<Path>, slots: u64) -> Result<Self> {
        let len = region_len(slots)?;
        let file = open_data_file(path.as_ref(), len)?;
        Ok(Self { file, slots })
    }
}

#[cfg(unix)]
impl SlotRegion for FileRegion {
    fn slots(&self) -> u64 {
        self.slots
    }

    fn read_slot(&self, index: u64) -> io::Result<i64> {
        use std::os::unix::fs::FileExt as _;

        let mut buf = [0u8; SLOT_SIZE as usize];
        self.file.read_exact_at(&mut buf, index * SLOT_SIZE)?;
        Ok(i64::from_le_bytes(buf))
    }

    fn write_slot(&mut self, index: u64, value: i64) -> io::Result<()> {
        use std::os::unix::fs::FileExt as _;

        self.file.write_all_at(&value.to_le_bytes(), index * SLOT_SIZE)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    fn backend(&self) -> SlotBackend {
        SlotBackend::File
    }
}
