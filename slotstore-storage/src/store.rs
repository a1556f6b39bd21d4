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

//! Slot store
//!
//! [`SlotStore`] owns every piece of persisted state: the slot region, the
//! append cursor and flush interval, the quantization table and the call
//! audit log. It has no interior locking; exactly one task owns it and
//! calls its methods.
//!
//! Slot writes and cursor moves only mark the store dirty. [`SlotStore::flush`]
//! makes them durable, so a crash loses at most one flush interval of
//! updates. Quantization updates are persisted immediately.

use crate::audit::{AuditEntry, CallAuditLog};
use crate::error::{Result, StoreError};
use crate::meta::StoreMeta;
use crate::quantize::QuantizeTable;
use crate::region::{open_region, SlotBackend, SlotRegion};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Default slot capacity
pub const DEFAULT_SLOTS: i64 = 1024 * 1024;

/// Where and how to open a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_path: PathBuf,
    pub meta_path: PathBuf,
    pub quant_path: PathBuf,
    pub slots: i64,
    pub backend: SlotBackend,
}

impl StoreConfig {
    /// Standard file names inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>, slots: i64) -> Self {
        let dir = dir.as_ref();
        Self {
            data_path: dir.join("data.bin"),
            meta_path: dir.join("meta_.bin"),
            quant_path: dir.join("quantize.bin"),
            slots,
            backend: SlotBackend::default(),
        }
    }

    pub fn with_backend(mut self, backend: SlotBackend) -> Self {
        self.backend = backend;
        self
    }
}

pub struct SlotStore {
    data_path: PathBuf,
    meta_path: PathBuf,
    region: Box<dyn SlotRegion>,
    slots: i64,
    meta: StoreMeta,
    dirty: bool,
    quantize: QuantizeTable,
    audit: CallAuditLog,
    closed: bool,
}

impl SlotStore {
    /// Open (or create) the store described by `config`
    pub fn open(config: &StoreConfig) -> Result<Self> {
        if config.slots <= 0 {
            return Err(StoreError::InvalidCapacity(config.slots));
        }

        let region = open_region(config.backend, &config.data_path, config.slots as u64)?;

        let mut meta = match StoreMeta::load(&config.meta_path)? {
            Some(meta) => meta,
            None => {
                let meta = StoreMeta::default();
                meta.save(&config.meta_path)?;
                debug!("Created metadata file {:?}", config.meta_path);
                meta
            }
        };

        if meta.last_id < 0 {
            warn!("Stored last_id {} is negative; resetting to 0", meta.last_id);
            meta.last_id = 0;
        } else if meta.last_id >= config.slots {
            warn!(
                "Stored last_id {} exceeds capacity {}; clamping",
                meta.last_id, config.slots
            );
            meta.last_id = config.slots - 1;
        }

        let quantize = QuantizeTable::load(&config.quant_path)?;

        info!(
            "Opened slot store: {:?} ({} slots, {} backend), last_id {}, save interval {}s",
            config.data_path,
            config.slots,
            region.backend(),
            meta.last_id,
            meta.save_interval_sec
        );

        Ok(Self {
            data_path: config.data_path.clone(),
            meta_path: config.meta_path.clone(),
            region,
            slots: config.slots,
            meta,
            dirty: false,
            quantize,
            audit: CallAuditLog::new(),
            closed: false,
        })
    }

    pub fn slots(&self) -> i64 {
        self.slots
    }

    pub fn backend(&self) -> SlotBackend {
        self.region.backend()
    }

    pub fn in_range(&self, id: i64) -> bool {
        (0..self.slots).contains(&id)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Value at `id`, `None` when out of range
    pub fn read(&self, id: i64) -> Option<i64> {
        if !self.in_range(id) {
            return None;
        }
        match self.region.read_slot(id as u64) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to read slot {}: {}", id, e);
                None
            }
        }
    }

    /// Store `value` at `id`; false (and no effect) when out of range
    pub fn write(&mut self, id: i64, value: i64) -> bool {
        if !self.in_range(id) {
            return false;
        }
        match self.region.write_slot(id as u64, value) {
            Ok(()) => {
                self.dirty = true;
                true
            }
            Err(e) => {
                warn!("Failed to write slot {}: {}", id, e);
                false
            }
        }
    }

    pub fn last_id(&self) -> i64 {
        self.meta.last_id
    }

    pub fn set_last_id(&mut self, id: i64) -> bool {
        if !self.in_range(id) {
            return false;
        }
        self.meta.last_id = id;
        self.dirty = true;
        true
    }

    /// Advance the append cursor by one unless that would leave the slot range
    pub fn increment_last_id(&mut self) -> bool {
        match self.meta.last_id.checked_add(1) {
            Some(next) if next < self.slots => {
                self.meta.last_id = next;
                self.dirty = true;
                true
            }
            _ => false,
        }
    }

    pub fn save_interval_sec(&self) -> i64 {
        self.meta.save_interval_sec
    }

    pub fn quantize_unit(&self, n: i64) -> u8 {
        self.quantize.unit(n)
    }

    pub fn set_quantize_unit(&mut self, n: i64, unit: u8) -> Result<bool> {
        self.quantize.set_unit(n, unit)
    }

    pub fn quantize_offset(&self, n: i64) -> i64 {
        self.quantize.offset(n)
    }

    pub fn set_quantize_offset(&mut self, n: i64, offset: i64, now: i64) -> Result<bool> {
        self.quantize.set_offset(n, offset, now)
    }

    pub fn record_call(&mut self, command_type: i64, timestamp: i64, id: i64) {
        self.audit.record(command_type, timestamp, id);
    }

    pub fn last_call(&self, command_type: i64) -> Option<AuditEntry> {
        self.audit.lookup(command_type)
    }

    /// Persist the slot region and metadata if anything changed
    ///
    /// Returns `Ok(true)` when data was written. The dirty flag is cleared
    /// only after both steps succeed, so a failed flush is retried by the
    /// next call.
    pub fn flush(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.region
            .sync()
            .map_err(|e| StoreError::io(&self.data_path, e))?;
        self.meta.save(&self.meta_path)?;
        self.dirty = false;
        Ok(true)
    }

    /// Final flush, then release the region and its lock
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.flush().map(|_| ())
    }
}

impl Drop for SlotStore {
    fn drop(&mut self) {
        if self.closed || !self.dirty {
            return;
        }
        if let Err(e) = self.flush() {
            error!("Flush on drop failed: {}", e);
        }
    }
}
