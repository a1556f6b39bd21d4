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

//! Slotstore Storage Layer
//!
//! Fixed-capacity persisted integer slots plus the small side tables the
//! command processor needs.
//!
//! ## Files
//!
//! | file           | size        | contents                               |
//! |----------------|-------------|----------------------------------------|
//! | `data.bin`     | `N * 8`     | slot `i` at offset `i * 8`, i64 LE     |
//! | `meta_.bin`    | 32          | `last_id`, `save_interval_sec`, 16 B 0 |
//! | `quantize.bin` | 64 + 64 * 8 | unit bytes, then i64 LE offsets        |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use slotstore_storage::{SlotStore, StoreConfig};
//!
//! let mut store = SlotStore::open(&StoreConfig::in_dir("./slotstore-data", 1024))?;
//! store.write(1, 42);
//! store.close()?;
//! # Ok::<(), slotstore_storage::StoreError>(())
//! ```

pub mod audit;
pub mod error;
pub mod meta;
pub mod quantize;
pub mod region;
pub mod store;

pub use audit::{AuditEntry, CallAuditLog};
pub use error::{Result, StoreError};
pub use meta::{StoreMeta, DEFAULT_SAVE_INTERVAL_SECS, META_SIZE};
pub use quantize::{QuantizeTable, QUANTIZE_FILE_SIZE};
pub use region::{open_region, MmapRegion, SlotBackend, SlotRegion, SLOT_SIZE};
#[cfg(unix)]
pub use region::FileRegion;
pub use store::{SlotStore, StoreConfig, DEFAULT_SLOTS};
