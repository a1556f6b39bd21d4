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

//! Storage error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the slot store and its files
#[derive(Debug, Error)]
pub enum StoreError {
    /// Slot capacity is zero, negative, or too large to address
    #[error("invalid slot capacity: {0}")]
    InvalidCapacity(i64),

    /// Another process holds the data file lock
    #[error("data file is locked by another process: {}", .path.display())]
    Locked { path: PathBuf },

    /// Backend not available on this platform
    #[error("slot backend {0} is not supported on this platform")]
    UnsupportedBackend(&'static str),

    /// IO error on a named file
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
