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

//! Codec error types

use std::num::ParseIntError;
use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while decoding or parsing packets
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer than 32 bytes were supplied
    #[error("packet too short: got {0} bytes, need 32")]
    Truncated(usize),

    /// Dotted text form did not have exactly four parts
    #[error("need 4 numbers (a.b.c.d), got {0}")]
    FieldCount(usize),

    /// One part of the dotted text form was not a signed 64-bit integer
    #[error("invalid field {field:?}: {source}")]
    InvalidField {
        field: String,
        #[source]
        source: ParseIntError,
    },
}
