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

//! Wire packet codec
//!
//! Every message exchanged with the server is exactly 32 bytes:
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┐
//! │  a (i64) │  b (i64) │  c (i64) │  d (i64) │   little-endian
//! └──────────┴──────────┴──────────┴──────────┘
//!  0          8          16         24       32
//! ```
//!
//! Field `a` selects the packet kind (command, query, range query). The
//! meaning of `b`, `c` and `d` depends on the kind.

use crate::error::{CodecError, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::str::FromStr;

/// Size of an encoded packet in bytes
pub const PACKET_SIZE: usize = 32;

/// Top-level packet kinds understood by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// `a = 0`: mutate state, no reply
    Command,
    /// `a = 1`: read state, at most one reply
    Query,
    /// `a = 6`: read a closed id range, one reply per id
    RangeQuery,
}

impl PacketKind {
    /// Map field `a` to a kind, `None` for unknown tags
    pub fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            0 => Some(PacketKind::Command),
            1 => Some(PacketKind::Query),
            6 => Some(PacketKind::RangeQuery),
            _ => None,
        }
    }

    /// Value of field `a` for this kind
    pub fn tag(self) -> i64 {
        match self {
            PacketKind::Command => 0,
            PacketKind::Query => 1,
            PacketKind::RangeQuery => 6,
        }
    }
}

/// One wire message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Packet {
    pub a: i64,
    pub b: i64,
    pub c: i64,
    pub d: i64,
}

impl Packet {
    pub const fn new(a: i64, b: i64, c: i64, d: i64) -> Self {
        Self { a, b, c, d }
    }

    /// Kind selected by field `a`
    pub fn kind(&self) -> Option<PacketKind> {
        PacketKind::from_tag(self.a)
    }

    /// Serialize to exactly 32 bytes
    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        let mut bytes = [0u8; PACKET_SIZE];
        LittleEndian::write_i64(&mut bytes[0..8], self.a);
        LittleEndian::write_i64(&mut bytes[8..16], self.b);
        LittleEndian::write_i64(&mut bytes[16..24], self.c);
        LittleEndian::write_i64(&mut bytes[24..32], self.d);
        bytes
    }

    /// Deserialize from the first 32 bytes of `bytes`
    ///
    /// Anything past byte 32 is ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PACKET_SIZE {
            return Err(CodecError::Truncated(bytes.len()));
        }

        Ok(Self {
            a: LittleEndian::read_i64(&bytes[0..8]),
            b: LittleEndian::read_i64(&bytes[8..16]),
            c: LittleEndian::read_i64(&bytes[16..24]),
            d: LittleEndian::read_i64(&bytes[24..32]),
        })
    }
}

impl From<[i64; 4]> for Packet {
    fn from(f: [i64; 4]) -> Self {
        Self::new(f[0], f[1], f[2], f[3])
    }
}

/// Dotted text form `a.b.c.d`, as typed into the interactive client
impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.a, self.b, self.c, self.d)
    }
}

impl FromStr for Packet {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err(CodecError::FieldCount(parts.len()));
        }

        let mut fields = [0i64; 4];
        for (slot, part) in fields.iter_mut().zip(parts) {
            let part = part.trim();
            *slot = part.parse().map_err(|source| CodecError::InvalidField {
                field: part.to_string(),
                source,
            })?;
        }
        Ok(Packet::from(fields))
    }
}
