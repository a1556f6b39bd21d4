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

//! Slotstore Core
//!
//! Shared building blocks for the slotstore workspace:
//!
//! - **Packet codec**: the fixed 32-byte `(a, b, c, d)` wire message
//! - **Time buckets**: quantization of epoch seconds into slot ids
//! - **Clock**: injectable time source used by the command processor

pub mod clock;
pub mod error;
pub mod packet;
pub mod quantize;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CodecError, Result};
pub use packet::{Packet, PacketKind, PACKET_SIZE};
pub use quantize::{quantized_id, TimeBucket, MAX_UNIT, QUANTIZE_ENTRIES};
