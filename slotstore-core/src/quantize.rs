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

//! Time quantization
//!
//! A quantization unit turns the current epoch second into a slot id, so
//! that writes can be routed to time-partitioned slots:
//!
//! | unit    | bucket                         | id                          |
//! |---------|--------------------------------|-----------------------------|
//! | 0       | second                         | `now`                       |
//! | 1       | minute                         | `now / 60`                  |
//! | 2       | hour                           | `now / 3600`                |
//! | 3..=62  | minute `unit - 3` of each hour | `(now / 3600) * 60 + minute`|
//!
//! Minute-of-hour buckets are hour scoped: the same minute in two different
//! hours lands on two different ids.

/// Number of independently configured quantization entries
pub const QUANTIZE_ENTRIES: usize = 64;

/// Largest valid unit value
pub const MAX_UNIT: u8 = 62;

const FIRST_MINUTE_UNIT: u8 = 3;

/// Decoded quantization unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBucket {
    Second,
    Minute,
    Hour,
    /// Minute of the hour, `0..=59`
    MinuteOfHour(u8),
}

impl TimeBucket {
    /// Decode a stored unit byte, `None` above [`MAX_UNIT`]
    pub fn from_unit(unit: u8) -> Option<Self> {
        match unit {
            0 => Some(TimeBucket::Second),
            1 => Some(TimeBucket::Minute),
            2 => Some(TimeBucket::Hour),
            FIRST_MINUTE_UNIT..=MAX_UNIT => Some(TimeBucket::MinuteOfHour(unit - FIRST_MINUTE_UNIT)),
            _ => None,
        }
    }

    pub fn unit(self) -> u8 {
        match self {
            TimeBucket::Second => 0,
            TimeBucket::Minute => 1,
            TimeBucket::Hour => 2,
            TimeBucket::MinuteOfHour(minute) => FIRST_MINUTE_UNIT + minute,
        }
    }

    /// Slot id of this bucket at epoch second `now`
    pub fn id_at(self, now: i64) -> i64 {
        match self {
            TimeBucket::Second => now,
            TimeBucket::Minute => now / 60,
            TimeBucket::Hour => now / 3600,
            TimeBucket::MinuteOfHour(minute) => (now / 3600) * 60 + i64::from(minute),
        }
    }
}

/// Slot id for `unit` at epoch second `now`, `None` for an invalid unit
pub fn quantized_id(unit: u8, now: i64) -> Option<i64> {
    TimeBucket::from_unit(unit).map(|bucket| bucket.id_at(now))
}
