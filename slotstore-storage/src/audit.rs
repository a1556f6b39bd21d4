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

//! Per-command-type call audit log

use std::collections::HashMap;

/// Last call observed for one command type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditEntry {
    pub timestamp: i64,
    pub id: i64,
}

/// Last (timestamp, id) seen per command type
///
/// Entries reflect the raw packet fields, not whether the command had any
/// effect. Kept in memory only.
#[derive(Debug, Default)]
pub struct CallAuditLog {
    entries: HashMap<i64, AuditEntry>,
}

impl CallAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, command_type: i64, timestamp: i64, id: i64) {
        self.entries
            .insert(command_type, AuditEntry { timestamp, id });
    }

    pub fn lookup(&self, command_type: i64) -> Option<AuditEntry> {
        self.entries.get(&command_type).copied()
    }
}
