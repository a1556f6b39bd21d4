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

//! Command/query processor
//!
//! The state machine that interprets packets against a [`SlotStore`]. It
//! is driven by the store actor and never shared; every call runs to
//! completion before the next packet is looked at.
//!
//! ```text
//! a=0 command   b=0  append d            (c must be 0)
//!               b=1  replace slot c with d
//!               b=2  write d if value(c) <  last_id
//!               b=3  write d, last_id=c  if value(c) >= last_id
//!               b=4  write d if value(c) >= last_id; last_id=c always
//!               b=5  write d at the time bucket of quantize entry c
//!               b=6  set quantize entry c to unit d (0..=62)
//! a=1 query     b=0  (1,0,0,value(d))    (c must be 0)
//!               b=9  last call of type c: d=0 timestamp, d=1 id
//! a=6 range     b=0  (1,0,0,value(id)) for id in min(c,d)..=max(c,d)
//! ```
//!
//! Comparisons for `b=2,3,4` use the value stored at slot `c`, not `c`.

use slotstore_core::{quantized_id, Clock, Packet, PacketKind, MAX_UNIT};
use slotstore_storage::SlotStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Command types (field `b` of a command packet)
pub mod command {
    pub const APPEND: i64 = 0;
    pub const REPLACE: i64 = 1;
    pub const WRITE_BELOW_CURSOR: i64 = 2;
    pub const WRITE_AND_MOVE_CURSOR: i64 = 3;
    pub const MOVE_CURSOR: i64 = 4;
    pub const WRITE_QUANTIZED: i64 = 5;
    pub const SET_QUANTIZE_UNIT: i64 = 6;
}

/// Query types (field `b` of a query packet)
pub mod query {
    pub const READ: i64 = 0;
    pub const LAST_CALL: i64 = 9;

    /// Field `d` of a `LAST_CALL` query
    pub const LAST_CALL_TIMESTAMP: i64 = 0;
    pub const LAST_CALL_ID: i64 = 1;
}

/// Reply packet carrying one slot value
pub fn value_reply(value: i64) -> Packet {
    Packet::new(PacketKind::Query.tag(), query::READ, 0, value)
}

/// What the processor wants sent back to the requester
pub enum Response<'a> {
    None,
    Single(Packet),
    Range(RangeReplies<'a>),
}

/// Lazily produced replies of a range query, ascending by id
pub struct RangeReplies<'a> {
    store: &'a SlotStore,
    next: i64,
    last: i64,
    done: bool,
}

impl<'a> RangeReplies<'a> {
    fn new(store: &'a SlotStore, c: i64, d: i64) -> Self {
        Self {
            store,
            next: c.min(d),
            last: c.max(d),
            done: false,
        }
    }

    /// Number of replies still to come
    pub fn remaining(&self) -> u128 {
        if self.done {
            0
        } else {
            (i128::from(self.last) - i128::from(self.next) + 1) as u128
        }
    }
}

impl Iterator for RangeReplies<'_> {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        if self.done {
            return None;
        }
        let id = self.next;
        if id == self.last {
            self.done = true;
        } else {
            self.next += 1;
        }
        Some(value_reply(self.store.read(id).unwrap_or(0)))
    }
}

/// Counters for packets seen by the processor
#[derive(Debug, Default)]
pub struct ProcessorStats {
    pub commands: AtomicU64,
    pub queries: AtomicU64,
    pub range_queries: AtomicU64,
    pub quantize_persist_failures: AtomicU64,
}

/// Point-in-time copy of [`ProcessorStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStatsSnapshot {
    pub commands: u64,
    pub queries: u64,
    pub range_queries: u64,
    pub quantize_persist_failures: u64,
}

impl ProcessorStats {
    pub fn snapshot(&self) -> ProcessorStatsSnapshot {
        ProcessorStatsSnapshot {
            commands: self.commands.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            range_queries: self.range_queries.load(Ordering::Relaxed),
            quantize_persist_failures: self.quantize_persist_failures.load(Ordering::Relaxed),
        }
    }
}

pub struct Processor {
    store: SlotStore,
    clock: Arc<dyn Clock>,
    stats: Arc<ProcessorStats>,
}

impl Processor {
    pub fn new(store: SlotStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            stats: Arc::new(ProcessorStats::default()),
        }
    }

    pub fn store(&self) -> &SlotStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SlotStore {
        &mut self.store
    }

    pub fn into_store(self) -> SlotStore {
        self.store
    }

    pub fn stats(&self) -> Arc<ProcessorStats> {
        self.stats.clone()
    }

    /// Apply one packet and describe the replies it produces
    pub fn process(&mut self, packet: Packet) -> Response<'_> {
        match packet.kind() {
            Some(PacketKind::Command) => {
                self.stats.commands.fetch_add(1, Ordering::Relaxed);
                self.apply_command(packet);
                Response::None
            }
            Some(PacketKind::Query) => {
                self.stats.queries.fetch_add(1, Ordering::Relaxed);
                match self.answer_query(packet) {
                    Some(reply) => Response::Single(reply),
                    None => Response::None,
                }
            }
            Some(PacketKind::RangeQuery) => {
                self.stats.range_queries.fetch_add(1, Ordering::Relaxed);
                if packet.b != 0 {
                    return Response::None;
                }
                Response::Range(RangeReplies::new(&self.store, packet.c, packet.d))
            }
            None => Response::None,
        }
    }

    fn apply_command(&mut self, packet: Packet) {
        let Packet { b, c, d, .. } = packet;
        let now = self.clock.now_secs();
        let store = &mut self.store;

        match b {
            command::APPEND => {
                if c == 0 {
                    if let Some(next) = store.last_id().checked_add(1) {
                        if store.in_range(next) {
                            store.write(next, d);
                            store.increment_last_id();
                        }
                    }
                }
            }
            command::REPLACE => {
                store.write(c, d);
            }
            command::WRITE_BELOW_CURSOR => {
                let current = store.read(c).unwrap_or(0);
                if current < store.last_id() {
                    store.write(c, d);
                }
            }
            command::WRITE_AND_MOVE_CURSOR => {
                let current = store.read(c).unwrap_or(0);
                if current >= store.last_id() {
                    store.write(c, d);
                    store.set_last_id(c);
                }
            }
            command::MOVE_CURSOR => {
                let current = store.read(c).unwrap_or(0);
                if current >= store.last_id() {
                    store.write(c, d);
                }
                store.set_last_id(c);
            }
            command::WRITE_QUANTIZED => {
                let unit = store.quantize_unit(c);
                if let Some(id) = quantized_id(unit, now) {
                    store.write(id, d);
                }
            }
            command::SET_QUANTIZE_UNIT => {
                if (0..=i64::from(MAX_UNIT)).contains(&d) {
                    if let Err(e) = store.set_quantize_unit(c, d as u8) {
                        self.stats
                            .quantize_persist_failures
                            .fetch_add(1, Ordering::Relaxed);
                        warn!("Failed to persist quantize entry {}: {}", c, e);
                    }
                }
            }
            other => trace!("Ignoring unknown command type {}", other),
        }

        store.record_call(b, now, c);
    }

    fn answer_query(&self, packet: Packet) -> Option<Packet> {
        let Packet { a, b, c, d } = packet;
        match b {
            query::READ if c == 0 => Some(value_reply(self.store.read(d).unwrap_or(0))),
            query::LAST_CALL => {
                let (timestamp, id) = self
                    .store
                    .last_call(c)
                    .map(|entry| (entry.timestamp, entry.id))
                    .unwrap_or((0, 0));
                match d {
                    query::LAST_CALL_TIMESTAMP => Some(Packet::new(a, b, c, timestamp)),
                    query::LAST_CALL_ID => Some(Packet::new(a, b, c, id)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotstore_core::ManualClock;
    use slotstore_storage::StoreConfig;
    use tempfile::TempDir;

    const NOW: i64 = 1_704_105_435;

    struct Fixture {
        _dir: TempDir,
        clock: Arc<ManualClock>,
        processor: Processor,
    }

    fn fixture(slots: i64) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = SlotStore::open(&StoreConfig::in_dir(dir.path(), slots)).unwrap();
        let clock = Arc::new(ManualClock::new(NOW));
        let processor = Processor::new(store, clock.clone());
        Fixture {
            _dir: dir,
            clock,
            processor,
        }
    }

    fn cmd(p: &mut Processor, b: i64, c: i64, d: i64) {
        assert!(matches!(p.process(Packet::new(0, b, c, d)), Response::None));
    }

    fn single(p: &mut Processor, packet: Packet) -> Option<Packet> {
        match p.process(packet) {
            Response::Single(reply) => Some(reply),
            Response::None => None,
            Response::Range(_) => panic!("unexpected range response"),
        }
    }

    fn range(p: &mut Processor, c: i64, d: i64) -> Vec<Packet> {
        match p.process(Packet::new(6, 0, c, d)) {
            Response::Range(replies) => replies.collect(),
            _ => panic!("expected range response"),
        }
    }

    #[test]
    fn test_append_sequence() {
        let mut f = fixture(16);
        f.processor.store_mut().set_last_id(4);

        cmd(&mut f.processor, 0, 0, 10);
        cmd(&mut f.processor, 0, 0, 20);
        cmd(&mut f.processor, 0, 0, 30);

        let store = f.processor.store();
        assert_eq!(store.last_id(), 7);
        assert_eq!(store.read(5), Some(10));
        assert_eq!(store.read(6), Some(20));
        assert_eq!(store.read(7), Some(30));
    }

    #[test]
    fn test_append_requires_zero_c() {
        let mut f = fixture(16);
        cmd(&mut f.processor, 0, 3, 10);
        assert_eq!(f.processor.store().last_id(), 0);
        assert_eq!(f.processor.store().read(1), Some(0));
    }

    #[test]
    fn test_append_when_full_is_noop() {
        let mut f = fixture(4);
        f.processor.store_mut().set_last_id(3);
        cmd(&mut f.processor, 0, 0, 99);
        assert_eq!(f.processor.store().last_id(), 3);
        for id in 0..4 {
            assert_eq!(f.processor.store().read(id), Some(0));
        }
    }

    #[test]
    fn test_replace() {
        let mut f = fixture(16);
        cmd(&mut f.processor, 1, 9, -4);
        cmd(&mut f.processor, 1, 99, 5);
        assert_eq!(f.processor.store().read(9), Some(-4));
        assert_eq!(f.processor.store().last_id(), 0);
    }

    #[test]
    fn test_write_below_cursor_compares_stored_value() {
        let mut f = fixture(16);
        f.processor.store_mut().set_last_id(5);

        // stored value 0 < last_id 5: write happens
        cmd(&mut f.processor, 2, 9, 100);
        assert_eq!(f.processor.store().read(9), Some(100));

        // stored value 100 >= 5: skipped, even though id 9 > last_id
        cmd(&mut f.processor, 2, 9, 200);
        assert_eq!(f.processor.store().read(9), Some(100));
        assert_eq!(f.processor.store().last_id(), 5);
    }

    #[test]
    fn test_write_and_move_cursor() {
        let mut f = fixture(16);
        f.processor.store_mut().set_last_id(5);

        // stored 0 < 5: skipped entirely
        cmd(&mut f.processor, 3, 2, 7);
        assert_eq!(f.processor.store().read(2), Some(0));
        assert_eq!(f.processor.store().last_id(), 5);

        // stored 6 >= 5: write and move cursor
        f.processor.store_mut().write(2, 6);
        cmd(&mut f.processor, 3, 2, 7);
        assert_eq!(f.processor.store().read(2), Some(7));
        assert_eq!(f.processor.store().last_id(), 2);
    }

    #[test]
    fn test_move_cursor_always_moves() {
        let mut f = fixture(16);
        f.processor.store_mut().set_last_id(5);

        // stored 0 < 5: no write, cursor still moves
        cmd(&mut f.processor, 4, 3, 8);
        assert_eq!(f.processor.store().read(3), Some(0));
        assert_eq!(f.processor.store().last_id(), 3);

        // stored 0 >= last_id 0: write and move
        f.processor.store_mut().set_last_id(0);
        cmd(&mut f.processor, 4, 3, 8);
        assert_eq!(f.processor.store().read(3), Some(8));
        assert_eq!(f.processor.store().last_id(), 3);

        // out of range id: nothing applies
        cmd(&mut f.processor, 4, 40, 1);
        assert_eq!(f.processor.store().last_id(), 3);
    }

    #[test]
    fn test_quantized_write() {
        let slots = NOW / 60 + 10;
        let mut f = fixture(slots);

        cmd(&mut f.processor, 6, 5, 1);
        assert_eq!(f.processor.store().quantize_unit(5), 1);

        cmd(&mut f.processor, 5, 5, 321);
        assert_eq!(f.processor.store().read(NOW / 60), Some(321));

        f.clock.advance(60);
        cmd(&mut f.processor, 5, 5, 654);
        assert_eq!(f.processor.store().read(NOW / 60 + 1), Some(654));
    }

    #[test]
    fn test_quantized_write_out_of_range_is_dropped() {
        let mut f = fixture(16);
        // unit 0 produces `now`, far beyond 16 slots
        cmd(&mut f.processor, 5, 0, 1);
        assert!(!f.processor.store().is_dirty());
    }

    #[test]
    fn test_set_unit_validation() {
        let mut f = fixture(16);
        cmd(&mut f.processor, 6, 5, 2);
        cmd(&mut f.processor, 6, 5, 65);
        cmd(&mut f.processor, 6, 5, -1);
        assert_eq!(f.processor.store().quantize_unit(5), 2);

        cmd(&mut f.processor, 6, 64, 1);
        assert_eq!(f.processor.store().quantize_unit(64), 0);
    }

    #[test]
    fn test_audit_records_raw_fields() {
        let mut f = fixture(16);
        cmd(&mut f.processor, 7, 100, 999);

        let ts = single(&mut f.processor, Packet::new(1, 9, 7, 0));
        assert_eq!(ts, Some(Packet::new(1, 9, 7, NOW)));
        let id = single(&mut f.processor, Packet::new(1, 9, 7, 1));
        assert_eq!(id, Some(Packet::new(1, 9, 7, 100)));
        assert_eq!(single(&mut f.processor, Packet::new(1, 9, 7, 2)), None);
    }

    #[test]
    fn test_audit_records_noop_commands() {
        let mut f = fixture(16);
        // replace out of range: no effect, still audited
        f.clock.set(500);
        cmd(&mut f.processor, 1, 1000, 1);
        assert_eq!(
            single(&mut f.processor, Packet::new(1, 9, 1, 1)),
            Some(Packet::new(1, 9, 1, 1000))
        );
        assert_eq!(
            single(&mut f.processor, Packet::new(1, 9, 1, 0)),
            Some(Packet::new(1, 9, 1, 500))
        );
    }

    #[test]
    fn test_audit_unknown_type_defaults_to_zero() {
        let mut f = fixture(16);
        assert_eq!(
            single(&mut f.processor, Packet::new(1, 9, 42, 0)),
            Some(Packet::new(1, 9, 42, 0))
        );
        assert_eq!(
            single(&mut f.processor, Packet::new(1, 9, 42, 1)),
            Some(Packet::new(1, 9, 42, 0))
        );
    }

    #[test]
    fn test_read_query() {
        let mut f = fixture(16);
        cmd(&mut f.processor, 1, 4, 44);
        assert_eq!(
            single(&mut f.processor, Packet::new(1, 0, 0, 4)),
            Some(Packet::new(1, 0, 0, 44))
        );
        assert_eq!(
            single(&mut f.processor, Packet::new(1, 0, 0, 400)),
            Some(Packet::new(1, 0, 0, 0))
        );
        assert_eq!(single(&mut f.processor, Packet::new(1, 0, 1, 4)), None);
        assert_eq!(single(&mut f.processor, Packet::new(1, 3, 0, 4)), None);
    }

    #[test]
    fn test_queries_are_not_audited() {
        let mut f = fixture(16);
        single(&mut f.processor, Packet::new(1, 0, 0, 4));
        assert!(f.processor.store().last_call(0).is_none());
    }

    #[test]
    fn test_range_reversed_bounds() {
        let mut f = fixture(16);
        cmd(&mut f.processor, 1, 3, 30);
        cmd(&mut f.processor, 1, 4, 40);
        cmd(&mut f.processor, 1, 5, 50);

        let expected = vec![
            Packet::new(1, 0, 0, 30),
            Packet::new(1, 0, 0, 40),
            Packet::new(1, 0, 0, 50),
        ];
        assert_eq!(range(&mut f.processor, 5, 3), expected);
        assert_eq!(range(&mut f.processor, 3, 5), expected);
    }

    #[test]
    fn test_range_out_of_bounds_ids_read_zero() {
        let mut f = fixture(4);
        cmd(&mut f.processor, 1, 3, 9);
        let values: Vec<i64> = range(&mut f.processor, 2, 5).iter().map(|p| p.d).collect();
        assert_eq!(values, vec![0, 9, 0, 0]);
    }

    #[test]
    fn test_range_at_i64_max_terminates() {
        let mut f = fixture(4);
        let replies = range(&mut f.processor, i64::MAX, i64::MAX - 1);
        assert_eq!(replies.len(), 2);
    }

    #[test]
    fn test_range_single_and_remaining() {
        let mut f = fixture(4);
        match f.processor.process(Packet::new(6, 0, 2, 2)) {
            Response::Range(mut replies) => {
                assert_eq!(replies.remaining(), 1);
                assert!(replies.next().is_some());
                assert_eq!(replies.remaining(), 0);
                assert!(replies.next().is_none());
            }
            _ => panic!("expected range response"),
        }
        match f.processor.process(Packet::new(6, 0, i64::MIN, i64::MAX)) {
            Response::Range(replies) => assert_eq!(replies.remaining(), 1u128 << 64),
            _ => panic!("expected range response"),
        }
    }

    #[test]
    fn test_range_requires_b_zero() {
        let mut f = fixture(4);
        assert!(matches!(
            f.processor.process(Packet::new(6, 1, 0, 3)),
            Response::None
        ));
    }

    #[test]
    fn test_stats() {
        let mut f = fixture(4);
        cmd(&mut f.processor, 1, 1, 1);
        single(&mut f.processor, Packet::new(1, 0, 0, 1));
        let _ = range(&mut f.processor, 0, 1);
        let snapshot = f.processor.stats().snapshot();
        assert_eq!(snapshot.commands, 1);
        assert_eq!(snapshot.queries, 1);
        assert_eq!(snapshot.range_queries, 1);
    }
}
