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

//! Store Actor - single owner of the slot store
//!
//! One tokio task owns the [`Processor`] (and through it the store) and
//! multiplexes three event sources in a single loop:
//!
//! ```text
//!  shutdown ──┐
//!  inbound  ──┼─► select! ─► Processor ─► outbound
//!  ticker   ──┘        └──► flush
//! ```
//!
//! Nothing else touches the store, so it needs no lock. Flush runs inside
//! the actor's turn and stalls packet processing for its duration. On
//! shutdown (or when the inbound channel closes) no further input is
//! drained, a final flush is forced and the store is closed.

use crate::processor::{Processor, ProcessorStats, ProcessorStatsSnapshot, Response};
use slotstore_core::{Clock, Packet};
use slotstore_storage::{SlotStore, StoreError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// A decoded packet and where replies go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inbound {
    pub packet: Packet,
    pub reply_to: SocketAddr,
}

/// A reply packet and its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outbound {
    pub packet: Packet,
    pub to: SocketAddr,
}

/// Flush and reply counters
#[derive(Debug, Default)]
pub struct ActorStats {
    pub flushes: AtomicU64,
    pub flush_failures: AtomicU64,
    pub replies: AtomicU64,
    pub replies_discarded: AtomicU64,
}

/// Point-in-time copy of the actor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorStatsSnapshot {
    pub flushes: u64,
    pub flush_failures: u64,
    pub replies: u64,
    pub replies_discarded: u64,
    pub processor: ProcessorStatsSnapshot,
}

/// Handle to a running actor
pub struct ActorHandle {
    join: JoinHandle<Result<(), StoreError>>,
    stats: Arc<ActorStats>,
    processor_stats: Arc<ProcessorStats>,
}

impl ActorHandle {
    pub fn stats(&self) -> ActorStatsSnapshot {
        ActorStatsSnapshot {
            flushes: self.stats.flushes.load(Ordering::Relaxed),
            flush_failures: self.stats.flush_failures.load(Ordering::Relaxed),
            replies: self.stats.replies.load(Ordering::Relaxed),
            replies_discarded: self.stats.replies_discarded.load(Ordering::Relaxed),
            processor: self.processor_stats.snapshot(),
        }
    }

    /// Wait for the actor to finish; yields the result of closing the store
    pub async fn join(&mut self) -> anyhow::Result<()> {
        (&mut self.join).await??;
        Ok(())
    }
}

/// Longest periodic flush interval; larger metadata values are capped
pub const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub struct StoreActor {
    processor: Processor,
    flush_interval: Duration,
    stats: Arc<ActorStats>,
}

impl StoreActor {
    /// Wrap `store`; the flush interval comes from its metadata
    pub fn new(store: SlotStore, clock: Arc<dyn Clock>) -> Self {
        let secs = store
            .save_interval_sec()
            .clamp(1, MAX_FLUSH_INTERVAL.as_secs() as i64) as u64;
        Self::with_flush_interval(store, clock, Duration::from_secs(secs))
    }

    pub fn with_flush_interval(
        store: SlotStore,
        clock: Arc<dyn Clock>,
        flush_interval: Duration,
    ) -> Self {
        Self {
            processor: Processor::new(store, clock),
            flush_interval: flush_interval.clamp(Duration::from_millis(1), MAX_FLUSH_INTERVAL),
            stats: Arc::new(ActorStats::default()),
        }
    }

    /// Spawn the actor loop
    pub fn spawn(
        self,
        inbound: mpsc::Receiver<Inbound>,
        outbound: mpsc::Sender<Outbound>,
        shutdown: watch::Receiver<bool>,
    ) -> ActorHandle {
        let stats = self.stats.clone();
        let processor_stats = self.processor.stats();
        let join = tokio::spawn(self.run(inbound, outbound, shutdown));
        ActorHandle {
            join,
            stats,
            processor_stats,
        }
    }

    async fn run(
        mut self,
        mut inbound: mpsc::Receiver<Inbound>,
        outbound: mpsc::Sender<Outbound>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), StoreError> {
        info!(
            "Store actor started, flush interval {}s",
            self.flush_interval.as_secs()
        );

        let start = Instant::now()
            .checked_add(self.flush_interval)
            .unwrap_or_else(Instant::now);
        let mut ticker = time::interval_at(start, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    info!("Store actor received shutdown signal");
                    break;
                }
                msg = inbound.recv() => match msg {
                    Some(request) => {
                        if !self.handle(request, &outbound, &mut shutdown).await {
                            info!("Store actor interrupted by shutdown signal");
                            break;
                        }
                    }
                    None => {
                        info!("Inbound channel closed, store actor shutting down");
                        break;
                    }
                },
                _ = ticker.tick() => self.flush(),
            }
        }

        let store = self.processor.into_store();
        match store.close() {
            Ok(()) => {
                info!("Store closed after final flush");
                Ok(())
            }
            Err(e) => {
                error!("Final flush failed: {}", e);
                Err(e)
            }
        }
    }

    /// Process one request and send its replies
    ///
    /// Returns false when shutdown was signalled while replies were still
    /// being produced.
    async fn handle(
        &mut self,
        request: Inbound,
        outbound: &mpsc::Sender<Outbound>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let Inbound { packet, reply_to } = request;
        let stats = self.stats.clone();

        match self.processor.process(packet) {
            Response::None => true,
            Response::Single(reply) => {
                send_reply(outbound, &stats, reply, reply_to).await;
                true
            }
            Response::Range(replies) => {
                for reply in replies {
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => return false,
                        _ = send_reply(outbound, &stats, reply, reply_to) => {}
                    }
                }
                true
            }
        }
    }

    fn flush(&mut self) {
        match self.processor.store_mut().flush() {
            Ok(true) => {
                self.stats.flushes.fetch_add(1, Ordering::Relaxed);
                debug!("Flushed slot store");
            }
            Ok(false) => {}
            Err(e) => {
                self.stats.flush_failures.fetch_add(1, Ordering::Relaxed);
                error!("Flush failed, will retry on next tick: {}", e);
            }
        }
    }
}

async fn send_reply(
    outbound: &mpsc::Sender<Outbound>,
    stats: &ActorStats,
    packet: Packet,
    to: SocketAddr,
) {
    if outbound.send(Outbound { packet, to }).await.is_ok() {
        stats.replies.fetch_add(1, Ordering::Relaxed);
    } else {
        stats.replies_discarded.fetch_add(1, Ordering::Relaxed);
        debug!("Outbound channel closed, discarding reply to {}", to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotstore_core::ManualClock;
    use slotstore_storage::{StoreConfig, StoreMeta};
    use tempfile::TempDir;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    struct Running {
        dir: TempDir,
        config: StoreConfig,
        inbound: mpsc::Sender<Inbound>,
        outbound: mpsc::Receiver<Outbound>,
        shutdown: watch::Sender<bool>,
        handle: ActorHandle,
    }

    fn start(flush_interval: Duration) -> Running {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::in_dir(dir.path(), 32);
        let store = SlotStore::open(&config).unwrap();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let actor = StoreActor::with_flush_interval(store, clock, flush_interval);

        let (in_tx, in_rx) = mpsc::channel(256);
        let (out_tx, out_rx) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = actor.spawn(in_rx, out_tx, shutdown_rx);

        Running {
            dir,
            config,
            inbound: in_tx,
            outbound: out_rx,
            shutdown: shutdown_tx,
            handle,
        }
    }

    async fn send(r: &Running, packet: Packet) {
        r.inbound
            .send(Inbound {
                packet,
                reply_to: addr(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_command_then_query() {
        let mut r = start(Duration::from_secs(60));
        send(&r, Packet::new(0, 0, 0, 77)).await;
        send(&r, Packet::new(1, 0, 0, 1)).await;

        let reply = r.outbound.recv().await.unwrap();
        assert_eq!(reply.packet, Packet::new(1, 0, 0, 77));
        assert_eq!(reply.to, addr());

        r.shutdown.send(true).unwrap();
        r.handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_range_replies_in_order() {
        let mut r = start(Duration::from_secs(60));
        for (id, value) in [(3, 30), (4, 40), (5, 50)] {
            send(&r, Packet::new(0, 1, id, value)).await;
        }
        send(&r, Packet::new(6, 0, 5, 3)).await;

        let mut values = Vec::new();
        for _ in 0..3 {
            values.push(r.outbound.recv().await.unwrap().packet);
        }
        assert_eq!(
            values,
            vec![
                Packet::new(1, 0, 0, 30),
                Packet::new(1, 0, 0, 40),
                Packet::new(1, 0, 0, 50)
            ]
        );

        drop(r.inbound);
        r.handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_forces_final_flush() {
        let mut r = start(Duration::from_secs(3600));
        send(&r, Packet::new(0, 1, 9, 900)).await;
        send(&r, Packet::new(0, 4, 9, 0)).await;
        // a query round trip guarantees both commands were applied
        send(&r, Packet::new(1, 0, 0, 9)).await;
        let mut outbound = r.outbound;
        assert_eq!(outbound.recv().await.unwrap().packet.d, 900);

        r.shutdown.send(true).unwrap();
        r.handle.join().await.unwrap();

        let store = SlotStore::open(&r.config).unwrap();
        assert_eq!(store.read(9), Some(900));
        assert_eq!(store.last_id(), 9);
        drop(r.dir);
    }

    #[tokio::test]
    async fn test_periodic_flush() {
        let mut r = start(Duration::from_millis(20));
        send(&r, Packet::new(0, 1, 2, 5)).await;
        send(&r, Packet::new(1, 0, 0, 2)).await;
        r.outbound.recv().await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while r.handle.stats().flushes == 0 {
            assert!(Instant::now() < deadline, "no flush observed");
            time::sleep(Duration::from_millis(10)).await;
        }

        // a second tick with nothing dirty does not count as a flush
        time::sleep(Duration::from_millis(60)).await;
        assert_eq!(r.handle.stats().flushes, 1);

        let stats = r.handle.stats();
        assert_eq!(stats.processor.commands, 1);
        assert_eq!(stats.processor.queries, 1);
        assert_eq!(stats.replies, 1);

        r.shutdown.send(true).unwrap();
        r.handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_replies_discarded_when_transport_gone() {
        let Running {
            dir: _dir,
            inbound,
            outbound,
            shutdown: _shutdown,
            handle,
            ..
        } = start(Duration::from_secs(60));
        drop(outbound);

        for packet in [Packet::new(1, 0, 0, 0), Packet::new(6, 0, 0, 1)] {
            inbound
                .send(Inbound {
                    packet,
                    reply_to: addr(),
                })
                .await
                .unwrap();
        }
        drop(inbound);

        let ActorHandle { join, stats, .. } = handle;
        join.await.unwrap().unwrap();
        assert_eq!(stats.replies_discarded.load(Ordering::Relaxed), 3);
        assert_eq!(stats.replies.load(Ordering::Relaxed), 0);
    }

    async fn wait_for(
        handle: &ActorHandle,
        what: &str,
        done: impl Fn(&ActorStatsSnapshot) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(&handle.stats()) {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_huge_save_interval_is_capped() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::in_dir(dir.path(), 32);
        StoreMeta {
            last_id: 0,
            save_interval_sec: i64::MAX,
        }
        .save(&config.meta_path)
        .unwrap();

        let store = SlotStore::open(&config).unwrap();
        assert_eq!(store.save_interval_sec(), i64::MAX);
        let actor = StoreActor::new(store, Arc::new(ManualClock::new(1_000_000)));
        assert_eq!(actor.flush_interval, MAX_FLUSH_INTERVAL);

        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handle = actor.spawn(in_rx, out_tx, shutdown_rx);

        for packet in [Packet::new(0, 1, 1, 42), Packet::new(1, 0, 0, 1)] {
            in_tx
                .send(Inbound {
                    packet,
                    reply_to: addr(),
                })
                .await
                .unwrap();
        }
        let reply = time::timeout(Duration::from_secs(5), out_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.packet, Packet::new(1, 0, 0, 42));

        shutdown_tx.send(true).unwrap();
        handle.join().await.unwrap();
        assert_eq!(SlotStore::open(&config).unwrap().read(1), Some(42));
    }

    #[test]
    fn test_zero_flush_interval_is_raised() {
        let dir = TempDir::new().unwrap();
        let store = SlotStore::open(&StoreConfig::in_dir(dir.path(), 8)).unwrap();
        let actor = StoreActor::with_flush_interval(
            store,
            Arc::new(ManualClock::new(0)),
            Duration::ZERO,
        );
        assert_eq!(actor.flush_interval, Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_failed_flush_is_counted_and_retried() {
        let dir = TempDir::new().unwrap();
        let meta_dir = dir.path().join("meta");
        std::fs::create_dir(&meta_dir).unwrap();
        let mut config = StoreConfig::in_dir(dir.path(), 32);
        config.meta_path = meta_dir.join("meta_.bin");

        let store = SlotStore::open(&config).unwrap();
        let actor = StoreActor::with_flush_interval(
            store,
            Arc::new(ManualClock::new(1_000_000)),
            Duration::from_millis(20),
        );
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handle = actor.spawn(in_rx, out_tx, shutdown_rx);

        std::fs::remove_dir_all(&meta_dir).unwrap();
        for packet in [Packet::new(0, 1, 3, 33), Packet::new(1, 0, 0, 3)] {
            in_tx
                .send(Inbound {
                    packet,
                    reply_to: addr(),
                })
                .await
                .unwrap();
        }
        out_rx.recv().await.unwrap();

        wait_for(&handle, "a failed flush", |s| s.flush_failures > 0).await;
        assert_eq!(handle.stats().flushes, 0);

        std::fs::create_dir(&meta_dir).unwrap();
        wait_for(&handle, "a successful flush", |s| s.flushes == 1).await;

        shutdown_tx.send(true).unwrap();
        handle.join().await.unwrap();
        assert_eq!(SlotStore::open(&config).unwrap().read(3), Some(33));
    }
}
