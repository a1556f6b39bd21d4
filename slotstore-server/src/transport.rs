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

//! UDP transport adapter
//!
//! Two tasks share one socket:
//!
//! - the receiver turns datagrams into [`Inbound`] requests, dropping
//!   anything shorter than a packet or with an unknown kind
//! - the sender writes [`Outbound`] replies back to their addresses
//!
//! A full inbound queue makes the receiver wait instead of dropping.

use crate::actor::{Inbound, Outbound};
use slotstore_core::{Packet, PACKET_SIZE};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Datagram counters
#[derive(Debug, Default)]
pub struct TransportStats {
    pub received: AtomicU64,
    pub dropped_short: AtomicU64,
    pub dropped_unknown_kind: AtomicU64,
    pub sent: AtomicU64,
    pub send_errors: AtomicU64,
}

/// Point-in-time copy of [`TransportStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStatsSnapshot {
    pub received: u64,
    pub dropped_short: u64,
    pub dropped_unknown_kind: u64,
    pub sent: u64,
    pub send_errors: u64,
}

impl TransportStats {
    pub fn snapshot(&self) -> TransportStatsSnapshot {
        TransportStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dropped_short: self.dropped_short.load(Ordering::Relaxed),
            dropped_unknown_kind: self.dropped_unknown_kind.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

/// Why a datagram was refused at the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Short(usize),
    UnknownKind(i64),
}

/// Decode a datagram and check that its kind is one the processor handles
pub fn accept_datagram(bytes: &[u8]) -> Result<Packet, Rejection> {
    let packet = Packet::from_bytes(bytes).map_err(|_| Rejection::Short(bytes.len()))?;
    match packet.kind() {
        Some(_) => Ok(packet),
        None => Err(Rejection::UnknownKind(packet.a)),
    }
}

/// Receive loop; returns when the actor's inbound queue is closed
pub async fn run_receiver(
    socket: Arc<UdpSocket>,
    inbound: mpsc::Sender<Inbound>,
    stats: Arc<TransportStats>,
) {
    // Datagrams longer than a packet are truncated to it.
    let mut buf = [0u8; PACKET_SIZE];

    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                debug!("UDP receive error: {}", e);
                continue;
            }
        };
        stats.received.fetch_add(1, Ordering::Relaxed);

        let packet = match accept_datagram(&buf[..len]) {
            Ok(packet) => packet,
            Err(Rejection::Short(len)) => {
                stats.dropped_short.fetch_add(1, Ordering::Relaxed);
                debug!("Dropping {}-byte datagram from {}", len, from);
                continue;
            }
            Err(Rejection::UnknownKind(a)) => {
                stats.dropped_unknown_kind.fetch_add(1, Ordering::Relaxed);
                debug!("Dropping packet with unknown kind {} from {}", a, from);
                continue;
            }
        };

        let request = Inbound {
            packet,
            reply_to: from,
        };
        if inbound.send(request).await.is_err() {
            info!("Inbound queue closed, receiver stopping");
            return;
        }
    }
}

/// Send loop; returns when every outbound sender is gone
pub async fn run_sender(
    socket: Arc<UdpSocket>,
    mut outbound: mpsc::Receiver<Outbound>,
    stats: Arc<TransportStats>,
) {
    while let Some(Outbound { packet, to }) = outbound.recv().await {
        match socket.send_to(&packet.to_bytes(), to).await {
            Ok(_) => {
                stats.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.send_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to send reply to {}: {}", to, e);
            }
        }
    }
    debug!("Outbound queue closed, sender stopping");
}
