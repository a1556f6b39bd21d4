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

use slotstore_core::{CodecError, Packet, PACKET_SIZE};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{lookup_host, ToSocketAddrs, UdpSocket};
use tracing::debug;

/// Reply wait used unless [`SlotClient::with_timeout`] says otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Slotstore client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("address resolved to nothing")]
    NoAddress,

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("malformed reply: {0}")]
    Decode(#[from] CodecError),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Connected UDP client
///
/// Replies are matched to requests by arrival order only, so one client
/// should not run overlapping queries.
#[derive(Debug)]
pub struct SlotClient {
    socket: UdpSocket,
    timeout: Duration,
}

impl SlotClient {
    /// Bind an ephemeral local socket and connect it to `addr`
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let server = lookup_host(addr)
            .await?
            .next()
            .ok_or(ClientError::NoAddress)?;
        let local: SocketAddr = if server.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(server).await?;
        debug!("Connected to {} from {}", server, socket.local_addr()?);

        Ok(Self {
            socket,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Set the per-reply timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.peer_addr()?)
    }

    /// Send a packet without waiting for anything
    pub async fn send(&self, packet: Packet) -> Result<()> {
        self.socket.send(&packet.to_bytes()).await?;
        Ok(())
    }

    /// Send a packet and wait for one reply
    pub async fn query(&self, packet: Packet) -> Result<Packet> {
        self.send(packet).await?;
        self.recv().await
    }

    /// Values of every slot between `id1` and `id2` inclusive, lowest id first
    pub async fn range(&self, id1: i64, id2: i64) -> Result<Vec<i64>> {
        self.send(Packet::new(6, 0, id1, id2)).await?;

        let count = (i128::from(id2) - i128::from(id1)).unsigned_abs() + 1;
        let mut values = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            values.push(self.recv().await?.d);
        }
        Ok(values)
    }

    async fn recv(&self) -> Result<Packet> {
        // Oversized datagrams are truncated to the packet size.
        let mut buf = [0u8; PACKET_SIZE];
        let len = tokio::time::timeout(self.timeout, self.socket.recv(&mut buf))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;
        Ok(Packet::from_bytes(&buf[..len])?)
    }

    /// Store `value` in the slot after the cursor and advance the cursor
    pub async fn append(&self, value: i64) -> Result<()> {
        self.send(Packet::new(0, 0, 0, value)).await
    }

    /// Overwrite slot `id`
    pub async fn replace(&self, id: i64, value: i64) -> Result<()> {
        self.send(Packet::new(0, 1, id, value)).await
    }

    pub async fn write_below_cursor(&self, id: i64, value: i64) -> Result<()> {
        self.send(Packet::new(0, 2, id, value)).await
    }

    pub async fn write_and_move_cursor(&self, id: i64, value: i64) -> Result<()> {
        self.send(Packet::new(0, 3, id, value)).await
    }

    pub async fn move_cursor(&self, id: i64, value: i64) -> Result<()> {
        self.send(Packet::new(0, 4, id, value)).await
    }

    /// Write `value` at the current time bucket of quantize entry `n`
    pub async fn write_quantized(&self, n: i64, value: i64) -> Result<()> {
        self.send(Packet::new(0, 5, n, value)).await
    }

    /// Set the time unit of quantize entry `n`
    pub async fn set_unit(&self, n: i64, unit: i64) -> Result<()> {
        self.send(Packet::new(0, 6, n, unit)).await
    }

    /// Value of slot `id`; out-of-range ids read as 0
    pub async fn read(&self, id: i64) -> Result<i64> {
        Ok(self.query(Packet::new(1, 0, 0, id)).await?.d)
    }

    /// When the last command of type `command_type` arrived (unix seconds)
    pub async fn last_call_timestamp(&self, command_type: i64) -> Result<i64> {
        Ok(self.query(Packet::new(1, 9, command_type, 0)).await?.d)
    }

    /// Field `c` of the last command of type `command_type`
    pub async fn last_call_id(&self, command_type: i64) -> Result<i64> {
        Ok(self.query(Packet::new(1, 9, command_type, 1)).await?.d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_times_out_without_reply() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = SlotClient::connect(silent.local_addr().unwrap())
            .await
            .unwrap()
            .with_timeout(Duration::from_millis(50));

        let err = client.read(1).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(t) if t == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_short_reply_is_decode_error() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = SlotClient::connect(peer.local_addr().unwrap()).await.unwrap();

        let reply = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (len, from) = peer.recv_from(&mut buf).await.unwrap();
            assert_eq!(len, PACKET_SIZE);
            peer.send_to(&[1, 2, 3], from).await.unwrap();
        });

        let err = client.query(Packet::new(1, 0, 0, 1)).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
        reply.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_sets_default_timeout() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = peer.local_addr().unwrap();
        let client = SlotClient::connect(addr).await.unwrap();
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(client.peer_addr().unwrap(), addr);
    }
}
