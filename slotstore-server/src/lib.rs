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

//! Slotstore Server
//!
//! UDP front end for a fixed-capacity, file-backed array of `i64` slots.
//! Every datagram is one 32-byte packet of four little-endian `i64` fields
//! `(a, b, c, d)`; `a` selects a command (0), a query (1) or a range
//! query (6). See [`processor`] for the command and query tables.
//!
//! Task layout:
//!
//! ```text
//!  UdpSocket ─► receiver ─► inbound queue ─► StoreActor ─► outbound queue ─► sender ─► UdpSocket
//! ```
//!
//! Both queues are bounded by `queue_capacity`; a full inbound queue
//! makes the receiver wait.

pub mod actor;
pub mod config;
pub mod processor;
pub mod transport;

use actor::{ActorHandle, StoreActor};
use anyhow::{Context, Result};
use config::ServerConfig;
use slotstore_core::{Clock, SystemClock};
use slotstore_storage::SlotStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use transport::{TransportStats, TransportStatsSnapshot};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Entry point for starting a server
pub struct Server;

impl Server {
    /// Open the store, bind the socket and spawn all tasks
    pub async fn start(config: &ServerConfig) -> Result<RunningServer> {
        Self::start_with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn start_with_clock(
        config: &ServerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<RunningServer> {
        let listen_addr = config.socket_addr()?;
        let store_config = config.store_config();

        let store = SlotStore::open(&store_config).with_context(|| {
            format!("opening slot store at {}", store_config.data_path.display())
        })?;

        let socket = UdpSocket::bind(listen_addr)
            .await
            .with_context(|| format!("binding UDP socket on {}", listen_addr))?;
        let local_addr = socket.local_addr()?;

        tracing::info!("Listening on udp://{}", local_addr);
        tracing::info!(
            "Data: {} ({} slots, {} backend)",
            store_config.data_path.display(),
            store.slots(),
            store.backend()
        );
        tracing::info!(
            "Meta: {} (last_id {}, save interval {}s)",
            store_config.meta_path.display(),
            store.last_id(),
            store.save_interval_sec()
        );
        tracing::info!("Quantize: {}", store_config.quant_path.display());

        let capacity = config.server.queue_capacity.max(1);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let actor = StoreActor::new(store, clock).spawn(inbound_rx, outbound_tx, shutdown_rx);

        let socket = Arc::new(socket);
        let transport_stats = Arc::new(TransportStats::default());
        let receiver = tokio::spawn(transport::run_receiver(
            socket.clone(),
            inbound_tx,
            transport_stats.clone(),
        ));
        let sender = tokio::spawn(transport::run_sender(
            socket,
            outbound_rx,
            transport_stats.clone(),
        ));

        Ok(RunningServer {
            local_addr,
            shutdown: shutdown_tx,
            actor,
            receiver,
            sender,
            transport_stats,
        })
    }
}

/// Handle to a started server
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    actor: ActorHandle,
    receiver: JoinHandle<()>,
    sender: JoinHandle<()>,
    transport_stats: Arc<TransportStats>,
}

impl RunningServer {
    /// Address the socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn transport_stats(&self) -> TransportStatsSnapshot {
        self.transport_stats.snapshot()
    }

    /// Stop the server; the store gets a final flush before this returns
    pub async fn shutdown(mut self) -> Result<()> {
        tracing::info!("Shutting down");
        // The actor may already be gone if its inbound queue closed.
        let _ = self.shutdown.send(true);

        let result = self.actor.join().await;
        let actor_stats = self.actor.stats();

        self.receiver.abort();
        // Ends once the actor has dropped its outbound sender.
        let _ = self.sender.await;

        let transport = self.transport_stats.snapshot();
        tracing::info!(
            "Final counters: received={} dropped_short={} dropped_unknown_kind={} sent={} send_errors={}",
            transport.received,
            transport.dropped_short,
            transport.dropped_unknown_kind,
            transport.sent,
            transport.send_errors
        );
        tracing::info!(
            "Final counters: commands={} queries={} range_queries={} flushes={} flush_failures={} replies_discarded={}",
            actor_stats.processor.commands,
            actor_stats.processor.queries,
            actor_stats.processor.range_queries,
            actor_stats.flushes,
            actor_stats.flush_failures,
            actor_stats.replies_discarded
        );

        result.context("final flush on shutdown")
    }
}

/// Run the server until Ctrl-C
pub async fn run_server(config: ServerConfig) -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotstore_server=info,slotstore_storage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Slotstore Server");
    tracing::debug!("Configuration: {:#?}", config);

    config.validate()?;

    let server = Server::start(&config).await?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("Received Ctrl-C");

    server.shutdown().await
}
