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

//! Slotstore CLI
//!
//! Reads `a.b.c.d` packets from stdin, one per line, and sends them to a
//! slotstore server. Commands (`a = 0`) are sent without waiting; range
//! queries (`a = 6`) print one value per line; anything else is treated as
//! a query and prints field `d` of the reply.

use anyhow::{Context, Result};
use clap::Parser;
use slotstore_client::SlotClient;
use slotstore_core::{Packet, PacketKind};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, Level};

#[derive(Parser)]
#[command(name = "slotstore")]
#[command(about = "Send slotstore packets read from stdin", long_about = None)]
struct Cli {
    /// Server address
    address: String,

    /// Server UDP port
    port: u16,

    /// Reply timeout in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,
}

/// Skip blank lines and `#` comments; parse everything else
fn parse_line(line: &str) -> Option<Result<Packet>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(
        line.parse::<Packet>()
            .with_context(|| format!("invalid packet {:?}", line)),
    )
}

/// Send one packet and print whatever it yields
async fn execute<W: Write>(client: &SlotClient, packet: Packet, out: &mut W) -> Result<()> {
    match PacketKind::from_tag(packet.a) {
        Some(PacketKind::Command) => {
            client.send(packet).await?;
        }
        Some(PacketKind::RangeQuery) => {
            for value in client.range(packet.c, packet.d).await? {
                writeln!(out, "{}", value)?;
            }
        }
        _ => {
            let reply = client.query(packet).await?;
            writeln!(out, "{}", reply.d)?;
        }
    }
    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let client = SlotClient::connect((cli.address.as_str(), cli.port))
        .await
        .with_context(|| format!("connecting to {}:{}", cli.address, cli.port))?
        .with_timeout(Duration::from_millis(cli.timeout_ms));
    debug!("Connected to {}", client.peer_addr()?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let packet = match parse_line(&line) {
            None => continue,
            Some(Ok(packet)) => packet,
            Some(Err(e)) => {
                error!("{:#}", e);
                continue;
            }
        };

        if let Err(e) = execute(&client, packet, &mut stdout).await {
            error!("{} failed: {:#}", packet, e);
        }
    }

    Ok(())
}
