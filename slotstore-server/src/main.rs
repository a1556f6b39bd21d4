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

use anyhow::Result;
use clap::Parser;
use slotstore_server::{config::ServerConfig, run_server};
use slotstore_storage::SlotBackend;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// UDP listen address (overrides config file)
    #[arg(long)]
    listen_addr: Option<String>,

    /// UDP port; replaces only the port of the listen address
    #[arg(short, long)]
    port: Option<u16>,

    /// Slot array file
    #[arg(long)]
    data_path: Option<PathBuf>,

    /// Metadata file
    #[arg(long)]
    meta_path: Option<PathBuf>,

    /// Quantization table file
    #[arg(long)]
    quant_path: Option<PathBuf>,

    /// Number of slots
    #[arg(long)]
    slots: Option<i64>,

    /// Slot array backend (mmap or file)
    #[arg(long)]
    backend: Option<SlotBackend>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = ServerConfig::load(args.config)?;

    // Apply CLI overrides
    if let Some(addr) = args.listen_addr {
        config.server.listen_addr = addr;
    }
    if let Some(port) = args.port {
        config.set_port(port);
    }
    if let Some(path) = args.data_path {
        config.storage.data_path = path;
    }
    if let Some(path) = args.meta_path {
        config.storage.meta_path = path;
    }
    if let Some(path) = args.quant_path {
        config.storage.quant_path = path;
    }
    if let Some(slots) = args.slots {
        config.storage.slots = slots;
    }
    if let Some(backend) = args.backend {
        config.storage.backend = backend;
    }

    // Run server
    run_server(config).await
}
