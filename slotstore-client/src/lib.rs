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

//! Slotstore Client
//!
//! Async UDP client for a slotstore server. Commands are fire-and-forget;
//! queries wait for a single reply and range queries for one reply per id.
//!
//! ```no_run
//! use slotstore_client::SlotClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SlotClient::connect("127.0.0.1:7770").await?;
//!     client.append(42).await?;
//!     println!("slot 1 = {}", client.read(1).await?);
//!     println!("slots 1..=3 = {:?}", client.range(1, 3).await?);
//!     Ok(())
//! }
//! ```

pub mod client;

pub use client::{ClientError, Result, SlotClient, DEFAULT_TIMEOUT};
