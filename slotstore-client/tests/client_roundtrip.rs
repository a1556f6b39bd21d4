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

//! Client against a live server on loopback

use slotstore_client::SlotClient;
use slotstore_core::{quantized_id, ManualClock};
use slotstore_server::config::ServerConfig;
use slotstore_server::{RunningServer, Server};
use std::sync::Arc;
use tempfile::TempDir;

const NOW: i64 = 1_704_105_435;

async fn start_server(dir: &TempDir, now: i64) -> RunningServer {
    let mut config = ServerConfig::default();
    config.server.listen_addr = "127.0.0.1:0".to_string();
    config.storage.data_path = dir.path().join("data.bin");
    config.storage.meta_path = dir.path().join("meta_.bin");
    config.storage.quant_path = dir.path().join("quantize.bin");
    config.storage.slots = 1024;
    Server::start_with_clock(&config, Arc::new(ManualClock::new(now)))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_append_read_range() {
    let dir = TempDir::new().unwrap();
    let server = start_server(&dir, NOW).await;
    let client = SlotClient::connect(server.local_addr()).await.unwrap();

    for value in [10, 20, 30, 40] {
        client.append(value).await.unwrap();
    }
    assert_eq!(client.read(2).await.unwrap(), 20);
    assert_eq!(client.range(1, 4).await.unwrap(), vec![10, 20, 30, 40]);
    assert_eq!(client.range(3, 2).await.unwrap(), vec![20, 30]);
    assert_eq!(client.range(4, 4).await.unwrap(), vec![40]);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_replace_and_audit() {
    let dir = TempDir::new().unwrap();
    let server = start_server(&dir, NOW).await;
    let client = SlotClient::connect(server.local_addr()).await.unwrap();

    client.replace(100, -5).await.unwrap();
    assert_eq!(client.read(100).await.unwrap(), -5);
    assert_eq!(client.last_call_timestamp(1).await.unwrap(), NOW);
    assert_eq!(client.last_call_id(1).await.unwrap(), 100);
    assert_eq!(client.last_call_id(0).await.unwrap(), 0);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_quantized_write() {
    let dir = TempDir::new().unwrap();
    // early enough in the epoch that minute buckets fit in the store
    let now = 12 * 60 + 5;
    let server = start_server(&dir, now).await;
    let client = SlotClient::connect(server.local_addr()).await.unwrap();

    // unit 1: minute buckets
    client.set_unit(3, 1).await.unwrap();
    client.write_quantized(3, 777).await.unwrap();

    let bucket = quantized_id(1, now).unwrap();
    assert_eq!(bucket, 12);
    assert_eq!(client.read(bucket).await.unwrap(), 777);
    assert_eq!(client.last_call_id(5).await.unwrap(), 3);

    server.shutdown().await.unwrap();
}
