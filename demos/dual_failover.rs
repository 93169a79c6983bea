//! Example demonstrating dual-backend reads with automatic failover.
//!
//! Two in-memory backends stand in for the remote stores so the failover
//! paths can be shown without credentials.
//!
//! Run with:
//! ```sh
//! cargo run --example dual_failover --features="memory"
//! ```

use bytes::Bytes;
use dualstore::{BackendKey, DualStorage, Fault, MemoryStorage, Storage, StorageExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let primary = MemoryStorage::new();
    let secondary = MemoryStorage::new();

    let store = DualStorage::builder()
        .backend(BackendKey::S3, primary.clone())
        .backend(BackendKey::Gcs, secondary.clone())
        .read_order([BackendKey::S3, BackendKey::Gcs])
        .write_order([BackendKey::S3, BackendKey::Gcs])
        .build()?;

    // Writes replicate to both backends in order.
    store.save("reports/daily.txt", Bytes::from_static(b"42 events")).await?;
    println!("saved to both backends");

    // Healthy primary serves the read.
    let content = store.get_bytes("reports/daily.txt").await?;
    println!("read from primary: {:?}", String::from_utf8_lossy(&content));

    // Take the primary down; the read fails over to the secondary. A warning
    // naming both backends is logged (RUST_LOG=warn to see it).
    primary.set_fault(Some(Fault::Transport));
    let content = store.get_bytes("reports/daily.txt").await?;
    println!("read after outage: {:?}", String::from_utf8_lossy(&content));

    // Deletes are refused rather than guessed at.
    let err = store.delete("reports/daily.txt").await.unwrap_err();
    println!("delete refused: {err}");

    Ok(())
}
