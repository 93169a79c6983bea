//! Tests for the in-memory adapter, including its induced-fault switches.

#![cfg(feature = "memory")]

use bytes::Bytes;
use dualstore::{Error, Fault, MemoryStorage, Storage, StorageExt};

#[tokio::test]
async fn save_then_open_round_trips() {
    let storage = MemoryStorage::new();

    let saved = storage
        .save("dir/file.txt", Bytes::from_static(b"hello"))
        .await
        .unwrap();
    assert_eq!(saved, "dir/file.txt");

    let stream = storage.open("dir/file.txt").await.unwrap();
    assert_eq!(stream.name(), "dir/file.txt");
    assert_eq!(stream.size(), Some(5));
    assert_eq!(stream.bytes().await.unwrap(), Bytes::from_static(b"hello"));
}

#[tokio::test]
async fn open_missing_object_is_not_found() {
    let storage = MemoryStorage::new();

    let err = storage.open("nowhere").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(name) if name == "nowhere"));
}

#[tokio::test]
async fn save_overwrites_in_place() {
    let storage = MemoryStorage::new();

    storage
        .save("file", Bytes::from_static(b"first"))
        .await
        .unwrap();
    storage
        .save("file", Bytes::from_static(b"second"))
        .await
        .unwrap();

    assert_eq!(storage.len(), 1);
    assert_eq!(
        storage.get_bytes("file").await.unwrap(),
        Bytes::from_static(b"second")
    );
}

#[tokio::test]
async fn exists_and_delete() {
    let storage = MemoryStorage::new();

    assert!(!storage.exists("file").await.unwrap());
    storage
        .save("file", Bytes::from_static(b"data"))
        .await
        .unwrap();
    assert!(storage.exists("file").await.unwrap());

    storage.delete("file").await.unwrap();
    assert!(!storage.exists("file").await.unwrap());

    // Idempotent.
    storage.delete("file").await.unwrap();
}

#[tokio::test]
async fn empty_name_is_rejected() {
    let storage = MemoryStorage::new();

    let err = storage.open("").await.unwrap_err();
    assert!(matches!(err, Error::InvalidName(_)));

    let err = storage.save("", Bytes::new()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidName(_)));
}

#[tokio::test]
async fn clones_share_contents() {
    let storage = MemoryStorage::new();
    let handle = storage.clone();

    storage
        .save("shared", Bytes::from_static(b"data"))
        .await
        .unwrap();
    assert!(handle.exists("shared").await.unwrap());
}

#[tokio::test]
async fn transport_fault_fails_every_operation() {
    let storage = MemoryStorage::new();
    storage
        .save("file", Bytes::from_static(b"data"))
        .await
        .unwrap();

    storage.set_fault(Some(Fault::Transport));

    assert!(matches!(
        storage.open("file").await.unwrap_err(),
        Error::Transport { .. }
    ));
    assert!(matches!(
        storage.save("file", Bytes::new()).await.unwrap_err(),
        Error::Transport { .. }
    ));
    assert!(matches!(
        storage.exists("file").await.unwrap_err(),
        Error::Transport { .. }
    ));
    assert!(matches!(
        storage.delete("file").await.unwrap_err(),
        Error::Transport { .. }
    ));
}

#[tokio::test]
async fn broken_stream_fault_defers_failure_to_first_read() {
    let storage = MemoryStorage::new();
    storage
        .save("file", Bytes::from_static(b"data"))
        .await
        .unwrap();
    storage.set_fault(Some(Fault::BrokenStream));

    // The descriptor comes back fine; the error surfaces on the first poll.
    let mut stream = storage.open("file").await.unwrap();
    let err = stream.probe().await.unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
}

#[tokio::test]
async fn healing_restores_service() {
    let storage = MemoryStorage::new();
    storage
        .save("file", Bytes::from_static(b"data"))
        .await
        .unwrap();

    storage.set_fault(Some(Fault::Transport));
    assert!(storage.open("file").await.is_err());

    storage.set_fault(None);
    assert_eq!(
        storage.get_bytes("file").await.unwrap(),
        Bytes::from_static(b"data")
    );
}

#[tokio::test]
async fn zero_length_object_round_trips() {
    let storage = MemoryStorage::new();
    storage.save("empty", Bytes::new()).await.unwrap();

    let mut stream = storage.open("empty").await.unwrap();
    stream.probe().await.unwrap();
    assert_eq!(stream.bytes().await.unwrap(), Bytes::new());
}
