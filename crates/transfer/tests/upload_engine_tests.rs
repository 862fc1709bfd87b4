//! Upload engine protocol tests
//!
//! These tests drive the engine against the scripted client:
//! - Single-part and multi-part paths, including empty archives
//! - Exact part boundaries and ordering
//! - Independent retry budgets per call, fatal short-circuit
//! - State transitions reported to the observer

use frostline_core::{ArchiveBlob, MemoryBlob, PlanError};
use frostline_transfer::testing::{Call, RecordingObserver, ScriptedClient};
use frostline_transfer::{
    tree_hash, FailureKind, Operation, RetryPolicy, TransferEvent, UploadEngine, UploadError,
    UploadState,
};
use std::io;
use std::sync::Arc;

fn engine(client: &Arc<ScriptedClient>, part_size: u64) -> (UploadEngine, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    let engine = UploadEngine::new(client.clone(), part_size)
        .with_retry_policy(RetryPolicy::immediate(10))
        .with_observer(observer.clone());
    (engine, observer)
}

fn data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn part_calls(client: &ScriptedClient) -> Vec<(u64, u64, u64)> {
    client
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::UploadPart {
                index,
                start,
                length,
                ..
            } => Some((index, start, length)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_single_part_upload() {
    let client = Arc::new(ScriptedClient::new());
    let (engine, observer) = engine(&client, 128);
    let blob = MemoryBlob::new("docs_2024-01-01", data(100));

    let receipt = engine.upload(&blob, "vault", "Directory: /docs").unwrap();

    assert!(!receipt.is_multi_part);
    assert_eq!(receipt.size_bytes, 100);
    assert_eq!(receipt.remote_location, format!("/vault/archives/{}", receipt.remote_id));
    assert_eq!(client.archive(&receipt.remote_id).unwrap(), data(100));
    assert_eq!(client.count(Operation::UploadSingle), 1);
    assert_eq!(client.count(Operation::InitiateMultipart), 0);
    assert_eq!(
        observer.states(),
        vec![UploadState::Planning, UploadState::SinglePart, UploadState::Done]
    );
}

#[test]
fn test_description_passed_through() {
    let client = Arc::new(ScriptedClient::new());
    let (engine, _) = engine(&client, 128);
    let blob = MemoryBlob::new("a", data(10));

    engine
        .upload(&blob, "vault", "Directory: /home/me/My Docs. Archive: a")
        .unwrap();

    assert_eq!(
        client.calls()[0],
        Call::UploadSingle {
            vault: "vault".to_string(),
            description: "Directory: /home/me/My Docs. Archive: a".to_string(),
            length: 10,
        }
    );
}

#[test]
fn test_empty_archive_is_one_single_part_upload() {
    let client = Arc::new(ScriptedClient::new());
    let (engine, _) = engine(&client, 128);
    let blob = MemoryBlob::new("empty", Vec::new());

    let receipt = engine.upload(&blob, "vault", "empty").unwrap();

    assert!(!receipt.is_multi_part);
    assert_eq!(receipt.size_bytes, 0);
    assert_eq!(client.count(Operation::UploadSingle), 1);
    assert_eq!(client.archive(&receipt.remote_id).unwrap(), Vec::<u8>::new());
}

#[test]
fn test_archive_equal_to_part_size_is_single_part() {
    let client = Arc::new(ScriptedClient::new());
    let (engine, _) = engine(&client, 128);
    let blob = MemoryBlob::new("exact", data(128));

    let receipt = engine.upload(&blob, "vault", "exact").unwrap();
    assert!(!receipt.is_multi_part);
    assert_eq!(client.count(Operation::UploadPart), 0);
}

#[test]
fn test_single_part_succeeds_on_tenth_attempt() {
    let client = Arc::new(ScriptedClient::new());
    client.fail_next(Operation::UploadSingle, FailureKind::Transient, 9);
    let (engine, observer) = engine(&client, 128);
    let blob = MemoryBlob::new("flaky", data(50));

    let receipt = engine.upload(&blob, "vault", "flaky").unwrap();

    assert_eq!(client.count(Operation::UploadSingle), 10);
    // The receipt is the one returned by the successful tenth call
    assert_eq!(client.archive_count(), 1);
    assert_eq!(client.archive(&receipt.remote_id).unwrap(), data(50));

    let failures = observer
        .events()
        .iter()
        .filter(|e| matches!(e, TransferEvent::AttemptFailed { .. }))
        .count();
    assert_eq!(failures, 9);
}

#[test]
fn test_single_part_exhausts_after_ten_attempts() {
    let client = Arc::new(ScriptedClient::new());
    client.fail_always(Operation::UploadSingle, FailureKind::Transient);
    let (engine, observer) = engine(&client, 128);
    let blob = MemoryBlob::new("doomed_2024-01-01", data(50));

    let err = engine.upload(&blob, "vault", "doomed").unwrap_err();

    match &err {
        UploadError::Exhausted {
            archive,
            operation,
            attempts,
            ..
        } => {
            assert_eq!(archive, "doomed_2024-01-01");
            assert_eq!(*operation, Operation::UploadSingle);
            assert_eq!(*attempts, 10);
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert!(err.to_string().contains("doomed_2024-01-01"));
    assert_eq!(client.count(Operation::UploadSingle), 10);
    assert_eq!(client.archive_count(), 0);
    assert_eq!(observer.states().last(), Some(&UploadState::Failed));
}

#[test]
fn test_fatal_failure_is_not_retried() {
    let client = Arc::new(ScriptedClient::new());
    client.fail_next(Operation::UploadSingle, FailureKind::Fatal, 1);
    let (engine, observer) = engine(&client, 128);
    let blob = MemoryBlob::new("denied", data(50));

    let err = engine.upload(&blob, "vault", "denied").unwrap_err();

    assert!(matches!(
        err,
        UploadError::Fatal {
            operation: Operation::UploadSingle,
            ..
        }
    ));
    assert_eq!(client.count(Operation::UploadSingle), 1);
    assert_eq!(
        observer.states(),
        vec![UploadState::Planning, UploadState::SinglePart, UploadState::Failed]
    );
}

#[test]
fn test_multi_part_boundaries_and_order() {
    let client = Arc::new(ScriptedClient::new());
    let (engine, observer) = engine(&client, 128);
    let blob = MemoryBlob::new("big", data(300));

    let receipt = engine.upload(&blob, "vault", "big").unwrap();

    assert!(receipt.is_multi_part);
    assert_eq!(receipt.size_bytes, 300);
    assert_eq!(
        part_calls(&client),
        vec![(0, 0, 128), (1, 128, 128), (2, 256, 44)]
    );
    assert_eq!(client.archive(&receipt.remote_id).unwrap(), data(300));

    let complete = client
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::CompleteMultipart {
                total_size,
                checksum,
                ..
            } => Some((total_size, checksum)),
            _ => None,
        })
        .unwrap();
    assert_eq!(complete, (300, tree_hash(&data(300))));

    assert_eq!(
        observer.states(),
        vec![
            UploadState::Planning,
            UploadState::MultiPartInitiating,
            UploadState::MultiPartUploading,
            UploadState::MultiPartCompleting,
            UploadState::Done,
        ]
    );
}

#[test]
fn test_multi_part_initiate_uses_configured_part_size() {
    let client = Arc::new(ScriptedClient::new());
    let (engine, _) = engine(&client, 64);
    let blob = MemoryBlob::new("big", data(200));

    engine.upload(&blob, "vault", "big").unwrap();

    assert!(matches!(
        &client.calls()[0],
        Call::InitiateMultipart { part_size: 64, .. }
    ));
}

#[test]
fn test_exact_multiple_has_no_empty_tail() {
    let client = Arc::new(ScriptedClient::new());
    let (engine, _) = engine(&client, 128);
    let blob = MemoryBlob::new("even", data(256));

    engine.upload(&blob, "vault", "even").unwrap();

    assert_eq!(part_calls(&client), vec![(0, 0, 128), (1, 128, 128)]);
}

#[test]
fn test_each_part_has_its_own_retry_budget() {
    let client = Arc::new(ScriptedClient::new());
    client.fail_next(Operation::InitiateMultipart, FailureKind::Transient, 9);
    client.fail_part(0, FailureKind::Transient, 9);
    client.fail_part(1, FailureKind::Transient, 9);
    client.fail_part(2, FailureKind::Transient, 9);
    client.fail_next(Operation::CompleteMultipart, FailureKind::Transient, 9);
    let (engine, _) = engine(&client, 128);
    let blob = MemoryBlob::new("stubborn", data(300));

    let receipt = engine.upload(&blob, "vault", "stubborn").unwrap();

    assert_eq!(client.count(Operation::InitiateMultipart), 10);
    assert_eq!(client.count(Operation::UploadPart), 30);
    assert_eq!(client.count(Operation::CompleteMultipart), 10);
    assert_eq!(client.archive(&receipt.remote_id).unwrap(), data(300));
}

#[test]
fn test_part_exhaustion_stops_upload() {
    let client = Arc::new(ScriptedClient::new());
    client.fail_part(1, FailureKind::Transient, 10);
    let (engine, _) = engine(&client, 128);
    let blob = MemoryBlob::new("broken", data(300));

    let err = engine.upload(&blob, "vault", "broken").unwrap_err();

    assert!(matches!(
        err,
        UploadError::Exhausted {
            operation: Operation::UploadPart,
            attempts: 10,
            ..
        }
    ));
    // Part 2 is never attempted once part 1 gives up
    let indices: Vec<u64> = part_calls(&client).iter().map(|(i, _, _)| *i).collect();
    assert_eq!(indices.iter().filter(|i| **i == 1).count(), 10);
    assert!(!indices.contains(&2));
    assert_eq!(client.count(Operation::CompleteMultipart), 0);
    assert_eq!(client.archive_count(), 0);
}

#[test]
fn test_fatal_initiation_fails_immediately() {
    let client = Arc::new(ScriptedClient::new());
    client.fail_next(Operation::InitiateMultipart, FailureKind::Fatal, 1);
    let (engine, observer) = engine(&client, 128);
    let blob = MemoryBlob::new("big", data(300));

    let err = engine.upload(&blob, "vault", "big").unwrap_err();

    assert!(matches!(
        err,
        UploadError::Fatal {
            operation: Operation::InitiateMultipart,
            ..
        }
    ));
    assert_eq!(client.count(Operation::UploadPart), 0);
    assert_eq!(
        observer.states(),
        vec![
            UploadState::Planning,
            UploadState::MultiPartInitiating,
            UploadState::Failed
        ]
    );
}

#[test]
fn test_invalid_part_size_is_planning_error() {
    let client = Arc::new(ScriptedClient::new());
    let (engine, _) = engine(&client, 100);
    let blob = MemoryBlob::new("odd", data(300));

    let err = engine.upload(&blob, "vault", "odd").unwrap_err();

    assert!(matches!(
        err,
        UploadError::Planning {
            source: PlanError::PartSizeNotPowerOfTwo(100),
            ..
        }
    ));
    assert!(client.calls().is_empty());
}

struct UnreadableBlob;

impl ArchiveBlob for UnreadableBlob {
    fn name(&self) -> &str {
        "unreadable"
    }

    fn size(&self) -> u64 {
        10
    }

    fn read_range(&self, _offset: u64, _length: u64) -> io::Result<Vec<u8>> {
        Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
    }
}

#[test]
fn test_blob_read_failure() {
    let client = Arc::new(ScriptedClient::new());
    let (engine, _) = engine(&client, 128);

    let err = engine.upload(&UnreadableBlob, "vault", "x").unwrap_err();

    assert!(matches!(err, UploadError::BlobRead { .. }));
    assert_eq!(err.archive(), "unreadable");
    assert!(client.calls().is_empty());
}
