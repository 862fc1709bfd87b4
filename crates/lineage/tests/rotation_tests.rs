//! Rotation against a scripted client and an in-memory ledger

use chrono::NaiveDate;
use frostline_core::NewLineageEntry;
use frostline_lineage::{LineageStore, RotationPolicy, SqliteLineageStore};
use frostline_transfer::testing::{Call, RecordingObserver, ScriptedClient};
use frostline_transfer::{FailureKind, Operation, TransferEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DIR: &str = "/data/photos";

fn seed(store: &SqliteLineageStore, ids: &[(&str, &str)]) {
    for (second, (id, vault)) in ids.iter().enumerate() {
        let when = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, second as u32)
            .unwrap();
        store
            .append_at(
                NewLineageEntry {
                    source_directory: PathBuf::from(DIR),
                    remote_archive_id: id.to_string(),
                    vault: vault.to_string(),
                    remote_location: format!("/{}/archives/{}", vault, id),
                    encryption_recipient: None,
                    is_multi_part: false,
                    size_bytes: 10,
                },
                when,
            )
            .unwrap();
    }
}

fn active_ids(store: &SqliteLineageStore) -> Vec<String> {
    store
        .list_active(Path::new(DIR))
        .unwrap()
        .into_iter()
        .map(|e| e.remote_archive_id)
        .collect()
}

#[test]
fn test_rotation_keeps_newest_two_with_retention_one() {
    let store = SqliteLineageStore::open_in_memory().unwrap();
    seed(&store, &[("a", "v"), ("b", "v"), ("c", "v")]);
    let client = ScriptedClient::new();

    let report = RotationPolicy::new(1)
        .rotate(Path::new(DIR), &client, &store)
        .unwrap();

    assert_eq!(report.active_before, 3);
    assert_eq!(report.deleted, vec!["a".to_string()]);
    assert!(report.is_clean());
    assert_eq!(client.deleted(), vec!["a".to_string()]);
    assert_eq!(active_ids(&store), vec!["b", "c"]);
}

#[test]
fn test_clock_stepping_back_never_expires_newest_entry() {
    let store = SqliteLineageStore::open_in_memory().unwrap();
    let at = |minute| {
        NaiveDate::from_ymd_opt(2024, 11, 3)
            .unwrap()
            .and_hms_opt(1, minute, 0)
            .unwrap()
    };
    let new = |id: &str| NewLineageEntry {
        source_directory: PathBuf::from(DIR),
        remote_archive_id: id.to_string(),
        vault: "v".to_string(),
        remote_location: format!("/v/archives/{}", id),
        encryption_recipient: None,
        is_multi_part: false,
        size_bytes: 10,
    };
    store.append_at(new("older"), at(50)).unwrap();
    store.append_at(new("just-written"), at(10)).unwrap();
    let client = ScriptedClient::new();

    let report = RotationPolicy::new(0)
        .rotate(Path::new(DIR), &client, &store)
        .unwrap();

    assert_eq!(report.deleted, vec!["older".to_string()]);
    assert_eq!(active_ids(&store), vec!["just-written"]);
}

#[test]
fn test_zero_retention_keeps_only_latest() {
    let store = SqliteLineageStore::open_in_memory().unwrap();
    seed(&store, &[("a", "v"), ("b", "v"), ("c", "v")]);
    let client = ScriptedClient::new();

    RotationPolicy::new(0)
        .rotate(Path::new(DIR), &client, &store)
        .unwrap();

    assert_eq!(client.deleted(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(active_ids(&store), vec!["c"]);
}

#[test]
fn test_nothing_to_rotate() {
    let store = SqliteLineageStore::open_in_memory().unwrap();
    seed(&store, &[("a", "v")]);
    let client = ScriptedClient::new();

    let report = RotationPolicy::new(3)
        .rotate(Path::new(DIR), &client, &store)
        .unwrap();

    assert!(report.deleted.is_empty());
    assert_eq!(client.count(Operation::DeleteRemote), 0);
}

#[test]
fn test_failed_delete_leaves_entry_active_and_continues() {
    let store = SqliteLineageStore::open_in_memory().unwrap();
    seed(&store, &[("a", "v"), ("b", "v"), ("c", "v"), ("d", "v")]);
    let client = ScriptedClient::new();
    client.fail_delete_of("a");
    let observer = Arc::new(RecordingObserver::new());

    let report = RotationPolicy::new(1)
        .with_observer(observer.clone())
        .rotate(Path::new(DIR), &client, &store)
        .unwrap();

    assert_eq!(report.deleted, vec!["b".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "a");
    assert!(!report.failed[0].1.is_transient());
    assert_eq!(active_ids(&store), vec!["a", "c", "d"]);

    let events = observer.events();
    assert!(events.iter().any(|e| matches!(
        e,
        TransferEvent::RemoteDeleteFailed { archive_id, .. } if archive_id == "a"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        TransferEvent::RotationPlanned { active: 4, expired: 2, .. }
    )));
}

#[test]
fn test_transient_delete_failure_is_not_retried() {
    let store = SqliteLineageStore::open_in_memory().unwrap();
    seed(&store, &[("a", "v"), ("b", "v"), ("c", "v")]);
    let client = ScriptedClient::new();
    client.fail_next(Operation::DeleteRemote, FailureKind::Transient, 1);

    let report = RotationPolicy::new(1)
        .rotate(Path::new(DIR), &client, &store)
        .unwrap();

    assert_eq!(client.count(Operation::DeleteRemote), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(active_ids(&store), vec!["a", "b", "c"]);
}

#[test]
fn test_failed_entry_is_retried_on_next_pass() {
    let store = SqliteLineageStore::open_in_memory().unwrap();
    seed(&store, &[("a", "v"), ("b", "v"), ("c", "v")]);
    let client = ScriptedClient::new();
    client.fail_next(Operation::DeleteRemote, FailureKind::Transient, 1);
    let policy = RotationPolicy::new(1);

    policy.rotate(Path::new(DIR), &client, &store).unwrap();
    assert_eq!(active_ids(&store), vec!["a", "b", "c"]);

    policy.rotate(Path::new(DIR), &client, &store).unwrap();
    assert_eq!(active_ids(&store), vec!["b", "c"]);
}

#[test]
fn test_delete_uses_vault_recorded_on_entry() {
    let store = SqliteLineageStore::open_in_memory().unwrap();
    seed(&store, &[("a", "old-vault"), ("b", "new-vault"), ("c", "new-vault")]);
    let client = ScriptedClient::new();

    RotationPolicy::new(1)
        .rotate(Path::new(DIR), &client, &store)
        .unwrap();

    assert!(client.calls().contains(&Call::DeleteRemote {
        vault: "old-vault".to_string(),
        archive_id: "a".to_string(),
    }));
}
