//! Archives larger than one part go through the multi-part protocol.

use std::fs;

use chrono::NaiveDate;
use frostline::{
    tree_hash, ArchiveBlob, FileBlob, MemoryBlob, TransferEvent, UploadEngine, UploadState,
};

use crate::common::*;

const PART: u64 = 1024 * 1024;

#[test]
fn large_directory_uploads_in_parts() {
    let env = TestEnv::with(|config| {
        config.part_size = PART;
        config.compression = "none".to_string();
    });
    let dir = env.add_directory("big", 2 * PART as usize + 4096);

    let summary = env
        .runner()
        .run_on(&env.options(&dir), NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
        .unwrap();
    let entry = &summary.completed[0].entry;
    assert!(entry.is_multi_part);
    assert!(entry.size_bytes > 2 * PART);

    let planned = env.observer.events().into_iter().find_map(|e| match e {
        TransferEvent::Planned { plan, .. } => Some(plan),
        _ => None,
    });
    assert_eq!(planned.unwrap().part_count, 3);
    assert_eq!(env.vault.open_sessions(VAULT).unwrap(), 0);

    let stored = env.vault.archive_path(VAULT, &entry.remote_archive_id);
    assert_eq!(fs::metadata(stored).unwrap().len(), entry.size_bytes);
}

#[test]
fn reassembled_archive_matches_source_bytes() {
    let env = TestEnv::new();
    let data = pseudo_random(3 * PART as usize + 17);
    let engine = UploadEngine::new(env.vault.clone(), PART).with_retry_policy(env.retry());

    let receipt = engine
        .upload(&MemoryBlob::new("blob", data.clone()), VAULT, "raw bytes")
        .unwrap();
    assert!(receipt.is_multi_part);

    let stored = env.vault.archive_path(VAULT, &receipt.remote_id);
    let blob = FileBlob::open(&stored, "stored").unwrap();
    assert_eq!(blob.size(), data.len() as u64);
    assert_eq!(fs::read(&stored).unwrap(), data);
    assert_eq!(tree_hash(&fs::read(&stored).unwrap()), tree_hash(&data));
}

#[test]
fn archive_of_exactly_one_part_is_single_part() {
    let env = TestEnv::new();
    let observer = env.observer.clone();
    let engine = UploadEngine::new(env.vault.clone(), PART)
        .with_retry_policy(env.retry())
        .with_observer(observer.clone());

    let receipt = engine
        .upload(
            &MemoryBlob::new("exact", pseudo_random(PART as usize)),
            VAULT,
            "exact",
        )
        .unwrap();

    assert!(!receipt.is_multi_part);
    assert!(observer.states().contains(&UploadState::SinglePart));
}
