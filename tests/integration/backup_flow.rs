//! Full backup runs against the local vault store.

use std::fs;

use chrono::NaiveDate;
use frostline::{BackupError, SqliteLineageStore, StoreError, TransferEvent, UploadState};

use crate::common::*;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
}

#[test]
fn single_directory_backup_lands_in_vault_and_ledger() {
    let env = TestEnv::new();
    let dir = env.add_directory("Family Photos", 4096);

    let summary = env.runner().run_on(&env.options(&dir), day(1)).unwrap();
    assert_eq!(summary.completed.len(), 1);
    assert!(summary.is_clean());

    let active = env.active(&dir);
    assert_eq!(active.len(), 1);
    let entry = &active[0];
    assert_eq!(entry.vault, VAULT);
    assert!(!entry.is_multi_part);
    assert_eq!(
        entry.remote_location,
        format!("/{}/archives/{}", VAULT, entry.remote_archive_id)
    );

    let stored = env.vault.archive_path(VAULT, &entry.remote_archive_id);
    assert_eq!(fs::metadata(stored).unwrap().len(), entry.size_bytes);
    assert_eq!(
        env.vault.list_archives(VAULT).unwrap(),
        vec![entry.remote_archive_id.clone()]
    );
    assert!(env.temp_is_empty());
}

#[test]
fn recursive_backup_covers_every_child() {
    let env = TestEnv::new();
    let a = env.add_directory("a", 100);
    let b = env.add_directory("b", 100);
    env.add_directory(".hidden", 100);

    let summary = env
        .runner()
        .run_on(&env.options(&env.source()).recursive(true), day(1))
        .unwrap();

    assert_eq!(summary.completed.len(), 2);
    assert_eq!(env.active(&a).len(), 1);
    assert_eq!(env.active(&b).len(), 1);
    assert_eq!(env.vault.list_archives(VAULT).unwrap().len(), 2);
}

#[test]
fn missing_vault_fails_before_any_directory() {
    let env = TestEnv::new();
    let dir = env.add_directory("a", 100);

    let options = frostline::RunOptions::new(&dir, "no-such-vault");
    let err = env.runner().run_on(&options, day(1)).unwrap_err();

    assert!(matches!(err, BackupError::Preflight { .. }));
    assert!(env.active(&dir).is_empty());
    assert!(env.temp_is_empty());
}

#[test]
fn unusable_encryption_key_fails_before_any_directory() {
    let env = TestEnv::with(|config| {
        config.gpg_program = "/nonexistent/frostline-gpg".into();
    });
    let dir = env.add_directory("a", 100);

    let options = env.options(&dir).encrypt_for(Some("ABCD1234".to_string()));
    let err = env.runner().run_on(&options, day(1)).unwrap_err();

    assert!(matches!(err, BackupError::Recipient(_)));
    assert!(env.active(&dir).is_empty());
    assert!(env.vault.list_archives(VAULT).unwrap().is_empty());
    assert!(env.temp_is_empty());
}

#[test]
fn observer_sees_upload_lifecycle() {
    let env = TestEnv::new();
    let dir = env.add_directory("a", 100);

    env.runner().run_on(&env.options(&dir), day(1)).unwrap();

    assert_eq!(
        env.observer.states(),
        vec![UploadState::Planning, UploadState::SinglePart, UploadState::Done]
    );
    assert!(env
        .observer
        .events()
        .iter()
        .any(|e| matches!(e, TransferEvent::RotationPlanned { active: 1, expired: 0, .. })));
}

#[test]
fn lineage_survives_reopening_the_ledger() {
    let env = TestEnv::new();
    let dir = env.add_directory("a", 100);
    env.runner().run_on(&env.options(&dir), day(1)).unwrap();

    let reopened = SqliteLineageStore::open(&env.config.db_file).unwrap();
    assert_eq!(
        frostline::LineageStore::list_active(&reopened, &dir)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn foreign_ledger_file_is_rejected() {
    let env = TestEnv::new();
    let path = env.dir.path().join("not-a-db");
    fs::write(&path, pseudo_random(8192)).unwrap();

    assert!(matches!(
        SqliteLineageStore::open(&path),
        Err(StoreError::NotADatabase)
    ));
}
