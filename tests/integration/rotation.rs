//! Retention across repeated runs.

use chrono::NaiveDate;
use frostline::LineageStore;

use crate::common::*;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
}

#[test]
fn old_backups_are_removed_from_vault_and_ledger() {
    let env = TestEnv::with(|config| config.old_backups = 1);
    let dir = env.add_directory("docs", 512);
    let runner = env.runner();

    let mut ids = Vec::new();
    for d in 1..=4 {
        let summary = runner.run_on(&env.options(&dir), day(d)).unwrap();
        ids.push(summary.completed[0].entry.remote_archive_id.clone());
    }

    let active: Vec<String> = env
        .active(&dir)
        .into_iter()
        .map(|e| e.remote_archive_id)
        .collect();
    assert_eq!(active, ids[2..].to_vec());

    let mut stored = env.vault.list_archives(VAULT).unwrap();
    stored.sort();
    let mut expected = ids[2..].to_vec();
    expected.sort();
    assert_eq!(stored, expected);

    let history = env.store.history(&dir).unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history.iter().filter(|e| e.deleted).count(), 2);
}

#[test]
fn zero_retention_keeps_only_latest() {
    let env = TestEnv::new();
    let dir = env.add_directory("docs", 512);
    let runner = env.runner();

    runner.run_on(&env.options(&dir), day(1)).unwrap();
    let summary = runner.run_on(&env.options(&dir), day(2)).unwrap();

    assert_eq!(summary.rotated, 1);
    assert_eq!(env.active(&dir).len(), 1);
    assert_eq!(env.vault.list_archives(VAULT).unwrap().len(), 1);
}

#[test]
fn archive_missing_from_vault_stays_active_and_is_reported() {
    let env = TestEnv::new();
    let dir = env.add_directory("docs", 512);
    let runner = env.runner();

    let first = runner.run_on(&env.options(&dir), day(1)).unwrap();
    let first_id = first.completed[0].entry.remote_archive_id.clone();
    std::fs::remove_file(env.vault.archive_path(VAULT, &first_id)).unwrap();

    let summary = runner.run_on(&env.options(&dir), day(2)).unwrap();

    assert_eq!(summary.rotation_failures, 1);
    assert!(!summary.is_clean());
    let active = env.active(&dir);
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].remote_archive_id, first_id);
}
