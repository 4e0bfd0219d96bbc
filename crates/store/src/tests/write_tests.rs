use super::helpers::*;
use crate::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

// --------------------- merge ---------------------

#[test]
fn merge_is_last_write_wins_in_either_order() -> Result<()> {
    let dir = tempdir()?;
    let store = FlipStore::open(dir.path())?;

    let mut old = flip(1, 5, Q1_2025, 10);
    old.profit = 1;
    let mut new = flip(1, 5, Q1_2025, 20);
    new.profit = 2;

    store.merge(&[new.clone()])?;
    let summary = store.merge(&[old.clone()])?;
    assert_eq!(summary.stale, 1);

    let mut stored = Vec::new();
    store.load_all(&[1], |_, flips| {
        stored.extend(flips);
        true
    })?;
    assert_eq!(stored, vec![new.clone()]);

    let dir2 = tempdir()?;
    let store2 = FlipStore::open(dir2.path())?;
    store2.merge(&[old])?;
    let summary = store2.merge(&[new.clone()])?;
    assert_eq!(summary.updated, 1);
    let mut stored = Vec::new();
    store2.load_all(&[1], |_, flips| {
        stored.extend(flips);
        true
    })?;
    assert_eq!(stored, vec![new]);
    Ok(())
}

#[test]
fn tombstones_stay_on_disk() -> Result<()> {
    let dir = tempdir()?;
    let store = FlipStore::open(dir.path())?;
    store.merge(&[flip(1, 5, Q1_2025, 10)])?;
    let mut dead = flip(1, 5, Q1_2025, 11);
    dead.deleted = true;
    store.merge(&[dead])?;

    let mut stored = Vec::new();
    store.load_all(&[1], |_, flips| {
        stored.extend(flips);
        true
    })?;
    assert_eq!(stored.len(), 1);
    assert!(stored[0].deleted);
    Ok(())
}

#[test]
fn first_write_to_new_quarter_keeps_existing_shards_visible() -> Result<()> {
    let dir = tempdir()?;
    TransactionStore::open(dir.path())?.merge(&[tx(7, 1, Q1_2025 + 1)])?;

    let store = TransactionStore::open(dir.path())?;
    store.merge(&[tx(7, 2, Q2_2025 + 1)])?;

    let got = store.load_between(&[7], 0, u32::MAX, None, 10)?;
    assert_eq!(keys(&got), vec![(Q2_2025 + 1, 2), (Q1_2025 + 1, 1)]);
    Ok(())
}

#[test]
fn shards_created_elsewhere_need_refresh() -> Result<()> {
    let dir = tempdir()?;
    let store = TransactionStore::open(dir.path())?;
    store.merge(&[tx(7, 1, Q1_2025 + 1)])?;

    let other = TransactionStore::open(dir.path())?;
    other.merge(&[tx(7, 2, Q2_2025 + 1)])?;

    assert_eq!(store.load_between(&[7], 0, u32::MAX, None, 10)?.len(), 1);
    store.refresh(7)?;
    assert_eq!(store.load_between(&[7], 0, u32::MAX, None, 10)?.len(), 2);
    Ok(())
}

#[test]
fn recovers_pending_wal_on_read() -> Result<()> {
    let dir = tempdir()?;
    let store = TransactionStore::open(dir.path())?;
    store.merge(&[tx(7, 1, Q1_2025 + 1)])?;

    let shard = dir.path().join("v1_transactions_a7_2025_q1.dat");
    let pending = tx(7, 2, Q1_2025 + 2);
    let rec = wal::WalRecord::tail(56, record::Record::encode(&pending));
    fs::write(wal::wal_path(&shard), rec.encode()?)?;

    let got = store.load_between(&[7], 0, u32::MAX, None, 10)?;
    assert_eq!(keys(&got), vec![(Q1_2025 + 2, 2), (Q1_2025 + 1, 1)]);
    Ok(())
}

// --------------------- delete_account ---------------------

#[test]
fn delete_account_removes_files_and_cache() -> Result<()> {
    let dir = tempdir()?;
    let store = TransactionStore::open(dir.path())?;
    store.merge(&[tx(7, 1, Q1_2025), tx(7, 2, Q2_2025), tx(8, 3, Q1_2025)])?;

    assert_eq!(store.delete_account(7)?, 2);
    assert!(store.load_between(&[7], 0, u32::MAX, None, 10)?.is_empty());
    assert_eq!(store.latest_update(7)?, None);
    assert_eq!(store.load_between(&[8], 0, u32::MAX, None, 10)?.len(), 1);
    assert!(!dir.path().join("v1_transactions_a7_2025_q1.dat").exists());
    assert!(!dir.path().join("v1_transactions_a7_2025_q2.dat").exists());
    Ok(())
}

#[test]
fn template_names_kind() {
    assert_eq!(
        shard_template("flips"),
        "v1_flips_a{acc_id}_{year}_q{quarter}.dat"
    );
}
