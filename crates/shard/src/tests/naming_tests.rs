use crate::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

const TEMPLATE: &str = "v1_transactions_a{acc_id}_{year}_q{quarter}.dat";

const Q1_2025: i64 = 1_735_689_600;
const Q2_2025: i64 = 1_743_465_600;
const Q4_2024: i64 = 1_727_740_800;
const Q1_2026: i64 = 1_767_225_600;

// -------------------- path_for --------------------

#[test]
fn path_for_fills_template_and_bounds() -> Result<()> {
    let dir = tempdir()?;
    let naming = ShardNaming::new(dir.path(), TEMPLATE)?;

    // 2025-02-15
    let desc = naming.path_for(7, 1_739_577_600)?;
    assert_eq!(desc.account_id, 7);
    assert_eq!((desc.year, desc.quarter), (2025, 1));
    assert_eq!((desc.start, desc.end), (Q1_2025, Q2_2025));
    assert_eq!(
        desc.path,
        dir.path().join("v1_transactions_a7_2025_q1.dat")
    );
    Ok(())
}

#[test]
fn quarter_boundaries_are_start_inclusive() -> Result<()> {
    let dir = tempdir()?;
    let naming = ShardNaming::new(dir.path(), TEMPLATE)?;

    assert_eq!(naming.path_for(1, Q2_2025 as u32)?.quarter, 2);
    assert_eq!(naming.path_for(1, (Q2_2025 - 1) as u32)?.quarter, 1);
    Ok(())
}

#[test]
fn fourth_quarter_ends_next_year() -> Result<()> {
    assert_eq!(quarter_bounds(2024, 4)?, (Q4_2024, Q1_2025));
    assert_eq!(quarter_bounds(2025, 4)?.1, Q1_2026);
    assert!(quarter_bounds(2025, 5).is_err());
    Ok(())
}

#[test]
fn template_without_placeholders_is_rejected() {
    assert!(ShardNaming::new("/tmp", "v1_transactions_{year}.dat").is_err());
}

// -------------------- list_shards --------------------

#[test]
fn missing_directory_lists_nothing() -> Result<()> {
    let dir = tempdir()?;
    let naming = ShardNaming::new(dir.path().join("nope"), TEMPLATE)?;
    assert!(naming.list_shards()?.is_empty());
    Ok(())
}

#[test]
fn list_parses_matching_files_and_skips_others() -> Result<()> {
    let dir = tempdir()?;
    for name in [
        "v1_transactions_a7_2025_q2.dat",
        "v1_transactions_a7_2025_q1.dat",
        "v1_transactions_a12_2024_q4.dat",
        "v1_transactions_a7_2025_q1.dat.wal",
        "v1_transactions_a7_2025_q1.dat.lock",
        "v1_transactions_a7_2025_q9.dat",
        "v1_transactions_ax_2025_q1.dat",
        "v1_flips_a7_2025_q1.dat",
        "notes.txt",
    ] {
        fs::write(dir.path().join(name), b"")?;
    }
    let naming = ShardNaming::new(dir.path(), TEMPLATE)?;

    let shards = naming.list_shards()?;
    let keys: Vec<(u32, i32, u32)> = shards
        .iter()
        .map(|d| (d.account_id, d.year, d.quarter))
        .collect();
    assert_eq!(keys, vec![(7, 2025, 1), (7, 2025, 2), (12, 2024, 4)]);

    let for_seven = naming.list_shards_for(7)?;
    assert_eq!(for_seven.len(), 2);
    assert_eq!(for_seven[0].start, Q1_2025);
    assert!(for_seven[0].overlaps(Q2_2025 - 10, Q2_2025 + 10));
    assert!(!for_seven[0].overlaps(Q2_2025, Q2_2025 + 10));
    Ok(())
}

#[test]
fn parse_inverts_path_for() -> Result<()> {
    let dir = tempdir()?;
    let naming = ShardNaming::new(dir.path(), TEMPLATE)?;
    let desc = naming.path_for(42, 1_760_000_000)?;
    let name = desc.path.file_name().and_then(|n| n.to_str()).unwrap();
    assert_eq!(naming.parse(name), Some(desc));
    Ok(())
}

// -------------------- delete --------------------

#[test]
fn delete_removes_only_that_accounts_files() -> Result<()> {
    let dir = tempdir()?;
    for name in [
        "v1_transactions_a7_2025_q1.dat",
        "v1_transactions_a7_2025_q1.dat.wal",
        "v1_transactions_a7_2025_q1.dat.lock",
        "v1_transactions_a7_2025_q2.dat",
        "v1_transactions_a8_2025_q1.dat",
    ] {
        fs::write(dir.path().join(name), b"")?;
    }
    let naming = ShardNaming::new(dir.path(), TEMPLATE)?;

    assert_eq!(naming.delete_shards_for_account(7)?, 2);

    let mut left: Vec<String> = fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    left.sort();
    // lock files outlive their shards
    assert_eq!(
        left,
        vec![
            "v1_transactions_a7_2025_q1.dat.lock".to_string(),
            "v1_transactions_a7_2025_q2.dat.lock".to_string(),
            "v1_transactions_a8_2025_q1.dat".to_string(),
        ]
    );
    assert_eq!(naming.list_shards_for(7)?, Vec::new());
    Ok(())
}
