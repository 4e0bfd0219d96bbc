use super::*;
use std::fs;
use tempfile::tempdir;

// -------------------- Helpers --------------------

fn shard_with(dir: &Path, contents: &[u8]) -> PathBuf {
    let path = dir.join("v1_flips_a7_2025_q1.dat");
    fs::write(&path, contents).unwrap();
    path
}

// -------------------- Format --------------------

#[test]
fn header_layout_matches_format() {
    let rec = WalRecord::tail(8, vec![0xaa, 0xbb]);
    let bytes = rec.encode().unwrap();
    assert_eq!(bytes.len(), 18);
    assert_eq!(&bytes[0..4], &18u32.to_be_bytes());
    assert_eq!(&bytes[4..8], &0u32.to_be_bytes()); // truncate
    assert_eq!(&bytes[8..12], &8u32.to_be_bytes());
    assert_eq!(&bytes[12..16], &2u32.to_be_bytes());
    assert_eq!(&bytes[16..], &[0xaa, 0xbb]);

    let keep = WalRecord::overwrite(0, vec![1]).encode().unwrap();
    assert_ne!(&keep[4..8], &0u32.to_be_bytes());
}

#[test]
fn decode_accepts_what_encode_produces() {
    let rec = WalRecord::overwrite(112, vec![9; 84]);
    assert_eq!(WalRecord::decode(&rec.encode().unwrap()).unwrap(), rec);
}

#[test]
fn decode_rejects_short_and_mismatched_lengths() {
    assert!(matches!(
        WalRecord::decode(&[0, 0, 0]),
        Err(WalError::Corrupt { .. })
    ));

    let mut bytes = WalRecord::tail(0, vec![1, 2, 3, 4]).encode().unwrap();
    bytes.truncate(18); // torn write
    assert!(matches!(
        WalRecord::decode(&bytes),
        Err(WalError::Corrupt {
            declared: 20,
            actual: 18
        })
    ));
}

// -------------------- Apply / commit --------------------

#[test]
fn commit_writes_shard_and_removes_wal() {
    let dir = tempdir().unwrap();
    let shard = shard_with(dir.path(), b"aaaaaaaa");

    WalRecord::overwrite(2, b"XY".to_vec()).commit(&shard).unwrap();

    assert_eq!(fs::read(&shard).unwrap(), b"aaXYaaaa");
    assert!(!wal_path(&shard).exists());
}

#[test]
fn tail_write_truncates_file() {
    let dir = tempdir().unwrap();
    let shard = shard_with(dir.path(), b"0123456789");

    WalRecord::tail(4, b"ab".to_vec()).commit(&shard).unwrap();

    assert_eq!(fs::read(&shard).unwrap(), b"0123ab");
}

#[test]
fn commit_creates_missing_shard() {
    let dir = tempdir().unwrap();
    let shard = dir.path().join("new.dat");

    WalRecord::tail(0, b"hello".to_vec()).commit(&shard).unwrap();

    assert_eq!(fs::read(&shard).unwrap(), b"hello");
}

#[test]
fn applying_twice_equals_applying_once() {
    let dir = tempdir().unwrap();
    let once = shard_with(dir.path(), b"abcdefgh");
    let twice = dir.path().join("twice.dat");
    fs::write(&twice, b"abcdefgh").unwrap();

    let rec = WalRecord::tail(3, b"ZZZZZZZZ".to_vec());
    let mut f = OpenOptions::new().read(true).write(true).open(&once).unwrap();
    rec.apply_to(&mut f).unwrap();

    let mut f = OpenOptions::new().read(true).write(true).open(&twice).unwrap();
    rec.apply_to(&mut f).unwrap();
    rec.apply_to(&mut f).unwrap();

    assert_eq!(fs::read(&once).unwrap(), fs::read(&twice).unwrap());
}

// -------------------- Recovery --------------------

#[test]
fn recover_without_wal_is_clean() {
    let dir = tempdir().unwrap();
    let shard = shard_with(dir.path(), b"data");
    assert_eq!(recover(&shard).unwrap(), Recovery::Clean);
    assert_eq!(fs::read(&shard).unwrap(), b"data");
}

#[test]
fn recover_replays_interrupted_write() {
    let dir = tempdir().unwrap();
    let shard = shard_with(dir.path(), b"aaaa");

    // crash after the WAL fsync, before the shard was touched
    let rec = WalRecord::tail(4, b"bbbb".to_vec());
    fs::write(wal_path(&shard), rec.encode().unwrap()).unwrap();

    assert_eq!(recover(&shard).unwrap(), Recovery::Replayed);
    assert_eq!(fs::read(&shard).unwrap(), b"aaaabbbb");
    assert!(!wal_path(&shard).exists());
}

#[test]
fn recover_after_completed_write_is_noop() {
    let dir = tempdir().unwrap();
    let shard = shard_with(dir.path(), b"aaaa");

    // crash after the shard fsync, before the WAL was removed
    let rec = WalRecord::overwrite(1, b"XX".to_vec());
    let mut f = OpenOptions::new().read(true).write(true).open(&shard).unwrap();
    rec.apply_to(&mut f).unwrap();
    drop(f);
    fs::write(wal_path(&shard), rec.encode().unwrap()).unwrap();

    assert_eq!(recover(&shard).unwrap(), Recovery::Replayed);
    assert_eq!(fs::read(&shard).unwrap(), b"aXXa");
}

#[test]
fn recover_discards_torn_wal() {
    let dir = tempdir().unwrap();
    let shard = shard_with(dir.path(), b"aaaa");

    let mut bytes = WalRecord::tail(0, b"zzzzzzzz".to_vec()).encode().unwrap();
    bytes.truncate(bytes.len() - 3);
    fs::write(wal_path(&shard), bytes).unwrap();

    assert_eq!(recover(&shard).unwrap(), Recovery::Discarded);
    assert_eq!(fs::read(&shard).unwrap(), b"aaaa");
    assert!(!wal_path(&shard).exists());
}

#[test]
fn sibling_paths_append_suffix() {
    let shard = Path::new("/tmp/v1_flips_a1_2024_q3.dat");
    assert_eq!(
        wal_path(shard),
        PathBuf::from("/tmp/v1_flips_a1_2024_q3.dat.wal")
    );
    assert_eq!(
        lock_path(shard),
        PathBuf::from("/tmp/v1_flips_a1_2024_q3.dat.lock")
    );
}
