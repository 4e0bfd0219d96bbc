/// Crash-safe read-modify-write access to a single shard file.
///
/// Every call holds an exclusive advisory lock on `<shard>.lock` for its
/// whole duration and completes any pending `<shard>.wal` before reading.
/// Every physical write goes through [`wal::WalRecord::commit`], so the shard
/// is only touched after the intended write is durable in the WAL.
use anyhow::{Context, Result};
use fs2::FileExt;
use record::Record;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use tracing::{debug, trace};
use wal::{Recovery, WalRecord};

use crate::buffer::{SearchResult, SortedRecordBuffer};

/// Counts of what an [`upsert`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Records dropped because the stored version was not older.
    pub stale: usize,
}

impl std::ops::AddAssign for UpsertSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.updated += rhs.updated;
        self.stale += rhs.stale;
    }
}

/// Exclusive advisory lock on a shard, released on drop.
struct ShardLock {
    file: File,
}

impl ShardLock {
    fn acquire(shard: &Path) -> Result<Self> {
        if let Some(parent) = shard.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let lock = wal::lock_path(shard);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock)
            .with_context(|| format!("failed to open lock {}", lock.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", lock.display()))?;
        Ok(Self { file })
    }
}

impl Drop for ShardLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Loads a shard into memory, recovering any pending write first.
///
/// A shard that does not exist yet loads as an empty buffer.
pub fn load<R: Record, P: AsRef<Path>>(shard: P) -> Result<SortedRecordBuffer<R>> {
    let shard = shard.as_ref();
    let _lock = ShardLock::acquire(shard)?;
    read_locked(shard)
}

/// Inserts or updates `records` in the shard with last-write-wins semantics.
///
/// Absent ids are inserted in `(time, id)` order. Present ids are replaced
/// only when the incoming record [`supersedes`](Record::supersedes) the
/// stored one; otherwise the incoming record is dropped.
///
/// All changes are applied to the in-memory image first. The file is then
/// brought up to date with one in-place write per replaced record lying
/// before the first insertion, plus one write of the whole tail from the
/// first insertion onward. Each write is WAL-protected, and every state
/// between them is a valid sorted shard.
pub fn upsert<R: Record, P: AsRef<Path>>(shard: P, records: &[R]) -> Result<UpsertSummary> {
    let shard = shard.as_ref();
    let _lock = ShardLock::acquire(shard)?;
    let mut buf: SortedRecordBuffer<R> = read_locked(shard)?;

    let mut summary = UpsertSummary::default();
    let mut first_insert: Option<usize> = None;
    let mut replaced: Vec<usize> = Vec::new();

    for rec in records {
        match buf.find(rec) {
            SearchResult::NotFound(index) => {
                let offset = buf.insert_at(index, rec);
                // earlier replacements at or after this offset have shifted
                for r in replaced.iter_mut().filter(|r| **r >= offset) {
                    *r += R::SIZE;
                }
                first_insert = Some(first_insert.map_or(offset, |f| f.min(offset)));
                summary.inserted += 1;
            }
            SearchResult::Found(index) => {
                let existing = buf.get(index)?;
                if !rec.supersedes(&existing) {
                    trace!(
                        id = rec.id(),
                        stored = existing.updated_time(),
                        incoming = rec.updated_time(),
                        "dropping stale write"
                    );
                    summary.stale += 1;
                    continue;
                }
                replaced.push(buf.replace_at(index, rec));
                summary.updated += 1;
            }
        }
    }

    let tail_from = first_insert.unwrap_or(usize::MAX);
    replaced.sort_unstable();
    replaced.dedup();
    for offset in replaced.into_iter().filter(|o| *o < tail_from) {
        let data = buf.as_bytes()[offset..offset + R::SIZE].to_vec();
        commit(shard, WalRecord::overwrite(to_u32(offset)?, data))?;
    }
    if let Some(offset) = first_insert {
        let data = buf.as_bytes()[offset..].to_vec();
        commit(shard, WalRecord::tail(to_u32(offset)?, data))?;
    }

    debug!(
        shard = %shard.display(),
        records = buf.len(),
        inserted = summary.inserted,
        updated = summary.updated,
        stale = summary.stale,
        "upserted shard"
    );
    Ok(summary)
}

/// Deletes a shard and any pending WAL under the shard's lock.
///
/// The `.lock` file itself is left in place: unlinking it would let a
/// later locker take a fresh inode while a current holder still owns the
/// old one. Returns whether the shard file existed.
pub fn remove<P: AsRef<Path>>(shard: P) -> Result<bool> {
    let shard = shard.as_ref();
    let _lock = ShardLock::acquire(shard)?;
    remove_if_exists(&wal::wal_path(shard))?;
    let existed = remove_if_exists(shard)?;
    debug!(shard = %shard.display(), existed, "removed shard");
    Ok(existed)
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

fn read_locked<R: Record>(shard: &Path) -> Result<SortedRecordBuffer<R>> {
    if wal::recover(shard)
        .with_context(|| format!("failed to recover wal for {}", shard.display()))?
        == Recovery::Replayed
    {
        debug!(shard = %shard.display(), "shard recovered from wal");
    }

    let bytes = match fs::read(shard) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", shard.display()))
        }
    };
    let buf = SortedRecordBuffer::from_bytes(bytes)
        .with_context(|| format!("corrupt shard {}", shard.display()))?;
    debug!(shard = %shard.display(), records = buf.len(), "loaded shard");
    Ok(buf)
}

fn commit(shard: &Path, rec: WalRecord) -> Result<()> {
    rec.commit(shard)
        .with_context(|| format!("failed to write {}", shard.display()))
}

fn to_u32(offset: usize) -> Result<u32> {
    u32::try_from(offset).context("shard exceeds 4 GiB")
}
