//! # WAL — Write-Ahead Log for shard writes
//!
//! Makes every physical write to a shard file crash-safe.
//!
//! Before a shard is mutated, the exact bytes about to be written (and where
//! they go) are serialized to a sibling `<shard>.wal` file and fsynced. Only
//! then is the shard itself written, fsynced, and the WAL removed. If the
//! process dies anywhere in between, the next access to the shard finds the
//! WAL and replays it. Replaying a write that already reached the shard is a
//! no-op, so replay is always safe.
//!
//! ## Binary Record Format
//!
//! ```text
//! [total_len: u32 BE][truncate_flag: u32 BE][write_offset: u32 BE][data_len: u32 BE][data ...]
//! ```
//!
//! `total_len` is `16 + data_len`. `truncate_flag == 0` means the shard is
//! truncated to `write_offset + data_len` after the write; any other value
//! leaves the file length alone.
//!
//! A WAL whose byte length is below 16 or disagrees with `total_len` never
//! finished its own fsync and is discarded without replay.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wal::WalRecord;
//!
//! let rec = WalRecord::overwrite(0, vec![1, 2, 3]);
//! rec.commit("shard.dat").unwrap();
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Size of the fixed WAL header in bytes.
pub const HEADER_BYTES: usize = 16;

/// A single pending write against a shard file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// Truncate the shard to `offset + data.len()` after writing.
    pub truncate: bool,
    /// Byte offset in the shard where `data` is written.
    pub offset: u32,
    pub data: Vec<u8>,
}

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The declared length does not match the bytes on disk.
    #[error("corrupt wal: declared {declared} bytes, found {actual}")]
    Corrupt { declared: u64, actual: u64 },
}

/// Outcome of [`recover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// No WAL was present.
    Clean,
    /// A valid WAL was applied to the shard and removed.
    Replayed,
    /// A torn WAL was removed without touching the shard.
    Discarded,
}

/// Returns the `<shard>.wal` sibling of `shard`.
pub fn wal_path(shard: &Path) -> PathBuf {
    sibling(shard, ".wal")
}

/// Returns the `<shard>.lock` sibling of `shard`.
pub fn lock_path(shard: &Path) -> PathBuf {
    sibling(shard, ".lock")
}

fn sibling(shard: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = shard.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl WalRecord {
    /// A write that replaces everything from `offset` to the end of the file.
    pub fn tail(offset: u32, data: Vec<u8>) -> Self {
        Self {
            truncate: true,
            offset,
            data,
        }
    }

    /// An in-place write that leaves the file length unchanged.
    pub fn overwrite(offset: u32, data: Vec<u8>) -> Self {
        Self {
            truncate: false,
            offset,
            data,
        }
    }

    /// Serializes the record into its on-disk form.
    pub fn encode(&self) -> Result<Vec<u8>, WalError> {
        let total = HEADER_BYTES as u64 + self.data.len() as u64;
        if total > u64::from(u32::MAX) {
            return Err(WalError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "WAL record too large (exceeds u32::MAX bytes)",
            )));
        }

        let mut buf = Vec::with_capacity(total as usize);
        buf.write_u32::<BigEndian>(total as u32)?;
        // 0 = truncate, anything else = keep length
        buf.write_u32::<BigEndian>(if self.truncate { 0 } else { 1 })?;
        buf.write_u32::<BigEndian>(self.offset)?;
        buf.write_u32::<BigEndian>(self.data.len() as u32)?;
        buf.extend_from_slice(&self.data);
        Ok(buf)
    }

    /// Parses a WAL file image, validating its declared length.
    pub fn decode(bytes: &[u8]) -> Result<Self, WalError> {
        let actual = bytes.len() as u64;
        if bytes.len() < HEADER_BYTES {
            return Err(WalError::Corrupt {
                declared: HEADER_BYTES as u64,
                actual,
            });
        }

        let mut r = bytes;
        let declared = u64::from(r.read_u32::<BigEndian>()?);
        if declared != actual {
            return Err(WalError::Corrupt { declared, actual });
        }
        let truncate = r.read_u32::<BigEndian>()? == 0;
        let offset = r.read_u32::<BigEndian>()?;
        let data_len = r.read_u32::<BigEndian>()? as usize;
        if data_len != r.len() {
            return Err(WalError::Corrupt {
                declared: (HEADER_BYTES + data_len) as u64,
                actual,
            });
        }

        Ok(Self {
            truncate,
            offset,
            data: r.to_vec(),
        })
    }

    /// Applies the write to an open shard file and fsyncs it.
    ///
    /// Idempotent: applying the same record twice leaves the same bytes.
    pub fn apply_to(&self, file: &mut File) -> Result<(), WalError> {
        file.seek(SeekFrom::Start(u64::from(self.offset)))?;
        file.write_all(&self.data)?;
        if self.truncate {
            file.set_len(u64::from(self.offset) + self.data.len() as u64)?;
        }
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    /// Runs the full WAL protocol for this write against `shard`:
    ///
    /// 1. write `<shard>.wal` and fsync it,
    /// 2. apply the write to `shard` and fsync it,
    /// 3. delete the WAL.
    pub fn commit<P: AsRef<Path>>(&self, shard: P) -> Result<(), WalError> {
        let shard = shard.as_ref();
        let wal = wal_path(shard);

        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&wal)?;
            f.write_all(&self.encode()?)?;
            f.flush()?;
            f.sync_all()?;
        }

        let mut f = open_shard(shard)?;
        self.apply_to(&mut f)?;
        drop(f);

        fs::remove_file(&wal)?;
        debug!(
            shard = %shard.display(),
            offset = self.offset,
            len = self.data.len(),
            truncate = self.truncate,
            "committed shard write"
        );
        Ok(())
    }
}

fn open_shard(shard: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(shard)
}

/// Completes or discards a pending WAL for `shard`, if any.
///
/// Must be called with the shard's lock held, before the shard is read.
///
/// # Errors
///
/// Returns `WalError::Io` if the WAL exists but cannot be read, applied or
/// removed. A torn WAL is not an error: it is removed and reported as
/// [`Recovery::Discarded`].
pub fn recover<P: AsRef<Path>>(shard: P) -> Result<Recovery, WalError> {
    let shard = shard.as_ref();
    let wal = wal_path(shard);

    let mut bytes = Vec::new();
    match File::open(&wal) {
        Ok(mut f) => {
            f.read_to_end(&mut bytes)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Recovery::Clean),
        Err(e) => return Err(WalError::Io(e)),
    }

    match WalRecord::decode(&bytes) {
        Ok(rec) => {
            let mut f = open_shard(shard)?;
            rec.apply_to(&mut f)?;
            drop(f);
            fs::remove_file(&wal)?;
            info!(
                shard = %shard.display(),
                offset = rec.offset,
                len = rec.data.len(),
                "replayed pending shard write"
            );
            Ok(Recovery::Replayed)
        }
        Err(WalError::Corrupt { declared, actual }) => {
            warn!(
                shard = %shard.display(),
                declared,
                actual,
                "discarding torn wal"
            );
            fs::remove_file(&wal)?;
            Ok(Recovery::Discarded)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests;
