//! # Store - account-sharded record store
//!
//! Ties [`shard`] files together into one store per record kind. Records are
//! partitioned by account and calendar quarter; the store knows which shard
//! files exist for each account, routes writes to the right shard, and merges
//! per-shard reads back into one ordering.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌────────────────────────────────────────────────┐
//! │                RECORD STORE                    │
//! │                                                │
//! │ write.rs → group by (account, quarter)         │
//! │              |                                 │
//! │              v                                 │
//! │           shard::upsert (lock + WAL) per shard │
//! │                                                │
//! │ read.rs  → cached shard list per account       │
//! │              |                                 │
//! │              v                                 │
//! │           shard::load → descending_range       │
//! │              |                                 │
//! │              v                                 │
//! │           merge across shards and accounts     │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module    | Purpose                                              |
//! |-----------|------------------------------------------------------|
//! | [`lib.rs`]| `RecordStore` struct, constructor, cached state      |
//! | [`read`]  | `load_between()`, `load_all()`                       |
//! | [`write`] | `merge()`, `delete_account()`                        |
//!
//! ## Shard list cache
//!
//! The shard files of an account are listed once, the first time the
//! account is touched, and then kept up to date by this store's own writes.
//! Only one process is expected to write a data directory; files created by
//! anything else become visible after [`RecordStore::refresh`].
mod read;
mod write;

use anyhow::{anyhow, Result};
use record::{Flip, Record, Transaction};
use shard::{ShardDescriptor, ShardNaming};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub use shard::UpsertSummary;

/// Store of completed transactions.
pub type TransactionStore = RecordStore<Transaction>;
/// Store of flips.
pub type FlipStore = RecordStore<Flip>;

/// Builds the shard filename template for a record kind.
#[must_use]
pub fn shard_template(kind: &str) -> String {
    format!("v1_{}_a{{acc_id}}_{{year}}_q{{quarter}}.dat", kind)
}

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    /// Known shards per account, ordered by start time.
    pub(crate) shards: HashMap<u32, Vec<ShardDescriptor>>,
    /// Highest last-modified time seen per account.
    pub(crate) latest_update: HashMap<u32, u32>,
}

/// A persistent, account-sharded store of one record kind.
///
/// Every public method takes the store's mutex for its whole duration, so
/// calls on one store are serialized. Shard files are additionally
/// protected by their own advisory locks.
pub struct RecordStore<R: Record> {
    pub(crate) naming: ShardNaming,
    pub(crate) state: Mutex<StoreState>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Record> std::fmt::Debug for RecordStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (accounts, shards) = match self.state.lock() {
            Ok(s) => (s.shards.len(), s.shards.values().map(Vec::len).sum::<usize>()),
            Err(_) => (0, 0),
        };
        f.debug_struct("RecordStore")
            .field("kind", &R::KIND)
            .field("dir", &self.naming.dir())
            .field("cached_accounts", &accounts)
            .field("cached_shards", &shards)
            .finish()
    }
}

impl<R: Record> RecordStore<R> {
    /// Opens the store rooted at `dir`.
    ///
    /// Nothing is read until an account is first touched; the directory
    /// is created lazily by the first write.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let naming = ShardNaming::new(dir, &shard_template(R::KIND))?;
        Ok(Self {
            naming,
            state: Mutex::new(StoreState::default()),
            _marker: PhantomData,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        self.naming.dir()
    }

    /// Highest last-modified time this store has seen for `account_id`,
    /// from `load_all` or `merge`.
    pub fn latest_update(&self, account_id: u32) -> Result<Option<u32>> {
        Ok(self.lock_state()?.latest_update.get(&account_id).copied())
    }

    /// Forgets the cached shard list of `account_id`; the next access
    /// rescans the directory.
    pub fn refresh(&self, account_id: u32) -> Result<()> {
        self.lock_state()?.shards.remove(&account_id);
        Ok(())
    }

    pub(crate) fn lock_state(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|e| anyhow!("store lock poisoned: {}", e))
    }
}

impl StoreState {
    /// Shards of `account_id`, listing the directory on first access.
    pub(crate) fn shards_for(
        &mut self,
        naming: &ShardNaming,
        account_id: u32,
    ) -> Result<&[ShardDescriptor]> {
        if !self.shards.contains_key(&account_id) {
            let listed = naming.list_shards_for(account_id)?;
            self.shards.insert(account_id, listed);
        }
        Ok(self
            .shards
            .get(&account_id)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    pub(crate) fn note_shard(&mut self, desc: ShardDescriptor) {
        let list = self.shards.entry(desc.account_id).or_default();
        if !list.iter().any(|d| d.path == desc.path) {
            let pos = list.partition_point(|d| d.start < desc.start);
            list.insert(pos, desc);
        }
    }

    pub(crate) fn note_update(&mut self, account_id: u32, updated_time: u32) {
        let latest = self.latest_update.entry(account_id).or_insert(0);
        *latest = (*latest).max(updated_time);
    }
}

#[cfg(test)]
mod tests;
