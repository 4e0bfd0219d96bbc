//! # FlipCache - week-bucketed in-memory flip index
//!
//! Holds every known flip in RAM, bucketed by week, so that "stats since T"
//! and paged views cost time proportional to the number of weeks touched
//! rather than the number of flips.
//!
//! ```text
//! weeks (ascending by start)
//! ┌──────────────┬──────────────┬─────┬──────────────┐
//! │ week 0       │ week 1       │ ... │ week n       │
//! │ total: Stats │ total: Stats │     │ total: Stats │
//! │ acc 1: [..]  │ acc 1: [..]  │     │ acc 2: [..]  │  flips sorted by (time, id)
//! │   stats      │ acc 2: [..]  │     │   stats      │
//! └──────────────┴──────────────┴─────┴──────────────┘
//! ```
//!
//! Aggregates are adjusted on every insert and remove, never recomputed.
//! Only the week containing a query's boundary is scanned.
//!
//! The cache does no I/O. It is filled from `FlipStore::load_all` on
//! startup and then fed the same batches that are merged into the store.
mod query;
mod stats;
mod week;

use anyhow::{anyhow, Result};
use record::{Flip, Record};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, trace};

pub use stats::Stats;
pub use week::{week_start, WEEK_SECS};
use week::Week;

/// Where the current version of a flip id lives.
#[derive(Debug, Clone)]
enum Slot {
    Live { account_id: u32, sort_time: u32 },
    /// Kept so that older versions arriving later cannot resurrect it.
    Deleted(Flip),
}

impl Slot {
    fn account_id(&self) -> u32 {
        match self {
            Slot::Live { account_id, .. } => *account_id,
            Slot::Deleted(f) => f.account_id,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    weeks: Vec<Week>,
    slots: HashMap<u128, Slot>,
    /// Most recent unfinished flip per (account, item).
    open: HashMap<(u32, u32), Flip>,
    epoch: u64,
    live: usize,
}

/// In-memory flip index with incrementally maintained statistics.
///
/// All methods lock one internal mutex; results are owned copies.
#[derive(Debug, Default)]
pub struct FlipCache {
    inner: Mutex<Inner>,
}

impl FlipCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch. Bumped by every [`reset`](FlipCache::reset).
    pub fn epoch(&self) -> Result<u64> {
        Ok(self.lock()?.epoch)
    }

    /// Number of live (non-deleted) flips.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.live)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Current version of flip `id`, if it is live.
    pub fn get(&self, id: u128) -> Result<Option<Flip>> {
        let inner = self.lock()?;
        let Some(Slot::Live {
            account_id,
            sort_time,
        }) = inner.slots.get(&id)
        else {
            return Ok(None);
        };
        Ok(inner
            .week(*sort_time)
            .and_then(|w| w.accounts.get(account_id))
            .and_then(|b| b.find(*sort_time, id))
            .cloned())
    }

    /// The unfinished flip of `item_id` on `account_id`, if any.
    pub fn last_open_flip(&self, account_id: u32, item_id: u32) -> Result<Option<Flip>> {
        Ok(self.lock()?.open.get(&(account_id, item_id)).cloned())
    }

    /// Merges a batch of flips, newest version of each id wins.
    ///
    /// When `guard` is `Some(epoch)` and the cache has been reset since that
    /// epoch was read, the batch is dropped and `false` is returned.
    pub fn merge_batch(&self, mut flips: Vec<Flip>, guard: Option<u64>) -> Result<bool> {
        let mut inner = self.lock()?;
        if let Some(epoch) = guard {
            if epoch != inner.epoch {
                debug!(epoch, current = inner.epoch, "dropping batch from old epoch");
                return Ok(false);
            }
        }

        // unfinished flips last, so they end up in the open index
        flips.sort_by_key(|f| (f.is_open(), f.sort_time(), f.id));
        let count = flips.len();
        for flip in flips {
            inner.merge_one(flip);
        }
        debug!(flips = count, live = inner.live, weeks = inner.weeks.len(), "merged batch");
        Ok(true)
    }

    /// Drops every flip of `account_id` from memory. Does not touch disk.
    pub fn delete_account(&self, account_id: u32) -> Result<()> {
        let mut inner = self.lock()?;
        let mut removed = 0usize;
        for week in &mut inner.weeks {
            if let Some(bucket) = week.accounts.remove(&account_id) {
                week.total -= bucket.stats;
                removed += bucket.flips.len();
            }
        }
        inner.weeks.retain(|w| !w.accounts.is_empty());
        inner.slots.retain(|_, slot| slot.account_id() != account_id);
        inner.open.retain(|(acc, _), _| *acc != account_id);
        inner.live -= removed;
        info!(account_id, removed, "dropped account from cache");
        Ok(())
    }

    /// Clears everything and starts a new epoch.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.lock()?;
        let epoch = inner.epoch + 1;
        *inner = Inner {
            epoch,
            ..Inner::default()
        };
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| anyhow!("flip cache lock poisoned: {}", e))
    }
}

impl Inner {
    fn week(&self, time: u32) -> Option<&Week> {
        let start = week_start(time);
        self.weeks
            .binary_search_by_key(&start, |w| w.start)
            .ok()
            .map(|i| &self.weeks[i])
    }

    fn week_mut(&mut self, time: u32) -> Option<&mut Week> {
        let start = week_start(time);
        match self.weeks.binary_search_by_key(&start, |w| w.start) {
            Ok(i) => Some(&mut self.weeks[i]),
            Err(_) => None,
        }
    }

    fn week_mut_or_insert(&mut self, time: u32) -> &mut Week {
        let start = week_start(time);
        let i = match self.weeks.binary_search_by_key(&start, |w| w.start) {
            Ok(i) => i,
            Err(i) => {
                self.weeks.insert(i, Week::new(start));
                i
            }
        };
        &mut self.weeks[i]
    }

    fn merge_one(&mut self, flip: Flip) {
        match self.slots.get(&flip.id).cloned() {
            Some(Slot::Live {
                account_id,
                sort_time,
            }) => {
                let Some(existing) = self
                    .week(sort_time)
                    .and_then(|w| w.accounts.get(&account_id))
                    .and_then(|b| b.find(sort_time, flip.id))
                else {
                    return;
                };
                if !flip.supersedes(existing) {
                    trace!(id = flip.id, "ignoring stale flip");
                    return;
                }
                if let Some(w) = self.week_mut(sort_time) {
                    w.remove(account_id, sort_time, flip.id);
                }
                self.live -= 1;
            }
            Some(Slot::Deleted(tombstone)) => {
                if !flip.supersedes(&tombstone) {
                    trace!(id = flip.id, "ignoring flip older than its tombstone");
                    return;
                }
            }
            None => {}
        }

        let key = (flip.account_id, flip.item_id);
        if flip.deleted || !flip.is_open() {
            if self.open.get(&key).map(|f| f.id) == Some(flip.id) {
                self.open.remove(&key);
            }
        } else {
            self.open.insert(key, flip.clone());
        }

        if flip.deleted {
            self.slots.insert(flip.id, Slot::Deleted(flip));
            return;
        }

        self.slots.insert(
            flip.id,
            Slot::Live {
                account_id: flip.account_id,
                sort_time: flip.sort_time(),
            },
        );
        self.week_mut_or_insert(flip.sort_time()).insert(flip);
        self.live += 1;
    }
}
