/// Write path: `merge()` and `delete_account()`.
///
/// Incoming records are grouped by destination shard and each shard is
/// upserted once, under its own lock and WAL.
use anyhow::Result;
use record::Record;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::{RecordStore, UpsertSummary};

impl<R: Record> RecordStore<R> {
    /// Inserts or updates `records`, last write wins per id.
    ///
    /// Records are routed to the shard of their account and quarter; shards
    /// are created on first write. Stale versions are dropped and counted in
    /// the returned summary.
    ///
    /// # Errors
    ///
    /// Stops at the first shard that fails to load or write. Shards already
    /// written before the failure keep their changes.
    pub fn merge(&self, records: &[R]) -> Result<UpsertSummary> {
        let mut state = self.lock_state()?;

        let mut groups: BTreeMap<PathBuf, (shard::ShardDescriptor, Vec<R>)> = BTreeMap::new();
        for rec in records {
            let desc = self.naming.path_for(rec.account_id(), rec.time())?;
            groups
                .entry(desc.path.clone())
                .or_insert_with(|| (desc, Vec::new()))
                .1
                .push(rec.clone());
        }

        let mut total = UpsertSummary::default();
        for (_, (desc, batch)) in groups {
            let account_id = desc.account_id;
            // list before noting, so a first write does not hide older shards
            state.shards_for(&self.naming, account_id)?;

            total += shard::upsert(&desc.path, &batch)?;

            if let Some(max) = batch.iter().map(Record::updated_time).max() {
                state.note_update(account_id, max);
            }
            state.note_shard(desc);
        }

        debug!(
            kind = R::KIND,
            records = records.len(),
            inserted = total.inserted,
            updated = total.updated,
            stale = total.stale,
            "merged records"
        );
        Ok(total)
    }

    /// Deletes every shard of `account_id` and forgets its cached state.
    pub fn delete_account(&self, account_id: u32) -> Result<usize> {
        let mut state = self.lock_state()?;
        let removed = self.naming.delete_shards_for_account(account_id)?;
        state.shards.remove(&account_id);
        state.latest_update.remove(&account_id);
        info!(kind = R::KIND, account_id, removed, "deleted account");
        Ok(removed)
    }
}
