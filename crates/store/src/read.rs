/// Read path: `load_between()` and `load_all()`.
///
/// Shards are only sorted locally, so every read merges per-shard results:
/// first within an account, then across accounts.
use anyhow::Result;
use record::Record;
use std::collections::HashMap;
use tracing::debug;

use crate::RecordStore;

impl<R: Record> RecordStore<R> {
    /// Up to `limit` records of `account_ids` with `start <= time <= end`,
    /// newest first by `(time, id)`.
    ///
    /// For the next page pass the last returned record as `end = time` and
    /// `before_id = Some(id)`; everything at or above that record is skipped.
    ///
    /// # Errors
    ///
    /// Propagates I/O and decoding failures from any shard touched.
    pub fn load_between(
        &self,
        account_ids: &[u32],
        start: u32,
        end: u32,
        before_id: Option<u128>,
        limit: usize,
    ) -> Result<Vec<R>> {
        if limit == 0 || start > end {
            return Ok(Vec::new());
        }

        let mut state = self.lock_state()?;
        let mut out: Vec<R> = Vec::new();

        for &account_id in account_ids {
            let shards = state.shards_for(&self.naming, account_id)?.to_vec();
            let mut per_account: Vec<R> = Vec::new();

            for desc in shards
                .iter()
                .filter(|d| d.overlaps(i64::from(start), i64::from(end)))
            {
                let buf = shard::load::<R, _>(&desc.path)?;
                per_account.extend(buf.descending_range(start, end, before_id, limit)?);
            }

            sort_descending(&mut per_account);
            per_account.truncate(limit);
            out.append(&mut per_account);
        }

        sort_descending(&mut out);
        out.truncate(limit);
        debug!(
            kind = R::KIND,
            accounts = account_ids.len(),
            start,
            end,
            returned = out.len(),
            "load_between"
        );
        Ok(out)
    }

    /// Streams every record of `account_ids`, one whole shard per call to
    /// `on_batch(account_id, records)`, oldest shard first.
    ///
    /// Returning `false` from `on_batch` stops the scan. The result maps each
    /// account that produced records to the highest last-modified time seen.
    ///
    /// The store stays locked while `on_batch` runs; the callback must not
    /// call back into this store.
    pub fn load_all<F>(&self, account_ids: &[u32], mut on_batch: F) -> Result<HashMap<u32, u32>>
    where
        F: FnMut(u32, Vec<R>) -> bool,
    {
        let mut state = self.lock_state()?;
        let mut latest: HashMap<u32, u32> = HashMap::new();

        'accounts: for &account_id in account_ids {
            let shards = state.shards_for(&self.naming, account_id)?.to_vec();
            for desc in &shards {
                let buf = shard::load::<R, _>(&desc.path)?;
                let records = buf.iter().collect::<Result<Vec<R>>>()?;
                if let Some(max) = records.iter().map(Record::updated_time).max() {
                    let entry = latest.entry(account_id).or_insert(0);
                    *entry = (*entry).max(max);
                    state.note_update(account_id, max);
                }
                debug!(
                    kind = R::KIND,
                    account_id,
                    shard = %desc.path.display(),
                    records = records.len(),
                    "streaming shard"
                );
                if !on_batch(account_id, records) {
                    break 'accounts;
                }
            }
        }

        Ok(latest)
    }
}

fn sort_descending<R: Record>(records: &mut [R]) {
    records.sort_unstable_by(|a, b| (b.time(), b.id()).cmp(&(a.time(), a.id())));
}
