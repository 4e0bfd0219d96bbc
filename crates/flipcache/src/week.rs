use record::Flip;
use std::collections::BTreeMap;

use crate::Stats;

/// Length of one bucket in seconds.
pub const WEEK_SECS: u32 = 7 * 24 * 60 * 60;

/// Start of the epoch-aligned week containing `time`.
#[must_use]
pub fn week_start(time: u32) -> u32 {
    time - time % WEEK_SECS
}

/// One account's flips within a week, ascending by `(sort_time, id)`.
#[derive(Debug, Default)]
pub(crate) struct AccountWeek {
    pub(crate) flips: Vec<Flip>,
    pub(crate) stats: Stats,
}

impl AccountWeek {
    fn position(&self, time: u32, id: u128) -> Result<usize, usize> {
        self.flips
            .binary_search_by(|f| (f.sort_time(), f.id).cmp(&(time, id)))
    }

    pub(crate) fn find(&self, time: u32, id: u128) -> Option<&Flip> {
        self.position(time, id).ok().map(|i| &self.flips[i])
    }

    /// Index of the first flip strictly after `since`.
    pub(crate) fn first_after(&self, since: u32) -> usize {
        self.flips.partition_point(|f| f.sort_time() <= since)
    }
}

/// `[start, start + WEEK_SECS)` of the in-memory index.
#[derive(Debug)]
pub(crate) struct Week {
    pub(crate) start: u32,
    pub(crate) accounts: BTreeMap<u32, AccountWeek>,
    pub(crate) total: Stats,
}

impl Week {
    pub(crate) fn new(start: u32) -> Self {
        Self {
            start,
            accounts: BTreeMap::new(),
            total: Stats::default(),
        }
    }

    /// Last second covered by this week.
    pub(crate) fn last_second(&self) -> u32 {
        self.start.saturating_add(WEEK_SECS - 1)
    }

    pub(crate) fn insert(&mut self, flip: Flip) {
        let contribution = Stats::of(&flip);
        let bucket = self.accounts.entry(flip.account_id).or_default();
        let pos = match bucket.position(flip.sort_time(), flip.id) {
            Ok(i) | Err(i) => i,
        };
        bucket.flips.insert(pos, flip);
        bucket.stats += contribution;
        self.total += contribution;
    }

    pub(crate) fn remove(&mut self, account_id: u32, time: u32, id: u128) -> Option<Flip> {
        let bucket = self.accounts.get_mut(&account_id)?;
        let pos = bucket.position(time, id).ok()?;
        let flip = bucket.flips.remove(pos);
        let contribution = Stats::of(&flip);
        bucket.stats -= contribution;
        self.total -= contribution;
        Some(flip)
    }

    /// Stats of flips strictly after `since`, scanning only this week.
    pub(crate) fn stats_after(&self, since: u32, account_id: Option<u32>) -> Stats {
        let mut total = Stats::default();
        for (_, bucket) in self.buckets(account_id) {
            total += bucket.flips[bucket.first_after(since)..].iter().sum::<Stats>();
        }
        total
    }

    pub(crate) fn stats(&self, account_id: Option<u32>) -> Stats {
        match account_id {
            None => self.total,
            Some(acc) => self
                .accounts
                .get(&acc)
                .map(|b| b.stats)
                .unwrap_or_default(),
        }
    }

    pub(crate) fn buckets(
        &self,
        account_id: Option<u32>,
    ) -> Box<dyn Iterator<Item = (&u32, &AccountWeek)> + '_> {
        match account_id {
            None => Box::new(self.accounts.iter()),
            Some(acc) => Box::new(self.accounts.get_key_value(&acc).into_iter()),
        }
    }
}
