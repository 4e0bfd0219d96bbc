/// Read side of the cache: `stats_since()`, `page()`, `for_each_descending()`.
///
/// "Since `t`" always means a sort time strictly greater than `t`.
use anyhow::Result;
use record::{Flip, FlipStatus};
use std::ops::ControlFlow;

use crate::week::week_start;
use crate::{FlipCache, Inner, Stats};

impl FlipCache {
    /// Stats of flips after `since`, for one account or all of them.
    ///
    /// Only the week containing `since` is scanned; every later week adds
    /// its precomputed aggregate.
    pub fn stats_since(&self, since: u32, account_id: Option<u32>) -> Result<Stats> {
        let inner = self.lock()?;
        let boundary = week_start(since);
        let first = inner.weeks.partition_point(|w| w.start < boundary);

        let mut total = Stats::default();
        for week in &inner.weeks[first..] {
            if week.start == boundary {
                total += week.stats_after(since, account_id);
            } else {
                total += week.stats(account_id);
            }
        }
        Ok(total)
    }

    /// Page `page` (1-based; 0 is treated as 1) of flips after `since`,
    /// newest first. `Buying` flips are skipped unless `include_buying`.
    pub fn page(
        &self,
        page: usize,
        page_size: usize,
        since: u32,
        account_id: Option<u32>,
        include_buying: bool,
    ) -> Result<Vec<Flip>> {
        if page_size == 0 {
            return Ok(Vec::new());
        }
        let mut skip = page.max(1).saturating_sub(1).saturating_mul(page_size);
        let mut out = Vec::with_capacity(page_size);

        let inner = self.lock()?;
        inner.visit_descending(since, account_id, |flip| {
            if !include_buying && flip.status == FlipStatus::Buying {
                return ControlFlow::Continue(());
            }
            if skip > 0 {
                skip -= 1;
                return ControlFlow::Continue(());
            }
            out.push(flip.clone());
            if out.len() == page_size {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        Ok(out)
    }

    /// Calls `visitor` on every flip after `since`, newest first, until it
    /// returns `false`.
    ///
    /// The cache stays locked while the visitor runs; the visitor must not
    /// call back into this cache.
    pub fn for_each_descending<F>(
        &self,
        since: u32,
        account_id: Option<u32>,
        mut visitor: F,
    ) -> Result<()>
    where
        F: FnMut(&Flip) -> bool,
    {
        let inner = self.lock()?;
        inner.visit_descending(since, account_id, |flip| {
            if visitor(flip) {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            }
        });
        Ok(())
    }
}

impl Inner {
    fn visit_descending<F>(&self, since: u32, account_id: Option<u32>, mut f: F)
    where
        F: FnMut(&Flip) -> ControlFlow<()>,
    {
        for week in self.weeks.iter().rev() {
            if week.last_second() <= since {
                break;
            }
            match account_id {
                Some(acc) => {
                    let Some(bucket) = week.accounts.get(&acc) else {
                        continue;
                    };
                    for flip in bucket.flips[bucket.first_after(since)..].iter().rev() {
                        if f(flip).is_break() {
                            return;
                        }
                    }
                }
                None => {
                    let mut merged: Vec<&Flip> = week
                        .accounts
                        .values()
                        .flat_map(|b| b.flips[b.first_after(since)..].iter())
                        .collect();
                    merged.sort_unstable_by(|a, b| {
                        (b.sort_time(), b.id).cmp(&(a.sort_time(), a.id))
                    });
                    for flip in merged {
                        if f(flip).is_break() {
                            return;
                        }
                    }
                }
            }
        }
    }
}
