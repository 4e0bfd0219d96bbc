use record::{Flip, FlipStatus};
use std::ops::{AddAssign, SubAssign};

/// Running totals over a set of flips.
///
/// Returned by value from every query, so callers can't reach the
/// aggregates the cache maintains.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub profit: i64,
    /// Amount spent buying.
    pub gross: i64,
    pub fees: i64,
    pub count: u32,
}

impl Stats {
    /// Contribution of a single flip. Deleted flips and flips with nothing
    /// sold yet contribute nothing.
    #[must_use]
    pub fn of(flip: &Flip) -> Self {
        if flip.deleted || flip.status == FlipStatus::Buying {
            return Self::default();
        }
        Self {
            profit: flip.profit,
            gross: flip.spent,
            fees: flip.tax_paid,
            count: 1,
        }
    }

    /// Profit as a fraction of the amount spent, `0.0` when nothing was spent.
    #[must_use]
    pub fn roi(&self) -> f64 {
        if self.gross == 0 {
            0.0
        } else {
            self.profit as f64 / self.gross as f64
        }
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, rhs: Self) {
        self.profit += rhs.profit;
        self.gross += rhs.gross;
        self.fees += rhs.fees;
        self.count += rhs.count;
    }
}

impl SubAssign for Stats {
    fn sub_assign(&mut self, rhs: Self) {
        self.profit -= rhs.profit;
        self.gross -= rhs.gross;
        self.fees -= rhs.fees;
        self.count -= rhs.count;
    }
}

impl<'a> std::iter::Sum<&'a Flip> for Stats {
    fn sum<I: Iterator<Item = &'a Flip>>(iter: I) -> Self {
        let mut total = Stats::default();
        for flip in iter {
            total += Stats::of(flip);
        }
        total
    }
}
