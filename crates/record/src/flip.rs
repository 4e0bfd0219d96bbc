use byteorder::{BigEndian, ByteOrder};

use crate::{check_len, CodecError, Record};

/// Lifecycle of a flip: `Buying -> Selling -> Finished`.
///
/// Stored on disk as its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlipStatus {
    Buying = 0,
    Selling = 1,
    Finished = 2,
}

impl FlipStatus {
    #[must_use]
    pub fn ordinal(self) -> u32 {
        self as u32
    }

    pub fn from_ordinal(v: u32) -> Result<Self, CodecError> {
        match v {
            0 => Ok(FlipStatus::Buying),
            1 => Ok(FlipStatus::Selling),
            2 => Ok(FlipStatus::Finished),
            other => Err(CodecError::UnknownStatus(other)),
        }
    }
}

/// A buy-then-sell cycle of one item, possibly still in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flip {
    pub id: u128,
    pub account_id: u32,
    pub item_id: u32,
    pub opened_time: u32,
    pub opened_qty: i32,
    pub spent: i64,
    /// `0` while nothing has been sold.
    pub closed_time: u32,
    pub closed_qty: i32,
    pub received_post_tax: i64,
    pub profit: i64,
    pub tax_paid: i64,
    pub status: FlipStatus,
    pub updated_time: u32,
    /// Tombstone flag. Deleted flips stay on disk.
    pub deleted: bool,
}

impl Flip {
    /// Time the in-memory index orders this flip by: the close time, or the
    /// open time while the flip has not been closed yet.
    #[must_use]
    pub fn sort_time(&self) -> u32 {
        if self.closed_time == 0 {
            self.opened_time
        } else {
            self.closed_time
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status != FlipStatus::Finished
    }
}

impl Record for Flip {
    const SIZE: usize = 84;
    const KIND: &'static str = "flips";
    const ID_OFFSET: usize = 0;
    // opened_time never changes, so a flip keeps its shard slot across updates
    const TIME_OFFSET: usize = 24;

    fn id(&self) -> u128 {
        self.id
    }

    fn account_id(&self) -> u32 {
        self.account_id
    }

    fn time(&self) -> u32 {
        self.opened_time
    }

    fn updated_time(&self) -> u32 {
        self.updated_time
    }

    fn encode_into(&self, buf: &mut [u8]) {
        BigEndian::write_u128(&mut buf[0..16], self.id);
        BigEndian::write_u32(&mut buf[16..20], self.account_id);
        BigEndian::write_u32(&mut buf[20..24], self.item_id);
        BigEndian::write_u32(&mut buf[24..28], self.opened_time);
        BigEndian::write_i32(&mut buf[28..32], self.opened_qty);
        BigEndian::write_i64(&mut buf[32..40], self.spent);
        BigEndian::write_u32(&mut buf[40..44], self.closed_time);
        BigEndian::write_i32(&mut buf[44..48], self.closed_qty);
        BigEndian::write_i64(&mut buf[48..56], self.received_post_tax);
        BigEndian::write_i64(&mut buf[56..64], self.profit);
        BigEndian::write_i64(&mut buf[64..72], self.tax_paid);
        BigEndian::write_u32(&mut buf[72..76], self.status.ordinal());
        BigEndian::write_u32(&mut buf[76..80], self.updated_time);
        BigEndian::write_u32(&mut buf[80..84], u32::from(self.deleted));
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            id: BigEndian::read_u128(&bytes[0..16]),
            account_id: BigEndian::read_u32(&bytes[16..20]),
            item_id: BigEndian::read_u32(&bytes[20..24]),
            opened_time: BigEndian::read_u32(&bytes[24..28]),
            opened_qty: BigEndian::read_i32(&bytes[28..32]),
            spent: BigEndian::read_i64(&bytes[32..40]),
            closed_time: BigEndian::read_u32(&bytes[40..44]),
            closed_qty: BigEndian::read_i32(&bytes[44..48]),
            received_post_tax: BigEndian::read_i64(&bytes[48..56]),
            profit: BigEndian::read_i64(&bytes[56..64]),
            tax_paid: BigEndian::read_i64(&bytes[64..72]),
            status: FlipStatus::from_ordinal(BigEndian::read_u32(&bytes[72..76]))?,
            updated_time: BigEndian::read_u32(&bytes[76..80]),
            deleted: BigEndian::read_u32(&bytes[80..84]) != 0,
        })
    }

    /// Newer `updated_time` wins. On a tie the version that has progressed
    /// further (more closed, then more opened) wins.
    fn supersedes(&self, existing: &Self) -> bool {
        (self.updated_time, self.closed_qty, self.opened_qty)
            > (existing.updated_time, existing.closed_qty, existing.opened_qty)
    }
}
