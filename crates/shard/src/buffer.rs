use anyhow::{bail, Result};
use record::{sort_key, Record};
use std::marker::PhantomData;

/// Result of a binary search over a [`SortedRecordBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    /// A record with the same `(time, id)` sits at this index.
    Found(usize),
    /// No such record; inserting at this index keeps the buffer sorted.
    NotFound(usize),
}

/// Concatenated fixed-size records, sorted ascending by `(time, id)`.
///
/// This is the in-memory image of one shard file: byte `i * R::SIZE` of the
/// buffer is byte `i * R::SIZE` of the file, so any mutation here maps to a
/// single contiguous write there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedRecordBuffer<R: Record> {
    bytes: Vec<u8>,
    _marker: PhantomData<R>,
}

impl<R: Record> Default for SortedRecordBuffer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> SortedRecordBuffer<R> {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Wraps the raw contents of a shard file.
    ///
    /// # Errors
    ///
    /// Fails if the length is not a whole number of records.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() % R::SIZE != 0 {
            bail!(
                "shard length {} is not a multiple of the {} byte {} record",
                bytes.len(),
                R::SIZE,
                R::KIND
            );
        }
        Ok(Self {
            bytes,
            _marker: PhantomData,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() / R::SIZE
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Raw bytes of the record at `index`.
    #[must_use]
    pub fn record_bytes(&self, index: usize) -> &[u8] {
        &self.bytes[index * R::SIZE..(index + 1) * R::SIZE]
    }

    #[must_use]
    pub fn key_at(&self, index: usize) -> (u32, u128) {
        sort_key::<R>(self.record_bytes(index))
    }

    pub fn get(&self, index: usize) -> Result<R> {
        Ok(R::decode(self.record_bytes(index))?)
    }

    /// Decodes every record in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Result<R>> + '_ {
        self.bytes
            .chunks_exact(R::SIZE)
            .map(|chunk| R::decode(chunk).map_err(anyhow::Error::from))
    }

    /// Binary search for `(time, id)`.
    #[must_use]
    pub fn search(&self, time: u32, id: u128) -> SearchResult {
        let target = (time, id);
        let (mut lo, mut hi) = (0usize, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.key_at(mid).cmp(&target) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return SearchResult::Found(mid),
            }
        }
        SearchResult::NotFound(lo)
    }

    /// Binary search for the slot of `record`.
    #[must_use]
    pub fn find(&self, record: &R) -> SearchResult {
        self.search(record.time(), record.id())
    }

    /// Inserts `record` at `index`, returning the byte offset it landed at.
    ///
    /// Every byte from that offset onward shifts, so persisting the change
    /// means rewriting the file from the returned offset to the end.
    pub fn insert_at(&mut self, index: usize, record: &R) -> usize {
        let offset = index * R::SIZE;
        let encoded = record.encode();
        self.bytes.splice(offset..offset, encoded);
        offset
    }

    /// Overwrites the record at `index` in place, returning its byte offset.
    pub fn replace_at(&mut self, index: usize, record: &R) -> usize {
        let offset = index * R::SIZE;
        record.encode_into(&mut self.bytes[offset..offset + R::SIZE]);
        offset
    }

    /// Up to `limit` records with `start <= time <= end`, newest first.
    ///
    /// With `before_id = Some(id)` the scan continues strictly below
    /// `(end, id)`: pass the last record of the previous page as
    /// `(end, before_id)` to fetch the next page.
    pub fn descending_range(
        &self,
        start: u32,
        end: u32,
        before_id: Option<u128>,
        limit: usize,
    ) -> Result<Vec<R>> {
        if limit == 0 || self.is_empty() || start > end {
            return Ok(Vec::new());
        }

        let lo = match self.search(start, 0) {
            SearchResult::Found(i) | SearchResult::NotFound(i) => i,
        };
        let hi = match before_id {
            Some(id) => match self.search(end, id) {
                SearchResult::Found(i) | SearchResult::NotFound(i) => i,
            },
            None => match self.search(end, u128::MAX) {
                SearchResult::Found(i) => i + 1,
                SearchResult::NotFound(i) => i,
            },
        };

        let mut out = Vec::with_capacity(limit.min(hi.saturating_sub(lo)));
        for index in (lo..hi).rev().take(limit) {
            out.push(self.get(index)?);
        }
        Ok(out)
    }
}
