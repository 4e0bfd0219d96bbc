//! # Record - fixed-layout binary trade records
//!
//! Every entity persisted by the shard store is a fixed-size, big-endian
//! binary record. The fixed size is what lets a shard be binary-searched and
//! patched in place: record `i` always lives at byte `i * SIZE`.
//!
//! Two schemas exist:
//!
//! ```text
//! Transaction (56 bytes)
//! [id: u128][correlation_id: u128][account_id: u32][time: u32]
//! [item_id: u32][quantity: i32][price: i32][amount_spent: i32]
//!
//! Flip (84 bytes)
//! [id: u128][account_id: u32][item_id: u32][opened_time: u32][opened_qty: i32]
//! [spent: i64][closed_time: u32][closed_qty: i32][received_post_tax: i64]
//! [profit: i64][tax_paid: i64][status: u32][updated_time: u32][deleted: u32]
//! ```
//!
//! Records inside a shard are ordered by `(time, id)` where `time` is the
//! record's *primary* time: the transaction time, or a flip's opened time.

mod flip;
mod transaction;

pub use flip::{Flip, FlipStatus};
pub use transaction::Transaction;

use thiserror::Error;

/// Errors produced while decoding a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The input slice does not have the schema's exact length.
    #[error("malformed record: expected {expected} bytes, got {actual}")]
    Malformed { expected: usize, actual: usize },

    /// A flip status ordinal outside `0..=2`.
    #[error("unknown flip status ordinal {0}")]
    UnknownStatus(u32),
}

/// A fixed-size record that can live in a shard.
///
/// Implementors must keep `ID_OFFSET` and `TIME_OFFSET` in sync with their
/// `encode` layout: the shard buffer compares records by reading those two
/// fields straight out of the encoded bytes.
pub trait Record: Clone + Sized {
    /// Encoded length in bytes.
    const SIZE: usize;
    /// Entity kind, used in shard filenames (`v1_<kind>_a..`).
    const KIND: &'static str;
    /// Byte offset of the 128-bit id.
    const ID_OFFSET: usize;
    /// Byte offset of the 32-bit primary time.
    const TIME_OFFSET: usize;

    fn id(&self) -> u128;
    fn account_id(&self) -> u32;
    /// Primary time used for shard placement and ordering.
    fn time(&self) -> u32;
    /// Last-modified time used for conflict resolution.
    fn updated_time(&self) -> u32;

    /// Writes the record into `buf`, which must be exactly `SIZE` bytes.
    fn encode_into(&self, buf: &mut [u8]);

    fn decode(bytes: &[u8]) -> Result<Self, CodecError>;

    /// Returns `true` if `self` should replace `existing` (same id).
    ///
    /// The default is strict last-write-wins on `updated_time`; ties keep
    /// the stored version.
    fn supersedes(&self, existing: &Self) -> bool {
        self.updated_time() > existing.updated_time()
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        self.encode_into(&mut buf);
        buf
    }
}

/// Reads the `(time, id)` sort key of an encoded record.
///
/// `bytes` must hold at least one full record of type `R`.
pub fn sort_key<R: Record>(bytes: &[u8]) -> (u32, u128) {
    let mut time = [0u8; 4];
    time.copy_from_slice(&bytes[R::TIME_OFFSET..R::TIME_OFFSET + 4]);
    let mut id = [0u8; 16];
    id.copy_from_slice(&bytes[R::ID_OFFSET..R::ID_OFFSET + 16]);
    (u32::from_be_bytes(time), u128::from_be_bytes(id))
}

pub(crate) fn check_len(bytes: &[u8], expected: usize) -> Result<(), CodecError> {
    if bytes.len() != expected {
        return Err(CodecError::Malformed {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}
