//! # Shard - quarter-bounded record files
//!
//! On-disk storage for the record store. Each account's records are split
//! into one file per calendar quarter ("shard"). A shard is nothing but
//! fixed-size records laid end to end, sorted ascending by `(time, id)`:
//!
//! ```text
//! ┌──────────────┬──────────────┬─────┬──────────────┐
//! │ record 0     │ record 1     │ ... │ record n-1   │   each R::SIZE bytes
//! └──────────────┴──────────────┴─────┴──────────────┘
//! ```
//!
//! There is no header, index or footer: the record count is the file length
//! divided by the record size, and lookups are binary searches over the
//! loaded bytes.
//!
//! ## Sibling files
//!
//! | file            | purpose                                       |
//! |-----------------|-----------------------------------------------|
//! | `<shard>`       | the records                                   |
//! | `<shard>.lock`  | advisory lock serializing all access          |
//! | `<shard>.wal`   | in-flight write, replayed on next access      |
//!
//! ## Modules
//!
//! | Module     | Purpose                                              |
//! |------------|------------------------------------------------------|
//! | [`buffer`] | `SortedRecordBuffer`: search, insert, replace, pages |
//! | [`naming`] | `(account, time)` ⇄ shard filename                   |
//! | [`file`]   | locked, WAL-protected `load` / `upsert` / `remove`   |

pub mod buffer;
pub mod file;
pub mod naming;

pub use buffer::{SearchResult, SortedRecordBuffer};
pub use file::{load, remove, upsert, UpsertSummary};
pub use naming::{quarter_bounds, ShardDescriptor, ShardNaming};

#[cfg(test)]
mod tests;
