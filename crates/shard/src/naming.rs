/// Shard file naming: mapping `(account, time)` to a quarter-bounded file
/// and back.
///
/// A template such as `v1_flips_a{acc_id}_{year}_q{quarter}.dat` names one
/// file per account per calendar quarter (UTC). Scanning the data directory
/// inverts the template with a regex built from it.
use anyhow::{bail, Context, Result};
use chrono::{Datelike, TimeZone, Utc};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const ACC_ID: &str = "{acc_id}";
const YEAR: &str = "{year}";
const QUARTER: &str = "{quarter}";

/// One shard file and the time range it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardDescriptor {
    pub account_id: u32,
    pub year: i32,
    /// Calendar quarter, `1..=4`.
    pub quarter: u32,
    /// Inclusive lower bound, unix seconds.
    pub start: i64,
    /// Exclusive upper bound, unix seconds.
    pub end: i64,
    pub path: PathBuf,
}

impl ShardDescriptor {
    /// Whether `[start, end)` intersects the inclusive range `[from, to]`.
    #[must_use]
    pub fn overlaps(&self, from: i64, to: i64) -> bool {
        self.start <= to && self.end > from
    }

    #[must_use]
    pub fn contains(&self, time: i64) -> bool {
        self.start <= time && time < self.end
    }
}

/// Deterministic shard filenames for one record kind inside one directory.
#[derive(Debug, Clone)]
pub struct ShardNaming {
    dir: PathBuf,
    template: String,
    pattern: Regex,
}

impl ShardNaming {
    /// Builds the naming scheme for `template` rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Fails if the template is missing one of the `{acc_id}`, `{year}` and
    /// `{quarter}` placeholders.
    pub fn new<P: AsRef<Path>>(dir: P, template: &str) -> Result<Self> {
        for placeholder in [ACC_ID, YEAR, QUARTER] {
            if !template.contains(placeholder) {
                bail!("shard template {:?} lacks {}", template, placeholder);
            }
        }

        let escaped = regex::escape(template)
            .replace(&regex::escape(ACC_ID), r"(?P<acc_id>\d+)")
            .replace(&regex::escape(YEAR), r"(?P<year>\d{4})")
            .replace(&regex::escape(QUARTER), r"(?P<quarter>[1-4])");
        let pattern = Regex::new(&format!("^{}$", escaped))
            .with_context(|| format!("invalid shard template {:?}", template))?;

        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            template: template.to_string(),
            pattern,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The shard that holds records of `account_id` at unix time `time`.
    pub fn path_for(&self, account_id: u32, time: u32) -> Result<ShardDescriptor> {
        let dt = Utc
            .timestamp_opt(i64::from(time), 0)
            .single()
            .with_context(|| format!("time {} out of range", time))?;
        let quarter = dt.month0() / 3 + 1;
        self.descriptor(account_id, dt.year(), quarter)
    }

    fn descriptor(&self, account_id: u32, year: i32, quarter: u32) -> Result<ShardDescriptor> {
        let (start, end) = quarter_bounds(year, quarter)?;
        let name = self
            .template
            .replace(ACC_ID, &account_id.to_string())
            .replace(YEAR, &format!("{:04}", year))
            .replace(QUARTER, &quarter.to_string());
        Ok(ShardDescriptor {
            account_id,
            year,
            quarter,
            start,
            end,
            path: self.dir.join(name),
        })
    }

    /// Parses a bare filename back into a descriptor.
    pub fn parse(&self, filename: &str) -> Option<ShardDescriptor> {
        let caps = self.pattern.captures(filename)?;
        let account_id = caps["acc_id"].parse().ok()?;
        let year = caps["year"].parse().ok()?;
        let quarter = caps["quarter"].parse().ok()?;
        self.descriptor(account_id, year, quarter).ok()
    }

    /// Every shard file in the data directory, ordered by account then time.
    ///
    /// A missing directory yields an empty list. Filenames that do not match
    /// the template are skipped.
    pub fn list_shards(&self) -> Result<Vec<ShardDescriptor>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to scan {}", self.dir.display()))
            }
        };

        let mut shards = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match self.parse(name) {
                Some(desc) => shards.push(desc),
                None if self.looks_like_shard(name) => {
                    warn!(file = name, "skipping unparsable shard filename");
                }
                None => {}
            }
        }
        shards.sort_by_key(|d| (d.account_id, d.start));
        Ok(shards)
    }

    /// Shards belonging to `account_id`, oldest first.
    pub fn list_shards_for(&self, account_id: u32) -> Result<Vec<ShardDescriptor>> {
        let mut shards = self.list_shards()?;
        shards.retain(|d| d.account_id == account_id);
        Ok(shards)
    }

    /// Removes every shard of `account_id` along with its pending WAL,
    /// each under that shard's lock. Returns the number of shard files
    /// removed.
    pub fn delete_shards_for_account(&self, account_id: u32) -> Result<usize> {
        let mut removed = 0;
        for desc in self.list_shards_for(account_id)? {
            if crate::file::remove(&desc.path)? {
                removed += 1;
            }
        }
        info!(account_id, shards = removed, "deleted account shards");
        Ok(removed)
    }

    // Same extension and prefix as the template, but not a match.
    fn looks_like_shard(&self, name: &str) -> bool {
        let prefix = self.template.split('{').next().unwrap_or_default();
        let suffix = self.template.rsplit('}').next().unwrap_or_default();
        !prefix.is_empty() && name.starts_with(prefix) && name.ends_with(suffix)
    }
}

/// `[start, end)` of a calendar quarter in unix seconds (UTC).
pub fn quarter_bounds(year: i32, quarter: u32) -> Result<(i64, i64)> {
    if !(1..=4).contains(&quarter) {
        bail!("quarter {} out of range", quarter);
    }
    let start_month = (quarter - 1) * 3 + 1;
    let (end_year, end_month) = if quarter == 4 {
        (year + 1, 1)
    } else {
        (year, start_month + 3)
    };
    let start = Utc
        .with_ymd_and_hms(year, start_month, 1, 0, 0, 0)
        .single()
        .with_context(|| format!("invalid quarter {}-q{}", year, quarter))?;
    let end = Utc
        .with_ymd_and_hms(end_year, end_month, 1, 0, 0, 0)
        .single()
        .with_context(|| format!("invalid quarter {}-q{}", year, quarter))?;
    Ok((start.timestamp(), end.timestamp()))
}
