//! Environment-driven settings for the inspection shell.
//!
//! ```text
//! COPILOT_DATA_DIR   shard directory                      (default: "data")
//! COPILOT_PAGE_SIZE  default page size for PAGE / TXS     (default: 50)
//! COPILOT_ACCOUNTS   comma-separated ids LOAD falls back to (default: none)
//! ```
//!
//! Unparsable numbers fall back to their defaults.

use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub page_size: usize,
    pub accounts: Vec<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            page_size: DEFAULT_PAGE_SIZE,
            accounts: Vec::new(),
        }
    }
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let data_dir = lookup("COPILOT_DATA_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let page_size = lookup("COPILOT_PAGE_SIZE")
            .and_then(|v| v.trim().parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.page_size);
        let accounts = lookup("COPILOT_ACCOUNTS")
            .map(|v| parse_accounts(&v))
            .unwrap_or_default();
        Self {
            data_dir,
            page_size,
            accounts,
        }
    }
}

/// Parses `"1, 2,x,3"` into `[1, 2, 3]`, skipping anything that isn't a number.
pub fn parse_accounts(s: &str) -> Vec<u32> {
    s.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(Config::from_lookup(|_| None), Config::default());
    }

    #[test]
    fn reads_all_variables() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("COPILOT_DATA_DIR", "/var/lib/copilot"),
            ("COPILOT_PAGE_SIZE", "20"),
            ("COPILOT_ACCOUNTS", "7, 12"),
        ]));
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/copilot"));
        assert_eq!(cfg.page_size, 20);
        assert_eq!(cfg.accounts, vec![7, 12]);
    }

    #[test]
    fn bad_numbers_fall_back() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("COPILOT_PAGE_SIZE", "lots"),
            ("COPILOT_ACCOUNTS", "a,3,,b"),
        ]));
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(cfg.accounts, vec![3]);

        let zero = Config::from_lookup(lookup_from(&[("COPILOT_PAGE_SIZE", "0")]));
        assert_eq!(zero.page_size, DEFAULT_PAGE_SIZE);
    }
}
