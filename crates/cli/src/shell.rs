use anyhow::{Context, Result};
use config::Config;
use flipcache::FlipCache;
use record::Flip;
use std::io::{BufRead, Write};
use store::{FlipStore, TransactionStore};
use tracing::{info, warn};

/// Command interpreter over one data directory.
pub struct Shell {
    config: Config,
    flips: FlipStore,
    transactions: TransactionStore,
    cache: FlipCache,
}

impl Shell {
    pub fn open(config: Config) -> Result<Self> {
        let flips = FlipStore::open(&config.data_dir)?;
        let transactions = TransactionStore::open(&config.data_dir)?;
        Ok(Self {
            config,
            flips,
            transactions,
            cache: FlipCache::new(),
        })
    }

    /// Reads commands from `input` until EOF or `EXIT`.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> Result<()> {
        writeln!(
            out,
            "copilot shell (data_dir={}, page_size={})",
            self.config.data_dir.display(),
            self.config.page_size
        )?;
        write!(out, "> ")?;
        out.flush()?;

        for line in input.lines() {
            let line = line?;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if let Some((cmd, args)) = parts.split_first() {
                let upper = cmd.to_uppercase();
                if upper == "EXIT" || upper == "QUIT" {
                    writeln!(out, "bye")?;
                    return Ok(());
                }
                if let Err(e) = self.execute(&upper, args, &mut out) {
                    writeln!(out, "ERR {}: {:#}", upper.to_lowercase(), e)?;
                }
            }
            write!(out, "> ")?;
            out.flush()?;
        }
        Ok(())
    }

    fn execute<W: Write>(&mut self, cmd: &str, args: &[&str], out: &mut W) -> Result<()> {
        match cmd {
            "LOAD" => {
                let accounts = if args.is_empty() {
                    self.config.accounts.clone()
                } else {
                    parse_all(args)?
                };
                let (flips, loaded) = self.load(&accounts)?;
                writeln!(out, "OK ({} flips, {} accounts)", flips, loaded)?;
            }
            "STATS" => {
                let since = opt_arg(args, 0)?.unwrap_or(0);
                let account = opt_arg(args, 1)?;
                let s = self.cache.stats_since(since, account)?;
                writeln!(
                    out,
                    "profit={} gross={} fees={} count={} roi={:.4}",
                    s.profit,
                    s.gross,
                    s.fees,
                    s.count,
                    s.roi()
                )?;
            }
            "PAGE" => {
                let page = req_arg(args, 0, "PAGE n [size] [acc]")?;
                let size = opt_arg(args, 1)?.unwrap_or(self.config.page_size);
                let account = opt_arg(args, 2)?;
                let flips = self.cache.page(page, size, 0, account, true)?;
                print_flips(out, &flips)?;
            }
            "TXS" => {
                let usage = "TXS acc start end [limit]";
                let account: u32 = req_arg(args, 0, usage)?;
                let start: u32 = req_arg(args, 1, usage)?;
                let end: u32 = req_arg(args, 2, usage)?;
                let limit = opt_arg(args, 3)?.unwrap_or(self.config.page_size);
                let txs = self
                    .transactions
                    .load_between(&[account], start, end, None, limit)?;
                if txs.is_empty() {
                    writeln!(out, "(empty)")?;
                }
                for t in &txs {
                    writeln!(
                        out,
                        "{:032x} acc={} time={} item={} qty={} price={} spent={}",
                        t.id, t.account_id, t.time, t.item_id, t.quantity, t.price, t.amount_spent
                    )?;
                }
                if !txs.is_empty() {
                    writeln!(out, "({} transactions)", txs.len())?;
                }
            }
            "DELETE" => {
                let account: u32 = req_arg(args, 0, "DELETE acc")?;
                let removed = self.flips.delete_account(account)?
                    + self.transactions.delete_account(account)?;
                self.cache.delete_account(account)?;
                info!(account, removed, "account deleted");
                writeln!(out, "OK ({} shards removed)", removed)?;
            }
            other => {
                writeln!(out, "unknown command: {}", other)?;
            }
        }
        Ok(())
    }

    /// Cold start: clears the cache and streams every flip shard into it.
    fn load(&mut self, accounts: &[u32]) -> Result<(usize, usize)> {
        self.cache.reset()?;
        let epoch = self.cache.epoch()?;

        let mut failure = None;
        let cache = &self.cache;
        let latest = self.flips.load_all(accounts, |_, batch| {
            match cache.merge_batch(batch, Some(epoch)) {
                Ok(merged) => merged,
                Err(e) => {
                    failure = Some(e);
                    false
                }
            }
        })?;
        if let Some(e) = failure {
            warn!(error = %e, "cache load aborted");
            return Err(e.context("failed to merge flips into cache"));
        }
        let flips = self.cache.len()?;
        info!(flips, accounts = latest.len(), epoch, "flip cache loaded");
        Ok((flips, latest.len()))
    }
}

fn print_flips<W: Write>(out: &mut W, flips: &[Flip]) -> Result<()> {
    if flips.is_empty() {
        writeln!(out, "(empty)")?;
        return Ok(());
    }
    for f in flips {
        writeln!(
            out,
            "{:032x} acc={} item={} status={:?} opened={} closed={} qty={}/{} profit={}",
            f.id,
            f.account_id,
            f.item_id,
            f.status,
            f.opened_time,
            f.closed_time,
            f.closed_qty,
            f.opened_qty,
            f.profit
        )?;
    }
    writeln!(out, "({} flips)", flips.len())?;
    Ok(())
}

fn parse_all(args: &[&str]) -> Result<Vec<u32>> {
    args.iter()
        .map(|a| a.parse().with_context(|| format!("invalid account id {:?}", a)))
        .collect()
}

fn opt_arg<T: std::str::FromStr>(args: &[&str], i: usize) -> Result<Option<T>> {
    match args.get(i) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("invalid argument {:?}", raw)),
    }
}

fn req_arg<T: std::str::FromStr>(args: &[&str], i: usize, usage: &str) -> Result<T> {
    opt_arg(args, i)?.with_context(|| format!("usage: {}", usage))
}
