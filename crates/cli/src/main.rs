///! # CLI - trade history inspection shell
///!
///! A line-oriented shell over a shard data directory. Reads commands from
///! stdin, runs them against the flip and transaction stores and the
///! in-memory flip cache, and prints results to stdout. Logs go to stderr.
///!
///! ## Commands
///!
///! ```text
///! LOAD [acc ...]               Rebuild the flip cache from disk
///! STATS [since] [acc]          Profit/gross/fees/count of flips after `since`
///! PAGE n [size] [acc]          Page n (1-based) of flips, newest first
///! TXS acc start end [limit]    Transactions of `acc` in [start, end], newest first
///! DELETE acc                   Delete an account's shards and cached flips
///! EXIT / QUIT                  Shut down
///! ```
///!
///! ## Configuration
///!
///! ```text
///! COPILOT_DATA_DIR   shard directory                        (default: "data")
///! COPILOT_PAGE_SIZE  default page size                      (default: 50)
///! COPILOT_ACCOUNTS   accounts LOAD uses without arguments   (default: none)
///! RUST_LOG           log filter for stderr output           (default: off)
///! ```
///!
///! ## Example
///!
///! ```text
///! $ COPILOT_DATA_DIR=data cargo run -p cli
///! copilot shell (data_dir=data, page_size=50)
///! > LOAD 7
///! OK (12 flips, 1 accounts)
///! > STATS
///! profit=1200 gross=40000 fees=800 count=12 roi=0.0300
///! > EXIT
///! bye
///! ```
mod shell;

use anyhow::Result;
use config::Config;
use std::io;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let config = Config::from_env();
    let mut shell = shell::Shell::open(config)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    shell.run(stdin.lock(), stdout.lock())
}
