//! Command-line surface (§6 "CLI flag", §10 "CLI"): a `clap::Parser` derive
//! struct mirroring the reference crate's own clap-derived CLI/REPL query
//! types (`crates/analysis/src/cli.rs`).

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "hoststation", about = "Game-hosting service: cron, arbiter, dispatcher, turn pipeline")]
pub struct Cli {
    /// Path to a `key = value` configuration file (§6). Missing file falls
    /// back to environment variables and built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Disables the scheduler worker entirely (§6 "CLI flag"); used for
    /// tests that want to drive the dispatcher without a cron thread racing
    /// the in-memory store underneath them.
    #[arg(long)]
    pub nocron: bool,

    /// Overrides `HOST.HOST`/`HOST.PORT` from the config file/environment.
    #[arg(long, value_name = "HOST:PORT")]
    pub bind: Option<String>,
}
