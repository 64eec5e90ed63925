//! Dual logging setup (§10 "Logging"), composing a terminal sink and a
//! rotating file sink the way the reference crate's own `rbp_core::log()`
//! does with `simplelog::{TermLogger, WriteLogger, CombinedLogger}` — here
//! under the service's configured working directory instead of a fixed
//! `logs/` relative path, since multiple games and one log file share the
//! same process.

use crate::config::Config;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn init(config: &Config) -> anyhow::Result<()> {
    let log_dir = config.workdir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let time = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let builder = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();

    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        builder.clone(),
        std::fs::File::create(log_dir.join(format!("{time}.log")))?,
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        builder,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file])
        .map_err(|e| anyhow::anyhow!("initializing logger: {e}"))
}
