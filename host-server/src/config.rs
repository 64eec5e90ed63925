//! Configuration loading (§6, §10): the key table is read from a `key =
//! value` file (`#`-comments, blank lines ignored), then overridden by
//! environment variables of the same dotted name, then overridden again by
//! the handful of CLI flags that exist for convenience at the shell. Parsed
//! once at startup and handed to the rest of the service as `Arc<Config>`.

use crate::cli::Cli;
use anyhow::Context as _;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupPolicy {
    Keep,
    Unpack,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    /// `HOST.TIMESCALE`: unix-time divisor: the service's "scaled minute".
    pub timescale: i64,
    pub workdir: PathBuf,
    pub users_see_temporary_turns: bool,
    pub kick_after_missed: u32,
    pub backups: BackupPolicy,
    /// `HOST.INITIALSUSPEND`: scheduler suspension on startup, scaled minutes.
    pub initial_suspend: i64,
    pub bindir: Option<String>,
    pub redis_url: Option<String>,
    pub checker_program: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:6400".to_string(),
            timescale: host_core::DEFAULT_TIMESCALE,
            workdir: std::env::temp_dir().join(format!("hoststation-{}", std::process::id())),
            users_see_temporary_turns: false,
            kick_after_missed: host_core::DEFAULT_KICK_AFTER_MISSED,
            backups: BackupPolicy::Keep,
            initial_suspend: 0,
            bindir: None,
            redis_url: None,
            checker_program: "turnchecker".to_string(),
        }
    }
}

impl Config {
    /// Loads the file named by `--config` (if any), merges environment
    /// overrides, then applies the CLI's own convenience flags, in that
    /// precedence order (file < env < CLI).
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut cfg = Config::default();
        let mut raw = BTreeMap::new();

        if let Some(path) = &cli.config {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {path:?}"))?;
            raw.extend(parse_key_value(&text));
        }
        for key in KNOWN_KEYS {
            if let Ok(value) = std::env::var(key) {
                raw.insert(key.to_string(), value);
            }
        }

        if let Some(host) = raw.get("HOST.HOST") {
            let port = raw.get("HOST.PORT").map(String::as_str).unwrap_or("6400");
            cfg.bind_addr = format!("{host}:{port}");
        } else if let Some(port) = raw.get("HOST.PORT") {
            cfg.bind_addr = format!("127.0.0.1:{port}");
        }
        if let Some(v) = raw.get("HOST.TIMESCALE") {
            cfg.timescale = v.parse().context("HOST.TIMESCALE must be an integer")?;
        }
        if let Some(v) = raw.get("HOST.WORKDIR") {
            cfg.workdir = PathBuf::from(v);
        }
        if let Some(v) = raw.get("HOST.USERSSEETEMPORARYTURNS") {
            cfg.users_see_temporary_turns = parse_bool(v);
        }
        if let Some(v) = raw.get("HOST.KICKAFTERMISSED") {
            cfg.kick_after_missed = v.parse().context("HOST.KICKAFTERMISSED must be an integer")?;
        }
        if let Some(v) = raw.get("HOST.BACKUPS") {
            cfg.backups = match v.to_ascii_lowercase().as_str() {
                "unpack" => BackupPolicy::Unpack,
                _ => BackupPolicy::Keep,
            };
        }
        if let Some(v) = raw.get("HOST.INITIALSUSPEND") {
            cfg.initial_suspend = v.parse().context("HOST.INITIALSUSPEND must be an integer")?;
        }
        if let Some(v) = raw.get("BINDIR") {
            cfg.bindir = Some(v.clone());
        }
        if let Some(v) = raw.get("REDIS.URL") {
            cfg.redis_url = Some(v.clone());
        }
        if let Some(v) = raw.get("CHECKER.PROGRAM") {
            cfg.checker_program = v.clone();
        }

        if let Some(bind) = &cli.bind {
            cfg.bind_addr = bind.clone();
        }

        Ok(cfg)
    }
}

const KNOWN_KEYS: &[&str] = &[
    "HOST.HOST",
    "HOST.PORT",
    "HOST.TIMESCALE",
    "HOST.WORKDIR",
    "HOST.USERSSEETEMPORARYTURNS",
    "HOST.KICKAFTERMISSED",
    "HOST.BACKUPS",
    "HOST.INITIALSUSPEND",
    "BINDIR",
    "REDIS.URL",
    "CHECKER.PROGRAM",
];

fn parse_key_value(text: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            out.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    out
}

fn parse_bool(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli() -> Cli {
        Cli {
            config: None,
            nocron: false,
            bind: None,
        }
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = Config::load(&cli()).unwrap();
        assert_eq!(cfg.timescale, 60);
        assert_eq!(cfg.bind_addr, "127.0.0.1:6400");
        assert!(!cfg.users_see_temporary_turns);
    }

    #[test]
    fn parses_key_value_file_with_comments() {
        let text = "# a comment\nHOST.HOST = 0.0.0.0\nHOST.PORT = 7000\n\nHOST.TIMESCALE=1\n";
        let parsed = parse_key_value(text);
        assert_eq!(parsed.get("HOST.HOST").map(String::as_str), Some("0.0.0.0"));
        assert_eq!(parsed.get("HOST.PORT").map(String::as_str), Some("7000"));
        assert_eq!(parsed.get("HOST.TIMESCALE").map(String::as_str), Some("1"));
    }

    #[test]
    fn cli_bind_overrides_everything() {
        let mut c = cli();
        c.bind = Some("0.0.0.0:1234".to_string());
        let cfg = Config::load(&c).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:1234");
    }
}
