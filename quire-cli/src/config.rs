//! Configuration loading for the Quire CLI.
//!
//! The path comes from `--config <path>` or `QUIRE_CONFIG`. With neither,
//! the built-in defaults are used.

use quire_core::{QuireConfig, QuireResult};
use std::path::PathBuf;

pub fn load() -> QuireResult<QuireConfig> {
    match config_path_from_args().or_else(config_path_from_env) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading configuration");
            QuireConfig::from_path(&path)
        }
        None => Ok(QuireConfig::default()),
    }
}

/// Whether log output should be JSON lines.
pub fn json_logs() -> bool {
    std::env::var("QUIRE_LOG_FORMAT")
        .map(|s| s.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("QUIRE_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
