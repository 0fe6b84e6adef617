pub mod config;
pub mod feed;
pub mod run;
pub mod status;

use std::path::PathBuf;
use std::time::Duration;

use vitalwatch_core::AgentConfig;
use vitalwatch_core::config::DEFAULT_CONFIG_FILE;

/// Resolve the config path, falling back to `vitalwatch.json`.
pub fn config_path(path: Option<&str>) -> PathBuf {
    path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}

/// Load the config file, or defaults when it does not exist. Exits on a
/// malformed file.
pub fn load_config(path: Option<&str>) -> AgentConfig {
    let path = config_path(path);
    match AgentConfig::load_or_default(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Build a multi-threaded tokio runtime or exit.
pub fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting async runtime: {e}");
            std::process::exit(1);
        }
    }
}

/// Parse a duration string like "5m", "30s", "1h", "100ms". A bare number is
/// seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    let (numeric, multiplier) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        (s, 1000)
    };

    let value: u64 = numeric
        .trim()
        .parse()
        .map_err(|_| format!("Invalid duration: {s}"))?;
    Ok(Duration::from_millis(value.saturating_mul(multiplier)))
}
