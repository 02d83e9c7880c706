//! CLI to Config conversion utilities

use crate::config::{cli, Config, TailPolicy};
use anyhow::{Context, Result};

/// Parse a size string (e.g., "4k", "8M", "1G") to bytes
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if s.ends_with("kb") || s.ends_with('k') {
        (s.trim_end_matches("kb").trim_end_matches('k'), 1024u64)
    } else if s.ends_with("mb") || s.ends_with('m') {
        (s.trim_end_matches("mb").trim_end_matches('m'), 1024 * 1024)
    } else if s.ends_with("gb") || s.ends_with('g') {
        (s.trim_end_matches("gb").trim_end_matches('g'), 1024 * 1024 * 1024)
    } else if s.ends_with("tb") || s.ends_with('t') {
        (s.trim_end_matches("tb").trim_end_matches('t'), 1024 * 1024 * 1024 * 1024)
    } else if s.ends_with('b') {
        (s.trim_end_matches('b'), 1)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid size format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Size overflows u64: {}", s))
}

/// Parse a duration string (e.g., "250ms", "5s", "1m") to milliseconds
pub fn parse_duration_ms(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if s.ends_with("ms") {
        (s.trim_end_matches("ms"), 1u64)
    } else if s.ends_with("min") || s.ends_with('m') {
        (s.trim_end_matches("min").trim_end_matches('m'), 60_000)
    } else if s.ends_with("sec") || s.ends_with('s') {
        (s.trim_end_matches("sec").trim_end_matches('s'), 1000)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    Ok(num * multiplier)
}

/// Convert CLI TailMode to config TailPolicy
pub fn convert_tail_mode(mode: cli::TailMode) -> TailPolicy {
    match mode {
        cli::TailMode::Truncate => TailPolicy::Truncate,
        cli::TailMode::Partial => TailPolicy::Partial,
    }
}

/// Build the effective configuration: defaults, then TOML file, then CLI flags
pub fn build_config(cli: &cli::Cli) -> Result<Config> {
    let base = match &cli.config {
        Some(path) => crate::config::toml::parse_toml_file(path)?,
        None => Config::default(),
    };

    crate::config::toml::merge_cli_with_config(cli, base)
}
