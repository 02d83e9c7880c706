//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use crate::config::cli_convert::{convert_tail_mode, parse_duration_ms, parse_size};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Override chunking settings
    if let Some(ref size_str) = cli.chunk_size {
        config.chunking.mini_chunk_size = parse_size(size_str).context("Invalid chunk size")?;
    }
    if let Some(ref size_str) = cli.job_size {
        config.chunking.job_size = parse_size(size_str).context("Invalid job size")?;
        // A job size on the command line wins over units-per-job from the file
        config.chunking.mini_chunks_per_job = None;
    }
    if let Some(per_job) = cli.chunks_per_job {
        config.chunking.mini_chunks_per_job = Some(per_job);
    }
    if let Some(mode) = cli.tail {
        config.chunking.tail = convert_tail_mode(mode);
    }

    // Override worker settings
    if let Some(threads) = cli.threads {
        config.workers.threads = threads;
    }
    if let Some(seed) = cli.seed {
        config.workers.seed = seed;
    }

    // Override runtime settings
    if let Some(ref interval_str) = cli.watchdog_interval {
        config.runtime.watchdog_interval_ms =
            parse_duration_ms(interval_str).context("Invalid watchdog interval")?;
    }
    if cli.no_watchdog {
        config.runtime.no_watchdog = true;
    }
    if let Some(ref level) = cli.log_level {
        config.runtime.log_level = level.clone();
    }
    if cli.debug {
        config.runtime.log_level = "debug".to_string();
    }
    if cli.dry_run {
        config.runtime.dry_run = true;
    }

    // Override output settings
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if cli.quiet {
        config.output.quiet = true;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_parse_empty_toml_uses_defaults() {
        let config = parse_toml_string("").unwrap();
        assert_eq!(config.chunking.mini_chunk_size, DEFAULT_MINI_CHUNK_SIZE);
        assert_eq!(config.workers.seed, DEFAULT_SEED);
    }

    #[test]
    fn test_parse_toml_sections() {
        let config = parse_toml_string(
            r#"
            [chunking]
            mini_chunk_size = 8192
            mini_chunks_per_job = 16
            tail = "partial"

            [workers]
            threads = 3
            seed = 99

            [runtime]
            watchdog_interval_ms = 100

            [output]
            json_output = "/tmp/summary.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.chunking.mini_chunk_size, 8192);
        assert_eq!(config.mini_chunks_per_job(), 16);
        assert_eq!(config.chunking.tail, TailPolicy::Partial);
        assert_eq!(config.workers.threads, 3);
        assert_eq!(config.workers.seed, 99);
        assert_eq!(config.runtime.watchdog_interval_ms, 100);
        assert_eq!(config.output.json_output, Some(PathBuf::from("/tmp/summary.json")));
    }

    #[test]
    fn test_parse_toml_rejects_bad_tail() {
        assert!(parse_toml_string("[chunking]\ntail = \"sometimes\"").is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.toml");
        std::fs::write(&path, "[workers]\nthreads = 2\nseed = 5\n").unwrap();

        let cli = Cli::try_parse_from([
            "distscan",
            "/data/x.bin",
            "--config",
            path.to_str().unwrap(),
            "-s",
            "11",
        ])
        .unwrap();
        let file_config = parse_toml_file(&path).unwrap();
        let config = merge_cli_with_config(&cli, file_config).unwrap();

        assert_eq!(config.workers.threads, 2);
        assert_eq!(config.workers.seed, 11);
    }

    #[test]
    fn test_cli_debug_sets_log_level() {
        let cli = Cli::try_parse_from(["distscan", "/data/x.bin", "--debug"]).unwrap();
        let config = merge_cli_with_config(&cli, Config::default()).unwrap();
        assert_eq!(config.runtime.log_level, "debug");
    }
}
