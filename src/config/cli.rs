//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// distscan - Randomized parallel scan of large sample files
#[derive(Parser, Debug)]
#[command(name = "distscan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// File of raw little-endian f64 samples to scan
    #[arg(value_name = "PATH")]
    pub target: PathBuf,

    // === Chunking Options ===
    /// Bytes per unit (e.g., 4k, 64k)
    #[arg(short = 'c', long)]
    pub chunk_size: Option<String>,

    /// Target bytes per job (e.g., 8M, 64M)
    #[arg(short = 'j', long)]
    pub job_size: Option<String>,

    /// Units per job (overrides --job-size)
    #[arg(long)]
    pub chunks_per_job: Option<u64>,

    /// Handling of trailing bytes that do not fill a whole unit
    #[arg(long, value_enum)]
    pub tail: Option<TailMode>,

    // === Worker Options ===
    /// Number of worker threads (default: number of CPUs)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Seed for the unit permutation
    #[arg(short = 's', long, env = "DISTSCAN_SEED")]
    pub seed: Option<u64>,

    // === Runtime Options ===
    /// Progress watchdog interval (e.g., 500ms, 5s)
    #[arg(long)]
    pub watchdog_interval: Option<String>,

    /// Disable the progress watchdog
    #[arg(long)]
    pub no_watchdog: bool,

    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Dry run - validate configuration without executing
    #[arg(long)]
    pub dry_run: bool,

    // === Output Options ===
    /// Write a JSON summary to this path
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Suppress the text summary
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Trailing partial unit handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TailMode {
    /// Ignore bytes past the last whole unit
    Truncate,
    /// Scan them as one final undersized unit
    Partial,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(threads) = self.threads {
            if threads == 0 {
                anyhow::bail!("threads must be at least 1");
            }
        }

        if let Some(per_job) = self.chunks_per_job {
            if per_job == 0 {
                anyhow::bail!("chunks_per_job must be at least 1");
            }
        }

        if !self.dry_run && !self.target.exists() {
            anyhow::bail!("target file does not exist: {}", self.target.display());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::try_parse_from(["distscan", "/data/x.bin"]).unwrap();
        assert_eq!(cli.target, PathBuf::from("/data/x.bin"));
        assert!(cli.threads.is_none());
        assert!(cli.tail.is_none());
        assert!(!cli.quiet);
    }

    #[test]
    fn test_parse_full() {
        let cli = Cli::try_parse_from([
            "distscan",
            "/data/x.bin",
            "-c",
            "8k",
            "-j",
            "16M",
            "-t",
            "4",
            "-s",
            "7",
            "--tail",
            "partial",
            "--watchdog-interval",
            "250ms",
            "--json-output",
            "/tmp/out.json",
        ])
        .unwrap();
        assert_eq!(cli.chunk_size.as_deref(), Some("8k"));
        assert_eq!(cli.job_size.as_deref(), Some("16M"));
        assert_eq!(cli.threads, Some(4));
        assert_eq!(cli.seed, Some(7));
        assert_eq!(cli.tail, Some(TailMode::Partial));
        assert_eq!(cli.json_output, Some(PathBuf::from("/tmp/out.json")));
    }

    #[test]
    fn test_validate_threads() {
        let cli = Cli::try_parse_from(["distscan", "/data/x.bin", "-t", "0", "--dry-run"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_validate_missing_target() {
        let cli = Cli::try_parse_from(["distscan", "/definitely/not/here.bin"]).unwrap();
        assert!(cli.validate().is_err());
    }
}
