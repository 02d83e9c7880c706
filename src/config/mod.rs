//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//!
//! Every section has serde defaults, so a TOML file only needs to name the
//! settings it changes:
//!
//! ```toml
//! [chunking]
//! mini_chunk_size = 4096
//! job_size = 8388608
//! tail = "truncate"
//!
//! [workers]
//! threads = 8
//! seed = 42
//! ```

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default unit size in bytes
pub const DEFAULT_MINI_CHUNK_SIZE: u64 = 4096;

/// Default job size target in bytes (8 MiB)
pub const DEFAULT_JOB_SIZE: u64 = 8 * 1024 * 1024;

/// Default permutation seed
pub const DEFAULT_SEED: u64 = 42;

/// Default watchdog interval in milliseconds
pub const DEFAULT_WATCHDOG_INTERVAL_MS: u64 = 5000;

/// Complete scan configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Units per job, derived from the job size unless set explicitly
    pub fn mini_chunks_per_job(&self) -> u64 {
        self.chunking.mini_chunks_per_job()
    }
}

/// How trailing bytes that do not fill a whole unit are handled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TailPolicy {
    /// Trailing bytes are never addressed
    #[default]
    Truncate,
    /// Trailing bytes form one final, undersized unit
    Partial,
}

impl fmt::Display for TailPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TailPolicy::Truncate => write!(f, "truncate"),
            TailPolicy::Partial => write!(f, "partial"),
        }
    }
}

/// File partitioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Bytes per unit
    #[serde(default = "default_mini_chunk_size")]
    pub mini_chunk_size: u64,
    /// Target job size in bytes
    #[serde(default = "default_job_size")]
    pub job_size: u64,
    /// Explicit units per job (overrides job_size)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mini_chunks_per_job: Option<u64>,
    /// Trailing partial unit handling
    #[serde(default)]
    pub tail: TailPolicy,
}

fn default_mini_chunk_size() -> u64 {
    DEFAULT_MINI_CHUNK_SIZE
}

fn default_job_size() -> u64 {
    DEFAULT_JOB_SIZE
}

impl ChunkingConfig {
    pub fn mini_chunks_per_job(&self) -> u64 {
        match self.mini_chunks_per_job {
            Some(n) => n,
            None if self.mini_chunk_size == 0 => 0,
            None => self.job_size / self.mini_chunk_size,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            mini_chunk_size: default_mini_chunk_size(),
            job_size: default_job_size(),
            mini_chunks_per_job: None,
            tail: TailPolicy::default(),
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker threads
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Permutation seed
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_threads() -> usize {
    num_cpus::get()
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            seed: default_seed(),
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Progress watchdog interval in milliseconds
    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,
    /// Disable the progress watchdog
    #[serde(default)]
    pub no_watchdog: bool,
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Dry run mode
    #[serde(default)]
    pub dry_run: bool,
}

fn default_watchdog_interval_ms() -> u64 {
    DEFAULT_WATCHDOG_INTERVAL_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_ms: default_watchdog_interval_ms(),
            no_watchdog: false,
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON summary output path
    pub json_output: Option<PathBuf>,
    /// Suppress the text summary
    #[serde(default)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunking.mini_chunk_size, 4096);
        assert_eq!(config.chunking.job_size, 8 * 1024 * 1024);
        assert_eq!(config.mini_chunks_per_job(), 2048);
        assert_eq!(config.chunking.tail, TailPolicy::Truncate);
        assert_eq!(config.workers.seed, 42);
        assert!(config.workers.threads >= 1);
        assert_eq!(config.runtime.watchdog_interval_ms, 5000);
    }

    #[test]
    fn test_explicit_units_per_job() {
        let mut chunking = ChunkingConfig::default();
        chunking.mini_chunks_per_job = Some(2);
        assert_eq!(chunking.mini_chunks_per_job(), 2);

        chunking.mini_chunks_per_job = None;
        chunking.mini_chunk_size = 1024 * 1024;
        assert_eq!(chunking.mini_chunks_per_job(), 8);
    }

    #[test]
    fn test_tail_policy_display() {
        assert_eq!(TailPolicy::Truncate.to_string(), "truncate");
        assert_eq!(TailPolicy::Partial.to_string(), "partial");
    }
}
