//! Configuration validation

use super::*;
use anyhow::Result;
use tracing::warn;

/// Width of one sample in bytes (little-endian f64)
const SAMPLE_WIDTH: u64 = 8;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_chunking(&config.chunking)?;
    validate_workers(&config.workers)?;
    validate_runtime(&config.runtime)?;

    Ok(())
}

/// Validate chunking configuration
pub fn validate_chunking(chunking: &ChunkingConfig) -> Result<()> {
    if chunking.mini_chunk_size == 0 {
        anyhow::bail!("mini_chunk_size must be greater than 0");
    }

    if chunking.mini_chunks_per_job.is_none() && chunking.job_size < chunking.mini_chunk_size {
        anyhow::bail!(
            "job_size ({}) must be at least mini_chunk_size ({})",
            chunking.job_size,
            chunking.mini_chunk_size
        );
    }

    if chunking.mini_chunks_per_job() == 0 {
        anyhow::bail!("mini_chunks_per_job must be greater than 0");
    }

    if chunking.mini_chunk_size % SAMPLE_WIDTH != 0 {
        warn!(
            "mini_chunk_size {} is not a multiple of the {}-byte sample width; samples will straddle units",
            chunking.mini_chunk_size, SAMPLE_WIDTH
        );
    }

    Ok(())
}

/// Validate worker configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.threads == 0 {
        anyhow::bail!("threads must be at least 1");
    }

    Ok(())
}

/// Validate runtime configuration
pub fn validate_runtime(runtime: &RuntimeConfig) -> Result<()> {
    if !runtime.no_watchdog && runtime.watchdog_interval_ms == 0 {
        anyhow::bail!("watchdog_interval_ms must be greater than 0");
    }

    match runtime.log_level.to_lowercase().as_str() {
        "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
        other => anyhow::bail!("unknown log level: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_chunk_size() {
        let mut config = Config::default();
        config.chunking.mini_chunk_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_job_smaller_than_chunk() {
        let mut config = Config::default();
        config.chunking.job_size = 1024;
        assert!(validate_config(&config).is_err());

        // Explicit units per job makes job_size irrelevant
        config.chunking.mini_chunks_per_job = Some(1);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_units_per_job() {
        let mut config = Config::default();
        config.chunking.mini_chunks_per_job = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_threads() {
        let mut config = Config::default();
        config.workers.threads = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_watchdog_interval() {
        let mut config = Config::default();
        config.runtime.watchdog_interval_ms = 0;
        assert!(validate_config(&config).is_err());

        config.runtime.no_watchdog = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut config = Config::default();
        config.runtime.log_level = "DEBUG".to_string();
        assert!(validate_config(&config).is_ok());

        config.runtime.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());
    }
}
