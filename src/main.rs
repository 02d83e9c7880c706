//! distscan CLI entry point

use anyhow::{Context, Result};
use distscan::analysis::moments::{MomentsAccumulator, MomentsAnalyzer};
use distscan::config::{cli::Cli, cli_convert, validator, Config};
use distscan::output::{json, text};
use distscan::Scheduler;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;

    let config = cli_convert::build_config(&cli)?;
    init_tracing(&config.runtime.log_level);
    debug!("configuration: {:?}", config);

    validator::validate_config(&config).context("Configuration validation failed")?;

    if !config.output.quiet {
        println!("distscan v{}", env!("CARGO_PKG_VERSION"));
        println!();
        print_configuration(&cli, &config);
    }

    if config.runtime.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let scheduler = Scheduler::new(&cli.target, &config, MomentsAnalyzer)?;
    let report = scheduler.run()?;

    let moments = MomentsAccumulator::merge_all(report.results());
    info!(
        "{} samples, mean {:.6}, {} jobs failed",
        moments.count(),
        moments.mean(),
        report.failures.len()
    );

    if !config.output.quiet {
        println!();
        text::print_summary(&report);
        println!();
        print!("{}", text::format_moments(&moments));
    }

    if let Some(ref path) = config.output.json_output {
        let analysis = serde_json::to_value(json::JsonMoments::from(&moments))?;
        let output = json::build_output(&report, Some(analysis));
        json::write_json_output(path, &output, true)?;
        info!("JSON summary written to {}", path.display());
    }

    Ok(())
}

/// Log to stderr, `RUST_LOG` taking precedence over the configured level
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_configuration(cli: &Cli, config: &Config) {
    println!("Configuration:");
    println!("  Target:          {}", cli.target.display());
    println!("  Unit size:       {} bytes", config.chunking.mini_chunk_size);
    println!("  Units per job:   {}", config.mini_chunks_per_job());
    println!("  Tail:            {}", config.chunking.tail);
    println!("  Threads:         {}", config.workers.threads);
    println!("  Seed:            {}", config.workers.seed);
    if config.runtime.no_watchdog {
        println!("  Watchdog:        disabled");
    } else {
        println!("  Watchdog:        every {} ms", config.runtime.watchdog_interval_ms);
    }
    if let Some(ref path) = config.output.json_output {
        println!("  JSON output:     {}", path.display());
    }
}
