//! Human-readable text output

use super::{format_bytes, format_number, format_throughput};
use crate::analysis::moments::MomentsAccumulator;
use crate::scheduler::ScanReport;
use std::fmt::Write;
use std::time::Duration;

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Render the scan summary
///
/// Shows the scan plan, job and unit counts, throughput, job latency
/// percentiles, failures, and the watchdog record if it ran.
pub fn format_summary<R>(report: &ScanReport<R>) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_summary(&mut out, report);
    out
}

/// Print the scan summary to stdout
pub fn print_summary<R>(report: &ScanReport<R>) {
    print!("{}", format_summary(report));
}

fn write_summary<R>(out: &mut String, report: &ScanReport<R>) -> std::fmt::Result {
    let stats = &report.stats;

    writeln!(out, "{}", RULE)?;
    writeln!(out, "                    SCAN RESULTS")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;

    writeln!(out, "Target: {}", report.file_path.display())?;
    writeln!(out, "  Size:        {}", format_bytes(report.file_size))?;
    writeln!(
        out,
        "  Units:       {} x {} (tail: {})",
        format_number(report.chunk_count),
        format_bytes(report.mini_chunk_size),
        report.tail
    )?;
    writeln!(out, "  Per job:     {} units", format_number(report.mini_chunks_per_job))?;
    writeln!(out, "  Seed:        {}", report.seed)?;
    writeln!(out, "  Workers:     {}", report.workers)?;
    writeln!(out, "  Started:     {}", report.started_at.to_rfc3339())?;
    writeln!(out, "  Elapsed:     {:.3}s", report.elapsed.as_secs_f64())?;
    writeln!(out)?;

    writeln!(out, "Jobs:")?;
    writeln!(out, "  Completed:   {}", format_number(stats.jobs_completed))?;
    writeln!(out, "  Failed:      {}", format_number(stats.jobs_failed))?;
    writeln!(
        out,
        "  Units:       {} ({})",
        format_number(stats.units_processed),
        format_bytes(stats.bytes_processed)
    )?;
    writeln!(out, "  Throughput:  {}", format_throughput(throughput(stats.bytes_processed, report.elapsed)))?;
    writeln!(out)?;

    writeln!(out, "Job latency:")?;
    match stats.latency_mean_us {
        Some(mean) => {
            let us = |v: Option<u64>| Duration::from_micros(v.unwrap_or(0));
            writeln!(out, "  Mean:   {:?}", Duration::from_micros(mean))?;
            writeln!(out, "  p50:    {:?}", us(stats.latency_p50_us))?;
            writeln!(out, "  p99:    {:?}", us(stats.latency_p99_us))?;
            writeln!(out, "  Max:    {:?}", us(stats.latency_max_us))?;
        }
        None => writeln!(out, "  No jobs completed")?,
    }
    writeln!(out)?;

    if !report.failures.is_empty() {
        writeln!(out, "Failures ({} units affected):", format_number(report.failed_units()))?;
        for failure in &report.failures {
            writeln!(out, "  job {}: {}", failure.job_id, failure.error)?;
        }
        writeln!(out)?;
    }

    if let Some(watchdog) = report.watchdog {
        if watchdog.stalled_ticks > 0 {
            writeln!(
                out,
                "Watchdog: {} of {} intervals without progress",
                watchdog.stalled_ticks, watchdog.ticks
            )?;
            writeln!(out)?;
        }
    }

    writeln!(out, "{}", RULE)
}

/// Render merged moments of a whole scan
pub fn format_moments(moments: &MomentsAccumulator) -> String {
    let opt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.6}", v));

    let mut out = String::new();
    out.push_str("Sample moments:\n");
    out.push_str(&format!("  Samples:   {}\n", format_number(moments.count())));
    if moments.skipped() > 0 {
        out.push_str(&format!("  Skipped:   {} (non-finite or subnormal)\n", format_number(moments.skipped())));
    }
    out.push_str(&format!("  Mean:      {:.6}\n", moments.mean()));
    out.push_str(&format!("  Std dev:   {}\n", opt(moments.std_dev())));
    out.push_str(&format!("  Skewness:  {}\n", opt(moments.skewness())));
    out.push_str(&format!("  Kurtosis:  {}\n", opt(moments.kurtosis())));
    out.push_str(&format!("  Min:       {}\n", opt(moments.min())));
    out.push_str(&format!("  Max:       {}\n", opt(moments.max())));
    if moments.is_integer_only() && moments.count() > 0 {
        out.push_str("  All samples are integral\n");
    }
    if moments.had_numerical_error() {
        out.push_str("  Warning: numerical error while merging, some jobs were dropped\n");
    }
    out
}

fn throughput(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (bytes as f64 / secs) as u64
    } else {
        0
    }
}
