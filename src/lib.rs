//! distscan - Randomized, exhaustive scanning of very large sample files
//!
//! distscan partitions a binary file into small fixed-size units ("mini-chunks"),
//! hands them to a pool of worker threads in a randomized, non-repeating order,
//! and tracks which units have completed, so that a statistical analysis can be
//! performed incrementally over a file too large to load into memory at once.
//!
//! # Architecture
//!
//! - **Sequence generator**: seeded permutation of unit indices, sliced on demand
//! - **Job builder**: groups permuted units into bounded jobs, leftover included
//! - **Completion tracker**: one bit per unit, each set exactly once
//! - **Chunk reader**: positioned reads of a single unit from the file
//! - **Workers**: one thread each, Idle/Busy, read units and call the analyzer
//! - **Scheduler**: Running → Draining → Done, sole owner of all shared state
//!
//! # Example
//!
//! ```no_run
//! use distscan::analysis::moments::MomentsAnalyzer;
//! use distscan::config::Config;
//! use distscan::scheduler::Scheduler;
//!
//! let config = Config::default();
//! let scheduler = Scheduler::new("/data/samples.bin", &config, MomentsAnalyzer)?;
//! let report = scheduler.run()?;
//!
//! println!("{} jobs, {} failed", report.jobs.len(), report.failures.len());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod job;
pub mod output;
pub mod reader;
pub mod scheduler;
pub mod sequence;
pub mod stats;
pub mod tracker;
pub mod watchdog;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use error::ScanError;
pub use scheduler::{ScanReport, Scheduler};

/// Result type used throughout distscan
pub type Result<T> = anyhow::Result<T>;
