//! Proxy Sieve - concurrent proxy checker
//!
//! Probes a list of candidate proxies under a bounded concurrency limit,
//! keeps the ones that answer, ranks them by latency and persists them
//! for later runs.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod proxy;
pub mod tui;

pub use config::AppConfig;
pub use error::{ProbeFailure, SieveError};
pub use pipeline::{run, run_with_probe, RunReport};
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
