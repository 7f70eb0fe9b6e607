//! Proxy module for loading, probing and ranking candidate proxies
//!
//! This module provides functionality for:
//! - Reading candidate endpoints and normalizing their scheme
//! - Loading the set of proxies confirmed working by a previous run
//! - Probing candidates concurrently under a bounded limit
//! - Ranking working proxies by latency and persisting them

pub mod aggregator;
pub mod checker;
pub mod models;
pub mod observer;
pub mod parser;
pub mod predicate;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregator::{aggregate, Aggregation};
pub use checker::{CheckerConfig, HttpProbe, Probe, ProbeExecutor, StopSignal};
pub use models::{Candidate, ProbeResult, ProbeStatus, RunSummary, WorkingEntry};
pub use observer::{ChannelObserver, LogObserver, NoopObserver, ProbeEvent, ProbeObserver};
pub use parser::EndpointSource;
pub use predicate::SuccessPredicate;
pub use store::{KnownGoodSet, ResultSink, SinkMode};
