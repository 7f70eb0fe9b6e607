//! Subscribers notified as probes complete

use crate::proxy::models::{ProbeResult, ProbeStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

/// Receives probe events in completion order
pub trait ProbeObserver: Send + Sync {
    /// Called once before probing starts with the number of candidates queued
    fn on_run_start(&self, _total: usize) {}

    fn on_probe_complete(&self, result: &ProbeResult);
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProbeObserver for NoopObserver {
    fn on_probe_complete(&self, _result: &ProbeResult) {}
}

/// Logs each completion with a running count
#[derive(Debug, Default)]
pub struct LogObserver {
    total: AtomicUsize,
    checked: AtomicUsize,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checked(&self) -> usize {
        self.checked.load(Ordering::Relaxed)
    }
}

impl ProbeObserver for LogObserver {
    fn on_run_start(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.checked.store(0, Ordering::Relaxed);
    }

    fn on_probe_complete(&self, result: &ProbeResult) {
        let checked = self.checked.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.load(Ordering::Relaxed);

        match (&result.status, result.latency) {
            (ProbeStatus::Working, Some(latency)) => info!(
                "[{}/{}] {} works, response time {:.2}s",
                checked,
                total,
                result.candidate,
                latency.as_secs_f64()
            ),
            (ProbeStatus::Failed(failure), _) => {
                debug!("[{}/{}] {} failed: {}", checked, total, result.candidate, failure)
            }
            (ProbeStatus::Working, None) => {}
        }
    }
}

/// Event forwarded to an out-of-band consumer such as the dashboard
#[derive(Debug, Clone)]
pub enum ProbeEvent {
    Started { total: usize },
    Completed(ProbeResult),
    /// The run ended; `error` carries the fatal error, if any
    Finished { error: Option<String> },
}

/// Forwards events over a channel. Send errors are ignored: a consumer that
/// went away must not affect probing.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<ProbeEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<ProbeEvent>) -> Self {
        Self { tx }
    }

    /// Report how the run ended
    pub fn finish(&self, error: Option<String>) {
        let _ = self.tx.send(ProbeEvent::Finished { error });
    }
}

impl ProbeObserver for ChannelObserver {
    fn on_run_start(&self, total: usize) {
        let _ = self.tx.send(ProbeEvent::Started { total });
    }

    fn on_probe_complete(&self, result: &ProbeResult) {
        let _ = self.tx.send(ProbeEvent::Completed(result.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeFailure;
    use crate::proxy::models::Candidate;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn test_log_observer_counts_completions() {
        let observer = LogObserver::new();
        observer.on_run_start(2);
        observer.on_probe_complete(&ProbeResult::working(
            Candidate::new("http://p1:8080"),
            0,
            Duration::from_millis(20),
        ));
        observer.on_probe_complete(&ProbeResult::failed(
            Candidate::new("http://p2:8080"),
            1,
            ProbeFailure::Timeout,
        ));
        assert_eq!(observer.checked(), 2);
    }

    #[test]
    fn test_channel_observer_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let observer = ChannelObserver::new(tx);

        observer.on_run_start(1);
        observer.on_probe_complete(&ProbeResult::failed(
            Candidate::new("http://p1:8080"),
            0,
            ProbeFailure::Timeout,
        ));

        assert!(matches!(rx.try_recv(), Ok(ProbeEvent::Started { total: 1 })));
        match rx.try_recv() {
            Ok(ProbeEvent::Completed(result)) => assert!(!result.is_working()),
            other => panic!("unexpected event: {:?}", other),
        }

        observer.finish(Some("sink unavailable".to_string()));
        match rx.try_recv() {
            Ok(ProbeEvent::Finished { error }) => {
                assert_eq!(error.as_deref(), Some("sink unavailable"))
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_channel_observer_survives_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let observer = ChannelObserver::new(tx);
        observer.on_run_start(3);
    }
}
