//! Proxy data models

use crate::error::ProbeFailure;
use std::fmt;
use std::time::Duration;

/// A scheme-qualified proxy endpoint, e.g. `http://10.0.0.1:8080`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Candidate(String);

impl Candidate {
    /// Wrap an already normalized endpoint string
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self(endpoint.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Candidate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Working,
    Failed(ProbeFailure),
}

/// Result of probing one candidate
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub candidate: Candidate,
    /// Position of the candidate in the input list, used for stable ranking
    pub position: usize,
    pub status: ProbeStatus,
    /// Duration of the successful attempt; `None` when the probe failed
    pub latency: Option<Duration>,
}

impl ProbeResult {
    pub fn working(candidate: Candidate, position: usize, latency: Duration) -> Self {
        Self {
            candidate,
            position,
            status: ProbeStatus::Working,
            latency: Some(latency),
        }
    }

    pub fn failed(candidate: Candidate, position: usize, failure: ProbeFailure) -> Self {
        Self {
            candidate,
            position,
            status: ProbeStatus::Failed(failure),
            latency: None,
        }
    }

    pub fn is_working(&self) -> bool {
        matches!(self.status, ProbeStatus::Working)
    }

    pub fn failure(&self) -> Option<&ProbeFailure> {
        match &self.status {
            ProbeStatus::Failed(failure) => Some(failure),
            ProbeStatus::Working => None,
        }
    }
}

/// A candidate confirmed usable in the current run
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingEntry {
    pub candidate: Candidate,
    pub latency: Duration,
}

impl WorkingEntry {
    pub fn new(candidate: Candidate, latency: Duration) -> Self {
        Self { candidate, latency }
    }

    /// `<endpoint>,<latency_seconds_2dp>` as written by the overwrite sink
    pub fn to_ranked_line(&self) -> String {
        format!("{},{:.2}", self.candidate, self.latency.as_secs_f64())
    }

    /// `<endpoint>` as written by the append sink
    pub fn to_incremental_line(&self) -> String {
        self.candidate.to_string()
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Candidates read from the source
    pub considered: usize,
    /// Candidates skipped because they were already known to work
    pub already_known: usize,
    /// Candidates actually probed
    pub probed: usize,
    /// Newly confirmed working candidates
    pub succeeded: usize,
    pub failed: usize,
    pub timeouts: usize,
    pub connection_errors: usize,
    pub malformed: usize,
    pub unexpected_responses: usize,
}

impl RunSummary {
    pub(crate) fn record_failure(&mut self, failure: &ProbeFailure) {
        self.failed += 1;
        match failure {
            ProbeFailure::Malformed(_) => self.malformed += 1,
            ProbeFailure::Timeout => self.timeouts += 1,
            ProbeFailure::Connection(_) => self.connection_errors += 1,
            ProbeFailure::UnexpectedResponse(_) => self.unexpected_responses += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "considered: {}, probed: {}, newly working: {} (already known: {}, failed: {} [timeout {}, connection {}, response {}, malformed {}])",
            self.considered,
            self.probed,
            self.succeeded,
            self.already_known,
            self.failed,
            self.timeouts,
            self.connection_errors,
            self.unexpected_responses,
            self.malformed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_display() {
        let candidate = Candidate::new("http://127.0.0.1:8080");
        assert_eq!(candidate.to_string(), "http://127.0.0.1:8080");
        assert_eq!(candidate.as_str(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_probe_result() {
        let candidate = Candidate::new("http://127.0.0.1:8080");

        let result = ProbeResult::working(candidate.clone(), 0, Duration::from_millis(100));
        assert!(result.is_working());
        assert_eq!(result.latency, Some(Duration::from_millis(100)));
        assert!(result.failure().is_none());

        let result = ProbeResult::failed(candidate, 1, ProbeFailure::Timeout);
        assert!(!result.is_working());
        assert!(result.latency.is_none());
        assert_eq!(result.failure(), Some(&ProbeFailure::Timeout));
    }

    #[test]
    fn test_working_entry_lines() {
        let entry = WorkingEntry::new(
            Candidate::new("http://p3:8080"),
            Duration::from_millis(104),
        );
        assert_eq!(entry.to_ranked_line(), "http://p3:8080,0.10");
        assert_eq!(entry.to_incremental_line(), "http://p3:8080");

        let entry = WorkingEntry::new(Candidate::new("http://p1:8080"), Duration::from_secs(3));
        assert_eq!(entry.to_ranked_line(), "http://p1:8080,3.00");
    }

    #[test]
    fn test_summary_records_failure_kinds() {
        let mut summary = RunSummary::default();
        summary.record_failure(&ProbeFailure::Timeout);
        summary.record_failure(&ProbeFailure::Malformed("bad".to_string()));
        summary.record_failure(&ProbeFailure::Connection("refused".to_string()));

        assert_eq!(summary.failed, 3);
        assert_eq!(summary.timeouts, 1);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.connection_errors, 1);
        assert_eq!(summary.unexpected_responses, 0);
    }
}
