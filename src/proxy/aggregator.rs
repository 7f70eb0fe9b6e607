//! Folds probe results into the ranked working set and run summary

use crate::proxy::models::{Candidate, ProbeResult, ProbeStatus, RunSummary, WorkingEntry};
use crate::proxy::store::KnownGoodSet;
use std::collections::HashSet;

/// Ranked output of a run
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// Newly working candidates, fastest first
    pub entries: Vec<WorkingEntry>,
    pub summary: RunSummary,
}

/// Build the ranked working set from results that may arrive in any order
///
/// `considered` is the number of candidates read from the source and
/// `already_known` how many of them were skipped before probing. Entries
/// already in `known` are dropped even if they were probed, and a candidate
/// listed several times keeps only its fastest result. Equal latencies keep
/// input order.
pub fn aggregate(
    considered: usize,
    already_known: usize,
    mut results: Vec<ProbeResult>,
    known: &KnownGoodSet,
) -> Aggregation {
    let mut summary = RunSummary {
        considered,
        already_known,
        probed: results.len(),
        ..Default::default()
    };

    // Input order first, so the stable latency sort breaks ties by position
    results.sort_by_key(|result| result.position);

    let mut working: Vec<WorkingEntry> = Vec::new();
    for result in results {
        match (result.status, result.latency) {
            (ProbeStatus::Working, Some(latency)) if !known.contains(&result.candidate) => {
                working.push(WorkingEntry::new(result.candidate, latency));
            }
            (ProbeStatus::Working, _) => {}
            (ProbeStatus::Failed(failure), _) => summary.record_failure(&failure),
        }
    }

    working.sort_by_key(|entry| entry.latency);

    let mut seen: HashSet<Candidate> = HashSet::new();
    working.retain(|entry| seen.insert(entry.candidate.clone()));

    summary.succeeded = working.len();
    Aggregation {
        entries: working,
        summary,
    }
}
