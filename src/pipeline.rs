//! End-to-end run: load candidates, skip known-good ones, probe, rank and persist

use crate::config::AppConfig;
use crate::proxy::{
    aggregate, EndpointSource, HttpProbe, KnownGoodSet, Probe, ProbeExecutor, ProbeObserver,
    ResultSink, RunSummary, SinkMode, StopSignal, WorkingEntry,
};
use crate::Result;
use tracing::{debug, info, warn};

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Newly working proxies, fastest first
    pub entries: Vec<WorkingEntry>,
    /// Lines written to the result sink
    pub written: usize,
    /// Whether the run was stopped before every candidate was submitted
    pub stopped: bool,
}

/// Run with the HTTP prober described by `config`
pub async fn run(
    config: &AppConfig,
    observer: &dyn ProbeObserver,
    stop: &StopSignal,
) -> Result<RunReport> {
    config.validate()?;
    let probe = HttpProbe::new(config.checker_config())?;
    run_with_probe(config, probe, observer, stop).await
}

/// Run with any probe implementation
///
/// A failure to read the candidate list aborts before probing starts.
/// A failure to write results is reported only after probing completes.
pub async fn run_with_probe<P: Probe>(
    config: &AppConfig,
    probe: P,
    observer: &dyn ProbeObserver,
    stop: &StopSignal,
) -> Result<RunReport> {
    let candidates = EndpointSource::read_file(&config.input_path, &config.default_scheme)?;
    info!(
        "Loaded {} candidates from {:?}",
        candidates.len(),
        config.input_path
    );

    let mut known = KnownGoodSet::new();
    for path in config.known_good_paths() {
        let loaded = KnownGoodSet::load(path, &config.default_scheme)?;
        debug!("Loaded {} known-good proxies from {:?}", loaded.len(), path);
        known.merge(loaded);
    }

    let considered = candidates.len();
    let queue: Vec<_> = candidates
        .into_iter()
        .enumerate()
        .filter(|(_, candidate)| !known.contains(candidate))
        .collect();
    let already_known = considered - queue.len();
    let queued = queue.len();
    if already_known > 0 {
        info!("Skipping {} already known proxies", already_known);
    }

    info!(
        "Probing {} candidates with {} workers, timeout {:.1}s",
        queued, config.concurrency, config.timeout_seconds
    );
    let executor = ProbeExecutor::new(probe, config.concurrency);
    let results = executor.run(queue, observer, stop).await;
    let stopped = results.len() < queued;

    let aggregation = aggregate(considered, already_known, results, &known);

    let sink = ResultSink::new(&config.output_path, config.mode);
    // A partial ranking must not replace a complete one
    let written = if stopped && sink.mode() == SinkMode::Overwrite {
        warn!(
            "Run stopped early, keeping previous results in {:?}",
            sink.path()
        );
        0
    } else {
        debug!("Writing results to {:?} ({:?} mode)", sink.path(), sink.mode());
        sink.write(&aggregation.entries)?
    };

    Ok(RunReport {
        summary: aggregation.summary,
        entries: aggregation.entries,
        written,
        stopped,
    })
}
