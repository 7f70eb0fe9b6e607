//! Proxy checker module: probes candidates under a bounded concurrency limit

use crate::error::{ProbeFailure, SieveError};
use crate::proxy::models::{Candidate, ProbeResult};
use crate::proxy::observer::ProbeObserver;
use crate::proxy::predicate::SuccessPredicate;
use async_trait::async_trait;
use futures::future;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy as ReqwestProxy, Url};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default timeout for each probe attempt in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default number of concurrent probes
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default URL to probe candidates against
pub const DEFAULT_TARGET_URL: &str = "https://claude3.free2gpt.xyz/";

/// Configuration for the HTTP prober
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each attempt against a target
    pub timeout: Duration,
    /// Maximum number of probes in flight at once
    pub concurrency: usize,
    /// URLs tried in order until one succeeds
    pub targets: Vec<String>,
    /// Rule deciding whether a response counts as working
    pub predicate: SuccessPredicate,
    /// Extra headers sent with every probe request
    pub request_headers: Vec<(String, String)>,
    pub user_agent: Option<String>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            targets: vec![DEFAULT_TARGET_URL.to_string()],
            predicate: SuccessPredicate::default(),
            request_headers: Vec::new(),
            user_agent: None,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_predicate(mut self, predicate: SuccessPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_request_header(mut self, name: &str, value: &str) -> Self {
        self.request_headers
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = Some(user_agent);
        self
    }
}

/// A liveness check of one candidate
#[async_trait]
pub trait Probe: Send + Sync {
    /// Return the latency of the first successful attempt, or why none succeeded
    async fn probe(&self, candidate: &Candidate) -> Result<Duration, ProbeFailure>;
}

/// Probes candidates by sending HTTP requests through them as forward proxies
#[derive(Debug, Clone)]
pub struct HttpProbe {
    config: CheckerConfig,
    headers: HeaderMap,
}

impl HttpProbe {
    pub fn new(config: CheckerConfig) -> Result<Self, SieveError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.request_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                SieveError::InvalidConfig(format!("request header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                SieveError::InvalidConfig(format!("request header value '{}': {}", value, e))
            })?;
            headers.insert(name, value);
        }

        Ok(Self { config, headers })
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Create a reqwest client routed through the candidate
    fn create_client(&self, candidate: &Candidate) -> Result<Client, ProbeFailure> {
        let url = Url::parse(candidate.as_str())
            .map_err(|e| ProbeFailure::Malformed(format!("{}: {}", candidate, e)))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ProbeFailure::Malformed(format!("{}: missing host", candidate)));
        }

        let proxy = ReqwestProxy::all(url.as_str())
            .map_err(|e| ProbeFailure::Malformed(format!("{}: {}", candidate, e)))?;

        let mut builder = Client::builder()
            .proxy(proxy)
            .timeout(self.config.timeout)
            .default_headers(self.headers.clone());
        if let Some(user_agent) = &self.config.user_agent {
            builder = builder.user_agent(user_agent);
        }

        builder
            .build()
            .map_err(|e| ProbeFailure::Connection(format!("client setup: {}", e)))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, candidate: &Candidate) -> Result<Duration, ProbeFailure> {
        let client = self.create_client(candidate)?;
        let mut last_failure =
            ProbeFailure::UnexpectedResponse("no probe targets configured".to_string());

        for target in &self.config.targets {
            let start = Instant::now();
            match tokio::time::timeout(self.config.timeout, client.get(target).send()).await {
                Ok(Ok(response)) => {
                    let latency = start.elapsed();
                    match self
                        .config
                        .predicate
                        .evaluate(response.status(), response.headers())
                    {
                        Ok(()) => return Ok(latency),
                        Err(failure) => last_failure = failure,
                    }
                }
                Ok(Err(e)) => last_failure = classify_error(&e),
                Err(_) => last_failure = ProbeFailure::Timeout,
            }
        }

        Err(last_failure)
    }
}

fn classify_error(error: &reqwest::Error) -> ProbeFailure {
    if error.is_timeout() {
        ProbeFailure::Timeout
    } else {
        ProbeFailure::Connection(error_chain(error))
    }
}

/// Join an error with its sources, reqwest's top-level message is rarely enough
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Operator-triggered stop. Once triggered no new probes are submitted,
/// probes already in flight run to completion or time out.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs a probe over many candidates with at most `concurrency` in flight
pub struct ProbeExecutor<P> {
    probe: P,
    concurrency: usize,
}

impl<P: Probe> ProbeExecutor<P> {
    pub fn new(probe: P, concurrency: usize) -> Self {
        Self {
            probe,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Probe every `(position, candidate)` pair, reporting each completion to
    /// the observer as it happens. Results come back in completion order.
    pub async fn run(
        &self,
        candidates: Vec<(usize, Candidate)>,
        observer: &dyn ProbeObserver,
        stop: &StopSignal,
    ) -> Vec<ProbeResult> {
        observer.on_run_start(candidates.len());

        stream::iter(candidates)
            .take_while(|_| future::ready(!stop.is_triggered()))
            .map(|(position, candidate)| async move {
                match self.probe.probe(&candidate).await {
                    Ok(latency) => ProbeResult::working(candidate, position, latency),
                    Err(failure) => ProbeResult::failed(candidate, position, failure),
                }
            })
            .buffer_unordered(self.concurrency)
            .inspect(|result| observer.on_probe_complete(result))
            .collect::<Vec<_>>()
            .await
    }
}
