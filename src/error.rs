//! Error types for the proxy sieve

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that abort a run
#[derive(Debug, Error)]
pub enum SieveError {
    #[error("candidate list {path:?} is unavailable: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("known-good file {path:?} exists but cannot be read: {source}")]
    KnownGoodUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write results to {path:?}: {source}")]
    SinkWriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to load config file {path:?}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Per-candidate probe failure. Never propagated past the probe that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("malformed candidate: {0}")]
    Malformed(String),

    #[error("timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}
