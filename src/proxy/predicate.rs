//! Success predicates deciding whether a probe response counts as working

use crate::error::ProbeFailure;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status code expected by the default predicate
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Rule applied to the response received through a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessPredicate {
    /// Response status must equal the given code
    Status(u16),
    /// Response must be 2xx and carry the named header
    Header(String),
}

impl Default for SuccessPredicate {
    fn default() -> Self {
        Self::Status(DEFAULT_EXPECTED_STATUS)
    }
}

impl SuccessPredicate {
    /// Check a response, describing the mismatch on failure
    pub fn evaluate(&self, status: StatusCode, headers: &HeaderMap) -> Result<(), ProbeFailure> {
        match self {
            Self::Status(expected) => {
                if status.as_u16() == *expected {
                    Ok(())
                } else {
                    Err(ProbeFailure::UnexpectedResponse(format!(
                        "HTTP status: {}",
                        status
                    )))
                }
            }
            Self::Header(name) => {
                if !status.is_success() {
                    return Err(ProbeFailure::UnexpectedResponse(format!(
                        "HTTP status: {}",
                        status
                    )));
                }
                if headers.contains_key(name.as_str()) {
                    Ok(())
                } else {
                    Err(ProbeFailure::UnexpectedResponse(format!(
                        "missing header: {}",
                        name
                    )))
                }
            }
        }
    }

    pub fn matches(&self, status: StatusCode, headers: &HeaderMap) -> bool {
        self.evaluate(status, headers).is_ok()
    }
}

impl fmt::Display for SuccessPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "status == {}", code),
            Self::Header(name) => write!(f, "header '{}' present", name),
        }
    }
}
