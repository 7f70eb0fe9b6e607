//! Run configuration, loaded from an optional YAML file and overridden by CLI flags

use crate::error::SieveError;
use crate::proxy::checker::{CheckerConfig, DEFAULT_CONCURRENCY, DEFAULT_TARGET_URL};
use crate::proxy::parser::DEFAULT_SCHEME;
use crate::proxy::predicate::SuccessPredicate;
use crate::proxy::store::SinkMode;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-attempt timeout in seconds
pub const DEFAULT_TIMEOUT_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Candidate list, one endpoint per line
    pub input_path: PathBuf,
    /// Where working proxies are written
    pub output_path: PathBuf,
    /// Previously confirmed proxies to skip. Append mode falls back to `output_path`.
    pub known_good_path: Option<PathBuf>,
    pub mode: SinkMode,

    pub concurrency: usize,
    pub timeout_seconds: f64,
    pub target_urls: Vec<String>,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub success: SuccessPredicate,
    pub request_headers: BTreeMap<String, String>,
    pub user_agent: Option<String>,
    pub default_scheme: String,

    pub log_level: String,
    pub dashboard: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("proxies.txt"),
            output_path: PathBuf::from("accessible_proxies.txt"),
            known_good_path: None,
            mode: SinkMode::Overwrite,
            concurrency: DEFAULT_CONCURRENCY,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            target_urls: vec![DEFAULT_TARGET_URL.to_string()],
            success: SuccessPredicate::default(),
            request_headers: BTreeMap::new(),
            user_agent: None,
            default_scheme: DEFAULT_SCHEME.to_string(),
            log_level: "info".to_string(),
            dashboard: false,
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SieveError> {
        let path = path.as_ref();
        let config_error = |reason: String| SieveError::ConfigFile {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        serde_yaml::from_str(&content).map_err(|e| config_error(e.to_string()))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject values that would make a run meaningless
    pub fn validate(&self) -> Result<(), SieveError> {
        if self.concurrency == 0 {
            return Err(SieveError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if !self.timeout_seconds.is_finite()
            || self.timeout_seconds <= 0.0
            || Duration::try_from_secs_f64(self.timeout_seconds).is_err()
        {
            return Err(SieveError::InvalidConfig(format!(
                "timeout must be a positive number of seconds, got {}",
                self.timeout_seconds
            )));
        }
        if self.target_urls.is_empty() {
            return Err(SieveError::InvalidConfig(
                "at least one target URL is required".to_string(),
            ));
        }
        for target in &self.target_urls {
            let url = Url::parse(target).map_err(|e| {
                SieveError::InvalidConfig(format!("target URL '{}': {}", target, e))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(SieveError::InvalidConfig(format!(
                    "target URL '{}' must use http or https",
                    target
                )));
            }
        }
        if let SuccessPredicate::Header(name) = &self.success {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                SieveError::InvalidConfig(format!("invalid required header name '{}'", name))
            })?;
        }
        for (name, value) in &self.request_headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                SieveError::InvalidConfig(format!("invalid request header name '{}'", name))
            })?;
            HeaderValue::from_str(value).map_err(|_| {
                SieveError::InvalidConfig(format!("invalid value for request header '{}'", name))
            })?;
        }
        if !self.default_scheme.ends_with("://") {
            return Err(SieveError::InvalidConfig(format!(
                "default scheme '{}' must end with '://'",
                self.default_scheme
            )));
        }
        Ok(())
    }

    /// Per-attempt timeout. Out-of-range values saturate; `validate` rejects them.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds).unwrap_or(Duration::MAX)
    }

    /// Known-good files for this run. In append mode the output file is
    /// always one of them, so nothing already written is appended twice.
    pub fn known_good_paths(&self) -> Vec<&Path> {
        let mut paths = Vec::new();
        if let Some(path) = &self.known_good_path {
            paths.push(path.as_path());
        }
        if self.mode == SinkMode::Append && !paths.contains(&self.output_path.as_path()) {
            paths.push(self.output_path.as_path());
        }
        paths
    }

    pub fn checker_config(&self) -> CheckerConfig {
        let mut config = CheckerConfig::new()
            .with_timeout(self.timeout())
            .with_concurrency(self.concurrency)
            .with_targets(self.target_urls.clone())
            .with_predicate(self.success.clone());
        for (name, value) in &self.request_headers {
            config = config.with_request_header(name, value);
        }
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }
        config
    }
}
