//! Sweep configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("page size must be positive")]
    ZeroPageSize,
    #[error("sweep name must not be empty")]
    EmptyName,
    #[error("an explicit offset needs a page size")]
    OffsetWithoutLimit,
}

/// Settings shared by every sequence a factory builds and by the runner.
///
/// Missing fields fall back to [`PipelineConfig::default`], so hosts can load
/// partial JSON/TOML documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name for logging
    pub name: String,
    /// Page size for queue sweeps (`None` = store default)
    pub page_size: Option<u32>,
    /// Retry policy for transient fetch failures
    pub fetch_retry: RetryPolicy,
    /// Treat a panicking action like a failing one instead of aborting the run
    pub isolate_panics: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "registration-sweep".to_string(),
            page_size: None,
            fetch_retry: RetryPolicy::default(),
            isolate_panics: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.fetch_retry = policy;
        self
    }

    pub fn with_isolate_panics(mut self, isolate: bool) -> Self {
        self.isolate_panics = isolate;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.page_size == Some(0) {
            return Err(ConfigError::ZeroPageSize);
        }
        Ok(())
    }
}
