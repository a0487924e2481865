//! Client configuration.
//!
//! Provides a unified `ClientConfig` used by every front-end to locate the
//! REST backend and to choose the offline queue policies. Values come from an
//! optional JSON file and are then overridden by `RESTREV_*` environment
//! variables.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, non_blank};

/// Backend used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:1337";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

const ENV_API_URL: &str = "RESTREV_API_URL";
const ENV_REQUEST_TIMEOUT: &str = "RESTREV_REQUEST_TIMEOUT_SECS";
const ENV_DRAIN_POLICY: &str = "RESTREV_DRAIN_POLICY";
const ENV_COALESCE_EDITS: &str = "RESTREV_COALESCE_EDITS";

/// What a queue drain does after a replay fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrainPolicy {
    /// Halt at the first failure so later entries never overtake it.
    #[default]
    StopOnFailure,
    /// Leave the failed entry queued and keep replaying later entries.
    BestEffort,
}

impl fmt::Display for DrainPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopOnFailure => write!(f, "stop-on-failure"),
            Self::BestEffort => write!(f, "best-effort"),
        }
    }
}

impl FromStr for DrainPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop-on-failure" | "stop" | "strict" => Ok(Self::StopOnFailure),
            "best-effort" | "continue" => Ok(Self::BestEffort),
            other => Err(Error::Config(format!("unknown drain policy '{other}'"))),
        }
    }
}

/// Runtime configuration shared by all clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the restaurant REST backend
    pub api_base_url: String,
    /// Transport timeout applied to every request
    pub request_timeout_secs: u64,
    /// Queue drain failure policy
    pub drain_policy: DrainPolicy,
    /// Collapse repeated unsent edits of the same confirmed review
    pub coalesce_edits: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            drain_policy: DrainPolicy::default(),
            coalesce_edits: true,
        }
    }
}

impl ClientConfig {
    /// Load the config file at `path` (defaults when missing) and apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) if path.exists() => Self::load_from_path(path)?,
            _ => Self::default(),
        };
        base.with_overrides(|name| std::env::var(name).ok())
    }

    /// Parse a JSON config file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw).map_err(|error| {
            Error::Config(format!("failed to parse {}: {error}", path.display()))
        })
    }

    /// Parse a JSON config payload.
    pub fn parse(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.validated()
    }

    /// Apply `RESTREV_*` overrides read through `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = non_blank(lookup(ENV_API_URL)) {
            self.api_base_url = url;
        }
        if let Some(raw) = non_blank(lookup(ENV_REQUEST_TIMEOUT)) {
            self.request_timeout_secs = raw.parse().map_err(|_| {
                Error::Config(format!("{ENV_REQUEST_TIMEOUT} must be a whole number"))
            })?;
        }
        if let Some(raw) = non_blank(lookup(ENV_DRAIN_POLICY)) {
            self.drain_policy = raw.parse()?;
        }
        if let Some(raw) = non_blank(lookup(ENV_COALESCE_EDITS)) {
            self.coalesce_edits = matches!(
                raw.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        self.validated()
    }

    /// Override the backend URL (e.g. from a command-line flag).
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Transport timeout as a `Duration`.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check and normalize the configuration.
    pub fn validated(mut self) -> Result<Self> {
        let url = non_blank(Some(self.api_base_url))
            .ok_or_else(|| Error::Config("api_base_url must not be empty".to_string()))?;
        if !is_http_url(&url) {
            return Err(Error::Config(
                "api_base_url must include http:// or https://".to_string(),
            ));
        }
        self.api_base_url = url.trim_end_matches('/').to_string();
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}
