use std::fmt;
use std::time::Duration;

use regex::Regex;
use secrecy::SecretString;
use thiserror::Error;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_SOURCE: &str = "tokentap";

const LOKI_PUSH_PATH: &str = "/loki/api/v1/push";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required parameter: {0}")]
    Missing(&'static str),
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("invalid metrics URL '{0}': it should contain 'api/prom'")]
    InvalidMetricsUrl(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Grafana Cloud endpoints and credentials for one monitored callable.
#[derive(Clone)]
pub struct GrafanaConfig {
    /// Prometheus URL as shown in the Grafana Cloud portal (contains `api/prom`).
    pub metrics_url: String,
    /// Loki base URL.
    pub logs_url: String,
    pub metrics_username: String,
    pub logs_username: String,
    pub access_token: SecretString,
    pub environment: Option<String>,
    pub source: String,
    /// Leave prompt and completion text out of log lines.
    pub disable_content: bool,
    pub request_timeout: Duration,
    pub max_attempts: usize,
    pub redact_regex: Option<Regex>,
}

impl fmt::Debug for GrafanaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrafanaConfig")
            .field("metrics_url", &self.metrics_url)
            .field("logs_url", &self.logs_url)
            .field("metrics_username", &self.metrics_username)
            .field("logs_username", &self.logs_username)
            .field("access_token", &"<redacted>")
            .field("environment", &self.environment)
            .field("source", &self.source)
            .field("disable_content", &self.disable_content)
            .field("request_timeout", &self.request_timeout)
            .field("max_attempts", &self.max_attempts)
            .field("redact_regex", &self.redact_regex.as_ref().map(Regex::as_str))
            .finish()
    }
}

impl GrafanaConfig {
    pub fn new(
        metrics_url: impl Into<String>,
        logs_url: impl Into<String>,
        metrics_username: impl Into<String>,
        logs_username: impl Into<String>,
        access_token: SecretString,
    ) -> Self {
        Self {
            metrics_url: metrics_url.into(),
            logs_url: logs_url.into(),
            metrics_username: metrics_username.into(),
            logs_username: logs_username.into(),
            access_token,
            environment: None,
            source: DEFAULT_SOURCE.to_string(),
            disable_content: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            redact_regex: None,
        }
    }

    /// Reads `GRAFANA_METRICS_URL`, `GRAFANA_LOGS_URL`,
    /// `GRAFANA_METRICS_USERNAME`, `GRAFANA_LOGS_USERNAME`,
    /// `GRAFANA_ACCESS_TOKEN` and the optional `GRAFANA_ENVIRONMENT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::new(
            required_env("GRAFANA_METRICS_URL")?,
            required_env("GRAFANA_LOGS_URL")?,
            required_env("GRAFANA_METRICS_USERNAME")?,
            required_env("GRAFANA_LOGS_USERNAME")?,
            SecretString::new(required_env("GRAFANA_ACCESS_TOKEN")?),
        );
        Ok(match std::env::var("GRAFANA_ENVIRONMENT") {
            Ok(environment) if !environment.trim().is_empty() => {
                config.with_environment(environment)
            }
            _ => config,
        })
    }

    pub fn with_environment(mut self, value: impl Into<String>) -> Self {
        self.environment = Some(value.into());
        self
    }

    pub fn with_source(mut self, value: impl Into<String>) -> Self {
        self.source = value.into();
        self
    }

    pub fn with_disable_content(mut self, value: bool) -> Self {
        self.disable_content = value;
        self
    }

    pub fn with_request_timeout(mut self, value: Duration) -> Self {
        self.request_timeout = value;
        self
    }

    pub fn with_max_attempts(mut self, value: usize) -> Self {
        self.max_attempts = value;
        self
    }

    pub fn with_redact_regex(mut self, value: Regex) -> Self {
        self.redact_regex = Some(value);
        self
    }

    /// Validates the configuration and derives the push URLs.
    pub fn resolve(&self) -> Result<ResolvedEndpoints, ConfigError> {
        use secrecy::ExposeSecret;

        let required = [
            ("metrics_url", self.metrics_url.as_str()),
            ("logs_url", self.logs_url.as_str()),
            ("metrics_username", self.metrics_username.as_str()),
            ("logs_username", self.logs_username.as_str()),
            ("access_token", self.access_token.expose_secret().as_str()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name));
            }
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(ResolvedEndpoints {
            metrics_url: resolve_metrics_url(&self.metrics_url)?,
            logs_url: resolve_logs_url(&self.logs_url),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedEndpoints {
    pub metrics_url: String,
    pub logs_url: String,
}

/// Maps a Prometheus URL onto Grafana Cloud's Influx line protocol write URL.
pub fn resolve_metrics_url(url: &str) -> Result<String, ConfigError> {
    if !url.contains("api/prom") {
        return Err(ConfigError::InvalidMetricsUrl(url.to_string()));
    }

    let mut resolved = url.to_string();
    if resolved.contains("prometheus") {
        resolved = resolved
            .replace("prometheus", "influx")
            .replace("api/prom", "api/v1/push/influx/write");
        // The us-central1 Prometheus alias has no influx counterpart.
        if resolved.contains("-us-central1") {
            resolved = resolved.replace("-us-central1", "-prod-06-prod-us-central-0");
        }
    }
    Ok(resolved.trim_end_matches('/').to_string())
}

pub fn resolve_logs_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with(LOKI_PUSH_PATH) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{LOKI_PUSH_PATH}")
    }
}

fn required_env(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnv(name))
}
