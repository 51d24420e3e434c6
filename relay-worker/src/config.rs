//! Configuration module for environment variable parsing.
//!
//! All settings are read once at startup into an immutable [`Config`] that is
//! handed to each component's constructor. Required values that are missing or
//! malformed are fatal; optional tuning knobs fall back to defaults.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Upper bound SQS accepts for `WaitTimeSeconds`.
pub const MAX_WAIT_TIME_SECONDS: i32 = 20;

/// Upper bound SQS accepts for `VisibilityTimeout` (12 hours).
pub const MAX_VISIBILITY_TIMEOUT_SECONDS: i32 = 43_200;

/// Errors raised while loading [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Queue Consumer
    // =========================================================================
    /// Human-readable SQS queue name, resolved to a URL at startup
    pub queue_name: String,

    /// Long-poll wait passed to every receive call
    pub wait_time_seconds: i32,

    /// Visibility timeout passed to every receive call
    pub visibility_timeout_seconds: i32,

    /// Pause between poll cycles in milliseconds
    pub poll_interval_ms: u64,

    /// First delay after a failed poll in milliseconds
    pub poll_backoff_initial_ms: u64,

    /// Cap for the poll failure delay in milliseconds
    pub poll_backoff_max_ms: u64,

    /// Consecutive poll failures before the circuit opens
    pub poll_circuit_threshold: u32,

    /// How long an open circuit waits before probing again
    pub poll_circuit_cooldown_secs: u64,

    // =========================================================================
    // Sink
    // =========================================================================
    /// Downstream endpoint that receives every forwarded message
    pub redirect_url: Url,

    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,

    // =========================================================================
    // AWS
    // =========================================================================
    pub aws_region: String,

    /// Endpoint override, e.g. a LocalStack URL
    pub aws_endpoint: Option<String>,

    /// Topic to subscribe the webhook to at startup
    pub sns_topic_arn: Option<String>,

    /// Public URL of this service's webhook, used for the startup subscription
    pub sns_notification_endpoint: Option<String>,

    pub sns_subscription_protocol: String,

    // =========================================================================
    // Web Server
    // =========================================================================
    /// Port for the web server to listen on
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let wait_time_seconds: i32 = required_parsed(&lookup, "SQS_LONG_POLL_WAIT_TIME")?;
        ensure_range(
            "SQS_LONG_POLL_WAIT_TIME",
            wait_time_seconds,
            0,
            MAX_WAIT_TIME_SECONDS,
        )?;

        let visibility_timeout_seconds: i32 =
            required_parsed(&lookup, "SQS_VISIBILITY_TIMEOUT")?;
        ensure_range(
            "SQS_VISIBILITY_TIMEOUT",
            visibility_timeout_seconds,
            0,
            MAX_VISIBILITY_TIMEOUT_SECONDS,
        )?;

        let raw_url = required(&lookup, "REDIRECT_URL")?;
        let redirect_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            name: "REDIRECT_URL",
            value: raw_url.clone(),
            reason: e.to_string(),
        })?;

        let port = parse_port(&required(&lookup, "PORT")?)?;

        let poll_backoff_max_ms: u64 = optional_parsed(&lookup, "POLL_BACKOFF_MAX_MS", 30_000);
        let mut poll_backoff_initial_ms: u64 =
            optional_parsed(&lookup, "POLL_BACKOFF_INITIAL_MS", 500);
        if poll_backoff_initial_ms > poll_backoff_max_ms {
            warn!(
                initial_ms = poll_backoff_initial_ms,
                max_ms = poll_backoff_max_ms,
                "Backoff initial delay exceeds maximum, clamping"
            );
            poll_backoff_initial_ms = poll_backoff_max_ms;
        }

        Ok(Config {
            queue_name: required(&lookup, "SQS_QUEUE_NAME")?,
            wait_time_seconds,
            visibility_timeout_seconds,
            poll_interval_ms: optional_parsed(&lookup, "POLL_INTERVAL_MS", 500),
            poll_backoff_initial_ms,
            poll_backoff_max_ms,
            poll_circuit_threshold: optional_parsed(&lookup, "POLL_CIRCUIT_THRESHOLD", 5u32)
                .max(1),
            poll_circuit_cooldown_secs: optional_parsed(
                &lookup,
                "POLL_CIRCUIT_COOLDOWN_SECS",
                60,
            ),

            redirect_url,
            request_timeout_ms: optional_parsed(&lookup, "REQUEST_TIMEOUT_MS", 8000),

            aws_region: required(&lookup, "AWS_REGION")?,
            aws_endpoint: optional_string(&lookup, "LOCALSTACK_ENDPOINT"),
            sns_topic_arn: optional_string(&lookup, "SNS_TOPIC_ARN"),
            sns_notification_endpoint: optional_string(&lookup, "SNS_NOTIFICATION_ENDPOINT"),
            sns_subscription_protocol: optional_string(&lookup, "SNS_SUBSCRIPTION_PROTOCOL")
                .unwrap_or_else(|| "https".to_string()),

            port,
        })
    }

    /// Topic and endpoint for the startup subscription, when both are set.
    pub fn subscription_target(&self) -> Option<(&str, &str)> {
        match (&self.sns_topic_arn, &self.sns_notification_endpoint) {
            (Some(topic), Some(endpoint)) => Some((topic.as_str(), endpoint.as_str())),
            _ => None,
        }
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn required_parsed<F, T>(lookup: &F, name: &'static str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = required(lookup, name)?;
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: raw.clone(),
        reason: e.to_string(),
    })
}

/// Parse an optional value, falling back to `default` when absent or invalid.
fn optional_parsed<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = match lookup(name) {
        Some(v) if !v.trim().is_empty() => v,
        _ => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

fn optional_string<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn ensure_range(name: &'static str, value: i32, min: i32, max: i32) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: format!("must be between {} and {}", min, max),
        })
    }
}

/// Accepts both `8080` and the `:8080` listen-address form.
fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim_start_matches(':')
        .parse()
        .map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
            name: "PORT",
            value: raw.to_string(),
            reason: e.to_string(),
        })
}
