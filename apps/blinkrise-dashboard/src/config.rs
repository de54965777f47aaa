//! Environment-backed runtime configuration for `blinkrise-dashboard`.

use std::{env, error::Error, fmt, path::PathBuf, time::Duration};

use blinkrise_core::ControllerConfig;
use blinkrise_http::HttpBackendConfig;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const MIN_POLL_INTERVAL_MS: u64 = 50;
const DEFAULT_STREAM_LOAD_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_ALARM_SOUND: &str = "assets/alarm.mp3";

/// Runtime configuration used by the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Detection backend origin, e.g. `http://192.168.29.83:5000`.
    pub api_base_url: String,
    pub poll_interval: Duration,
    pub stream_load_timeout: Duration,
    /// Per-request timeout for the JSON endpoints. Also bounds feed connects.
    pub request_timeout: Duration,
    pub alarm_sound: PathBuf,
    /// Issue a start toggle right after launch.
    pub autostart: bool,
}

impl DashboardConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let api_base_url = optional_trimmed_env("BLINKRISE_API_BASE_URL", &mut lookup)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());
        let poll_interval_ms = parse_millis(
            "BLINKRISE_POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL_MS,
            MIN_POLL_INTERVAL_MS,
            &mut lookup,
        )?;
        let stream_load_timeout_ms = parse_millis(
            "BLINKRISE_STREAM_LOAD_TIMEOUT_MS",
            DEFAULT_STREAM_LOAD_TIMEOUT_MS,
            1,
            &mut lookup,
        )?;
        let request_timeout_ms = parse_millis(
            "BLINKRISE_REQUEST_TIMEOUT_MS",
            DEFAULT_REQUEST_TIMEOUT_MS,
            1,
            &mut lookup,
        )?;
        let alarm_sound = optional_trimmed_env("BLINKRISE_ALARM_SOUND", &mut lookup)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ALARM_SOUND));
        let autostart = parse_bool("BLINKRISE_AUTOSTART", &mut lookup)?;

        Ok(Self {
            api_base_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            stream_load_timeout: Duration::from_millis(stream_load_timeout_ms),
            request_timeout: Duration::from_millis(request_timeout_ms),
            alarm_sound,
            autostart,
        })
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            poll_interval: self.poll_interval,
            stream_load_timeout: self.stream_load_timeout,
        }
    }

    pub fn http_backend_config(&self) -> HttpBackendConfig {
        HttpBackendConfig::new(self.api_base_url.clone(), self.request_timeout)
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_millis<F>(
    key: &'static str,
    default: u64,
    minimum: u64,
    lookup: &mut F,
) -> Result<u64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    let parsed = value
        .parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value: value.clone(),
            reason: err.to_string(),
        })?;
    if parsed < minimum {
        return Err(ConfigError::InvalidValue {
            key,
            value,
            reason: format!("must be at least {minimum}"),
        });
    }
    Ok(parsed)
}

fn parse_bool<F>(key: &'static str, lookup: &mut F) -> Result<bool, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(false);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected a boolean (true/false/1/0)".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<DashboardConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        DashboardConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_reference_timings() {
        let cfg = config_from_pairs(&[]).expect("empty environment should parse");
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.poll_interval, Duration::from_millis(500));
        assert_eq!(cfg.stream_load_timeout, Duration::from_secs(2));
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
        assert_eq!(cfg.alarm_sound, PathBuf::from(DEFAULT_ALARM_SOUND));
        assert!(!cfg.autostart);
        assert_eq!(cfg.controller_config(), ControllerConfig::default());
    }

    #[test]
    fn parses_overrides() {
        let cfg = config_from_pairs(&[
            ("BLINKRISE_API_BASE_URL", " http://192.168.29.83:5000 "),
            ("BLINKRISE_POLL_INTERVAL_MS", "250"),
            ("BLINKRISE_STREAM_LOAD_TIMEOUT_MS", "3000"),
            ("BLINKRISE_ALARM_SOUND", "/opt/sounds/beep.ogg"),
            ("BLINKRISE_AUTOSTART", "yes"),
        ])
        .expect("config should parse");

        assert_eq!(cfg.api_base_url, "http://192.168.29.83:5000");
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.stream_load_timeout, Duration::from_secs(3));
        assert_eq!(cfg.alarm_sound, PathBuf::from("/opt/sounds/beep.ogg"));
        assert!(cfg.autostart);
        assert_eq!(
            cfg.http_backend_config().base_url,
            "http://192.168.29.83:5000"
        );
    }

    #[test]
    fn rejects_poll_interval_below_floor() {
        let err = config_from_pairs(&[("BLINKRISE_POLL_INTERVAL_MS", "10")])
            .expect_err("too-fast polling should fail");
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "BLINKRISE_POLL_INTERVAL_MS",
                value: "10".to_owned(),
                reason: "must be at least 50".to_owned(),
            }
        );
    }

    #[test]
    fn rejects_invalid_numeric_and_boolean_values() {
        let err = config_from_pairs(&[("BLINKRISE_REQUEST_TIMEOUT_MS", "soon")])
            .expect_err("non-numeric timeout should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "BLINKRISE_REQUEST_TIMEOUT_MS",
                ..
            }
        ));

        let err = config_from_pairs(&[("BLINKRISE_AUTOSTART", "maybe")])
            .expect_err("unknown boolean should fail");
        assert!(err.to_string().starts_with("invalid BLINKRISE_AUTOSTART='maybe'"));
    }
}
