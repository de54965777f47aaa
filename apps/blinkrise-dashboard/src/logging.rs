//! Tracing bootstrap for the dashboard binary.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str =
    "info,blinkrise_dashboard=debug,blinkrise_core=debug,blinkrise_http=debug";
const FILTER_FALLBACK_VARS: [&str; 2] = ["BLINKRISE_DASHBOARD_LOG", "BLINKRISE_LOG"];

/// Install the global subscriber. Output goes to stderr so the stdout
/// dashboard stays readable.
///
/// Filter precedence: `RUST_LOG`, `BLINKRISE_DASHBOARD_LOG`, `BLINKRISE_LOG`,
/// then the built-in default.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .with_env_filter(filter_from_lookup(|key| env::var(key).ok()))
        .try_init();
}

fn filter_from_lookup<F>(lookup: F) -> EnvFilter
where
    F: Fn(&str) -> Option<String>,
{
    std::iter::once(EnvFilter::DEFAULT_ENV)
        .chain(FILTER_FALLBACK_VARS)
        .filter_map(|key| lookup(key).filter(|value| !value.trim().is_empty()))
        .find_map(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_filter() {
        let filter = filter_from_lookup(|_| None);
        assert_eq!(filter.to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
    }

    #[test]
    fn app_specific_variable_wins_over_shared_one() {
        let filter = filter_from_lookup(|key| match key {
            "BLINKRISE_DASHBOARD_LOG" => Some("warn".to_owned()),
            "BLINKRISE_LOG" => Some("trace".to_owned()),
            _ => None,
        });
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn skips_blank_and_unparsable_values() {
        let filter = filter_from_lookup(|key| match key {
            "RUST_LOG" => Some("   ".to_owned()),
            "BLINKRISE_DASHBOARD_LOG" => Some("blinkrise=notalevel".to_owned()),
            "BLINKRISE_LOG" => Some("error".to_owned()),
            _ => None,
        });
        assert_eq!(filter.to_string(), "error");
    }
}
