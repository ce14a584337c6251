//! Per-run configuration for variable migration
//!
//! A `Config` is constructed once per run from CLI flags and environment
//! fallbacks, then passed by reference into each component. There is no
//! process-wide settings object.

use std::time::Duration;

/// Default retry attempt ceiling when `RETRY_MAX` is unset or invalid.
pub const DEFAULT_RETRY_MAX: u32 = 3;

/// Default backoff base delay when `RETRY_DELAY` is unset or unparseable.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Configuration for one export or sync run.
#[derive(Debug, Clone)]
pub struct Config {
    /// API token for the GitHub instance (required).
    pub token: String,

    /// Organization to export from or sync into (required).
    pub organization: String,

    /// GitHub Enterprise Server hostname; `None` means GitHub.com.
    pub hostname: Option<String>,

    /// Outbound proxy settings.
    pub proxy: ProxyConfig,

    /// Retry envelope for remote operations.
    pub retry: RetrySettings,
}

/// Proxy configuration taken from `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY`.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
}

impl ProxyConfig {
    /// True when at least one proxy endpoint is set.
    pub fn is_configured(&self) -> bool {
        self.http_proxy.as_deref().is_some_and(|p| !p.is_empty())
            || self.https_proxy.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Retry envelope settings, shared by every retried remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// Maximum attempts per logical operation, always at least 1.
    pub max_attempts: u32,

    /// Base delay for exponential backoff between attempts.
    pub base_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX,
            base_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetrySettings {
    /// Build settings from the raw `RETRY_MAX`/`RETRY_DELAY` values.
    ///
    /// Mirrors the defaulting contract of those variables: a max of zero or
    /// below falls back to 3, and a delay string that fails to parse falls
    /// back to 1s rather than erroring.
    pub fn from_values(max_attempts: i64, delay: &str) -> Self {
        let max_attempts = if max_attempts <= 0 {
            DEFAULT_RETRY_MAX
        } else {
            max_attempts.min(u32::MAX as i64) as u32
        };

        let base_delay = parse_duration(delay).unwrap_or(DEFAULT_RETRY_DELAY);

        Self {
            max_attempts,
            base_delay,
        }
    }
}

/// Parse a duration string with an `ms`/`s`/`m`/`h` suffix, e.g. `1s`,
/// `500ms`, `2m`. Returns `None` for anything else.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();

    let (number, unit) = input
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| input.split_at(i))?;

    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let millis = match unit {
        "ms" => value,
        "s" => value * 1_000.0,
        "m" => value * 60_000.0,
        "h" => value * 3_600_000.0,
        _ => return None,
    };

    Some(Duration::from_millis(millis.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1s"), Some(Duration::from_secs(1)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration(" 3s "), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));

        // Missing or unknown units are invalid
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("1week"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("abc"), None);
    }

    #[test]
    fn test_retry_settings_defaults() {
        let settings = RetrySettings::default();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_retry_settings_from_values() {
        let settings = RetrySettings::from_values(5, "2s");
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.base_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_retry_settings_default_on_bad_input() {
        // Zero or negative max falls back to 3
        assert_eq!(RetrySettings::from_values(0, "1s").max_attempts, 3);
        assert_eq!(RetrySettings::from_values(-2, "1s").max_attempts, 3);

        // Unparseable delay falls back to 1s, max is kept
        let settings = RetrySettings::from_values(7, "not-a-duration");
        assert_eq!(settings.max_attempts, 7);
        assert_eq!(settings.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_proxy_config_is_configured() {
        assert!(!ProxyConfig::default().is_configured());

        let http_only = ProxyConfig {
            http_proxy: Some("http://proxy:8080".to_string()),
            ..Default::default()
        };
        assert!(http_only.is_configured());

        let no_proxy_only = ProxyConfig {
            no_proxy: Some("github.internal".to_string()),
            ..Default::default()
        };
        assert!(!no_proxy_only.is_configured());

        let empty_strings = ProxyConfig {
            http_proxy: Some(String::new()),
            https_proxy: Some(String::new()),
            no_proxy: None,
        };
        assert!(!empty_strings.is_configured());
    }
}
