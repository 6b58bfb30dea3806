use std::time::Duration;

use reqwest::{Url, header::HeaderValue};

use super::error::StoreConfigError;

pub const URL_ENV: &str = "SUPABASE_URL";
pub const KEY_ENV: &str = "SUPABASE_ANON_KEY";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Runtime configuration describing how to reach the PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct PostgrestConfig {
    pub base_url: Url,
    pub api_key: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
}

impl PostgrestConfig {
    /// Validate an explicit base URL and key without touching the network.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, StoreConfigError> {
        let trimmed = base_url.trim();
        let base_url = Url::parse(trimmed).map_err(|err| StoreConfigError::InvalidUrl {
            value: trimmed.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(StoreConfigError::InvalidUrl {
                value: trimmed.to_string(),
                reason: format!("unsupported scheme `{}`", base_url.scheme()),
            });
        }
        if base_url.host_str().is_none_or(str::is_empty) {
            return Err(StoreConfigError::InvalidUrl {
                value: trimmed.to_string(),
                reason: "missing host".into(),
            });
        }

        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(StoreConfigError::InvalidKey {
                reason: "key is empty",
            });
        }
        if api_key.chars().any(char::is_whitespace) {
            return Err(StoreConfigError::InvalidKey {
                reason: "key contains whitespace",
            });
        }
        if HeaderValue::from_str(api_key).is_err() {
            return Err(StoreConfigError::InvalidKey {
                reason: "key is not a valid header value",
            });
        }

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> Result<Self, StoreConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StoreConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(URL_ENV)
            .filter(|value| !value.trim().is_empty())
            .ok_or(StoreConfigError::MissingEnvVar { var: URL_ENV })?;
        let api_key = lookup(KEY_ENV)
            .filter(|value| !value.trim().is_empty())
            .ok_or(StoreConfigError::MissingEnvVar { var: KEY_ENV })?;
        Self::new(&base_url, &api_key)
    }

    /// REST root of the project (`{base}/rest/v1/`).
    pub fn rest_root(&self) -> Url {
        let mut root = self.base_url.clone();
        let path = format!("{}/rest/v1/", root.path().trim_end_matches('/'));
        root.set_path(&path);
        root.set_query(None);
        root
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn missing_url_is_reported_by_name() {
        let err = PostgrestConfig::from_lookup(lookup(&[(KEY_ENV, "anon")])).unwrap_err();
        assert!(matches!(err, StoreConfigError::MissingEnvVar { var } if var == URL_ENV));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let err = PostgrestConfig::from_lookup(lookup(&[
            (URL_ENV, "https://demo.supabase.co"),
            (KEY_ENV, "  "),
        ]))
        .unwrap_err();
        assert!(matches!(err, StoreConfigError::MissingEnvVar { var } if var == KEY_ENV));
    }

    #[test]
    fn malformed_url_is_rejected_before_any_request() {
        let err = PostgrestConfig::new("not a url", "anon").unwrap_err();
        assert!(matches!(err, StoreConfigError::InvalidUrl { .. }));

        let err = PostgrestConfig::new("ftp://demo.supabase.co", "anon").unwrap_err();
        assert!(matches!(err, StoreConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn key_with_whitespace_is_rejected() {
        let err = PostgrestConfig::new("https://demo.supabase.co", "abc def").unwrap_err();
        assert!(matches!(err, StoreConfigError::InvalidKey { .. }));
    }

    #[test]
    fn rest_root_appends_versioned_path() {
        let config = PostgrestConfig::new("https://demo.supabase.co/", "anon").unwrap();
        assert_eq!(
            config.rest_root().as_str(),
            "https://demo.supabase.co/rest/v1/"
        );

        let config = PostgrestConfig::new("http://localhost:54321/base", "anon").unwrap();
        assert_eq!(
            config.rest_root().as_str(),
            "http://localhost:54321/base/rest/v1/"
        );
    }
}
