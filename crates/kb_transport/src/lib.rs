use kb_core::{Error, Result, Transport};
use std::env;
use std::sync::Arc;
use std::time::Duration;

pub mod backends;

pub use backends::*;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5001/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    Mock,
}

impl std::str::FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" | "network" => Ok(TransportKind::Http),
            "mock" | "fixture" => Ok(TransportKind::Mock),
            other => Err(Error::Config(format!("Unknown transport: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub http: HttpConfig,
    pub mock: MockConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Http,
            http: HttpConfig::default(),
            mock: MockConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Read `KB_*` variables, falling back to the legacy `VITE_*` names.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`TransportConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let with_legacy = |primary: &str, legacy: &str| lookup(primary).or_else(|| lookup(legacy));

        if let Some(flag) = with_legacy("KB_USE_MOCK", "VITE_USE_MOCK") {
            if flag.trim().eq_ignore_ascii_case("true") {
                config.kind = TransportKind::Mock;
            }
        }
        if let Some(url) = with_legacy("KB_API_BASE_URL", "VITE_API_BASE_URL") {
            if !url.trim().is_empty() {
                config.http.base_url = url.trim().to_string();
            }
        }
        if let Some(secs) = lookup("KB_TIMEOUT_SECS") {
            config.http.timeout = parse_timeout(&secs)?;
        }
        if let Some(latency) = lookup("KB_MOCK_LATENCY") {
            config.mock.latency = latency.parse()?;
        }
        if let Some(policy) = lookup("KB_MOCK_UNMATCHED") {
            config.mock.unmatched = policy.parse()?;
        }

        Ok(config)
    }
}

fn parse_timeout(raw: &str) -> Result<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(Error::Config("KB_TIMEOUT_SECS must be greater than zero".to_string())),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => Err(Error::Config(format!("KB_TIMEOUT_SECS must be a number, got '{}'", raw))),
    }
}

/// Build the transport the configuration asks for.
pub fn create_transport(config: &TransportConfig) -> Result<Arc<dyn Transport>> {
    match config.kind {
        TransportKind::Http => Ok(Arc::new(HttpTransport::new(&config.http)?)),
        TransportKind::Mock => Ok(Arc::new(MockTransport::new(config.mock.clone()))),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_transport, HttpConfig, TransportConfig, TransportKind};
    pub use kb_core::{ApiRequest, Method, RawResponse, Transport};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_transport_kind_parsing() {
        assert_eq!("mock".parse::<TransportKind>().unwrap(), TransportKind::Mock);
        assert_eq!("HTTP".parse::<TransportKind>().unwrap(), TransportKind::Http);
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_create_transport_picks_backend() {
        let mut config = TransportConfig::default();
        assert_eq!(create_transport(&config).unwrap().name(), "http");
        config.kind = TransportKind::Mock;
        assert_eq!(create_transport(&config).unwrap().name(), "mock");
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn config_from(pairs: &[(&str, &str)]) -> Result<TransportConfig> {
        let vars = vars(pairs);
        TransportConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults_without_variables() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.kind, TransportKind::Http);
        assert_eq!(config.http.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.http.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.mock.latency, Latency::Realistic);
        assert_eq!(config.mock.unmatched, UnmatchedPolicy::Lenient);
    }

    #[test]
    fn test_only_literal_true_enables_mock() {
        assert_eq!(config_from(&[("KB_USE_MOCK", "TRUE")]).unwrap().kind, TransportKind::Mock);
        assert_eq!(config_from(&[("KB_USE_MOCK", "1")]).unwrap().kind, TransportKind::Http);
        assert_eq!(config_from(&[("KB_USE_MOCK", "yes")]).unwrap().kind, TransportKind::Http);
    }

    #[test]
    fn test_legacy_names_fall_back_and_lose_to_kb_names() {
        let legacy = config_from(&[
            ("VITE_USE_MOCK", "true"),
            ("VITE_API_BASE_URL", "http://legacy:8080/api"),
        ])
        .unwrap();
        assert_eq!(legacy.kind, TransportKind::Mock);
        assert_eq!(legacy.http.base_url, "http://legacy:8080/api");

        let both = config_from(&[
            ("KB_USE_MOCK", "false"),
            ("VITE_USE_MOCK", "true"),
            ("KB_API_BASE_URL", "https://kb.internal/api"),
            ("VITE_API_BASE_URL", "http://legacy:8080/api"),
        ])
        .unwrap();
        assert_eq!(both.kind, TransportKind::Http);
        assert_eq!(both.http.base_url, "https://kb.internal/api");
    }

    #[test]
    fn test_blank_base_url_keeps_default() {
        let config = config_from(&[("KB_API_BASE_URL", "   ")]).unwrap();
        assert_eq!(config.http.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_timeout_must_be_positive_number() {
        let config = config_from(&[("KB_TIMEOUT_SECS", " 30 ")]).unwrap();
        assert_eq!(config.http.timeout, Duration::from_secs(30));
        assert!(matches!(config_from(&[("KB_TIMEOUT_SECS", "soon")]), Err(Error::Config(_))));
        assert!(matches!(config_from(&[("KB_TIMEOUT_SECS", "0")]), Err(Error::Config(_))));
    }

    #[test]
    fn test_mock_latency_and_unmatched_policy() {
        let config = config_from(&[("KB_MOCK_LATENCY", "instant"), ("KB_MOCK_UNMATCHED", "strict")]).unwrap();
        assert_eq!(config.mock.latency, Latency::Instant);
        assert_eq!(config.mock.unmatched, UnmatchedPolicy::Strict);
        assert!(config_from(&[("KB_MOCK_UNMATCHED", "sometimes")]).is_err());
    }

    #[test]
    fn test_create_transport_rejects_bad_base_url() {
        let config = TransportConfig {
            http: HttpConfig {
                base_url: "not a url".to_string(),
                timeout: DEFAULT_TIMEOUT,
            },
            ..Default::default()
        };
        assert!(matches!(create_transport(&config), Err(Error::Config(_))));
    }
}
