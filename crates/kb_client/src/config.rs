use kb_core::{Result, RetryPolicy};
use kb_transport::TransportConfig;
use std::env;
use std::path::PathBuf;

/// Everything needed to build an [`crate::ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub transport: TransportConfig,
    pub session_path: PathBuf,
    /// Retry transport failures and 5xx responses. Off unless asked for.
    pub retry: Option<RetryPolicy>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            session_path: default_session_path(),
            retry: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let session_path = match env::var("KB_SESSION_FILE") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
            _ => default_session_path(),
        };
        Ok(Self {
            transport: TransportConfig::from_env()?,
            session_path,
            retry: None,
        })
    }
}

/// `~/.kb/session.json`, or `./.kb/session.json` when no home directory is known.
pub fn default_session_path() -> PathBuf {
    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".kb").join("session.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_path_shape() {
        let path = default_session_path();
        assert!(path.ends_with(".kb/session.json"));
    }

    #[test]
    fn test_default_has_no_retry() {
        assert!(ClientConfig::default().retry.is_none());
    }
}
