//! In-memory stand-in for the backend, selected with `KB_USE_MOCK=true`.

use async_trait::async_trait;
use kb_core::{ApiRequest, Error, RawResponse, ResponseOrigin, Result, Transport};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub mod fixtures;
pub mod handlers;
pub mod routes;

pub use fixtures::{MockState, MockUser};
pub use routes::{match_route, MockRoute};

/// How long mock operations take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Latency {
    /// Per-operation delays between 100ms and 1.5s.
    #[default]
    Realistic,
    Instant,
}

impl std::str::FromStr for Latency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "realistic" => Ok(Latency::Realistic),
            "instant" | "none" => Ok(Latency::Instant),
            other => Err(Error::Config(format!("Unknown mock latency: {}", other))),
        }
    }
}

/// What to do with a request no mock route matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmatchedPolicy {
    /// Answer `{success: true, data: null}`.
    #[default]
    Lenient,
    /// Fail with [`Error::UnmatchedRoute`].
    Strict,
}

impl std::str::FromStr for UnmatchedPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Ok(UnmatchedPolicy::Lenient),
            "strict" => Ok(UnmatchedPolicy::Strict),
            other => Err(Error::Config(format!("Unknown unmatched-route policy: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub latency: Latency,
    pub unmatched: UnmatchedPolicy,
}

impl MockConfig {
    /// No delays, unknown routes fail. What tests want.
    pub fn strict_instant() -> Self {
        Self {
            latency: Latency::Instant,
            unmatched: UnmatchedPolicy::Strict,
        }
    }
}

/// Shared handle to the fixture state. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    state: Arc<RwLock<MockState>>,
}

impl MockStore {
    pub fn new(state: MockState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, MockState> {
        self.state.read().await
    }

    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, MockState> {
        self.state.write().await
    }

    pub async fn is_valid_token(&self, token: &str) -> bool {
        self.state.read().await.sessions.contains_key(token)
    }
}

pub struct MockTransport {
    store: MockStore,
    config: MockConfig,
}

impl MockTransport {
    pub fn new(config: MockConfig) -> Self {
        Self::with_store(MockStore::default(), config)
    }

    pub fn with_store(store: MockStore, config: MockConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &MockStore {
        &self.store
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: ApiRequest) -> Result<RawResponse> {
        let Some(route) = match_route(request.method, &request.path) else {
            return match self.config.unmatched {
                UnmatchedPolicy::Lenient => {
                    warn!("🎭 No mock route for {} {}, answering with an empty success", request.method, request.path);
                    Ok(RawResponse {
                        status: 200,
                        body: json!({"success": true, "data": null}),
                        origin: ResponseOrigin::Fixture,
                    })
                }
                UnmatchedPolicy::Strict => Err(Error::UnmatchedRoute {
                    method: request.method.to_string(),
                    path: request.path.clone(),
                }),
            };
        };

        if self.config.latency == Latency::Realistic {
            tokio::time::sleep(route.delay()).await;
        }

        let response = handlers::dispatch(&self.store, route, &request).await;
        debug!("🎭 {} {} -> {:?} {}", request.method, request.path, route, response.status);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_core::Method;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_lenient_unmatched_route_succeeds_with_null_data() {
        let transport = MockTransport::new(MockConfig {
            latency: Latency::Instant,
            unmatched: UnmatchedPolicy::Lenient,
        });
        let response = transport
            .send(ApiRequest::new(Method::Get, "/does/not/exist"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.origin, ResponseOrigin::Fixture);
        assert_eq!(response.body, json!({"success": true, "data": null}));
    }

    #[tokio::test]
    async fn test_strict_unmatched_route_fails() {
        let transport = MockTransport::new(MockConfig::strict_instant());
        let err = transport
            .send(ApiRequest::new(Method::Delete, "/auth/login"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no mock route for DELETE /auth/login");
    }

    #[tokio::test]
    async fn test_realistic_latency_delays_response() {
        let transport = MockTransport::new(MockConfig {
            latency: Latency::Realistic,
            unmatched: UnmatchedPolicy::Strict,
        });
        let started = Instant::now();
        transport.send(ApiRequest::new(Method::Get, "/health")).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_store_clones_share_state() {
        let store = MockStore::default();
        let transport = MockTransport::with_store(store.clone(), MockConfig::strict_instant());
        transport
            .send(ApiRequest::new(Method::Delete, "/documents/1"))
            .await
            .unwrap();
        assert!(store.read().await.documents.iter().all(|d| d.id != 1));
    }

    #[test]
    fn test_config_parsing() {
        assert_eq!("instant".parse::<Latency>().unwrap(), Latency::Instant);
        assert_eq!("STRICT".parse::<UnmatchedPolicy>().unwrap(), UnmatchedPolicy::Strict);
        assert!("sometimes".parse::<UnmatchedPolicy>().is_err());
    }
}
