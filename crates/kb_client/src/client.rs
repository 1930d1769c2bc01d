use kb_core::envelope::{error_message, normalize};
use kb_core::{
    messages, retry_with_backoff, ApiEnvelope, ApiRequest, Error, Method, RawResponse, ResponseOrigin, Result,
    RetryPolicy, Transport, UploadForm,
};
use kb_transport::create_transport;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::{AnalyticsApi, AuthApi, CollectionApi, DocumentsApi, SchedulerApi, SearchApi, UploadApi};
use crate::config::ClientConfig;
use crate::session::Session;

/// Called after a 401 has cleared the session.
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

/// The one place requests get their credentials and responses get classified.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Session,
    retry: Option<RetryPolicy>,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("transport", &self.transport.name())
            .field("session", &self.session)
            .field("retry", &self.retry)
            .field("on_unauthorized", &self.on_unauthorized.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: Session) -> Self {
        Self {
            transport,
            session,
            retry: None,
            on_unauthorized: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let transport = create_transport(&config.transport)?;
        let mut client = Self::new(transport, Session::file(&config.session_path));
        client.retry = config.retry;
        Ok(client)
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn on_unauthorized(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_unauthorized = Some(Arc::new(hook));
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn documents(&self) -> DocumentsApi<'_> {
        DocumentsApi::new(self)
    }

    pub fn search(&self) -> SearchApi<'_> {
        SearchApi::new(self)
    }

    pub fn collection(&self) -> CollectionApi<'_> {
        CollectionApi::new(self)
    }

    pub fn analytics(&self) -> AnalyticsApi<'_> {
        AnalyticsApi::new(self)
    }

    pub fn scheduler(&self) -> SchedulerApi<'_> {
        SchedulerApi::new(self)
    }

    pub fn upload(&self) -> UploadApi<'_> {
        UploadApi::new(self)
    }

    pub async fn get(&self, path: &str, query: Vec<(String, String)>) -> Result<Value> {
        self.send(ApiRequest::new(Method::Get, path).with_query(query)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.send(ApiRequest::new(Method::Post, path).with_json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value> {
        self.send(ApiRequest::new(Method::Put, path).with_json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.send(ApiRequest::new(Method::Delete, path)).await
    }

    pub async fn upload_form(&self, path: &str, form: UploadForm) -> Result<Value> {
        self.send(ApiRequest::new(Method::Post, path).with_form(form)).await
    }

    /// Send and decode the resolved value as an envelope around `T`.
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<ApiEnvelope<T>> {
        ApiEnvelope::from_value(self.send(request).await?)
    }

    /// Full pipeline: attach credentials, dispatch (with retries if enabled), resolve.
    pub async fn send(&self, request: ApiRequest) -> Result<Value> {
        let request = self.authorize(request);
        match self.retry {
            Some(policy) => retry_with_backoff(policy, || self.send_once(request.clone())).await,
            None => self.send_once(request).await,
        }
    }

    fn authorize(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(token) = self.session.token() {
            request.headers.retain(|(name, _)| !name.eq_ignore_ascii_case("authorization"));
            request
                .headers
                .push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        request
    }

    async fn send_once(&self, request: ApiRequest) -> Result<Value> {
        let method = request.method;
        let path = request.path.clone();
        debug!("➡️ {} {} via {}", method, path, self.transport.name());

        let response = self.transport.send(request).await.map_err(|e| {
            warn!("❌ {} {} failed before a response: {}", method, path, e);
            e
        })?;
        self.resolve(method, &path, response)
    }

    fn resolve(&self, method: Method, path: &str, response: RawResponse) -> Result<Value> {
        if response.is_success() {
            return Ok(match response.origin {
                ResponseOrigin::Network => normalize(response.status, response.body),
                ResponseOrigin::Fixture => response.body,
            });
        }

        let error = classify(response.status, &response.body);
        warn!("❌ {} {} -> {}: {}", method, path, response.status, error);
        if error.is_auth_failure() {
            self.expire_session();
        }
        Err(error)
    }

    fn expire_session(&self) {
        if let Err(e) = self.session.clear() {
            warn!("Could not clear session after 401: {}", e);
        }
        if let Some(hook) = &self.on_unauthorized {
            hook();
        }
    }
}

/// Map a non-2xx response onto the error the caller sees.
pub fn classify(status: u16, body: &Value) -> Error {
    match status {
        401 => Error::Unauthorized,
        403 => Error::Forbidden,
        404 => Error::NotFound,
        s if s >= 500 => Error::Server { status: s },
        _ => Error::Api {
            status,
            code: body.get("code").and_then(Value::as_i64),
            message: error_message(body).unwrap_or_else(|| messages::request_failed(status)),
            details: ["details", "data"]
                .iter()
                .filter_map(|key| body.get(*key))
                .find(|v| !v.is_null())
                .cloned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned answers and remembers what it was asked.
    struct ScriptedTransport {
        answers: Mutex<Vec<Result<RawResponse>>>,
        seen: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        fn new(answers: Vec<Result<RawResponse>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<ApiRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, request: ApiRequest) -> Result<RawResponse> {
            self.seen.lock().unwrap().push(request);
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(Error::Network("script exhausted".to_string())))
        }
    }

    fn network(status: u16, body: Value) -> Result<RawResponse> {
        Ok(RawResponse {
            status,
            body,
            origin: ResponseOrigin::Network,
        })
    }

    fn user_json() -> String {
        json!({"id": 1, "username": "admin", "email": "admin@example.com", "role": "admin"}).to_string()
    }

    fn logged_in_session(token: &str) -> Session {
        let session = Session::in_memory();
        session
            .store()
            .set_many(&[("token", token.to_string()), ("user", user_json())])
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_envelope_payload_passes_through() {
        let body = json!({"code": 0, "message": "ok", "data": [1, 2]});
        let transport = ScriptedTransport::new(vec![network(200, body.clone())]);
        let client = ApiClient::new(transport, Session::in_memory());
        assert_eq!(client.get("/documents", vec![]).await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_bare_payload_is_wrapped() {
        let transport = ScriptedTransport::new(vec![network(201, json!([{"id": 1}]))]);
        let client = ApiClient::new(transport, Session::in_memory());
        let resolved = client.post("/collection/sources", json!({})).await.unwrap();
        assert_eq!(resolved, json!({"code": 201, "message": "success", "data": [{"id": 1}]}));
    }

    #[tokio::test]
    async fn test_fixture_payload_is_not_wrapped() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse {
            status: 200,
            body: json!({"success": true, "data": null}),
            origin: ResponseOrigin::Fixture,
        })]);
        let client = ApiClient::new(transport, Session::in_memory());
        let resolved = client.get("/whatever", vec![]).await.unwrap();
        assert_eq!(resolved, json!({"success": true, "data": null}));
    }

    #[tokio::test]
    async fn test_bearer_token_is_attached() {
        let transport = ScriptedTransport::new(vec![
            network(200, json!({"code": 200, "message": "success", "data": null})),
            network(200, json!({"code": 200, "message": "success", "data": null})),
        ]);
        let client = ApiClient::new(transport.clone(), logged_in_session("abc123"));
        client.get("/documents", vec![]).await.unwrap();
        client
            .send(ApiRequest::new(Method::Delete, "/documents/1").with_header("authorization", "Bearer stale"))
            .await
            .unwrap();

        for request in transport.seen() {
            assert_eq!(request.header("Authorization"), Some("Bearer abc123"));
            assert_eq!(request.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case("authorization")).count(), 1);
        }
    }

    #[tokio::test]
    async fn test_no_token_means_no_header() {
        let transport = ScriptedTransport::new(vec![network(200, json!(null))]);
        let client = ApiClient::new(transport.clone(), Session::in_memory());
        client.get("/health", vec![]).await.unwrap();
        assert!(transport.seen()[0].header("Authorization").is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_clears_session_and_fires_hook() {
        let transport = ScriptedTransport::new(vec![network(401, json!({"message": "token expired"}))]);
        let session = logged_in_session("abc123");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let client = ApiClient::new(transport, session.clone()).on_unauthorized(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = client.get("/auth/me", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
        assert_eq!(err.to_string(), "登录已过期，请重新登录");
        assert!(session.token().is_none());
        assert!(session.store().get("user").unwrap().is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_status_classification() {
        let transport = ScriptedTransport::new(vec![
            network(403, json!({"message": "nope"})),
            network(404, Value::Null),
            network(502, json!("Bad Gateway")),
        ]);
        let session = logged_in_session("abc123");
        let client = ApiClient::new(transport, session.clone());

        let forbidden = client.get("/a", vec![]).await.unwrap_err();
        assert_eq!(forbidden.to_string(), "没有权限访问该资源");
        let missing = client.get("/b", vec![]).await.unwrap_err();
        assert_eq!(missing.to_string(), "请求的资源不存在");
        let server = client.get("/c", vec![]).await.unwrap_err();
        assert_eq!(server.to_string(), "服务器错误，请稍后重试");
        assert_eq!(server.status(), Some(502));

        assert!(session.is_logged_in());
    }

    #[test]
    fn test_other_statuses_carry_backend_message() {
        let err = classify(422, &json!({"code": 42, "error": "bad input", "details": {"field": "url"}}));
        match err {
            Error::Api {
                status,
                code,
                message,
                details,
            } => {
                assert_eq!(status, 422);
                assert_eq!(code, Some(42));
                assert_eq!(message, "bad input");
                assert_eq!(details, Some(json!({"field": "url"})));
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = classify(409, &Value::Null);
        assert_eq!(err.to_string(), "请求失败 (HTTP 409)");
    }

    #[tokio::test]
    async fn test_retry_recovers_from_server_errors() {
        let transport = ScriptedTransport::new(vec![
            network(503, Value::Null),
            Err(Error::Timeout),
            network(200, json!({"code": 200, "message": "success", "data": 1})),
        ]);
        let client = ApiClient::new(transport.clone(), Session::in_memory()).with_retry(RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        });
        let envelope: ApiEnvelope<i64> = client.request(ApiRequest::new(Method::Get, "/x")).await.unwrap();
        assert_eq!(envelope.data, 1);
        assert_eq!(transport.seen().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_never_repeats_client_errors() {
        let transport = ScriptedTransport::new(vec![network(400, json!({"message": "用户名或密码错误"}))]);
        let client = ApiClient::new(transport.clone(), Session::in_memory()).with_retry(RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        });
        let err = client.post("/auth/login", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "用户名或密码错误");
        assert_eq!(transport.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_typed_request_rejects_non_envelope() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse {
            status: 200,
            body: json!({"success": true, "data": null}),
            origin: ResponseOrigin::Fixture,
        })]);
        let client = ApiClient::new(transport, Session::in_memory());
        let err = client
            .request::<Value>(ApiRequest::new(Method::Get, "/unknown"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
