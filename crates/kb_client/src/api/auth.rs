use kb_core::endpoints::auth;
use kb_core::{ApiEnvelope, ApiRequest, AuthPayload, LoginRequest, Method, RegisterRequest, Result, User};
use serde_json::Value;
use tracing::{info, warn};

use crate::ApiClient;

pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Log in and persist the returned session.
    pub async fn login(&self, email: &str, password: &str) -> Result<ApiEnvelope<AuthPayload>> {
        let body = serde_json::to_value(LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let envelope: ApiEnvelope<AuthPayload> = self
            .client
            .request(ApiRequest::new(Method::Post, auth::LOGIN).with_json(body))
            .await?;
        self.client
            .session()
            .save(&envelope.data.token, &envelope.data.user)?;
        info!("✅ Logged in as {}", envelope.data.user.email);
        Ok(envelope)
    }

    /// Create an account; the backend logs it in straight away.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<ApiEnvelope<AuthPayload>> {
        let body = serde_json::to_value(RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let envelope: ApiEnvelope<AuthPayload> = self
            .client
            .request(ApiRequest::new(Method::Post, auth::REGISTER).with_json(body))
            .await?;
        self.client
            .session()
            .save(&envelope.data.token, &envelope.data.user)?;
        info!("✅ Registered {}", envelope.data.user.email);
        Ok(envelope)
    }

    /// Tell the backend, then forget the session whatever it answered.
    pub async fn logout(&self) -> Result<ApiEnvelope<Value>> {
        let result = self
            .client
            .request(ApiRequest::new(Method::Post, auth::LOGOUT))
            .await;
        if let Err(e) = &result {
            warn!("Logout call failed ({}), clearing local session anyway", e);
        }
        self.client.session().clear()?;
        info!("👋 Logged out");
        result
    }

    pub async fn me(&self) -> Result<ApiEnvelope<User>> {
        self.client.request(ApiRequest::new(Method::Get, auth::ME)).await
    }
}
