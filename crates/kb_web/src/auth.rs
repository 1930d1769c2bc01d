//! Bearer-token gate in front of everything but health and the login/register pair.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::{api_path, AppState};

const PUBLIC_PATHS: &[&str] = &["/health", "/auth/login", "/auth/register"];

fn is_public(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    PUBLIC_PATHS.contains(&path)
}

pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"code": 401, "message": "unauthorized", "data": null})),
    )
        .into_response()
}

pub async fn auth_middleware(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    if is_public(api_path(request.uri().path())) {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match token {
        Some(token) if state.store().is_valid_token(token).await => next.run(request).await,
        _ => {
            debug!("🚫 Rejecting {} {}: no live session", request.method(), request.uri().path());
            unauthorized()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert!(is_public("/health"));
        assert!(is_public("/auth/login/"));
        assert!(!is_public("/auth/me"));
        assert!(!is_public("/documents"));
    }
}
