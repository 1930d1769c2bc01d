use anyhow::Result;
use axum::{http::StatusCode, routing::get, Json, Router};
use kb_client::{ApiClient, Error, Session};
use kb_core::{DocumentQuery, RetryPolicy};
use kb_transport::{HttpConfig, HttpTransport, MockConfig};
use kb_web::AppState;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

async fn start_backend() -> Result<SocketAddr> {
    let state = AppState::new(MockConfig::strict_instant());
    Ok(kb_web::spawn("127.0.0.1:0".parse()?, state).await?)
}

fn client_for(addr: SocketAddr, session: Session) -> Result<ApiClient> {
    let transport = HttpTransport::new(&HttpConfig {
        base_url: format!("http://{}/api", addr),
        timeout: Duration::from_secs(5),
    })?;
    Ok(ApiClient::new(Arc::new(transport), session))
}

#[tokio::test]
async fn test_login_and_list_over_http() -> Result<()> {
    let addr = start_backend().await?;
    let dir = tempdir()?;
    let session = Session::file(dir.path().join("session.json"));
    let client = client_for(addr, session.clone())?;

    let auth = client.auth().login("admin@example.com", "admin123").await?;
    assert!(!auth.data.token.is_empty());
    assert_eq!(session.token(), Some(auth.data.token.clone()));
    assert_eq!(session.user().map(|u| u.email), Some("admin@example.com".to_string()));

    let docs = client.documents().list(&DocumentQuery::default()).await?;
    assert_eq!(docs.code, 200);
    assert_eq!(docs.data.len(), 8);

    let me = client.auth().me().await?;
    assert_eq!(me.data.role, "admin");

    client.auth().logout().await?;
    assert!(!session.is_logged_in());
    Ok(())
}

#[tokio::test]
async fn test_wrong_password_is_reported_verbatim() -> Result<()> {
    let addr = start_backend().await?;
    let client = client_for(addr, Session::in_memory())?;
    let err = client
        .auth()
        .login("admin@example.com", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "用户名或密码错误");
    assert_eq!(err.status(), Some(400));
    assert!(!client.session().is_logged_in());
    Ok(())
}

#[tokio::test]
async fn test_unknown_token_expires_session() -> Result<()> {
    let addr = start_backend().await?;
    let session = Session::in_memory();
    session.store().set_many(&[
        ("token", "not-a-real-session".to_string()),
        ("user", json!({"id": 1, "username": "admin", "email": "admin@example.com"}).to_string()),
    ])?;
    let expired = Arc::new(AtomicUsize::new(0));
    let counter = expired.clone();
    let client = client_for(addr, session.clone())?.on_unauthorized(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = client.analytics().overview().await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized));
    assert!(session.token().is_none());
    assert!(session.user().is_none());
    assert_eq!(expired.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_plain_backend_payloads_are_normalized() -> Result<()> {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new()
        .route("/api/health", get(|| async { Json(json!({"status": "up"})) }))
        .route(
            "/api/flaky",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "warming up"})))
                    } else {
                        (StatusCode::OK, Json(json!([1, 2, 3])))
                    }
                }
            }),
        )
        .route(
            "/api/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, app).await });

    let client = client_for(addr, Session::in_memory())?;
    let health = client.get("/health", vec![]).await?;
    assert_eq!(health, json!({"code": 200, "message": "success", "data": {"status": "up"}}));

    let err = client.get("/broken", vec![]).await.unwrap_err();
    assert_eq!(err.to_string(), "服务器错误，请稍后重试");

    let retrying = client.clone().with_retry(RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(10),
    });
    let flaky = retrying.get("/flaky", vec![]).await?;
    assert_eq!(flaky["data"], json!([1, 2, 3]));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    Ok(())
}
