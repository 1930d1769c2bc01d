use axum::{
    body::{to_bytes, Body},
    extract::{multipart::MultipartError, FromRequest, Multipart, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use kb_core::{ApiRequest, Error, Method, RequestBody, Transport, UploadForm};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{api_path, AppState};

const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

fn envelope_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({"code": status.as_u16(), "message": message.into(), "data": null})),
    )
        .into_response()
}

/// Translate the HTTP request, hand it to the fixture backend, and echo its answer.
pub async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let api_request = match to_api_request(&state, request).await {
        Ok(api_request) => api_request,
        Err(response) => return response,
    };

    match state.transport.send(api_request).await {
        Ok(raw) => {
            let status = StatusCode::from_u16(raw.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(raw.body)).into_response()
        }
        Err(e @ Error::UnmatchedRoute { .. }) => envelope_error(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => {
            warn!("Mock backend failed: {}", e);
            envelope_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn to_api_request(state: &AppState, request: Request<Body>) -> Result<ApiRequest, Response> {
    let method: Method = request
        .method()
        .as_str()
        .parse()
        .map_err(|e: String| envelope_error(StatusCode::METHOD_NOT_ALLOWED, e))?;
    let path = api_path(request.uri().path()).to_string();
    let query: Vec<(String, String)> = request
        .uri()
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    let headers: Vec<(String, String)> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    debug!("🌐 {} {}", method, path);
    let mut api_request = ApiRequest::new(method, path).with_query(query);
    api_request.headers = headers;

    api_request.body = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(IntoResponse::into_response)?;
        RequestBody::Multipart(read_form(multipart).await?)
    } else {
        let bytes = to_bytes(request.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| envelope_error(StatusCode::PAYLOAD_TOO_LARGE, e.to_string()))?;
        if bytes.is_empty() {
            RequestBody::Empty
        } else {
            let value: Value = serde_json::from_slice(&bytes)
                .map_err(|e| envelope_error(StatusCode::BAD_REQUEST, format!("请求体格式错误: {}", e)))?;
            RequestBody::Json(value)
        }
    };
    Ok(api_request)
}

/// The `file` part becomes the upload; every other part is a text field.
async fn read_form(mut multipart: Multipart) -> Result<UploadForm, Response> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            form.file_name = field.file_name().unwrap_or("upload.bin").to_string();
            form.content_type = field.content_type().map(str::to_string);
            form.bytes = field.bytes().await.map_err(bad_form)?.to_vec();
        } else {
            let value = field.text().await.map_err(bad_form)?;
            form.fields.push((name, value));
        }
    }
    Ok(form)
}

fn bad_form(e: MultipartError) -> Response {
    envelope_error(StatusCode::BAD_REQUEST, format!("上传表单无效: {}", e))
}
