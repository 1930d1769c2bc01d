use kb_core::endpoints::upload;
use kb_core::{ApiEnvelope, ApiRequest, Document, Error, Method, Result, UploadForm, UploadUrlRequest};
use std::path::Path;

use crate::ApiClient;

pub struct UploadApi<'a> {
    client: &'a ApiClient,
}

impl<'a> UploadApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Read `path` and upload it as a multipart `file` field.
    pub async fn file(&self, path: &Path, title: Option<&str>) -> Result<ApiEnvelope<Document>> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::rejected(format!("Not a file path: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        self.bytes(&file_name, bytes, title).await
    }

    pub async fn bytes(&self, file_name: &str, bytes: Vec<u8>, title: Option<&str>) -> Result<ApiEnvelope<Document>> {
        let mut fields = Vec::new();
        if let Some(title) = title {
            fields.push(("title".to_string(), title.to_string()));
        }
        let form = UploadForm {
            file_name: file_name.to_string(),
            content_type: Some(content_type_for(file_name).to_string()),
            bytes,
            fields,
        };
        self.client
            .request(ApiRequest::new(Method::Post, upload::FILE).with_form(form))
            .await
    }

    pub async fn url(&self, url: &str, title: Option<&str>) -> Result<ApiEnvelope<Document>> {
        let body = serde_json::to_value(UploadUrlRequest {
            url: url.to_string(),
            title: title.map(str::to_string),
        })?;
        self.client
            .request(ApiRequest::new(Method::Post, upload::URL).with_json(body))
            .await
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_guess() {
        assert_eq!(content_type_for("report.PDF"), "application/pdf");
        assert_eq!(content_type_for("notes.md"), "text/markdown");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }
}
