use kb_core::endpoints::documents;
use kb_core::{ApiEnvelope, ApiRequest, Document, DocumentQuery, Method, Result};
use serde_json::Value;

use crate::ApiClient;

pub struct DocumentsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> DocumentsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, query: &DocumentQuery) -> Result<ApiEnvelope<Vec<Document>>> {
        self.client
            .request(ApiRequest::new(Method::Get, documents::LIST).with_query(query.to_query_pairs()))
            .await
    }

    pub async fn get(&self, id: i64) -> Result<ApiEnvelope<Document>> {
        self.client
            .request(ApiRequest::new(Method::Get, documents::detail(id)))
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<ApiEnvelope<Value>> {
        self.client
            .request(ApiRequest::new(Method::Delete, documents::detail(id)))
            .await
    }

    pub async fn reprocess(&self, id: i64) -> Result<ApiEnvelope<Document>> {
        self.client
            .request(ApiRequest::new(Method::Post, documents::reprocess(id)))
            .await
    }
}
