use kb_core::endpoints::collection;
use kb_core::{ApiEnvelope, ApiRequest, CrawlResult, Method, Result, Source, SourceInput, SourceTestResult};
use serde_json::Value;

use crate::ApiClient;

/// Collection sources (RSS feeds and crawled sites).
pub struct CollectionApi<'a> {
    client: &'a ApiClient,
}

impl<'a> CollectionApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list_sources(&self) -> Result<ApiEnvelope<Vec<Source>>> {
        self.client
            .request(ApiRequest::new(Method::Get, collection::SOURCES))
            .await
    }

    pub async fn create_source(&self, input: &SourceInput) -> Result<ApiEnvelope<Source>> {
        let body = serde_json::to_value(input)?;
        self.client
            .request(ApiRequest::new(Method::Post, collection::SOURCES).with_json(body))
            .await
    }

    /// Only the fields set in `input` change.
    pub async fn update_source(&self, id: i64, input: &SourceInput) -> Result<ApiEnvelope<Source>> {
        let body = serde_json::to_value(input)?;
        self.client
            .request(ApiRequest::new(Method::Put, collection::source(id)).with_json(body))
            .await
    }

    pub async fn delete_source(&self, id: i64) -> Result<ApiEnvelope<Value>> {
        self.client
            .request(ApiRequest::new(Method::Delete, collection::source(id)))
            .await
    }

    pub async fn toggle_source(&self, id: i64) -> Result<ApiEnvelope<Source>> {
        self.client
            .request(ApiRequest::new(Method::Post, collection::toggle(id)))
            .await
    }

    pub async fn test_source(&self, id: i64) -> Result<ApiEnvelope<SourceTestResult>> {
        self.client
            .request(ApiRequest::new(Method::Post, collection::test(id)))
            .await
    }

    pub async fn fetch_source(&self, id: i64) -> Result<ApiEnvelope<CrawlResult>> {
        self.client
            .request(ApiRequest::new(Method::Post, collection::fetch(id)))
            .await
    }
}
