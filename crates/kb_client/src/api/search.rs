use kb_core::endpoints::search;
use kb_core::{ApiEnvelope, ApiRequest, ChatReply, ChatRequest, Method, Result, SearchRequest, SearchResponse};

use crate::ApiClient;

pub struct SearchApi<'a> {
    client: &'a ApiClient,
}

impl<'a> SearchApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<ApiEnvelope<SearchResponse>> {
        let body = serde_json::to_value(request)?;
        self.client
            .request(ApiRequest::new(Method::Post, search::SEARCH).with_json(body))
            .await
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ApiEnvelope<ChatReply>> {
        let body = serde_json::to_value(request)?;
        self.client
            .request(ApiRequest::new(Method::Post, search::CHAT).with_json(body))
            .await
    }
}
