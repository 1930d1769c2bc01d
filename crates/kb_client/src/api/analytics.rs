use kb_core::endpoints::analytics;
use kb_core::{
    AnalyticsOverview, ApiEnvelope, ApiRequest, ClusterAnalysis, KeywordStat, Method, Result, TrendPoint,
};

use crate::ApiClient;

pub struct AnalyticsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AnalyticsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn overview(&self) -> Result<ApiEnvelope<AnalyticsOverview>> {
        self.client
            .request(ApiRequest::new(Method::Get, analytics::OVERVIEW))
            .await
    }

    /// Daily ingestion counts; the backend picks the window when `days` is `None`.
    pub async fn trends(&self, days: Option<u32>) -> Result<ApiEnvelope<Vec<TrendPoint>>> {
        let query = days.map(|d| vec![("days".to_string(), d.to_string())]).unwrap_or_default();
        self.client
            .request(ApiRequest::new(Method::Get, analytics::TRENDS).with_query(query))
            .await
    }

    pub async fn keywords(&self, limit: Option<usize>) -> Result<ApiEnvelope<Vec<KeywordStat>>> {
        let query = limit.map(|l| vec![("limit".to_string(), l.to_string())]).unwrap_or_default();
        self.client
            .request(ApiRequest::new(Method::Get, analytics::KEYWORDS).with_query(query))
            .await
    }

    pub async fn clusters(&self) -> Result<ApiEnvelope<ClusterAnalysis>> {
        self.client
            .request(ApiRequest::new(Method::Get, analytics::CLUSTERS))
            .await
    }
}
