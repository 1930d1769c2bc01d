use kb_core::endpoints::scheduler;
use kb_core::{ApiEnvelope, ApiRequest, CrawlResult, Method, Result, SchedulerStatus};

use crate::ApiClient;

pub struct SchedulerApi<'a> {
    client: &'a ApiClient,
}

impl<'a> SchedulerApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn status(&self) -> Result<ApiEnvelope<SchedulerStatus>> {
        self.client
            .request(ApiRequest::new(Method::Get, scheduler::STATUS))
            .await
    }

    pub async fn start(&self) -> Result<ApiEnvelope<SchedulerStatus>> {
        self.client
            .request(ApiRequest::new(Method::Post, scheduler::START))
            .await
    }

    pub async fn stop(&self) -> Result<ApiEnvelope<SchedulerStatus>> {
        self.client
            .request(ApiRequest::new(Method::Post, scheduler::STOP))
            .await
    }

    pub async fn run_job(&self, id: i64) -> Result<ApiEnvelope<CrawlResult>> {
        self.client
            .request(ApiRequest::new(Method::Post, scheduler::run_job(id)))
            .await
    }
}
