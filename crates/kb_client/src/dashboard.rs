//! One-shot overview of the knowledge base: counters, newest documents, scheduler state.

use chrono::{DateTime, Utc};
use kb_core::{AnalyticsOverview, Document, DocumentQuery, RequestSequence, Result, SchedulerStatus};
use serde::Serialize;

use crate::ApiClient;

pub const DEFAULT_RECENT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub overview: AnalyticsOverview,
    pub recent_documents: Vec<Document>,
    pub scheduler: SchedulerStatus,
    pub taken_at: DateTime<Utc>,
}

pub struct Dashboard {
    client: ApiClient,
    sequence: RequestSequence,
    recent: usize,
}

impl Dashboard {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            sequence: RequestSequence::new(),
            recent: DEFAULT_RECENT,
        }
    }

    pub fn with_recent(mut self, recent: usize) -> Self {
        self.recent = recent;
        self
    }

    /// Fetch the three parts concurrently. Fails if any part fails.
    pub async fn fetch(&self) -> Result<DashboardSnapshot> {
        let analytics = self.client.analytics();
        let documents = self.client.documents();
        let scheduler = self.client.scheduler();
        let query = DocumentQuery::default();

        let (overview, docs, status) =
            futures::try_join!(analytics.overview(), documents.list(&query), scheduler.status())?;

        let mut recent_documents = docs.data;
        recent_documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent_documents.truncate(self.recent);

        Ok(DashboardSnapshot {
            overview: overview.data,
            recent_documents,
            scheduler: status.data,
            taken_at: Utc::now(),
        })
    }

    /// Like [`Dashboard::fetch`], but `None` when a newer refresh started before this one finished.
    pub async fn refresh(&self) -> Option<Result<DashboardSnapshot>> {
        self.sequence.run(self.fetch()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Session;
    use kb_transport::{Latency, MockConfig, MockTransport, UnmatchedPolicy};
    use std::sync::Arc;

    fn dashboard(latency: Latency) -> Dashboard {
        let transport = MockTransport::new(MockConfig {
            latency,
            unmatched: UnmatchedPolicy::Strict,
        });
        Dashboard::new(ApiClient::new(Arc::new(transport), Session::in_memory()))
    }

    #[tokio::test]
    async fn test_snapshot_has_newest_documents_first() {
        let snapshot = dashboard(Latency::Instant).with_recent(3).fetch().await.unwrap();
        assert_eq!(snapshot.overview.total_documents, 8);
        assert_eq!(snapshot.recent_documents.len(), 3);
        assert!(snapshot
            .recent_documents
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(snapshot.recent_documents[0].id, 8);
        assert!(snapshot.scheduler.running);
    }

    #[tokio::test]
    async fn test_overlapping_refresh_keeps_only_the_newest() {
        let dashboard = dashboard(Latency::Realistic);
        let (older, newer) = tokio::join!(dashboard.refresh(), dashboard.refresh());
        assert!(older.is_none());
        assert!(newer.unwrap().is_ok());
    }
}
