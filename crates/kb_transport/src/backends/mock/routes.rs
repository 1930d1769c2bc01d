use kb_core::Method;
use std::time::Duration;

/// Every backend operation the mock knows how to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockRoute {
    Health,
    Login,
    Register,
    Logout,
    Me,
    ListDocuments,
    GetDocument(i64),
    DeleteDocument(i64),
    ReprocessDocument(i64),
    UploadFile,
    UploadUrl,
    Search,
    Chat,
    ListSources,
    CreateSource,
    UpdateSource(i64),
    DeleteSource(i64),
    ToggleSource(i64),
    TestSource(i64),
    FetchSource(i64),
    AnalyticsOverview,
    AnalyticsTrends,
    AnalyticsKeywords,
    AnalyticsClusters,
    SchedulerStatus,
    SchedulerStart,
    SchedulerStop,
    RunJob(i64),
}

impl MockRoute {
    /// Simulated backend latency for this operation.
    pub fn delay(&self) -> Duration {
        let millis = match self {
            MockRoute::Health => 100,
            MockRoute::Login => 800,
            MockRoute::Register => 1000,
            MockRoute::Logout | MockRoute::Me => 200,
            MockRoute::ListDocuments | MockRoute::GetDocument(_) => 500,
            MockRoute::DeleteDocument(_) | MockRoute::ReprocessDocument(_) => 300,
            MockRoute::UploadFile => 1500,
            MockRoute::UploadUrl => 1200,
            MockRoute::Search => 800,
            MockRoute::Chat => 1500,
            MockRoute::ListSources => 400,
            MockRoute::CreateSource | MockRoute::UpdateSource(_) | MockRoute::DeleteSource(_) => 500,
            MockRoute::ToggleSource(_) => 300,
            MockRoute::TestSource(_) | MockRoute::FetchSource(_) | MockRoute::RunJob(_) => 1000,
            MockRoute::AnalyticsOverview
            | MockRoute::AnalyticsTrends
            | MockRoute::AnalyticsKeywords
            | MockRoute::AnalyticsClusters => 600,
            MockRoute::SchedulerStatus | MockRoute::SchedulerStart | MockRoute::SchedulerStop => 300,
        };
        Duration::from_millis(millis)
    }
}

/// Map a method and API-relative path onto a route. Query strings and trailing slashes are ignored.
pub fn match_route(method: Method, path: &str) -> Option<MockRoute> {
    let path = path.split('?').next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let route = match (method, segments.as_slice()) {
        (Method::Get, ["health"]) => MockRoute::Health,

        (Method::Post, ["auth", "login"]) => MockRoute::Login,
        (Method::Post, ["auth", "register"]) => MockRoute::Register,
        (Method::Post, ["auth", "logout"]) => MockRoute::Logout,
        (Method::Get, ["auth", "me"]) => MockRoute::Me,

        (Method::Get, ["documents"]) => MockRoute::ListDocuments,
        (Method::Get, ["documents", id]) => MockRoute::GetDocument(parse_id(id)?),
        (Method::Delete, ["documents", id]) => MockRoute::DeleteDocument(parse_id(id)?),
        (Method::Post, ["documents", id, "reprocess"]) => MockRoute::ReprocessDocument(parse_id(id)?),

        (Method::Post, ["upload", "file"]) => MockRoute::UploadFile,
        (Method::Post, ["upload", "url"]) => MockRoute::UploadUrl,

        (Method::Post, ["search"]) => MockRoute::Search,
        (Method::Post, ["chat"]) => MockRoute::Chat,

        (Method::Get, ["collection", "sources"]) => MockRoute::ListSources,
        (Method::Post, ["collection", "sources"]) => MockRoute::CreateSource,
        (Method::Put, ["collection", "sources", id]) => MockRoute::UpdateSource(parse_id(id)?),
        (Method::Delete, ["collection", "sources", id]) => MockRoute::DeleteSource(parse_id(id)?),
        (Method::Post, ["collection", "sources", id, "toggle"]) => MockRoute::ToggleSource(parse_id(id)?),
        (Method::Post, ["collection", "sources", id, "test"]) => MockRoute::TestSource(parse_id(id)?),
        (Method::Post, ["collection", "sources", id, "fetch"]) => MockRoute::FetchSource(parse_id(id)?),

        (Method::Get, ["analytics", "overview"]) => MockRoute::AnalyticsOverview,
        (Method::Get, ["analytics", "trends"]) => MockRoute::AnalyticsTrends,
        (Method::Get, ["analytics", "keywords"]) => MockRoute::AnalyticsKeywords,
        (Method::Get, ["analytics", "clusters"]) => MockRoute::AnalyticsClusters,

        (Method::Get, ["scheduler", "status"]) => MockRoute::SchedulerStatus,
        (Method::Post, ["scheduler", "start"]) => MockRoute::SchedulerStart,
        (Method::Post, ["scheduler", "stop"]) => MockRoute::SchedulerStop,
        (Method::Post, ["scheduler", "jobs", id, "run"]) => MockRoute::RunJob(parse_id(id)?),

        _ => return None,
    };
    Some(route)
}

fn parse_id(segment: &str) -> Option<i64> {
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_routes() {
        assert_eq!(match_route(Method::Post, "/auth/login"), Some(MockRoute::Login));
        assert_eq!(match_route(Method::Get, "/documents"), Some(MockRoute::ListDocuments));
        assert_eq!(match_route(Method::Get, "/documents/"), Some(MockRoute::ListDocuments));
        assert_eq!(match_route(Method::Get, "/documents?page=2"), Some(MockRoute::ListDocuments));
        assert_eq!(match_route(Method::Get, "/analytics/overview"), Some(MockRoute::AnalyticsOverview));
    }

    #[test]
    fn test_parametrized_routes() {
        assert_eq!(match_route(Method::Get, "/documents/42"), Some(MockRoute::GetDocument(42)));
        assert_eq!(match_route(Method::Delete, "/documents/42"), Some(MockRoute::DeleteDocument(42)));
        assert_eq!(
            match_route(Method::Post, "/collection/sources/3/toggle"),
            Some(MockRoute::ToggleSource(3))
        );
        assert_eq!(match_route(Method::Post, "/scheduler/jobs/7/run"), Some(MockRoute::RunJob(7)));
    }

    #[test]
    fn test_method_matters() {
        assert_eq!(match_route(Method::Get, "/auth/login"), None);
        assert_eq!(match_route(Method::Put, "/documents/1"), None);
    }

    #[test]
    fn test_unknown_and_malformed_paths() {
        assert_eq!(match_route(Method::Get, "/nope"), None);
        assert_eq!(match_route(Method::Get, "/documents/abc"), None);
        assert_eq!(match_route(Method::Get, "/"), None);
    }

    #[test]
    fn test_delays_stay_in_range() {
        for route in [MockRoute::Health, MockRoute::Login, MockRoute::UploadFile, MockRoute::Chat] {
            let delay = route.delay();
            assert!(delay >= Duration::from_millis(100) && delay <= Duration::from_millis(1500));
        }
    }
}
