//! Backend paths, relative to the API base URL.

pub mod auth {
    pub const LOGIN: &str = "/auth/login";
    pub const REGISTER: &str = "/auth/register";
    pub const LOGOUT: &str = "/auth/logout";
    pub const ME: &str = "/auth/me";
}

pub mod documents {
    pub const LIST: &str = "/documents";

    pub fn detail(id: i64) -> String {
        format!("/documents/{}", id)
    }

    pub fn reprocess(id: i64) -> String {
        format!("/documents/{}/reprocess", id)
    }
}

pub mod search {
    pub const SEARCH: &str = "/search";
    pub const CHAT: &str = "/chat";
}

pub mod collection {
    pub const SOURCES: &str = "/collection/sources";

    pub fn source(id: i64) -> String {
        format!("/collection/sources/{}", id)
    }

    pub fn toggle(id: i64) -> String {
        format!("/collection/sources/{}/toggle", id)
    }

    pub fn test(id: i64) -> String {
        format!("/collection/sources/{}/test", id)
    }

    pub fn fetch(id: i64) -> String {
        format!("/collection/sources/{}/fetch", id)
    }
}

pub mod analytics {
    pub const OVERVIEW: &str = "/analytics/overview";
    pub const TRENDS: &str = "/analytics/trends";
    pub const KEYWORDS: &str = "/analytics/keywords";
    pub const CLUSTERS: &str = "/analytics/clusters";
}

pub mod upload {
    pub const FILE: &str = "/upload/file";
    pub const URL: &str = "/upload/url";
}

pub mod scheduler {
    pub const STATUS: &str = "/scheduler/status";
    pub const START: &str = "/scheduler/start";
    pub const STOP: &str = "/scheduler/stop";

    pub fn run_job(id: i64) -> String {
        format!("/scheduler/jobs/{}/run", id)
    }
}

pub const HEALTH: &str = "/health";
