use chrono::{DateTime, Duration, Utc};
use kb_core::{Cluster, ClusterAnalysis, Document, DocumentStatus, Source, SourceKind, SourceType, User};
use std::collections::HashMap;

/// A fixture account and its password.
#[derive(Debug, Clone)]
pub struct MockUser {
    pub user: User,
    pub password: String,
}

/// Everything the mock backend knows. Lives as long as its store.
#[derive(Debug, Clone)]
pub struct MockState {
    pub users: Vec<MockUser>,
    pub documents: Vec<Document>,
    pub sources: Vec<Source>,
    pub clusters: ClusterAnalysis,
    pub scheduler_running: bool,
    /// token -> user id
    pub sessions: HashMap<String, i64>,
}

impl MockState {
    pub fn seeded() -> Self {
        let now = Utc::now();
        Self {
            users: seed_users(now),
            documents: seed_documents(now),
            sources: seed_sources(now),
            clusters: seed_clusters(now),
            scheduler_running: true,
            sessions: HashMap::new(),
        }
    }

    pub fn next_user_id(&self) -> i64 {
        self.users.iter().map(|u| u.user.id).max().unwrap_or(0) + 1
    }

    pub fn next_document_id(&self) -> i64 {
        self.documents.iter().map(|d| d.id).max().unwrap_or(0) + 1
    }

    pub fn next_source_id(&self) -> i64 {
        self.sources.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }

    pub fn user_for_token(&self, token: &str) -> Option<&User> {
        let id = self.sessions.get(token)?;
        self.users.iter().map(|u| &u.user).find(|u| u.id == *id)
    }
}

impl Default for MockState {
    fn default() -> Self {
        Self::seeded()
    }
}

fn seed_users(now: DateTime<Utc>) -> Vec<MockUser> {
    vec![
        MockUser {
            user: User {
                id: 1,
                username: "admin".to_string(),
                email: "admin@example.com".to_string(),
                role: "admin".to_string(),
                avatar: None,
                created_at: Some(now - Duration::days(90)),
            },
            password: "admin123".to_string(),
        },
        MockUser {
            user: User {
                id: 2,
                username: "analyst".to_string(),
                email: "user@example.com".to_string(),
                role: "user".to_string(),
                avatar: None,
                created_at: Some(now - Duration::days(30)),
            },
            password: "user123".to_string(),
        },
    ]
}

fn seed_sources(now: DateTime<Utc>) -> Vec<Source> {
    let source = |id: i64, name: &str, url: &str, kind: SourceKind, enabled: bool, interval: u32, category: &str, docs: u64| Source {
        id,
        name: name.to_string(),
        url: url.to_string(),
        kind,
        enabled,
        interval_minutes: interval,
        category: Some(category.to_string()),
        last_fetched_at: enabled.then(|| now - Duration::minutes(i64::from(interval) / 2)),
        document_count: docs,
        last_error: None,
        created_at: now - Duration::days(60 - id * 5),
    };
    vec![
        source(1, "Rust Blog", "https://blog.rust-lang.org/feed.xml", SourceKind::Rss, true, 60, "技术", 3),
        source(2, "Hacker News", "https://hnrss.org/frontpage", SourceKind::Rss, true, 30, "技术", 2),
        source(3, "36氪", "https://36kr.com/feed", SourceKind::Rss, false, 120, "商业", 1),
        source(4, "arXiv cs.IR", "https://arxiv.org/list/cs.IR/recent", SourceKind::Web, true, 720, "研究", 1),
    ]
}

fn seed_documents(now: DateTime<Utc>) -> Vec<Document> {
    let doc = |id: i64,
               title: &str,
               content: &str,
               source_type: SourceType,
               source: Option<(i64, &str)>,
               status: DocumentStatus,
               tags: &[&str],
               age_hours: i64| Document {
        id,
        title: title.to_string(),
        content: Some(content.to_string()),
        summary: Some(content.chars().take(40).collect()),
        source_type,
        source_id: source.map(|(sid, _)| sid),
        source_name: source.map(|(_, name)| name.to_string()),
        url: source.map(|(sid, _)| format!("https://example.com/sources/{}/articles/{}", sid, id)),
        status,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        file_type: None,
        size: Some(content.len() as u64),
        created_at: now - Duration::hours(age_hours),
        updated_at: None,
    };
    vec![
        doc(
            1,
            "Rust 1.80 发布说明",
            "Rust 1.80 stabilizes LazyCell and LazyLock, adds exclusive ranges in patterns and improves cargo check-cfg.",
            SourceType::Rss,
            Some((1, "Rust Blog")),
            DocumentStatus::Indexed,
            &["rust", "release"],
            2,
        ),
        doc(
            2,
            "Async Rust 的现状",
            "An overview of async Rust: futures, executors such as tokio, and the ongoing work on async closures.",
            SourceType::Rss,
            Some((1, "Rust Blog")),
            DocumentStatus::Indexed,
            &["rust", "async", "tokio"],
            26,
        ),
        doc(
            3,
            "Cargo 工作区最佳实践",
            "Workspaces let several crates share a lockfile and target directory; workspace dependencies keep versions aligned.",
            SourceType::Rss,
            Some((1, "Rust Blog")),
            DocumentStatus::Indexed,
            &["rust", "cargo"],
            50,
        ),
        doc(
            4,
            "向量数据库选型指南",
            "Comparing vector databases for retrieval augmented generation: HNSW indexes, filtering and hybrid search with BM25.",
            SourceType::Rss,
            Some((2, "Hacker News")),
            DocumentStatus::Indexed,
            &["rag", "vector-search"],
            5,
        ),
        doc(
            5,
            "RSS 仍然重要",
            "Why RSS feeds remain a reliable way to follow sources without algorithmic timelines.",
            SourceType::Rss,
            Some((2, "Hacker News")),
            DocumentStatus::Processing,
            &["rss"],
            1,
        ),
        doc(
            6,
            "AI 初创公司融资观察",
            "Funding rounds for AI startups continued to grow this quarter, led by infrastructure and retrieval tooling.",
            SourceType::Rss,
            Some((3, "36氪")),
            DocumentStatus::Indexed,
            &["ai", "funding"],
            80,
        ),
        doc(
            7,
            "Dense Passage Retrieval 复现笔记",
            "Notes on reproducing dense passage retrieval: negatives mining, batch size effects and rerankers for hybrid search.",
            SourceType::Web,
            Some((4, "arXiv cs.IR")),
            DocumentStatus::Failed,
            &["rag", "retrieval", "paper"],
            120,
        ),
        doc(
            8,
            "团队知识库使用手册.pdf",
            "How to upload documents, configure RSS sources and ask the assistant questions about indexed content.",
            SourceType::Upload,
            None,
            DocumentStatus::Pending,
            &["manual"],
            0,
        ),
    ]
    .into_iter()
    .map(|mut d| {
        if d.source_type == SourceType::Upload {
            d.file_type = Some("pdf".to_string());
        }
        d
    })
    .collect()
}

fn seed_clusters(now: DateTime<Utc>) -> ClusterAnalysis {
    ClusterAnalysis {
        clusters: vec![
            Cluster {
                id: 1,
                label: "Rust 生态".to_string(),
                size: 3,
                keywords: vec!["rust".into(), "cargo".into(), "async".into()],
                document_ids: vec![1, 2, 3],
            },
            Cluster {
                id: 2,
                label: "检索增强生成".to_string(),
                size: 2,
                keywords: vec!["rag".into(), "retrieval".into(), "vector".into()],
                document_ids: vec![4, 7],
            },
            Cluster {
                id: 3,
                label: "行业动态".to_string(),
                size: 2,
                keywords: vec!["ai".into(), "funding".into(), "rss".into()],
                document_ids: vec![5, 6],
            },
        ],
        generated_at: now - Duration::hours(6),
    }
}
