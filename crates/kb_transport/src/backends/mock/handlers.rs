use chrono::{Duration, Utc};
use kb_core::{
    messages, AnalyticsOverview, ApiRequest, AuthPayload, ChatReply, ChatRequest, CountBucket, CrawlResult, Document,
    DocumentStatus, KeywordStat, LoginRequest, RawResponse, RegisterRequest, RequestBody, ResponseOrigin,
    ScheduledJob, SchedulerStatus, SearchHit, SearchRequest, SearchResponse, Source, SourceInput, SourceKind,
    SourceTestResult, SourceType, TrendPoint, UploadUrlRequest, User,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

use super::fixtures::{MockState, MockUser};
use super::routes::MockRoute;
use super::MockStore;

const MAX_PAGE_SIZE: usize = 100;

/// A handler refusing the request; becomes a non-2xx response.
#[derive(Debug)]
struct Reject {
    status: u16,
    message: String,
}

impl Reject {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: 400, message: message.into() }
    }

    fn unauthorized() -> Self {
        Self { status: 401, message: "unauthorized".to_string() }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self { status: 404, message: message.into() }
    }
}

type HandlerResult = std::result::Result<Value, Reject>;

/// Run the handler for `route` and wrap its outcome in an envelope.
pub async fn dispatch(store: &MockStore, route: MockRoute, request: &ApiRequest) -> RawResponse {
    let result = match route {
        MockRoute::Health => Ok(json!({"status": "ok"})),
        MockRoute::Login => login(store, request).await,
        MockRoute::Register => register(store, request).await,
        MockRoute::Logout => logout(store, request).await,
        MockRoute::Me => me(store, request).await,
        MockRoute::ListDocuments => list_documents(store, request).await,
        MockRoute::GetDocument(id) => get_document(store, id).await,
        MockRoute::DeleteDocument(id) => delete_document(store, id).await,
        MockRoute::ReprocessDocument(id) => reprocess_document(store, id).await,
        MockRoute::UploadFile => upload_file(store, request).await,
        MockRoute::UploadUrl => upload_url(store, request).await,
        MockRoute::Search => search(store, request).await,
        MockRoute::Chat => chat(store, request).await,
        MockRoute::ListSources => to_data(&store.read().await.sources),
        MockRoute::CreateSource => create_source(store, request).await,
        MockRoute::UpdateSource(id) => update_source(store, id, request).await,
        MockRoute::DeleteSource(id) => delete_source(store, id).await,
        MockRoute::ToggleSource(id) => toggle_source(store, id).await,
        MockRoute::TestSource(id) => test_source(store, id).await,
        MockRoute::FetchSource(id) => fetch_source(store, id).await,
        MockRoute::AnalyticsOverview => to_data(&overview(&*store.read().await)),
        MockRoute::AnalyticsTrends => trends(store, request).await,
        MockRoute::AnalyticsKeywords => keywords(store, request).await,
        MockRoute::AnalyticsClusters => to_data(&store.read().await.clusters),
        MockRoute::SchedulerStatus => to_data(&scheduler_status(&*store.read().await)),
        MockRoute::SchedulerStart => set_scheduler(store, true).await,
        MockRoute::SchedulerStop => set_scheduler(store, false).await,
        MockRoute::RunJob(id) => run_job(store, id).await,
    };

    let (status, body) = match result {
        Ok(data) => (200, json!({"code": 200, "message": "success", "data": data})),
        Err(reject) => (
            reject.status,
            json!({"code": reject.status, "message": reject.message, "data": null}),
        ),
    };
    RawResponse {
        status,
        body,
        origin: ResponseOrigin::Fixture,
    }
}

fn to_data<T: Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| Reject {
        status: 500,
        message: format!("serialization failed: {}", e),
    })
}

fn parse_body<T: DeserializeOwned>(request: &ApiRequest) -> std::result::Result<T, Reject> {
    let body = request
        .json_body()
        .ok_or_else(|| Reject::bad_request("请求体格式错误"))?;
    serde_json::from_value(body.clone()).map_err(|e| Reject::bad_request(format!("请求体格式错误: {}", e)))
}

fn issue_token(state: &mut MockState, user_id: i64) -> String {
    let token = format!("mock-{}", Uuid::new_v4().simple());
    state.sessions.insert(token.clone(), user_id);
    token
}

async fn login(store: &MockStore, request: &ApiRequest) -> HandlerResult {
    let credentials: LoginRequest = parse_body(request)?;
    let mut state = store.write().await;
    let user = state
        .users
        .iter()
        .find(|u| u.user.email == credentials.email && u.password == credentials.password)
        .map(|u| u.user.clone())
        .ok_or_else(|| Reject::bad_request(messages::BAD_CREDENTIALS))?;
    let token = issue_token(&mut state, user.id);
    to_data(&AuthPayload { token, user })
}

async fn register(store: &MockStore, request: &ApiRequest) -> HandlerResult {
    let form: RegisterRequest = parse_body(request)?;
    let username = form.username.trim();
    let email = form.email.trim();
    if username.is_empty() || email.is_empty() {
        return Err(Reject::bad_request("用户名和邮箱不能为空"));
    }
    if form.password.chars().count() < 6 {
        return Err(Reject::bad_request("密码长度不能少于6位"));
    }

    let mut state = store.write().await;
    if state.users.iter().any(|u| u.user.email.eq_ignore_ascii_case(email)) {
        return Err(Reject::bad_request(messages::EMAIL_TAKEN));
    }
    let user = User {
        id: state.next_user_id(),
        username: username.to_string(),
        email: email.to_string(),
        role: "user".to_string(),
        avatar: None,
        created_at: Some(Utc::now()),
    };
    state.users.push(MockUser {
        user: user.clone(),
        password: form.password,
    });
    let token = issue_token(&mut state, user.id);
    to_data(&AuthPayload { token, user })
}

async fn logout(store: &MockStore, request: &ApiRequest) -> HandlerResult {
    if let Some(token) = request.bearer_token() {
        store.write().await.sessions.remove(token);
    }
    Ok(Value::Null)
}

async fn me(store: &MockStore, request: &ApiRequest) -> HandlerResult {
    let token = request.bearer_token().ok_or_else(Reject::unauthorized)?;
    let state = store.read().await;
    let user = state.user_for_token(token).ok_or_else(Reject::unauthorized)?;
    to_data(user)
}

async fn list_documents(store: &MockStore, request: &ApiRequest) -> HandlerResult {
    let keyword = request.query_param("keyword").map(str::to_lowercase);
    let status: Option<DocumentStatus> = parse_param(request, "status")?;
    let source_type: Option<SourceType> = parse_param(request, "source_type")?;
    let source_id: Option<i64> = parse_param(request, "source_id")?;
    let page: Option<usize> = parse_param(request, "page")?;
    let page_size = parse_param::<usize>(request, "page_size")?.unwrap_or(10).clamp(1, MAX_PAGE_SIZE);

    let state = store.read().await;
    let matching: Vec<&Document> = state
        .documents
        .iter()
        .filter(|d| status.map_or(true, |s| d.status == s))
        .filter(|d| source_type.map_or(true, |t| d.source_type == t))
        .filter(|d| source_id.map_or(true, |id| d.source_id == Some(id)))
        .filter(|d| keyword.as_deref().map_or(true, |k| document_mentions(d, k)))
        .collect();

    let page_items: Vec<&Document> = match page {
        Some(page) => match page.saturating_sub(1).checked_mul(page_size) {
            Some(offset) => matching.into_iter().skip(offset).take(page_size).collect(),
            None => Vec::new(),
        },
        None => matching,
    };
    to_data(&page_items)
}

fn parse_param<T: std::str::FromStr>(request: &ApiRequest, name: &str) -> std::result::Result<Option<T>, Reject> {
    match request.query_param(name) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Reject::bad_request(format!("参数 {} 无效: {}", name, raw))),
    }
}

fn document_mentions(doc: &Document, keyword: &str) -> bool {
    doc.title.to_lowercase().contains(keyword)
        || doc
            .content
            .as_deref()
            .map_or(false, |c| c.to_lowercase().contains(keyword))
        || doc.tags.iter().any(|t| t.to_lowercase().contains(keyword))
}

async fn get_document(store: &MockStore, id: i64) -> HandlerResult {
    let state = store.read().await;
    let doc = state
        .documents
        .iter()
        .find(|d| d.id == id)
        .ok_or_else(|| Reject::not_found("文档不存在"))?;
    to_data(doc)
}

async fn delete_document(store: &MockStore, id: i64) -> HandlerResult {
    let mut state = store.write().await;
    let index = state
        .documents
        .iter()
        .position(|d| d.id == id)
        .ok_or_else(|| Reject::not_found("文档不存在"))?;
    let removed = state.documents.remove(index);
    if let Some(source_id) = removed.source_id {
        if let Some(source) = state.sources.iter_mut().find(|s| s.id == source_id) {
            source.document_count = source.document_count.saturating_sub(1);
        }
    }
    Ok(json!({"id": id}))
}

async fn reprocess_document(store: &MockStore, id: i64) -> HandlerResult {
    let mut state = store.write().await;
    let doc = state
        .documents
        .iter_mut()
        .find(|d| d.id == id)
        .ok_or_else(|| Reject::not_found("文档不存在"))?;
    doc.status = DocumentStatus::Processing;
    doc.updated_at = Some(Utc::now());
    to_data(&*doc)
}

async fn upload_file(store: &MockStore, request: &ApiRequest) -> HandlerResult {
    let RequestBody::Multipart(form) = &request.body else {
        return Err(Reject::bad_request("请选择要上传的文件"));
    };
    if form.bytes.is_empty() {
        return Err(Reject::bad_request("文件内容为空"));
    }

    let file_type = form
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    let content = std::str::from_utf8(&form.bytes)
        .ok()
        .map(|text| text.chars().take(2000).collect::<String>());
    let title = form
        .field("title")
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(form.file_name.as_str())
        .to_string();
    let tags: Vec<String> = form
        .field("tags")
        .map(|t| {
            t.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut state = store.write().await;
    let doc = Document {
        id: state.next_document_id(),
        title,
        summary: content.as_ref().map(|c| c.chars().take(40).collect()),
        content,
        source_type: SourceType::Upload,
        source_id: None,
        source_name: None,
        url: None,
        status: DocumentStatus::Processing,
        tags,
        file_type,
        size: Some(form.bytes.len() as u64),
        created_at: Utc::now(),
        updated_at: None,
    };
    state.documents.push(doc.clone());
    to_data(&doc)
}

async fn upload_url(store: &MockStore, request: &ApiRequest) -> HandlerResult {
    let body: UploadUrlRequest = parse_body(request)?;
    let url = body.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Reject::bad_request("无效的URL"));
    }

    let mut state = store.write().await;
    let doc = Document {
        id: state.next_document_id(),
        title: body.title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| url.to_string()),
        content: None,
        summary: None,
        source_type: SourceType::Web,
        source_id: None,
        source_name: None,
        url: Some(url.to_string()),
        status: DocumentStatus::Pending,
        tags: Vec::new(),
        file_type: Some("html".to_string()),
        size: None,
        created_at: Utc::now(),
        updated_at: None,
    };
    state.documents.push(doc.clone());
    to_data(&doc)
}

/// Keyword ranking over titles, tags and content; best first, scores scaled into (0, 1].
fn rank(documents: &[Document], query: &str, source_type: Option<SourceType>) -> Vec<SearchHit> {
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f32, &Document)> = documents
        .iter()
        .filter(|d| source_type.map_or(true, |t| d.source_type == t))
        .filter_map(|doc| {
            let title = doc.title.to_lowercase();
            let content = doc.content.as_deref().unwrap_or_default().to_lowercase();
            let raw: usize = terms
                .iter()
                .map(|term| {
                    title.matches(term.as_str()).count() * 3
                        + doc.tags.iter().filter(|t| t.to_lowercase() == *term).count() * 2
                        + content.matches(term.as_str()).count()
                })
                .sum();
            (raw > 0).then_some((raw as f32, doc))
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.id.cmp(&b.1.id)));

    let best = scored.first().map(|(s, _)| *s).unwrap_or(1.0);
    scored
        .into_iter()
        .map(|(score, doc)| SearchHit {
            document_id: doc.id,
            title: doc.title.clone(),
            snippet: snippet(doc.content.as_deref().unwrap_or_default(), &terms[0]),
            score: score / best,
            source_name: doc.source_name.clone(),
            url: doc.url.clone(),
        })
        .collect()
}

fn snippet(content: &str, term: &str) -> String {
    const WIDTH: usize = 80;
    let lower = content.to_lowercase();
    let start = lower
        .find(term)
        .map(|byte| lower[..byte].chars().count().saturating_sub(20))
        .unwrap_or(0);
    let chars: Vec<char> = content.chars().collect();
    let start = start.min(chars.len());
    let end = (start + WIDTH).min(chars.len());
    let mut out: String = chars[start..end].iter().collect();
    if start > 0 {
        out.insert(0, '…');
    }
    if end < chars.len() {
        out.push('…');
    }
    out
}

async fn search(store: &MockStore, request: &ApiRequest) -> HandlerResult {
    let started = Instant::now();
    let body: SearchRequest = parse_body(request)?;
    if body.query.trim().is_empty() {
        return Err(Reject::bad_request("搜索内容不能为空"));
    }
    let hits = rank(&store.read().await.documents, &body.query, body.source_type);
    let total = hits.len();
    to_data(&SearchResponse {
        query: body.query,
        results: hits.into_iter().take(body.top_k).collect(),
        total,
        took_ms: started.elapsed().as_millis() as u64,
    })
}

async fn chat(store: &MockStore, request: &ApiRequest) -> HandlerResult {
    let body: ChatRequest = parse_body(request)?;
    let question = body.message.trim();
    if question.is_empty() {
        return Err(Reject::bad_request("消息内容不能为空"));
    }

    let sources: Vec<SearchHit> = rank(&store.read().await.documents, question, None)
        .into_iter()
        .take(3)
        .collect();
    let answer = if sources.is_empty() {
        format!("抱歉，知识库中没有找到与「{}」相关的内容。", question)
    } else {
        let mut answer = format!("根据知识库中的 {} 篇相关文档：", sources.len());
        for (i, hit) in sources.iter().enumerate() {
            answer.push_str(&format!("\n{}. 《{}》：{}", i + 1, hit.title, hit.snippet));
        }
        answer
    };

    to_data(&ChatReply {
        answer,
        conversation_id: body
            .conversation_id
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        sources,
    })
}

async fn create_source(store: &MockStore, request: &ApiRequest) -> HandlerResult {
    let input: SourceInput = parse_body(request)?;
    let name = input.name.as_deref().map(str::trim).unwrap_or_default();
    let url = input.url.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() || url.is_empty() {
        return Err(Reject::bad_request("名称和URL不能为空"));
    }

    let mut state = store.write().await;
    let source = Source {
        id: state.next_source_id(),
        name: name.to_string(),
        url: url.to_string(),
        kind: input.kind.unwrap_or(SourceKind::Rss),
        enabled: input.enabled.unwrap_or(true),
        interval_minutes: input.interval_minutes.unwrap_or(60),
        category: input.category,
        last_fetched_at: None,
        document_count: 0,
        last_error: None,
        created_at: Utc::now(),
    };
    state.sources.push(source.clone());
    to_data(&source)
}

fn find_source(state: &mut MockState, id: i64) -> std::result::Result<&mut Source, Reject> {
    state
        .sources
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| Reject::not_found("数据源不存在"))
}

async fn update_source(store: &MockStore, id: i64, request: &ApiRequest) -> HandlerResult {
    let input: SourceInput = parse_body(request)?;
    let mut state = store.write().await;
    let source = find_source(&mut state, id)?;
    if let Some(name) = input.name.filter(|n| !n.trim().is_empty()) {
        source.name = name;
    }
    if let Some(url) = input.url.filter(|u| !u.trim().is_empty()) {
        source.url = url;
    }
    if let Some(kind) = input.kind {
        source.kind = kind;
    }
    if let Some(enabled) = input.enabled {
        source.enabled = enabled;
    }
    if let Some(interval) = input.interval_minutes {
        source.interval_minutes = interval;
    }
    if input.category.is_some() {
        source.category = input.category;
    }
    to_data(&*source)
}

async fn delete_source(store: &MockStore, id: i64) -> HandlerResult {
    let mut state = store.write().await;
    let index = state
        .sources
        .iter()
        .position(|s| s.id == id)
        .ok_or_else(|| Reject::not_found("数据源不存在"))?;
    state.sources.remove(index);
    Ok(json!({"id": id}))
}

async fn toggle_source(store: &MockStore, id: i64) -> HandlerResult {
    let mut state = store.write().await;
    let source = find_source(&mut state, id)?;
    source.enabled = !source.enabled;
    to_data(&*source)
}

async fn test_source(store: &MockStore, id: i64) -> HandlerResult {
    let mut state = store.write().await;
    let item_count = state.documents.iter().filter(|d| d.source_id == Some(id)).count() as u64;
    let source = find_source(&mut state, id)?;
    let result = if source.url.starts_with("http://") || source.url.starts_with("https://") {
        source.last_error = None;
        SourceTestResult {
            ok: true,
            item_count,
            message: format!("连接成功，发现 {} 个条目", item_count),
        }
    } else {
        let message = "连接失败: 无效的URL".to_string();
        source.last_error = Some(message.clone());
        SourceTestResult {
            ok: false,
            item_count: 0,
            message,
        }
    };
    to_data(&result)
}

/// Pretend to crawl a source: one new pending document per run.
fn crawl(state: &mut MockState, id: i64) -> std::result::Result<CrawlResult, Reject> {
    let doc_id = state.next_document_id();
    let now = Utc::now();
    let source = find_source(state, id)?;
    if !source.enabled {
        return Err(Reject::bad_request("数据源已禁用"));
    }
    source.last_fetched_at = Some(now);
    source.document_count += 1;
    let doc = Document {
        id: doc_id,
        title: format!("{} 最新文章 #{}", source.name, source.document_count),
        content: None,
        summary: None,
        source_type: source.kind.into(),
        source_id: Some(source.id),
        source_name: Some(source.name.clone()),
        url: Some(format!("{}#item-{}", source.url, doc_id)),
        status: DocumentStatus::Pending,
        tags: source.category.iter().cloned().collect(),
        file_type: None,
        size: None,
        created_at: now,
        updated_at: None,
    };
    state.documents.push(doc);
    Ok(CrawlResult {
        source_id: id,
        fetched: 1,
        new_documents: 1,
        finished_at: now,
    })
}

async fn fetch_source(store: &MockStore, id: i64) -> HandlerResult {
    let result = crawl(&mut *store.write().await, id)?;
    to_data(&result)
}

fn overview(state: &MockState) -> AnalyticsOverview {
    let today = Utc::now().date_naive();
    let count_status = |s: DocumentStatus| state.documents.iter().filter(|d| d.status == s).count() as u64;
    let count_type = |t: SourceType| state.documents.iter().filter(|d| d.source_type == t).count() as u64;

    AnalyticsOverview {
        total_documents: state.documents.len() as u64,
        total_sources: state.sources.len() as u64,
        active_sources: state.sources.iter().filter(|s| s.enabled).count() as u64,
        documents_today: state
            .documents
            .iter()
            .filter(|d| d.created_at.date_naive() == today)
            .count() as u64,
        indexed_documents: count_status(DocumentStatus::Indexed),
        failed_documents: count_status(DocumentStatus::Failed),
        by_source_type: [SourceType::Rss, SourceType::Web, SourceType::Upload]
            .into_iter()
            .map(|t| CountBucket {
                label: t.as_str().to_string(),
                count: count_type(t),
            })
            .collect(),
        by_status: [
            DocumentStatus::Pending,
            DocumentStatus::Processing,
            DocumentStatus::Indexed,
            DocumentStatus::Failed,
        ]
        .into_iter()
        .map(|s| CountBucket {
            label: s.as_str().to_string(),
            count: count_status(s),
        })
        .collect(),
    }
}

async fn trends(store: &MockStore, request: &ApiRequest) -> HandlerResult {
    let days = parse_param::<i64>(request, "days")?.unwrap_or(7).clamp(1, 90);
    let today = Utc::now().date_naive();
    let state = store.read().await;
    let points: Vec<TrendPoint> = (0..days)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            TrendPoint {
                date,
                count: state
                    .documents
                    .iter()
                    .filter(|d| d.created_at.date_naive() == date)
                    .count() as u64,
            }
        })
        .collect();
    to_data(&points)
}

async fn keywords(store: &MockStore, request: &ApiRequest) -> HandlerResult {
    let limit: usize = parse_param(request, "limit")?.unwrap_or(10);
    let state = store.read().await;
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for tag in state.documents.iter().flat_map(|d| d.tags.iter()) {
        *counts.entry(tag.as_str()).or_insert(0) += 1;
    }
    let mut stats: Vec<KeywordStat> = counts
        .into_iter()
        .map(|(keyword, count)| KeywordStat {
            keyword: keyword.to_string(),
            count,
        })
        .collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.keyword.cmp(&b.keyword)));
    stats.truncate(limit);
    to_data(&stats)
}

fn scheduler_status(state: &MockState) -> SchedulerStatus {
    let now = Utc::now();
    SchedulerStatus {
        running: state.scheduler_running,
        jobs: state
            .sources
            .iter()
            .filter(|s| s.enabled)
            .map(|s| ScheduledJob {
                id: s.id,
                name: format!("fetch:{}", s.name),
                source_id: s.id,
                interval_minutes: s.interval_minutes,
                last_run: s.last_fetched_at,
                next_run: state
                    .scheduler_running
                    .then(|| s.last_fetched_at.unwrap_or(now) + Duration::minutes(i64::from(s.interval_minutes))),
            })
            .collect(),
    }
}

async fn set_scheduler(store: &MockStore, running: bool) -> HandlerResult {
    let mut state = store.write().await;
    state.scheduler_running = running;
    to_data(&scheduler_status(&state))
}

async fn run_job(store: &MockStore, id: i64) -> HandlerResult {
    let mut state = store.write().await;
    // Jobs exist only for enabled sources and share their ids.
    if !state.sources.iter().any(|s| s.id == id && s.enabled) {
        return Err(Reject::not_found("任务不存在"));
    }
    let result = crawl(&mut state, id)?;
    to_data(&result)
}
