//! Terminal rendering. `--json` prints the raw `data` instead.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use kb_client::DashboardSnapshot;
use kb_core::{
    AnalyticsOverview, ChatReply, ClusterAnalysis, CrawlResult, Document, KeywordStat, SchedulerStatus, SearchResponse,
    Source, SourceTestResult, TrendPoint, User,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    /// JSON when asked for, otherwise the human renderer.
    pub fn emit<T: Serialize + ?Sized>(&self, value: &T, human: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }

    pub fn message(&self, text: &str) {
        if !self.json {
            println!("{}", text);
        }
    }
}

fn when(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn when_opt(ts: &Option<DateTime<Utc>>) -> String {
    ts.as_ref().map(when).unwrap_or_else(|| "-".to_string())
}

fn clip(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

pub fn user(user: &User) {
    println!("👤 {} <{}>  role: {}  id: {}", user.username, user.email, user.role, user.id);
}

pub fn documents(docs: &[Document]) {
    if docs.is_empty() {
        println!("No documents.");
        return;
    }
    println!("{:>5}  {:<10}  {:<7}  {:<16}  TITLE", "ID", "STATUS", "TYPE", "CREATED");
    for doc in docs {
        println!(
            "{:>5}  {:<10}  {:<7}  {:<16}  {}",
            doc.id,
            doc.status.as_str(),
            doc.source_type.as_str(),
            when(&doc.created_at),
            clip(&doc.title, 60)
        );
    }
}

pub fn document(doc: &Document) {
    println!("📄 #{} {}", doc.id, doc.title);
    println!("   status: {}  type: {}", doc.status.as_str(), doc.source_type.as_str());
    if let Some(name) = &doc.source_name {
        println!("   source: {}", name);
    }
    if let Some(url) = &doc.url {
        println!("   url: {}", url);
    }
    if !doc.tags.is_empty() {
        println!("   tags: {}", doc.tags.join(", "));
    }
    println!("   created: {}  updated: {}", when(&doc.created_at), when_opt(&doc.updated_at));
    if let Some(summary) = doc.summary.as_deref().or(doc.content.as_deref()) {
        println!();
        println!("{}", clip(summary, 400));
    }
}

pub fn sources(sources: &[Source]) {
    if sources.is_empty() {
        println!("No sources.");
        return;
    }
    println!("{:>4}  {:<3}  {:<4}  {:>6}  {:>5}  {:<16}  NAME", "ID", "ON", "KIND", "EVERY", "DOCS", "LAST FETCH");
    for s in sources {
        println!(
            "{:>4}  {:<3}  {:<4}  {:>5}m  {:>5}  {:<16}  {}",
            s.id,
            if s.enabled { "✓" } else { "✗" },
            serde_json::to_value(s.kind).ok().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default(),
            s.interval_minutes,
            s.document_count,
            when_opt(&s.last_fetched_at),
            s.name
        );
    }
}

pub fn source(s: &Source) {
    println!(
        "🔗 #{} {} ({}) {}",
        s.id,
        s.name,
        s.url,
        if s.enabled { "enabled" } else { "disabled" }
    );
}

pub fn source_test(result: &SourceTestResult) {
    let icon = if result.ok { "✅" } else { "❌" };
    println!("{} {}", icon, result.message);
}

pub fn crawl(result: &CrawlResult) {
    println!(
        "🦗 Source #{}: fetched {}, {} new document(s) at {}",
        result.source_id,
        result.fetched,
        result.new_documents,
        when(&result.finished_at)
    );
}

pub fn search(result: &SearchResponse) {
    println!("🔍 {} result(s) for \"{}\" in {}ms", result.total, result.query, result.took_ms);
    for hit in &result.results {
        println!("  [{:.2}] #{} {}", hit.score, hit.document_id, hit.title);
        if !hit.snippet.is_empty() {
            println!("         {}", clip(&hit.snippet, 100));
        }
    }
}

pub fn chat(reply: &ChatReply) {
    println!("{}", reply.answer);
    if !reply.sources.is_empty() {
        println!();
        println!("Sources:");
        for hit in &reply.sources {
            println!("  #{} {}", hit.document_id, hit.title);
        }
    }
    println!("(conversation {})", reply.conversation_id);
}

pub fn overview(o: &AnalyticsOverview) {
    println!("📊 Documents: {} total, {} today", o.total_documents, o.documents_today);
    println!("   Indexed: {}  Failed: {}", o.indexed_documents, o.failed_documents);
    println!("   Sources: {} ({} active)", o.total_sources, o.active_sources);
    let buckets = |label: &str, buckets: &[kb_core::CountBucket]| {
        let parts: Vec<String> = buckets.iter().map(|b| format!("{}={}", b.label, b.count)).collect();
        println!("   {}: {}", label, parts.join("  "));
    };
    buckets("By type", &o.by_source_type);
    buckets("By status", &o.by_status);
}

pub fn trends(points: &[TrendPoint]) {
    let max = points.iter().map(|p| p.count).max().unwrap_or(0).max(1);
    for p in points {
        let bar = "█".repeat(((p.count * 30) / max) as usize);
        println!("{}  {:>4}  {}", p.date, p.count, bar);
    }
}

pub fn keywords(stats: &[KeywordStat]) {
    for (i, k) in stats.iter().enumerate() {
        println!("{:>3}. {:<20} {}", i + 1, k.keyword, k.count);
    }
}

pub fn clusters(analysis: &ClusterAnalysis) {
    println!("🧩 {} cluster(s), generated {}", analysis.clusters.len(), when(&analysis.generated_at));
    for c in &analysis.clusters {
        println!("  #{} {} ({} docs): {}", c.id, c.label, c.size, c.keywords.join(", "));
    }
}

pub fn scheduler(status: &SchedulerStatus) {
    println!("⏰ Scheduler is {}", if status.running { "running" } else { "stopped" });
    for job in &status.jobs {
        println!(
            "  #{} {:<30} every {}m  last: {}  next: {}",
            job.id,
            job.name,
            job.interval_minutes,
            when_opt(&job.last_run),
            when_opt(&job.next_run)
        );
    }
}

pub fn snapshot(s: &DashboardSnapshot) {
    println!("──── Dashboard {} ────", when(&s.taken_at));
    overview(&s.overview);
    println!();
    println!("Recent documents:");
    documents(&s.recent_documents);
    println!();
    scheduler(&s.scheduler);
}
