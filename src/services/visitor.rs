//! Visitor Tracking Service
//!
//! Ingests page views into the visit log in
//! `<data>/analytics/visitor_stats.json`, keeps the per-day rollup current,
//! and answers the admin dashboard queries. Tracking is best-effort: the
//! boundary layer calls `track_visit` fire-and-forget and only logs a
//! failure, never failing the page request itself.

use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    BrowserStats, DailyStats, DashboardData, PageViewStats, VisitorEntry, VisitorStats,
};
use crate::store::DurableStore;

/// Raw visit records and daily rollups older than this are discarded.
const RETENTION_DAYS: i64 = 90;

const RECENT_VISITORS_ON_DASHBOARD: usize = 20;
const TOP_PAGES: usize = 10;
const TOP_BROWSERS: usize = 5;

// ============================================================================
// Request context
// ============================================================================

/// What the tracking interceptor extracts from an inbound request. Stands
/// in for the HTTP request so the service has no web-framework dependency.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub session_id: Option<String>,
    /// Transport-layer peer address.
    pub remote_addr: Option<String>,
    /// Raw `X-Forwarded-For` header value, if present.
    pub forwarded_for: Option<String>,
    pub user_agent: String,
    pub referrer: String,
}

impl RequestContext {
    /// Prefer the first forwarded-for entry (the original client when the
    /// site sits behind a proxy), then the remote address.
    pub fn client_ip(&self) -> String {
        if let Some(forwarded) = &self.forwarded_for {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
        self.remote_addr
            .clone()
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

// ============================================================================
// User-agent classification
// ============================================================================

// Ordered most-specific first; the first matching substring wins.
// Edge agents also contain "Chrome", so "Edg" must come first.
const BROWSER_RULES: &[(&str, &str)] = &[
    ("Edg", "Edge"),
    ("Chrome", "Chrome"),
    ("Firefox", "Firefox"),
    ("Safari", "Safari"),
    ("Opera", "Opera"),
    ("OPR", "Opera"),
    ("MSIE", "Internet Explorer"),
    ("Trident", "Internet Explorer"),
];

// Android agents also contain "Linux", and iPhone/iPad agents also contain
// "Mac OS X"; both must match before their generic cousins.
const OS_RULES: &[(&str, &str)] = &[
    ("Windows NT 10", "Windows 10/11"),
    ("Windows", "Windows"),
    ("Android", "Android"),
    ("iPhone", "iOS"),
    ("iPad", "iOS"),
    ("iOS", "iOS"),
    ("Mac OS X", "macOS"),
    ("Linux", "Linux"),
];

fn classify(user_agent: &str, rules: &[(&str, &'static str)]) -> &'static str {
    if user_agent.is_empty() {
        return "Unknown";
    }
    rules
        .iter()
        .find(|(needle, _)| user_agent.contains(needle))
        .map(|(_, name)| *name)
        .unwrap_or("Other")
}

pub fn parse_browser(user_agent: &str) -> &'static str {
    classify(user_agent, BROWSER_RULES)
}

pub fn parse_os(user_agent: &str) -> &'static str {
    classify(user_agent, OS_RULES)
}

pub fn parse_device_type(user_agent: &str) -> &'static str {
    if user_agent.is_empty() {
        "Unknown"
    } else if user_agent.contains("Mobile")
        || (user_agent.contains("Android") && !user_agent.contains("Tablet"))
    {
        "Mobile"
    } else if user_agent.contains("Tablet") || user_agent.contains("iPad") {
        "Tablet"
    } else {
        "Desktop"
    }
}

// ============================================================================
// Boundary filter
// ============================================================================

const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".woff2", ".ttf",
    ".eot", ".map", ".json",
];

const EXCLUDED_PREFIXES: &[&str] = &[
    "/api/", "/admin/", "/_", "/lib/", "/css/", "/js/", "/images/", "/fonts/",
];

/// Whether a request path counts as a real page view. The tracking
/// interceptor applies this before calling `track_visit`; static assets and
/// admin/API traffic are never tracked.
pub fn should_track(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    let lowered = path.to_lowercase();
    if EXCLUDED_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext)) {
        return false;
    }
    !EXCLUDED_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

// ============================================================================
// Service
// ============================================================================

pub struct VisitorTrackingService {
    stats: DurableStore,
    lock: Mutex<()>,
}

impl VisitorTrackingService {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            stats: DurableStore::new(
                data_dir.as_ref().join("analytics").join("visitor_stats.json"),
            ),
            lock: Mutex::new(()),
        }
    }

    /// Record one page view: append to the visit log, roll today's daily
    /// row forward, and prune everything past the retention window.
    pub async fn track_visit(&self, ctx: &RequestContext, page: &str) -> Result<()> {
        let now = Utc::now();
        let entry = VisitorEntry {
            session_id: ctx
                .session_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            ip_address: ctx.client_ip(),
            user_agent: ctx.user_agent.clone(),
            page_visited: page.to_string(),
            referrer: ctx.referrer.clone(),
            visit_time: now,
            country: String::new(),
            city: String::new(),
            browser: parse_browser(&ctx.user_agent).to_string(),
            operating_system: parse_os(&ctx.user_agent).to_string(),
            device_type: parse_device_type(&ctx.user_agent).to_string(),
        };

        let _guard = self.lock.lock().await;

        let mut stats: VisitorStats = self.stats.load().await.unwrap_or_default();
        stats.visits.push(entry);

        let today = now.date_naive();
        if !stats.daily_stats.iter().any(|d| d.date == today) {
            stats.daily_stats.push(DailyStats::new(today));
        }
        let unique_today = stats
            .visits
            .iter()
            .filter(|v| v.visit_time.date_naive() == today)
            .map(|v| v.ip_address.as_str())
            .collect::<HashSet<_>>()
            .len() as u32;
        if let Some(day) = stats.daily_stats.iter_mut().find(|d| d.date == today) {
            day.total_visits += 1;
            day.page_views += 1;
            day.unique_visitors = unique_today;
        }

        let cutoff = now - Duration::days(RETENTION_DAYS);
        stats.visits.retain(|v| v.visit_time >= cutoff);
        let cutoff_date = cutoff.date_naive();
        stats.daily_stats.retain(|d| d.date >= cutoff_date);

        self.stats.save(&stats).await?;
        Ok(())
    }

    /// Recompute the whole dashboard view from a fresh load.
    pub async fn get_dashboard_data(&self) -> DashboardData {
        let stats = self.load_stats().await;
        let today = Utc::now().date_naive();
        let week_ago = today - Duration::days(7);
        let month_ago = today - Duration::days(30);

        let distinct_ips = |from_inclusive: Option<chrono::NaiveDate>| -> usize {
            stats
                .visits
                .iter()
                .filter(|v| match from_inclusive {
                    Some(from) => v.visit_time.date_naive() >= from,
                    None => true,
                })
                .map(|v| v.ip_address.as_str())
                .collect::<HashSet<_>>()
                .len()
        };

        let mut last_30_days: Vec<DailyStats> = stats
            .daily_stats
            .iter()
            .filter(|d| d.date >= month_ago)
            .cloned()
            .collect();
        last_30_days.sort_by_key(|d| d.date);

        let mut recent_visitors = stats.visits.clone();
        recent_visitors.sort_by(|a, b| b.visit_time.cmp(&a.visit_time));
        recent_visitors.truncate(RECENT_VISITORS_ON_DASHBOARD);

        let total_views = stats.visits.len();
        let top_pages = top_counts(stats.visits.iter().map(|v| v.page_visited.as_str()), TOP_PAGES)
            .into_iter()
            .map(|(page_name, views)| PageViewStats {
                page_name,
                percentage: percentage_of(views, total_views),
                views,
            })
            .collect();
        let browser_stats =
            top_counts(stats.visits.iter().map(|v| v.browser.as_str()), TOP_BROWSERS)
                .into_iter()
                .map(|(browser_name, count)| BrowserStats {
                    browser_name,
                    percentage: percentage_of(count, total_views),
                    count,
                })
                .collect();

        DashboardData {
            today_visitors: distinct_ips(Some(today)),
            total_visitors: distinct_ips(None),
            this_week_visitors: distinct_ips(Some(week_ago)),
            this_month_visitors: distinct_ips(Some(month_ago)),
            top_pages,
            browser_stats,
            last_30_days,
            recent_visitors,
        }
    }

    pub async fn get_recent_visitors(&self, count: usize) -> Vec<VisitorEntry> {
        let mut visits = self.load_stats().await.visits;
        visits.sort_by(|a, b| b.visit_time.cmp(&a.visit_time));
        visits.truncate(count);
        visits
    }

    pub async fn get_all_stats(&self) -> VisitorStats {
        self.load_stats().await
    }

    async fn load_stats(&self) -> VisitorStats {
        self.stats.load().await.unwrap_or_default()
    }
}

/// Group by key, count, and return the `limit` largest groups. Ties break
/// alphabetically so output is deterministic.
fn top_counts<'a>(keys: impl Iterator<Item = &'a str>, limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut groups: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    groups.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    groups.truncate(limit);
    groups
}

/// Share of `total`, rounded to one decimal; 0 when the total is 0.
fn percentage_of(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 1000.0).round() / 10.0
}
