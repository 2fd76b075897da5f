//! Record types persisted by the services, plus the derived views the
//! dashboard and blog index are built from. Field names serialize in
//! camelCase to match the site's existing data files and admin frontend.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Admin identity
// ============================================================================

/// The one credential record per deployment. Created by initialization,
/// mutated by password reset / info update, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCredentials {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub email: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub is_initialized: bool,
}

/// Bearer session minted on login. A username holds at most one live
/// session; issuing a new one evicts the old.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub session_token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Short-lived, single-use credential authorizing exactly one password
/// change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetToken {
    pub reset_token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Blog content
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    /// Unique, immutable after creation. Assigned as max existing id + 1.
    pub id: u32,
    pub title: String,
    /// URL-safe identifier derived from the title; never regenerated once
    /// set.
    pub slug: String,
    pub summary: String,
    /// Rich HTML body, sanitized before persisting.
    pub content: String,
    /// Immutable after creation; preserved across updates.
    pub publish_date: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
    pub author: String,
    pub category: String,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub featured_image: String,
    pub view_count: u32,
    pub is_published: bool,
}

/// Derived category view: not persisted, recomputed from the post
/// collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogCategory {
    pub name: String,
    pub post_count: usize,
}

// ============================================================================
// Visitor analytics
// ============================================================================

/// Append-only visit log entry; never mutated after creation, pruned by the
/// retention window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorEntry {
    pub session_id: String,
    pub ip_address: String,
    pub user_agent: String,
    pub page_visited: String,
    pub referrer: String,
    pub visit_time: DateTime<Utc>,
    pub country: String,
    pub city: String,
    pub browser: String,
    pub operating_system: String,
    pub device_type: String,
}

/// One row per calendar date, updated incrementally on every visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_visits: u32,
    pub unique_visitors: u32,
    pub page_views: u32,
    pub average_session_duration: f64,
    pub bounce_rate: f64,
}

impl DailyStats {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total_visits: 0,
            unique_visitors: 0,
            page_views: 0,
            average_session_duration: 0.0,
            bounce_rate: 0.0,
        }
    }
}

/// The whole analytics document: raw visit log plus the per-day rollup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorStats {
    pub visits: Vec<VisitorEntry>,
    pub daily_stats: Vec<DailyStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewStats {
    pub page_name: String,
    pub views: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserStats {
    pub browser_name: String,
    pub count: usize,
    pub percentage: f64,
}

/// Everything the admin dashboard view renders, recomputed from a fresh
/// load on every call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub today_visitors: usize,
    pub total_visitors: usize,
    pub this_week_visitors: usize,
    pub this_month_visitors: usize,
    pub top_pages: Vec<PageViewStats>,
    pub browser_stats: Vec<BrowserStats>,
    pub last_30_days: Vec<DailyStats>,
    pub recent_visitors: Vec<VisitorEntry>,
}
