//! Blog Content Service
//!
//! CRUD and query surface over the post collection in
//! `<data>/blog/blog_posts.json`. Queries re-derive everything from a
//! fresh load on every call; there is no cached index, which trades a
//! little read cost for crash-consistency simplicity.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{BlogCategory, BlogPost};
use crate::store::DurableStore;

lazy_static! {
    static ref NON_SLUG_CHARS: Regex = Regex::new(r"[^a-z0-9\-]").unwrap();
    static ref REPEATED_HYPHENS: Regex = Regex::new(r"-+").unwrap();
}

/// Derive a URL-safe slug from a title.
///
/// Lowercase, spaces to hyphens, common punctuation stripped, `#` spelled
/// out as "sharp" (so "C# Basics" stays meaningful), then anything left
/// outside `[a-z0-9-]` removed and hyphen runs collapsed.
pub fn slugify(title: &str) -> String {
    let mut slug = title.to_lowercase().replace(' ', "-");
    slug.retain(|c| !matches!(c, '.' | ',' | '!' | '?' | '\'' | '"'));
    let slug = slug.replace('#', "sharp");
    let slug = NON_SLUG_CHARS.replace_all(&slug, "");
    let slug = REPEATED_HYPHENS.replace_all(&slug, "-");
    slug.trim_matches('-').to_string()
}

pub struct BlogService {
    posts: DurableStore,
    default_author: String,
    lock: Mutex<()>,
}

impl BlogService {
    pub fn new(data_dir: impl AsRef<Path>, default_author: impl Into<String>) -> Self {
        Self {
            posts: DurableStore::new(data_dir.as_ref().join("blog").join("blog_posts.json")),
            default_author: default_author.into(),
            lock: Mutex::new(()),
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a post and return its assigned id.
    ///
    /// Ids are max existing + 1 (1 when the collection is empty). Deleting
    /// the highest-id post and creating a new one therefore reuses that id;
    /// long-standing behavior the published URL structure depends on, so it
    /// stays.
    pub async fn create(&self, mut post: BlogPost) -> Result<u32> {
        let _guard = self.lock.lock().await;

        let mut posts = self.load_posts().await;
        post.id = posts.iter().map(|p| p.id).max().map_or(1, |max| max + 1);

        let now = Utc::now();
        post.publish_date = now;
        post.last_modified = Some(now);
        post.slug = slugify(&post.title);
        if post.author.trim().is_empty() {
            post.author = self.default_author.clone();
        }
        post.content = ammonia::clean(&post.content);

        let id = post.id;
        let title = post.title.clone();
        posts.push(post);
        self.posts.save(&posts).await?;

        tracing::info!("Created post {} ({})", id, title);
        Ok(id)
    }

    /// Replace an existing post. `Ok(false)` when the id is unknown.
    ///
    /// The original publish date and view count always survive the update,
    /// as does the author when the incoming one is blank. The slug is only
    /// regenerated when the incoming post carries none.
    pub async fn update(&self, mut post: BlogPost) -> Result<bool> {
        let _guard = self.lock.lock().await;

        let mut posts = self.load_posts().await;
        let Some(pos) = posts.iter().position(|p| p.id == post.id) else {
            tracing::warn!("Post {} not found for update", post.id);
            return Ok(false);
        };
        let existing = posts.remove(pos);

        post.publish_date = existing.publish_date;
        post.view_count = existing.view_count;
        if post.author.trim().is_empty() {
            post.author = existing.author;
        }
        if post.slug.is_empty() {
            post.slug = slugify(&post.title);
        }
        post.last_modified = Some(Utc::now());
        post.content = ammonia::clean(&post.content);

        let id = post.id;
        posts.push(post);
        self.posts.save(&posts).await?;

        tracing::info!("Updated post {}", id);
        Ok(true)
    }

    /// Remove a post. `Ok(false)` when the id is unknown.
    pub async fn delete(&self, id: u32) -> Result<bool> {
        let _guard = self.lock.lock().await;

        let mut posts = self.load_posts().await;
        let Some(pos) = posts.iter().position(|p| p.id == id) else {
            tracing::warn!("Post {} not found for deletion", id);
            return Ok(false);
        };
        posts.remove(pos);
        self.posts.save(&posts).await?;

        tracing::info!("Deleted post {}", id);
        Ok(true)
    }

    // ========================================================================
    // Queries (fresh load each call, explicit sort)
    // ========================================================================

    pub async fn get_all(&self) -> Vec<BlogPost> {
        let mut posts = self.load_posts().await;
        sort_newest_first(&mut posts);
        posts
    }

    pub async fn get_by_category(&self, category: &str) -> Vec<BlogPost> {
        let mut posts: Vec<BlogPost> = self
            .load_posts()
            .await
            .into_iter()
            .filter(|p| p.category.eq_ignore_ascii_case(category))
            .collect();
        sort_newest_first(&mut posts);
        posts
    }

    /// Case-insensitive substring search across title, content, summary,
    /// tags, and category. A blank query behaves like `get_all`.
    pub async fn search(&self, query: &str) -> Vec<BlogPost> {
        if query.trim().is_empty() {
            return self.get_all().await;
        }

        let needle = query.to_lowercase();
        let mut posts: Vec<BlogPost> = self
            .load_posts()
            .await
            .into_iter()
            .filter(|p| {
                p.title.to_lowercase().contains(&needle)
                    || p.content.to_lowercase().contains(&needle)
                    || p.summary.to_lowercase().contains(&needle)
                    || p.tags.iter().any(|t| t.to_lowercase().contains(&needle))
                    || p.category.to_lowercase().contains(&needle)
            })
            .collect();
        sort_newest_first(&mut posts);
        posts
    }

    pub async fn get_by_id(&self, id: u32) -> Option<BlogPost> {
        self.load_posts().await.into_iter().find(|p| p.id == id)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Option<BlogPost> {
        self.load_posts()
            .await
            .into_iter()
            .find(|p| p.slug.eq_ignore_ascii_case(slug))
    }

    pub async fn get_latest(&self, count: usize) -> Vec<BlogPost> {
        let mut posts = self.get_all().await;
        posts.truncate(count);
        posts
    }

    pub async fn get_featured(&self) -> Vec<BlogPost> {
        let mut posts: Vec<BlogPost> = self
            .load_posts()
            .await
            .into_iter()
            .filter(|p| p.is_featured)
            .collect();
        sort_newest_first(&mut posts);
        posts
    }

    /// Distinct non-empty category names, case-preserving, alphabetical.
    pub async fn get_all_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .load_posts()
            .await
            .into_iter()
            .map(|p| p.category)
            .filter(|c| !c.is_empty())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    /// Distinct tags across all posts, alphabetical.
    pub async fn get_all_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .load_posts()
            .await
            .into_iter()
            .flat_map(|p| p.tags)
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }

    /// Category index with per-category post counts, alphabetical.
    pub async fn get_categories_with_counts(&self) -> Vec<BlogCategory> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for post in self.load_posts().await {
            if !post.category.is_empty() {
                *counts.entry(post.category).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .map(|(name, post_count)| BlogCategory { name, post_count })
            .collect()
    }

    async fn load_posts(&self) -> Vec<BlogPost> {
        self.posts.load().await.unwrap_or_default()
    }
}

/// All list reads sort by publish date, newest first; ties break on id so
/// ordering is stable.
fn sort_newest_first(posts: &mut [BlogPost]) {
    posts.sort_by(|a, b| {
        b.publish_date
            .cmp(&a.publish_date)
            .then(b.id.cmp(&a.id))
    });
}
