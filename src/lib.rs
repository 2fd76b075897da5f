//! Portfolio Core - file-backed persistence and security layer
//!
//! The shared core behind a personal portfolio site's back-office: admin
//! identity/sessions/password resets, the blog post collection, and visitor
//! analytics. All three services follow the same pattern: load the whole
//! collection from a single structured file, mutate it under a per-service
//! lock, and save it back with an atomic temp-write + rename.
//!
//! HTTP routing, templating, and static file serving live in the host
//! application; this crate only exposes the services, the durable store,
//! the notification port, and the tracking-exclusion helper the boundary
//! layer needs.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod store;

use crate::config::Config;
use crate::services::admin::AdminService;
use crate::services::blog::BlogService;
use crate::services::visitor::VisitorTrackingService;

/// The three persistence services, wired to one data directory.
///
/// Construct once at startup and share across request handlers; each service
/// owns the lock for its own backing file(s).
pub struct Services {
    pub admin: AdminService,
    pub blog: BlogService,
    pub visitors: VisitorTrackingService,
}

impl Services {
    pub fn from_config(config: &Config) -> Self {
        Self {
            admin: AdminService::new(&config.data_dir),
            blog: BlogService::new(&config.data_dir, &config.default_author),
            visitors: VisitorTrackingService::new(&config.data_dir),
        }
    }
}
