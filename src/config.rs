//! Application configuration, loaded from environment variables at startup.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for all persisted state. Each service keeps its own
    /// subdirectory (`secure/`, `blog/`, `analytics/`) underneath it.
    pub data_dir: PathBuf,
    /// Author name stamped on blog posts created without one.
    pub default_author: String,
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("app_data")),
            default_author: std::env::var("DEFAULT_AUTHOR")
                .unwrap_or_else(|_| "Admin".to_string()),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
        }
    }
}

impl Config {
    /// Load configuration, reading a `.env` file first when one is present.
    /// Skipped under test so tests stay hermetic.
    pub fn from_env() -> Self {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::default()
    }
}
