//! Application configuration and environment variable parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs the activity window, GitHub pagination
//! limits, report cache TTLs, and the organizations refreshed in the background.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::time::Duration as StdDuration;

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Hard limit on the number of paginated GraphQL requests per connection
    /// (repositories of an org, issues of a repo, pull requests of a repo).
    pub max_github_api_pages: u32,

    /// Time to live for cached organization reports in seconds.
    pub cache_ttl_seconds: u64,

    /// Maximum number of organization reports to keep in the cache.
    pub cache_max_capacity: u64,

    /// Size of the activity window, in days back from now. Defaults to 7.
    #[serde(default = "default_activity_days")]
    pub activity_days: i64,

    /// Organizations whose reports are refreshed in the background.
    /// Expected format: comma-separated list of organization logins.
    /// Example: "rust-lang,tokio-rs"
    #[serde(default, deserialize_with = "deserialize_org_list")]
    pub tracked_orgs: Vec<String>,

    /// Maximum number of organizations refreshed concurrently. Defaults to 4.
    #[serde(default = "default_concurrency_limit")]
    pub tracked_orgs_concurrency_limit: usize,

    /// Organization served by `/api/report`.
    pub github_org_name: Option<String>,

    /// Optional GitHub Personal Access Token. The GraphQL API rejects anonymous requests.
    pub github_token: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_activity_days() -> i64 {
    7
}

fn default_concurrency_limit() -> usize {
    4
}

fn default_port() -> u16 {
    3000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn cache_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.cache_ttl_seconds)
    }

    /// Start of the activity window relative to `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.activity_days)
    }

    /// Tracked organizations plus the default one, without duplicates.
    pub fn refreshed_orgs(&self) -> Vec<String> {
        let mut orgs = self.tracked_orgs.clone();
        if let Some(default_org) = &self.github_org_name {
            if !orgs.iter().any(|org| org.eq_ignore_ascii_case(default_org)) {
                orgs.push(default_org.clone());
            }
        }
        orgs
    }
}

fn deserialize_org_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(parse_org_list(&s))
}

fn parse_org_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|org| !org.is_empty() && !org.contains('/'))
        .map(str::to_string)
        .collect()
}
