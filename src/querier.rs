//! Service layer for querying and caching organization reports.
//!
//! This module implements `ReportQuerier`, which acts as the main entry point for retrieving
//! organization reports. It handles:
//! 1. Checking the in-memory cache for an existing report.
//! 2. Fetching and aggregating the organization from GitHub if the cache is empty.
//! 3. Proactively refreshing tracked organizations in the background.

use crate::aggregate::{self, AggregateResult};
use crate::config::AppConfig;
use crate::github::{self, GitHubOrg};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use moka::future::Cache;
use octocrab::Octocrab;
use std::time::Duration as StdDuration;

#[derive(Clone)]
pub struct ReportQuerier {
    cache: Cache<String, AggregateResult>,
    octocrab: Octocrab,
    config: AppConfig,
}

impl ReportQuerier {
    /// Initializes a new ReportQuerier.
    ///
    /// This sets up the Octocrab client and the in-memory cache. The background refresh task
    /// is started separately by [`ReportQuerier::start_background_refresh`].
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let octocrab = github::build_octocrab(config.github_token.as_deref())?;

        let cache = Cache::builder()
            .max_capacity(config.cache_max_capacity)
            .time_to_live(config.cache_ttl())
            .build();

        Ok(Self {
            cache,
            octocrab,
            config: config.clone(),
        })
    }

    /// Retrieves the report for an organization, aggregating it if not cached (read-through).
    pub async fn get(&self, org: &str) -> anyhow::Result<AggregateResult> {
        let key = cache_key(org);
        if let Some(report) = self.cache.get(&key).await {
            return Ok(report);
        }

        let report = self.fetch_and_aggregate(org).await?;

        self.cache.insert(key, report.clone()).await;

        Ok(report)
    }

    /// Starts a background task that periodically refreshes reports for tracked organizations.
    ///
    /// Does nothing when no organization is tracked.
    pub fn start_background_refresh(&self) {
        let orgs = self.config.refreshed_orgs();
        if orgs.is_empty() {
            return;
        }

        let querier = self.clone();
        let concurrency = self.config.tracked_orgs_concurrency_limit;
        // Refresh at half the TTL so tracked reports never expire.
        let period = StdDuration::from_secs((self.config.cache_ttl_seconds / 2).max(1));

        tokio::spawn(async move {
            tracing::info!("Starting background refresh task for tracked organizations");
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;
                tracing::info!("Refreshing tracked organizations...");

                stream::iter(&orgs)
                    .for_each_concurrent(Some(concurrency), |org| querier.refresh_org(org))
                    .await;

                tracing::info!("Finished refreshing tracked organizations");
            }
        });
    }

    /// Re-aggregates a single organization and updates the cache.
    async fn refresh_org(&self, org: &str) {
        match self.fetch_and_aggregate(org).await {
            Ok(report) => {
                self.cache.insert(cache_key(org), report).await;
                tracing::info!(org = %org, "Refreshed report");
            }
            Err(e) => {
                tracing::error!(org = %org, "Failed to refresh report: {:#}", e);
            }
        }
    }

    async fn fetch_and_aggregate(&self, org: &str) -> anyhow::Result<AggregateResult> {
        let github = GitHubOrg::new(
            self.octocrab.clone(),
            org,
            self.config.since(Utc::now()),
            self.config.max_github_api_pages,
        )?;

        aggregate::aggregate_organization(&github).await
    }
}

// GitHub logins are case-insensitive.
fn cache_key(org: &str) -> String {
    org.trim().to_ascii_lowercase()
}
