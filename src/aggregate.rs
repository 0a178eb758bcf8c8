//! Organization-wide aggregation.
//!
//! [`Aggregator`] threads the issue, pull request and contributor accumulators through one
//! repository at a time and derives the averages once at the end. [`aggregate_organization`]
//! drives it from the GitHub client.

use crate::contributors::{self, Contributors, LocationHistogram};
use crate::github::{GitHubOrg, GraphQlClient};
use crate::metrics::{self, IssueMetrics, IssueSummary, PrMetrics, PullRequestSummary};
use crate::types::{Issue, OrgRepositories, PullRequest, Repository};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContributorSummary {
    pub locations: LocationHistogram,
    pub participants: Contributors,
    pub unique_participant_count: usize,
}

/// Snapshot of one aggregation pass over an organization.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregateResult {
    pub org: String,
    pub since: DateTime<Utc>,
    pub total_stars: u64,
    pub total_forks: u64,
    /// Every repository of the organization, active or not.
    pub repo_count: usize,
    pub active_repo_count: usize,
    pub active_repos: Vec<Repository>,
    pub issues: IssueSummary,
    pub pull_requests: PullRequestSummary,
    pub contributors: ContributorSummary,
}

/// Accumulators for one pass. Repositories must be added one after another.
#[derive(Clone, Debug, Default)]
pub struct Aggregator {
    total_stars: u64,
    total_forks: u64,
    issues: IssueMetrics,
    pull_requests: PrMetrics,
    locations: LocationHistogram,
    contributors: Contributors,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_repository(&mut self, repo: &Repository, issues: &[Issue], prs: &[PullRequest]) {
        self.total_stars += repo.stargazer_count;
        self.total_forks += repo.fork_count;

        self.issues = metrics::fold_issues(issues, self.issues);
        self.pull_requests = metrics::fold_pull_requests(prs, self.pull_requests);

        let (locations, contributors) = contributors::fold_contributors(
            prs,
            std::mem::take(&mut self.locations),
            std::mem::take(&mut self.contributors),
        );
        self.locations = locations;
        self.contributors = contributors;
    }

    pub fn finish(self, org: &str, since: DateTime<Utc>, repos: OrgRepositories) -> AggregateResult {
        AggregateResult {
            org: org.to_string(),
            since,
            total_stars: self.total_stars,
            total_forks: self.total_forks,
            repo_count: repos.total_repos,
            active_repo_count: repos.active_repos.len(),
            active_repos: repos.active_repos,
            issues: self.issues.into(),
            pull_requests: self.pull_requests.into(),
            contributors: ContributorSummary {
                unique_participant_count: self.contributors.len(),
                locations: self.locations,
                participants: self.contributors,
            },
        }
    }
}

/// Fetches and folds every active repository of the organization, one at a time.
///
/// Failing to list the repositories fails the pass. A repository whose issues or pull
/// requests cannot be fetched is logged and contributes an empty page instead.
pub async fn aggregate_organization<C: GraphQlClient>(
    github: &GitHubOrg<C>,
) -> anyhow::Result<AggregateResult> {
    let repos = github.fetch_organization_repos().await?;
    let mut aggregator = Aggregator::new();

    for repo in &repos.active_repos {
        let issues = github
            .fetch_repo_issues(&repo.name)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(org = %github.org(), repo = %repo.name, "Failed to fetch issues: {:#}", e);
                Vec::new()
            });
        let prs = github
            .fetch_repo_pull_requests(&repo.name)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(org = %github.org(), repo = %repo.name, "Failed to fetch pull requests: {:#}", e);
                Vec::new()
            });

        aggregator.add_repository(repo, &issues, &prs);
    }

    let result = aggregator.finish(github.org(), github.since(), repos);
    tracing::info!(
        org = %result.org,
        active_repos = result.active_repo_count,
        contributors = result.contributors.unique_participant_count,
        "Aggregated organization"
    );

    Ok(result)
}
