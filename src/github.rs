//! Paginated GraphQL access to an organization's repositories, issues and pull requests.
//!
//! [`GitHubOrg`] owns the queries and the cursor walk; the actual HTTP round trip goes through
//! the [`GraphQlClient`] seam so the paging and validation logic can be driven without a network.

use crate::types::{Issue, OrgRepositories, PullRequest, Repository};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;

const REPOSITORY_PAGE_SIZE: u32 = 10;
const NODE_PAGE_SIZE: u32 = 100;

const ORGANIZATION_REPOSITORIES_QUERY: &str = r#"
query ($org: String!, $first: Int!, $cursor: String) {
  organization(login: $org) {
    repositories(first: $first, after: $cursor) {
      nodes {
        name
        description
        url
        stargazerCount
        forkCount
        pushedAt
      }
      pageInfo {
        hasNextPage
        endCursor
      }
    }
  }
}
"#;

const REPOSITORY_ISSUES_QUERY: &str = r#"
query ($org: String!, $repoName: String!, $since: DateTime!, $first: Int!, $cursor: String) {
  repository(owner: $org, name: $repoName) {
    issues(first: $first, after: $cursor, orderBy: {field: UPDATED_AT, direction: DESC}, filterBy: {since: $since}) {
      nodes {
        state
        createdAt
        closedAt
        comments {
          totalCount
        }
      }
      pageInfo {
        hasNextPage
        endCursor
      }
    }
  }
}
"#;

const REPOSITORY_PULL_REQUESTS_QUERY: &str = r#"
query ($org: String!, $repoName: String!, $first: Int!, $cursor: String) {
  repository(owner: $org, name: $repoName) {
    pullRequests(first: $first, after: $cursor, orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes {
        state
        createdAt
        updatedAt
        mergedAt
        merged
        comments {
          totalCount
        }
        author {
          login
        }
        participants(first: 100) {
          totalCount
          nodes {
            login
            location
          }
        }
        files(first: 100) {
          totalCount
          nodes {
            additions
            deletions
          }
        }
      }
      pageInfo {
        hasNextPage
        endCursor
      }
    }
  }
}
"#;

/// Executes one GraphQL payload and returns the raw response body.
pub trait GraphQlClient: Send + Sync {
    fn execute(&self, payload: Value) -> impl Future<Output = Result<Value>> + Send;
}

impl GraphQlClient for Octocrab {
    async fn execute(&self, payload: Value) -> Result<Value> {
        Ok(self.graphql(&payload).await?)
    }
}

/// Builds the production client, authenticated when a token is configured.
pub fn build_octocrab(token: Option<&str>) -> Result<Octocrab> {
    let mut builder = Octocrab::builder();
    if let Some(token) = token {
        builder = builder.personal_token(token.to_string());
    }
    Ok(builder.build()?)
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    nodes: Vec<T>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct OrganizationData {
    organization: Option<RepositoriesField>,
}

#[derive(Debug, Deserialize)]
struct RepositoriesField {
    repositories: Connection<Repository>,
}

#[derive(Debug, Deserialize)]
struct RepositoryData<T> {
    repository: Option<T>,
}

#[derive(Debug, Deserialize)]
struct IssuesField {
    issues: Connection<Issue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestsField {
    pull_requests: Connection<PullRequest>,
}

/// GraphQL queries scoped to one organization and one activity window.
pub struct GitHubOrg<C> {
    client: C,
    org: String,
    since: DateTime<Utc>,
    max_pages: u32,
}

impl<C: GraphQlClient> GitHubOrg<C> {
    pub fn new(client: C, org: &str, since: DateTime<Utc>, max_pages: u32) -> Result<Self> {
        Ok(Self {
            client,
            org: sanitize_name(org, "organization")?,
            since,
            max_pages,
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Lists every repository of the organization and picks out the ones pushed to since the
    /// start of the activity window.
    pub async fn fetch_organization_repos(&self) -> Result<OrgRepositories> {
        tracing::info!(org = %self.org, "Fetching repositories");

        let variables = json!({ "org": self.org, "first": REPOSITORY_PAGE_SIZE });
        let repos = self
            .paginate(
                "organization repositories",
                ORGANIZATION_REPOSITORIES_QUERY,
                variables,
                |data: OrganizationData| {
                    data.organization
                        .map(|org| org.repositories)
                        .context("organization not found")
                },
            )
            .await?;

        let total_repos = repos.len();
        let active_repos: Vec<Repository> = repos
            .into_iter()
            .filter(|repo| repo.is_active_since(self.since))
            .collect();

        tracing::info!(
            org = %self.org,
            total = total_repos,
            active = active_repos.len(),
            "Fetched repositories"
        );

        Ok(OrgRepositories {
            total_repos,
            active_repos,
        })
    }

    /// Issues updated since the start of the activity window.
    pub async fn fetch_repo_issues(&self, repo_name: &str) -> Result<Vec<Issue>> {
        let repo_name = sanitize_name(repo_name, "repository")?;
        tracing::info!(org = %self.org, repo = %repo_name, "Fetching issues");

        let variables = json!({
            "org": self.org,
            "repoName": repo_name,
            "since": self.since.to_rfc3339_opts(SecondsFormat::Millis, true),
            "first": NODE_PAGE_SIZE,
        });
        let issues = self
            .paginate(
                "repository issues",
                REPOSITORY_ISSUES_QUERY,
                variables,
                |data: RepositoryData<IssuesField>| {
                    data.repository
                        .map(|repo| repo.issues)
                        .context("repository not found")
                },
            )
            .await?;

        tracing::info!(org = %self.org, repo = %repo_name, count = issues.len(), "Fetched issues");
        Ok(issues)
    }

    /// Pull requests created or updated since the start of the activity window.
    pub async fn fetch_repo_pull_requests(&self, repo_name: &str) -> Result<Vec<PullRequest>> {
        let repo_name = sanitize_name(repo_name, "repository")?;
        tracing::info!(org = %self.org, repo = %repo_name, "Fetching pull requests");

        let variables = json!({
            "org": self.org,
            "repoName": repo_name,
            "first": NODE_PAGE_SIZE,
        });
        let mut prs = self
            .paginate(
                "repository pull requests",
                REPOSITORY_PULL_REQUESTS_QUERY,
                variables,
                |data: RepositoryData<PullRequestsField>| {
                    data.repository
                        .map(|repo| repo.pull_requests)
                        .context("repository not found")
                },
            )
            .await?;

        prs.retain(|pr| pr.is_active_since(self.since));

        let truncated = prs.iter().filter(|pr| pr.has_truncated_connections()).count();
        if truncated > 0 {
            tracing::warn!(
                org = %self.org,
                repo = %repo_name,
                truncated,
                "Participants or changed files exceed 100 on some pull requests; contributor figures are partial"
            );
        }

        tracing::info!(org = %self.org, repo = %repo_name, count = prs.len(), "Fetched pull requests");
        Ok(prs)
    }

    /// Walks the `after` cursor until the connection is exhausted or `max_pages` is reached.
    async fn paginate<D, N>(
        &self,
        label: &str,
        query: &str,
        mut variables: Value,
        extract: impl Fn(D) -> Result<Connection<N>>,
    ) -> Result<Vec<N>>
    where
        D: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_count = 0;

        loop {
            variables["cursor"] = json!(cursor);
            let body = self
                .client
                .execute(json!({ "query": query, "variables": variables }))
                .await
                .with_context(|| format!("{label} request failed"))?;

            let data = decode_response::<D>(body).with_context(|| format!("invalid {label} response"))?;
            let connection = extract(data).with_context(|| format!("invalid {label} response"))?;

            items.extend(connection.nodes);
            page_count += 1;

            if !connection.page_info.has_next_page {
                break;
            }

            if page_count >= self.max_pages {
                tracing::warn!(
                    "Hit max_github_api_pages ({}) fetching {} for {}. Data may be incomplete.",
                    self.max_pages,
                    label,
                    self.org
                );
                break;
            }

            match connection.page_info.end_cursor {
                Some(next) => cursor = Some(next),
                None => bail!("{label} response reported another page without an end cursor"),
            }
        }

        Ok(items)
    }
}

fn decode_response<D: DeserializeOwned>(body: Value) -> Result<D> {
    let response: GraphQlResponse<D> = serde_json::from_value(body)?;

    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        bail!("GitHub GraphQL error: {}", messages.join("; "));
    }

    response.data.context("response carried no data")
}

fn sanitize_name(name: &str, kind: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        bail!("{kind} name must not be empty");
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_response_surfaces_graphql_errors() {
        let body = json!({
            "data": null,
            "errors": [
                { "message": "Could not resolve to an Organization with the login of 'nope'." },
                { "message": "second" }
            ]
        });

        let err = decode_response::<OrganizationData>(body).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Could not resolve"));
        assert!(message.contains("second"));
    }

    #[test]
    fn test_decode_response_requires_data() {
        let err = decode_response::<OrganizationData>(json!({})).unwrap_err();
        assert!(err.to_string().contains("no data"));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  rust-lang ", "organization").unwrap(), "rust-lang");
        assert!(sanitize_name("   ", "organization").is_err());
    }
}
