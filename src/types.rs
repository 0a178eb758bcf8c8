//! Validated GitHub records consumed by the aggregation pass.
//!
//! These types mirror the GraphQL selections issued by [`crate::github`]. Decoding a response
//! into them is what validates its shape: nullable fields are `Option`, connection wrappers such
//! as `comments { totalCount }` or `participants { nodes }` are flattened on the way in.
//! State enums accept values GitHub may add later instead of failing the whole page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A repository belonging to the organization being summarized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct Repository {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub stargazer_count: u64,
    pub fork_count: u64,
    /// `None` for repositories that have never received a push.
    pub pushed_at: Option<DateTime<Utc>>,
}

impl Repository {
    /// Whether the repository saw a push at or after `since`.
    pub fn is_active_since(&self, since: DateTime<Utc>) -> bool {
        self.pushed_at.is_some_and(|pushed_at| pushed_at >= since)
    }
}

/// Every repository of an organization, plus the subset considered active.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrgRepositories {
    pub total_repos: usize,
    pub active_repos: Vec<Repository>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueState {
    Open,
    Closed,
    /// Any state GitHub may add later; counted as closed.
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub state: IssueState,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(rename = "comments", deserialize_with = "total_count")]
    pub comment_count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestState {
    Open,
    Merged,
    /// Closed without being merged.
    Closed,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Actor {
    pub login: String,
}

/// A user who took part in a pull request, its author included.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Participant {
    pub login: String,
    pub location: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ChangedFile {
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "PullRequestNode")]
pub struct PullRequest {
    pub state: PullRequestState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub merged: bool,
    pub comment_count: u64,
    /// `None` when the author account has been deleted.
    pub author: Option<Actor>,
    pub participants: Vec<Participant>,
    /// Participants GitHub reports in total; more than `participants.len()` when the
    /// nested connection was cut off.
    pub participant_total: u64,
    pub changed_files: Vec<ChangedFile>,
    pub changed_file_total: u64,
}

impl PullRequest {
    pub fn is_authored_by(&self, login: &str) -> bool {
        self.author.as_ref().is_some_and(|author| author.login == login)
    }

    /// Whether the pull request was created or touched at or after `since`.
    pub fn is_active_since(&self, since: DateTime<Utc>) -> bool {
        self.created_at >= since || self.updated_at >= since
    }

    /// Whether the participant or changed-file list holds fewer entries than GitHub reports.
    pub fn has_truncated_connections(&self) -> bool {
        (self.participants.len() as u64) < self.participant_total
            || (self.changed_files.len() as u64) < self.changed_file_total
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestNode {
    state: PullRequestState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    merged: bool,
    #[serde(deserialize_with = "total_count")]
    comments: u64,
    author: Option<Actor>,
    participants: CountedNodes<Participant>,
    // GitHub returns `null` for `files` on very large diffs.
    #[serde(default)]
    files: Option<CountedNodes<ChangedFile>>,
}

impl From<PullRequestNode> for PullRequest {
    fn from(node: PullRequestNode) -> Self {
        let (participants, participant_total) = node.participants.into_parts();
        let (changed_files, changed_file_total) =
            node.files.map(CountedNodes::into_parts).unwrap_or_default();

        Self {
            state: node.state,
            created_at: node.created_at,
            updated_at: node.updated_at,
            merged_at: node.merged_at,
            merged: node.merged,
            comment_count: node.comments,
            author: node.author,
            participants,
            participant_total,
            changed_files,
            changed_file_total,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalCount {
    total_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountedNodes<T> {
    nodes: Vec<T>,
    total_count: Option<u64>,
}

impl<T> CountedNodes<T> {
    fn into_parts(self) -> (Vec<T>, u64) {
        let total = self.total_count.unwrap_or(self.nodes.len() as u64);
        (self.nodes, total)
    }
}

fn total_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    TotalCount::deserialize(deserializer).map(|count| count.total_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_decode_pull_request_flattens_connections() {
        let pr: PullRequest = serde_json::from_value(json!({
            "title": "PR1",
            "comments": { "totalCount": 2 },
            "createdAt": "2021-01-01T00:00:00Z",
            "updatedAt": "2021-01-02T00:00:00Z",
            "mergedAt": "2021-02-01T00:00:00Z",
            "state": "MERGED",
            "merged": true,
            "author": { "login": "testUser" },
            "participants": { "nodes": [
                { "login": "testUser", "location": "testLocation" },
                { "login": "testUser2", "location": null }
            ] },
            "files": { "nodes": [ { "additions": 3, "deletions": 1 } ] }
        }))
        .expect("valid pull request");

        assert_eq!(pr.state, PullRequestState::Merged);
        assert_eq!(pr.comment_count, 2);
        assert_eq!(
            pr.merged_at,
            Some(Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(pr.participants.len(), 2);
        assert_eq!(pr.participants[1].location, None);
        assert_eq!(
            pr.changed_files,
            vec![ChangedFile {
                additions: 3,
                deletions: 1
            }]
        );
        assert!(pr.is_authored_by("testUser"));
        assert!(!pr.is_authored_by("testUser2"));
        assert_eq!(pr.participant_total, 2);
        assert!(!pr.has_truncated_connections());
    }

    #[test]
    fn test_decode_pull_request_with_null_author_and_files() {
        let pr: PullRequest = serde_json::from_value(json!({
            "comments": { "totalCount": 0 },
            "createdAt": "2021-01-01T00:00:00Z",
            "updatedAt": "2021-01-01T00:00:00Z",
            "mergedAt": null,
            "state": "CLOSED",
            "merged": false,
            "author": null,
            "participants": { "nodes": [] },
            "files": null
        }))
        .expect("valid pull request");

        assert_eq!(pr.author, None);
        assert!(pr.changed_files.is_empty());
        assert!(!pr.has_truncated_connections());
        assert!(!pr.is_authored_by("anyone"));
    }

    #[test]
    fn test_decode_unknown_states() {
        let issue: Issue = serde_json::from_value(json!({
            "state": "LOCKED",
            "createdAt": "2021-01-01T00:00:00Z",
            "closedAt": null,
            "comments": { "totalCount": 1 }
        }))
        .expect("unknown issue state still decodes");
        assert_eq!(issue.state, IssueState::Other);

        let state: PullRequestState =
            serde_json::from_value(json!("DRAFT")).expect("unknown pull request state decodes");
        assert_eq!(state, PullRequestState::Other);
    }

    #[test]
    fn test_decode_pull_request_detects_truncated_files() {
        let pr: PullRequest = serde_json::from_value(json!({
            "comments": { "totalCount": 0 },
            "createdAt": "2021-01-01T00:00:00Z",
            "updatedAt": "2021-01-01T00:00:00Z",
            "mergedAt": null,
            "state": "OPEN",
            "merged": false,
            "author": { "login": "a" },
            "participants": { "totalCount": 1, "nodes": [ { "login": "a", "location": null } ] },
            "files": { "totalCount": 150, "nodes": [ { "additions": 1, "deletions": 0 } ] }
        }))
        .expect("valid pull request");

        assert_eq!(pr.participant_total, 1);
        assert_eq!(pr.changed_file_total, 150);
        assert!(pr.has_truncated_connections());
    }

    #[test]
    fn test_repository_serializes_snake_case() {
        let repo: Repository = serde_json::from_value(json!({
            "name": "repo",
            "description": null,
            "url": "https://github.com/org/repo",
            "stargazerCount": 4,
            "forkCount": 2,
            "pushedAt": null
        }))
        .expect("valid repository");

        let json = serde_json::to_value(&repo).unwrap();
        assert_eq!(json["stargazer_count"], 4);
        assert_eq!(json["fork_count"], 2);
        assert!(json.get("stargazerCount").is_none());
    }

    #[test]
    fn test_repository_activity() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut repo = Repository {
            name: "repo".to_string(),
            description: None,
            url: "https://github.com/org/repo".to_string(),
            stargazer_count: 0,
            fork_count: 0,
            pushed_at: None,
        };
        assert!(!repo.is_active_since(since));

        repo.pushed_at = Some(since);
        assert!(repo.is_active_since(since));

        repo.pushed_at = Some(since - chrono::Duration::seconds(1));
        assert!(!repo.is_active_since(since));
    }
}
