//! Issue and pull request throughput reducers.
//!
//! Both reducers are left folds over one page of records: feeding successive pages through
//! them, threading the returned accumulator each time, gives the same totals as feeding the
//! concatenated pages once. Averages are derived separately, once every page has been folded.

use crate::types::{Issue, IssueState, PullRequest, PullRequestState};
use chrono::{DateTime, Utc};
use serde::Serialize;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Running issue totals for one aggregation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IssueMetrics {
    pub open_count: u64,
    pub closed_count: u64,
    pub total_time_to_close_ms: i64,
    pub total_comments: u64,
}

/// Running pull request totals for one aggregation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PrMetrics {
    pub open_count: u64,
    pub merged_count: u64,
    pub total_time_to_merge_ms: i64,
    pub total_comments: u64,
}

/// Folds a page of issues into `acc`.
///
/// Any issue that is not open counts as closed. A closed issue without a `closed_at` still
/// counts and still contributes its comments; only its time-to-close term is skipped.
pub fn fold_issues(issues: &[Issue], mut acc: IssueMetrics) -> IssueMetrics {
    let (open, closed): (Vec<&Issue>, Vec<&Issue>) = issues
        .iter()
        .partition(|issue| issue.state == IssueState::Open);

    acc.open_count += open.len() as u64;
    acc.closed_count += closed.len() as u64;

    for issue in closed {
        if let Some(ms) = elapsed_ms(issue.created_at, issue.closed_at) {
            acc.total_time_to_close_ms += ms;
        }
        acc.total_comments += issue.comment_count;
    }

    acc
}

/// Folds a page of pull requests into `acc`.
///
/// Bucketing follows `state` alone: pull requests closed without merging land in neither
/// bucket and contribute nothing.
pub fn fold_pull_requests(prs: &[PullRequest], mut acc: PrMetrics) -> PrMetrics {
    let mut merged = Vec::new();
    for pr in prs {
        match pr.state {
            PullRequestState::Open => acc.open_count += 1,
            PullRequestState::Merged => merged.push(pr),
            PullRequestState::Closed | PullRequestState::Other => {}
        }
    }

    acc.merged_count += merged.len() as u64;

    for pr in merged {
        if let Some(ms) = elapsed_ms(pr.created_at, pr.merged_at) {
            acc.total_time_to_merge_ms += ms;
        }
        acc.total_comments += pr.comment_count;
    }

    acc
}

fn elapsed_ms(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Option<i64> {
    end.map(|end| (end - start).num_milliseconds())
}

/// `total / count`, or exactly `0.0` when either side is zero.
pub fn average(total: f64, count: u64) -> f64 {
    if count == 0 || total == 0.0 {
        0.0
    } else {
        total / count as f64
    }
}

pub fn millis_to_days(ms: f64) -> f64 {
    ms / MILLIS_PER_DAY
}

/// Issue figures as reported once the pass is complete.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IssueSummary {
    pub open: u64,
    pub closed: u64,
    pub average_time_to_close_days: f64,
    pub average_comments_per_issue: f64,
}

impl From<IssueMetrics> for IssueSummary {
    fn from(metrics: IssueMetrics) -> Self {
        Self {
            open: metrics.open_count,
            closed: metrics.closed_count,
            average_time_to_close_days: millis_to_days(average(
                metrics.total_time_to_close_ms as f64,
                metrics.closed_count,
            )),
            average_comments_per_issue: average(
                metrics.total_comments as f64,
                metrics.closed_count,
            ),
        }
    }
}

/// Pull request figures as reported once the pass is complete.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PullRequestSummary {
    pub open: u64,
    pub merged: u64,
    pub average_time_to_merge_days: f64,
    pub average_comments_per_pr: f64,
}

impl From<PrMetrics> for PullRequestSummary {
    fn from(metrics: PrMetrics) -> Self {
        Self {
            open: metrics.open_count,
            merged: metrics.merged_count,
            average_time_to_merge_days: millis_to_days(average(
                metrics.total_time_to_merge_ms as f64,
                metrics.merged_count,
            )),
            average_comments_per_pr: average(metrics.total_comments as f64, metrics.merged_count),
        }
    }
}
