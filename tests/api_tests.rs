use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use org_pulse::{config::AppConfig, create_app, AppState};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

fn test_config(tracked_orgs: Vec<String>, github_org_name: Option<String>) -> AppConfig {
    AppConfig {
        max_github_api_pages: 1,
        cache_ttl_seconds: 60,
        cache_max_capacity: 100,
        activity_days: 7,
        tracked_orgs,
        tracked_orgs_concurrency_limit: 1,
        github_org_name,
        github_token: None,
        port: 0,
    }
}

#[tokio::test]
async fn test_health_check() {
    // 1. Setup config and state
    let state = Arc::new(AppState::new(test_config(vec![], None)).expect("Failed to create state"));

    // 2. Create app
    let app = create_app(state);

    // 3. Send request
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // 4. Assert
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    assert_eq!(body_json["status"], "ok");
    assert_eq!(body_json["service"], "org-pulse");
}

#[tokio::test]
async fn test_get_tracked_orgs() {
    let config = test_config(vec!["rust-lang".to_string(), "tokio-rs".to_string()], None);
    let state = Arc::new(AppState::new(config).expect("Failed to create state"));

    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/orgs/tracked")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_json: Vec<String> = serde_json::from_slice(&body_bytes).unwrap();

    assert_eq!(body_json, vec!["rust-lang", "tokio-rs"]);
}

#[tokio::test]
async fn test_default_report_without_configured_org() {
    let state = Arc::new(AppState::new(test_config(vec![], None)).expect("Failed to create state"));

    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/report")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_aggregate_result_contract() {
    // Guards the JSON shape consumers of the report rely on.
    use chrono::{TimeZone, Utc};
    use org_pulse::aggregate::Aggregator;
    use org_pulse::types::{OrgRepositories, Repository};

    let repo = Repository {
        name: "repo".to_string(),
        description: Some("A repository".to_string()),
        url: "https://github.com/org/repo".to_string(),
        stargazer_count: 3,
        fork_count: 1,
        pushed_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()),
    };
    let mut aggregator = Aggregator::new();
    aggregator.add_repository(&repo, &[], &[]);
    let report = aggregator.finish(
        "org",
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        OrgRepositories {
            total_repos: 2,
            active_repos: vec![repo],
        },
    );

    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["org"], "org");
    assert_eq!(json["total_stars"], 3);
    assert_eq!(json["total_forks"], 1);
    assert_eq!(json["repo_count"], 2);
    assert_eq!(json["active_repo_count"], 1);
    assert_eq!(json["active_repos"][0]["name"], "repo");
    assert_eq!(json["active_repos"][0]["stargazer_count"], 3);
    assert_eq!(json["active_repos"][0]["fork_count"], 1);
    assert_eq!(json["active_repos"][0]["pushed_at"], "2024-01-02T00:00:00Z");

    assert_eq!(json["issues"]["open"], 0);
    assert_eq!(json["issues"]["closed"], 0);
    assert_eq!(json["issues"]["average_time_to_close_days"], 0.0);
    assert_eq!(json["issues"]["average_comments_per_issue"], 0.0);

    assert_eq!(json["pull_requests"]["open"], 0);
    assert_eq!(json["pull_requests"]["merged"], 0);
    assert_eq!(json["pull_requests"]["average_time_to_merge_days"], 0.0);
    assert_eq!(json["pull_requests"]["average_comments_per_pr"], 0.0);

    assert!(json["contributors"]["locations"].is_object());
    assert!(json["contributors"]["participants"].is_object());
    assert_eq!(json["contributors"]["unique_participant_count"], 0);
}
