use bbsctl::bitbucket::{BitbucketClient, BranchManager, Outcome};
use bbsctl::config::BitbucketConfig;
use bbsctl::errors::BbsError;
use mockito::Matcher;
use serde_json::json;

fn config_for(server: &mockito::ServerGuard) -> BitbucketConfig {
    BitbucketConfig {
        url: server.url(),
        project: "TEST".to_string(),
        repo: "test-repo".to_string(),
        username: Some("svc-automation".to_string()),
        token: Some("testtoken".to_string()),
        default_reviewers: vec![],
    }
}

fn branch_manager(server: &mockito::ServerGuard) -> BranchManager {
    BranchManager::new(BitbucketClient::new(&config_for(server)).unwrap())
}

fn empty_page() -> serde_json::Value {
    json!({
        "size": 0,
        "limit": 25,
        "isLastPage": true,
        "values": [],
        "start": 0,
        "nextPageStart": null
    })
}

fn page_with_branch(name: &str) -> serde_json::Value {
    json!({
        "size": 1,
        "limit": 25,
        "isLastPage": true,
        "values": [{
            "id": format!("refs/heads/{name}"),
            "displayId": name,
            "type": "BRANCH",
            "latestCommit": "8d51122def5632836d1cb1026e879069e10a1e13",
            "isDefault": false
        }],
        "start": 0,
        "nextPageStart": null
    })
}

/// A missing branch is created through the branch-utils API
#[tokio::test]
async fn test_ensure_present_creates_missing_branch() {
    let mut server = mockito::Server::new_async().await;

    let lookup = server
        .mock("GET", "/rest/api/1.0/projects/TEST/repos/test-repo/branches")
        .match_query(Matcher::UrlEncoded(
            "filterText".into(),
            "feature/login".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(empty_page().to_string())
        .create_async()
        .await;

    let create = server
        .mock(
            "POST",
            "/rest/branch-utils/1.0/projects/TEST/repos/test-repo/branches",
        )
        .match_body(Matcher::Json(json!({
            "name": "feature/login",
            "startPoint": "develop"
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "refs/heads/feature/login",
                "displayId": "feature/login",
                "type": "BRANCH",
                "latestCommit": "8d51122def5632836d1cb1026e879069e10a1e13",
                "isDefault": false
            })
            .to_string(),
        )
        .create_async()
        .await;

    let outcome = branch_manager(&server)
        .ensure_present("feature/login", "develop")
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Changed);
    lookup.assert_async().await;
    create.assert_async().await;
}

/// An already-existing branch is left alone and reported unchanged
#[tokio::test]
async fn test_ensure_present_existing_branch_is_unchanged() {
    let mut server = mockito::Server::new_async().await;

    let _lookup = server
        .mock("GET", "/rest/api/1.0/projects/TEST/repos/test-repo/branches")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page_with_branch("feature/login").to_string())
        .create_async()
        .await;

    let create = server
        .mock(
            "POST",
            "/rest/branch-utils/1.0/projects/TEST/repos/test-repo/branches",
        )
        .expect(0)
        .create_async()
        .await;

    let outcome = branch_manager(&server)
        .ensure_present("feature/login", "develop")
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Unchanged);
    create.assert_async().await;
}

/// An existing branch is deleted through the branch-utils API
#[tokio::test]
async fn test_ensure_absent_deletes_existing_branch() {
    let mut server = mockito::Server::new_async().await;

    let _lookup = server
        .mock("GET", "/rest/api/1.0/projects/TEST/repos/test-repo/branches")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page_with_branch("feature/stale").to_string())
        .create_async()
        .await;

    let delete = server
        .mock(
            "DELETE",
            "/rest/branch-utils/1.0/projects/TEST/repos/test-repo/branches",
        )
        .match_body(Matcher::Json(json!({ "name": "feature/stale" })))
        .with_status(204)
        .create_async()
        .await;

    let outcome = branch_manager(&server)
        .ensure_absent("feature/stale")
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Changed);
    delete.assert_async().await;
}

/// Deleting a branch that is already gone is a no-op
#[tokio::test]
async fn test_ensure_absent_missing_branch_is_unchanged() {
    let mut server = mockito::Server::new_async().await;

    let _lookup = server
        .mock("GET", "/rest/api/1.0/projects/TEST/repos/test-repo/branches")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(empty_page().to_string())
        .create_async()
        .await;

    let delete = server
        .mock(
            "DELETE",
            "/rest/branch-utils/1.0/projects/TEST/repos/test-repo/branches",
        )
        .expect(0)
        .create_async()
        .await;

    let outcome = branch_manager(&server)
        .ensure_absent("feature/gone")
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Unchanged);
    delete.assert_async().await;
}

/// The fuzzy filterText match is narrowed to an exact displayId comparison
#[tokio::test]
async fn test_lookup_requires_exact_name_match() {
    let mut server = mockito::Server::new_async().await;

    // The server returns a near-miss for the filter
    let _lookup = server
        .mock("GET", "/rest/api/1.0/projects/TEST/repos/test-repo/branches")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page_with_branch("feature/login-v2").to_string())
        .create_async()
        .await;

    let found = branch_manager(&server)
        .find_branch("feature/login")
        .await
        .unwrap();

    assert!(found.is_none());
}

/// 401 responses carry the credential hint from the server contract
#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let mut server = mockito::Server::new_async().await;

    let _lookup = server
        .mock("GET", "/rest/api/1.0/projects/TEST/repos/test-repo/branches")
        .match_query(Matcher::Any)
        .with_status(401)
        .create_async()
        .await;

    let err = branch_manager(&server)
        .ensure_present("feature/login", "develop")
        .await
        .unwrap_err();

    assert!(matches!(err, BbsError::Auth(_)));
    let message = err.to_string();
    assert!(message.contains("svc-automation"));
    assert!(message.contains("verify username and password"));
}
