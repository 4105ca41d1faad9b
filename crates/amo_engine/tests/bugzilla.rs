use std::sync::Arc;

use amo_engine::{ApiError, BugzillaClient, BugzillaConfig, ReqwestSession, SessionSettings, Transport};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, api_key: Option<&str>, readonly: bool) -> BugzillaClient {
    let config = BugzillaConfig {
        base_url: server.uri(),
        api_key: api_key.map(str::to_string),
        readonly,
    };
    let transport: Arc<dyn Transport> =
        Arc::new(ReqwestSession::new(SessionSettings::default()).unwrap());
    BugzillaClient::new(transport, &config)
}

#[tokio::test]
async fn bugs_are_fetched_in_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/bug"))
        .and(query_param("id", "100,200"))
        .and(header("x-bugzilla-api-key", "bz-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bugs": [
                { "id": 100, "summary": "Spam add-on", "status": "NEW", "whiteboard": "[amo]" },
                { "id": 200, "summary": "Malware", "status": "RESOLVED", "resolution": "FIXED" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let bugs = client(&server, Some("bz-key"), false).get(&[100, 200]).await.unwrap();
    assert_eq!(bugs.len(), 2);
    assert_eq!(bugs[0].summary, "Spam add-on");
    assert_eq!(bugs[0].extra["whiteboard"], json!("[amo]"));
    assert_eq!(bugs[1].resolution, "FIXED");
}

#[tokio::test]
async fn comments_are_keyed_by_bug() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/bug/100/comment"))
        .and(query_param("ids", "100"))
        .and(query_param("ids", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bugs": {
                "100": { "comments": [
                    { "id": 1, "bug_id": 100, "text": "Reported", "creator": "a@example.com" }
                ] },
                "200": { "comments": [] }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let comments = client(&server, None, false).comments(&[100, 200]).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[&100][0].text, "Reported");
    assert!(comments[&200].is_empty());
}

#[tokio::test]
async fn comment_is_added_with_put() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/rest/bug/100"))
        .and(header("x-bugzilla-api-key", "bz-key"))
        .and(body_partial_json(json!({
            "ids": [100],
            "comment": { "body": "Add-on disabled" }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "bugs": [{ "id": 100, "changes": {} }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server, Some("bz-key"), false)
        .add_comment(100, "Add-on disabled")
        .await
        .unwrap();
    assert_eq!(reply.unwrap()["bugs"][0]["id"], json!(100));
}

#[tokio::test]
async fn readonly_client_sends_no_writes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let bugzilla = client(&server, Some("bz-key"), true);
    assert!(bugzilla.is_readonly());
    assert_eq!(bugzilla.update(&[100], json!({ "status": "RESOLVED" })).await.unwrap(), None);
    assert_eq!(bugzilla.create(json!({ "summary": "new" })).await.unwrap(), None);
}

#[tokio::test]
async fn created_bug_returns_its_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/bug"))
        .and(body_partial_json(json!({ "product": "Toolkit" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1234 })))
        .expect(1)
        .mount(&server)
        .await;

    let id = client(&server, Some("bz-key"), false)
        .create(json!({ "product": "Toolkit", "summary": "Blocklist a@b" }))
        .await
        .unwrap();
    assert_eq!(id, Some(1234));
}

#[tokio::test]
async fn api_error_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/whoami"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": true,
            "code": 306,
            "message": "The API key you specified is invalid."
        })))
        .mount(&server)
        .await;

    let err = client(&server, Some("stale"), false).whoami().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "bugzilla error 306 - The API key you specified is invalid."
    );
}

#[tokio::test]
async fn whoami_names_the_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/whoami"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7, "name": "mod@example.com", "real_name": "Moderator"
        })))
        .mount(&server)
        .await;

    let account = client(&server, Some("bz-key"), false).whoami().await.unwrap();
    assert_eq!(account.name, "mod@example.com");
    assert_eq!(account.real_name.as_deref(), Some("Moderator"));
}

#[tokio::test]
async fn writes_without_api_key_are_refused() {
    let server = MockServer::start().await;
    let bugzilla = client(&server, None, false);
    assert!(!bugzilla.is_authenticated());
    let err = bugzilla.add_comment(1, "x").await.unwrap_err();
    assert!(matches!(err, ApiError::MissingApiKey(_)), "{err:?}");
}
