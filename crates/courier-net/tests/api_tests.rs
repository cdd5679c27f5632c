//! Integration tests for the verb helpers.

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use courier_net::{ApiService, CancellationSource, DefaultClientFactory, HttpContent, HttpError, RequestOptions};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserAccount {
    user_name: String,
    password: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct UserAccountResult {
    id: u32,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct FailedResult {
    code: u16,
    message: String,
}

fn api() -> ApiService {
    ApiService::new(Arc::new(
        DefaultClientFactory::new().expect("Failed to create client factory"),
    ))
}

/// A local URL nothing listens on.
fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind a local port");
    let port = listener.local_addr().expect("bound address").port();
    drop(listener);
    format!("http://127.0.0.1:{port}/")
}

fn account() -> UserAccount {
    UserAccount {
        user_name: "Test".to_string(),
        password: "Password".to_string(),
    }
}

#[tokio::test]
async fn test_create_sets_method_and_uri() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/test"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let response = api()
        .create(&format!("{}/api/test", server.uri()), Method::PATCH)
        .expect("valid URI")
        .result()
        .await
        .expect("request should succeed")
        .expect("response should be present");

    assert_eq!(response.request().method, Method::PATCH);
}

#[tokio::test]
async fn test_create_rejects_bad_uri() {
    assert!(matches!(
        api().create("", Method::GET),
        Err(HttpError::InvalidArgument { argument: "uri", .. })
    ));
}

#[tokio::test]
async fn test_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![account()]))
        .mount(&server)
        .await;

    let users: Option<Vec<UserAccount>> = api()
        .get(&format!("{}/api/test", server.uri()), None)
        .await
        .expect("request should succeed");

    assert_eq!(users, Some(vec![account()]));
}

#[tokio::test]
async fn test_get_status_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"code": 400, "message": "Count cannot be less than 0"})),
        )
        .mount(&server)
        .await;

    let result = api()
        .get_status::<Vec<UserAccount>, FailedResult>(&server.uri(), None)
        .await
        .expect("HTTP failures are not errors");

    assert_eq!(result.code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        result.failure().map(|failure| failure.message.as_str()),
        Some("Count cannot be less than 0")
    );
}

#[tokio::test]
async fn test_get_status_is_graceful() {
    let url = unreachable_url();

    let result = api()
        .get_status::<Vec<UserAccount>, FailedResult>(&url, None)
        .await
        .expect("status variants swallow execution errors");

    assert!(!result.is_success());
    assert_eq!(result.code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(matches!(result.error(), Some(HttpError::Connection(_))));
}

#[tokio::test]
async fn test_get_error_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .mount(&server)
        .await;

    let result = api().get::<UserAccount>(&server.uri(), None).await;
    assert!(matches!(
        result,
        Err(HttpError::InvalidStatusCode { code: 404, ref body, .. }) if body == "missing"
    ));
}

#[tokio::test]
async fn test_post_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/test"))
        .and(body_json(serde_json::json!({"userName": "Test", "password": "Password"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 7, "name": "Test"})))
        .expect(1)
        .mount(&server)
        .await;

    let created: Option<UserAccountResult> = api()
        .post(&format!("{}/api/test", server.uri()), &account(), None)
        .await
        .expect("request should succeed");

    assert_eq!(
        created,
        Some(UserAccountResult {
            id: 7,
            name: "Test".to_string()
        })
    );
}

#[tokio::test]
async fn test_post_form_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("userName=Test&password=Password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1, "name": "Test"})))
        .expect(1)
        .mount(&server)
        .await;

    let result = api()
        .post_form_status::<UserAccountResult, FailedResult, _, _>(
            &server.uri(),
            [("userName", "Test"), ("password", "Password")],
            None,
        )
        .await
        .expect("request should succeed");

    assert!(result.is_success());
    assert_eq!(result.success().map(|user| user.id), Some(1));
}

#[tokio::test]
async fn test_put_content() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(header("content-type", "text/plain; charset=utf-8"))
        .and(body_string("hello"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let result: Option<UserAccountResult> = api()
        .put_content(&server.uri(), HttpContent::text("hello"), None)
        .await
        .expect("request should succeed");

    assert_eq!(result, None);
}

#[tokio::test]
async fn test_put_json_status() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(body_json(serde_json::json!({"userName": "Test", "password": "Password"})))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(serde_json::json!({"code": 409, "message": "exists"})),
        )
        .mount(&server)
        .await;

    let result = api()
        .put_status::<UserAccountResult, FailedResult, _>(&server.uri(), &account(), None)
        .await
        .expect("request should succeed");

    assert_eq!(result.code(), StatusCode::CONFLICT);
    assert_eq!(result.failure().map(|failure| failure.code), Some(409));
}

#[tokio::test]
async fn test_delete_without_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/test/7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("true"))
        .expect(1)
        .mount(&server)
        .await;

    let deleted: Option<bool> = api()
        .delete(&format!("{}/api/test/7", server.uri()), None)
        .await
        .expect("request should succeed");

    assert_eq!(deleted, Some(true));
}

#[tokio::test]
async fn test_delete_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(body_json(serde_json::json!({"userName": "Test", "password": "Password"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("true"))
        .expect(1)
        .mount(&server)
        .await;

    let deleted: Option<bool> = api()
        .delete_json(&server.uri(), &account(), None)
        .await
        .expect("request should succeed");

    assert_eq!(deleted, Some(true));
}

#[tokio::test]
async fn test_options_configure_runs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("1"))
        .expect(1)
        .mount(&server)
        .await;

    let configured = Arc::new(AtomicBool::new(false));
    let options = RequestOptions::new().configure({
        let configured = configured.clone();
        move |builder| {
            configured.store(true, Ordering::SeqCst);
            builder.bearer("secret")
        }
    });

    let value: Option<u32> = api()
        .get(&server.uri(), options)
        .await
        .expect("request should succeed");

    assert_eq!(value, Some(1));
    assert!(configured.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_options_cancellation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let source = CancellationSource::new();
    let options = RequestOptions::new().cancel_with(source.token());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        source.cancel();
    });

    let result = api().get::<UserAccount>(&server.uri(), options).await;
    canceller.await.expect("canceller panicked");

    assert!(matches!(result, Err(HttpError::Cancelled)));
}
