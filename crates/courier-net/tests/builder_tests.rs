//! Integration tests for the request builder against a local mock server.

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use courier_net::{
    CancellationSource, DefaultClientFactory, HttpBuilder, HttpClientFactory, HttpError, HttpStatusResult,
};
use http::{Method, StatusCode};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserAccount {
    user_name: String,
    password: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct FailedResult {
    code: u16,
    message: String,
}

/// Answers with the request body.
struct Echo;

impl Respond for Echo {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(request.body.clone(), "application/json")
    }
}

fn factory() -> Arc<dyn HttpClientFactory> {
    Arc::new(DefaultClientFactory::new().expect("Failed to create client factory"))
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
async fn test_method_and_uri_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/test"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/api/test", server.uri());
    let response = HttpBuilder::new(factory())
        .method(Method::PUT)
        .uri(&url)
        .expect("valid URI")
        .result()
        .await
        .expect("request should succeed")
        .expect("response should be present");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.request().method, Method::PUT);
    assert_eq!(response.request().url.as_str(), url);
}

#[tokio::test]
async fn test_method_string_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let response = HttpBuilder::new(factory())
        .method_str("delete")
        .expect("valid method")
        .uri(&server.uri())
        .expect("valid URI")
        .result()
        .await
        .expect("request should succeed")
        .expect("response should be present");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_post_json_echo() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/test"))
        .and(body_json(serde_json::json!({"userName": "Test", "password": "Password"})))
        .respond_with(Echo)
        .expect(1)
        .mount(&server)
        .await;

    let echoed: Option<UserAccount> = HttpBuilder::new(factory())
        .method(Method::POST)
        .uri(&format!("{}/api/test", server.uri()))
        .expect("valid URI")
        .body_json(&account())
        .expect("serializable body")
        .result_as()
        .await
        .expect("request should succeed");

    assert_eq!(echoed, Some(account()));
}

#[tokio::test]
async fn test_typed_result_sends_accept_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([1, 2, 3])))
        .expect(1)
        .mount(&server)
        .await;

    let values: Option<Vec<u32>> = HttpBuilder::new(factory())
        .uri(&server.uri())
        .expect("valid URI")
        .result_as()
        .await
        .expect("request should succeed");

    assert_eq!(values, Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn test_null_body_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let value: Option<UserAccount> = HttpBuilder::new(factory())
        .uri(&server.uri())
        .expect("valid URI")
        .result_as()
        .await
        .expect("request should succeed");

    assert_eq!(value, None);
}

#[tokio::test]
async fn test_bad_request_carries_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/test"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Count cannot be less than 0"))
        .mount(&server)
        .await;

    let parsed_text = Arc::new(Mutex::new(None));
    let result = HttpBuilder::new(factory())
        .uri(&format!("{}/api/test", server.uri()))
        .expect("valid URI")
        .on_response_parsed({
            let parsed_text = parsed_text.clone();
            move |event| *parsed_text.lock() = event.text().map(str::to_string)
        })
        .result_as::<Vec<UserAccount>>()
        .await;

    match result {
        Err(HttpError::InvalidStatusCode { code, reason, body }) => {
            assert_eq!(code, 400);
            assert_eq!(reason, "Bad Request");
            assert_eq!(body, "Count cannot be less than 0");
        }
        other => panic!("expected InvalidStatusCode, got {other:?}"),
    }
    assert_eq!(parsed_text.lock().as_deref(), Some("Count cannot be less than 0"));
}

#[tokio::test]
async fn test_graceful_bad_request_decodes_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({"message": "x"})))
        .mount(&server)
        .await;

    let finished = Arc::new(Mutex::new(Vec::new()));
    let parsed = Arc::new(Mutex::new(None));
    let result = HttpBuilder::new(factory())
        .uri(&server.uri())
        .expect("valid URI")
        .fail_gracefully()
        .on_response_parsed({
            let parsed = parsed.clone();
            move |event| *parsed.lock() = event.value::<serde_json::Value>().cloned()
        })
        .on_finished({
            let finished = finished.clone();
            move |error| finished.lock().push(error.cloned())
        })
        .result_as::<serde_json::Value>()
        .await;

    let expected = serde_json::json!({"message": "x"});
    assert_eq!(result, Ok(Some(expected.clone())));
    assert_eq!(*parsed.lock(), Some(expected));
    assert_eq!(*finished.lock(), vec![None]);
}

#[tokio::test]
async fn test_graceful_undecodable_bad_request_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_string("nope"))
        .mount(&server)
        .await;

    let finished_error = Arc::new(Mutex::new(None));
    let result = HttpBuilder::new(factory())
        .uri(&server.uri())
        .expect("valid URI")
        .fail_gracefully()
        .on_finished({
            let finished_error = finished_error.clone();
            move |error| *finished_error.lock() = error.cloned()
        })
        .result_as::<Vec<UserAccount>>()
        .await;

    assert_eq!(result, Ok(None));
    assert!(matches!(*finished_error.lock(), Some(HttpError::Codec(_))));
}

#[tokio::test]
async fn test_dual_result_failure_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/test"))
        .and(query_param("count", "-1"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"code": 400, "message": "Count cannot be less than 0"})),
        )
        .mount(&server)
        .await;

    let result = HttpBuilder::new(factory())
        .uri_with_query(&format!("{}/api/test", server.uri()), [("count", "-1")])
        .expect("valid URI")
        .result_status::<Vec<UserAccount>, FailedResult>()
        .await
        .expect("HTTP failures are not errors");

    assert!(!result.is_success());
    assert_eq!(result.code(), StatusCode::BAD_REQUEST);
    let failure = result.failure().expect("failure payload");
    assert_eq!(failure.code, 400);
    assert_eq!(failure.message, "Count cannot be less than 0");
    assert!(result.success().is_none());
}

#[tokio::test]
async fn test_dual_result_success_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![account()]))
        .mount(&server)
        .await;

    let result = HttpBuilder::new(factory())
        .uri(&server.uri())
        .expect("valid URI")
        .result_status::<Vec<UserAccount>, FailedResult>()
        .await
        .expect("request should succeed");

    assert!(result.is_success());
    assert_eq!(result.code(), StatusCode::OK);
    assert_eq!(result.success(), Some(&vec![account()]));
}

#[tokio::test]
async fn test_graceful_dual_result_on_transport_error() {
    let url = unreachable_url();

    let result = HttpBuilder::new(factory())
        .uri(&url)
        .expect("valid URI")
        .fail_gracefully()
        .result_status::<Vec<UserAccount>, FailedResult>()
        .await
        .expect("graceful-fail swallows the error");

    assert!(!result.is_success());
    assert_eq!(result.code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(result.error().is_some_and(HttpError::is_transport));
}

#[tokio::test]
async fn test_events_fire_in_order_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(account()))
        .mount(&server)
        .await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let push = |name: &'static str| {
        let order = order.clone();
        move || order.lock().push(name)
    };
    let on_starting = push("starting");
    let on_received = push("received");
    let on_parsed = push("parsed");
    let on_finished = push("finished");

    let user: Option<UserAccount> = HttpBuilder::new(factory())
        .uri(&server.uri())
        .expect("valid URI")
        .on_starting(on_starting)
        .on_response_received(move |_| on_received())
        .on_response_parsed(move |_| on_parsed())
        .on_finished(move |_| on_finished())
        .result_as()
        .await
        .expect("request should succeed");

    assert_eq!(user, Some(account()));
    assert_eq!(*order.lock(), vec!["starting", "received", "parsed", "finished"]);
}

#[tokio::test]
async fn test_response_events_carry_heads_and_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(account()))
        .mount(&server)
        .await;

    let received_status = Arc::new(Mutex::new(None));
    let parsed_user = Arc::new(Mutex::new(None));

    let _user: Option<UserAccount> = HttpBuilder::new(factory())
        .uri(&server.uri())
        .expect("valid URI")
        .on_response_received({
            let received_status = received_status.clone();
            move |event| *received_status.lock() = Some((event.response.status, event.request.method.clone()))
        })
        .on_response_parsed({
            let parsed_user = parsed_user.clone();
            move |event| *parsed_user.lock() = event.value::<UserAccount>().cloned()
        })
        .result_as()
        .await
        .expect("request should succeed");

    assert_eq!(*received_status.lock(), Some((StatusCode::OK, Method::GET)));
    assert_eq!(*parsed_user.lock(), Some(account()));
}

#[tokio::test]
async fn test_finished_fires_once_on_error() {
    let finished = Arc::new(AtomicUsize::new(0));
    let starting = Arc::new(AtomicUsize::new(0));

    // No URI configured: fails inside the execution.
    let result = HttpBuilder::new(factory())
        .on_starting({
            let starting = starting.clone();
            move || {
                starting.fetch_add(1, Ordering::SeqCst);
            }
        })
        .on_finished({
            let finished = finished.clone();
            move |error| {
                assert!(matches!(error, Some(HttpError::InvalidArgument { argument: "uri", .. })));
                finished.fetch_add(1, Ordering::SeqCst);
            }
        })
        .result()
        .await;

    assert!(matches!(result, Err(HttpError::InvalidArgument { .. })));
    assert_eq!(starting.load(Ordering::SeqCst), 1);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bad_uri_fails_before_execution() {
    let result = HttpBuilder::new(factory()).fail_gracefully().uri("http://");
    assert!(matches!(result, Err(HttpError::InvalidArgument { argument: "uri", .. })));
}

#[tokio::test]
async fn test_client_timeout_applies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let result = HttpBuilder::new(factory())
        .uri(&server.uri())
        .expect("valid URI")
        .timeout(Duration::from_millis(100))
        .result()
        .await;

    assert!(matches!(result, Err(HttpError::Timeout)));
}

#[tokio::test]
async fn test_external_cancellation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let external = CancellationSource::new();
    let builder = HttpBuilder::new(factory())
        .uri(&server.uri())
        .expect("valid URI")
        .cancel_with(&external.token());

    let internal_fired = Arc::new(AtomicUsize::new(0));
    let _observer = builder.cancellation_token().register({
        let internal_fired = internal_fired.clone();
        move || {
            internal_fired.fetch_add(1, Ordering::SeqCst);
        }
    });

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        external.cancel();
        external.cancel();
    });

    let result = builder.result().await;
    canceller.await.expect("canceller panicked");

    assert!(matches!(result, Err(HttpError::Cancelled)));
    assert_eq!(internal_fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_graceful_cancellation_is_none() {
    let external = CancellationSource::new();
    external.cancel();

    let result = HttpBuilder::new(factory())
        .uri("http://127.0.0.1:9/never")
        .expect("valid URI")
        .cancel_with(&external.token())
        .fail_gracefully()
        .result_as::<UserAccount>()
        .await;

    assert_eq!(result, Ok(None));
}

#[tokio::test]
async fn test_named_client_factory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![account()]))
        .mount(&server)
        .await;

    let factory = DefaultClientFactory::new().expect("Failed to create client factory");
    factory
        .register(
            "users",
            courier_net::HttpClientBuilder::new()
                .base_url(format!("{}/api/", server.uri()))
                .expect("valid base URL"),
        )
        .expect("Failed to register client");

    let users: Option<Vec<UserAccount>> = HttpBuilder::new(Arc::new(factory))
        .client_factory(|factory| factory.create_named_client("users"))
        .uri("users")
        .expect("valid URI")
        .result_as()
        .await
        .expect("request should succeed");

    assert_eq!(users, Some(vec![account()]));
}
