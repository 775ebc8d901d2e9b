use super::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_default_http_client_builds() {
    let _client = default_http_client();
}

#[tokio::test]
async fn test_get_json_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rates"))
        .and(query_param("base", "USD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = default_http_client();
    let value = get_json(
        client
            .get(format!("{}/rates", server.uri()))
            .query(&[("base", "USD")]),
    )
    .await
    .unwrap();
    assert_eq!(value, json!({"ok": true}));
}

#[tokio::test]
async fn test_get_json_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = get_json(default_http_client().get(server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "HTTP error! status: 404");
}

#[tokio::test]
async fn test_get_json_rejects_non_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = get_json(default_http_client().get(server.uri()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not valid JSON"));
}

#[tokio::test]
async fn test_send_json_keeps_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "bad key"})))
        .mount(&server)
        .await;

    let (status, body) = send_json(default_http_client().get(server.uri()))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "bad key");
}

#[tokio::test]
async fn test_limited_body_content_length_over_limit_rejects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 10_000]))
        .mount(&server)
        .await;
    let resp = Client::new().get(server.uri()).send().await.unwrap();
    let err = limited_body(resp, 100).await.unwrap_err();
    assert!(err.to_string().contains("too large"));
}

#[tokio::test]
async fn test_get_text_handles_invalid_utf8() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xFE, b'o', b'k']))
        .mount(&server)
        .await;
    let text = get_text(default_http_client().get(server.uri()), 1024)
        .await
        .unwrap();
    assert!(text.ends_with("ok"));
}
