use super::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn request_decodes_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/instances"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "i-1"}])))
        .mount(&server)
        .await;

    let client = RestClient::new(HttpClient::new(), server.uri(), "s3cret");
    let body: serde_json::Value = client
        .request("m1", Method::GET, "/instances", None::<&()>, "GetMachineError")
        .await
        .expect("request succeeds");
    assert_eq!(body, json!([{"id": "i-1"}]));
}

#[tokio::test]
async fn request_maps_404_to_terminal_with_caller_reason() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/instances/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let client = RestClient::new(HttpClient::new(), server.uri(), "s3cret");
    let err = client
        .request::<(), serde_json::Value>("m1", Method::GET, "/instances/missing", None, "CreateMachineError")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Terminal { ref reason, .. } if reason == "CreateMachineError"));
}

#[tokio::test]
async fn request_no_body_treats_404_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/instances/i-1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = RestClient::new(HttpClient::new(), server.uri(), "s3cret");
    client
        .request_no_body::<()>("m1", Method::DELETE, "/instances/i-1", None, "DeleteMachineError")
        .await
        .expect("404 treated as success");
}
