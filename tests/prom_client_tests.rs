// PromClient tests against a mock Prometheus: query composition, ordering,
// envelope errors, retry with backoff, auth, label aggregation.

mod common;

use common::{envelope, vector};
use metricscope::error::Error;
use metricscope::prom_client::{PromClient, PromClientConfig};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> PromClient {
    PromClient::new(PromClientConfig {
        url: server.uri(),
        username: None,
        password: None,
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn health_check_hits_healthy_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/-/healthy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Prometheus is Healthy."))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).health_check().await.unwrap();
}

#[tokio::test]
async fn discover_services_sorts_desc_and_filters_empty_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .and(query_param("query", r#"count({service!=""}) by (service)"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vector(&[
            (json!({"service": "b"}), "50"),
            (json!({"service": "a"}), "100"),
            (json!({"service": ""}), "7"),
            (json!({}), "9"),
            (json!({"service": "c"}), "10"),
        ]))))
        .mount(&server)
        .await;

    let services = client(&server).discover_services("service").await.unwrap();
    let got: Vec<(&str, i64)> = services
        .iter()
        .map(|s| (s.name.as_str(), s.series_count))
        .collect();
    assert_eq!(got, [("a", 100), ("b", 50), ("c", 10)]);
}

#[tokio::test]
async fn get_metrics_for_service_sorts_desc() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .and(query_param(
            "query",
            r#"count({service="payments"}) by (__name__)"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vector(&[
            (json!({"__name__": "up"}), "2"),
            (json!({"__name__": "http_requests_total"}), "80"),
        ]))))
        .mount(&server)
        .await;

    let metrics = client(&server)
        .get_metrics_for_service("service", "payments")
        .await
        .unwrap();
    assert_eq!(metrics[0].name, "http_requests_total");
    assert_eq!(metrics[0].series_count, 80);
    assert_eq!(metrics[1].name, "up");
}

#[tokio::test]
async fn cardinality_parses_string_scalar() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .and(query_param("query", "count(up)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "resultType": "vector",
            "result": [{"metric": {}, "value": ["17.2", "42"]}]
        }))))
        .mount(&server)
        .await;

    let count = client(&server).get_metric_cardinality("up").await.unwrap();
    assert_eq!(count, 42);
}

#[tokio::test]
async fn cardinality_of_absent_metric_is_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vector(&[]))))
        .mount(&server)
        .await;

    let count = client(&server).get_metric_cardinality("gone").await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn error_envelope_surfaces_backend_error_after_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "error", "error": "bad query"})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let start = std::time::Instant::now();
    let err = client(&server)
        .get_metric_cardinality("up")
        .await
        .unwrap_err();
    // Backoff between the three attempts: 1 s then 2 s.
    assert!(start.elapsed() >= Duration::from_millis(2900));
    match err {
        Error::Backend(msg) => assert_eq!(msg, "bad query"),
        other => panic!("expected Backend error, got {}", other),
    }
}

#[tokio::test]
async fn transport_failure_retries_then_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server)
        .get_metric_cardinality("up")
        .await
        .unwrap_err();
    match err {
        Error::BackendUnavailable(msg) => assert!(msg.contains("500")),
        other => panic!("expected BackendUnavailable, got {}", other),
    }
}

#[tokio::test]
async fn retry_recovers_after_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "resultType": "vector",
            "result": [{"metric": {}, "value": [1712000000.0, "5"]}]
        }))))
        .mount(&server)
        .await;

    let count = client(&server).get_metric_cardinality("up").await.unwrap();
    assert_eq!(count, 5);
}

#[tokio::test]
async fn basic_auth_header_is_sent() {
    let server = MockServer::start().await;
    // "user:pass" base64-encoded.
    Mock::given(method("GET"))
        .and(path("/-/healthy"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = PromClient::new(PromClientConfig {
        url: server.uri(),
        username: Some("user".to_string()),
        password: Some("pass".to_string()),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    client.health_check().await.unwrap();
}

#[tokio::test]
async fn labels_aggregate_distinct_values_with_cap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/series"))
        .and(query_param("match[]", r#"http_requests_total{service="api"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([
            {"__name__": "http_requests_total", "service": "api", "path": "/c", "code": "200"},
            {"__name__": "http_requests_total", "service": "api", "path": "/a", "code": "200"},
            {"__name__": "http_requests_total", "service": "api", "path": "/b", "code": "200"},
            {"__name__": "http_requests_total", "service": "api", "path": "/a", "code": "500"}
        ]))))
        .mount(&server)
        .await;

    let labels = client(&server)
        .get_labels_for_metric("service", "api", "http_requests_total", 2)
        .await
        .unwrap();

    // __name__ and the service label are excluded; sorted by unique count.
    assert_eq!(labels.len(), 2);
    assert_eq!(labels[0].name, "path");
    assert_eq!(labels[0].unique_values, 3);
    // Capped at 2, deduplicated, lexicographically sorted.
    assert_eq!(labels[0].sample_values, vec!["/a", "/b"]);
    assert_eq!(labels[1].name, "code");
    assert_eq!(labels[1].unique_values, 2);
    assert_eq!(labels[1].sample_values, vec!["200", "500"]);
}

#[tokio::test]
async fn get_all_metric_names_unwraps_label_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/label/__name__/values"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!(["http_requests_total", "up"]))),
        )
        .mount(&server)
        .await;

    let names = client(&server).get_all_metric_names().await.unwrap();
    assert_eq!(names, ["http_requests_total", "up"]);
}

#[tokio::test]
async fn scrape_interval_reads_config_yaml() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/status/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            json!({"yaml": "global:\n  scrape_interval: 30s\n  evaluation_interval: 1m\n"}),
        )))
        .mount(&server)
        .await;

    let interval = client(&server).get_scrape_interval().await;
    assert_eq!(interval, Duration::from_secs(30));
}
