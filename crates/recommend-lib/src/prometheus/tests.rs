//! Tests for the Prometheus adapter
//!
//! The HTTP client is exercised against a mockito server; the checker
//! against a static in-memory source.

use super::*;
use mockito::Matcher;
use std::sync::Arc;
use std::time::Duration;

const VECTOR_BODY: &str = r#"{
    "status": "success",
    "data": {
        "resultType": "vector",
        "result": [
            {"metric": {"container": "app"}, "value": [1700000000.0, "104857600"]},
            {"metric": {"container": "sidecar"}, "value": [1700000000.0, "NaN"]}
        ]
    }
}"#;

const MATRIX_BODY: &str = r#"{
    "status": "success",
    "data": {
        "resultType": "matrix",
        "result": [
            {
                "metric": {"replicaset": "web-7d9f8", "owner_name": "web"},
                "values": [[1699996400, "1"], [1699996460, "1"]]
            }
        ]
    }
}"#;

fn client_for(server: &mockito::ServerGuard) -> PrometheusClient {
    PrometheusClient::new(&server.url(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_instant_query_at_time() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), "container_memory_rss".into()),
            Matcher::UrlEncoded("time".into(), "1700000000".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(VECTOR_BODY)
        .create_async()
        .await;

    let client = client_for(&server);
    let result = client
        .instant("container_memory_rss", Some(1_700_000_000))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].label("container"), Some("app"));
    assert_eq!(result[0].instant_value(), Some(104_857_600.0));
    // NaN is dropped at the sample level, not at the query level
    assert_eq!(result[1].instant_value(), None);
}

#[tokio::test]
async fn test_instant_query_without_time() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::UrlEncoded("query".into(), "up".into()))
        .with_status(200)
        .with_body(r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let result = client.instant("up", None).await.unwrap();

    mock.assert_async().await;
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_range_query_parameters() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/query_range")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded(
                "query".into(),
                r#"kube_replicaset_owner{namespace="prod", owner_name="web"}"#.into(),
            ),
            Matcher::UrlEncoded("start".into(), "1699996400".into()),
            Matcher::UrlEncoded("end".into(), "1700000000".into()),
            Matcher::UrlEncoded("step".into(), "60".into()),
        ]))
        .with_status(200)
        .with_body(MATRIX_BODY)
        .create_async()
        .await;

    let client = client_for(&server);
    let result = client
        .range(
            r#"kube_replicaset_owner{namespace="prod", owner_name="web"}"#,
            1_699_996_400,
            1_700_000_000,
            60,
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].label("replicaset"), Some("web-7d9f8"));
    assert_eq!(result[0].values.len(), 2);
    assert_eq!(result[0].values[1].timestamp(), 1_699_996_460.0);
    assert_eq!(result[0].values[1].as_f64(), Some(1.0));
}

#[tokio::test]
async fn test_non_success_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("overloaded")
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.instant("up", None).await.unwrap_err();

    match err {
        MetricsError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_status_in_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"status":"error","errorType":"bad_data","error":"parse error"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.instant("up{", None).await.unwrap_err();

    assert!(matches!(err, MetricsError::QueryFailed(msg) if msg == "parse error"));
}

#[tokio::test]
async fn test_malformed_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>not prometheus</html>")
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.instant("up", None).await.unwrap_err();

    assert!(matches!(err, MetricsError::Decode(_)));
}

#[tokio::test]
async fn test_base_url_path_prefix_is_kept() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/prometheus/api/v1/query")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"status":"success","data":{"result":[]}}"#)
        .create_async()
        .await;

    let client =
        PrometheusClient::new(&format!("{}/prometheus", server.url()), Duration::from_secs(5))
            .unwrap();
    assert_eq!(client.base_url().path(), "/prometheus/");
    client.instant("up", None).await.unwrap();

    mock.assert_async().await;
}

#[test]
fn test_invalid_base_url() {
    assert!(matches!(
        PrometheusClient::new("not a url", Duration::from_secs(1)),
        Err(MetricsError::InvalidUrl(_))
    ));
    assert!(matches!(
        PrometheusClient::new("ftp://prometheus", Duration::from_secs(1)),
        Err(MetricsError::InvalidUrl(_))
    ));
}

#[test]
fn test_parse_sample_value() {
    assert_eq!(parse_sample_value("42"), Some(42.0));
    assert_eq!(parse_sample_value("1.5e3"), Some(1500.0));
    assert_eq!(parse_sample_value(" 7 "), Some(7.0));
    assert_eq!(parse_sample_value("abc"), None);
    assert_eq!(parse_sample_value(""), None);
    assert_eq!(parse_sample_value("NaN"), None);
    assert_eq!(parse_sample_value("+Inf"), None);
}

#[test]
fn test_alternation() {
    assert_eq!(alternation(["a", "b", "c"]), "a|b|c");
    assert_eq!(alternation(["only"]), "only");
    assert_eq!(alternation(Vec::<String>::new()), "");
}

/// Answers every query with a fixed result, keyed by metric name
struct StaticSource {
    empty: Vec<&'static str>,
    failing: Vec<&'static str>,
}

#[async_trait]
impl MetricsSource for StaticSource {
    async fn instant(&self, query: &str, _time: Option<i64>) -> Result<ResultSet, MetricsError> {
        let name = query.split('{').next().unwrap_or(query);
        if self.failing.contains(&name) {
            return Err(MetricsError::QueryFailed("backend down".to_string()));
        }
        if self.empty.contains(&name) {
            return Ok(Vec::new());
        }
        Ok(vec![Series {
            value: Some(Sample::new(0.0, "1")),
            ..Default::default()
        }])
    }

    async fn range(
        &self,
        _query: &str,
        _start: i64,
        _end: i64,
        _step_secs: u32,
    ) -> Result<ResultSet, MetricsError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_checker_all_available() {
    let source = Arc::new(StaticSource {
        empty: vec![],
        failing: vec![],
    });
    let checker = MetricsChecker::new(source, "prod");
    let report = checker.check_required_metrics().await;

    assert_eq!(report.checks.len(), 7);
    assert!(report.is_ready());
    assert_eq!(report.missing().count(), 0);
    assert!(report.checks[5].query.contains(r#"resource="memory""#));
    assert!(report.checks.iter().all(|c| c.query.contains(r#"namespace="prod""#)));
}

#[tokio::test]
async fn test_checker_reports_empty_and_failed() {
    let source = Arc::new(StaticSource {
        empty: vec!["kube_pod_owner"],
        failing: vec!["kube_deployment_created"],
    });
    let checker = MetricsChecker::new(source, "prod");
    let report = checker.check_required_metrics().await;

    assert!(!report.is_ready());
    let missing: Vec<_> = report.missing().collect();
    assert_eq!(missing.len(), 2);
    assert_eq!(missing[0].status, MetricStatus::Empty);
    assert!(matches!(missing[1].status, MetricStatus::Failed(_)));
}
