//! Integration tests for HttpApiClient using wiremock

use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use loggy::api::{AnalysisApi, ApiError, HttpApiClient};
use loggy::config::{ApiConfig, Config};
use loggy::models::{RiskLevel, Severity};

fn create_client(mock_server: &MockServer) -> HttpApiClient {
    HttpApiClient::new(&Config::default().api)
        .unwrap()
        .with_base_url(mock_server.uri())
}

#[tokio::test]
async fn test_list_files() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                { "id": 1, "filename": "auth.log", "total_lines": 1247, "file_size": 90211, "is_analyzed": true },
                { "id": 2, "filename": "web.csv", "total_lines": 10, "file_size": 512, "is_analyzed": false }
            ]
        })))
        .mount(&mock_server)
        .await;

    let files = create_client(&mock_server).list_files().await.unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].filename, "auth.log");
    assert!(files[0].is_analyzed);
    assert!(!files[1].is_analyzed);
}

#[tokio::test]
async fn test_analyze_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/analyze/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "summary": {
                "total_lines": 1247,
                "anomaly_count": 23,
                "critical_count": 3,
                "anomaly_rate": 1.84
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let ack = create_client(&mock_server).analyze(42).await.unwrap();

    assert_eq!(ack.summary.total_lines, 1247);
    assert_eq!(ack.summary.anomaly_count, 23);
    assert_eq!(ack.summary.critical_count, 3);
}

#[tokio::test]
async fn test_analyze_error_carries_detail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/analyze/42"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(serde_json::json!({ "detail": "model unavailable" })),
        )
        .mount(&mock_server)
        .await;

    let result = create_client(&mock_server).analyze(42).await;

    let err = result.unwrap_err();
    assert!(matches!(err, ApiError::Status { .. }));
    assert_eq!(err.detail(), Some("model unavailable"));
}

#[tokio::test]
async fn test_analyze_error_without_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/analyze/7"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let err = create_client(&mock_server).analyze(7).await.unwrap_err();
    assert_eq!(err.detail(), None);
}

#[tokio::test]
async fn test_results_decoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/analysis/42/results"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "summary": { "total_lines": 2, "anomaly_count": 1, "critical_count": 1, "anomaly_rate": 50.0 },
            "results": [
                { "line_number": 1, "log_content": "Failed password for root", "severity": "critical",
                  "is_anomaly": true, "confidence": 0.97, "anomaly_probability": 0.91 },
                { "line_number": 2, "log_content": "Accepted publickey", "severity": "info",
                  "is_anomaly": false, "confidence": 0.88, "anomaly_probability": 0.02 }
            ]
        })))
        .mount(&mock_server)
        .await;

    let results = create_client(&mock_server).results(42).await.unwrap().unwrap();

    assert_eq!(results.results.len(), 2);
    assert_eq!(results.results[0].severity, Severity::Critical);
    assert_eq!(results.results[0].content, "Failed password for root");
    assert_eq!(results.summary.map(|s| s.anomaly_count), Some(1));
}

#[tokio::test]
async fn test_results_missing_is_not_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/analysis/9/results"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({ "detail": "No analysis results" })),
        )
        .mount(&mock_server)
        .await;

    let results = create_client(&mock_server).results(9).await.unwrap();
    assert!(results.is_none());
}

#[tokio::test]
async fn test_list_reports() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "reports": [{
                "id": 5,
                "filename": "auth.log",
                "created_at": "2024-03-01T12:30:00",
                "security_report": {
                    "timestamp": "2024-03-01T12:30:00",
                    "summary": {
                        "total_logs": 1247,
                        "total_anomalies": 23,
                        "risk_score": 81.5,
                        "risk_level": "HIGH",
                        "severity_distribution": { "critical": 3, "warning": 20 }
                    },
                    "attack_categories": { "brute_force": 17 },
                    "potential_attacks": [{
                        "attack_type": "Brute Force",
                        "description": "Repeated failed logins",
                        "severity": "HIGH",
                        "indicators": "17 failed attempts",
                        "recommendation": "Enable rate limiting"
                    }],
                    "recommendations": ["Rotate credentials"]
                }
            }]
        })))
        .mount(&mock_server)
        .await;

    let reports = create_client(&mock_server).list_reports().await.unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.risk_score(), Some(82));
    // Derived from the score, not taken from the payload
    assert_eq!(report.risk_level(), Some(RiskLevel::Critical));
    assert_eq!(report.potential_attacks().len(), 1);
    assert_eq!(report.recommendations(), ["Rotate credentials".to_string()]);
    assert!(report.created_at.is_some());
}

#[tokio::test]
async fn test_download_report() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/reports/5/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{\"id\":5}".to_vec()))
        .mount(&mock_server)
        .await;

    let body = create_client(&mock_server).download_report(5).await.unwrap();
    assert_eq!(body, b"{\"id\":5}");
}

#[tokio::test]
async fn test_upload_multipart() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "File uploaded successfully",
            "file_id": 12,
            "filename": "auth.log",
            "file_size": 42,
            "total_lines": 2
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let receipt = create_client(&mock_server)
        .upload("auth.log", b"line one\nline two\n".to_vec())
        .await
        .unwrap();

    assert_eq!(receipt.file_id, 12);
    assert_eq!(receipt.total_lines, 2);
}

#[tokio::test]
async fn test_configured_timeout_is_applied() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/files"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "files": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let client = HttpApiClient::new(&ApiConfig {
        base_url: mock_server.uri(),
        request_timeout_secs: 1,
    })
    .unwrap();

    let err = client.list_files().await.unwrap_err();
    assert!(matches!(err, ApiError::Http(ref e) if e.is_timeout()), "unexpected error: {}", err);
}
