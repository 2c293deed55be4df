//! End-to-end scenarios against a mock backend over real HTTP.

use jarvis_core::{Category, ControlCommand, Payload};
use jarvis_engine::{Dashboard, FetchOutcome, PhraseClassifier, Stage};
use jarvis_providers::ApiConfig;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_dashboard_endpoints(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/system-control/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "os": "Windows",
            "processor": "AMD64 Family 25",
            "memory_total": 34359738368u64,
            "cpu_cores": 16
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/system-control/processes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "explorer.exe", "pid": 4120, "status": "running", "username": "dev"}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/system-control/network"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "adapter query failed"})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn initial_load_isolates_the_failing_category() {
    let server = MockServer::start().await;
    let td = tempfile::tempdir().unwrap();
    mount_dashboard_endpoints(&server).await;

    let cfg = ApiConfig::default().with_base_url(&server.uri());
    let dash = Dashboard::from_config(cfg, td.path());
    let report = dash.activate().await;

    assert_eq!(report.get(Category::SystemInfo), Some(FetchOutcome::Updated));
    assert_eq!(report.get(Category::ProcessList), Some(FetchOutcome::Updated));
    assert_eq!(report.get(Category::NetworkInfo), Some(FetchOutcome::Failed));

    let snap = dash.snapshot();
    let net = snap.get(Category::NetworkInfo);
    assert!(!net.loading);
    assert!(net.data.is_none());
    let err = net.error.as_ref().expect("network error");
    assert_eq!(err.code, "E_HTTP_STATUS_500");
    assert_eq!(err.message, "adapter query failed");

    match &snap.get(Category::SystemInfo).data {
        Some(Payload::SystemInfo(info)) => assert_eq!(info.cpu_cores, 16),
        other => panic!("unexpected system info: {other:?}"),
    }
    match &snap.get(Category::ProcessList).data {
        Some(Payload::ProcessList(list)) => assert_eq!(list[0].name, "explorer.exe"),
        other => panic!("unexpected process list: {other:?}"),
    }

    let metrics = std::fs::read_to_string(td.path().join("metrics.jsonl")).unwrap();
    assert!(metrics.contains("\"outcome\":\"failed\""));
}

#[tokio::test]
async fn silent_listen_never_reaches_chat() {
    let server = MockServer::start().await;
    let td = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/listen"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": ""})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ai-chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "unused"})))
        .expect(0)
        .mount(&server)
        .await;

    let cfg = ApiConfig::default().with_base_url(&server.uri());
    let dash = Dashboard::from_config(cfg, td.path());
    let run = dash.listen().await.expect("run");

    assert_eq!(run.stage_failed, Some(Stage::Listen));
    assert_eq!(run.transcript, None);
}

#[tokio::test]
async fn voice_command_runs_through_to_the_control_endpoint() {
    let server = MockServer::start().await;
    let td = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/listen"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "Open Notepad please"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ai-chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "Opening Notepad."})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/system-control"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Executed command matching: open notepad"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = ApiConfig::default().with_base_url(&server.uri());
    let dash = Dashboard::from_config_with(cfg, td.path(), Arc::new(PhraseClassifier));
    let run = dash.listen().await.expect("run");

    assert!(run.succeeded());
    assert_eq!(run.ai_response.as_deref(), Some("Opening Notepad."));
    assert_eq!(
        run.control_outcome,
        Some(jarvis_engine::ControlOutcome::Dispatched {
            command: ControlCommand::OpenNotepad,
            message: "Executed command matching: open notepad".to_string(),
        })
    );
    assert!(dash.snapshot().get(Category::ControlActions).data.is_none());
}
