use std::path::{Path, PathBuf};

use jarvis_observability::metrics;
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageEvent {
    pub run_id: String,
    pub stage: String,
    pub status: String, // started|completed|failed|skipped
    pub message: String,
    pub elapsed_ms: Option<u128>,
    pub error_code: Option<String>,
}

/// Fans stage events out to live subscribers and mirrors each one into
/// metrics.jsonl. Sending never blocks; slow subscribers just lag.
pub struct EventBus {
    tx: broadcast::Sender<StageEvent>,
    data_dir: PathBuf,
}

impl EventBus {
    pub fn new(data_dir: &Path) -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tx,
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.tx.subscribe()
    }

    pub fn started(&self, run_id: &str, stage: &str, msg: &str) {
        self.emit(StageEvent {
            run_id: run_id.to_string(),
            stage: stage.to_string(),
            status: "started".to_string(),
            message: msg.to_string(),
            elapsed_ms: None,
            error_code: None,
        });
    }

    pub fn completed(&self, run_id: &str, stage: &str, elapsed_ms: u128, msg: impl Into<String>) {
        self.emit(StageEvent {
            run_id: run_id.to_string(),
            stage: stage.to_string(),
            status: "completed".to_string(),
            message: msg.into(),
            elapsed_ms: Some(elapsed_ms),
            error_code: None,
        });
    }

    pub fn failed(
        &self,
        run_id: &str,
        stage: &str,
        elapsed_ms: Option<u128>,
        code: &str,
        msg: &str,
    ) {
        self.emit(StageEvent {
            run_id: run_id.to_string(),
            stage: stage.to_string(),
            status: "failed".to_string(),
            message: msg.to_string(),
            elapsed_ms,
            error_code: Some(code.to_string()),
        });
    }

    pub fn skipped(&self, run_id: &str, stage: &str, reason: &str) {
        self.emit(StageEvent {
            run_id: run_id.to_string(),
            stage: stage.to_string(),
            status: "skipped".to_string(),
            message: reason.to_string(),
            elapsed_ms: None,
            error_code: None,
        });
    }

    fn emit(&self, ev: StageEvent) {
        let _ = self.tx.send(ev.clone());
        metrics::append_best_effort(
            &self.data_dir,
            "stage_event",
            &json!({"type":"stage_event", "run_id":ev.run_id, "stage":ev.stage, "status":ev.status, "elapsed_ms":ev.elapsed_ms, "error_code":ev.error_code, "message":ev.message}),
        );
    }
}
