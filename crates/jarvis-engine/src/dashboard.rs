use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use jarvis_core::{CategoryEndpoint, ControlReceipt, DashboardError};
use jarvis_providers::{ApiConfig, AssistantApi, HttpAssistantApi};
use tokio::sync::{broadcast, watch};

use crate::{
    classifier::{CommandClassifier, NoCommandClassifier},
    dispatcher::{ControlDispatcher, ControlGate},
    events::{EventBus, StageEvent},
    orchestrator::{FetchOrchestrator, FetchOutcome, FetchReport},
    pipeline::{AssistantPipeline, Phase, PipelineRun, SpeakOutcome},
    store::{CategoryStore, StoreSnapshot},
};

/// Everything a dashboard front-end drives: one store shared by the fetch
/// orchestrator, the control dispatcher and the assistant pipeline.
pub struct Dashboard {
    store: Arc<CategoryStore>,
    events: Arc<EventBus>,
    orchestrator: FetchOrchestrator,
    dispatcher: ControlDispatcher,
    pipeline: AssistantPipeline,
    voice_type: String,
    data_dir: PathBuf,
}

impl Dashboard {
    pub fn new(
        api: Arc<dyn AssistantApi>,
        classifier: Arc<dyn CommandClassifier>,
        voice_type: &str,
        data_dir: &Path,
    ) -> Self {
        let store = Arc::new(CategoryStore::new());
        let events = Arc::new(EventBus::new(data_dir));
        let gate = Arc::new(ControlGate::new());
        Self {
            orchestrator: FetchOrchestrator::new(api.clone(), store.clone(), data_dir),
            dispatcher: ControlDispatcher::new(
                api.clone(),
                store.clone(),
                events.clone(),
                gate.clone(),
            ),
            pipeline: AssistantPipeline::new(
                api,
                store.clone(),
                classifier,
                events.clone(),
                gate,
                data_dir,
            ),
            store,
            events,
            voice_type: voice_type.to_string(),
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// Backed by the HTTP client, with the default (never acting) classifier.
    pub fn from_config(cfg: ApiConfig, data_dir: &Path) -> Self {
        Self::from_config_with(cfg, data_dir, Arc::new(NoCommandClassifier))
    }

    pub fn from_config_with(
        cfg: ApiConfig,
        data_dir: &Path,
        classifier: Arc<dyn CommandClassifier>,
    ) -> Self {
        let voice_type = cfg.voice_type.clone();
        let api = Arc::new(HttpAssistantApi::new(cfg, data_dir));
        Self::new(api, classifier, &voice_type, data_dir)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn store(&self) -> &Arc<CategoryStore> {
        &self.store
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.store.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StageEvent> {
        self.events.subscribe()
    }

    pub async fn activate(&self) -> FetchReport {
        self.orchestrator.activate().await
    }

    pub async fn refresh_all(&self) -> FetchReport {
        self.orchestrator.refresh_all().await
    }

    pub async fn refresh(&self, endpoint: CategoryEndpoint) -> FetchOutcome {
        self.orchestrator.refresh(endpoint).await
    }

    pub async fn dispatch_control(&self, raw: &str) -> Result<ControlReceipt, DashboardError> {
        self.dispatcher.dispatch(raw).await
    }

    pub async fn listen(&self) -> Option<PipelineRun> {
        self.pipeline.listen().await
    }

    pub fn pipeline_phase(&self) -> Phase {
        self.pipeline.phase()
    }

    pub async fn ask(&self, prompt: &str) -> Result<String, DashboardError> {
        self.pipeline.ask(prompt).await
    }

    pub async fn transcribe(&self) -> Result<String, DashboardError> {
        self.pipeline.transcribe().await
    }

    /// `voice_type` falls back to the configured voice.
    pub async fn speak(&self, text: &str, voice_type: Option<&str>) -> SpeakOutcome {
        let voice = voice_type
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(&self.voice_type);
        self.pipeline.speak(text, voice).await
    }
}
