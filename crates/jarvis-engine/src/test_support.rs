use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use jarvis_core::{
    CategoryEndpoint, ControlCommand, MemoryTotal, NetworkError, NetworkInfo, Payload,
    ProcessEntry, SystemInfo,
};
use jarvis_providers::{AssistantApi, ChatReply, ControlReply, ListenReply};
use tokio::sync::Semaphore;

/// Scripted backend. Every call is recorded as `"<op>"` or `"<op>:<arg>"`.
/// A gated fake parks each call until `release` hands out permits.
pub(crate) struct FakeApi {
    pub listen: Mutex<Result<String, NetworkError>>,
    pub chat: Mutex<Result<String, NetworkError>>,
    pub control: Mutex<Result<String, NetworkError>>,
    pub speak: Mutex<Result<(), NetworkError>>,
    pub fetch: Mutex<HashMap<CategoryEndpoint, Result<Payload, NetworkError>>>,
    calls: Mutex<Vec<String>>,
    gate: Semaphore,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::with_permits(Semaphore::MAX_PERMITS)
    }

    pub fn gated() -> Self {
        Self::with_permits(0)
    }

    fn with_permits(permits: usize) -> Self {
        let fetch = CategoryEndpoint::ALL
            .into_iter()
            .map(|e| (e, Ok(sample_payload(e))))
            .collect();
        Self {
            listen: Mutex::new(Ok("hello jarvis".to_string())),
            chat: Mutex::new(Ok("Hello! How can I help?".to_string())),
            control: Mutex::new(Ok("Executed command".to_string())),
            speak: Mutex::new(Ok(())),
            fetch: Mutex::new(fetch),
            calls: Mutex::new(Vec::new()),
            gate: Semaphore::new(permits),
        }
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.as_str() == op || c.starts_with(&format!("{op}:")))
            .count()
    }

    async fn enter(&self, call: String) {
        self.calls.lock().unwrap().push(call);
        // Each call consumes its permit, so `release(n)` lets exactly n calls through.
        self.gate.acquire().await.unwrap().forget();
    }
}

pub(crate) fn sample_payload(endpoint: CategoryEndpoint) -> Payload {
    match endpoint {
        CategoryEndpoint::Info => Payload::SystemInfo(SystemInfo {
            os: "Linux".to_string(),
            processor: "x86_64".to_string(),
            memory_total: MemoryTotal::Text("16 GB".to_string()),
            cpu_cores: 8,
        }),
        CategoryEndpoint::Processes => Payload::ProcessList(vec![ProcessEntry {
            name: "init".to_string(),
            pid: 1,
            status: "sleeping".to_string(),
            username: None,
        }]),
        CategoryEndpoint::Network => Payload::NetworkInfo(NetworkInfo {
            ip: "10.0.0.2".to_string(),
            interfaces: vec!["eth0".to_string()],
            internet_connectivity: true,
        }),
    }
}

/// Polls `fut` exactly once; `None` if it parked.
pub(crate) async fn poll_once<F: std::future::Future + Unpin>(fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        out = fut => Some(out),
        _ = std::future::ready(()) => None,
    }
}

pub(crate) fn http_500(msg: &str) -> NetworkError {
    NetworkError::status(500, msg)
}

#[async_trait]
impl AssistantApi for FakeApi {
    async fn fetch_category(&self, endpoint: CategoryEndpoint) -> Result<Payload, NetworkError> {
        self.enter(format!("fetch:{}", endpoint.as_str())).await;
        self.fetch
            .lock()
            .unwrap()
            .get(&endpoint)
            .cloned()
            .unwrap_or_else(|| Err(http_500("not scripted")))
    }

    async fn chat(&self, prompt: &str) -> Result<ChatReply, NetworkError> {
        self.enter(format!("chat:{prompt}")).await;
        self.chat
            .lock()
            .unwrap()
            .clone()
            .map(|response| ChatReply { response })
    }

    async fn dispatch_control(
        &self,
        command: ControlCommand,
    ) -> Result<ControlReply, NetworkError> {
        self.enter(format!("control:{}", command.as_str())).await;
        self.control
            .lock()
            .unwrap()
            .clone()
            .map(|message| ControlReply {
                message,
                success: Some(true),
            })
    }

    async fn listen(&self) -> Result<ListenReply, NetworkError> {
        self.enter("listen".to_string()).await;
        self.listen
            .lock()
            .unwrap()
            .clone()
            .map(|text| ListenReply { text })
    }

    async fn speak(&self, text: &str, voice_type: &str) -> Result<(), NetworkError> {
        self.enter(format!("speak:{text}|{voice_type}")).await;
        self.speak.lock().unwrap().clone()
    }
}
