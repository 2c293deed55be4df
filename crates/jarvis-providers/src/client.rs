use std::path::{Path, PathBuf};

use async_trait::async_trait;
use jarvis_core::{
    error::{E_HTTP_PARSE, E_HTTP_SEND},
    CategoryEndpoint, ControlCommand, NetworkError, NetworkInfo, Payload, ProcessEntry, SystemInfo,
};
use jarvis_observability::{text_fingerprint, Span};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ApiConfig;

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControlReply {
    pub message: String,
    #[serde(default)]
    pub success: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenReply {
    // The backend sends "" when nothing was heard; a missing field means the same.
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
struct ChatReq<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct ControlReq<'a> {
    command: &'a str,
}

#[derive(Debug, Serialize)]
struct SpeakReq<'a> {
    text: &'a str,
    voice_type: &'a str,
}

/// The remote backend, one method per capability. Every failure is a
/// [`NetworkError`] so callers need a single failure branch.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn fetch_category(&self, endpoint: CategoryEndpoint) -> Result<Payload, NetworkError>;

    async fn chat(&self, prompt: &str) -> Result<ChatReply, NetworkError>;

    async fn dispatch_control(&self, command: ControlCommand)
        -> Result<ControlReply, NetworkError>;

    async fn listen(&self) -> Result<ListenReply, NetworkError>;

    async fn speak(&self, text: &str, voice_type: &str) -> Result<(), NetworkError>;
}

pub struct HttpAssistantApi {
    client: Client,
    cfg: ApiConfig,
    data_dir: PathBuf,
}

impl HttpAssistantApi {
    pub fn new(cfg: ApiConfig, data_dir: &Path) -> Self {
        Self {
            client: Client::new(),
            cfg,
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.cfg
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.base_url, path)
    }

    fn span(&self, step_id: &str, ctx: Value) -> Span {
        Span::start(&self.data_dir, None, "Api", step_id, Some(ctx))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, NetworkError> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(send_error)?;
        read_json(resp).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, NetworkError> {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(send_error)?;
        read_json(resp).await
    }

    async fn fetch_category_inner(
        &self,
        endpoint: CategoryEndpoint,
    ) -> Result<Payload, NetworkError> {
        let path = endpoint.path();
        match endpoint {
            CategoryEndpoint::Info => self
                .get_json::<SystemInfo>(&path)
                .await
                .map(Payload::SystemInfo),
            CategoryEndpoint::Processes => self
                .get_json::<Vec<ProcessEntry>>(&path)
                .await
                .map(Payload::ProcessList),
            CategoryEndpoint::Network => self
                .get_json::<NetworkInfo>(&path)
                .await
                .map(Payload::NetworkInfo),
        }
    }
}

#[async_trait]
impl AssistantApi for HttpAssistantApi {
    async fn fetch_category(&self, endpoint: CategoryEndpoint) -> Result<Payload, NetworkError> {
        let span = self.span(
            "API.fetch_category",
            json!({"endpoint": endpoint.as_str()}),
        );
        let out = self.fetch_category_inner(endpoint).await;
        let ok_ctx = match &out {
            Ok(Payload::ProcessList(list)) => Some(json!({"processes": list.len()})),
            _ => None,
        };
        finish_span(span, &out, ok_ctx);
        out
    }

    async fn chat(&self, prompt: &str) -> Result<ChatReply, NetworkError> {
        let span = self.span("API.chat", json!({"prompt": text_fingerprint(prompt)}));
        let out: Result<ChatReply, NetworkError> =
            self.post_json("/ai-chat", &ChatReq { prompt }).await;
        let ok_ctx = out
            .as_ref()
            .ok()
            .map(|r| json!({"response": text_fingerprint(&r.response)}));
        finish_span(span, &out, ok_ctx);
        out
    }

    async fn dispatch_control(
        &self,
        command: ControlCommand,
    ) -> Result<ControlReply, NetworkError> {
        let span = self.span(
            "API.dispatch_control",
            json!({"command": command.as_str(), "path": self.cfg.control_path}),
        );
        let req = ControlReq {
            command: command.as_str(),
        };
        let out: Result<ControlReply, NetworkError> =
            self.post_json(&self.cfg.control_path, &req).await;
        let ok_ctx = out
            .as_ref()
            .ok()
            .map(|r| json!({"success": r.success}));
        finish_span(span, &out, ok_ctx);
        out
    }

    async fn listen(&self) -> Result<ListenReply, NetworkError> {
        let span = self.span("API.listen", json!({}));
        let out: Result<ListenReply, NetworkError> = self.get_json("/listen").await;
        let ok_ctx = out
            .as_ref()
            .ok()
            .map(|r| json!({"text": text_fingerprint(&r.text)}));
        finish_span(span, &out, ok_ctx);
        out
    }

    async fn speak(&self, text: &str, voice_type: &str) -> Result<(), NetworkError> {
        let span = self.span(
            "API.speak",
            json!({"text": text_fingerprint(text), "voice_type": voice_type}),
        );
        let out = async {
            let resp = self
                .client
                .post(self.url("/speak"))
                .json(&SpeakReq { text, voice_type })
                .send()
                .await
                .map_err(send_error)?;
            read_completion(resp).await
        }
        .await;
        finish_span(span, &out, None);
        out
    }
}

fn finish_span<T>(span: Span, out: &Result<T, NetworkError>, ok_ctx: Option<Value>) {
    match out {
        Ok(_) => span.ok(ok_ctx),
        Err(e) => span.err("http", &e.code, &e.message, None),
    }
}

fn send_error(e: reqwest::Error) -> NetworkError {
    NetworkError::new(E_HTTP_SEND, format!("request failed: {e}"))
}

async fn read_body(resp: Response) -> Result<String, NetworkError> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| NetworkError::new(E_HTTP_PARSE, format!("read response failed: {e}")))?;
    if !status.is_success() {
        return Err(NetworkError::status(
            status.as_u16(),
            backend_error_message(&body),
        ));
    }
    Ok(body)
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, NetworkError> {
    let body = read_body(resp).await?;
    serde_json::from_str(&body)
        .map_err(|e| NetworkError::new(E_HTTP_PARSE, format!("invalid json response: {e}")))
}

/// For endpoints whose success carries no payload: an empty body or any JSON value.
async fn read_completion(resp: Response) -> Result<(), NetworkError> {
    let body = read_body(resp).await?;
    if body.trim().is_empty() {
        return Ok(());
    }
    serde_json::from_str::<serde::de::IgnoredAny>(&body)
        .map(|_| ())
        .map_err(|e| NetworkError::new(E_HTTP_PARSE, format!("invalid json response: {e}")))
}

/// The backend reports failures as `{"error": ...}` (or `{"message": ...}`);
/// that text is surfaced as-is. Anything else is passed through truncated.
pub(crate) fn backend_error_message(body: &str) -> String {
    if let Ok(Value::Object(m)) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message"] {
            if let Some(Value::String(s)) = m.get(key) {
                if !s.trim().is_empty() {
                    return s.clone();
                }
            }
        }
    }
    let t = body.trim();
    if t.is_empty() {
        return "empty response body".to_string();
    }
    if t.chars().count() > MAX_ERROR_BODY_CHARS {
        let head: String = t.chars().take(MAX_ERROR_BODY_CHARS).collect();
        return format!("{head}...(truncated)");
    }
    t.to_string()
}
