use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Instant,
};

use jarvis_core::{
    Category, ChatExchange, ControlCommand, DashboardError, ErrorContext, ErrorRecord,
    NetworkError, Payload, Transcript,
};
use jarvis_observability::{text_fingerprint, trace, Span};
use jarvis_providers::AssistantApi;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    classifier::CommandClassifier, dispatcher::ControlGate, events::EventBus,
    store::CategoryStore,
};

/// What the backend answers when it heard audio but recognized nothing.
const NO_SPEECH_REPLIES: [&str; 1] = ["Sorry, I did not understand that."];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Listen,
    Interpret,
    Act,
    Speak,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Listen => "Listen",
            Stage::Interpret => "Interpret",
            Stage::Act => "Act",
            Stage::Speak => "Speak",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Listening,
    Interpreting,
    Acting,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ControlOutcome {
    Dispatched {
        command: ControlCommand,
        message: String,
    },
    Failed {
        command: ControlCommand,
        error: ErrorRecord,
    },
}

/// Result of one listen → interpret → act run. Returned to the caller, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub transcript: Option<String>,
    pub ai_response: Option<String>,
    pub control_outcome: Option<ControlOutcome>,
    pub stage_failed: Option<Stage>,
    pub error: Option<ErrorRecord>,
}

impl PipelineRun {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            transcript: None,
            ai_response: None,
            control_outcome: None,
            stage_failed: None,
            error: None,
        }
    }

    fn fail(&mut self, stage: Stage, error: ErrorRecord) {
        self.stage_failed = Some(stage);
        self.error = Some(error);
    }

    pub fn succeeded(&self) -> bool {
        self.stage_failed.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpeakOutcome {
    Spoken,
    /// Nothing to say; no request was made.
    Skipped,
    /// Another utterance is still playing.
    Busy,
    Failed { code: String, message: String },
}

pub fn is_no_speech(text: &str) -> bool {
    let t = text.trim();
    t.is_empty() || NO_SPEECH_REPLIES.iter().any(|s| t.eq_ignore_ascii_case(s))
}

struct ActiveRun {
    run_id: String,
    phase: Phase,
}

/// Clears the active run when the run ends, however it ends.
struct RunGuard {
    inner: Arc<Mutex<Option<ActiveRun>>>,
    run_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut g = lock(&self.inner);
        if g.as_ref().map(|a| a.run_id == self.run_id).unwrap_or(false) {
            *g = None;
        }
    }
}

/// Clears the speaking flag even when the speak future is dropped mid-request.
struct SpeakGuard<'a>(&'a AtomicBool);

impl Drop for SpeakGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock(inner: &Mutex<Option<ActiveRun>>) -> MutexGuard<'_, Option<ActiveRun>> {
    inner.lock().unwrap_or_else(|p| p.into_inner())
}

pub struct AssistantPipeline {
    api: Arc<dyn AssistantApi>,
    store: Arc<CategoryStore>,
    classifier: Arc<dyn CommandClassifier>,
    events: Arc<EventBus>,
    control_gate: Arc<ControlGate>,
    data_dir: PathBuf,
    active: Arc<Mutex<Option<ActiveRun>>>,
    speaking: AtomicBool,
}

impl AssistantPipeline {
    pub fn new(
        api: Arc<dyn AssistantApi>,
        store: Arc<CategoryStore>,
        classifier: Arc<dyn CommandClassifier>,
        events: Arc<EventBus>,
        control_gate: Arc<ControlGate>,
        data_dir: &Path,
    ) -> Self {
        Self {
            api,
            store,
            classifier,
            events,
            control_gate,
            data_dir: data_dir.to_path_buf(),
            active: Arc::new(Mutex::new(None)),
            speaking: AtomicBool::new(false),
        }
    }

    pub fn phase(&self) -> Phase {
        lock(&self.active)
            .as_ref()
            .map(|a| a.phase)
            .unwrap_or(Phase::Idle)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.active).is_some()
    }

    fn claim(&self, run_id: &str) -> Option<RunGuard> {
        let mut g = lock(&self.active);
        if g.is_some() {
            return None;
        }
        *g = Some(ActiveRun {
            run_id: run_id.to_string(),
            phase: Phase::Listening,
        });
        Some(RunGuard {
            inner: self.active.clone(),
            run_id: run_id.to_string(),
        })
    }

    fn set_phase(&self, run_id: &str, phase: Phase) {
        let mut g = lock(&self.active);
        if let Some(a) = g.as_mut() {
            if a.run_id == run_id {
                a.phase = phase;
            }
        }
    }

    /// Runs listen → interpret → act. `None` when a run is already active.
    pub async fn listen(&self) -> Option<PipelineRun> {
        let run_id = Uuid::new_v4().to_string();
        let Some(_guard) = self.claim(&run_id) else {
            trace::event(&self.data_dir, None, "Pipeline", "PIPE.busy", "skipped", None);
            return None;
        };
        let span = Span::start(&self.data_dir, Some(&run_id), "Pipeline", "PIPE.run", None);

        let mut run = PipelineRun::new(run_id.clone());
        let mut phase = Phase::Listening;
        while phase != Phase::Done {
            self.set_phase(&run_id, phase);
            phase = match phase {
                Phase::Listening => self.listen_stage(&mut run).await,
                Phase::Interpreting => self.interpret_stage(&mut run).await,
                Phase::Acting => self.act_stage(&mut run).await,
                Phase::Idle | Phase::Done => Phase::Done,
            };
        }
        self.set_phase(&run_id, Phase::Done);

        match (&run.stage_failed, &run.error) {
            (Some(stage), Some(e)) => span.err(
                "pipeline",
                &e.code,
                &e.message,
                Some(json!({"stage": stage.as_str()})),
            ),
            _ => span.ok(Some(json!({"acted": run.control_outcome.is_some()}))),
        }
        Some(run)
    }

    async fn listen_stage(&self, run: &mut PipelineRun) -> Phase {
        let stage = Stage::Listen;
        let attempt = match self.store.attempt(Category::Voice) {
            Ok(a) => a,
            Err(e) => {
                self.stage_error(run, stage, None, &e);
                return Phase::Done;
            }
        };
        self.events.started(&run.run_id, stage.as_str(), "listening");
        let t0 = Instant::now();
        match self.api.listen().await {
            Ok(reply) if !is_no_speech(&reply.text) => {
                let text = reply.text.trim().to_string();
                attempt.succeed(Payload::Voice(Transcript { text: text.clone() }));
                self.events.completed(
                    &run.run_id,
                    stage.as_str(),
                    t0.elapsed().as_millis(),
                    format!("{} chars", text.chars().count()),
                );
                run.transcript = Some(text);
                Phase::Interpreting
            }
            Ok(_) => {
                let e = DashboardError::EmptyTranscript;
                attempt.fail(ErrorRecord::from_error(ErrorContext::Category(Category::Voice), &e));
                self.stage_error(run, stage, Some(t0), &e);
                Phase::Done
            }
            Err(e) => {
                let e = DashboardError::from(e);
                attempt.fail(ErrorRecord::from_error(ErrorContext::Category(Category::Voice), &e));
                self.stage_error(run, stage, Some(t0), &e);
                Phase::Done
            }
        }
    }

    async fn interpret_stage(&self, run: &mut PipelineRun) -> Phase {
        let stage = Stage::Interpret;
        let Some(transcript) = run.transcript.clone() else {
            return Phase::Done;
        };
        let attempt = match self.store.attempt(Category::Chat) {
            Ok(a) => a,
            Err(e) => {
                self.stage_error(run, stage, None, &e);
                return Phase::Done;
            }
        };
        self.events.started(&run.run_id, stage.as_str(), "asking assistant");
        let t0 = Instant::now();
        match self.api.chat(&transcript).await {
            Ok(reply) => {
                attempt.succeed(Payload::Chat(ChatExchange {
                    prompt: transcript,
                    response: reply.response.clone(),
                }));
                self.events.completed(
                    &run.run_id,
                    stage.as_str(),
                    t0.elapsed().as_millis(),
                    format!("{} chars", reply.response.chars().count()),
                );
                run.ai_response = Some(reply.response);
                Phase::Acting
            }
            Err(e) => {
                let e = DashboardError::from(e);
                attempt.fail(ErrorRecord::from_error(ErrorContext::Category(Category::Chat), &e));
                self.stage_error(run, stage, Some(t0), &e);
                Phase::Done
            }
        }
    }

    async fn act_stage(&self, run: &mut PipelineRun) -> Phase {
        let stage = Stage::Act;
        let transcript = run.transcript.as_deref().unwrap_or_default();
        let response = run.ai_response.as_deref().unwrap_or_default();
        let Some(command) = self.classifier.classify(transcript, response) else {
            self.events
                .skipped(&run.run_id, stage.as_str(), "no control command");
            return Phase::Done;
        };

        // Shares the dispatcher's gate but never writes ControlActions.
        let Some(_permit) = self.control_gate.try_claim() else {
            let e = DashboardError::AlreadyInFlight(ErrorContext::ControlAction);
            self.events
                .failed(&run.run_id, stage.as_str(), None, e.code(), &e.message());
            run.control_outcome = Some(ControlOutcome::Failed {
                command,
                error: ErrorRecord::from_error(ErrorContext::ControlAction, &e),
            });
            return Phase::Done;
        };

        self.events.started(&run.run_id, stage.as_str(), command.as_str());
        let t0 = Instant::now();
        run.control_outcome = Some(match self.api.dispatch_control(command).await {
            Ok(reply) => {
                self.events.completed(
                    &run.run_id,
                    stage.as_str(),
                    t0.elapsed().as_millis(),
                    reply.message.clone(),
                );
                ControlOutcome::Dispatched {
                    command,
                    message: reply.message,
                }
            }
            Err(e) => {
                self.events.failed(
                    &run.run_id,
                    stage.as_str(),
                    Some(t0.elapsed().as_millis()),
                    &e.code,
                    &e.message,
                );
                ControlOutcome::Failed {
                    command,
                    error: ErrorRecord::new(ErrorContext::ControlAction, e.code, e.message),
                }
            }
        });
        Phase::Done
    }

    fn stage_error(
        &self,
        run: &mut PipelineRun,
        stage: Stage,
        t0: Option<Instant>,
        e: &DashboardError,
    ) {
        let ctx = match stage {
            Stage::Listen | Stage::Speak => ErrorContext::Category(Category::Voice),
            Stage::Interpret => ErrorContext::Category(Category::Chat),
            Stage::Act => ErrorContext::ControlAction,
        };
        let rec = ErrorRecord::from_error(ctx, e);
        self.events.failed(
            &run.run_id,
            stage.as_str(),
            t0.map(|t| t.elapsed().as_millis()),
            &rec.code,
            &rec.message,
        );
        run.fail(stage, rec);
    }

    /// Typed prompt → Chat category, without listening or acting.
    pub async fn ask(&self, prompt: &str) -> Result<String, DashboardError> {
        let attempt = self.store.attempt(Category::Chat)?;
        let span = Span::start(
            &self.data_dir,
            None,
            "Pipeline",
            "PIPE.ask",
            Some(json!({"prompt": text_fingerprint(prompt)})),
        );
        match self.api.chat(prompt).await {
            Ok(reply) => {
                attempt.succeed(Payload::Chat(ChatExchange {
                    prompt: prompt.to_string(),
                    response: reply.response.clone(),
                }));
                span.ok(None);
                Ok(reply.response)
            }
            Err(e) => Err(self.fail_standalone(attempt, span, Category::Chat, e)),
        }
    }

    /// One listen into the Voice category, without chaining to chat.
    pub async fn transcribe(&self) -> Result<String, DashboardError> {
        let attempt = self.store.attempt(Category::Voice)?;
        let span = Span::start(&self.data_dir, None, "Pipeline", "PIPE.transcribe", None);
        match self.api.listen().await {
            Ok(reply) if !is_no_speech(&reply.text) => {
                let text = reply.text.trim().to_string();
                attempt.succeed(Payload::Voice(Transcript { text: text.clone() }));
                span.ok(Some(json!({"text": text_fingerprint(&text)})));
                Ok(text)
            }
            Ok(_) => {
                let e = DashboardError::EmptyTranscript;
                attempt.fail(ErrorRecord::from_error(ErrorContext::Category(Category::Voice), &e));
                span.skipped("no speech", None);
                Err(e)
            }
            Err(e) => Err(self.fail_standalone(attempt, span, Category::Voice, e)),
        }
    }

    fn fail_standalone(
        &self,
        attempt: crate::store::Attempt<'_>,
        span: Span,
        category: Category,
        e: NetworkError,
    ) -> DashboardError {
        span.err("http", &e.code, &e.message, None);
        attempt.fail(ErrorRecord::new(
            ErrorContext::Category(category),
            e.code.clone(),
            e.message.clone(),
        ));
        e.into()
    }

    /// Soft-failing text-to-speech, one utterance at a time.
    pub async fn speak(&self, text: &str, voice_type: &str) -> SpeakOutcome {
        let run_id = Uuid::new_v4().to_string();
        let stage = Stage::Speak.as_str();
        if text.trim().is_empty() {
            self.events.skipped(&run_id, stage, "nothing to say");
            return SpeakOutcome::Skipped;
        }
        if self
            .speaking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.events.skipped(&run_id, stage, "already speaking");
            return SpeakOutcome::Busy;
        }
        let guard = SpeakGuard(&self.speaking);

        self.events.started(&run_id, stage, voice_type);
        let t0 = Instant::now();
        let out = self.api.speak(text, voice_type).await;
        drop(guard);
        match out {
            Ok(()) => {
                self.events
                    .completed(&run_id, stage, t0.elapsed().as_millis(), "spoken");
                SpeakOutcome::Spoken
            }
            Err(e) => {
                self.events.failed(
                    &run_id,
                    stage,
                    Some(t0.elapsed().as_millis()),
                    &e.code,
                    &e.message,
                );
                SpeakOutcome::Failed {
                    code: e.code,
                    message: e.message,
                }
            }
        }
    }
}
