//! Dashboard orchestration: per-category request state, concurrent category
//! fetches, the listen → interpret → act assistant pipeline and control
//! dispatch, all on top of an [`jarvis_providers::AssistantApi`].

pub mod classifier;
pub mod dashboard;
pub mod dispatcher;
pub mod events;
pub mod orchestrator;
pub mod pipeline;
pub mod store;

#[cfg(test)]
mod test_support;

pub use classifier::{CommandClassifier, NoCommandClassifier, PhraseClassifier};
pub use dashboard::Dashboard;
pub use dispatcher::{ControlDispatcher, ControlGate, ControlPermit};
pub use events::{EventBus, StageEvent};
pub use orchestrator::{FetchOrchestrator, FetchOutcome, FetchReport};
pub use pipeline::{AssistantPipeline, ControlOutcome, Phase, PipelineRun, SpeakOutcome, Stage};
pub use store::{Attempt, CategoryStore, StoreSnapshot};
