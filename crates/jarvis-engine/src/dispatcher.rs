use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use jarvis_core::{
    Category, ControlCommand, ControlReceipt, DashboardError, ErrorContext, ErrorRecord, Payload,
};
use jarvis_providers::AssistantApi;
use uuid::Uuid;

use crate::{events::EventBus, store::CategoryStore};

const STAGE: &str = "Control";

/// At most one OS action in flight, whoever sends it. Shared by the
/// dispatcher and the pipeline's Act stage.
#[derive(Debug, Default)]
pub struct ControlGate {
    busy: AtomicBool,
}

impl ControlGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another action holds the gate.
    pub fn try_claim(&self) -> Option<ControlPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ControlPermit { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the gate on drop, including when the sending future is dropped.
pub struct ControlPermit<'a> {
    gate: &'a ControlGate,
}

impl Drop for ControlPermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Sends dashboard-triggered OS actions, one at a time.
pub struct ControlDispatcher {
    api: Arc<dyn AssistantApi>,
    store: Arc<CategoryStore>,
    events: Arc<EventBus>,
    gate: Arc<ControlGate>,
}

impl ControlDispatcher {
    pub fn new(
        api: Arc<dyn AssistantApi>,
        store: Arc<CategoryStore>,
        events: Arc<EventBus>,
        gate: Arc<ControlGate>,
    ) -> Self {
        Self {
            api,
            store,
            events,
            gate,
        }
    }

    /// Parses `raw` first; an unknown phrase never reaches the network or the store.
    pub async fn dispatch(&self, raw: &str) -> Result<ControlReceipt, DashboardError> {
        let command = ControlCommand::parse(raw)?;
        self.dispatch_command(command).await
    }

    pub async fn dispatch_command(
        &self,
        command: ControlCommand,
    ) -> Result<ControlReceipt, DashboardError> {
        let run_id = Uuid::new_v4().to_string();
        // Rejected, not queued: the caller sees AlreadyInFlight immediately.
        let Some(_permit) = self.gate.try_claim() else {
            return Err(DashboardError::AlreadyInFlight(ErrorContext::ControlAction));
        };
        let attempt = self.store.attempt(Category::ControlActions)?;

        self.events.started(&run_id, STAGE, command.as_str());
        let t0 = Instant::now();
        match self.api.dispatch_control(command).await {
            Ok(reply) => {
                let receipt = ControlReceipt {
                    command,
                    message: reply.message,
                };
                attempt.succeed(Payload::ControlActions(receipt.clone()));
                self.events.completed(
                    &run_id,
                    STAGE,
                    t0.elapsed().as_millis(),
                    receipt.message.clone(),
                );
                Ok(receipt)
            }
            Err(e) => {
                self.events.failed(
                    &run_id,
                    STAGE,
                    Some(t0.elapsed().as_millis()),
                    &e.code,
                    &e.message,
                );
                attempt.fail(ErrorRecord::new(
                    ErrorContext::ControlAction,
                    e.code.clone(),
                    e.message.clone(),
                ));
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeApi;
    use jarvis_core::NetworkError;

    fn setup(api: FakeApi) -> (Arc<FakeApi>, Arc<CategoryStore>, ControlDispatcher, tempfile::TempDir) {
        let td = tempfile::tempdir().expect("tempdir");
        let api = Arc::new(api);
        let store = Arc::new(CategoryStore::new());
        let events = Arc::new(EventBus::new(td.path()));
        let gate = Arc::new(ControlGate::new());
        let d = ControlDispatcher::new(api.clone(), store.clone(), events, gate);
        (api, store, d, td)
    }

    #[test]
    fn gate_admits_one_holder_and_reopens_on_drop() {
        let gate = ControlGate::new();
        let permit = gate.try_claim().expect("free gate");
        assert!(gate.is_busy());
        assert!(gate.try_claim().is_none());
        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.try_claim().is_some());
    }

    #[tokio::test]
    async fn held_gate_rejects_without_touching_network_or_store() {
        let (api, store, d, _td) = setup(FakeApi::new());
        let permit = d.gate.try_claim().expect("free gate");

        let err = d.dispatch("take screenshot").await.unwrap_err();
        assert!(matches!(
            err,
            DashboardError::AlreadyInFlight(ErrorContext::ControlAction)
        ));
        assert!(api.calls().is_empty());
        assert_eq!(store.snapshot().version, 0);

        drop(permit);
        assert!(d.dispatch("take screenshot").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_phrase_never_reaches_the_network() {
        let (api, store, d, _td) = setup(FakeApi::new());
        let err = d.dispatch("make coffee").await.unwrap_err();
        assert!(matches!(err, DashboardError::UnknownCommand(ref s) if s == "make coffee"));
        assert!(api.calls().is_empty());
        assert_eq!(store.snapshot().version, 0);
    }

    #[tokio::test]
    async fn success_stores_receipt_and_returns_backend_message() {
        let (api, store, d, _td) = setup(FakeApi::new());
        *api.control.lock().unwrap() = Ok("Executed command matching: shutdown".to_string());

        let receipt = d.dispatch("  Shutdown ").await.unwrap();
        assert_eq!(receipt.command, ControlCommand::Shutdown);
        assert_eq!(receipt.message, "Executed command matching: shutdown");
        assert_eq!(api.calls(), vec!["control:shutdown".to_string()]);

        let st = store.get(Category::ControlActions);
        assert_eq!(st.data, Some(Payload::ControlActions(receipt)));
        assert!(st.error.is_none());
    }

    #[tokio::test]
    async fn backend_rejection_is_recorded_with_control_action_context() {
        let (api, store, d, _td) = setup(FakeApi::new());
        *api.control.lock().unwrap() =
            Err(NetworkError::status(400, "Command not recognized"));

        let err = d.dispatch("sleep").await.unwrap_err();
        assert_eq!(err.code(), "E_HTTP_STATUS_400");

        let rec = store.get(Category::ControlActions).error.expect("error");
        assert_eq!(rec.context, ErrorContext::ControlAction);
        assert_eq!(rec.message, "Command not recognized");
    }

    #[tokio::test]
    async fn second_dispatch_while_in_flight_is_rejected() {
        let (api, store, d, _td) = setup(FakeApi::gated());

        let first = d.dispatch("shutdown");
        let second = async {
            while !store.is_loading(Category::ControlActions) {
                tokio::task::yield_now().await;
            }
            let out = d.dispatch("sleep").await;
            api.release(1);
            out
        };
        let (a, b) = tokio::join!(first, second);

        assert!(a.is_ok());
        assert!(matches!(
            b,
            Err(DashboardError::AlreadyInFlight(ErrorContext::ControlAction))
        ));
        assert_eq!(api.calls(), vec!["control:shutdown".to_string()]);
        assert!(!d.gate.is_busy());
    }

    #[tokio::test]
    async fn dispatch_emits_stage_events() {
        let (_api, _store, d, _td) = setup(FakeApi::new());
        let mut rx = d.events.subscribe();
        d.dispatch_command(ControlCommand::LockComputer).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().status, "started");
        let done = rx.try_recv().unwrap();
        assert_eq!(done.stage, "Control");
        assert_eq!(done.status, "completed");
    }
}
