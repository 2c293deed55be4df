use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use jarvis_core::{Category, CategoryEndpoint, ErrorContext, ErrorRecord};
use jarvis_observability::{metrics, trace};
use jarvis_providers::AssistantApi;
use serde::Serialize;
use serde_json::json;

use crate::store::CategoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    Updated,
    Failed,
    /// Another fetch for the category was already running; nothing was sent.
    Coalesced,
}

impl FetchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchOutcome::Updated => "updated",
            FetchOutcome::Failed => "failed",
            FetchOutcome::Coalesced => "coalesced",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub outcomes: BTreeMap<Category, FetchOutcome>,
}

impl FetchReport {
    pub fn get(&self, category: Category) -> Option<FetchOutcome> {
        self.outcomes.get(&category).copied()
    }

    pub fn all_updated(&self) -> bool {
        self.outcomes.values().all(|o| *o == FetchOutcome::Updated)
    }
}

/// Loads SystemInfo, ProcessList and NetworkInfo. Failures land in the
/// store, never in the return value.
pub struct FetchOrchestrator {
    api: Arc<dyn AssistantApi>,
    store: Arc<CategoryStore>,
    data_dir: PathBuf,
}

impl FetchOrchestrator {
    pub fn new(api: Arc<dyn AssistantApi>, store: Arc<CategoryStore>, data_dir: &Path) -> Self {
        Self {
            api,
            store,
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub async fn activate(&self) -> FetchReport {
        trace::event(&self.data_dir, None, "Fetch", "FETCH.activate", "ok", None);
        self.refresh_all().await
    }

    pub async fn refresh_all(&self) -> FetchReport {
        let (info, processes, network) = tokio::join!(
            self.refresh(CategoryEndpoint::Info),
            self.refresh(CategoryEndpoint::Processes),
            self.refresh(CategoryEndpoint::Network),
        );
        let mut report = FetchReport::default();
        report.outcomes.insert(Category::SystemInfo, info);
        report.outcomes.insert(Category::ProcessList, processes);
        report.outcomes.insert(Category::NetworkInfo, network);
        report
    }

    pub async fn refresh(&self, endpoint: CategoryEndpoint) -> FetchOutcome {
        let category = endpoint.category();
        let attempt = match self.store.attempt(category) {
            Ok(a) => a,
            Err(_) => {
                trace::event(
                    &self.data_dir,
                    None,
                    "Fetch",
                    "FETCH.coalesced",
                    "skipped",
                    Some(json!({"category": category.as_str()})),
                );
                self.record(category, FetchOutcome::Coalesced, None, None);
                return FetchOutcome::Coalesced;
            }
        };

        let t0 = Instant::now();
        match self.api.fetch_category(endpoint).await {
            Ok(data) => {
                attempt.succeed(data);
                let ms = t0.elapsed().as_millis();
                self.record(category, FetchOutcome::Updated, Some(ms), None);
                FetchOutcome::Updated
            }
            Err(e) => {
                let ms = t0.elapsed().as_millis();
                self.record(category, FetchOutcome::Failed, Some(ms), Some(&e.code));
                attempt.fail(ErrorRecord::new(
                    ErrorContext::for_category(category),
                    e.code,
                    e.message,
                ));
                FetchOutcome::Failed
            }
        }
    }

    fn record(
        &self,
        category: Category,
        outcome: FetchOutcome,
        elapsed_ms: Option<u128>,
        error_code: Option<&str>,
    ) {
        metrics::append_best_effort(
            &self.data_dir,
            "fetch",
            &json!({"type":"fetch", "category":category.as_str(), "outcome":outcome.as_str(), "elapsed_ms":elapsed_ms, "error_code":error_code}),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{http_500, poll_once, FakeApi};
    use jarvis_core::{error::E_ABORTED, Payload};

    fn setup(api: FakeApi) -> (Arc<FakeApi>, Arc<CategoryStore>, FetchOrchestrator, tempfile::TempDir) {
        let td = tempfile::tempdir().expect("tempdir");
        let api = Arc::new(api);
        let store = Arc::new(CategoryStore::new());
        let orch = FetchOrchestrator::new(api.clone(), store.clone(), td.path());
        (api, store, orch, td)
    }

    #[tokio::test]
    async fn activate_fetches_all_three_categories() {
        let (api, store, orch, _td) = setup(FakeApi::new());
        let report = orch.activate().await;
        assert!(report.all_updated());
        assert_eq!(api.count("fetch"), 3);
        for c in [Category::SystemInfo, Category::ProcessList, Category::NetworkInfo] {
            let st = store.get(c);
            assert!(!st.loading);
            assert!(st.error.is_none());
            assert_eq!(st.data.map(|d| d.category()), Some(c));
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_touch_the_others() {
        let api = FakeApi::new();
        api.fetch
            .lock()
            .unwrap()
            .insert(CategoryEndpoint::Network, Err(http_500("psutil exploded")));
        let (_api, store, orch, _td) = setup(api);

        let report = orch.activate().await;
        assert_eq!(report.get(Category::NetworkInfo), Some(FetchOutcome::Failed));
        assert_eq!(report.get(Category::SystemInfo), Some(FetchOutcome::Updated));

        let net = store.get(Category::NetworkInfo);
        let err = net.error.expect("network error");
        assert_eq!(err.code, "E_HTTP_STATUS_500");
        assert_eq!(err.message, "psutil exploded");
        assert!(net.data.is_none());
        assert!(store.get(Category::SystemInfo).data.is_some());
        assert!(store.get(Category::ProcessList).data.is_some());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_data() {
        let (api, store, orch, _td) = setup(FakeApi::new());
        assert_eq!(orch.refresh(CategoryEndpoint::Info).await, FetchOutcome::Updated);
        let before = store.get(Category::SystemInfo).data;

        api.fetch
            .lock()
            .unwrap()
            .insert(CategoryEndpoint::Info, Err(http_500("down")));
        assert_eq!(orch.refresh(CategoryEndpoint::Info).await, FetchOutcome::Failed);

        let st = store.get(Category::SystemInfo);
        assert_eq!(st.data, before);
        assert!(st.error.is_some());
    }

    #[tokio::test]
    async fn refresh_while_loading_is_coalesced() {
        let (api, store, orch, _td) = setup(FakeApi::gated());

        let first = orch.refresh(CategoryEndpoint::Processes);
        let second = async {
            while !store.is_loading(Category::ProcessList) {
                tokio::task::yield_now().await;
            }
            let out = orch.refresh(CategoryEndpoint::Processes).await;
            api.release(1);
            out
        };
        let (a, b) = tokio::join!(first, second);

        assert_eq!(a, FetchOutcome::Updated);
        assert_eq!(b, FetchOutcome::Coalesced);
        assert_eq!(api.count("fetch"), 1);
        assert!(matches!(
            store.get(Category::ProcessList).data,
            Some(Payload::ProcessList(_))
        ));
    }

    #[tokio::test]
    async fn dropped_fetch_leaves_no_category_loading() {
        let (_api, store, orch, _td) = setup(FakeApi::gated());
        {
            let fut = orch.refresh(CategoryEndpoint::Network);
            tokio::pin!(fut);
            // One poll starts the request and parks on the gate.
            assert!(poll_once(fut.as_mut()).await.is_none());
            assert!(store.is_loading(Category::NetworkInfo));
        }
        let st = store.get(Category::NetworkInfo);
        assert!(!st.loading);
        assert_eq!(st.error.map(|e| e.code), Some(E_ABORTED.to_string()));
    }

    #[tokio::test]
    async fn fetch_outcomes_are_written_to_metrics() {
        let (_api, _store, orch, td) = setup(FakeApi::new());
        orch.refresh_all().await;
        let raw = std::fs::read_to_string(td.path().join("metrics.jsonl")).unwrap();
        assert_eq!(raw.matches("\"type\":\"fetch\"").count(), 3);
    }
}
