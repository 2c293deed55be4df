use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use jarvis_core::{
    error::E_ABORTED, now_ms, Category, DashboardError, ErrorContext, ErrorRecord, Payload,
    RequestState,
};
use serde::Serialize;
use tokio::sync::watch;

const IDLE: RequestState = RequestState {
    data: None,
    loading: false,
    error: None,
    updated_at_ms: None,
};

/// Every category's state as of one committed transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub version: u64,
    pub states: BTreeMap<Category, RequestState>,
}

impl StoreSnapshot {
    fn initial() -> Self {
        Self {
            version: 0,
            states: Category::ALL
                .into_iter()
                .map(|c| (c, RequestState::default()))
                .collect(),
        }
    }

    pub fn get(&self, category: Category) -> &RequestState {
        self.states.get(&category).unwrap_or(&IDLE)
    }
}

/// Owns the `{data, loading, error}` record of every category and enforces
/// at most one in-flight request per category.
pub struct CategoryStore {
    inner: Mutex<StoreSnapshot>,
    tx: watch::Sender<StoreSnapshot>,
}

impl Default for CategoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryStore {
    pub fn new() -> Self {
        let initial = StoreSnapshot::initial();
        let (tx, _rx) = watch::channel(initial.clone());
        Self {
            inner: Mutex::new(initial),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreSnapshot> {
        // A panic elsewhere must not wedge every category.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn commit(&self, g: &mut StoreSnapshot) {
        g.version += 1;
        // Published under the lock so watchers see versions in order.
        self.tx.send_replace(g.clone());
    }

    pub fn begin(&self, category: Category) -> Result<(), DashboardError> {
        let mut g = self.lock();
        let st = g.states.entry(category).or_default();
        if st.loading {
            return Err(DashboardError::AlreadyInFlight(ErrorContext::for_category(
                category,
            )));
        }
        st.loading = true;
        st.error = None;
        self.commit(&mut g);
        Ok(())
    }

    pub fn succeed(&self, category: Category, data: Payload) -> Result<(), DashboardError> {
        debug_assert_eq!(data.category(), category, "payload stored under wrong category");
        let mut g = self.lock();
        let st = g.states.entry(category).or_default();
        if !st.loading {
            return Err(DashboardError::NotInFlight(category));
        }
        st.data = Some(data);
        st.loading = false;
        st.error = None;
        st.updated_at_ms = Some(now_ms());
        self.commit(&mut g);
        Ok(())
    }

    pub fn fail(&self, category: Category, error: ErrorRecord) -> Result<(), DashboardError> {
        let mut g = self.lock();
        let st = g.states.entry(category).or_default();
        if !st.loading {
            return Err(DashboardError::NotInFlight(category));
        }
        st.loading = false;
        st.error = Some(error);
        self.commit(&mut g);
        Ok(())
    }

    /// `begin` wrapped in a guard that resolves the category as failed if the
    /// caller drops it without calling `succeed`/`fail`.
    pub fn attempt(&self, category: Category) -> Result<Attempt<'_>, DashboardError> {
        self.begin(category)?;
        Ok(Attempt {
            store: self,
            category,
            resolved: false,
        })
    }

    pub fn get(&self, category: Category) -> RequestState {
        self.lock().get(category).clone()
    }

    pub fn is_loading(&self, category: Category) -> bool {
        self.lock().get(category).loading
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.tx.subscribe()
    }
}

pub struct Attempt<'a> {
    store: &'a CategoryStore,
    category: Category,
    resolved: bool,
}

impl Attempt<'_> {
    pub fn category(&self) -> Category {
        self.category
    }

    pub fn succeed(mut self, data: Payload) {
        self.resolved = true;
        // Only this guard can end the attempt, so the begin is still pending.
        let _ = self.store.succeed(self.category, data);
    }

    pub fn fail(mut self, error: ErrorRecord) {
        self.resolved = true;
        let _ = self.store.fail(self.category, error);
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        let err = ErrorRecord::new(
            ErrorContext::for_category(self.category),
            E_ABORTED,
            "request dropped before completion",
        );
        let _ = self.store.fail(self.category, err);
    }
}
