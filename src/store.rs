//! Application state store
//!
//! A typed replacement for a string-dispatched global store: an explicit
//! reducer over [`Action`] values plus a subscriber list. Nothing here is a
//! singleton; hosts create an [`AppStore`] and pass it where it is needed.
//!
//! [`StoreStatusReporter`] and [`StoreCookieWriter`] adapt the store to the
//! pipeline's injected interfaces.

use crate::cookie::CookieWriter;
use crate::error::Result;
use crate::reporter::StatusReporter;
use crate::types::{CookieDirective, PipelinePhase};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// State held by the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// Last phase reported by the attribution pipeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_assets_status: Option<PipelinePhase>,

    /// Latest directive per cookie name, in order of first write
    #[serde(default)]
    pub cookie_data: Vec<CookieDirective>,
}

/// State transitions understood by [`reduce`]
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    UpdateMarketingAssetsStatus(PipelinePhase),
    SetMarketingCookie(CookieDirective),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateMarketingAssetsStatus(_) => "update_marketing_assets_status",
            Self::SetMarketingCookie(_) => "set_marketing_cookie",
        }
    }
}

/// Compute the state after `action`
pub fn reduce(state: &AppState, action: &Action) -> AppState {
    let mut next = state.clone();
    match action {
        Action::UpdateMarketingAssetsStatus(phase) => {
            next.marketing_assets_status = Some(*phase);
        }
        Action::SetMarketingCookie(directive) => {
            match next
                .cookie_data
                .iter_mut()
                .find(|existing| existing.name() == directive.name())
            {
                Some(slot) => *slot = directive.clone(),
                None => next.cookie_data.push(directive.clone()),
            }
        }
    }
    next
}

/// Handle returned by [`AppStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Subscriber = Arc<dyn Fn(&AppState, &Action) + Send + Sync>;

/// State container with an explicit subscriber list
#[derive(Default)]
pub struct AppStore {
    state: RwLock<AppState>,
    subscribers: RwLock<Vec<(SubscriberId, Subscriber)>>,
    next_id: AtomicU64,
}

impl AppStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: AppState) -> Self {
        Self {
            state: RwLock::new(state),
            ..Self::default()
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AppState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register a handler called after every dispatch, in subscription order
    pub fn subscribe(
        &self,
        handler: impl Fn(&AppState, &Action) + Send + Sync + 'static,
    ) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler, returning false if it was not subscribed
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Apply `action` and notify subscribers with the new state
    pub fn dispatch(&self, action: Action) -> AppState {
        let next = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            *state = reduce(&state, &action);
            state.clone()
        };

        tracing::debug!(action = action.name(), "Store action dispatched");

        // Handlers run outside the locks so they may dispatch or unsubscribe.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in subscribers {
            handler(&next, &action);
        }

        next
    }
}

/// Status reporter that records phases in an [`AppStore`]
#[derive(Clone)]
pub struct StoreStatusReporter {
    store: Arc<AppStore>,
}

impl StoreStatusReporter {
    pub fn new(store: Arc<AppStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StatusReporter for StoreStatusReporter {
    async fn report(&self, phase: PipelinePhase) -> Result<()> {
        self.store
            .dispatch(Action::UpdateMarketingAssetsStatus(phase));
        Ok(())
    }
}

/// Cookie writer that routes directives through an [`AppStore`]
///
/// Hosts subscribe to `set_marketing_cookie` actions to perform the actual
/// write against their cookie store.
#[derive(Clone)]
pub struct StoreCookieWriter {
    store: Arc<AppStore>,
}

impl StoreCookieWriter {
    pub fn new(store: Arc<AppStore>) -> Self {
        Self { store }
    }
}

impl CookieWriter for StoreCookieWriter {
    fn write_cookie(&self, directive: &CookieDirective) {
        self.store
            .dispatch(Action::SetMarketingCookie(directive.clone()));
    }
}
