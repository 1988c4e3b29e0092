//! In-memory DOM and viewport
//!
//! Headless implementations of the DOM capabilities for testing and
//! server-side use. Elements live in a flat document in insertion order;
//! the viewport delivers visibility changes only when told to.

use super::{
    ClickDelegate, ClickEvent, DomElement, DomTree, ElementId, ElementRef, IntersectionCallback,
    IntersectionEntry, ListenerId, ObservationId, ObservationStatus, ObserverOptions,
    VisibilityObserver,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// An element of a [`MemoryDocument`]
pub struct MemoryElement {
    id: ElementId,
    tag: String,
    attributes: RwLock<Vec<(String, String)>>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn ClickDelegate>)>>,
    next_listener: AtomicU64,
}

impl MemoryElement {
    fn new(id: ElementId, tag: &str) -> Self {
        Self {
            id,
            tag: tag.to_ascii_lowercase(),
            attributes: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Dispatch a click to every registered listener
    pub fn click(&self) -> usize {
        let listeners: Vec<Arc<dyn ClickDelegate>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        let event = ClickEvent::new(self.id);
        for listener in &listeners {
            listener.on_click(&event);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn remove_attribute(&self, name: &str) {
        self.attributes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(key, _)| key != name);
    }
}

impl DomElement for MemoryElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn tag_name(&self) -> String {
        self.tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn set_attribute(&self, name: &str, value: &str) {
        let mut attributes = self
            .attributes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn add_click_listener(&self, listener: Arc<dyn ClickDelegate>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    fn remove_click_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

/// Flat in-memory document
#[derive(Default)]
pub struct MemoryDocument {
    elements: RwLock<Vec<Arc<MemoryElement>>>,
    next_id: AtomicU64,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element with the given attributes
    ///
    /// Boolean marker attributes are given an empty value.
    pub fn add_element(&self, tag: &str, attributes: &[(&str, &str)]) -> Arc<MemoryElement> {
        let id = ElementId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let element = Arc::new(MemoryElement::new(id, tag));
        for (name, value) in attributes {
            element.set_attribute(name, value);
        }

        self.elements
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(element.clone());
        element
    }

    /// Append an anchor with an `href` and extra attributes
    pub fn add_anchor(&self, href: &str, attributes: &[(&str, &str)]) -> Arc<MemoryElement> {
        let element = self.add_element("a", attributes);
        element.set_attribute("href", href);
        element
    }

    pub fn len(&self) -> usize {
        self.elements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DomTree for MemoryDocument {
    fn descendants(&self) -> Vec<ElementRef> {
        self.elements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|element| element.clone() as ElementRef)
            .collect()
    }
}

struct Observation {
    id: ObservationId,
    target: ElementId,
    options: ObserverOptions,
    callback: IntersectionCallback,
}

#[derive(Default)]
struct ViewportState {
    observations: Vec<Observation>,

    /// Observations whose callbacks are running
    in_flight: Vec<ObservationId>,

    /// In-flight observations unobserved during delivery
    cancelled: Vec<ObservationId>,
}

/// Viewport that reports visibility changes on demand
///
/// Every call to [`MemoryViewport::set_visibility`] delivers one entry to
/// each active observation of the target. Observations whose callback
/// returns [`ObservationStatus::Finished`] are dropped, as are observations
/// unobserved while their callback was running.
#[derive(Default)]
pub struct MemoryViewport {
    state: Mutex<ViewportState>,
    next_id: AtomicU64,
}

impl MemoryViewport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ViewportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report that `target` is now `ratio` visible, returning the number of
    /// callbacks invoked
    pub fn set_visibility(&self, target: ElementId, ratio: f64) -> usize {
        let ratio = ratio.clamp(0.0, 1.0);

        // Callbacks run outside the lock so they may observe/unobserve.
        let (mut due, ids) = {
            let mut state = self.lock();
            let (due, rest): (Vec<_>, Vec<_>) = state
                .observations
                .drain(..)
                .partition(|observation| observation.target == target);
            state.observations = rest;

            let ids: Vec<ObservationId> = due.iter().map(|observation| observation.id).collect();
            state.in_flight.extend(ids.iter().copied());
            (due, ids)
        };

        let entry = IntersectionEntry {
            target,
            intersection_ratio: ratio,
            is_intersecting: ratio > 0.0,
        };

        let delivered = due.len();
        due.retain_mut(|observation| (observation.callback)(&entry) == ObservationStatus::Observing);

        let mut state = self.lock();
        state.in_flight.retain(|id| !ids.contains(id));

        for observation in due {
            if let Some(pos) = state.cancelled.iter().position(|id| *id == observation.id) {
                state.cancelled.swap_remove(pos);
            } else {
                state.observations.push(observation);
            }
        }
        state.cancelled.retain(|id| !ids.contains(id));

        delivered
    }

    /// Number of active observations, including those being delivered
    pub fn observation_count(&self) -> usize {
        let state = self.lock();
        state.observations.len() + state.in_flight.len() - state.cancelled.len()
    }

    pub fn is_observing(&self, target: ElementId) -> bool {
        self.lock()
            .observations
            .iter()
            .any(|observation| observation.target == target)
    }

    /// Options of the active observations of `target`
    pub fn options_for(&self, target: ElementId) -> Vec<ObserverOptions> {
        self.lock()
            .observations
            .iter()
            .filter(|observation| observation.target == target)
            .map(|observation| observation.options.clone())
            .collect()
    }
}

impl VisibilityObserver for MemoryViewport {
    fn observe(
        &self,
        element: &ElementRef,
        options: &ObserverOptions,
        callback: IntersectionCallback,
    ) -> ObservationId {
        let id = ObservationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.lock().observations.push(Observation {
            id,
            target: element.id(),
            options: options.clone(),
            callback,
        });
        id
    }

    fn unobserve(&self, id: ObservationId) -> bool {
        let mut state = self.lock();
        let before = state.observations.len();
        state.observations.retain(|observation| observation.id != id);
        if state.observations.len() != before {
            return true;
        }

        if state.in_flight.contains(&id) && !state.cancelled.contains(&id) {
            state.cancelled.push(id);
            return true;
        }
        false
    }
}
