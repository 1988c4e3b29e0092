//! DOM capabilities consumed by the element propagator
//!
//! The attribution core never touches a concrete DOM. Hosts (browser
//! bindings, renderers, test harnesses) implement these traits and hand the
//! core a [`DomTree`] root plus an optional [`VisibilityObserver`].

use std::fmt;
use std::sync::Arc;

pub mod memory;

/// Stable identifier of an element within its host document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el-{}", self.0)
    }
}

/// Handle for a registered click listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle for a registered visibility observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservationId(pub u64);

/// Shared handle to a host element
pub type ElementRef = Arc<dyn DomElement>;

/// A single element of the host document
pub trait DomElement: Send + Sync {
    fn id(&self) -> ElementId;

    /// Lowercase tag name (e.g. `"a"`, `"div"`)
    fn tag_name(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;

    fn set_attribute(&self, name: &str, value: &str);

    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    fn is_anchor(&self) -> bool {
        self.tag_name().eq_ignore_ascii_case("a")
    }

    /// Register a listener invoked on every click of this element
    fn add_click_listener(&self, listener: Arc<dyn ClickDelegate>) -> ListenerId;

    /// Remove a click listener, returning false if it was not registered
    fn remove_click_listener(&self, id: ListenerId) -> bool;
}

/// A subtree the propagator scans
pub trait DomTree: Send + Sync {
    /// Every element under the root, in document order
    fn descendants(&self) -> Vec<ElementRef>;
}

/// A click on a tracked element, as delivered by the host
#[derive(Debug, Clone, PartialEq)]
pub struct ClickEvent {
    /// Element the click landed on
    pub target: ElementId,

    /// Unix timestamp in milliseconds
    pub timestamp: u64,
}

impl ClickEvent {
    pub fn new(target: ElementId) -> Self {
        Self {
            target,
            timestamp: now_millis(),
        }
    }
}

/// Receives every click on a tracked element
pub trait ClickDelegate: Send + Sync {
    fn on_click(&self, event: &ClickEvent);
}

impl<F> ClickDelegate for F
where
    F: Fn(&ClickEvent) + Send + Sync,
{
    fn on_click(&self, event: &ClickEvent) {
        self(event)
    }
}

/// Receives the first full-visibility impression of a tracked element
pub trait ImpressionDelegate: Send + Sync {
    fn on_impression(&self, element: &ElementRef);
}

impl<F> ImpressionDelegate for F
where
    F: Fn(&ElementRef) + Send + Sync,
{
    fn on_impression(&self, element: &ElementRef) {
        self(element)
    }
}

/// Visibility change reported by a [`VisibilityObserver`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub target: ElementId,

    /// Fraction of the element inside the viewport, `0.0..=1.0`
    pub intersection_ratio: f64,

    pub is_intersecting: bool,
}

/// Returned by an observation callback to keep or end the observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationStatus {
    Observing,
    Finished,
}

/// Callback attached to one observation
pub type IntersectionCallback = Box<dyn FnMut(&IntersectionEntry) -> ObservationStatus + Send>;

/// Options for a visibility observation
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverOptions {
    /// Intersection ratio the observation cares about
    pub threshold: f64,

    /// Margin around the viewport, CSS syntax
    pub root_margin: String,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            root_margin: "0px".to_string(),
        }
    }
}

/// Host capability for observing element visibility
///
/// Optional: environments without it degrade to click-only tracking.
pub trait VisibilityObserver: Send + Sync {
    fn observe(
        &self,
        element: &ElementRef,
        options: &ObserverOptions,
        callback: IntersectionCallback,
    ) -> ObservationId;

    /// Stop an observation, returning false if it was not active
    fn unobserve(&self, id: ObservationId) -> bool;
}

/// Current time in Unix milliseconds
fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
