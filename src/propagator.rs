//! Element propagator: link decoration and click/impression wiring
//!
//! A run classifies the subtree once into forwardable anchors and trackable
//! elements, then mutates. Link decoration overwrites existing query keys
//! (URLSearchParams `set` semantics). A bad anchor is skipped without
//! aborting the batch.
//!
//! Marketing elements can also push a single attribute into the anchors
//! carrying the search-parameter filter, see
//! [`ElementPropagator::update_search_parameter`].
//!
//! Registrations (click listeners, visibility observations) are held until
//! [`ElementPropagator::stop`], the next [`ElementPropagator::start`], or drop.
//! Host callbacks never run while the registration lock is held.

use crate::config::AttributionConfig;
use crate::dom::{
    ClickDelegate, DomElement, DomTree, ElementRef, ImpressionDelegate, IntersectionEntry,
    ListenerId, ObservationId, ObservationStatus, ObserverOptions, VisibilityObserver,
};
use crate::error::{AttributionError, Result};
use crate::sanitize::sanitize;
use crate::types::{MarketingParameter, ParameterSet};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// Intersection ratio at which an element counts as seen
pub const FULL_VISIBILITY: f64 = 1.0;

/// Elements of a subtree, classified by marker attribute
///
/// An element carrying both markers appears in both lists.
#[derive(Default)]
pub struct ElementClasses {
    /// Anchors carrying the forward marker
    pub forwardable: Vec<ElementRef>,

    /// Elements carrying the trackable marker
    pub trackable: Vec<ElementRef>,
}

/// Counts from one propagation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationReport {
    pub links_decorated: usize,
    pub links_skipped: usize,
    pub elements_tracked: usize,
    pub impressions_observed: usize,
}

#[derive(Default)]
struct Registrations {
    listeners: Vec<(ElementRef, ListenerId)>,
    observations: Vec<ObservationId>,
}

/// Applies a resolved parameter set to a DOM subtree
pub struct ElementPropagator {
    forward_attribute: String,
    trackable_attribute: String,
    parameter_filter_attribute: String,
    marketing_attributes: Vec<String>,
    click_delegate: Arc<dyn ClickDelegate>,
    impression_delegate: Arc<dyn ImpressionDelegate>,
    observer: Option<Arc<dyn VisibilityObserver>>,
    registrations: Mutex<Registrations>,
}

impl ElementPropagator {
    /// Create a propagator without visibility observation (click-only tracking)
    pub fn new(
        config: &AttributionConfig,
        click_delegate: impl ClickDelegate + 'static,
        impression_delegate: impl ImpressionDelegate + 'static,
    ) -> Self {
        Self {
            forward_attribute: config.forward_attribute.clone(),
            trackable_attribute: config.trackable_attribute.clone(),
            parameter_filter_attribute: config.parameter_filter_attribute.clone(),
            marketing_attributes: config.marketing_attributes.clone(),
            click_delegate: Arc::new(click_delegate),
            impression_delegate: Arc::new(impression_delegate),
            observer: None,
            registrations: Mutex::new(Registrations::default()),
        }
    }

    /// Enable impression tracking through the host's visibility observer
    pub fn with_visibility_observer(mut self, observer: Arc<dyn VisibilityObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn has_visibility_observer(&self) -> bool {
        self.observer.is_some()
    }

    /// Split the subtree into forwardable anchors and trackable elements
    pub fn classify(&self, root: &dyn DomTree) -> ElementClasses {
        let mut classes = ElementClasses::default();
        for element in root.descendants() {
            if element.is_anchor() && element.has_attribute(&self.forward_attribute) {
                classes.forwardable.push(element.clone());
            }
            if element.has_attribute(&self.trackable_attribute) {
                classes.trackable.push(element);
            }
        }
        classes
    }

    /// Decorate links and wire tracking for `root`
    ///
    /// Registrations from a previous start are released first. Relative
    /// hrefs resolve against `base` when given.
    pub fn start(
        &self,
        root: &dyn DomTree,
        parameters: &ParameterSet,
        base: Option<&Url>,
    ) -> PropagationReport {
        self.release(self.take_registrations());

        let classes = self.classify(root);
        let mut report = PropagationReport::default();

        if !parameters.is_empty() {
            for anchor in &classes.forwardable {
                match decorate_anchor(anchor.as_ref(), base, |url| {
                    set_query_parameters(url, parameters)
                }) {
                    Ok(()) => report.links_decorated += 1,
                    Err(e) => {
                        report.links_skipped += 1;
                        tracing::warn!(element = %anchor.id(), error = %e, "Skipping marketing link");
                    }
                }
            }
        }

        let mut registrations = Registrations::default();
        for element in &classes.trackable {
            let listener = element.add_click_listener(self.click_delegate.clone());
            registrations.listeners.push((element.clone(), listener));
            report.elements_tracked += 1;

            match &self.observer {
                Some(observer) => {
                    let observation = observer.observe(
                        element,
                        &ObserverOptions {
                            threshold: FULL_VISIBILITY,
                            ..ObserverOptions::default()
                        },
                        self.impression_callback(element.clone()),
                    );
                    registrations.observations.push(observation);
                    report.impressions_observed += 1;
                }
                None => {
                    tracing::debug!(
                        element = %element.id(),
                        "No visibility observer, impression tracking skipped"
                    );
                }
            }
        }

        let mut held = self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        held.listeners.extend(registrations.listeners);
        held.observations.extend(registrations.observations);

        report
    }

    /// Set or delete one marketing attribute on the filtered anchors of `root`
    ///
    /// Applies to anchors carrying the parameter-filter attribute whose list
    /// names `key` (a blank list accepts every key). A non-empty `value` is
    /// sanitized and set; `None` or an empty value deletes the key. Keys that
    /// are not configured marketing attributes are ignored.
    pub fn update_search_parameter(
        &self,
        root: &dyn DomTree,
        key: &str,
        value: Option<&str>,
        base: Option<&Url>,
    ) -> PropagationReport {
        let mut report = PropagationReport::default();
        if !self.marketing_attributes.iter().any(|name| name == key) {
            tracing::debug!(key, "Not a marketing attribute, search parameters unchanged");
            return report;
        }

        let value = value.filter(|v| !v.is_empty()).map(sanitize);

        for anchor in root.descendants() {
            if !anchor.is_anchor() {
                continue;
            }
            let Some(filter) = anchor.attribute(&self.parameter_filter_attribute) else {
                continue;
            };
            if !accepts_key(&filter, key) {
                continue;
            }

            let result = decorate_anchor(anchor.as_ref(), base, |url| match &value {
                Some(value) => {
                    set_query_parameters(url, [&MarketingParameter::new(key, &**value)])
                }
                None => remove_query_parameter(url, key),
            });
            match result {
                Ok(()) => report.links_decorated += 1,
                Err(e) => {
                    report.links_skipped += 1;
                    tracing::warn!(element = %anchor.id(), key, error = %e, "Skipping search parameter update");
                }
            }
        }

        report
    }

    /// Remove every click listener and pending observation, returning how
    /// many registrations were released
    pub fn stop(&self) -> usize {
        self.release(self.take_registrations())
    }

    /// Number of click listeners currently registered
    pub fn active_listeners(&self) -> usize {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    fn take_registrations(&self) -> Registrations {
        std::mem::take(
            &mut *self
                .registrations
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    fn release(&self, registrations: Registrations) -> usize {
        let mut released = 0;
        for (element, listener) in registrations.listeners {
            if element.remove_click_listener(listener) {
                released += 1;
            }
        }
        if let Some(observer) = &self.observer {
            for observation in registrations.observations {
                if observer.unobserve(observation) {
                    released += 1;
                }
            }
        }

        if released > 0 {
            tracing::debug!(released, "Tracking registrations released");
        }
        released
    }

    /// One-shot observation callback: fires the impression delegate the
    /// first time the element is fully visible, then finishes
    fn impression_callback(&self, element: ElementRef) -> crate::dom::IntersectionCallback {
        let delegate = self.impression_delegate.clone();
        let mut fired = false;

        Box::new(move |entry: &IntersectionEntry| {
            if !entry.is_intersecting || entry.intersection_ratio < FULL_VISIBILITY {
                return ObservationStatus::Observing;
            }
            if !fired {
                fired = true;
                tracing::debug!(element = %element.id(), "Impression recorded");
                delegate.on_impression(&element);
            }
            ObservationStatus::Finished
        })
    }
}

impl Drop for ElementPropagator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// True if a filter attribute value lets `key` through
///
/// Whitespace is ignored; a list with no names accepts every key.
fn accepts_key(filter: &str, key: &str) -> bool {
    let mut names = filter
        .split(',')
        .map(|name| name.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|name| !name.is_empty())
        .peekable();
    names.peek().is_none() || names.any(|name| name == key)
}

/// Parse the anchor's href, apply `edit`, and write the absolute URL back
fn decorate_anchor(
    anchor: &dyn DomElement,
    base: Option<&Url>,
    edit: impl FnOnce(&mut Url),
) -> Result<()> {
    let href = anchor
        .attribute("href")
        .ok_or_else(|| AttributionError::InvalidUrl {
            url: String::new(),
            reason: "anchor has no href".to_string(),
        })?;

    let mut url = Url::options()
        .base_url(base)
        .parse(&href)
        .map_err(|e| AttributionError::InvalidUrl {
            url: href.clone(),
            reason: e.to_string(),
        })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AttributionError::InvalidUrl {
            url: href,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    edit(&mut url);
    anchor.set_attribute("href", url.as_str());
    Ok(())
}

/// Set each parameter on the URL's query, overwriting existing keys
///
/// The first occurrence of a key takes the new value and later duplicates
/// are removed; absent keys are appended. Other pairs keep their order.
pub fn set_query_parameters<'a>(
    url: &mut Url,
    parameters: impl IntoIterator<Item = &'a MarketingParameter>,
) {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

    for parameter in parameters {
        let mut found = false;
        pairs.retain_mut(|(key, value)| {
            if *key != parameter.name {
                return true;
            }
            if found {
                return false;
            }
            found = true;
            *value = parameter.value.clone();
            true
        });
        if !found {
            pairs.push((parameter.name.clone(), parameter.value.clone()));
        }
    }

    write_query(url, &pairs);
}

/// Delete every occurrence of `key` from the URL's query
pub fn remove_query_parameter(url: &mut Url, key: &str) {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(existing, _)| existing != key)
        .collect();
    write_query(url, &pairs);
}

fn write_query(url: &mut Url, pairs: &[(String, String)]) {
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::{MemoryDocument, MemoryViewport};
    use crate::dom::ClickEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn params(pairs: &[(&str, &str)]) -> ParameterSet {
        pairs
            .iter()
            .map(|(name, value)| MarketingParameter::new(*name, *value))
            .collect()
    }

    fn noop_propagator() -> ElementPropagator {
        ElementPropagator::new(
            &AttributionConfig::default(),
            |_: &ClickEvent| {},
            |_: &ElementRef| {},
        )
    }

    #[test]
    fn test_set_query_appends_and_preserves() {
        let mut url = Url::parse("https://ext.example/?x=1").unwrap();
        let set = params(&[("utm_source", "google")]);
        set_query_parameters(&mut url, &set);
        assert_eq!(url.as_str(), "https://ext.example/?x=1&utm_source=google");
    }

    #[test]
    fn test_set_query_overwrites_and_collapses_duplicates() {
        let mut url = Url::parse("https://ext.example/?utm_source=old&x=1&utm_source=older").unwrap();
        set_query_parameters(&mut url, &params(&[("utm_source", "google")]));
        assert_eq!(url.as_str(), "https://ext.example/?utm_source=google&x=1");
    }

    #[test]
    fn test_set_query_keeps_fragment() {
        let mut url = Url::parse("https://ext.example/path#section").unwrap();
        set_query_parameters(&mut url, &params(&[("utm_medium", "cpc")]));
        assert_eq!(url.as_str(), "https://ext.example/path?utm_medium=cpc#section");
    }

    #[test]
    fn test_set_query_is_idempotent() {
        let set = params(&[("utm_source", "google"), ("utm_medium", "cpc")]);
        let mut url = Url::parse("https://ext.example/?x=1").unwrap();
        set_query_parameters(&mut url, &set);
        let once = url.to_string();
        set_query_parameters(&mut url, &set);
        assert_eq!(url.as_str(), once);
    }

    #[test]
    fn test_classify_by_marker() {
        let doc = MemoryDocument::new();
        doc.add_anchor("https://a.example/", &[("forward-search-params", "")]);
        doc.add_anchor("https://b.example/", &[]);
        doc.add_element("div", &[("forward-search-params", "")]);
        doc.add_element("div", &[("trackable", "")]);
        doc.add_anchor(
            "https://c.example/",
            &[("forward-search-params", ""), ("trackable", "")],
        );

        let classes = noop_propagator().classify(&doc);
        assert_eq!(classes.forwardable.len(), 2);
        assert_eq!(classes.trackable.len(), 2);
    }

    #[test]
    fn test_start_decorates_only_marked_anchors() {
        let doc = MemoryDocument::new();
        let marked = doc.add_anchor("https://ext.example/?x=1", &[("forward-search-params", "")]);
        let plain = doc.add_anchor("https://ext.example/?x=1", &[]);

        let report = noop_propagator().start(&doc, &params(&[("utm_source", "google")]), None);

        assert_eq!(report.links_decorated, 1);
        assert_eq!(
            marked.attribute("href").as_deref(),
            Some("https://ext.example/?x=1&utm_source=google")
        );
        assert_eq!(plain.attribute("href").as_deref(), Some("https://ext.example/?x=1"));
    }

    #[test]
    fn test_malformed_href_does_not_stop_batch() {
        let doc = MemoryDocument::new();
        doc.add_anchor("http://[::1", &[("forward-search-params", "")]);
        doc.add_element("a", &[("forward-search-params", "")]);
        doc.add_anchor("mailto:someone@site.example", &[("forward-search-params", "")]);
        let good = doc.add_anchor("https://ext.example/", &[("forward-search-params", "")]);

        let report = noop_propagator().start(&doc, &params(&[("utm_source", "google")]), None);

        assert_eq!(report.links_skipped, 3);
        assert_eq!(report.links_decorated, 1);
        assert_eq!(
            good.attribute("href").as_deref(),
            Some("https://ext.example/?utm_source=google")
        );
    }

    #[test]
    fn test_relative_href_resolves_against_base() {
        let doc = MemoryDocument::new();
        let anchor = doc.add_anchor("page_1.html", &[("forward-search-params", "")]);
        let base = Url::parse("https://site.example/dir/index.html").unwrap();

        let report = noop_propagator().start(&doc, &params(&[("utm_source", "google")]), Some(&base));

        assert_eq!(report.links_decorated, 1);
        assert_eq!(
            anchor.attribute("href").as_deref(),
            Some("https://site.example/dir/page_1.html?utm_source=google")
        );

        let doc = MemoryDocument::new();
        doc.add_anchor("page_1.html", &[("forward-search-params", "")]);
        let report = noop_propagator().start(&doc, &params(&[("utm_source", "google")]), None);
        assert_eq!(report.links_skipped, 1);
    }

    #[test]
    fn test_empty_parameter_set_leaves_anchors_untouched() {
        let doc = MemoryDocument::new();
        let anchor = doc.add_anchor("not a url", &[("forward-search-params", "")]);

        let report = noop_propagator().start(&doc, &ParameterSet::new(), None);

        assert_eq!(report, PropagationReport::default());
        assert_eq!(anchor.attribute("href").as_deref(), Some("not a url"));
    }

    #[test]
    fn test_forwardable_anchor_ignores_filter_attribute() {
        let doc = MemoryDocument::new();
        let anchor = doc.add_anchor(
            "https://ext.example/",
            &[
                ("forward-search-params", ""),
                ("data-search-parameters", "utm_medium"),
            ],
        );

        noop_propagator().start(
            &doc,
            &params(&[("utm_source", "google"), ("utm_medium", "cpc")]),
            None,
        );

        assert_eq!(
            anchor.attribute("href").as_deref(),
            Some("https://ext.example/?utm_source=google&utm_medium=cpc")
        );
    }

    #[test]
    fn test_update_search_parameter_sets_on_filtered_anchors() {
        let doc = MemoryDocument::new();
        let listed = doc.add_anchor(
            "https://ext.example/?x=1",
            &[("data-search-parameters", " utm-source , itcat")],
        );
        let other = doc.add_anchor("https://ext.example/", &[("data-search-parameters", "itterm")]);
        let blank = doc.add_anchor("https://ext.example/", &[("data-search-parameters", " ")]);
        let plain = doc.add_anchor("https://ext.example/", &[]);

        let report =
            noop_propagator().update_search_parameter(&doc, "utm-source", Some("newsletter"), None);

        assert_eq!(report.links_decorated, 2);
        assert_eq!(
            listed.attribute("href").as_deref(),
            Some("https://ext.example/?x=1&utm-source=newsletter")
        );
        assert_eq!(
            blank.attribute("href").as_deref(),
            Some("https://ext.example/?utm-source=newsletter")
        );
        assert_eq!(other.attribute("href").as_deref(), Some("https://ext.example/"));
        assert_eq!(plain.attribute("href").as_deref(), Some("https://ext.example/"));
    }

    #[test]
    fn test_update_search_parameter_deletes_on_empty_or_missing_value() {
        let doc = MemoryDocument::new();
        let anchor = doc.add_anchor(
            "https://ext.example/?itcat=shoes&x=1&itcat=old",
            &[("data-search-parameters", "itcat, itterm")],
        );
        let second = doc.add_anchor(
            "https://ext.example/?itterm=sale",
            &[("data-search-parameters", "itcat, itterm")],
        );
        let propagator = noop_propagator();

        propagator.update_search_parameter(&doc, "itcat", None, None);
        assert_eq!(anchor.attribute("href").as_deref(), Some("https://ext.example/?x=1"));

        propagator.update_search_parameter(&doc, "itterm", Some(""), None);
        assert_eq!(second.attribute("href").as_deref(), Some("https://ext.example/"));
    }

    #[test]
    fn test_update_search_parameter_sanitizes_and_ignores_unknown_keys() {
        let doc = MemoryDocument::new();
        let anchor = doc.add_anchor("https://ext.example/", &[("data-search-parameters", "")]);
        let propagator = noop_propagator();

        let report = propagator.update_search_parameter(&doc, "session", Some("abc"), None);
        assert_eq!(report, PropagationReport::default());
        assert_eq!(anchor.attribute("href").as_deref(), Some("https://ext.example/"));

        propagator.update_search_parameter(&doc, "itterm", Some("a&b=c"), None);
        assert_eq!(
            anchor.attribute("href").as_deref(),
            Some("https://ext.example/?itterm=redacted")
        );
    }

    #[test]
    fn test_remove_query_parameter() {
        let mut url = Url::parse("https://ext.example/?a=1&b=2&a=3#top").unwrap();
        remove_query_parameter(&mut url, "a");
        assert_eq!(url.as_str(), "https://ext.example/?b=2#top");

        remove_query_parameter(&mut url, "b");
        assert_eq!(url.as_str(), "https://ext.example/#top");
    }

    #[test]
    fn test_click_tracking_without_observer() {
        let doc = MemoryDocument::new();
        let el = doc.add_element("button", &[("trackable", "")]);
        let clicks = Arc::new(AtomicUsize::new(0));

        let counter = clicks.clone();
        let propagator = ElementPropagator::new(
            &AttributionConfig::default(),
            move |_: &ClickEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            |_: &ElementRef| {},
        );

        let report = propagator.start(&doc, &ParameterSet::new(), None);
        assert_eq!(report.elements_tracked, 1);
        assert_eq!(report.impressions_observed, 0);
        assert!(!propagator.has_visibility_observer());

        el.click();
        el.click();
        assert_eq!(clicks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_impression_fires_once_on_full_visibility() {
        let doc = MemoryDocument::new();
        let el = doc.add_element("div", &[("trackable", "")]);
        let viewport = Arc::new(MemoryViewport::new());
        let impressions = Arc::new(AtomicUsize::new(0));

        let counter = impressions.clone();
        let expected = el.id();
        let propagator = ElementPropagator::new(
            &AttributionConfig::default(),
            |_: &ClickEvent| {},
            move |element: &ElementRef| {
                assert_eq!(element.id(), expected);
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
        .with_visibility_observer(viewport.clone());

        let report = propagator.start(&doc, &ParameterSet::new(), None);
        assert_eq!(report.impressions_observed, 1);
        assert_eq!(viewport.options_for(el.id())[0].threshold, FULL_VISIBILITY);

        viewport.set_visibility(el.id(), 0.4);
        assert_eq!(impressions.load(Ordering::SeqCst), 0);

        viewport.set_visibility(el.id(), 1.0);
        viewport.set_visibility(el.id(), 1.0);
        assert_eq!(impressions.load(Ordering::SeqCst), 1);
        assert!(!viewport.is_observing(el.id()));
    }

    #[test]
    fn test_stop_releases_registrations() {
        let doc = MemoryDocument::new();
        let a = doc.add_element("div", &[("trackable", "")]);
        let b = doc.add_element("div", &[("trackable", "")]);
        let viewport = Arc::new(MemoryViewport::new());
        let propagator = noop_propagator().with_visibility_observer(viewport.clone());

        propagator.start(&doc, &ParameterSet::new(), None);
        assert_eq!(propagator.active_listeners(), 2);
        assert_eq!(viewport.observation_count(), 2);

        assert_eq!(propagator.stop(), 4);
        assert_eq!(a.listener_count(), 0);
        assert_eq!(b.listener_count(), 0);
        assert_eq!(viewport.observation_count(), 0);
        assert_eq!(propagator.stop(), 0);
    }

    #[test]
    fn test_restart_does_not_duplicate_listeners() {
        let doc = MemoryDocument::new();
        let el = doc.add_element("div", &[("trackable", "")]);
        let viewport = Arc::new(MemoryViewport::new());
        let propagator = noop_propagator().with_visibility_observer(viewport.clone());

        propagator.start(&doc, &ParameterSet::new(), None);
        propagator.start(&doc, &ParameterSet::new(), None);

        assert_eq!(el.listener_count(), 1);
        assert_eq!(viewport.observation_count(), 1);
    }

    #[test]
    fn test_drop_releases_registrations() {
        let doc = MemoryDocument::new();
        let el = doc.add_element("div", &[("trackable", "")]);
        let viewport = Arc::new(MemoryViewport::new());

        {
            let propagator = noop_propagator().with_visibility_observer(viewport.clone());
            propagator.start(&doc, &ParameterSet::new(), None);
            assert_eq!(el.listener_count(), 1);
        }

        assert_eq!(el.listener_count(), 0);
        assert_eq!(viewport.observation_count(), 0);
    }

    struct EagerViewport;

    impl VisibilityObserver for EagerViewport {
        fn observe(
            &self,
            element: &ElementRef,
            _options: &ObserverOptions,
            mut callback: crate::dom::IntersectionCallback,
        ) -> ObservationId {
            callback(&IntersectionEntry {
                target: element.id(),
                intersection_ratio: 1.0,
                is_intersecting: true,
            });
            ObservationId(1)
        }

        fn unobserve(&self, _id: ObservationId) -> bool {
            false
        }
    }

    #[test]
    fn test_impression_delegate_may_stop_during_start() {
        use std::sync::{OnceLock, Weak};

        let doc = MemoryDocument::new();
        let el = doc.add_element("div", &[("trackable", "")]);
        let slot: Arc<OnceLock<Weak<ElementPropagator>>> = Arc::new(OnceLock::new());
        let impressions = Arc::new(AtomicUsize::new(0));

        let delegate_slot = slot.clone();
        let counter = impressions.clone();
        let propagator = Arc::new(
            ElementPropagator::new(
                &AttributionConfig::default(),
                |_: &ClickEvent| {},
                move |_: &ElementRef| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if let Some(propagator) = delegate_slot.get().and_then(Weak::upgrade) {
                        propagator.stop();
                    }
                },
            )
            .with_visibility_observer(Arc::new(EagerViewport)),
        );
        slot.set(Arc::downgrade(&propagator)).unwrap();

        let report = propagator.start(&doc, &ParameterSet::new(), None);

        assert_eq!(report.impressions_observed, 1);
        assert_eq!(impressions.load(Ordering::SeqCst), 1);
        assert_eq!(propagator.stop(), 1);
        assert_eq!(el.listener_count(), 0);
    }
}
