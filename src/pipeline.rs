//! Attribution pipeline
//!
//! One run walks the phases in order:
//!
//! 1. Check whether the navigation came from an external source
//!    - external: capture eligible query parameters and write marketing cookies
//!    - internal: read the parameters back from the existing cookie
//! 2. Decorate marked links and wire click/impression tracking
//!
//! The status reporter is awaited at every phase boundary. A run never
//! fails: malformed input degrades to a partial update.

use crate::config::AttributionConfig;
use crate::cookie::{read_parameters, synthesize_cookies, CookieWriter};
use crate::dom::DomTree;
use crate::error::Result;
use crate::propagator::{ElementPropagator, PropagationReport};
use crate::reporter::StatusReporter;
use crate::source;
use crate::types::{CookieDirective, ParameterSet, PipelinePhase, TrafficSource};
use serde::{Deserialize, Serialize};
use url::Url;

/// What the host knows about the current navigation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationContext {
    /// Current page URL
    pub url: String,

    /// Referrer, possibly empty or unparsable
    #[serde(default)]
    pub referrer: String,

    /// Current `Cookie` header value
    #[serde(default)]
    pub cookie: String,
}

impl NavigationContext {
    pub fn new(url: impl Into<String>, referrer: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referrer: referrer.into(),
            cookie: String::new(),
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = cookie.into();
        self
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Run identifier (run-<uuid>)
    pub run_id: String,

    pub source: TrafficSource,

    /// Parameter set propagated to the elements
    pub parameters: ParameterSet,

    /// Cookie directives handed to the writer (external path only)
    pub cookies: Vec<CookieDirective>,

    /// Phases reported, in order
    pub phases: Vec<PipelinePhase>,

    #[serde(flatten)]
    pub elements: PropagationReport,
}

/// Marketing attribution pipeline
pub struct AttributionPipeline {
    config: AttributionConfig,
    reporter: Box<dyn StatusReporter>,
    cookie_writer: Box<dyn CookieWriter>,
    propagator: ElementPropagator,
}

impl AttributionPipeline {
    /// Create a pipeline, validating the configuration
    pub fn new(
        config: AttributionConfig,
        reporter: impl StatusReporter + 'static,
        cookie_writer: impl CookieWriter + 'static,
        propagator: ElementPropagator,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            reporter: Box::new(reporter),
            cookie_writer: Box::new(cookie_writer),
            propagator,
        })
    }

    /// Propagator driven by this pipeline, for stop and search parameter updates
    pub fn propagator(&self) -> &ElementPropagator {
        &self.propagator
    }

    /// Run the pipeline for one navigation against `root`
    pub async fn run(&self, context: &NavigationContext, root: &dyn DomTree) -> RunReport {
        let run_id = format!("run-{}", uuid::Uuid::new_v4());
        let eligible = &self.config.eligible_parameters;
        let mut phases = Vec::with_capacity(4);

        self.enter(PipelinePhase::CheckingSource, &run_id, &mut phases)
            .await;

        let current = match Url::parse(&context.url) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(
                    run_id = %run_id,
                    url = %context.url,
                    error = %e,
                    "Unparsable navigation URL, no query parameters captured"
                );
                None
            }
        };
        let source = source::classify(current.as_ref(), &context.referrer);

        let (parameters, cookies) = match source {
            TrafficSource::External => {
                self.enter(PipelinePhase::UpdatingCookies, &run_id, &mut phases)
                    .await;
                match &current {
                    Some(url) => synthesize_cookies(url, eligible, self.cookie_writer.as_ref()),
                    None => (ParameterSet::new(), Vec::new()),
                }
            }
            TrafficSource::Internal => {
                self.enter(
                    PipelinePhase::GettingParametersFromCookie,
                    &run_id,
                    &mut phases,
                )
                .await;
                (read_parameters(&context.cookie, eligible), Vec::new())
            }
        };

        self.enter(PipelinePhase::UpdatingElements, &run_id, &mut phases)
            .await;
        let elements = self.propagator.start(root, &parameters, current.as_ref());

        self.enter(PipelinePhase::Ready, &run_id, &mut phases).await;

        tracing::info!(
            run_id = %run_id,
            source = ?source,
            parameters = parameters.len(),
            cookies = cookies.len(),
            links_decorated = elements.links_decorated,
            links_skipped = elements.links_skipped,
            elements_tracked = elements.elements_tracked,
            "Marketing attribution complete"
        );

        RunReport {
            run_id,
            source,
            parameters,
            cookies,
            phases,
            elements,
        }
    }

    /// Release click listeners and pending impression observers
    pub fn stop(&self) -> usize {
        self.propagator.stop()
    }

    async fn enter(&self, phase: PipelinePhase, run_id: &str, phases: &mut Vec<PipelinePhase>) {
        tracing::debug!(run_id = %run_id, phase = %phase, "Attribution phase");

        if let Err(e) = self.reporter.report(phase).await {
            tracing::warn!(
                run_id = %run_id,
                phase = %phase,
                error = %e,
                "Status reporter failed, continuing"
            );
        }
        phases.push(phase);
    }
}
