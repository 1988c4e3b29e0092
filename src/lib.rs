//! # a3s-attribution
//!
//! Marketing parameter capture, sanitization, and propagation for A3S web surfaces.
//!
//! ## Overview
//!
//! `a3s-attribution` attributes visits to marketing campaigns. On arrival from
//! an external referrer it captures allow-listed UTM parameters from the query
//! string, sanitizes them, and writes one cookie per parameter. On every run it
//! propagates the resolved parameters onto marked links and wires click and
//! impression tracking on marked elements.
//!
//! The host environment is reached only through injected capabilities, so the
//! same pipeline runs against browser bindings or the in-memory DOM.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_attribution::{
//!     AttributionConfig, AttributionPipeline, ElementPropagator, MemoryCookieJar,
//!     MemoryDocument, MemoryStatusReporter, NavigationContext,
//! };
//! use a3s_attribution::dom::{ClickEvent, ElementRef};
//!
//! # async fn example() -> a3s_attribution::Result<()> {
//! let config = AttributionConfig::default();
//! let propagator = ElementPropagator::new(
//!     &config,
//!     |event: &ClickEvent| println!("click on {}", event.target),
//!     |element: &ElementRef| println!("impression of {}", element.id()),
//! );
//! let pipeline = AttributionPipeline::new(
//!     config,
//!     MemoryStatusReporter::new(),
//!     MemoryCookieJar::new(),
//!     propagator,
//! )?;
//!
//! let document = MemoryDocument::new();
//! document.add_anchor("https://shop.example/", &[("forward-search-params", "")]);
//!
//! let report = pipeline
//!     .run(
//!         &NavigationContext::new(
//!             "https://site.example/?utm_source=google&utm_medium=cpc",
//!             "https://search.example/",
//!         ),
//!         &document,
//!     )
//!     .await;
//!
//! println!("Decorated {} links", report.elements.links_decorated);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **sanitize** - allow-listed character check with a `"redacted"` fallback
//! - **source** - external/internal classification from the referrer
//! - **cookie** - cookie synthesis from the query, lookup from the cookie header
//! - **propagator** - link decoration and click/impression wiring with `start`/`stop`
//! - **pipeline** - phase orchestration with awaited status reporting
//! - **store** - typed state store with reducer and subscribers
//! - **dom** - host capability traits and the in-memory implementation

pub mod config;
pub mod cookie;
pub mod dom;
pub mod error;
pub mod pipeline;
pub mod propagator;
pub mod reporter;
pub mod sanitize;
pub mod source;
pub mod store;
pub mod types;

// Re-export core types
pub use config::AttributionConfig;
pub use cookie::{cookie_value, read_parameters, synthesize_cookies, CookieWriter, MemoryCookieJar};
pub use dom::memory::{MemoryDocument, MemoryElement, MemoryViewport};
pub use error::{AttributionError, Result};
pub use pipeline::{AttributionPipeline, NavigationContext, RunReport};
pub use propagator::{
    remove_query_parameter, set_query_parameters, ElementClasses, ElementPropagator,
    PropagationReport,
};
pub use reporter::{LogStatusReporter, MemoryStatusReporter, StatusReporter};
pub use sanitize::{is_clean, sanitize, REDACTED};
pub use source::is_external;
pub use store::{Action, AppState, AppStore, StoreCookieWriter, StoreStatusReporter};
pub use types::{CookieDirective, MarketingParameter, ParameterSet, PipelinePhase, TrafficSource};
