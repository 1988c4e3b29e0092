//! Traffic source classification
//!
//! A navigation is external when it has no referrer, when the referrer cannot
//! be parsed, or when the referrer's host differs from the current page's.
//! An unparsable referrer must never suppress attribution.

use crate::types::TrafficSource;
use url::Url;

/// True if the navigation to `current` from `referrer` came from outside the site
pub fn is_external(current: &Url, referrer: &str) -> bool {
    if referrer.trim().is_empty() {
        return true;
    }

    match Url::parse(referrer) {
        Ok(referrer_url) => referrer_url.host_str() != current.host_str(),
        Err(e) => {
            tracing::debug!(
                referrer = %referrer,
                error = %e,
                "Unparsable referrer, treating navigation as external"
            );
            true
        }
    }
}

/// Classify a navigation, treating an unparsable current URL as external
pub fn classify(current: Option<&Url>, referrer: &str) -> TrafficSource {
    match current {
        Some(url) if !is_external(url, referrer) => TrafficSource::Internal,
        _ => TrafficSource::External,
    }
}
