//! Marketing cookies: synthesis from the query string and lookup in a cookie header
//!
//! Writes go through an injected [`CookieWriter`]; the core never holds the
//! cookie store itself. [`MemoryCookieJar`] is an in-process writer for
//! tests and headless hosts.

use crate::sanitize::sanitize;
use crate::types::{CookieDirective, MarketingParameter, ParameterSet};
use std::sync::{Mutex, PoisonError};
use url::Url;

/// Sink for cookie writes
///
/// Called once per eligible parameter, in query-string order. Writes are
/// never batched into a single cookie string.
pub trait CookieWriter: Send + Sync {
    fn write_cookie(&self, directive: &CookieDirective);
}

impl<F> CookieWriter for F
where
    F: Fn(&CookieDirective) + Send + Sync,
{
    fn write_cookie(&self, directive: &CookieDirective) {
        self(directive)
    }
}

/// Turn the eligible query parameters of `url` into cookie writes
///
/// Output order follows the query string. Ineligible keys are ignored and
/// never reach a cookie; a repeated eligible key only counts once (first
/// occurrence wins).
pub fn synthesize_cookies(
    url: &Url,
    eligible: &[String],
    writer: &dyn CookieWriter,
) -> (ParameterSet, Vec<CookieDirective>) {
    let mut parameters = ParameterSet::new();
    let mut directives = Vec::new();

    for (key, value) in url.query_pairs() {
        if !eligible.iter().any(|name| *name == key) || parameters.contains(&key) {
            continue;
        }

        let parameter = MarketingParameter::new(&*key, sanitize(&value));
        let directive = CookieDirective::for_parameter(&parameter);
        writer.write_cookie(&directive);

        tracing::debug!(cookie = %directive, "Marketing cookie written");

        parameters.push(parameter);
        directives.push(directive);
    }

    (parameters, directives)
}

/// Find the value stored under `name` in a `Cookie` header string
///
/// Pairs are bounded by start-of-string or `;` and by `;` or end-of-string.
/// Whitespace around the name, the `=` and the value is ignored; the name
/// match is exact and case-sensitive. The first match with a non-empty
/// value wins, so an empty duplicate set on another path does not hide it.
pub fn cookie_value<'a>(name: &str, cookie: &'a str) -> Option<&'a str> {
    cookie.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name)
            .then(|| value.trim())
            .filter(|value| !value.is_empty())
    })
}

/// Read the eligible parameters previously stored in `cookie`
///
/// Entries follow the order of `eligible`. Absent or empty values are omitted.
pub fn read_parameters(cookie: &str, eligible: &[String]) -> ParameterSet {
    eligible
        .iter()
        .filter_map(|name| {
            cookie_value(name, cookie).map(|value| MarketingParameter::new(name.as_str(), value))
        })
        .collect()
}

/// In-memory cookie writer
///
/// Records every directive it receives and can render the resulting
/// `Cookie` header the way a browser would (last write per name wins,
/// attributes stripped).
#[derive(Default)]
pub struct MemoryCookieJar {
    writes: Mutex<Vec<CookieDirective>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// All directives written so far, in order
    pub fn writes(&self) -> Vec<CookieDirective> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Render the `Cookie` header for the stored cookies
    pub fn cookie_header(&self) -> String {
        let writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut pairs: Vec<(&str, &str)> = Vec::new();

        for directive in writes.iter() {
            let pair = directive.as_str().split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            match pairs.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = value,
                None => pairs.push((name, value)),
            }
        }

        pairs
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn clear(&self) {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl CookieWriter for MemoryCookieJar {
    fn write_cookie(&self, directive: &CookieDirective) {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(directive.clone());
    }
}
