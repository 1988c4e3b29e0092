//! Core attribution types
//!
//! All types use camelCase JSON serialization so run reports and store
//! snapshots can be shipped to the same consumers as other A3S payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attributes attached to each cookie written for a marketing parameter
pub const COOKIE_ATTRIBUTES: &str = "secure; samesite=lax";

/// A single allow-listed marketing parameter
///
/// `name` is always a member of the configured eligible list. `value` is
/// either the sanitized query value, the `"redacted"` sentinel, or a value
/// previously stored in a cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketingParameter {
    pub name: String,
    pub value: String,
}

impl MarketingParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered set of marketing parameters with unique names
///
/// Order is the order the parameters were found in (query string or cookie
/// scan). Pushing a name that is already present is a no-op, so the first
/// occurrence always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(Vec<MarketingParameter>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter, returning false if the name was already present
    pub fn push(&mut self, parameter: MarketingParameter) -> bool {
        if self.contains(&parameter.name) {
            return false;
        }
        self.0.push(parameter);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MarketingParameter> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[MarketingParameter] {
        &self.0
    }
}

impl FromIterator<MarketingParameter> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = MarketingParameter>>(iter: I) -> Self {
        let mut set = Self::new();
        for parameter in iter {
            set.push(parameter);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a MarketingParameter;
    type IntoIter = std::slice::Iter<'a, MarketingParameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A fully formed cookie write: `name=value; secure; samesite=lax`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieDirective(String);

impl CookieDirective {
    /// Build the directive for a parameter whose value is already sanitized
    pub fn for_parameter(parameter: &MarketingParameter) -> Self {
        Self(format!(
            "{}={}; {}",
            parameter.name, parameter.value, COOKIE_ATTRIBUTES
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cookie name, the part before the first `=`
    pub fn name(&self) -> &str {
        self.0.split_once('=').map_or(self.0.as_str(), |(name, _)| name)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CookieDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the current navigation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrafficSource {
    /// No referrer, an unparsable referrer, or a referrer on another host
    External,
    /// Referrer on the same host as the current page
    Internal,
}

/// Phase of an attribution run, reported to the status reporter
///
/// Phases are strictly sequential:
/// `CheckingSource -> (UpdatingCookies | GettingParametersFromCookie) -> UpdatingElements -> Ready`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelinePhase {
    #[serde(rename = "checking_if_external_source")]
    CheckingSource,
    #[serde(rename = "updating_cookies")]
    UpdatingCookies,
    #[serde(rename = "getting_parameters_from_cookie")]
    GettingParametersFromCookie,
    #[serde(rename = "updating_elements")]
    UpdatingElements,
    #[serde(rename = "ready")]
    Ready,
}

impl PipelinePhase {
    /// Status vocabulary value for this phase
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckingSource => "checking_if_external_source",
            Self::UpdatingCookies => "updating_cookies",
            Self::GettingParametersFromCookie => "getting_parameters_from_cookie",
            Self::UpdatingElements => "updating_elements",
            Self::Ready => "ready",
        }
    }

    /// Key used by the app store (`marketing_assets_status_<phase>`)
    pub fn status_key(self) -> String {
        format!("marketing_assets_status_{}", self.as_str())
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
