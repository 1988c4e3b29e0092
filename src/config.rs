//! Attribution configuration
//!
//! Loaded from camelCase JSON. Every field has a default, so an empty
//! object yields the standard UTM setup.

use crate::error::{AttributionError, Result};
use crate::sanitize::is_clean;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Configuration for an attribution pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionConfig {
    /// Allow-listed parameter names, in the order the cookie reader scans them
    #[serde(default = "default_eligible_parameters")]
    pub eligible_parameters: Vec<String>,

    /// Attribute marking anchors that receive marketing parameters
    #[serde(default = "default_forward_attribute")]
    pub forward_attribute: String,

    /// Attribute marking elements that get click and impression tracking
    #[serde(default = "default_trackable_attribute")]
    pub trackable_attribute: String,

    /// Attribute restricting which parameters an anchor receives
    ///
    /// Holds a comma-separated list of names; missing or blank forwards all.
    #[serde(default = "default_parameter_filter_attribute")]
    pub parameter_filter_attribute: String,

    /// Marketing element attributes that may be pushed into filtered anchors
    #[serde(default = "default_marketing_attributes")]
    pub marketing_attributes: Vec<String>,
}

fn default_eligible_parameters() -> Vec<String> {
    [
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_term",
        "utm_content",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_marketing_attributes() -> Vec<String> {
    [
        "itcat",
        "itterm",
        "utm-campaign",
        "utm-content",
        "utm-medium",
        "utm-source",
        "utm-term",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_forward_attribute() -> String {
    "forward-search-params".to_string()
}

fn default_trackable_attribute() -> String {
    "trackable".to_string()
}

fn default_parameter_filter_attribute() -> String {
    "data-search-parameters".to_string()
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            eligible_parameters: default_eligible_parameters(),
            forward_attribute: default_forward_attribute(),
            trackable_attribute: default_trackable_attribute(),
            parameter_filter_attribute: default_parameter_filter_attribute(),
            marketing_attributes: default_marketing_attributes(),
        }
    }
}

impl AttributionConfig {
    /// Replace the eligible parameter list
    pub fn with_eligible_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.eligible_parameters = names.into_iter().map(Into::into).collect();
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AttributionError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            parameters = config.eligible_parameters.len(),
            "Attribution config loaded"
        );
        Ok(config)
    }

    /// Check that the configuration can drive a pipeline
    ///
    /// Eligible names must be non-empty, unique, and made of characters that
    /// are safe in both cookie names and query keys.
    pub fn validate(&self) -> Result<()> {
        if self.eligible_parameters.is_empty() {
            return Err(AttributionError::Config(
                "eligibleParameters must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in &self.eligible_parameters {
            if !is_clean(name) {
                return Err(AttributionError::InvalidParameter {
                    name: name.clone(),
                    reason: "only letters, digits, '-' and '_' are allowed".to_string(),
                });
            }
            if !seen.insert(name.as_str()) {
                return Err(AttributionError::InvalidParameter {
                    name: name.clone(),
                    reason: "listed more than once".to_string(),
                });
            }
        }

        if let Some(name) = self.marketing_attributes.iter().find(|name| !is_clean(name)) {
            return Err(AttributionError::Config(format!(
                "marketingAttributes entry '{}' may only contain letters, digits, '-' and '_'",
                name
            )));
        }

        for (field, value) in [
            ("forwardAttribute", &self.forward_attribute),
            ("trackableAttribute", &self.trackable_attribute),
            ("parameterFilterAttribute", &self.parameter_filter_attribute),
        ] {
            if value.trim().is_empty() {
                return Err(AttributionError::Config(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }

        Ok(())
    }
}
