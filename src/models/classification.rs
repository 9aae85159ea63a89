//! Classification model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Per-URL classification record (also the cached form)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub url: String,
    #[serde(default = "default_safe")]
    pub safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat: Option<ThreatMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heuristic_score: Option<u8>,
}

fn default_safe() -> bool {
    true
}

impl ClassificationResult {
    /// Fresh result before reconciliation
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            safe: true,
            threat: None,
            heuristic_score: None,
        }
    }

    /// Attach a provider match, which marks the URL unsafe
    pub fn flag(&mut self, threat: ThreatMatch) {
        self.safe = false;
        self.threat = Some(threat);
    }

    /// Stored for `url`, and unsafe exactly when a threat is attached
    pub fn is_consistent_for(&self, url: &str) -> bool {
        self.url == url && self.safe == self.threat.is_none()
    }
}

/// Provider match entry, passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreatMatch(pub serde_json::Value);

impl ThreatMatch {
    /// URL the match pertains to (`threat.url`)
    pub fn url(&self) -> Option<&str> {
        self.0.get("threat")?.get("url")?.as_str()
    }

    pub fn threat_type(&self) -> Option<&str> {
        self.0.get("threatType")?.as_str()
    }
}

/// URL-keyed batch result
pub type ClassificationMap = HashMap<String, ClassificationResult>;

#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeRequest {
    /// Capped at the Safe Browsing per-lookup entry limit
    #[serde(default)]
    #[validate(length(max = 500))]
    pub urls: Vec<String>,
}

/// Body returned for an empty batch or alongside an error
#[derive(Debug, Serialize)]
pub struct EmptyMatches {
    pub matches: Vec<ThreatMatch>,
}

impl EmptyMatches {
    pub fn new() -> Self {
        Self { matches: Vec::new() }
    }
}

impl Default for EmptyMatches {
    fn default() -> Self {
        Self::new()
    }
}
