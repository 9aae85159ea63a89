//! Classification Orchestrator
//!
//! Batch flow:
//! cache lookups -> deduplicated to-check list -> one Safe Browsing call
//! -> per-URL reconciliation (+ heuristic score) -> cache writes -> merge.
//!
//! Cache hits and fresh results are kept apart until the final merge. A
//! provider failure returns a typed error instead of an empty map.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{cache_key, ResultCache};
use crate::heuristics;
use crate::models::{ClassificationMap, ClassificationResult, ThreatMatch};
use crate::safe_browsing::{LookupError, ThreatLookup};

/// Default lifetime of a cached classification
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("threat lookup is not configured (API_KEY missing)")]
    Configuration,

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Classifier settings
#[derive(Debug, Clone)]
pub struct ClassifierOptions {
    pub cache_ttl: Duration,
    pub heuristics_enabled: bool,
    pub suspicious_domains: Vec<String>,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            heuristics_enabled: true,
            suspicious_domains: Vec::new(),
        }
    }
}

pub struct Classifier {
    lookup: Arc<dyn ThreatLookup>,
    cache: Arc<dyn ResultCache>,
    options: ClassifierOptions,
}

impl Classifier {
    pub fn new(
        lookup: Arc<dyn ThreatLookup>,
        cache: Arc<dyn ResultCache>,
        options: ClassifierOptions,
    ) -> Self {
        Self { lookup, cache, options }
    }

    pub fn cache_name(&self) -> &'static str {
        self.cache.name()
    }

    pub fn lookup_configured(&self) -> bool {
        self.lookup.is_configured()
    }

    /// Classify a batch of URLs
    pub async fn classify(&self, urls: &[String]) -> Result<ClassificationMap, ClassifyError> {
        if urls.is_empty() {
            return Ok(ClassificationMap::new());
        }

        if !self.lookup.is_configured() {
            tracing::error!("API key not found, skipping classification of {} URLs", urls.len());
            return Err(ClassifyError::Configuration);
        }

        let (cached, to_check) = self.resolve_cached(urls).await;

        if to_check.is_empty() {
            tracing::info!("Batch of {} URLs served entirely from cache", urls.len());
            return Ok(cached);
        }

        let matches = self.lookup.find_threat_matches(&to_check).await.map_err(|e| {
            tracing::error!("Threat lookup failed for {} URLs: {}", to_check.len(), e);
            e
        })?;

        let fresh = self.reconcile(&to_check, &matches);
        self.store(&fresh).await;

        let flagged = fresh.iter().filter(|r| !r.safe).count();
        tracing::info!(
            "Classified batch: total={} cached={} checked={} flagged={}",
            urls.len(),
            cached.len(),
            fresh.len(),
            flagged
        );

        let mut results = cached;
        results.extend(fresh.into_iter().map(|r| (r.url.clone(), r)));
        Ok(results)
    }

    /// Split the batch into cache hits and a deduplicated to-check list
    async fn resolve_cached(&self, urls: &[String]) -> (ClassificationMap, Vec<String>) {
        let mut cached = ClassificationMap::new();
        let mut to_check = Vec::new();
        let mut seen = HashSet::new();

        for url in urls {
            if !seen.insert(url.as_str()) {
                continue;
            }

            match self.cached_result(url).await {
                Some(result) => {
                    tracing::debug!("Cache hit for: {}", url);
                    cached.insert(url.clone(), result);
                }
                None => to_check.push(url.clone()),
            }
        }

        (cached, to_check)
    }

    /// Read one URL from the cache; store errors, corrupt and inconsistent values are misses
    async fn cached_result(&self, url: &str) -> Option<ClassificationResult> {
        let raw = match self.cache.get(&cache_key(url)).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", url, e);
                return None;
            }
        };

        match serde_json::from_str::<ClassificationResult>(&raw) {
            Ok(result) if result.is_consistent_for(url) => Some(result),
            Ok(_) => {
                tracing::debug!("Discarding inconsistent cache entry for {}", url);
                None
            }
            Err(e) => {
                tracing::debug!("Discarding corrupt cache entry for {}: {}", url, e);
                None
            }
        }
    }

    /// Build one result per checked URL; first match with an equal `threat.url` wins
    fn reconcile(&self, to_check: &[String], matches: &[ThreatMatch]) -> Vec<ClassificationResult> {
        to_check
            .iter()
            .map(|url| {
                let mut result = ClassificationResult::new(url.as_str());

                if let Some(m) = matches.iter().find(|m| m.url() == Some(url.as_str())) {
                    result.flag(m.clone());
                }

                if self.options.heuristics_enabled {
                    let verdict = heuristics::evaluate(url, self.options.suspicious_domains.as_slice());
                    if verdict.flagged && result.safe {
                        tracing::debug!("Heuristics flag {} (score {}) with no provider match", url, verdict.score);
                    }
                    result.heuristic_score = Some(verdict.score);
                }

                result
            })
            .collect()
    }

    async fn store(&self, fresh: &[ClassificationResult]) {
        for result in fresh {
            let value = match serde_json::to_string(result) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("Could not serialize result for {}: {}", result.url, e);
                    continue;
                }
            };

            if let Err(e) = self
                .cache
                .set_with_expiry(&cache_key(&result.url), &value, self.options.cache_ttl)
                .await
            {
                tracing::warn!("Cache write failed for {}: {}", result.url, e);
            }
        }
    }
}
