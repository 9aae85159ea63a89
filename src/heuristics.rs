//! URL Heuristics
//!
//! Local, deterministic risk scoring. Advisory only: the score is attached
//! to results but never overrides the Safe Browsing verdict.
//!
//! Rules (1 point each):
//! - URL contains a known suspicious domain substring
//! - URL contains a dotted-quad IP literal
//! - URL contains 3 or more dots

use once_cell::sync::Lazy;
use regex::Regex;

// ============================================================================
// RULE CONSTANTS
// ============================================================================

/// Score at or above which a URL is flagged
pub const FLAG_THRESHOLD: u8 = 2;

/// Dot count at or above which a URL has "too many subdomains"
pub const EXCESS_DOT_COUNT: usize = 3;

/// Four 1-3 digit groups; validity of the octets is not checked
static IP_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("valid IP literal regex"));

// ============================================================================
// VERDICT
// ============================================================================

/// Outcome of evaluating all rules against one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicVerdict {
    pub suspicious_domain: bool,
    pub ip_literal: bool,
    pub excess_subdomains: bool,
    pub score: u8,
    pub flagged: bool,
}

// ============================================================================
// RULES
// ============================================================================

/// Plain substring containment, not domain-boundary aware
pub fn matches_suspicious_domain<S: AsRef<str>>(url: &str, domains: &[S]) -> bool {
    domains.iter().any(|d| url.contains(d.as_ref()))
}

pub fn is_ip_literal(url: &str) -> bool {
    IP_LITERAL.is_match(url)
}

/// Counts every dot in the URL, including path and query
pub fn has_excess_subdomains(url: &str) -> bool {
    url.matches('.').count() >= EXCESS_DOT_COUNT
}

/// Evaluate all rules and sum the ones that fire
pub fn evaluate<S: AsRef<str>>(url: &str, domains: &[S]) -> HeuristicVerdict {
    let suspicious_domain = matches_suspicious_domain(url, domains);
    let ip_literal = is_ip_literal(url);
    let excess_subdomains = has_excess_subdomains(url);

    let score = [suspicious_domain, ip_literal, excess_subdomains]
        .iter()
        .filter(|fired| **fired)
        .count() as u8;

    HeuristicVerdict {
        suspicious_domain,
        ip_literal,
        excess_subdomains,
        score,
        flagged: score >= FLAG_THRESHOLD,
    }
}

/// Score only
pub fn score<S: AsRef<str>>(url: &str, domains: &[S]) -> u8 {
    evaluate(url, domains).score
}

pub fn is_flagged<S: AsRef<str>>(url: &str, domains: &[S]) -> bool {
    evaluate(url, domains).flagged
}

// ============================================================================
// TESTS
// ============================================================================
