//! Trusted source registry.
//!
//! Sources are review sites the lookup is pointed at. Each carries a state:
//!
//! - `on`: always queried
//! - `auto`: the most visited ones are queried, up to a configured count
//! - `off`: never queried
//!
//! Older installs stored a bare list of domain strings; [`migrate`] lifts those
//! to records with `state = on` every time the list is read.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod store;

pub use store::SourceRegistry;

/// Selection policy for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    On,
    Auto,
    Off,
}

/// One trusted lookup target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceRecord {
    pub domain: String,
    pub state: SourceState,
    #[serde(default)]
    pub visits: u64,
}

impl SourceRecord {
    pub fn new(domain: impl Into<String>, state: SourceState) -> Self {
        Self { domain: domain.into(), state, visits: 0 }
    }
}

/// A stored source in either its legacy or current shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSource {
    Record(SourceRecord),
    Domain(String),
}

impl From<SourceRecord> for RawSource {
    fn from(record: SourceRecord) -> Self {
        RawSource::Record(record)
    }
}

/// Lift stored sources into records.
///
/// Bare domains become `on` with zero visits. Domains are trimmed and
/// lowercased; blanks are dropped and the first record for a domain wins.
pub fn migrate(raw: &[RawSource]) -> Vec<SourceRecord> {
    let mut records: Vec<SourceRecord> = Vec::with_capacity(raw.len());

    for item in raw {
        let mut record = match item {
            RawSource::Record(record) => record.clone(),
            RawSource::Domain(domain) => SourceRecord::new(domain.as_str(), SourceState::On),
        };
        record.domain = record.domain.trim().to_lowercase();

        if record.domain.is_empty() || records.iter().any(|r| r.domain == record.domain) {
            continue;
        }
        records.push(record);
    }

    records
}

/// Reduce a host or URL-ish string to a bare domain.
///
/// Strips the scheme, a leading `www.`, any path, and lowercases. Returns an
/// empty string when nothing is left.
pub fn normalize_domain(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let without_scheme = lowered.split_once("://").map_or(lowered.as_str(), |(_, rest)| rest);
    let host = without_scheme.split('/').next().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Whether `domain` and `hostname` are equal or one is a subdomain of the other.
pub fn domain_matches(domain: &str, hostname: &str) -> bool {
    if domain.is_empty() || hostname.is_empty() {
        return false;
    }
    domain == hostname || is_subdomain(hostname, domain) || is_subdomain(domain, hostname)
}

fn is_subdomain(child: &str, parent: &str) -> bool {
    child.len() > parent.len() && child.ends_with(parent) && child.as_bytes()[child.len() - parent.len() - 1] == b'.'
}

/// Index of the record that `hostname` belongs to.
///
/// An exact match wins. Otherwise the longest (most specific) domain among the
/// suffix matches is chosen, first in registry order on ties.
pub fn find_match(records: &[SourceRecord], hostname: &str) -> Option<usize> {
    if let Some(idx) = records.iter().position(|r| r.domain == hostname) {
        return Some(idx);
    }

    let mut best: Option<usize> = None;
    for (idx, record) in records.iter().enumerate() {
        if domain_matches(&record.domain, hostname)
            && best.is_none_or(|b| record.domain.len() > records[b].domain.len())
        {
            best = Some(idx);
        }
    }
    best
}

/// Count a visit to `hostname` against its matching record.
///
/// Returns whether a record was updated.
pub fn record_visit(records: &mut [SourceRecord], hostname: &str) -> bool {
    match find_match(records, hostname) {
        Some(idx) => {
            records[idx].visits = records[idx].visits.saturating_add(1);
            true
        }
        None => false,
    }
}

/// Domains to query, in priority order.
///
/// Every `on` source is included, followed by up to `max_providers` of the
/// most visited `auto` sources. `on` sources do not use up `auto` slots, and
/// `off` sources never appear.
pub fn active_domains(records: &[SourceRecord], max_providers: usize) -> Vec<String> {
    let mut on: Vec<&SourceRecord> = records.iter().filter(|r| r.state == SourceState::On).collect();
    let mut auto: Vec<&SourceRecord> = records.iter().filter(|r| r.state == SourceState::Auto).collect();

    on.sort_by(|a, b| b.visits.cmp(&a.visits));
    auto.sort_by(|a, b| b.visits.cmp(&a.visits));

    on.into_iter()
        .chain(auto.into_iter().take(max_providers))
        .map(|r| r.domain.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(domain: &str, state: SourceState, visits: u64) -> SourceRecord {
        SourceRecord { domain: domain.to_string(), state, visits }
    }

    #[test]
    fn test_active_domains_selection() {
        let records = vec![
            rec("a", SourceState::On, 5),
            rec("b", SourceState::Auto, 100),
            rec("c", SourceState::Auto, 1),
            rec("d", SourceState::Off, 999),
        ];
        assert_eq!(active_domains(&records, 1), vec!["a", "b"]);
    }

    #[test]
    fn test_active_domains_fills_auto_by_visits() {
        let records = vec![
            rec("low.com", SourceState::Auto, 1),
            rec("on.com", SourceState::On, 0),
            rec("high.com", SourceState::Auto, 50),
            rec("mid.com", SourceState::Auto, 10),
        ];
        assert_eq!(active_domains(&records, 2), vec!["on.com", "high.com", "mid.com"]);
        assert_eq!(active_domains(&records, 3), vec!["on.com", "high.com", "mid.com", "low.com"]);
    }

    #[test]
    fn test_active_domains_on_does_not_consume_auto_slots() {
        let records = vec![
            rec("a.com", SourceState::On, 1),
            rec("b.com", SourceState::On, 9),
            rec("c.com", SourceState::Auto, 100),
        ];
        assert_eq!(active_domains(&records, 1), vec!["b.com", "a.com", "c.com"]);
        assert_eq!(active_domains(&records, 0), vec!["b.com", "a.com"]);
    }

    #[test]
    fn test_active_domains_empty() {
        assert!(active_domains(&[], 5).is_empty());
        assert!(active_domains(&[rec("x.com", SourceState::Off, 3)], 5).is_empty());
    }

    #[test]
    fn test_migrate_legacy_list() {
        let raw = vec![RawSource::Domain("trustpilot.com".into()), RawSource::Domain("Reddit.com ".into())];
        let records = migrate(&raw);
        assert_eq!(records, vec![rec("trustpilot.com", SourceState::On, 0), rec("reddit.com", SourceState::On, 0)]);
    }

    #[test]
    fn test_migrate_idempotent() {
        let raw: Vec<RawSource> = serde_json::from_str(r#"["trustpilot.com", "sitejabber.com", "trustpilot.com", ""]"#).unwrap();
        let once = migrate(&raw);
        let again: Vec<RawSource> = once.iter().cloned().map(RawSource::from).collect();
        assert_eq!(migrate(&again), once);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_migrate_keeps_records() {
        let raw: Vec<RawSource> = serde_json::from_str(
            r#"[{"domain":"bbb.org","state":"auto","visits":7}, "yelp.com", {"domain":"x.com","state":"off"}]"#,
        )
        .unwrap();
        let records = migrate(&raw);
        assert_eq!(
            records,
            vec![
                rec("bbb.org", SourceState::Auto, 7),
                rec("yelp.com", SourceState::On, 0),
                rec("x.com", SourceState::Off, 0),
            ]
        );
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("https://www.Trustpilot.com/"), "trustpilot.com");
        assert_eq!(normalize_domain("http://reddit.com/r/scams"), "reddit.com");
        assert_eq!(normalize_domain("  sitejabber.com  "), "sitejabber.com");
        assert_eq!(normalize_domain("https://"), "");
        assert_eq!(normalize_domain(""), "");
    }

    #[test]
    fn test_domain_matches_both_directions() {
        assert!(domain_matches("example.com", "example.com"));
        assert!(domain_matches("example.com", "shop.example.com"));
        assert!(domain_matches("reviews.example.com", "example.com"));
        assert!(!domain_matches("example.com", "badexample.com"));
        assert!(!domain_matches("example.com", "example.org"));
        assert!(!domain_matches("", "example.com"));
    }

    #[test]
    fn test_record_visit_prefers_exact_match() {
        let mut records = vec![rec("example.com", SourceState::On, 0), rec("reviews.example.com", SourceState::Auto, 0)];
        assert!(record_visit(&mut records, "reviews.example.com"));
        assert_eq!(records[0].visits, 0);
        assert_eq!(records[1].visits, 1);
    }

    #[test]
    fn test_record_visit_most_specific_suffix() {
        let mut records = vec![rec("example.com", SourceState::On, 0), rec("reviews.example.com", SourceState::Auto, 0)];
        assert!(record_visit(&mut records, "eu.reviews.example.com"));
        assert_eq!(records[0].visits, 0);
        assert_eq!(records[1].visits, 1);
    }

    #[test]
    fn test_record_visit_no_match() {
        let mut records = vec![rec("example.com", SourceState::On, 3)];
        assert!(!record_visit(&mut records, "other.com"));
        assert_eq!(records[0].visits, 3);
    }
}
