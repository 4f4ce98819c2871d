//! Registry persistence on top of the settings table.
//!
//! Every mutation is a read-modify-write of the whole list; concurrent writers
//! resolve last-write-wins.

use super::{RawSource, SourceRecord, SourceState, active_domains, find_match, migrate, normalize_domain, record_visit};
use crate::cache::CacheDb;
use crate::cache::settings::SOURCES_KEY;
use crate::Error;

/// Persisted source registry.
#[derive(Clone, Debug)]
pub struct SourceRegistry {
    db: CacheDb,
    defaults: Vec<String>,
}

impl SourceRegistry {
    /// `defaults` seeds the registry until a list has been saved.
    pub fn new(db: CacheDb, defaults: Vec<String>) -> Self {
        Self { db, defaults }
    }

    /// Current records, migrated from whatever shape is stored.
    ///
    /// Defaults are used only when nothing is stored. Stored items that do not
    /// decode are skipped one by one; a stored value that is not a list is an
    /// error, so a later save can never replace it with the defaults.
    pub async fn load(&self) -> Result<Vec<SourceRecord>, Error> {
        let raw = match self.db.get_setting::<serde_json::Value>(SOURCES_KEY).await? {
            None => self.defaults.iter().cloned().map(RawSource::Domain).collect(),
            Some(serde_json::Value::Array(items)) => decode_items(items),
            Some(other) => {
                return Err(Error::Serialization(format!("stored sources are not a list: {other}")));
            }
        };
        Ok(migrate(&raw))
    }

    async fn save(&self, records: &[SourceRecord]) -> Result<(), Error> {
        self.db.put_setting(SOURCES_KEY, records).await
    }

    /// Domains to query, in priority order.
    pub async fn active_domains(&self, max_providers: usize) -> Result<Vec<String>, Error> {
        Ok(active_domains(&self.load().await?, max_providers))
    }

    /// Count a navigation to `hostname`.
    ///
    /// Returns whether a record matched.
    pub async fn record_visit(&self, hostname: &str) -> Result<bool, Error> {
        let mut records = self.load().await?;
        if !record_visit(&mut records, hostname) {
            return Ok(false);
        }
        self.save(&records).await?;
        Ok(true)
    }

    /// Register `hostname` as an `auto` source unless a record already covers it.
    ///
    /// Returns whether a record was inserted.
    pub async fn auto_add(&self, hostname: &str) -> Result<bool, Error> {
        let domain = normalize_domain(hostname);
        if domain.is_empty() {
            return Ok(false);
        }

        let mut records = self.load().await?;
        if let Some(idx) = find_match(&records, &domain) {
            tracing::debug!(hostname = %domain, existing = %records[idx].domain, "source already registered");
            return Ok(false);
        }

        records.push(SourceRecord::new(domain.as_str(), SourceState::Auto));
        self.save(&records).await?;
        tracing::info!(domain = %domain, "auto-added review source");
        Ok(true)
    }

    /// Add `domain` as an `on` source, or switch an existing record on.
    pub async fn add(&self, domain: &str) -> Result<SourceRecord, Error> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return Err(Error::InvalidInput("domain cannot be empty".into()));
        }

        let mut records = self.load().await?;
        let record = match records.iter_mut().find(|r| r.domain == domain) {
            Some(existing) => {
                existing.state = SourceState::On;
                existing.clone()
            }
            None => {
                let record = SourceRecord::new(domain, SourceState::On);
                records.push(record.clone());
                record
            }
        };

        self.save(&records).await?;
        self.db.touch_settings().await?;
        Ok(record)
    }

    /// Change the state of an existing source.
    pub async fn set_state(&self, domain: &str, state: SourceState) -> Result<SourceRecord, Error> {
        let domain = normalize_domain(domain);
        let mut records = self.load().await?;
        let record = records
            .iter_mut()
            .find(|r| r.domain == domain)
            .ok_or_else(|| Error::UnknownSource(domain.clone()))?;
        record.state = state;
        let record = record.clone();

        self.save(&records).await?;
        self.db.touch_settings().await?;
        Ok(record)
    }

    /// Delete a source.
    ///
    /// Returns whether a record was removed.
    pub async fn remove(&self, domain: &str) -> Result<bool, Error> {
        let domain = normalize_domain(domain);
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| r.domain != domain);
        if records.len() == before {
            return Ok(false);
        }

        self.save(&records).await?;
        self.db.touch_settings().await?;
        Ok(true)
    }
}

fn decode_items(items: Vec<serde_json::Value>) -> Vec<RawSource> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawSource>(item.clone()) {
            Ok(raw) => Some(raw),
            Err(e) => {
                tracing::warn!(item = %item, error = %e, "skipping undecodable source");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry(defaults: &[&str]) -> SourceRegistry {
        let db = CacheDb::open_in_memory().await.unwrap();
        SourceRegistry::new(db, defaults.iter().map(|d| d.to_string()).collect())
    }

    #[tokio::test]
    async fn test_load_seeds_from_defaults() {
        let registry = registry(&["trustpilot.com", "reddit.com"]).await;
        let records = registry.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.state == SourceState::On && r.visits == 0));
    }

    #[tokio::test]
    async fn test_load_migrates_legacy_list() {
        let registry = registry(&[]).await;
        registry
            .db
            .put_setting(SOURCES_KEY, &vec!["sitejabber.com", "bbb.org"])
            .await
            .unwrap();

        let records = registry.load().await.unwrap();
        assert_eq!(records, vec![SourceRecord::new("sitejabber.com", SourceState::On), SourceRecord::new("bbb.org", SourceState::On)]);

        // Reading does not rewrite the stored legacy shape.
        let stored: Vec<RawSource> = registry.db.get_setting(SOURCES_KEY).await.unwrap().unwrap();
        assert!(matches!(stored[0], RawSource::Domain(_)));
    }

    #[tokio::test]
    async fn test_bad_item_does_not_reset_registry() {
        let registry = registry(&["trustpilot.com", "reddit.com"]).await;
        let stored = serde_json::json!([
            {"domain": "mine.com", "state": "on", "visits": 42},
            {"domain": "trustpilot.com", "state": "auto", "visits": 3},
            {"domain": "odd.com", "state": "ON", "visits": 1},
        ]);
        registry.db.put_setting(SOURCES_KEY, &stored).await.unwrap();

        assert!(registry.record_visit("trustpilot.com").await.unwrap());

        let records = registry.load().await.unwrap();
        assert_eq!(
            records,
            vec![
                SourceRecord { domain: "mine.com".into(), state: SourceState::On, visits: 42 },
                SourceRecord { domain: "trustpilot.com".into(), state: SourceState::Auto, visits: 4 },
            ]
        );
    }

    #[tokio::test]
    async fn test_non_list_sources_are_left_alone() {
        let registry = registry(&["trustpilot.com"]).await;
        let stored = serde_json::json!({"domain": "mine.com"});
        registry.db.put_setting(SOURCES_KEY, &stored).await.unwrap();

        assert!(matches!(registry.load().await, Err(Error::Serialization(_))));
        assert!(registry.record_visit("trustpilot.com").await.is_err());
        assert!(registry.auto_add("reviews.io").await.is_err());

        let kept: serde_json::Value = registry.db.get_setting(SOURCES_KEY).await.unwrap().unwrap();
        assert_eq!(kept, stored);
    }

    #[tokio::test]
    async fn test_record_visit_persists() {
        let registry = registry(&["trustpilot.com"]).await;
        assert!(registry.record_visit("uk.trustpilot.com").await.unwrap());
        assert!(!registry.record_visit("example.com").await.unwrap());

        let records = registry.load().await.unwrap();
        assert_eq!(records[0].visits, 1);
    }

    #[tokio::test]
    async fn test_auto_add() {
        let registry = registry(&["trustpilot.com"]).await;
        assert!(registry.auto_add("www.reviews.io").await.unwrap());
        assert!(!registry.auto_add("reviews.io").await.unwrap());
        assert!(!registry.auto_add("de.trustpilot.com").await.unwrap());

        let records = registry.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], SourceRecord::new("reviews.io", SourceState::Auto));
        assert!(registry.db.settings_changed_at().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_state_and_remove() {
        let registry = registry(&["trustpilot.com"]).await;
        let record = registry.set_state("https://www.trustpilot.com/", SourceState::Off).await.unwrap();
        assert_eq!(record.state, SourceState::Off);
        assert!(registry.active_domains(5).await.unwrap().is_empty());
        assert!(registry.db.settings_changed_at().await.unwrap().is_some());

        assert!(matches!(registry.set_state("nope.com", SourceState::On).await, Err(Error::UnknownSource(_))));

        assert!(registry.remove("trustpilot.com").await.unwrap());
        assert!(!registry.remove("trustpilot.com").await.unwrap());
        assert!(registry.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_switches_existing_on() {
        let registry = registry(&[]).await;
        registry.auto_add("reviews.io").await.unwrap();
        let record = registry.add("reviews.io").await.unwrap();
        assert_eq!(record.state, SourceState::On);
        assert_eq!(registry.load().await.unwrap().len(), 1);

        assert!(matches!(registry.add("  ").await, Err(Error::InvalidInput(_))));
    }
}
