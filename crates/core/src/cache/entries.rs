//! Cached reputation entries keyed by hostname.
//!
//! An entry is only ever replaced as a whole. Reads apply two thresholds from
//! [`CacheTtl`]: past `stale_after` the entry is returned flagged stale, past
//! `expire_after` it is deleted and reported absent. An entry written under a
//! different model version is reported absent without being deleted.

use super::connection::CacheDb;
use crate::Error;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// One reputation signal from a trusted source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub source: String,
    pub url: String,
    /// Rating on a 0-5 scale.
    pub rating: f64,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub summary: Vec<String>,
}

/// A stored lookup result for a hostname.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hostname: String,
    /// Write time of this entry.
    pub timestamp: DateTime<Utc>,
    /// Ordered by source priority.
    pub reviews: Vec<Review>,
    /// Whether the hostname itself aggregates reviews.
    pub is_source: bool,
    pub model_version: String,
    pub grounding_metadata: Option<serde_json::Value>,
}

/// A cache hit, annotated with whether it is due for refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedEntry {
    #[serde(flatten)]
    pub entry: CacheEntry,
    pub is_stale: bool,
}

/// Deserialize a list, falling back to empty when the value is null or not a list.
pub fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()).unwrap_or_default())
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

impl CacheDb {
    /// Look up the entry for `hostname` produced under `current_version`.
    ///
    /// Returns `None` when nothing is stored, when the stored entry was made
    /// under another version, or when it has expired (the row is deleted).
    pub async fn get_entry(&self, hostname: &str, current_version: &str) -> Result<Option<CachedEntry>, Error> {
        let Some(entry) = self.read_entry(hostname).await? else {
            return Ok(None);
        };

        if entry.model_version != current_version {
            tracing::debug!(
                hostname,
                stored = %entry.model_version,
                current = current_version,
                "cache version mismatch"
            );
            return Ok(None);
        }

        let age = (Utc::now() - entry.timestamp).to_std().unwrap_or_default();

        if age > self.ttl.expire_after {
            tracing::debug!(hostname, age_secs = age.as_secs(), "evicting expired cache entry");
            self.delete_entry(hostname).await?;
            return Ok(None);
        }

        let is_stale = age > self.ttl.stale_after;
        Ok(Some(CachedEntry { entry, is_stale }))
    }

    /// Store a fresh result for `hostname`, replacing any prior entry.
    pub async fn put_entry(
        &self, hostname: &str, reviews: Vec<Review>, is_source: bool, model_version: &str,
        grounding_metadata: Option<serde_json::Value>,
    ) -> Result<CacheEntry, Error> {
        let entry = CacheEntry {
            hostname: hostname.to_string(),
            timestamp: Utc::now(),
            reviews,
            is_source,
            model_version: model_version.to_string(),
            grounding_metadata,
        };
        self.upsert_entry(&entry).await?;
        Ok(entry)
    }

    /// Write `entry` as-is, keeping its timestamp.
    pub async fn upsert_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        let hostname = entry.hostname.clone();
        let created_at = to_millis(entry.timestamp);
        let reviews_json = serde_json::to_string(&entry.reviews)?;
        let is_source = entry.is_source;
        let model_version = entry.model_version.clone();
        let grounding_json = entry
            .grounding_metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (hostname, created_at, reviews_json, is_source, model_version, grounding_json)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(hostname) DO UPDATE SET
                        created_at = excluded.created_at,
                        reviews_json = excluded.reviews_json,
                        is_source = excluded.is_source,
                        model_version = excluded.model_version,
                        grounding_json = excluded.grounding_json",
                    params![hostname, created_at, reviews_json, is_source as i32, model_version, grounding_json],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn read_entry(&self, hostname: &str) -> Result<Option<CacheEntry>, Error> {
        let hostname = hostname.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT hostname, created_at, reviews_json, is_source, model_version, grounding_json
                    FROM cache_entries WHERE hostname = ?1",
                )?;

                let row = stmt.query_row(params![hostname], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i32>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                });

                let (hostname, created_at, reviews_json, is_source, model_version, grounding_json) = match row {
                    Ok(r) => r,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let reviews = serde_json::from_str(&reviews_json).unwrap_or_default();
                let grounding_metadata = grounding_json.and_then(|j| serde_json::from_str(&j).ok());

                Ok(Some(CacheEntry {
                    hostname,
                    timestamp: from_millis(created_at),
                    reviews,
                    is_source: is_source == 1,
                    model_version,
                    grounding_metadata,
                }))
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for `hostname`.
    ///
    /// Returns whether a row was removed.
    pub async fn delete_entry(&self, hostname: &str) -> Result<bool, Error> {
        let hostname = hostname.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE hostname = ?1", params![hostname])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry older than the expiry threshold.
    ///
    /// Returns the number of deleted entries.
    pub async fn prune_expired(&self) -> Result<u64, Error> {
        let expire_ms = i64::try_from(self.ttl.expire_after.as_millis()).unwrap_or(i64::MAX);
        let cutoff = to_millis(Utc::now()).saturating_sub(expire_ms);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE created_at < ?1", params![cutoff])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Hostnames with a stored entry, newest first.
    pub async fn list_hostnames(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT hostname FROM cache_entries ORDER BY created_at DESC")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut hostnames = Vec::new();
                for row in rows {
                    hostnames.push(row?);
                }
                Ok(hostnames)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheTtl;
    use std::time::Duration;

    fn review(source: &str, rating: f64) -> Review {
        Review {
            source: source.to_string(),
            url: format!("https://{source}/review/example.com"),
            rating,
            summary: vec!["Fast shipping".to_string(), "Helpful support".to_string()],
        }
    }

    fn ttl() -> CacheTtl {
        CacheTtl { stale_after: Duration::from_secs(3600), expire_after: Duration::from_secs(4 * 3600) }
    }

    async fn aged_entry(db: &CacheDb, hostname: &str, age: chrono::Duration) {
        let entry = CacheEntry {
            hostname: hostname.to_string(),
            timestamp: Utc::now() - age,
            reviews: vec![review("trustpilot.com", 4.0)],
            is_source: false,
            model_version: "v1".to_string(),
            grounding_metadata: None,
        };
        db.upsert_entry(&entry).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap().with_ttl(ttl());
        let reviews = vec![review("trustpilot.com", 4.5), review("sitejabber.com", 3.0)];
        let meta = serde_json::json!({"webSearchQueries": ["example.com reviews"]});

        db.put_entry("example.com", reviews.clone(), true, "v1", Some(meta.clone()))
            .await
            .unwrap();

        let hit = db.get_entry("example.com", "v1").await.unwrap().unwrap();
        assert_eq!(hit.entry.reviews, reviews);
        assert!(hit.entry.is_source);
        assert_eq!(hit.entry.grounding_metadata, Some(meta));
        assert!(!hit.is_stale);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_entry("nonexistent.com", "v1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_version_mismatch_is_absent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("example.com", vec![], false, "v1", None).await.unwrap();

        assert!(db.get_entry("example.com", "v2").await.unwrap().is_none());
        assert!(db.get_entry("example.com", "v1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_deleted_on_read() {
        let db = CacheDb::open_in_memory().await.unwrap().with_ttl(ttl());
        aged_entry(&db, "old.com", chrono::Duration::hours(4) + chrono::Duration::milliseconds(1)).await;

        assert!(db.get_entry("old.com", "v1").await.unwrap().is_none());
        assert!(db.read_entry("old.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_entry_served() {
        let db = CacheDb::open_in_memory().await.unwrap().with_ttl(ttl());
        aged_entry(&db, "stale.com", chrono::Duration::hours(2)).await;

        let hit = db.get_entry("stale.com", "v1").await.unwrap().unwrap();
        assert!(hit.is_stale);
        assert!(db.read_entry("stale.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_replaces_wholesale() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let meta = serde_json::json!({"chunks": 2});
        db.put_entry("example.com", vec![review("a.com", 1.0), review("b.com", 2.0)], true, "v1", Some(meta))
            .await
            .unwrap();
        db.put_entry("example.com", vec![review("c.com", 5.0)], false, "v1", None)
            .await
            .unwrap();

        let hit = db.get_entry("example.com", "v1").await.unwrap().unwrap();
        assert_eq!(hit.entry.reviews.len(), 1);
        assert_eq!(hit.entry.reviews[0].source, "c.com");
        assert!(!hit.entry.is_source);
        assert!(hit.entry.grounding_metadata.is_none());
    }

    #[tokio::test]
    async fn test_prune_expired() {
        let db = CacheDb::open_in_memory().await.unwrap().with_ttl(ttl());
        aged_entry(&db, "expired.com", chrono::Duration::hours(5)).await;
        aged_entry(&db, "stale.com", chrono::Duration::hours(2)).await;
        aged_entry(&db, "fresh.com", chrono::Duration::minutes(1)).await;

        let deleted = db.prune_expired().await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = db.list_hostnames().await.unwrap();
        assert_eq!(remaining, vec!["fresh.com".to_string(), "stale.com".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_and_purge() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("a.com", vec![], false, "v1", None).await.unwrap();
        db.put_entry("b.com", vec![], false, "v1", None).await.unwrap();

        assert!(db.delete_entry("a.com").await.unwrap());
        assert!(!db.delete_entry("a.com").await.unwrap());
        assert_eq!(db.purge_entries().await.unwrap(), 1);
    }

    #[test]
    fn test_review_summary_defaults_empty() {
        let review: Review =
            serde_json::from_str(r#"{"source":"a.com","url":"https://a.com","rating":3,"summary":null}"#).unwrap();
        assert!(review.summary.is_empty());

        let review: Review =
            serde_json::from_str(r#"{"source":"a.com","url":"https://a.com","rating":3,"summary":"oops"}"#).unwrap();
        assert!(review.summary.is_empty());

        let review: Review = serde_json::from_str(r#"{"source":"a.com","url":"https://a.com","rating":3}"#).unwrap();
        assert!(review.summary.is_empty());
    }
}
