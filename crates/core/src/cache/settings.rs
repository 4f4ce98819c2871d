//! Key-value settings persisted next to the cache.
//!
//! Values are stored as JSON. The registry keeps its source list here under
//! [`SOURCES_KEY`]; operator edits stamp [`SETTINGS_CHANGED_KEY`].

use super::connection::CacheDb;
use crate::Error;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Trusted source list.
pub const SOURCES_KEY: &str = "sources";

/// Time of the last operator-initiated settings change.
pub const SETTINGS_CHANGED_KEY: &str = "settings_changed_at";

impl CacheDb {
    /// Read a setting, returning `None` when unset.
    ///
    /// A stored value that does not decode as `T` is logged and treated as unset.
    pub async fn get_setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        let key = key.to_string();
        let raw = self
            .conn
            .call({
                let key = key.clone();
                move |conn| -> Result<Option<String>, Error> {
                    let result = conn.query_row("SELECT value_json FROM settings WHERE key = ?1", params![key], |row| {
                        row.get::<_, String>(0)
                    });
                    match result {
                        Ok(json) => Ok(Some(json)),
                        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                        Err(e) => Err(e.into()),
                    }
                }
            })
            .await
            .map_err(Error::from)?;

        Ok(raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "ignoring undecodable setting");
                None
            }
        }))
    }

    /// Write a setting, replacing any prior value.
    pub async fn put_setting<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), Error> {
        let key = key.to_string();
        let value_json = serde_json::to_string(value)?;
        let updated_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value_json = excluded.value_json,
                        updated_at = excluded.updated_at",
                    params![key, value_json, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// When the operator last changed settings, if ever.
    pub async fn settings_changed_at(&self) -> Result<Option<DateTime<Utc>>, Error> {
        self.get_setting(SETTINGS_CHANGED_KEY).await
    }

    /// Record an operator settings change at the current time.
    pub async fn touch_settings(&self) -> Result<DateTime<Utc>, Error> {
        let now = Utc::now();
        self.put_setting(SETTINGS_CHANGED_KEY, &now).await?;
        Ok(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get_setting() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_setting("limits", &vec![3, 15]).await.unwrap();

        let value: Vec<u32> = db.get_setting("limits").await.unwrap().unwrap();
        assert_eq!(value, vec![3, 15]);
    }

    #[tokio::test]
    async fn test_get_missing_setting() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let value: Option<String> = db.get_setting("nope").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_setting_is_unset() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_setting("limits", "not a list").await.unwrap();

        let value: Option<Vec<u32>> = db.get_setting("limits").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_touch_settings() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.settings_changed_at().await.unwrap().is_none());

        let stamped = db.touch_settings().await.unwrap();
        let read = db.settings_changed_at().await.unwrap().unwrap();
        assert_eq!(read.timestamp_millis(), stamped.timestamp_millis());
    }
}
