mod config;
mod memory;
mod site;
mod sqlite;

pub use config::{Config, DisplayConfig, StorageConfig, SyncConfig, TimerConfig};
pub use memory::MemoryStorage;
pub use site::site_id;
pub use sqlite::SqliteStorage;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use crate::error::{ConfigError, StorageError};

/// Asynchronous key-value store holding millisecond totals.
///
/// Implementations are scoped to one named area; keys are already namespaced
/// by [`StorageKey`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read `key`, returning `default` when it has never been written.
    async fn get(&self, key: &str, default: u64) -> Result<u64, StorageError>;

    async fn set(&self, key: &str, value: u64) -> Result<(), StorageError>;
}

#[async_trait]
impl<S: Storage + ?Sized> Storage for Arc<S> {
    async fn get(&self, key: &str, default: u64) -> Result<u64, StorageError> {
        (**self).get(key, default).await
    }

    async fn set(&self, key: &str, value: u64) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }
}

/// Storage keys for one site: a fixed prefix plus the registrable domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    prefix: String,
    site: String,
}

impl StorageKey {
    pub fn new(prefix: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            site: site.into(),
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    /// Key of the running total for the current day.
    pub fn daily_total(&self) -> String {
        format!("{}{}", self.prefix, self.site)
    }

    /// Key holding the closing total of a finished day.
    pub fn archive(&self, day: NaiveDate) -> String {
        format!("{}{}@{}", self.prefix, self.site, day.format("%Y-%m-%d"))
    }

    /// Key recording which local day the running total belongs to.
    pub fn total_day(&self) -> String {
        format!("{}{}#day", self.prefix, self.site)
    }
}

/// Local day the running total was last stamped with, `None` if never.
///
/// Days are stored as their count from the Common Era, so `0` means unset.
///
/// # Errors
/// Returns the storage error of the read, or `Corrupt` for a value that is not
/// a valid day.
pub async fn stamped_day<S: Storage + ?Sized>(
    storage: &S,
    key: &StorageKey,
) -> Result<Option<NaiveDate>, StorageError> {
    let day_key = key.total_day();
    let raw = storage.get(&day_key, 0).await?;
    if raw == 0 {
        return Ok(None);
    }
    i32::try_from(raw)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map(Some)
        .ok_or(StorageError::Corrupt {
            key: day_key,
            value: raw.to_string(),
        })
}

pub async fn stamp_day<S: Storage + ?Sized>(
    storage: &S,
    key: &StorageKey,
    day: NaiveDate,
) -> Result<(), StorageError> {
    let raw = u64::try_from(day.num_days_from_ce()).unwrap_or(0);
    storage.set(&key.total_day(), raw).await
}

/// Total stored for `day`: its archive, plus the running total when that is
/// stamped with `day`. An unstamped running total counts for `today`.
///
/// # Errors
/// Returns the first storage error hit.
pub async fn total_for_day<S: Storage + ?Sized>(
    storage: &S,
    key: &StorageKey,
    day: NaiveDate,
    today: NaiveDate,
) -> Result<u64, StorageError> {
    let archived = storage.get(&key.archive(day), 0).await?;
    let running_day = stamped_day(storage, key).await?.unwrap_or(today);
    if running_day != day {
        return Ok(archived);
    }
    let running = storage.get(&key.daily_total(), 0).await?;
    Ok(archived.saturating_add(running))
}

/// Move a running total left over from a day before `today` into that day's
/// archive, then stamp the running total with `today`.
///
/// Returns the archived day and total when something was moved. A total
/// stamped with `today` or a later day is left alone; an unstamped one is
/// claimed for `today`.
///
/// # Errors
/// Returns the first storage error hit. The running total is zeroed only after
/// the archive write succeeded.
pub async fn roll_over_stale_total<S: Storage + ?Sized>(
    storage: &S,
    key: &StorageKey,
    today: NaiveDate,
) -> Result<Option<(NaiveDate, u64)>, StorageError> {
    let stale_day = match stamped_day(storage, key).await? {
        Some(day) if day >= today => return Ok(None),
        Some(day) => day,
        None => {
            stamp_day(storage, key, today).await?;
            return Ok(None);
        }
    };

    let total_key = key.daily_total();
    let total = storage.get(&total_key, 0).await?;
    if total > 0 {
        let archive_key = key.archive(stale_day);
        let archived = storage.get(&archive_key, 0).await?;
        storage
            .set(&archive_key, archived.saturating_add(total))
            .await?;
        storage.set(&total_key, 0).await?;
    }
    stamp_day(storage, key, today).await?;
    Ok((total > 0).then_some((stale_day, total)))
}

/// Returns `~/.config/tabfocus[-dev]/` based on TABFOCUS_ENV.
///
/// Set TABFOCUS_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TABFOCUS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("tabfocus-dev")
    } else {
        base_dir.join("tabfocus")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
