pub mod config;
pub mod reset;
pub mod today;
pub mod watch;

use std::sync::Arc;

use tabfocus_core::{Config, MemoryStorage, SqliteStorage, Storage};

/// Durable store for the configured area, or a throwaway one.
pub(crate) fn open_storage(
    config: &Config,
    in_memory: bool,
) -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
    if in_memory {
        return Ok(Arc::new(MemoryStorage::new()));
    }
    Ok(Arc::new(SqliteStorage::open(&config.storage.area)?))
}
