use clap::Args;
use tabfocus_core::{
    roll_over_stale_total, site_id, Clock, Config, Storage, StorageKey, SystemClock,
};
use tracing::info;

use super::open_storage;

#[derive(Args)]
pub struct ResetArgs {
    /// Page URL or host
    #[arg(long)]
    site: String,
}

/// Offline reset of the stored total. Running `watch` sessions keep their own
/// timers; use the `reset` line command there to reset those too.
pub async fn run(args: ResetArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let storage = open_storage(&config, false)?;
    let site = site_id(&args.site);
    let key = StorageKey::new(config.storage.key_prefix.clone(), site.clone());

    // A total left from an earlier day belongs to that day's archive.
    let today = SystemClock.local_date(SystemClock.now());
    roll_over_stale_total(&*storage, &key, today).await?;
    let previous = storage.get(&key.daily_total(), 0).await?;
    storage.set(&key.daily_total(), 0).await?;
    info!(site = %site, previous_ms = previous, "daily total reset");
    let report = serde_json::json!({
        "type": "daily_reset",
        "site": site,
        "closing_total_ms": previous,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
