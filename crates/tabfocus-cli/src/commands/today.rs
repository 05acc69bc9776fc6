use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use tabfocus_core::{format_hms, site_id, total_for_day, Clock, Config, StorageKey, SystemClock};

use super::open_storage;

#[derive(Args)]
pub struct TodayArgs {
    /// Page URL or host
    #[arg(long)]
    site: String,
    /// Show the archived total of a past day (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Print JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct TotalReport {
    site: String,
    date: NaiveDate,
    total_ms: u64,
}

pub async fn run(args: TodayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let storage = open_storage(&config, false)?;
    let site = site_id(&args.site);
    let key = StorageKey::new(config.storage.key_prefix.clone(), site.clone());

    let today = SystemClock.local_date(SystemClock.now());
    let date = args.date.unwrap_or(today);
    let total_ms = total_for_day(&*storage, &key, date, today).await?;

    if args.json {
        let report = TotalReport {
            site,
            date,
            total_ms,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{site} {}", format_hms(total_ms));
    }
    Ok(())
}
