use clap::Args;
use tabfocus_core::{
    badge_text, site_id, spawn, Config, CoreError, DisplayMode, LifecycleSignal, Model, ModelHandle,
    ModelSettings, SystemClock,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::open_storage;

#[derive(Args)]
pub struct WatchArgs {
    /// Page URL or host whose daily total is updated
    #[arg(long)]
    site: String,
    /// Keep the daily total in memory instead of the on-disk store
    #[arg(long)]
    memory: bool,
    /// Print JSON snapshots instead of badge text
    #[arg(long)]
    json: bool,
    /// Refresh the badge every tick, like the on-page display
    #[arg(long)]
    follow: bool,
}

/// One line read from stdin.
enum LineCommand {
    Signal(LifecycleSignal),
    /// Cycle the badge like a click on it.
    Click,
    Read,
    Reset,
    Quit,
}

impl LineCommand {
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let command = match line {
            "click" => LineCommand::Click,
            "read" => LineCommand::Read,
            "reset" => LineCommand::Reset,
            "quit" | "exit" => LineCommand::Quit,
            other => LineCommand::Signal(other.parse()?),
        };
        Ok(Some(command))
    }
}

pub async fn run(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let storage = open_storage(&config, args.memory)?;
    let site = site_id(&args.site);
    let settings = ModelSettings::from(&config);
    let refresh = settings.tick_interval;

    let model = Model::new(storage, &site, settings, SystemClock::shared());
    let (handle, task) = spawn(model);
    info!(site = %site, "watching; commands: hidden|visible|blur|focus|click|read|reset|quit");

    let mut display = Display {
        mode: config.display.default_mode,
        json: args.json,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(refresh);
    ticker.tick().await;

    // Errors end the session but the model still gets its final flush.
    let session = async {
        loop {
            tokio::select! {
                _ = ticker.tick(), if args.follow => recoverable(display.print(&handle).await)?,
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match LineCommand::parse(&line) {
                        Ok(Some(LineCommand::Signal(signal))) => handle.signal(signal).await?,
                        Ok(Some(LineCommand::Click)) => {
                            display.mode = display.mode.next();
                            recoverable(display.print(&handle).await)?;
                        }
                        Ok(Some(LineCommand::Read)) => recoverable(display.print(&handle).await)?,
                        Ok(Some(LineCommand::Reset)) => match handle.reset().await {
                            Ok(event) => println!("{}", serde_json::to_string(&event)?),
                            Err(e) => recoverable(Err(e))?,
                        },
                        Ok(Some(LineCommand::Quit)) => break,
                        Ok(None) => {}
                        Err(e) => warn!("{e}"),
                    }
                }
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    }
    .await;

    match handle.shutdown().await {
        Ok(outcome) => println!("{}", serde_json::to_string(&outcome)?),
        Err(e) => warn!(error = %e, "final flush failed"),
    }
    task.await?;
    session
}

/// Storage failures only cost this one command; a closed driver ends the session.
fn recoverable(result: Result<(), CoreError>) -> Result<(), CoreError> {
    match result {
        Err(CoreError::Storage(e)) => {
            warn!(error = %e, "storage unavailable, command skipped");
            Ok(())
        }
        other => other,
    }
}

struct Display {
    mode: DisplayMode,
    json: bool,
}

impl Display {
    async fn print(&self, handle: &ModelHandle) -> Result<(), CoreError> {
        let snapshot = handle.read_elapsed().await?;
        if self.json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            println!("{}", badge_text(self.mode, &snapshot));
        }
        Ok(())
    }
}
