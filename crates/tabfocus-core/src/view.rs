//! Badge text rendering.
//!
//! Presentation only: consumes [`ElapsedSnapshot`] values and never touches
//! timers or storage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::ElapsedSnapshot;

/// Which value the badge shows. Clicking the badge cycles through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Focus,
    Countup,
    Today,
}

impl DisplayMode {
    pub fn next(self) -> Self {
        match self {
            DisplayMode::Focus => DisplayMode::Countup,
            DisplayMode::Countup => DisplayMode::Today,
            DisplayMode::Today => DisplayMode::Focus,
        }
    }

    fn label(self) -> &'static str {
        match self {
            DisplayMode::Focus => "focus",
            DisplayMode::Countup => "countup",
            DisplayMode::Today => "today",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focus" => Ok(DisplayMode::Focus),
            "countup" => Ok(DisplayMode::Countup),
            "today" => Ok(DisplayMode::Today),
            other => Err(format!("unknown display mode: {other}")),
        }
    }
}

/// Format milliseconds as `hh:mm:ss`, truncating sub-second remainders.
/// Hours are not wrapped at 24.
pub fn format_hms(ms: u64) -> String {
    let total_secs = ms / 1_000;
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Badge text such as `f 00:12:03`.
pub fn badge_text(mode: DisplayMode, snapshot: &ElapsedSnapshot) -> String {
    let elapsed_ms = match mode {
        DisplayMode::Focus => snapshot.focus.elapsed_ms,
        DisplayMode::Countup => snapshot.countup.elapsed_ms,
        DisplayMode::Today => snapshot.today.elapsed_ms,
    };
    let initial = &mode.label()[..1];
    format!("{initial} {}", format_hms(elapsed_ms))
}
