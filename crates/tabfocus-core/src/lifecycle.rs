//! Page lifecycle signals that drive the focus timer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One attention change reported by the host page.
///
/// Switching tabs usually fires both a visibility change and a blur, so the
/// same logical transition can arrive twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    VisibilityHidden,
    VisibilityVisible,
    Blur,
    Focus,
}

impl LifecycleSignal {
    pub fn is_attention_lost(self) -> bool {
        matches!(self, LifecycleSignal::VisibilityHidden | LifecycleSignal::Blur)
    }
}

impl fmt::Display for LifecycleSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleSignal::VisibilityHidden => "visibilitychange:hidden",
            LifecycleSignal::VisibilityVisible => "visibilitychange:visible",
            LifecycleSignal::Blur => "blur",
            LifecycleSignal::Focus => "focus",
        };
        f.write_str(s)
    }
}

impl FromStr for LifecycleSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hidden" | "visibilitychange:hidden" => Ok(LifecycleSignal::VisibilityHidden),
            "visible" | "visibilitychange:visible" => Ok(LifecycleSignal::VisibilityVisible),
            "blur" => Ok(LifecycleSignal::Blur),
            "focus" => Ok(LifecycleSignal::Focus),
            other => Err(format!("unknown lifecycle signal: {other}")),
        }
    }
}
