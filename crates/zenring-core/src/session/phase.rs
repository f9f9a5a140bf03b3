use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Stage of a meditation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Idle,
    /// Short lead-in before the countdown; ambient fades in.
    Preparing,
    /// Main countdown.
    Meditating,
    /// Wind-down grace period; audio fades out before returning to idle.
    Finishing,
}

impl SessionPhase {
    /// Phases in which pointer activity drives UI auto-hide.
    pub fn auto_hides_ui(self) -> bool {
        matches!(self, SessionPhase::Preparing | SessionPhase::Meditating)
    }

    pub fn is_active(self) -> bool {
        self != SessionPhase::Idle
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Preparing => "preparing",
            SessionPhase::Meditating => "meditating",
            SessionPhase::Finishing => "finishing",
        }
    }

    /// How long the renderer should take to cross-fade its background into
    /// this phase.
    pub fn transition_hint(self, accelerated_wind_down: bool) -> Duration {
        match self {
            SessionPhase::Meditating => Duration::from_secs(5),
            SessionPhase::Finishing if !accelerated_wind_down => Duration::from_secs(60),
            _ => Duration::from_secs(2),
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `MM:SS` countdown label. Minutes are not wrapped at 60.
pub fn format_countdown(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Whole minutes shown on the duration dial.
pub fn dial_minutes(secs: u32) -> u32 {
    secs / 60
}
