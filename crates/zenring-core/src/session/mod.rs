pub mod activity;
pub mod clock;
pub mod gesture;
pub mod machine;
pub mod phase;
pub mod runtime;
pub mod snapshot;

pub use activity::{CancelGuard, PointerTracker};
pub use clock::EpochClock;
pub use gesture::{DurationSelector, StartRequest};
pub use machine::{Effect, Input, Outcome, SessionState};
pub use phase::{dial_minutes, format_countdown, SessionPhase};
pub use runtime::{spawn_session, SessionCommand, SessionHandle, SessionOptions};
pub use snapshot::{meditation_progress, SessionSnapshot};

use serde::{Deserialize, Serialize};

pub const MIN_DURATION_SECS: u32 = 300;
pub const MAX_DURATION_SECS: u32 = 7200;
pub const DEFAULT_DURATION_SECS: u32 = 900;

/// Lead-in before the countdown.
pub const PREPARE_TIME_SECS: u32 = 5;
/// Wind-down after the countdown.
pub const BUFFER_TIME_SECS: u32 = 120;

/// Clamp a requested duration into the selectable range.
pub fn clamp_duration(secs: i64) -> u32 {
    secs.clamp(i64::from(MIN_DURATION_SECS), i64::from(MAX_DURATION_SECS)) as u32
}

/// Phase lengths and fade timings. Stored under `[timing]` in the config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    #[serde(default = "default_prepare_secs")]
    pub prepare_secs: u32,
    #[serde(default = "default_buffer_secs")]
    pub buffer_secs: u32,
    #[serde(default = "default_ui_hide_ms")]
    pub ui_hide_ms: u64,
    /// Remaining wind-down seconds at which the closing fade starts.
    #[serde(default = "default_wind_down_fade_secs")]
    pub wind_down_fade_secs: u32,
    /// Fade applied when a session is reset.
    #[serde(default = "default_reset_fade_ms")]
    pub reset_fade_ms: u64,
}

fn default_prepare_secs() -> u32 {
    PREPARE_TIME_SECS
}
fn default_buffer_secs() -> u32 {
    BUFFER_TIME_SECS
}
fn default_ui_hide_ms() -> u64 {
    5000
}
fn default_wind_down_fade_secs() -> u32 {
    10
}
fn default_reset_fade_ms() -> u64 {
    2000
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            prepare_secs: default_prepare_secs(),
            buffer_secs: default_buffer_secs(),
            ui_hide_ms: default_ui_hide_ms(),
            wind_down_fade_secs: default_wind_down_fade_secs(),
            reset_fade_ms: default_reset_fade_ms(),
        }
    }
}
