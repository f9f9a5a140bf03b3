use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::SoundKind;
use crate::session::{SessionPhase, SessionSnapshot};

/// Every state change in a session produces an Event.
/// The runtime logs them and forwards them to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        from_drag: bool,
        duration_secs: u32,
        sound: SoundKind,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        from: SessionPhase,
        to: SessionPhase,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    /// The wind-down fade began ahead of the session ending.
    WindDownFadeStarted {
        fade_ms: u64,
        at: DateTime<Utc>,
    },
    /// A session ran through its wind-down and returned to idle.
    SessionCompleted {
        duration_secs: u32,
        at: DateTime<Utc>,
    },
    /// A session was ended early.
    SessionCancelled {
        phase: SessionPhase,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    DurationChanged {
        duration_secs: u32,
        at: DateTime<Utc>,
    },
    SoundChanged {
        sound: SoundKind,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        snapshot: SessionSnapshot,
        at: DateTime<Utc>,
    },
}

/// Epoch milliseconds as a UTC timestamp.
pub fn timestamp(epoch_ms: u64) -> DateTime<Utc> {
    i64::try_from(epoch_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let event = Event::PhaseChanged {
            from: SessionPhase::Preparing,
            to: SessionPhase::Meditating,
            remaining_secs: 900,
            at: timestamp(0),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PhaseChanged");
        assert_eq!(json["from"], "preparing");
        assert_eq!(json["to"], "meditating");
    }

    #[test]
    fn timestamp_converts_epoch_millis() {
        let at = timestamp(1_700_000_000_123);
        assert_eq!(at.timestamp_millis(), 1_700_000_000_123);
    }
}
