use serde::{Deserialize, Serialize};

use super::phase::SessionPhase;
use crate::audio::SoundKind;

/// Read-only view of the session handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub remaining_secs: u32,
    /// `MM:SS` rendering of `remaining_secs`.
    pub countdown: String,
    /// 0.0 ..= 1.0 as of when the snapshot was taken.
    pub progress: f64,
    pub ui_visible: bool,
    pub accelerated_wind_down: bool,
    pub originated_from_drag: bool,
    pub selected_duration_secs: u32,
    pub sound: SoundKind,
    pub help_open: bool,
    pub started_at_epoch_ms: Option<u64>,
    /// Background cross-fade duration hint for this phase.
    pub transition_ms: u64,
}

impl SessionSnapshot {
    /// Progress recomputed for `now_ms`, for per-frame rendering between
    /// snapshots.
    pub fn progress_at(&self, now_ms: u64) -> f64 {
        match (self.phase, self.started_at_epoch_ms) {
            (SessionPhase::Meditating, Some(started)) => {
                meditation_progress(started, now_ms, self.selected_duration_secs)
            }
            (SessionPhase::Finishing, _) => 1.0,
            _ => 0.0,
        }
    }
}

/// Wall-clock progress through a meditation of `duration_secs` that began at
/// `started_at_ms`. Independent of how many ticks actually fired.
pub fn meditation_progress(started_at_ms: u64, now_ms: u64, duration_secs: u32) -> f64 {
    if duration_secs == 0 {
        return 1.0;
    }
    let elapsed_secs = now_ms.saturating_sub(started_at_ms) as f64 / 1000.0;
    (elapsed_secs / f64::from(duration_secs)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn progress_is_clamped() {
        assert_eq!(meditation_progress(10_000, 5_000, 600), 0.0);
        assert_eq!(meditation_progress(0, 300_000, 600), 0.5);
        assert_eq!(meditation_progress(0, 10_000_000, 600), 1.0);
    }

    proptest! {
        #[test]
        fn progress_is_monotone_and_completes(
            started in 0u64..1_000_000_000,
            duration in 300u32..=7200,
            a in 0u64..10_000_000,
            b in 0u64..10_000_000,
        ) {
            let (early, late) = if a <= b { (a, b) } else { (b, a) };
            let p1 = meditation_progress(started, started + early, duration);
            let p2 = meditation_progress(started, started + late, duration);
            prop_assert!(p1 <= p2);

            let end = started + u64::from(duration) * 1000;
            prop_assert!((meditation_progress(started, end, duration) - 1.0).abs() < 1e-9);
        }
    }
}
