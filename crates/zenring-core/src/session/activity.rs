//! Pointer activity and cancel-tap filtering.

/// Movement (px, either axis) that counts as user activity.
pub const ACTIVITY_THRESHOLD_PX: f64 = 3.0;

/// Taps on the session view are ignored for this long after it appears.
pub const START_GRACE_MS: u64 = 500;

/// On touch screens, a tap this soon after the UI reappeared is the tap that
/// woke it, not a cancel.
pub const WAKE_GRACE_MS: u64 = 500;

/// Detects meaningful pointer/touch movement.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerTracker {
    last: (f64, f64),
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pointer position. Returns `true` if it moved more than
    /// [`ACTIVITY_THRESHOLD_PX`] in either axis since the last activity; the
    /// reference point only advances on activity.
    pub fn observe(&mut self, x: f64, y: f64) -> bool {
        let (lx, ly) = self.last;
        let moved = (x - lx).abs() > ACTIVITY_THRESHOLD_PX || (y - ly).abs() > ACTIVITY_THRESHOLD_PX;
        if moved {
            self.last = (x, y);
        }
        moved
    }
}

/// Decides whether a tap on the session view is a real cancel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancelGuard {
    view_shown_at_ms: Option<u64>,
    ui_woke_at_ms: Option<u64>,
}

impl CancelGuard {
    /// The session view just appeared.
    pub fn view_shown(&mut self, now_ms: u64) {
        self.view_shown_at_ms = Some(now_ms);
        self.ui_woke_at_ms = None;
    }

    /// Chrome went from hidden to visible.
    pub fn ui_woke(&mut self, now_ms: u64) {
        self.ui_woke_at_ms = Some(now_ms);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether a tap at `now_ms` should cancel.
    ///
    /// `coarse_pointer` is true on touch devices. `touch_wake_applies` is true
    /// when the session is in the phase where the UI hides itself.
    pub fn allows_cancel(
        &self,
        now_ms: u64,
        coarse_pointer: bool,
        touch_wake_applies: bool,
        ui_visible: bool,
    ) -> bool {
        if let Some(shown) = self.view_shown_at_ms {
            if now_ms.saturating_sub(shown) < START_GRACE_MS {
                return false;
            }
        }
        if coarse_pointer && touch_wake_applies {
            if !ui_visible {
                return false;
            }
            if let Some(woke) = self.ui_woke_at_ms {
                if now_ms.saturating_sub(woke) < WAKE_GRACE_MS {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_jitter_is_not_activity() {
        let mut tracker = PointerTracker::new();
        assert!(tracker.observe(10.0, 10.0));
        assert!(!tracker.observe(12.0, 13.0));
        assert!(!tracker.observe(13.0, 7.5));
        assert!(tracker.observe(10.0, 14.0));
    }

    #[test]
    fn reference_point_only_moves_on_activity() {
        let mut tracker = PointerTracker::new();
        tracker.observe(100.0, 100.0);
        assert!(!tracker.observe(102.0, 100.0));
        assert!(!tracker.observe(103.0, 100.0));
        assert!(tracker.observe(103.5, 100.0));
    }

    #[test]
    fn taps_right_after_start_are_ignored() {
        let mut guard = CancelGuard::default();
        guard.view_shown(1_000);

        assert!(!guard.allows_cancel(1_200, false, false, true));
        assert!(guard.allows_cancel(1_500, false, false, true));
    }

    #[test]
    fn touch_tap_that_wakes_ui_does_not_cancel() {
        let mut guard = CancelGuard::default();
        guard.view_shown(0);

        assert!(!guard.allows_cancel(10_000, true, true, false));

        guard.ui_woke(10_000);
        assert!(!guard.allows_cancel(10_300, true, true, true));
        assert!(guard.allows_cancel(10_600, true, true, true));
    }

    #[test]
    fn mouse_taps_ignore_wake_window() {
        let mut guard = CancelGuard::default();
        guard.view_shown(0);
        guard.ui_woke(10_000);

        assert!(guard.allows_cancel(10_100, false, true, false));
    }
}
