//! Vertical drag on the duration dial.
//!
//! Upward movement lengthens the session, downward shortens it, in fixed
//! quanta of [`PX_PER_STEP`] pixels per [`SECS_PER_STEP`] seconds. Sub-quantum
//! movement is carried between events so slow drags still register.

use super::{MAX_DURATION_SECS, MIN_DURATION_SECS};

/// Pixels of accumulated movement per duration step.
pub const PX_PER_STEP: f64 = 10.0;

/// Seconds added or removed per step.
pub const SECS_PER_STEP: i64 = 300;

/// Movement (in px, per event) beyond which a hold counts as a drag.
pub const MOVE_THRESHOLD_PX: f64 = 1.0;

/// State of one pointer hold. Lives from pointer-down to pointer-up.
#[derive(Debug, Clone, PartialEq)]
struct Hold {
    last_y: f64,
    accumulated_px: f64,
    moved: bool,
}

/// What releasing the pointer asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartRequest {
    pub from_drag: bool,
}

/// The duration dial's gesture recogniser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DurationSelector {
    hold: Option<Hold>,
}

impl DurationSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_holding(&self) -> bool {
        self.hold.is_some()
    }

    /// Residual movement not yet converted into a step.
    pub fn accumulated_px(&self) -> f64 {
        self.hold.as_ref().map_or(0.0, |h| h.accumulated_px)
    }

    /// Begin a hold at `y`, discarding any previous one.
    pub fn pointer_down(&mut self, y: f64) {
        self.hold = Some(Hold {
            last_y: y,
            accumulated_px: 0.0,
            moved: false,
        });
    }

    /// Feed a pointer position. Returns the new duration when at least one
    /// whole step was crossed, `None` otherwise (including when not holding).
    pub fn pointer_move(&mut self, y: f64, current_secs: u32) -> Option<u32> {
        if !y.is_finite() {
            return None;
        }
        let hold = self.hold.as_mut()?;
        let dy = hold.last_y - y;
        hold.last_y = y;

        if dy.abs() > MOVE_THRESHOLD_PX {
            hold.moved = true;
        }
        hold.accumulated_px += dy;

        if hold.accumulated_px.abs() < PX_PER_STEP {
            return None;
        }

        // `as` saturates, so a huge jump pins to a bound instead of wrapping
        let steps = (hold.accumulated_px / PX_PER_STEP).trunc() as i64;
        let next = i64::from(current_secs)
            .saturating_add(steps.saturating_mul(SECS_PER_STEP));
        let min = i64::from(MIN_DURATION_SECS);
        let max = i64::from(MAX_DURATION_SECS);

        if next >= max || next <= min {
            // pinned at a bound: drop the residue so reversing responds at once
            hold.accumulated_px = 0.0;
        } else {
            hold.accumulated_px -= steps as f64 * PX_PER_STEP;
        }
        Some(next.clamp(min, max) as u32)
    }

    /// End the hold. Returns the start request it implies, or `None` when no
    /// hold was active.
    pub fn pointer_up(&mut self) -> Option<StartRequest> {
        self.hold.take().map(|hold| StartRequest {
            from_drag: hold.moved,
        })
    }

    /// Pointer cancel behaves like release.
    pub fn pointer_cancel(&mut self) -> Option<StartRequest> {
        self.pointer_up()
    }

    /// A tap while nothing is held.
    pub fn tap(&self) -> Option<StartRequest> {
        if self.is_holding() {
            return None;
        }
        Some(StartRequest { from_drag: false })
    }
}
