//! Master gain envelope.
//!
//! Models a single automation lane the way an audio graph schedules it: a
//! held value, optionally followed by one exponential ramp. Cancelling freezes
//! the lane at whatever value it has reached, so a new ramp always starts
//! from where the listener currently is.

use std::time::Duration;
use tokio::time::Instant;

/// Lowest gain any ramp targets. Exponential ramps towards 0 are undefined.
pub const GAIN_FLOOR: f32 = 0.001;

/// Full output level.
pub const GAIN_FULL: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ramp {
    from: f32,
    to: f32,
    start: Instant,
    end: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GainEnvelope {
    held: f32,
    ramp: Option<Ramp>,
}

impl GainEnvelope {
    pub fn new(initial: f32) -> Self {
        Self {
            held: clamp_gain(initial),
            ramp: None,
        }
    }

    /// Gain at `now`.
    pub fn value_at(&self, now: Instant) -> f32 {
        let Some(ramp) = self.ramp else {
            return self.held;
        };
        if now <= ramp.start {
            return ramp.from;
        }
        if now >= ramp.end {
            return ramp.to;
        }
        let span = ramp.end.duration_since(ramp.start).as_secs_f64();
        let t = now.duration_since(ramp.start).as_secs_f64() / span;
        let from = f64::from(ramp.from.max(GAIN_FLOOR));
        let to = f64::from(ramp.to.max(GAIN_FLOOR));
        (from * (to / from).powf(t)) as f32
    }

    /// Whether a ramp is still moving at `now`.
    pub fn is_ramping(&self, now: Instant) -> bool {
        self.ramp.is_some_and(|r| now < r.end)
    }

    /// Drop scheduled automation, holding the value reached at `now`.
    pub fn cancel_scheduled(&mut self, now: Instant) {
        self.held = self.value_at(now);
        self.ramp = None;
    }

    /// Jump to `value` immediately.
    pub fn set_value(&mut self, value: f32) {
        self.held = clamp_gain(value);
        self.ramp = None;
    }

    /// Ramp exponentially from the current value to `target` over `over`.
    pub fn exponential_ramp(&mut self, target: f32, now: Instant, over: Duration) {
        let from = self.value_at(now).max(GAIN_FLOOR);
        let to = clamp_gain(target).max(GAIN_FLOOR);
        if over.is_zero() {
            self.set_value(to);
            return;
        }
        self.held = to;
        self.ramp = Some(Ramp {
            from,
            to,
            start: now,
            end: now + over,
        });
    }
}

impl Default for GainEnvelope {
    fn default() -> Self {
        Self::new(GAIN_FULL)
    }
}

fn clamp_gain(value: f32) -> f32 {
    if value.is_nan() {
        return GAIN_FLOOR;
    }
    value.clamp(0.0, GAIN_FULL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_reaches_target_and_holds() {
        let now = Instant::now();
        let mut env = GainEnvelope::new(GAIN_FLOOR);
        env.exponential_ramp(GAIN_FULL, now, Duration::from_secs(2));

        assert!((env.value_at(now) - GAIN_FLOOR).abs() < 1e-6);
        assert!((env.value_at(now + Duration::from_secs(2)) - GAIN_FULL).abs() < 1e-6);
        assert!((env.value_at(now + Duration::from_secs(60)) - GAIN_FULL).abs() < 1e-6);
        assert!(!env.is_ramping(now + Duration::from_secs(3)));
    }

    #[test]
    fn exponential_midpoint_is_geometric_mean() {
        let now = Instant::now();
        let mut env = GainEnvelope::new(GAIN_FLOOR);
        env.exponential_ramp(GAIN_FULL, now, Duration::from_secs(2));

        let mid = env.value_at(now + Duration::from_secs(1));
        let expected = (GAIN_FLOOR * GAIN_FULL).sqrt();
        assert!((mid - expected).abs() < 1e-4, "mid = {mid}");
    }

    #[test]
    fn cancel_freezes_current_value() {
        let now = Instant::now();
        let mut env = GainEnvelope::new(GAIN_FULL);
        env.exponential_ramp(GAIN_FLOOR, now, Duration::from_secs(10));

        let later = now + Duration::from_secs(5);
        let reached = env.value_at(later);
        env.cancel_scheduled(later);

        assert!((env.value_at(later + Duration::from_secs(30)) - reached).abs() < 1e-6);
        assert!(reached < GAIN_FULL && reached > GAIN_FLOOR);
    }

    #[test]
    fn ramps_never_target_zero() {
        let now = Instant::now();
        let mut env = GainEnvelope::new(0.0);
        env.exponential_ramp(0.0, now, Duration::from_millis(500));
        let end = env.value_at(now + Duration::from_secs(1));
        assert!((end - GAIN_FLOOR).abs() < 1e-6);
    }
}
