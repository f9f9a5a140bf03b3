//! Session state machine.
//!
//! A pure transition function: [`SessionState::handle`] takes an [`Input`]
//! and the current epoch time and returns the [`Effect`]s the runtime must
//! execute plus the [`Event`]s describing what happened. Nothing here sleeps,
//! spawns or plays sound.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -(start)-> Preparing -(tick@1)-> Meditating -(tick@1)-> Finishing -(tick@1)-> Idle
//!   ^                                                                                  |
//!   +------------------------------- cancel (any active phase) ------------------------+
//! ```
//!
//! Phase timing is counted in ticks: a phase configured for N seconds sees N
//! ticks, the last of which performs the transition instead of decrementing.
//! Timer effects carry a generation so ticks or hide-timer expiries that were
//! already queued when their timer was replaced are ignored.

use tracing::debug;

use super::activity::{CancelGuard, PointerTracker};
use super::phase::{format_countdown, SessionPhase};
use super::snapshot::{meditation_progress, SessionSnapshot};
use super::{clamp_duration, Timing};
use crate::audio::{AudioCommand, SoundKind};
use crate::events::{timestamp, Event};

/// Something that happened to the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input {
    RequestStart { from_drag: bool },
    /// Unconditional cancel.
    RequestCancel,
    /// Tap on the session view; cancels unless inside a grace window.
    CenterTap { coarse_pointer: bool },
    Tick { clock: u64 },
    PointerMoved { x: f64, y: f64 },
    HideTimerFired { timer: u64 },
    SetHelpOpen(bool),
    SetDuration(u32),
    AdjustDuration(i64),
    SetSound(SoundKind),
}

/// Work the runtime performs on the machine's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Audio(AudioCommand),
    /// Start the 1 Hz clock, replacing any running one.
    StartClock { clock: u64 },
    StopClock,
    /// (Re)arm the auto-hide timer, replacing any pending one.
    ArmHideTimer { timer: u64, after_ms: u64 },
    CancelHideTimer,
}

/// Result of one transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub effects: Vec<Effect>,
    pub events: Vec<Event>,
}

impl Outcome {
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.events.is_empty()
    }

    /// Audio commands in emission order.
    pub fn audio(&self) -> Vec<AudioCommand> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Audio(cmd) => Some(*cmd),
                _ => None,
            })
            .collect()
    }

    fn play(&mut self, command: AudioCommand) {
        self.effects.push(Effect::Audio(command));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    phase: SessionPhase,
    selected_duration_secs: u32,
    remaining_secs: u32,
    started_at_epoch_ms: Option<u64>,
    ui_visible: bool,
    accelerated_wind_down: bool,
    originated_from_drag: bool,
    sound: SoundKind,
    help_open: bool,
    timing: Timing,
    pointer: PointerTracker,
    guard: CancelGuard,
    clock: u64,
    hide_timer: u64,
}

impl SessionState {
    /// Idle session with the user's stored duration and sound.
    pub fn new(selected_duration_secs: u32, sound: SoundKind, timing: Timing) -> Self {
        Self {
            phase: SessionPhase::Idle,
            selected_duration_secs: clamp_duration(i64::from(selected_duration_secs)),
            remaining_secs: 0,
            started_at_epoch_ms: None,
            ui_visible: true,
            accelerated_wind_down: false,
            originated_from_drag: false,
            sound,
            help_open: false,
            timing,
            pointer: PointerTracker::new(),
            guard: CancelGuard::default(),
            clock: 0,
            hide_timer: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn selected_duration_secs(&self) -> u32 {
        self.selected_duration_secs
    }

    pub fn started_at_epoch_ms(&self) -> Option<u64> {
        self.started_at_epoch_ms
    }

    pub fn ui_visible(&self) -> bool {
        self.ui_visible
    }

    pub fn accelerated_wind_down(&self) -> bool {
        self.accelerated_wind_down
    }

    pub fn originated_from_drag(&self) -> bool {
        self.originated_from_drag
    }

    pub fn sound(&self) -> SoundKind {
        self.sound
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Generation of the clock that is currently allowed to tick.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Generation of the hide timer that is currently allowed to fire.
    pub fn hide_timer(&self) -> u64 {
        self.hide_timer
    }

    /// 0.0 ..= 1.0; wall-clock based while meditating.
    pub fn progress(&self, now_ms: u64) -> f64 {
        match self.phase {
            SessionPhase::Meditating => self
                .started_at_epoch_ms
                .map(|started| meditation_progress(started, now_ms, self.selected_duration_secs))
                .unwrap_or(0.0),
            SessionPhase::Finishing => 1.0,
            SessionPhase::Idle | SessionPhase::Preparing => 0.0,
        }
    }

    pub fn snapshot(&self, now_ms: u64) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            countdown: format_countdown(self.remaining_secs),
            progress: self.progress(now_ms),
            ui_visible: self.ui_visible,
            accelerated_wind_down: self.accelerated_wind_down,
            originated_from_drag: self.originated_from_drag,
            selected_duration_secs: self.selected_duration_secs,
            sound: self.sound,
            help_open: self.help_open,
            started_at_epoch_ms: self.started_at_epoch_ms,
            transition_ms: self
                .phase
                .transition_hint(self.accelerated_wind_down)
                .as_millis() as u64,
        }
    }

    pub fn snapshot_event(&self, now_ms: u64) -> Event {
        Event::StateSnapshot {
            snapshot: self.snapshot(now_ms),
            at: timestamp(now_ms),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn handle(&mut self, input: Input, now_ms: u64) -> Outcome {
        match input {
            Input::RequestStart { from_drag } => self.start(from_drag, now_ms),
            Input::RequestCancel => self.cancel(now_ms),
            Input::CenterTap { coarse_pointer } => self.center_tap(coarse_pointer, now_ms),
            Input::Tick { clock } => self.on_tick(clock, now_ms),
            Input::PointerMoved { x, y } => self.pointer_moved(x, y, now_ms),
            Input::HideTimerFired { timer } => self.hide_timer_fired(timer),
            Input::SetHelpOpen(open) => {
                self.help_open = open;
                Outcome::default()
            }
            Input::SetDuration(secs) => self.set_duration(i64::from(secs), now_ms),
            Input::AdjustDuration(delta) => {
                let requested = i64::from(self.selected_duration_secs).saturating_add(delta);
                self.set_duration(requested, now_ms)
            }
            Input::SetSound(sound) => self.set_sound(sound, now_ms),
        }
    }

    pub fn start(&mut self, from_drag: bool, now_ms: u64) -> Outcome {
        let mut out = Outcome::default();
        if self.phase != SessionPhase::Idle {
            debug!(phase = %self.phase, "start ignored, session already running");
            return out;
        }

        self.phase = SessionPhase::Preparing;
        self.remaining_secs = self.timing.prepare_secs.max(1);
        self.originated_from_drag = from_drag;
        self.started_at_epoch_ms = None;
        self.accelerated_wind_down = false;
        self.ui_visible = true;
        self.guard.view_shown(now_ms);
        self.clock += 1;

        out.play(AudioCommand::StopAll);
        out.play(AudioCommand::Prepare);
        out.play(AudioCommand::PlayAmbient { sound: self.sound });
        out.effects.push(Effect::StartClock { clock: self.clock });

        let at = timestamp(now_ms);
        out.events.push(Event::SessionStarted {
            from_drag,
            duration_secs: self.selected_duration_secs,
            sound: self.sound,
            at,
        });
        out.events.push(Event::PhaseChanged {
            from: SessionPhase::Idle,
            to: SessionPhase::Preparing,
            remaining_secs: self.remaining_secs,
            at,
        });
        out
    }

    /// End the session early. A no-op while idle.
    pub fn cancel(&mut self, now_ms: u64) -> Outcome {
        if self.phase == SessionPhase::Idle {
            return Outcome::default();
        }
        let cancelled = Event::SessionCancelled {
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            at: timestamp(now_ms),
        };
        let mut out = self.reset(now_ms);
        out.events.insert(0, cancelled);
        out
    }

    /// Advance the countdown using the clock currently in force.
    pub fn tick(&mut self, now_ms: u64) -> Outcome {
        self.on_tick(self.clock, now_ms)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn center_tap(&mut self, coarse_pointer: bool, now_ms: u64) -> Outcome {
        if self.phase == SessionPhase::Idle {
            return Outcome::default();
        }
        let touch_wake_applies = self.phase == SessionPhase::Meditating;
        if !self
            .guard
            .allows_cancel(now_ms, coarse_pointer, touch_wake_applies, self.ui_visible)
        {
            debug!(phase = %self.phase, "tap inside grace window, not cancelling");
            return Outcome::default();
        }
        self.cancel(now_ms)
    }

    fn on_tick(&mut self, clock: u64, now_ms: u64) -> Outcome {
        let mut out = Outcome::default();
        if self.phase == SessionPhase::Idle || clock != self.clock {
            return out;
        }

        if self.remaining_secs > 1 {
            if self.phase == SessionPhase::Finishing
                && self.remaining_secs == self.timing.wind_down_fade_secs
            {
                let fade_ms = u64::from(self.timing.wind_down_fade_secs) * 1000;
                out.play(AudioCommand::FadeOutAll { duration_ms: fade_ms });
                out.events.push(Event::WindDownFadeStarted {
                    fade_ms,
                    at: timestamp(now_ms),
                });
            }
            self.remaining_secs -= 1;
            return out;
        }

        match self.phase {
            SessionPhase::Preparing => self.enter_meditating(now_ms),
            SessionPhase::Meditating => self.enter_finishing(now_ms),
            SessionPhase::Finishing => {
                let completed = Event::SessionCompleted {
                    duration_secs: self.selected_duration_secs,
                    at: timestamp(now_ms),
                };
                let mut out = self.reset(now_ms);
                out.events.insert(0, completed);
                out
            }
            SessionPhase::Idle => out,
        }
    }

    fn enter_meditating(&mut self, now_ms: u64) -> Outcome {
        let mut out = Outcome::default();
        let from = self.phase;
        self.phase = SessionPhase::Meditating;
        self.started_at_epoch_ms = Some(now_ms);
        self.remaining_secs = self.selected_duration_secs;

        out.play(AudioCommand::PlayChime);
        self.show_ui(now_ms);
        self.arm_hide_timer(&mut out);

        out.events.push(Event::PhaseChanged {
            from,
            to: SessionPhase::Meditating,
            remaining_secs: self.remaining_secs,
            at: timestamp(now_ms),
        });
        out
    }

    fn enter_finishing(&mut self, now_ms: u64) -> Outcome {
        let mut out = Outcome::default();
        let from = self.phase;
        self.phase = SessionPhase::Finishing;
        self.remaining_secs = self.timing.buffer_secs.max(1);
        self.accelerated_wind_down = false;

        out.play(AudioCommand::PlayChime);
        self.show_ui(now_ms);
        self.cancel_hide_timer(&mut out);

        out.events.push(Event::PhaseChanged {
            from,
            to: SessionPhase::Finishing,
            remaining_secs: self.remaining_secs,
            at: timestamp(now_ms),
        });
        out
    }

    /// Full reset back to idle, shared by cancel and completion.
    fn reset(&mut self, now_ms: u64) -> Outcome {
        let mut out = Outcome::default();
        let from = self.phase;

        self.clock += 1;
        out.effects.push(Effect::StopClock);
        self.cancel_hide_timer(&mut out);
        out.play(AudioCommand::FadeOutAll {
            duration_ms: self.timing.reset_fade_ms,
        });

        self.phase = SessionPhase::Idle;
        self.remaining_secs = 0;
        self.started_at_epoch_ms = None;
        self.ui_visible = true;
        self.accelerated_wind_down = false;
        self.originated_from_drag = false;
        self.guard.clear();

        out.events.push(Event::PhaseChanged {
            from,
            to: SessionPhase::Idle,
            remaining_secs: 0,
            at: timestamp(now_ms),
        });
        out
    }

    fn pointer_moved(&mut self, x: f64, y: f64, now_ms: u64) -> Outcome {
        let mut out = Outcome::default();
        if !self.pointer.observe(x, y) {
            return out;
        }
        match self.phase {
            SessionPhase::Preparing | SessionPhase::Meditating => {
                self.show_ui(now_ms);
                self.cancel_hide_timer(&mut out);
                if !self.help_open {
                    self.arm_hide_timer(&mut out);
                }
            }
            SessionPhase::Finishing => self.accelerated_wind_down = true,
            SessionPhase::Idle => {}
        }
        out
    }

    fn hide_timer_fired(&mut self, timer: u64) -> Outcome {
        if timer == self.hide_timer && self.phase.auto_hides_ui() {
            self.ui_visible = false;
        }
        Outcome::default()
    }

    fn set_duration(&mut self, requested: i64, now_ms: u64) -> Outcome {
        let mut out = Outcome::default();
        if self.phase != SessionPhase::Idle {
            debug!(phase = %self.phase, "duration is locked while a session runs");
            return out;
        }
        let next = clamp_duration(requested);
        if next != self.selected_duration_secs {
            self.selected_duration_secs = next;
            out.events.push(Event::DurationChanged {
                duration_secs: next,
                at: timestamp(now_ms),
            });
        }
        out
    }

    fn set_sound(&mut self, sound: SoundKind, now_ms: u64) -> Outcome {
        let mut out = Outcome::default();
        if self.phase != SessionPhase::Idle {
            debug!(phase = %self.phase, "sound is locked while a session runs");
            return out;
        }
        if sound != self.sound {
            self.sound = sound;
            out.events.push(Event::SoundChanged {
                sound,
                at: timestamp(now_ms),
            });
        }
        out
    }

    fn show_ui(&mut self, now_ms: u64) {
        if !self.ui_visible {
            self.guard.ui_woke(now_ms);
        }
        self.ui_visible = true;
    }

    fn arm_hide_timer(&mut self, out: &mut Outcome) {
        self.hide_timer += 1;
        out.effects.push(Effect::ArmHideTimer {
            timer: self.hide_timer,
            after_ms: self.timing.ui_hide_ms,
        });
    }

    fn cancel_hide_timer(&mut self, out: &mut Outcome) {
        self.hide_timer += 1;
        out.effects.push(Effect::CancelHideTimer);
    }
}
