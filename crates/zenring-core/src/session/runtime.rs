//! Session runtime actor.
//!
//! Owns the [`SessionState`], the duration gesture and the preferences, and
//! is the only place the machine's [`Effect`]s turn into real timers and
//! audio commands. Everything reaches it through channels, so transitions
//! are applied one at a time in arrival order.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::clock::EpochClock;
use super::gesture::DurationSelector;
use super::machine::{Effect, Input, Outcome, SessionState};
use super::snapshot::SessionSnapshot;
use super::Timing;
use crate::audio::{AudioQueue, SoundKind};
use crate::events::Event;
use crate::storage::{Language, PreferenceStore, Preferences};

const EVENT_CAPACITY: usize = 64;

/// Requests accepted by a running session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionCommand {
    Start { from_drag: bool },
    Cancel,
    /// Tap on the running session view.
    CenterTap { coarse_pointer: bool },
    /// Pointer pressed on the duration dial.
    PointerDown { y: f64 },
    PointerMove { y: f64 },
    PointerUp,
    PointerCancel,
    /// Plain tap on the duration dial.
    DialTap,
    /// Pointer or touch movement anywhere on screen.
    Activity { x: f64, y: f64 },
    SetHelpOpen(bool),
    AdjustDuration(i64),
    SetDuration(u32),
    SetSound(SoundKind),
    SetLanguage(Language),
    ToggleLanguage,
}

/// Knobs for [`spawn_session`].
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Time acceleration; 1.0 is real time. Applies to session timers and
    /// the progress clock, not to audio fades.
    pub speed: f64,
    /// Epoch anchor; `None` reads the system clock.
    pub epoch_ms: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            epoch_ms: None,
        }
    }
}

/// Client side of a running session. Dropping every handle stops the actor.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
    snapshot: watch::Receiver<SessionSnapshot>,
    preferences: watch::Receiver<Preferences>,
    events: broadcast::Sender<Event>,
    clock: EpochClock,
}

impl SessionHandle {
    /// Queue a command. Returns `false` once the actor has stopped.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.tx.send(command).is_ok()
    }

    pub fn request_start(&self, from_drag: bool) -> bool {
        self.send(SessionCommand::Start { from_drag })
    }

    pub fn request_cancel(&self) -> bool {
        self.send(SessionCommand::Cancel)
    }

    pub fn adjust_selected_duration(&self, delta_secs: i64) -> bool {
        self.send(SessionCommand::AdjustDuration(delta_secs))
    }

    pub fn set_sound_kind(&self, kind: SoundKind) -> bool {
        self.send(SessionCommand::SetSound(kind))
    }

    pub fn pointer_down(&self, y: f64) -> bool {
        self.send(SessionCommand::PointerDown { y })
    }

    pub fn pointer_move(&self, y: f64) -> bool {
        self.send(SessionCommand::PointerMove { y })
    }

    pub fn pointer_up(&self) -> bool {
        self.send(SessionCommand::PointerUp)
    }

    pub fn pointer_activity(&self, x: f64, y: f64) -> bool {
        self.send(SessionCommand::Activity { x, y })
    }

    pub fn set_help_open(&self, open: bool) -> bool {
        self.send(SessionCommand::SetHelpOpen(open))
    }

    pub fn toggle_language(&self) -> bool {
        self.send(SessionCommand::ToggleLanguage)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Progress for the current instant, for per-frame rendering.
    pub fn progress_now(&self) -> f64 {
        self.snapshot.borrow().progress_at(self.clock.now_ms())
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn clock(&self) -> EpochClock {
        self.clock
    }
}

/// Start the session actor on the current tokio runtime.
///
/// Preferences are read from `store` once; failures fall back to defaults.
pub fn spawn_session<S: PreferenceStore>(
    store: S,
    timing: Timing,
    audio: AudioQueue,
    options: SessionOptions,
) -> (SessionHandle, JoinHandle<()>) {
    let prefs = store.load().unwrap_or_else(|e| {
        warn!(error = %e, "failed to load preferences, using defaults");
        Preferences::default()
    });

    let clock = match options.epoch_ms {
        Some(ms) => EpochClock::starting_at(ms),
        None => EpochClock::new(),
    }
    .with_rate(options.speed);

    let state = SessionState::new(prefs.duration_secs, prefs.sound, timing);
    let (tx, commands) = mpsc::unbounded_channel();
    let (timer_tx, timers) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot) = watch::channel(state.snapshot(clock.now_ms()));
    let (prefs_tx, preferences) = watch::channel(prefs.clone());
    let (events, _) = broadcast::channel(EVENT_CAPACITY);

    let actor = SessionActor {
        state,
        selector: DurationSelector::new(),
        prefs,
        store,
        audio,
        clock,
        timer_tx,
        clock_task: None,
        hide_task: None,
        snapshot_tx,
        prefs_tx,
        events: events.clone(),
    };
    let task = tokio::spawn(actor.run(commands, timers));

    let handle = SessionHandle {
        tx,
        snapshot,
        preferences,
        events,
        clock,
    };
    (handle, task)
}

struct SessionActor<S: PreferenceStore> {
    state: SessionState,
    selector: DurationSelector,
    prefs: Preferences,
    store: S,
    audio: AudioQueue,
    clock: EpochClock,
    timer_tx: mpsc::UnboundedSender<Input>,
    clock_task: Option<JoinHandle<()>>,
    hide_task: Option<JoinHandle<()>>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    prefs_tx: watch::Sender<Preferences>,
    events: broadcast::Sender<Event>,
}

impl<S: PreferenceStore> SessionActor<S> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut timers: mpsc::UnboundedReceiver<Input>,
    ) {
        debug!("session runtime started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                Some(input) = timers.recv() => self.dispatch(input),
            }
        }
        self.stop_clock();
        self.cancel_hide_timer();
        debug!("session runtime stopped");
    }

    fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start { from_drag } => self.dispatch(Input::RequestStart { from_drag }),
            SessionCommand::Cancel => self.dispatch(Input::RequestCancel),
            SessionCommand::CenterTap { coarse_pointer } => {
                self.dispatch(Input::CenterTap { coarse_pointer })
            }
            SessionCommand::PointerDown { y } => {
                if !self.state.phase().is_active() {
                    self.selector.pointer_down(y);
                }
            }
            SessionCommand::PointerMove { y } => {
                let current = self.state.selected_duration_secs();
                if let Some(next) = self.selector.pointer_move(y, current) {
                    self.dispatch(Input::SetDuration(next));
                }
            }
            SessionCommand::PointerUp | SessionCommand::PointerCancel => {
                if let Some(request) = self.selector.pointer_up() {
                    self.dispatch(Input::RequestStart {
                        from_drag: request.from_drag,
                    });
                }
            }
            SessionCommand::DialTap => {
                if let Some(request) = self.selector.tap() {
                    self.dispatch(Input::RequestStart {
                        from_drag: request.from_drag,
                    });
                }
            }
            SessionCommand::Activity { x, y } => self.dispatch(Input::PointerMoved { x, y }),
            SessionCommand::SetHelpOpen(open) => self.dispatch(Input::SetHelpOpen(open)),
            SessionCommand::AdjustDuration(delta) => self.dispatch(Input::AdjustDuration(delta)),
            SessionCommand::SetDuration(secs) => self.dispatch(Input::SetDuration(secs)),
            SessionCommand::SetSound(sound) => self.dispatch(Input::SetSound(sound)),
            SessionCommand::SetLanguage(language) => self.set_language(language),
            SessionCommand::ToggleLanguage => self.set_language(self.prefs.language.toggled()),
        }
    }

    fn dispatch(&mut self, input: Input) {
        let now = self.clock.now_ms();
        let outcome = self.state.handle(input, now);
        self.apply(outcome, now);
    }

    fn apply(&mut self, outcome: Outcome, now_ms: u64) {
        for effect in outcome.effects {
            match effect {
                Effect::Audio(command) => {
                    debug!(?command, "audio");
                    self.audio.send(command);
                }
                Effect::StartClock { clock } => self.start_clock(clock),
                Effect::StopClock => self.stop_clock(),
                Effect::ArmHideTimer { timer, after_ms } => self.arm_hide_timer(timer, after_ms),
                Effect::CancelHideTimer => self.cancel_hide_timer(),
            }
        }

        let mut prefs_changed = false;
        for event in outcome.events {
            match &event {
                Event::PhaseChanged { from, to, remaining_secs, .. } => {
                    info!(%from, %to, remaining_secs, "phase changed");
                }
                Event::DurationChanged { duration_secs, .. } => {
                    self.prefs.duration_secs = *duration_secs;
                    prefs_changed = true;
                }
                Event::SoundChanged { sound, .. } => {
                    self.prefs.sound = *sound;
                    prefs_changed = true;
                }
                other => debug!(event = ?other, "session event"),
            }
            // no subscribers is fine
            let _ = self.events.send(event);
        }
        if prefs_changed {
            self.persist();
        }

        self.snapshot_tx.send_replace(self.state.snapshot(now_ms));
    }

    fn set_language(&mut self, language: Language) {
        if self.prefs.language == language {
            return;
        }
        self.prefs.language = language;
        self.persist();
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.prefs) {
            warn!(error = %e, "failed to save preferences");
        }
        self.prefs_tx.send_replace(self.prefs.clone());
    }

    fn start_clock(&mut self, clock: u64) {
        self.stop_clock();
        let period = self.clock.real(Duration::from_secs(1)).max(Duration::from_millis(1));
        let tx = self.timer_tx.clone();
        self.clock_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(Input::Tick { clock }).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_clock(&mut self) {
        if let Some(task) = self.clock_task.take() {
            task.abort();
        }
    }

    fn arm_hide_timer(&mut self, timer: u64, after_ms: u64) {
        self.cancel_hide_timer();
        let delay = self.clock.real(Duration::from_millis(after_ms));
        let tx = self.timer_tx.clone();
        self.hide_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Input::HideTimerFired { timer });
        }));
    }

    fn cancel_hide_timer(&mut self) {
        if let Some(task) = self.hide_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioCommand;
    use crate::session::SessionPhase;
    use crate::storage::MemoryStore;

    const T0: u64 = 1_700_000_000_000;

    fn spawn(store: MemoryStore) -> (SessionHandle, mpsc::UnboundedReceiver<AudioCommand>) {
        let (audio, rx) = AudioQueue::detached();
        let options = SessionOptions {
            epoch_ms: Some(T0),
            ..SessionOptions::default()
        };
        let (handle, _task) = spawn_session(store, Timing::default(), audio, options);
        (handle, rx)
    }

    async fn wait_for(
        handle: &SessionHandle,
        pred: impl Fn(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = handle.watch();
        loop {
            let snap = rx.borrow_and_update().clone();
            if pred(&snap) {
                return snap;
            }
            rx.changed().await.unwrap();
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<AudioCommand>) -> Vec<AudioCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            out.push(cmd);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn full_session_runs_to_idle_with_audio_cues() {
        let store = MemoryStore::new(Preferences {
            duration_secs: 300,
            ..Preferences::default()
        });
        let (handle, mut audio) = spawn(store);
        let started = Instant::now();

        handle.request_start(false);
        wait_for(&handle, |s| s.phase == SessionPhase::Preparing).await;
        wait_for(&handle, |s| s.phase == SessionPhase::Idle).await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(425), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(426), "{elapsed:?}");
        assert_eq!(
            drain(&mut audio),
            vec![
                AudioCommand::StopAll,
                AudioCommand::Prepare,
                AudioCommand::PlayAmbient {
                    sound: SoundKind::Forest
                },
                AudioCommand::PlayChime,
                AudioCommand::PlayChime,
                AudioCommand::FadeOutAll { duration_ms: 10_000 },
                AudioCommand::FadeOutAll { duration_ms: 2000 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_clock() {
        let (handle, mut audio) = spawn(MemoryStore::default());
        handle.request_start(false);
        wait_for(&handle, |s| s.remaining_secs == 3).await;

        handle.request_cancel();
        let snap = wait_for(&handle, |s| s.phase == SessionPhase::Idle).await;
        assert_eq!(snap.started_at_epoch_ms, None);
        assert!(snap.ui_visible);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Idle);
        assert_eq!(
            drain(&mut audio).last(),
            Some(&AudioCommand::FadeOutAll { duration_ms: 2000 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn drag_release_starts_and_persists_duration() {
        let store = MemoryStore::default();
        let (handle, _audio) = spawn(store.clone());

        handle.pointer_down(200.0);
        handle.pointer_move(180.0);
        handle.pointer_up();

        let snap = wait_for(&handle, |s| s.phase == SessionPhase::Preparing).await;
        assert!(snap.originated_from_drag);
        assert_eq!(snap.selected_duration_secs, 1500);
        assert_eq!(store.current().duration_secs, 1500);
    }

    #[tokio::test(start_paused = true)]
    async fn drag_persists_once_per_step() {
        let store = MemoryStore::default();
        let (handle, _audio) = spawn(store.clone());

        handle.pointer_down(200.0);
        handle.pointer_move(195.0);
        handle.pointer_move(190.0);
        handle.pointer_move(180.0);
        wait_for(&handle, |s| s.selected_duration_secs == 1500).await;

        // the sub-step move saved nothing
        assert_eq!(store.saves(), 2);
        assert_eq!(store.current().duration_secs, 1500);
    }

    #[tokio::test(start_paused = true)]
    async fn ui_hides_after_idle_and_wakes_on_activity() {
        let (handle, _audio) = spawn(MemoryStore::default());
        handle.request_start(false);
        wait_for(&handle, |s| s.phase == SessionPhase::Meditating).await;

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert!(!handle.snapshot().ui_visible);

        handle.pointer_activity(50.0, 50.0);
        wait_for(&handle, |s| s.ui_visible).await;
    }

    #[tokio::test(start_paused = true)]
    async fn progress_tracks_the_clock_between_ticks() {
        let store = MemoryStore::new(Preferences {
            duration_secs: 600,
            ..Preferences::default()
        });
        let (handle, _audio) = spawn(store);
        handle.request_start(false);
        wait_for(&handle, |s| s.phase == SessionPhase::Meditating).await;

        tokio::time::sleep(Duration::from_millis(60_500)).await;
        let progress = handle.progress_now();
        assert!(progress > 0.1 && progress < 0.102, "{progress}");
    }

    #[tokio::test(start_paused = true)]
    async fn language_toggle_is_persisted() {
        let store = MemoryStore::default();
        let (handle, _audio) = spawn(store.clone());

        handle.toggle_language();
        handle.set_sound_kind(SoundKind::Stream);
        wait_for(&handle, |s| s.sound == SoundKind::Stream).await;

        assert_eq!(handle.preferences().language, Language::En);
        assert_eq!(store.current().language, Language::En);
        assert_eq!(store.current().sound, SoundKind::Stream);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_actor() {
        let (audio, mut rx) = AudioQueue::detached();
        let (handle, task) =
            spawn_session(MemoryStore::default(), Timing::default(), audio, SessionOptions::default());
        handle.request_start(false);
        drop(handle);

        task.await.unwrap();
        while rx.recv().await.is_some() {}
    }
}
