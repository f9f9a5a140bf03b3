//! Audio engine.
//!
//! Drives an ambient bed and a chime through one master gain. All operations
//! are async and fire-and-forget from the caller's point of view; failures are
//! logged and swallowed.
//!
//! ## Race-safety
//!
//! - Every operation first cancels the pending fade (the deferred pause a
//!   previous fade scheduled). Last caller wins; fades never stack.
//! - Every gain change first cancels scheduled ramps, so chime, ambient and
//!   fade serialize through the gain lane.
//! - At most one in-flight `play()` is tracked per track. A pause always
//!   awaits it first, so a pause can never overtake an unresolved play.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{FutureExt, Shared};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::backend::{AudioBackend, PlayFuture, Track};
use super::envelope::{GAIN_FLOOR, GAIN_FULL};
use super::queue::AudioCommand;
use super::sources::{SoundKind, SoundSources};
use crate::error::PlaybackError;

/// Ramp applied when switching to the silent ambient option.
pub const SILENCE_RAMP: Duration = Duration::from_millis(500);

/// Ramp from the floor up to full when an ambient track starts.
pub const AMBIENT_RAMP_IN: Duration = Duration::from_secs(2);

type SharedPlay = Shared<PlayFuture>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseScope {
    Ambient,
    All,
}

struct InFlight {
    id: u64,
    play: SharedPlay,
}

struct PendingFade {
    id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct EngineState {
    unlocked: bool,
    closed: bool,
    current_ambient: Option<SoundKind>,
    pending_fade: Option<PendingFade>,
    next_fade_id: u64,
    ambient_play: Option<InFlight>,
    chime_play: Option<InFlight>,
    next_play_id: u64,
}

impl EngineState {
    fn in_flight_mut(&mut self, track: Track) -> &mut Option<InFlight> {
        match track {
            Track::Ambient => &mut self.ambient_play,
            Track::Chime => &mut self.chime_play,
        }
    }
}

struct EngineInner<B: AudioBackend> {
    backend: B,
    sources: SoundSources,
    state: Mutex<EngineState>,
}

impl<B: AudioBackend> Drop for EngineInner<B> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(fade) = state.pending_fade.take() {
            fade.handle.abort();
        }
        if state.closed {
            return;
        }
        state.closed = true;
        for track in Track::ALL {
            self.backend.pause(track);
            self.backend.release(track);
        }
        self.backend.close();
    }
}

/// Snapshot of the engine's own bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStatus {
    pub unlocked: bool,
    pub current_ambient: Option<SoundKind>,
    pub master_gain: f32,
    pub fade_pending: bool,
}

/// Ambient + chime playback with fades. Cloning shares the engine.
pub struct AudioEngine<B: AudioBackend> {
    inner: Arc<EngineInner<B>>,
}

impl<B: AudioBackend> Clone for AudioEngine<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: AudioBackend> AudioEngine<B> {
    /// Create an engine over `backend`. The chime source is loaded up front;
    /// nothing is attached until [`prepare`](Self::prepare).
    pub fn new(backend: B, sources: SoundSources) -> Self {
        if let Err(e) = backend.load(Track::Chime, sources.chime()) {
            warn!(error = %e, "failed to load chime");
        }
        Self {
            inner: Arc::new(EngineInner {
                backend,
                sources,
                state: Mutex::new(EngineState::default()),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn status(&self) -> EngineStatus {
        let state = self.state();
        EngineStatus {
            unlocked: state.unlocked,
            current_ambient: state.current_ambient,
            master_gain: self.inner.backend.gain(),
            fade_pending: state
                .pending_fade
                .as_ref()
                .is_some_and(|fade| !fade.handle.is_finished()),
        }
    }

    /// Run one queued command.
    pub async fn execute(&self, command: AudioCommand) {
        debug!(?command, "audio command");
        match command {
            AudioCommand::Prepare => self.prepare().await,
            AudioCommand::StopAll => self.stop_all().await,
            AudioCommand::PlayAmbient { sound } => self.play_ambient(sound).await,
            AudioCommand::PlayChime => self.play_chime().await,
            AudioCommand::FadeOutAll { duration_ms } => {
                self.fade_out_all(Duration::from_millis(duration_ms)).await
            }
        }
    }

    // ── Operations ───────────────────────────────────────────────────

    /// One-time unlock: attach both tracks to the output and prime them.
    ///
    /// A rejected attach leaves the engine locked; the next call retries.
    pub async fn prepare(&self) {
        if self.state().unlocked {
            return;
        }
        let backend = &self.inner.backend;
        if let Err(e) = backend.resume() {
            debug!(error = %e, "output resume failed during unlock");
        }
        for track in Track::ALL {
            if let Err(e) = backend.attach(track) {
                debug!(error = %e, "audio unlock rejected");
                return;
            }
        }
        self.state().unlocked = true;
        for track in Track::ALL {
            // Priming only; a track without a source fails here and that is fine.
            let _ = backend.play(track).await;
            backend.pause(track);
        }
        debug!("audio unlocked");
    }

    /// Silence immediately, then pause and rewind both tracks.
    pub async fn stop_all(&self) {
        self.cancel_pending_fade();
        let backend = &self.inner.backend;
        backend.cancel_gain_ramps();
        backend.set_gain(GAIN_FLOOR);

        self.safe_pause(Track::Ambient).await;
        backend.rewind(Track::Ambient);
        self.safe_pause(Track::Chime).await;
        backend.rewind(Track::Chime);
        self.state().current_ambient = None;
    }

    /// Switch the ambient bed to `kind`, fading in from silence.
    pub async fn play_ambient(&self, kind: SoundKind) {
        self.cancel_pending_fade();
        self.ensure_output().await;
        let backend = &self.inner.backend;
        backend.cancel_gain_ramps();

        self.safe_pause(Track::Chime).await;
        backend.rewind(Track::Chime);

        let Some(url) = self.inner.sources.ambient(kind) else {
            backend.ramp_gain(GAIN_FLOOR, SILENCE_RAMP);
            self.schedule_pause(SILENCE_RAMP, PauseScope::Ambient);
            self.state().current_ambient = None;
            return;
        };

        if backend.source(Track::Ambient).as_deref() != Some(url) {
            if let Err(e) = backend.load(Track::Ambient, url) {
                warn!(error = %e, "ambient load failed");
                self.state().current_ambient = None;
                return;
            }
        }
        backend.rewind(Track::Ambient);
        backend.set_gain(GAIN_FLOOR);

        let played = self.safe_play(Track::Ambient).await;
        self.state().current_ambient = played.then_some(kind);
        backend.ramp_gain(GAIN_FULL, AMBIENT_RAMP_IN);
    }

    /// Ring the chime at full gain. The ambient bed keeps playing.
    pub async fn play_chime(&self) {
        self.cancel_pending_fade();
        self.ensure_output().await;
        let backend = &self.inner.backend;
        backend.cancel_gain_ramps();
        backend.set_gain(GAIN_FULL);

        backend.rewind(Track::Chime);
        self.safe_play(Track::Chime).await;
    }

    /// Fade everything to the floor over `duration`, then pause both tracks.
    ///
    /// Supersedes any fade already in progress.
    pub async fn fade_out_all(&self, duration: Duration) {
        self.cancel_pending_fade();
        let backend = &self.inner.backend;
        let current = backend.gain();
        backend.cancel_gain_ramps();
        backend.set_gain(if current > 0.0 { current } else { GAIN_FLOOR });
        backend.ramp_gain(GAIN_FLOOR, duration);
        self.schedule_pause(duration, PauseScope::All);
    }

    /// Cancel the pending fade, pause and release both tracks, close the
    /// output. Idempotent.
    pub async fn shutdown(&self) {
        self.cancel_pending_fade();
        if self.state().closed {
            return;
        }
        self.safe_pause(Track::Ambient).await;
        self.safe_pause(Track::Chime).await;
        let backend = &self.inner.backend;
        for track in Track::ALL {
            backend.release(track);
        }
        backend.close();
        let mut state = self.state();
        state.closed = true;
        state.unlocked = false;
        state.current_ambient = None;
        debug!("audio engine shut down");
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_pending_fade(&self) {
        if let Some(fade) = self.state().pending_fade.take() {
            fade.handle.abort();
        }
    }

    async fn ensure_output(&self) {
        if !self.state().unlocked {
            self.prepare().await;
        }
        if let Err(e) = self.inner.backend.resume() {
            debug!(error = %e, "output resume failed");
        }
    }

    /// Schedule the deferred pause that ends a fade.
    fn schedule_pause(&self, after: Duration, scope: PauseScope) {
        let weak: Weak<EngineInner<B>> = Arc::downgrade(&self.inner);
        let mut state = self.state();
        state.next_fade_id += 1;
        let id = state.next_fade_id;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let engine = AudioEngine { inner };
            engine.safe_pause(Track::Ambient).await;
            if scope == PauseScope::All {
                engine.safe_pause(Track::Chime).await;
                engine.inner.backend.rewind(Track::Chime);
            }
            let mut state = engine.state();
            if state.pending_fade.as_ref().is_some_and(|fade| fade.id == id) {
                state.pending_fade = None;
            }
            debug!(?scope, "fade completed");
        });
        state.pending_fade = Some(PendingFade { id, handle });
    }

    /// Play `track`, tracking the in-flight play. Returns whether playback
    /// started.
    async fn safe_play(&self, track: Track) -> bool {
        let previous = self.state().in_flight_mut(track).as_ref().map(|f| f.play.clone());
        if let Some(previous) = previous {
            let _ = previous.await;
        }

        let play = self.inner.backend.play(track).shared();
        let id = {
            let mut state = self.state();
            state.next_play_id += 1;
            let id = state.next_play_id;
            *state.in_flight_mut(track) = Some(InFlight {
                id,
                play: play.clone(),
            });
            id
        };

        let result = play.await;
        {
            let mut state = self.state();
            let slot = state.in_flight_mut(track);
            if slot.as_ref().is_some_and(|f| f.id == id) {
                *slot = None;
            }
        }

        match result {
            Ok(()) => true,
            Err(PlaybackError::Interrupted) => {
                debug!(%track, "play interrupted by pause");
                false
            }
            Err(e) => {
                warn!(%track, error = %e, "playback failed");
                if track == Track::Ambient {
                    self.state().current_ambient = None;
                }
                false
            }
        }
    }

    /// Pause `track` once any in-flight play has settled.
    async fn safe_pause(&self, track: Track) {
        let in_flight = self.state().in_flight_mut(track).as_ref().map(|f| f.play.clone());
        if let Some(play) = in_flight {
            let _ = play.await;
        }
        self.inner.backend.pause(track);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::VirtualBackend;

    fn engine() -> AudioEngine<VirtualBackend> {
        AudioEngine::new(VirtualBackend::new(), SoundSources::default())
    }

    #[tokio::test(start_paused = true)]
    async fn prepare_is_idempotent() {
        let engine = engine();
        engine.prepare().await;
        engine.prepare().await;

        assert!(engine.status().unlocked);
        let chime = engine.backend().track(Track::Chime);
        assert!(chime.attached);
        // primed exactly once
        assert_eq!(chime.plays, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_unlock_is_retried_by_play() {
        let engine = engine();
        engine.backend().set_reject_attach(true);
        engine.prepare().await;
        assert!(!engine.status().unlocked);

        engine.backend().set_reject_attach(false);
        engine.play_ambient(SoundKind::Forest).await;

        assert!(engine.status().unlocked);
        assert!(engine.backend().track(Track::Ambient).playing);
    }

    #[tokio::test(start_paused = true)]
    async fn suspended_output_does_not_block_playback() {
        let engine = engine();
        engine.backend().set_suspended(true);
        engine.prepare().await;
        assert!(engine.status().unlocked);

        engine.play_ambient(SoundKind::Forest).await;
        assert!(engine.backend().track(Track::Ambient).playing);
    }

    #[tokio::test(start_paused = true)]
    async fn ambient_fades_in_to_full() {
        let engine = engine();
        engine.prepare().await;
        engine.play_ambient(SoundKind::Stream).await;

        let status = engine.status();
        assert_eq!(status.current_ambient, Some(SoundKind::Stream));
        assert!(status.master_gain < 0.01);

        tokio::time::advance(AMBIENT_RAMP_IN).await;
        assert!((engine.status().master_gain - GAIN_FULL).abs() < 1e-4);
    }

    #[tokio::test(start_paused = true)]
    async fn same_source_is_not_reloaded() {
        let engine = engine();
        engine.prepare().await;
        engine.play_ambient(SoundKind::Forest).await;
        engine.play_ambient(SoundKind::Forest).await;

        let ambient = engine.backend().track(Track::Ambient);
        assert_eq!(ambient.source.as_deref(), Some(SoundSources::default().forest.as_str()));
        assert!(ambient.playing);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_option_pauses_ambient_after_ramp() {
        let engine = engine();
        engine.prepare().await;
        engine.play_ambient(SoundKind::Forest).await;
        engine.play_ambient(SoundKind::Silent).await;

        assert!(engine.backend().track(Track::Ambient).playing);
        tokio::time::sleep(SILENCE_RAMP + Duration::from_millis(10)).await;

        assert!(!engine.backend().track(Track::Ambient).playing);
        assert!(engine.status().master_gain <= GAIN_FLOOR + 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn chime_leaves_ambient_playing() {
        let engine = engine();
        engine.prepare().await;
        engine.play_ambient(SoundKind::Forest).await;
        engine.play_chime().await;

        assert!(engine.backend().track(Track::Ambient).playing);
        assert!(engine.backend().track(Track::Chime).playing);
        assert!((engine.status().master_gain - GAIN_FULL).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_silences_and_rewinds() {
        let engine = engine();
        engine.prepare().await;
        engine.play_ambient(SoundKind::Forest).await;
        engine.play_chime().await;
        engine.stop_all().await;

        for track in Track::ALL {
            let status = engine.backend().track(track);
            assert!(!status.playing, "{track} still playing");
            assert!(status.at_start, "{track} not rewound");
        }
        assert!(engine.status().master_gain <= GAIN_FLOOR + 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_all_waits_for_in_flight_play() {
        let backend = VirtualBackend::new().with_play_latency(Duration::from_millis(300));
        let engine = AudioEngine::new(backend, SoundSources::default());
        engine.prepare().await;

        let playing = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.play_chime().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.stop_all().await;
        playing.await.unwrap();

        let chime = engine.backend().track(Track::Chime);
        assert_eq!(chime.interrupted, 0);
        assert!(!chime.playing);
    }

    #[tokio::test(start_paused = true)]
    async fn fade_out_pauses_both_tracks_when_done() {
        let engine = engine();
        engine.prepare().await;
        engine.play_ambient(SoundKind::Forest).await;
        engine.play_chime().await;
        engine.fade_out_all(Duration::from_secs(2)).await;
        assert!(engine.status().fade_pending);

        tokio::time::sleep(Duration::from_millis(2010)).await;

        assert!(!engine.backend().track(Track::Ambient).playing);
        let chime = engine.backend().track(Track::Chime);
        assert!(!chime.playing && chime.at_start);
        assert!(!engine.status().fade_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn new_fade_supersedes_old_one() {
        let engine = engine();
        engine.prepare().await;
        engine.play_ambient(SoundKind::Forest).await;
        engine.fade_out_all(Duration::from_secs(2)).await;
        engine.fade_out_all(Duration::from_secs(10)).await;

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(engine.backend().track(Track::Ambient).playing);

        tokio::time::sleep(Duration::from_secs(8)).await;
        assert!(!engine.backend().track(Track::Ambient).playing);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ambient_clears_current_track() {
        let sources = SoundSources::default();
        let backend = VirtualBackend::new();
        backend.fail_source(sources.stream.clone());
        let engine = AudioEngine::new(backend, sources);
        engine.prepare().await;

        engine.play_ambient(SoundKind::Stream).await;
        assert_eq!(engine.status().current_ambient, None);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_and_closes() {
        let engine = engine();
        engine.prepare().await;
        engine.play_ambient(SoundKind::Forest).await;
        engine.fade_out_all(Duration::from_secs(10)).await;
        engine.shutdown().await;

        assert!(engine.backend().is_closed());
        assert!(!engine.status().fade_pending);
        let ambient = engine.backend().track(Track::Ambient);
        assert!(!ambient.attached && ambient.source.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_last_handle_closes_output() {
        let backend = VirtualBackend::new();
        let engine = AudioEngine::new(backend.clone(), SoundSources::default());
        engine.prepare().await;
        engine.play_ambient(SoundKind::Forest).await;
        drop(engine);

        assert!(backend.is_closed());
        assert!(!backend.track(Track::Ambient).playing);
    }
}
