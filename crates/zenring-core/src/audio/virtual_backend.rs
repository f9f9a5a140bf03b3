//! In-process audio output.
//!
//! Tracks play state, sources and the master gain envelope without touching a
//! sound device. The CLI drives sessions against it and the tests use it to
//! observe exactly what the engine asked the output to do. Failure knobs
//! (attach rejection, failing sources, play latency) reproduce the platform
//! behaviours the engine has to survive.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use super::backend::{AudioBackend, PlayFuture, Track};
use super::envelope::{GainEnvelope, GAIN_FLOOR};
use crate::error::{AudioError, PlaybackError};

/// Observable state of one simulated track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackStatus {
    pub attached: bool,
    pub source: Option<String>,
    pub playing: bool,
    /// Position is at 0 (fresh load or rewind, not yet played since).
    pub at_start: bool,
    pub plays: u32,
    pub pauses: u32,
    /// Plays that a pause overtook before they resolved.
    pub interrupted: u32,
}

#[derive(Debug, Default)]
struct TrackSlot {
    status: TrackStatus,
    pending_play: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    ambient: TrackSlot,
    chime: TrackSlot,
    envelope: GainEnvelope,
    closed: bool,
    next_play: u64,
    reject_attach: bool,
    suspended: bool,
    failing_sources: HashSet<String>,
    play_latency: Duration,
}

impl Inner {
    fn slot(&self, track: Track) -> &TrackSlot {
        match track {
            Track::Ambient => &self.ambient,
            Track::Chime => &self.chime,
        }
    }

    fn slot_mut(&mut self, track: Track) -> &mut TrackSlot {
        match track {
            Track::Ambient => &mut self.ambient,
            Track::Chime => &mut self.chime,
        }
    }
}

/// Simulated output device. Cloning shares the same device.
#[derive(Debug, Clone)]
pub struct VirtualBackend {
    inner: Arc<Mutex<Inner>>,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                ambient: TrackSlot::default(),
                chime: TrackSlot::default(),
                envelope: GainEnvelope::new(GAIN_FLOOR),
                closed: false,
                next_play: 0,
                reject_attach: false,
                suspended: false,
                failing_sources: HashSet::new(),
                play_latency: Duration::ZERO,
            })),
        }
    }

    /// Delay between `play()` and playback actually starting.
    pub fn with_play_latency(self, latency: Duration) -> Self {
        lock(&self.inner).play_latency = latency;
        self
    }

    /// Refuse `attach` until cleared, like an autoplay policy without a gesture.
    pub fn set_reject_attach(&self, reject: bool) {
        lock(&self.inner).reject_attach = reject;
    }

    /// Make `resume` fail until cleared, like a device the OS has taken away.
    pub fn set_suspended(&self, suspended: bool) {
        lock(&self.inner).suspended = suspended;
    }

    /// Every play of `url` fails.
    pub fn fail_source(&self, url: impl Into<String>) {
        lock(&self.inner).failing_sources.insert(url.into());
    }

    pub fn track(&self, track: Track) -> TrackStatus {
        lock(&self.inner).slot(track).status.clone()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    /// Whether a gain ramp is still in progress.
    pub fn is_ramping(&self) -> bool {
        lock(&self.inner).envelope.is_ramping(Instant::now())
    }
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for VirtualBackend {
    fn resume(&self) -> Result<(), AudioError> {
        let inner = lock(&self.inner);
        if inner.closed {
            return Err(AudioError::Closed);
        }
        if inner.suspended {
            return Err(AudioError::OutputUnavailable("output suspended".into()));
        }
        Ok(())
    }

    fn attach(&self, track: Track) -> Result<(), AudioError> {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return Err(AudioError::Closed);
        }
        if inner.reject_attach {
            return Err(AudioError::AttachRejected { track });
        }
        inner.slot_mut(track).status.attached = true;
        debug!(%track, "attached to output");
        Ok(())
    }

    fn source(&self, track: Track) -> Option<String> {
        lock(&self.inner).slot(track).status.source.clone()
    }

    fn load(&self, track: Track, url: &str) -> Result<(), AudioError> {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return Err(AudioError::Closed);
        }
        let slot = inner.slot_mut(track);
        slot.status.source = Some(url.to_string());
        slot.status.playing = false;
        slot.status.at_start = true;
        debug!(%track, url, "loaded source");
        Ok(())
    }

    fn play(&self, track: Track) -> PlayFuture {
        let (token, latency, failure) = {
            let mut inner = lock(&self.inner);
            if inner.closed {
                return Box::pin(future::ready(Err(PlaybackError::Failed(
                    "output closed".into(),
                ))));
            }
            inner.next_play += 1;
            let token = inner.next_play;
            let latency = inner.play_latency;
            let failing = inner.failing_sources.clone();
            let slot = inner.slot_mut(track);
            slot.status.plays += 1;
            slot.pending_play = Some(token);
            let failure = if !slot.status.attached {
                Some("play() not allowed before the output is unlocked".to_string())
            } else {
                match slot.status.source.as_deref() {
                    None => Some("no source loaded".to_string()),
                    Some(src) if failing.contains(src) => Some(format!("cannot decode {src}")),
                    Some(_) => None,
                }
            };
            (token, latency, failure)
        };

        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let mut guard = lock(&inner);
            let slot = guard.slot_mut(track);
            if slot.pending_play != Some(token) {
                return Err(PlaybackError::Interrupted);
            }
            slot.pending_play = None;
            if let Some(message) = failure {
                slot.status.playing = false;
                return Err(PlaybackError::Failed(message));
            }
            slot.status.playing = true;
            slot.status.at_start = false;
            debug!(%track, "playing");
            Ok(())
        })
    }

    fn pause(&self, track: Track) {
        let mut inner = lock(&self.inner);
        let slot = inner.slot_mut(track);
        if slot.pending_play.take().is_some() {
            slot.status.interrupted += 1;
        }
        slot.status.playing = false;
        slot.status.pauses += 1;
        debug!(%track, "paused");
    }

    fn rewind(&self, track: Track) {
        lock(&self.inner).slot_mut(track).status.at_start = true;
    }

    fn release(&self, track: Track) {
        let mut inner = lock(&self.inner);
        let slot = inner.slot_mut(track);
        slot.pending_play = None;
        slot.status.playing = false;
        slot.status.source = None;
        slot.status.attached = false;
        debug!(%track, "released");
    }

    fn gain(&self) -> f32 {
        lock(&self.inner).envelope.value_at(Instant::now())
    }

    fn cancel_gain_ramps(&self) {
        lock(&self.inner).envelope.cancel_scheduled(Instant::now());
    }

    fn set_gain(&self, value: f32) {
        lock(&self.inner).envelope.set_value(value);
    }

    fn ramp_gain(&self, target: f32, over: Duration) {
        let mut inner = lock(&self.inner);
        inner
            .envelope
            .exponential_ramp(target, Instant::now(), over);
        debug!(gain = target, over_ms = over.as_millis() as u64, "gain ramp");
    }

    fn close(&self) {
        let mut inner = lock(&self.inner);
        if !inner.closed {
            inner.closed = true;
            debug!("output closed");
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
