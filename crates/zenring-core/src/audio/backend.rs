use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{AudioError, PlaybackError};

/// The two playback tracks the engine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    /// Looping ambient bed.
    Ambient,
    /// One-shot phase chime.
    Chime,
}

impl Track {
    pub const ALL: [Track; 2] = [Track::Ambient, Track::Chime];
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Ambient => f.write_str("ambient"),
            Track::Chime => f.write_str("chime"),
        }
    }
}

/// Resolution of one `play()` call.
pub type PlayFuture = BoxFuture<'static, Result<(), PlaybackError>>;

/// Platform audio output: two media tracks routed through one master gain.
///
/// Implementations own the actual sound device (or a simulation of it). The
/// engine only ever calls these primitives; sequencing, fade bookkeeping and
/// race-safety live in [`AudioEngine`](super::AudioEngine).
pub trait AudioBackend: Send + Sync + 'static {
    /// Resume a suspended output context.
    fn resume(&self) -> Result<(), AudioError>;

    /// Route a track into the output graph. Must be idempotent.
    fn attach(&self, track: Track) -> Result<(), AudioError>;

    /// Currently loaded source of a track.
    fn source(&self, track: Track) -> Option<String>;

    /// Replace the source of a track. Resets its position.
    fn load(&self, track: Track, url: &str) -> Result<(), AudioError>;

    /// Start playback. The returned future resolves once playback has
    /// actually begun, or fails with [`PlaybackError::Interrupted`] when a
    /// `pause` lands first.
    ///
    /// The play request is registered when this is called, not when the
    /// future is first polled.
    fn play(&self, track: Track) -> PlayFuture;

    fn pause(&self, track: Track);

    /// Seek back to position 0.
    fn rewind(&self, track: Track);

    /// Drop the track's source and detach it.
    fn release(&self, track: Track);

    /// Current master gain.
    fn gain(&self) -> f32;

    /// Cancel scheduled gain automation, holding the current value.
    fn cancel_gain_ramps(&self);

    fn set_gain(&self, value: f32);

    /// Exponential ramp of the master gain to `target` over `over`.
    fn ramp_gain(&self, target: f32, over: Duration);

    /// Close the output. Further calls are no-ops.
    fn close(&self);
}
