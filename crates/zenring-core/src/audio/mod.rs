mod backend;
mod engine;
mod envelope;
mod queue;
mod sources;
mod virtual_backend;

pub use backend::{AudioBackend, PlayFuture, Track};
pub use engine::{AudioEngine, EngineStatus, AMBIENT_RAMP_IN, SILENCE_RAMP};
pub use envelope::{GainEnvelope, GAIN_FLOOR, GAIN_FULL};
pub use queue::{AudioCommand, AudioQueue};
pub use sources::{SoundKind, SoundSources};
pub use virtual_backend::{TrackStatus, VirtualBackend};
