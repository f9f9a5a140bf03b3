//! # ZenRing Core Library
//!
//! Core logic for the ZenRing meditation timer. The CLI is a thin binary over
//! this crate; any renderer can drive a session through the same API.
//!
//! ## Architecture
//!
//! - **Session**: a pure state machine ([`SessionState`]) that turns inputs into
//!   effects and events, run by a tokio actor ([`spawn_session`]) that owns the
//!   clock and auto-hide timers
//! - **Audio**: an [`AudioEngine`] over a pluggable [`AudioBackend`], fed
//!   through a single-worker [`AudioQueue`] so fades and stops never race
//! - **Storage**: TOML configuration and the [`PreferenceStore`] trait
//!
//! ## Key Components
//!
//! - [`SessionState`]: phase transitions and countdown
//! - [`DurationSelector`]: drag gesture on the duration dial
//! - [`AudioEngine`]: ambient bed, chime and gain fades
//! - [`Config`]: application configuration management

pub mod audio;
pub mod error;
pub mod events;
pub mod session;
pub mod storage;

pub use audio::{AudioBackend, AudioCommand, AudioEngine, AudioQueue, SoundKind, SoundSources, VirtualBackend};
pub use error::{AudioError, ConfigError, CoreError, PlaybackError};
pub use events::Event;
pub use session::{
    spawn_session, DurationSelector, SessionCommand, SessionHandle, SessionOptions, SessionPhase,
    SessionSnapshot, SessionState, Timing,
};
pub use storage::{Config, Language, MemoryStore, PreferenceStore, Preferences, TomlPreferenceStore};
