//! Audio command queue.
//!
//! The session runtime never awaits audio. It pushes [`AudioCommand`]s onto an
//! unbounded queue that a single worker task drains in order, so a slow or
//! failing audio operation can never stall a countdown, and commands issued at
//! one phase boundary (stop, unlock, play) run in exactly that order.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::backend::AudioBackend;
use super::engine::AudioEngine;
use super::sources::SoundKind;

/// One imperative audio request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AudioCommand {
    Prepare,
    StopAll,
    PlayAmbient { sound: SoundKind },
    PlayChime,
    FadeOutAll { duration_ms: u64 },
}

/// Sending half of the audio queue. Cloneable; the worker exits and shuts the
/// engine down once every clone is dropped.
#[derive(Debug, Clone)]
pub struct AudioQueue {
    tx: mpsc::UnboundedSender<AudioCommand>,
}

impl AudioQueue {
    /// Spawn the worker draining commands into `engine`.
    pub fn spawn<B: AudioBackend>(engine: AudioEngine<B>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<AudioCommand>();
        let worker = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                engine.execute(command).await;
            }
            engine.shutdown().await;
            debug!("audio queue closed");
        });
        (Self { tx }, worker)
    }

    /// A queue whose commands go nowhere but can be inspected. Used where the
    /// caller wants to observe what would have been played.
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<AudioCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a command. Never blocks; a closed queue only logs.
    pub fn send(&self, command: AudioCommand) {
        if self.tx.send(command).is_err() {
            debug!(?command, "audio queue closed, command dropped");
        }
    }
}
