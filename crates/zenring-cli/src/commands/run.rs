use clap::Args;
use tracing::info;
use zenring_core::events::timestamp;
use zenring_core::session::SessionCommand;
use zenring_core::{
    spawn_session, AudioEngine, AudioQueue, Config, Event, SessionOptions, SessionPhase,
    SoundKind, TomlPreferenceStore, VirtualBackend,
};

#[derive(Args)]
pub struct RunArgs {
    /// Session length in minutes (5-120); stored as the new default
    #[arg(long)]
    pub minutes: Option<u32>,
    /// Ambient sound: forest, stream or none; stored as the new default
    #[arg(long)]
    pub sound: Option<SoundKind>,
    /// Run the session clock this many times faster than real time
    #[arg(long, default_value_t = 1.0)]
    pub speed: f64,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_session(args))
}

async fn run_session(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = TomlPreferenceStore::open_default()?;

    let engine = AudioEngine::new(VirtualBackend::new(), config.sounds.clone());
    let (audio, audio_worker) = AudioQueue::spawn(engine);
    let options = SessionOptions {
        speed: args.speed,
        ..SessionOptions::default()
    };
    let (handle, session) = spawn_session(store, config.timing.clone(), audio, options);

    if let Some(minutes) = args.minutes {
        handle.send(SessionCommand::SetDuration(minutes.saturating_mul(60)));
    }
    if let Some(sound) = args.sound {
        handle.set_sound_kind(sound);
    }
    handle.request_start(false);

    let mut snapshots = handle.watch();
    let mut started = false;
    let mut interrupted = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let phase = snapshot.phase;
                let event = Event::StateSnapshot {
                    snapshot,
                    at: timestamp(handle.clock().now_ms()),
                };
                println!("{}", serde_json::to_string(&event)?);
                if phase.is_active() {
                    started = true;
                } else if started {
                    break;
                }
            }
            signal = &mut ctrl_c, if !interrupted => {
                signal?;
                info!("interrupted, cancelling session");
                interrupted = true;
                handle.request_cancel();
            }
        }
    }

    if handle.snapshot().phase == SessionPhase::Idle && !interrupted {
        info!("session complete");
    }
    drop(snapshots);
    drop(handle);
    session.await?;
    audio_worker.await?;
    Ok(())
}
