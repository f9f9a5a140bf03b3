use clap::Args;
use zenring_core::session::{dial_minutes, DurationSelector};
use zenring_core::Config;

#[derive(Args)]
pub struct DragArgs {
    /// Successive pointer movements in px; positive drags up (longer)
    #[arg(required = true, allow_negative_numbers = true)]
    pub moves: Vec<f64>,
}

pub fn run(args: DragArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    let before = config.preferences.duration_secs;
    let secs = apply_drag(before, &args.moves);

    if secs != before {
        config.preferences.duration_secs = secs;
        config.save()?;
    }
    println!("{} min", dial_minutes(secs));
    Ok(())
}

/// Feed `moves` through one pointer hold starting at `start_secs`.
fn apply_drag(start_secs: u32, moves: &[f64]) -> u32 {
    let mut selector = DurationSelector::new();
    let mut secs = start_secs;
    let mut y = 0.0;
    selector.pointer_down(y);
    for dy in moves {
        y -= dy;
        if let Some(next) = selector.pointer_move(y, secs) {
            secs = next;
        }
    }
    // releasing is not a start request here
    selector.pointer_cancel();
    secs
}
