use zenring_core::{Config, SoundKind};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let selected = config.preferences.sound;

    for kind in SoundKind::ALL {
        let marker = if kind == selected { "*" } else { " " };
        let source = config.sounds.ambient(kind).unwrap_or("(silence)");
        println!("{marker} {:<8} {source}", kind.as_str());
    }
    println!("  {:<8} {}", "chime", config.sounds.chime());
    Ok(())
}
