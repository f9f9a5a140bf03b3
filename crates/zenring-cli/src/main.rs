use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "zenring", version, about = "ZenRing meditation timer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a headless session, printing a JSON state snapshot on every change
    Run(commands::run::RunArgs),
    /// Apply a vertical drag to the stored duration
    Drag(commands::drag::DragArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// List ambient sounds and their sources
    Sounds,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zenring=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Drag(args) => commands::drag::run(args),
        Commands::Config { action } => commands::config::run(action),
        Commands::Sounds => commands::sounds::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
