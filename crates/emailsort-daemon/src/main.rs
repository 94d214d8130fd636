//! EmailSort client daemon - session lifecycle and background email collection.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use emailsort_core::{init_logging, Config, Paths};

/// EmailSort client command-line interface.
#[derive(Parser)]
#[command(name = "emailsort-daemon")]
#[command(about = "EmailSort client for session management and background email collection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Base directory for runtime files (config, logs). Defaults to ~/.emailsort
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and run the client in the foreground
    Start,
    /// Print the OAuth authorize URL and exit
    AuthUrl,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level);

    // Load configuration
    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    match cli.command {
        Some(Commands::Start) | None => {
            app::run_client(config).await?;
        }
        Some(Commands::AuthUrl) => {
            app::print_auth_url(&config)?;
        }
    }

    Ok(())
}
