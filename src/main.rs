//! DOIO KB16 HID tools CLI
//!
//! Captures raw reports from the keypad, infers its key matrix and
//! generates firmware lookup tables.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

use kb16_tools::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load config
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    debug!("Loading config from {:?}", config_path);
    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::List { all } => commands::utility::list(&config, all),

        Commands::Capture {
            device,
            duration,
            output,
            quiet,
        } => commands::capture::run(&config, &device, duration, &output, quiet).await,

        Commands::Analyze {
            file,
            grid,
            min_transitions,
            top,
            format,
            output,
        } => commands::analyze::run(
            &config,
            &file,
            grid,
            min_transitions,
            top,
            format,
            output.as_deref(),
        ),

        Commands::Generate {
            file,
            output,
            grid,
            min_transitions,
            array_name,
            decode,
            handler,
        } => commands::generate::run(
            &config,
            &file,
            output.as_deref(),
            grid,
            min_transitions,
            array_name,
            decode,
            handler,
        ),

        Commands::Monitor {
            device,
            layout,
            panel,
            format,
            duration,
        } => {
            commands::monitor::run(
                &config,
                &device,
                layout.as_deref(),
                panel.as_deref(),
                format,
                duration,
            )
            .await
        }

        Commands::Diff { base, pressed } => commands::diff::run(&base, &pressed),

        Commands::Adjust {
            mapping,
            position,
            byte,
            bit,
            label,
            remove,
            grid,
            output,
        } => {
            let edit = if remove {
                commands::adjust::Edit::Remove
            } else {
                commands::adjust::Edit::Set { byte, bit, label }
            };
            commands::adjust::run(&config, &mapping, position, edit, grid, output.as_deref())
        }
    }
}
