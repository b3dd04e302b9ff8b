//! Card Toolkit Config CLI
//!
//! Shows, writes and checks the layered configuration.

use behavior_cards::CardConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "abc-config")]
#[command(about = "Inspect Agent Behavior Card toolkit configuration")]
struct Cli {
    /// Explicit config file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Show,

    /// Write the default configuration to a file
    Init {
        /// Output file (defaults to the per-user config path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check the effective configuration for unusable values
    Validate,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Show => {
            let config = CardConfig::load_from(cli.config.as_deref())?;
            print!("{}", toml::to_string_pretty(&config)?);
        }

        Commands::Init { output, force } => {
            let path = output
                .or_else(CardConfig::user_config_path)
                .ok_or("no config directory available; pass --output")?;
            if path.exists() && !force {
                return Err(format!("{} already exists (use --force)", path.display()).into());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            CardConfig::default().save(&path)?;
            println!("✅ Wrote default configuration to {}", path.display());
        }

        Commands::Validate => {
            let config = CardConfig::load_from(cli.config.as_deref())?;
            let problems = config.problems();
            if problems.is_empty() {
                println!("✅ Configuration is valid");
            } else {
                for problem in &problems {
                    println!("❌ {}", problem);
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
