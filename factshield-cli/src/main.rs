//! FactShield CLI: terminal front end for the FactShield credibility client.
//!
//! Submits a URL or article text for analysis and renders the animated
//! credibility score with its grouped factors.

mod analyze;
mod commands;

use clap::Parser;
use factshield_core::{ConfigOverrides, InputKind};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// FactShield: check how credible an article is before you share it
#[derive(Parser, Debug)]
#[command(name = "factshield", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Analyze an article URL or a block of article text
    Analyze {
        /// The URL or text to analyze; `-` reads text from stdin
        input: String,

        /// How to interpret the input
        #[arg(short, long, value_enum, default_value_t = KindArg::Url)]
        kind: KindArg,

        /// Show the final score immediately instead of animating it
        #[arg(long)]
        no_animate: bool,

        /// Give up on the analysis after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default workspace configuration file
    Init,
    /// Show the effective configuration
    Show,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum KindArg {
    Url,
    Text,
}

impl From<KindArg> for InputKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Url => InputKind::Url,
            KindArg::Text => InputKind::Text,
        }
    }
}

fn cli_overrides(disable_animation: bool, timeout_ms: Option<u64>) -> ConfigOverrides {
    ConfigOverrides {
        animated: disable_animation.then_some(false),
        timeout_ms,
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "factshield", "factshield")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "factshield.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    match cli.command {
        Commands::Config { action } => commands::handle_config(action, &workspace),
        Commands::Analyze {
            input,
            kind,
            no_animate,
            timeout_ms,
            json,
        } => {
            // CLI flags form the top configuration layer
            let overrides = cli_overrides(no_animate || json, timeout_ms);
            let config = factshield_core::load_config(Some(&workspace), Some(&overrides))
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

            let input = if input == "-" {
                std::io::read_to_string(std::io::stdin())?
            } else {
                input
            };

            let options = analyze::RunOptions {
                kind: kind.into(),
                json,
                quiet: cli.quiet,
            };
            analyze::run(&input, &config, options).await
        }
    }
}
