//! lexpilot - browser automation for a legal case-management portal
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lexpilot::cli::commands;
use lexpilot::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// lexpilot - portal automation and jurisprudence search
#[derive(Parser, Debug)]
#[command(name = "lexpilot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    /// Run visible contexts in headed mode
    #[arg(long, global = true)]
    headed: bool,

    /// Disable content-script injection
    #[arg(long, global = true)]
    no_inject: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search official sources and print enriched results
    Search {
        /// Search terms
        query: Vec<String>,
    },
    /// Execute a plan stored as JSON
    Run {
        /// Path to the plan file
        plan: PathBuf,
        /// Skip the approval prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Ask the planner for a plan against the current page and execute it
    Ask {
        /// Natural-language command
        command: Vec<String>,
        /// Page to open first (defaults to the configured portal)
        #[arg(long, short = 'u')]
        url: Option<String>,
        /// Skip the approval prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Print the default configuration file
    Config,
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if args.debug {
        config.logging.level = "debug".to_string();
    }

    if args.headed {
        config.browser.headed = true;
    }

    if args.no_inject {
        config.injector.enabled = false;
    }

    init_logging(&config.logging.level);

    match args.command {
        Command::Search { query } => commands::search(&config, &query.join(" ")).await?,
        Command::Run { plan, yes } => commands::run_plan(&config, &plan, yes).await?,
        Command::Ask { command, url, yes } => {
            commands::ask(&config, &command.join(" "), url.as_deref(), yes).await?
        }
        Command::Config => println!("{}", Config::default_config_toml()),
    }

    Ok(())
}
