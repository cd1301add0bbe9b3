//! crawl-agent main entry point
//!
//! This is the command-line interface for the crawl-agent dataset harvester.

use anyhow::Context;
use clap::{Parser, Subcommand};
use crawl_agent::commands::{run_ask, run_manage};
use crawl_agent::config::{load_config_with_hash, resolve_api_key, Config};
use crawl_agent::crawler::crawl;
use crawl_agent::gateway::{DecisionGateway, OpenAiChatClient};
use crawl_agent::output::{print_answer, print_crawl_summary, print_manage_outcome};
use crawl_agent::storage::JsonIndexStore;
use crawl_agent::CancelFlag;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "crawl-agent.toml";

/// crawl-agent: a natural-language dataset harvester
///
/// Describe what to collect in plain language; a language model turns the
/// instruction into crawl parameters and judges each page, while downloads
/// and the local dataset index are handled here.
#[derive(Parser, Debug)]
#[command(name = "crawl-agent")]
#[command(version)]
#[command(about = "A natural-language dataset harvester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site for datasets, e.g. "get the graph datasets from https://..."
    Crawl {
        /// Free-text crawl instruction
        prompt: String,
    },

    /// Ask a question about downloaded datasets
    Ask {
        /// Free-text question
        prompt: String,
    },

    /// List, move, copy or delete downloaded datasets
    Manage {
        /// Free-text management instruction
        prompt: String,

        /// Skip the confirmation before changing files
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_agent=info,warn"),
            1 => EnvFilter::new("crawl_agent=debug,info"),
            2 => EnvFilter::new("crawl_agent=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration from `--config`, the default file, or defaults
fn load_configuration(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                tracing::debug!("No config file found, using defaults");
                return Ok(Config::default());
            }
            default
        }
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_configuration(cli.config.as_deref())?;

    let api_key = resolve_api_key(&config.llm)?;
    let chat = OpenAiChatClient::new(&config.llm, api_key)?;

    match cli.command {
        Command::Crawl { prompt } => handle_crawl(&config, chat, &prompt).await,
        Command::Ask { prompt } => {
            // free-text answer, not a JSON object
            let chat = chat.with_json_mode(false);
            let index = JsonIndexStore::new(config.storage.index_path.clone());
            let answer = run_ask(&chat, &index, &prompt).await?;
            print_answer(&answer);
            Ok(ExitCode::SUCCESS)
        }
        Command::Manage { prompt, yes } => {
            let gateway = DecisionGateway::new(Box::new(chat));
            let mut index = JsonIndexStore::new(config.storage.index_path.clone());
            let mut confirm = |question: &str| yes || ask_confirmation(question);

            let outcome = run_manage(
                &gateway,
                &mut index,
                &config.storage.datasets_dir,
                &prompt,
                &mut confirm,
            )
            .await?;
            print_manage_outcome(&outcome);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Handles the crawl command, finalizing on Ctrl-C
async fn handle_crawl(
    config: &Config,
    chat: OpenAiChatClient,
    prompt: &str,
) -> anyhow::Result<ExitCode> {
    let cancel = CancelFlag::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current page and saving progress");
            on_signal.cancel();
        }
    });

    let summary = crawl(config, Box::new(chat), prompt, cancel).await?;
    print_crawl_summary(&summary);

    if summary.interrupted {
        Ok(ExitCode::from(130))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Asks a yes/no question on stdin; anything but y/yes declines
fn ask_confirmation(question: &str) -> bool {
    print!("{} [y/N] ", question);
    if std::io::stdout().flush().is_err() {
        return false;
    }

    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}
