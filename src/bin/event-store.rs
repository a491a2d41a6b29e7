//! Event Store CLI
//!
//! Operator tool for importing, inspecting and deleting event instances in a
//! persistent store.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use console::{style, Term};

use event_instances::prelude::*;

/// Event Store CLI - inspect and maintain stored contract events
#[derive(Parser)]
#[command(name = "event-store")]
#[command(version = event_instances::VERSION)]
#[command(about = "Command-line interface for the event instance store", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Store configuration file (falls back to EVENT_STORE_* variables)
    #[arg(short, long, env = "EVENT_STORE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a JSON array of events for one token contract
    Import {
        /// File holding the events
        file: PathBuf,

        /// Token contract to notify for the batch
        #[arg(short, long)]
        token: String,
    },

    /// Show the matching event with the highest block number
    Last(EventArgs),

    /// Show one event in a filter slot
    Get {
        #[command(flatten)]
        event: EventArgs,

        /// Filter attribute name (e.g. tokenId)
        #[arg(long)]
        filter_name: String,

        /// Filter attribute value
        #[arg(long)]
        filter_value: String,
    },

    /// Delete every event of a token contract
    Delete {
        /// Token contract
        #[arg(short, long)]
        token: String,
    },

    /// Count stored events
    Count,
}

#[derive(Args)]
struct EventArgs {
    /// Emitting contract
    #[arg(long)]
    contract: String,

    /// Token contract
    #[arg(short, long)]
    token: String,

    /// Chain id
    #[arg(long, default_value_t = 1)]
    chain: u64,

    /// Event name (e.g. Transfer)
    #[arg(short, long)]
    event: String,
}

impl EventArgs {
    fn parse_addresses(&self) -> anyhow::Result<(Address, Address)> {
        let contract = Address::parse(&self.contract).context("Invalid --contract")?;
        let token = Address::parse(&self.token).context("Invalid --token")?;
        Ok((contract, token))
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let store = EventStore::open(&config)
        .with_context(|| format!("Failed to open {} store", config.backend))?;

    match &cli.command {
        Commands::Import { file, token } => cmd_import(&store, file, token, term),
        Commands::Last(args) => cmd_last(&store, args, term),
        Commands::Get {
            event,
            filter_name,
            filter_value,
        } => cmd_get(&store, event, filter_name, filter_value, term),
        Commands::Delete { token } => cmd_delete(&store, token, term),
        Commands::Count => cmd_count(&store, term),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StoreConfig> {
    let config = match path {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => StoreConfig::from_env().context("Invalid EVENT_STORE_* environment")?,
    };

    if !config.backend.is_persistent() {
        tracing::warn!("Using an in-memory store; nothing will be kept after exit");
    }

    Ok(config)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_import(store: &EventStore, file: &Path, token: &str, term: &Term) -> anyhow::Result<()> {
    let token = Address::parse(token).context("Invalid --token")?;

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let events: Vec<EventInstanceValue> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse events in {}", file.display()))?;

    let _ = term.write_line(&format!(
        "{} Importing {} events for {}...",
        style("→").cyan(),
        events.len(),
        style(token).yellow()
    ));

    let written = store.add(events, token)?;

    let _ = term.write_line(&format!(
        "{} Stored {} events",
        style("✓").green(),
        written
    ));
    Ok(())
}

fn cmd_last(store: &EventStore, args: &EventArgs, term: &Term) -> anyhow::Result<()> {
    let (contract, token) = args.parse_addresses()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("Failed to start runtime")?;
    let last = runtime.block_on(store.get_last_matching_event(
        contract,
        token,
        ChainId::new(args.chain),
        &args.event,
    ))?;

    match last {
        Some(value) => print_value(&value, term),
        None => {
            let _ = term.write_line(&format!("{} No matching events", style("ℹ").blue()));
            Ok(())
        }
    }
}

fn cmd_get(
    store: &EventStore,
    args: &EventArgs,
    filter_name: &str,
    filter_value: &str,
    term: &Term,
) -> anyhow::Result<()> {
    let (contract, token) = args.parse_addresses()?;

    let found = store.get_matching_event(
        contract,
        token,
        ChainId::new(args.chain),
        &args.event,
        filter_name,
        filter_value,
    )?;

    match found {
        Some(instance) => print_value(&instance.to_value()?, term),
        None => {
            let _ = term.write_line(&format!(
                "{} No event with {}={}",
                style("ℹ").blue(),
                filter_name,
                filter_value
            ));
            Ok(())
        }
    }
}

fn cmd_delete(store: &EventStore, token: &str, term: &Term) -> anyhow::Result<()> {
    let token = Address::parse(token).context("Invalid --token")?;
    let deleted = store.delete_events(token)?;

    let _ = term.write_line(&format!(
        "{} Deleted {} events for {}",
        style("✓").green(),
        deleted,
        style(token).yellow()
    ));
    Ok(())
}

fn cmd_count(store: &EventStore, term: &Term) -> anyhow::Result<()> {
    let count = store.count()?;
    let _ = term.write_line(&format!(
        "{} {} events stored",
        style("ℹ").blue(),
        style(count).green()
    ));
    Ok(())
}

fn print_value(value: &EventInstanceValue, term: &Term) -> anyhow::Result<()> {
    let _ = term.write_line(&format!(
        "{} {} at block {}",
        style("→").cyan(),
        style(value.event_name()).bold(),
        style(value.block_number()).yellow()
    ));
    let _ = term.write_line(&serde_json::to_string_pretty(value)?);
    Ok(())
}
