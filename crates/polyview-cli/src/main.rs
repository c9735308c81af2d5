use anyhow::Result;
use clap::{Parser, Subcommand};
use polyview_core::layout::Topology;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "polyview")]
#[command(about = "Polyview CLI - inspect and maintain persisted sessions and layouts")]
#[command(long_about = None)]
struct Cli {
    /// Root directory replacing the platform config and data directories
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and repair stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Manage stored chat history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Inspect stored layout records
    Layout {
        #[command(subcommand)]
        action: LayoutAction,
    },
    /// Show or initialize the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List sessions with their services and history sizes
    List {
        /// Print the raw stored JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Load, repair and write back the session state
    Repair,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Truncate every chat history to its most recent entries
    Trim {
        /// Entries kept per history (defaults to the configured retention floor)
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[derive(Subcommand)]
enum LayoutAction {
    /// Print the active topology and every stored record
    Show,
    /// Forget the stored record of a topology
    Reset {
        /// horizontal, vertical or grid
        topology: Topology,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration and store file locations
    Path,
    /// Write a configuration file with the defaults if none exists
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    let _logging = polyview_application::logging::init_logging(None, level);

    let ctx = commands::Context::new(cli.base_dir)?;
    match cli.command {
        Commands::Sessions { action } => match action {
            SessionsAction::List { json } => commands::sessions::list(&ctx, json)?,
            SessionsAction::Repair => commands::sessions::repair(&ctx)?,
        },
        Commands::History { action } => match action {
            HistoryAction::Trim { keep } => commands::sessions::trim_history(&ctx, keep)?,
        },
        Commands::Layout { action } => match action {
            LayoutAction::Show => commands::layout::show(&ctx)?,
            LayoutAction::Reset { topology } => commands::layout::reset(&ctx, topology)?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&ctx)?,
            ConfigAction::Path => commands::config::path(&ctx)?,
            ConfigAction::Init => commands::config::init(&ctx)?,
        },
    }

    Ok(())
}
