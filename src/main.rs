use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crm_kanban::kanban_config::{self, KanbanConfig};
use crm_kanban::telemetry;

mod cmd;

#[derive(Parser)]
#[command(name = "crm-kanban")]
#[command(version, about = "Drag-and-drop stage boards for CRM leads, deals and tasks")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// CRM backend base URL. Overrides CRM_BACKEND_URL and kanban.toml.
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve live boards over HTTP and WebSocket for a UI
    Serve {
        /// Port to serve on (defaults to [server] port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable dev mode (permissive CORS, bind on all interfaces)
        #[arg(long)]
        dev: bool,
    },
    /// Print a board: leads, deals or tasks
    Show { kind: String },
    /// Move a record to another stage, as a drag on the board would
    Move {
        /// Board kind: leads, deals or tasks
        kind: String,
        record_id: i64,
        /// Target stage, e.g. "Qualified" or "completed"
        stage: String,
        /// Position in the target column (defaults to the end)
        #[arg(long)]
        position: Option<usize>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default kanban.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    kanban_config::load_dotenv(&project_dir);
    let config = KanbanConfig::with_cli_args(project_dir, cli.backend_url.clone(), cli.verbose)?;
    telemetry::init_tracing(config.toml.logging.format, config.verbose);

    match &cli.command {
        Commands::Serve { port, dev } => cmd::cmd_serve(&config, *port, *dev).await?,
        Commands::Show { kind } => cmd::cmd_show(&config, kind).await?,
        Commands::Move {
            kind,
            record_id,
            stage,
            position,
        } => cmd::cmd_move(&config, kind, *record_id, stage, *position).await?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
