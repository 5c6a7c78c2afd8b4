use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::ConfigLoader;
use crate::gateway::HttpGateway;
use crate::journaling::MessageLog;

pub mod commands;

use self::commands::{NewArgs, SearchArgs, ShowArgs};

#[derive(Parser, Debug)]
#[command(
    name = "notetree",
    version,
    about = "Terminal client for a hierarchical notes server"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over NOTETREE_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the server base URL from the config file
    #[arg(long)]
    pub server: Option<String>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Print the note tree as an indented outline
    Tree,
    /// Print one note with its contents
    Show(ShowArgs),
    /// Run a server-side search and print matching notes
    Search(SearchArgs),
    /// Create a new note from the command line
    New(NewArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("NOTETREE_CONFIG", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);

    // The TUI owns the terminal, so its logs go to a file.
    let log_file = matches!(command, Commands::Tui).then(|| paths.log_dir.join("notetree.log"));
    init_tracing(&cli.log_level, log_file.as_deref())
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let mut config = loader.load_or_init()?;
    if let Some(server) = &cli.server {
        config.override_server(server);
    }
    tracing::info!(server = %config.server.base_url, "using note server");
    let gateway = HttpGateway::new(&config.server.base_url, config.server.timeout())?;

    match command {
        Commands::Tui => {
            let max = config.messages.max_entries;
            let log = if config.messages.persist {
                MessageLog::load(paths.messages_file(), max)
            } else {
                MessageLog::in_memory(max)
            };
            let mut app = App::new(&config, Box::new(gateway), log);
            app.run()
        }
        Commands::Tree => commands::print_tree(&gateway),
        Commands::Show(args) => commands::show_note(&gateway, args),
        Commands::Search(args) => commands::search_notes(&gateway, args),
        Commands::New(args) => commands::new_note(&gateway, args),
    }
}

fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
            None => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}
