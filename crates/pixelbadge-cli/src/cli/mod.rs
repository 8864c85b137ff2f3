//! CLI entry and dispatch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pixelbadge_core::config::paths;
use pixelbadge_core::connectivity::AlwaysOnline;
use pixelbadge_core::gallery::SortMode;
use pixelbadge_core::{Config, Session};

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "pixelbadge")]
#[command(version = "0.1")]
#[command(about = "Browse and play animations from the pixelbadge gallery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding config, credentials and favorites
    #[arg(long, global = true, env = paths::HOME_ENV, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write logs to <home>/logs/pixelbadge.log
    #[arg(long, global = true)]
    log_file: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List one gallery page
    Browse {
        /// Sort mode (popular, favorites, random, new)
        #[arg(short, long, default_value = "popular")]
        sort: SortMode,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },

    /// Download the frames of one sequence
    Play {
        /// Sort mode of the page holding the sequence
        #[arg(short, long, default_value = "popular")]
        sort: SortMode,

        /// Page holding the sequence
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Position of the sequence on the page (as listed by browse)
        #[arg(short, long)]
        index: usize,

        /// Write every downloaded frame into this directory
        #[arg(long, value_name = "DIR")]
        export: Option<PathBuf>,
    },

    /// Pair this device with a gallery account
    Login,

    /// Forget the stored credential
    Logout,

    /// Mark or unmark a sequence as favorite
    Favorite {
        /// Sequence ID
        id: String,

        /// Remove the favorite instead of adding it
        #[arg(long)]
        remove: bool,
    },

    /// Show login state and local files
    Status,

    /// Show the project website
    Website {
        /// Print the URL without launching a browser
        #[arg(long)]
        no_open: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Create a default config file
    Init,
    /// Point the client at another gallery server
    SetBaseUrl {
        /// Server URL, e.g. https://badge.example.org
        url: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let home = cli.home.clone().unwrap_or_else(paths::home);

    let _log_guard = logging::init(cli.verbose, cli.log_file.then(|| home.join(paths::LOGS_DIR)))?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli.command, home).await })
}

async fn dispatch(command: Commands, home: PathBuf) -> Result<()> {
    match command {
        Commands::Config { command } => {
            let config_path = home.join(paths::CONFIG_FILE);
            match command {
                ConfigCommands::Path => {
                    commands::config::path(&config_path);
                    Ok(())
                }
                ConfigCommands::Init => commands::config::init(&config_path),
                ConfigCommands::SetBaseUrl { url } => {
                    commands::config::set_base_url(&config_path, &url)
                }
            }
        }
        Commands::Browse { sort, page } => {
            commands::browse::run(open_session(&home)?, sort, page).await
        }
        Commands::Play {
            sort,
            page,
            index,
            export,
        } => {
            let session = open_session(&home)?;
            commands::play::run(session, sort, page, index, export.as_deref()).await
        }
        Commands::Login => commands::login::login(open_session(&home)?).await,
        Commands::Logout => commands::login::logout(open_session(&home)?).await,
        Commands::Favorite { id, remove } => {
            commands::favorite::run(open_session(&home)?, &id, !remove).await
        }
        Commands::Status => {
            commands::status::run(&*open_session(&home)?);
            Ok(())
        }
        Commands::Website { no_open } => commands::website::run(&*open_session(&home)?, no_open),
    }
}

fn open_session(home: &Path) -> Result<Arc<Session>> {
    let mut config = Config::load_from(&home.join(paths::CONFIG_FILE))?;
    config.apply_env_overrides();
    let session = Session::open(config, home, Arc::new(AlwaysOnline))
        .with_context(|| format!("open session in {}", home.display()))?;
    Ok(Arc::new(session))
}
