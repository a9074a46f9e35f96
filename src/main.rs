use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use dealdesk::api::{ApiClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use dealdesk::commands;
use dealdesk::models::Site;
use dealdesk::session::{SessionContext, TerminalNotifier};
use dealdesk::store::Store;

#[derive(Parser)]
#[command(name = "dealdesk")]
#[command(about = "Browse deals and their files from the terminal")]
#[command(version)]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "DEALDESK_API_URL", default_value = DEFAULT_BASE_URL)]
    api_url: String,

    /// Directory for the local session store
    #[arg(long, global = true, env = "DEALDESK_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Write logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in to a website
    Login {
        /// Website to sign in to
        #[arg(short, long, value_enum, default_value_t = Site::Fo1)]
        site: Site,
        /// Account email (prompted if omitted)
        #[arg(short, long)]
        email: Option<String>,
        /// Account password (prompted if omitted)
        #[arg(long, env = "DEALDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget cached deals
    Logout,

    /// Show session information
    Status,

    /// List available deals
    Deals,

    /// Show the files attached to a deal
    Files {
        /// Deal ID
        deal_id: i64,
        /// Save every file into this directory
        #[arg(short, long)]
        download: Option<PathBuf>,
    },

    /// Interactive dashboard
    Dashboard,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn find_state_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match explicit {
        Some(d) => d,
        None => dirs::data_local_dir()
            .map(|d| d.join("dealdesk"))
            .context("Could not determine a data directory. Pass --state-dir.")?,
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}

fn get_context(cli: &Cli) -> Result<SessionContext<TerminalNotifier>> {
    let state_dir = find_state_dir(cli.state_dir.clone())?;
    let store = Store::open(&state_dir.join("state.db")).context("Failed to open session store")?;
    let api = ApiClient::new(cli.api_url.clone(), Duration::from_secs(cli.timeout))
        .context("Failed to build HTTP client")?;
    Ok(SessionContext::new(store, api, TerminalNotifier))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);
    let ctx = get_context(&cli)?;

    match cli.command {
        Commands::Login {
            site,
            email,
            password,
        } => commands::login::run(&ctx, site, email, password).await,

        Commands::Logout => commands::logout::run(&ctx),

        Commands::Status => commands::status::run(&ctx),

        Commands::Deals => commands::deals::run(&ctx).await,

        Commands::Files { deal_id, download } => {
            commands::files::run(&ctx, deal_id, download.as_deref()).await
        }

        Commands::Dashboard => commands::dashboard::run(&ctx).await,
    }
}
