//! pcsetup CLI
//!
//! Submit PC setup requests and track their approval and execution.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use pcsetup_cli::api::ApiClient;
use pcsetup_cli::auth_cmd::{self, AuthAction};
use pcsetup_cli::dispatch::{Command, Controller, Outcome};
use pcsetup_cli::draft::DraftStore;
use pcsetup_cli::draft_cmd::{self, DraftAction};
use pcsetup_cli::request_cmd::{self, RequestAction};
use pcsetup_cli::service::SetupService;
use pcsetup_cli::session::SessionGuard;
use pcsetup_cli::store::CredentialStore;
use pcsetup_core::config::load_config;
use pcsetup_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "pcsetup")]
#[command(version, about = "PC setup request client", long_about = None)]
struct Cli {
    /// Backend API root (overrides config and PCSETUP_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, env = "PCSETUP_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in, log out, show the session.
    #[command(subcommand)]
    Auth(AuthAction),
    /// Download the CSV template.
    SampleCsv {
        /// Where to write the template.
        #[arg(short, long, default_value = "sample.csv")]
        output: PathBuf,
    },
    /// Prepare the computers and settings of the next request.
    #[command(subcommand)]
    Draft(DraftAction),
    /// Submit the draft as a new setup request.
    Submit,
    /// List, decide on and follow setup requests.
    #[command(subcommand)]
    Requests(RequestAction),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config()?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }

    let filter = config
        .log_level
        .as_deref()
        .map_or_else(|| "pcsetup=warn".to_string(), |level| format!("pcsetup={level}"));
    init_tracing(&filter, cli.log_json);
    info!(version = env!("CARGO_PKG_VERSION"), api = %config.api.base_url, "Starting pcsetup");

    let api = ApiClient::new(&config.api)?;
    let store = CredentialStore::default_path()
        .map_or_else(CredentialStore::in_memory, CredentialStore::open);
    let guard = SessionGuard::new(api, store, config.session.expiry_buffer_secs);
    let drafts = DraftStore::default_path().map_or_else(DraftStore::in_memory, DraftStore::at);
    let mut controller = Controller::new(SetupService::new(guard), config.poll.interval(), drafts);

    match cli.command {
        Commands::Auth(action) => auth_cmd::run(action, &mut controller).await?,
        Commands::SampleCsv { output } => {
            if let Outcome::SampleSaved { path, bytes } = controller
                .dispatch(Command::DownloadSample { dest: output })
                .await?
            {
                writeln!(io::stdout(), "Saved {bytes} bytes to {}", path.display())?;
            }
        }
        Commands::Draft(action) => draft_cmd::run(action, &mut controller).await?,
        Commands::Submit => {
            if let Outcome::Submitted(request_id) = controller.dispatch(Command::Submit).await? {
                let mut out = io::stdout();
                writeln!(out, "Created setup request {request_id}")?;
                writeln!(out, "Follow it with `pcsetup requests watch {request_id}`")?;
            }
        }
        Commands::Requests(action) => request_cmd::run(action, &mut controller).await?,
    }

    Ok(())
}
