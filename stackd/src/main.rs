//! stackd - Entry Point
//!
//! Control plane deploying compose stacks onto docker endpoints.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use stackd::app::options::AppOptions;
use stackd::app::run::{issue_token, run};
use stackd::datastore::json::JsonDataStore;
use stackd::logs::{init_logging, LogLevel, LogOptions};
use stackd::models::endpoint::{AccessPolicy, Endpoint, EndpointId};
use stackd::models::user::{User, UserId, UserRole};
use stackd::storage::layout::StorageLayout;
use stackd::storage::settings::Settings;
use stackd::utils::version_info;

#[derive(Parser)]
#[command(name = "stackd")]
#[command(author, version, about = "Deploy compose stacks onto docker endpoints")]
struct Cli {
    /// Data directory holding settings, metadata and stack files
    #[arg(long, env = "STACKD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Address the API listens on
    #[arg(long, env = "STACKD_HOST")]
    host: Option<String>,

    #[arg(long, env = "STACKD_PORT")]
    port: Option<u16>,

    #[arg(long, env = "STACKD_LOG_LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,

    /// Print version information
    Version,

    /// Issue an access token for an existing user
    Token {
        #[arg(long)]
        user: u32,
    },

    /// Create or replace a user
    User {
        #[arg(long)]
        id: u32,

        #[arg(long)]
        username: String,

        #[arg(long, default_value_t = false)]
        admin: bool,
    },

    /// Create or replace an endpoint
    Endpoint {
        #[arg(long)]
        id: u32,

        #[arg(long)]
        name: String,

        /// Engine address; empty targets the local engine
        #[arg(long, default_value = "")]
        url: String,

        /// Users granted access to the endpoint
        #[arg(long = "grant", value_delimiter = ',')]
        grants: Vec<u32>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(Command::Version) = cli.command {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Unable to print version: {}", e),
        }
        return;
    }

    let layout = cli
        .data_dir
        .clone()
        .map(StorageLayout::new)
        .unwrap_or_default();

    let mut settings = match load_settings(&layout).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {}", e);
            return;
        }
    };
    if let Some(host) = cli.host.clone() {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(level) = cli.log_level.clone() {
        settings.log_level = level;
    }

    let serving = matches!(cli.command, None | Some(Command::Serve));
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.json_logs,
        log_dir: (serving && settings.log_to_file).then(|| layout.logs_dir()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = AppOptions::from_settings(&settings, layout.clone());

    let result = match cli.command {
        None | Some(Command::Serve) => {
            info!("Running stackd {} with options: {:?}", version_info().version, options);
            run(options, await_shutdown_signal()).await
        }
        Some(Command::Token { user }) => issue_token(&options, UserId(user)).await.map(|token| {
            println!("{}", token);
        }),
        Some(Command::User { id, username, admin }) => {
            let role = if admin {
                UserRole::Administrator
            } else {
                UserRole::Standard
            };
            seed(&layout, |store| async move {
                store
                    .upsert_user(User {
                        id: UserId(id),
                        username,
                        role,
                    })
                    .await
            })
            .await
        }
        Some(Command::Endpoint {
            id,
            name,
            url,
            grants,
        }) => {
            let mut endpoint = Endpoint::new(EndpointId(id), name, url);
            for user in grants {
                endpoint
                    .user_access_policies
                    .insert(UserId(user), AccessPolicy::default());
            }
            seed(&layout, |store| async move { store.upsert_endpoint(endpoint).await }).await
        }
        Some(Command::Version) => Ok(()),
    };

    if let Err(e) = result {
        error!("stackd failed: {}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn load_settings(layout: &StorageLayout) -> anyhow::Result<Settings> {
    let file = layout.settings_file();
    if !file.exists().await {
        return Ok(Settings::default());
    }
    Ok(file.read_json::<Settings>().await?)
}

async fn seed<F, Fut>(layout: &StorageLayout, apply: F) -> Result<(), stackd::errors::StackError>
where
    F: FnOnce(JsonDataStore) -> Fut,
    Fut: std::future::Future<Output = Result<(), stackd::datastore::StoreError>>,
{
    let run = async {
        layout.setup().await?;
        let store = JsonDataStore::open(layout.database_file().path()).await?;
        apply(store).await?;
        anyhow::Ok(())
    };
    run.await
        .map_err(|e| stackd::errors::StackError::persistence("Unable to update the metadata store", e))
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
