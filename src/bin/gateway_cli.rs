//! gateway-cli: command-line access to a gateway-backed drive
//!
//! Usage:
//!   gateway-cli config show                      Print the saved configuration
//!   gateway-cli config set <endpoint> <root>     Save endpoint and root folder
//!   gateway-cli health                           Check gateway compatibility
//!   gateway-cli root <id> <name> <role>          Resolve an identity's sandbox root
//!   gateway-cli ls [folder]                      List a folder (default: root)
//!   gateway-cli mkdir <name> [--parent id]       Create a folder
//!   gateway-cli put <local> [--folder id]        Upload a file
//!   gateway-cli mv <id> <name>                   Rename a folder
//!   gateway-cli rm <id>                          Delete a file or folder

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use gateway_drive::config::default_config_path;
use gateway_drive::{
    CompatibilityState, ConfigStore, GatewayBackend, GatewayClient, GatewayConfig, GatewayError,
    Identity, InMemoryRootCache, Role, SandboxRootResolver, UploadEncoder, VersionMonitor,
};

#[derive(Parser)]
#[command(
    name = "gateway-cli",
    about = "gateway-cli: browse and manage a gateway-backed drive",
    version
)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change the gateway configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Check gateway health and version
    Health,
    /// Resolve the sandbox root for an identity
    Root {
        /// Identity id
        id: String,
        /// Display name
        name: String,
        /// Role: admin, teacher or student
        role: Role,
        /// Already provisioned personal root, if known
        #[arg(long)]
        personal_root: Option<String>,
    },
    /// List a folder
    Ls {
        /// Folder id (default: configured root)
        folder: Option<String>,
    },
    /// Create a folder
    Mkdir {
        name: String,
        /// Parent folder id (default: configured root)
        #[arg(long)]
        parent: Option<String>,
    },
    /// Upload a local file
    Put {
        local: PathBuf,
        /// Target folder id (default: configured root)
        #[arg(long)]
        folder: Option<String>,
    },
    /// Rename a folder
    Mv { id: String, name: String },
    /// Delete a file or folder
    Rm { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Save endpoint URL and root folder id
    Set {
        endpoint: String,
        root: String,
        #[arg(long)]
        max_upload_bytes: Option<u64>,
        #[arg(long)]
        health_timeout_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    gateway_drive::init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let path = cli.config.unwrap_or_else(default_config_path);
    let store = Arc::new(ConfigStore::open(&path));
    let client = Arc::new(GatewayClient::new(store.clone()));

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => {
            let config = store.snapshot().await;
            println!("{}", serde_json::to_string_pretty(&*config)?);
            if !config.is_configured() {
                println!("\nNot configured. Use: gateway-cli config set <endpoint> <root>");
            }
        }
        Commands::Config {
            action: ConfigAction::Set { endpoint, root, max_upload_bytes, health_timeout_secs },
        } => {
            let current = store.snapshot().await;
            let config = GatewayConfig {
                endpoint_url: endpoint,
                root_folder_id: root,
                max_upload_bytes: max_upload_bytes.unwrap_or(current.max_upload_bytes),
                health_timeout_secs: health_timeout_secs.unwrap_or(current.health_timeout_secs),
            };
            store.save(config).await.context("Failed to save configuration")?;
            println!("Saved {}", path.display());
        }
        Commands::Health => {
            let config = store.snapshot().await;
            let monitor = VersionMonitor::new(client);
            let report = monitor.check_report(&config.endpoint_url).await;
            println!("{}", report.state);
            if let Some(version) = report.reported_version {
                println!("Reported version: {}", version);
            }
            if report.state != CompatibilityState::Matches {
                bail!("gateway is not compatible ({:?})", report.state);
            }
        }
        Commands::Root { id, name, role, personal_root } => {
            let resolver = SandboxRootResolver::new(
                client.clone(),
                store.clone(),
                Arc::new(InMemoryRootCache::new()),
            );
            let mut identity = Identity::new(id, name, role);
            identity.personal_root_id = personal_root;
            let root = resolver.resolve_root(&mut identity).await.map_err(explain)?;
            println!("{}", root);
        }
        Commands::Ls { folder } => {
            let folder = folder_or_root(&store, folder).await?;
            let entries = client.list(&folder).await.map_err(explain)?;
            for entry in entries {
                let kind = if entry.is_folder() { "d" } else { "-" };
                println!("{} {:>12} {:<34} {}", kind, entry.size, entry.id, entry.name);
            }
        }
        Commands::Mkdir { name, parent } => {
            let parent = folder_or_root(&store, parent).await?;
            client.create_folder(&parent, name.trim()).await.map_err(explain)?;
            println!("Created '{}'", name.trim());
        }
        Commands::Put { local, folder } => {
            let config = store.require().await.map_err(explain)?;
            let folder = folder_or_root(&store, folder).await?;
            let payload = UploadEncoder::from_config(&config)
                .prepare(&local)
                .await
                .map_err(explain)?;
            client.upload(&folder, &payload).await.map_err(explain)?;
            println!("Uploaded {} ({} bytes)", payload.filename, payload.size);
        }
        Commands::Mv { id, name } => {
            client.rename_folder(&id, name.trim()).await.map_err(explain)?;
            println!("Renamed {} to '{}'", id, name.trim());
        }
        Commands::Rm { id } => {
            client.delete(&id).await.map_err(explain)?;
            println!("Deleted {}", id);
        }
    }

    Ok(())
}

async fn folder_or_root(store: &ConfigStore, folder: Option<String>) -> Result<String> {
    match folder {
        Some(id) => Ok(id),
        None => Ok(store.require().await.map_err(explain)?.root_folder_id.clone()),
    }
}

/// Attach an actionable hint to the error classes a user can do something about
fn explain(e: GatewayError) -> anyhow::Error {
    let hint = match &e {
        GatewayError::Configuration(_) => Some("run `gateway-cli config set <endpoint> <root>`"),
        GatewayError::Protocol(_) => Some("redeploy the gateway with access set to \"Anyone\""),
        GatewayError::Compatibility(_) => Some("this feature needs a newer gateway deployment"),
        e if e.is_recoverable() => Some("the request can be retried"),
        _ => None,
    };
    match hint {
        Some(hint) => anyhow::Error::new(e).context(hint),
        None => anyhow::Error::new(e),
    }
}
