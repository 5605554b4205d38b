use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::info;

use innerworld_core::core::sync_store::{SyncOptions, SyncStore};
use innerworld_core::profiles::errors::SyncError;
use innerworld_core::profiles::profile::{
    FacilitatorConfig, GlobalSettingsUpdate, PermissionsUpdate,
};
use innerworld_core::storage::store::JsonFileStore;
use innerworld_core::transports::local::LocalTransport;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "innerworld", version = "0.1.0", subcommand_required = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a facilitator configuration from a JSON file
    Init {
        /// Path to the configuration file
        #[arg(long)]
        config: PathBuf,
    },
    /// Show the facilitator configuration or a single NNA profile
    Show {
        /// NNA id to show (defaults to the whole configuration)
        #[arg(long)]
        id: Option<String>,
    },
    /// Set an NNA's progression level (facilitator operation)
    SetLevel {
        #[arg(long)]
        id: String,
        #[arg(long)]
        level: u32,
    },
    /// Change an NNA's permission set; only the given flags change
    SetPermissions {
        #[arg(long)]
        id: String,
        #[arg(long)]
        can_upgrade_level: Option<bool>,
        #[arg(long)]
        can_change_settings: Option<bool>,
        #[arg(long)]
        max_registries_per_day: Option<u32>,
    },
    /// Change the facilitator's global settings
    SetSettings {
        /// Workshop session length in minutes
        #[arg(long)]
        session_duration: Option<u32>,
        #[arg(long)]
        allow_group_chat: Option<bool>,
    },
    /// Select the active NNA profile
    SetCurrent {
        #[arg(long)]
        id: String,
    },
    /// Record one emotional registry for an NNA
    Record {
        #[arg(long)]
        id: String,
    },
    /// Mark the store online; queued changes are replayed
    Online,
    /// Mark the store offline; mutations start queueing
    Offline,
    /// Show connectivity and queue state
    Status,
    /// Replay queued changes now
    Sync,
}

pub async fn run_cli(args: Args) -> Result<(), SyncError> {
    let durable = Arc::new(JsonFileStore::durable()?);
    let session = Arc::new(JsonFileStore::session()?);
    let store = SyncStore::spawn(
        durable,
        session,
        Arc::new(LocalTransport::new()),
        SyncOptions::default(),
    );

    match args.command {
        Command::Init { config } => {
            let raw = std::fs::read_to_string(&config)?;
            let config: FacilitatorConfig = serde_json::from_str(&raw)?;
            info!(
                "loading facilitator '{}' with {} NNA profile(s)",
                config.name,
                config.nna_profiles.len()
            );
            store.initialize_facilitator(config).await;
        }
        Command::Show { id } => show(&store, id.as_deref()).await?,
        Command::SetLevel { id, level } => {
            store.update_nna_level(&id, level).await;
            info!("level of '{}' set to {}", id, level);
        }
        Command::SetPermissions {
            id,
            can_upgrade_level,
            can_change_settings,
            max_registries_per_day,
        } => {
            store
                .update_nna_permissions(
                    &id,
                    PermissionsUpdate {
                        can_upgrade_level,
                        can_change_settings,
                        max_registries_per_day,
                    },
                )
                .await;
        }
        Command::SetSettings {
            session_duration,
            allow_group_chat,
        } => {
            store
                .update_global_settings(GlobalSettingsUpdate {
                    session_duration,
                    allow_group_chat,
                    ..GlobalSettingsUpdate::default()
                })
                .await;
        }
        Command::SetCurrent { id } => store.set_current_nna(&id).await,
        Command::Record { id } => store.record_registry(&id).await,
        Command::Online => store.set_online(true).await,
        Command::Offline => store.set_online(false).await,
        Command::Status => {
            println!("online:  {}", store.is_online().await);
            println!("pending: {}", store.pending_len().await);
            match store.current_nna().await {
                Some(profile) => println!("current: {} ({})", profile.id, profile.alias),
                None => println!("current: none"),
            }
        }
        Command::Sync => store.sync_pending_changes().await,
    }

    // Processes queued drain/persist events, then flushes both tiers.
    store.shutdown().await
}

async fn show(store: &SyncStore, id: Option<&str>) -> Result<(), SyncError> {
    match id {
        Some(id) => match store.nna_profile(id).await {
            Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
            None => println!("no NNA profile with id '{id}'"),
        },
        None => match store.facilitator_config().await {
            Some(config) => println!("{}", serde_json::to_string_pretty(&config)?),
            None => println!("no facilitator configuration loaded (run `innerworld init`)"),
        },
    }
    Ok(())
}
