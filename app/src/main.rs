use std::{collections::HashSet, fs, path::PathBuf, sync::Arc};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use dbnest_config::{ConnectionConfig, GroupContentAction, TracingNotifier};
use dbnest_core::{ConnectionGroup, ConnectionProfile, GroupId, ProfileId, ROOT_GROUP_ID};
use dbnest_storage::{JsonSettingsBackend, SecretStore, SettingsScope};
use directories::BaseDirs;
use uuid::Uuid;

type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "dbnest", about = "Stored database connections and groups")]
struct Cli {
    /// Workspace settings file merged into the workspace scope.
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,
    /// Workspace-folder settings file merged after the workspace file.
    #[arg(long, global = true)]
    workspace_folder: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List stored connections.
    List {
        /// Include workspace-scope connections after the global ones.
        #[arg(long)]
        workspace: bool,
    },
    /// Print the connection group tree.
    Groups,
    /// Store a new connection.
    Add {
        name: String,
        #[arg(long)]
        server: String,
        #[arg(long)]
        database: Option<String>,
        #[arg(long)]
        user: Option<String>,
        /// Owning group id; defaults to the root group.
        #[arg(long)]
        group: Option<Uuid>,
        /// Remember this password in the system keyring.
        #[arg(long)]
        password: Option<String>,
        /// Store in the workspace scope instead of the user scope.
        #[arg(long)]
        to_workspace: bool,
    },
    /// Remove a stored connection by id.
    Remove { id: Uuid },
    /// Create a connection group.
    AddGroup {
        name: String,
        #[arg(long)]
        parent: Option<Uuid>,
    },
    /// Remove a group. Its contents move to the root unless --delete-contents.
    RemoveGroup {
        id: Uuid,
        #[arg(long)]
        delete_contents: bool,
    },
    /// Move a connection into another group.
    Move { id: Uuid, group: Uuid },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("dbnest failed: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_dir = resolve_config_dir()?;
    tracing::debug!(dir = %config_dir.display(), "using config directory");
    let mut backend = JsonSettingsBackend::new(&config_dir);
    if let Some(path) = cli.workspace.clone() {
        backend = backend.with_workspace(path);
    }
    if let Some(path) = cli.workspace_folder.clone() {
        backend = backend.with_workspace_folder(path);
    }
    let config = ConnectionConfig::new(Arc::new(backend), Arc::new(TracingNotifier));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute(cli.command, &config))
}

async fn execute(command: Command, config: &ConnectionConfig) -> Result<()> {
    match command {
        Command::List { workspace } => list_connections(config, workspace).await,
        Command::Groups => print_group_tree(config).await,
        Command::Add {
            name,
            server,
            database,
            user,
            group,
            password,
            to_workspace,
        } => {
            let profile = ConnectionProfile {
                profile_name: Some(name),
                server: Some(server),
                database,
                user,
                group_id: group,
                remember_password: password.is_some(),
                ..Default::default()
            };
            let scope = if to_workspace {
                SettingsScope::Workspace
            } else {
                SettingsScope::Global
            };
            let stored = config.add_connection(profile, scope).await?;
            if let Some(password) = password {
                SecretStore::new().store(&stored, &password)?;
            }
            println!("Stored connection {}", stored.id.expect("id populated on add"));
            Ok(())
        }
        Command::Remove { id } => remove_connection(config, id).await,
        Command::AddGroup { name, parent } => {
            let group = ConnectionGroup::new(name, parent);
            let id = group.id.expect("new groups carry an id");
            config.add_group(group, SettingsScope::Global).await?;
            println!("Created group {id}");
            Ok(())
        }
        Command::RemoveGroup {
            id,
            delete_contents,
        } => {
            let action = if delete_contents {
                GroupContentAction::Delete
            } else {
                GroupContentAction::Move
            };
            if config.remove_group(id, action).await? {
                println!("Removed group {id}");
            } else {
                println!("Group {id} was not removed");
            }
            Ok(())
        }
        Command::Move { id, group } => move_connection(config, id, group).await,
    }
}

async fn list_connections(config: &ConnectionConfig, include_workspace: bool) -> Result<()> {
    let connections = config.get_connections(include_workspace).await?;
    if connections.is_empty() {
        println!("No stored connections");
        return Ok(());
    }
    for connection in connections {
        let group = group_name(config, connection.group_id).await?;
        let id = connection
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<workspace>".into());
        println!("{}  [{}]  {}", connection.display_name(), group, id);
    }
    Ok(())
}

async fn group_name(config: &ConnectionConfig, id: Option<GroupId>) -> Result<String> {
    let Some(id) = id else {
        return Ok("?".into());
    };
    Ok(config
        .get_group_by_id(id)
        .await?
        .map(|g| g.name)
        .unwrap_or_else(|| "?".into()))
}

async fn print_group_tree(config: &ConnectionConfig) -> Result<()> {
    let groups = config.get_groups(SettingsScope::Global).await?;
    println!("ROOT");
    let mut visited = HashSet::from([ROOT_GROUP_ID]);
    print_children(&groups, ROOT_GROUP_ID, 1, &mut visited);
    Ok(())
}

fn print_children(
    groups: &[ConnectionGroup],
    parent: GroupId,
    depth: usize,
    visited: &mut HashSet<GroupId>,
) {
    for group in groups {
        if group.parent_id != Some(parent) {
            continue;
        }
        let Some(id) = group.id else { continue };
        if !visited.insert(id) {
            continue;
        }
        println!("{}{}  {id}", "  ".repeat(depth), group.name);
        print_children(groups, id, depth + 1, visited);
    }
}

async fn remove_connection(config: &ConnectionConfig, id: ProfileId) -> Result<()> {
    let Some(profile) = config.get_connection_by_id(id).await? else {
        bail!("No stored connection with id {id}");
    };
    if config.remove_connection(&profile).await? {
        if profile.remember_password {
            SecretStore::new().forget(&profile)?;
        }
        println!("Removed connection {id}");
    } else {
        println!("Connection {id} was not removed");
    }
    Ok(())
}

async fn move_connection(config: &ConnectionConfig, id: ProfileId, group: GroupId) -> Result<()> {
    let Some(mut profile) = config.get_connection_by_id(id).await? else {
        bail!("No stored connection with id {id}");
    };
    if config.get_group_by_id(group).await?.is_none() {
        bail!("No connection group with id {group}");
    }
    profile.group_id = Some(group);
    config.update_connection(profile).await?;
    println!("Moved connection {id}");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn resolve_config_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().context("Unable to determine config directory")?;
    let dir_name = if cfg!(target_os = "linux") {
        "dbnest"
    } else {
        "DbNest"
    };
    let dir = base_dirs.config_dir().join(dir_name);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}
