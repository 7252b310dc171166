use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::bail;
use dbnest_core::{ConnectionGroup, ConnectionProfile, GroupId, ProfileId, ROOT_GROUP_ID, Result};
use dbnest_storage::{SettingsBackend, SettingsScope, read_array, write_array};
use tokio::sync::OnceCell;

use crate::{notify::Notifier, repair};

pub const CONNECTIONS_SECTION: &str = "connections";
pub const GROUPS_SECTION: &str = "connectionGroups";

/// What happens to a removed group's contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupContentAction {
    /// Remove the group, every transitive descendant group, and every
    /// connection living anywhere inside that subtree.
    Delete,
    /// Promote the group's immediate children (connections and groups) to
    /// the root, then remove only the group itself.
    Move,
}

/// The connection configuration store: stored profiles and their group tree
/// over a two-scope settings backend. The first operation (or an explicit
/// `initialize`) runs the integrity repair exactly once per instance; every
/// other operation waits on that gate.
pub struct ConnectionConfig {
    settings: Arc<dyn SettingsBackend>,
    notifier: Arc<dyn Notifier>,
    init: OnceCell<()>,
    warned_missing_workspace_ids: AtomicBool,
}

impl ConnectionConfig {
    pub fn new(settings: Arc<dyn SettingsBackend>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            settings,
            notifier,
            init: OnceCell::new(),
            warned_missing_workspace_ids: AtomicBool::new(false),
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        self.ensure_initialized().await
    }

    async fn ensure_initialized(&self) -> Result<()> {
        self.init
            .get_or_try_init(|| self.repair_stored_records())
            .await?;
        Ok(())
    }

    /// Repairs stored groups, then stored profiles against the repaired
    /// groups. Global scope only; workspace records are owned by the
    /// workspace author and never rewritten.
    async fn repair_stored_records(&self) -> Result<()> {
        let mut groups: Vec<ConnectionGroup> = self.read(GROUPS_SECTION, SettingsScope::Global).await?;
        if repair::repair_groups(&mut groups) {
            tracing::info!("repaired stored connection groups");
            self.write(GROUPS_SECTION, &groups, SettingsScope::Global).await?;
        }

        let mut profiles: Vec<ConnectionProfile> =
            self.read(CONNECTIONS_SECTION, SettingsScope::Global).await?;
        if repair::repair_profiles(&mut profiles, &groups) {
            tracing::info!("repaired stored connections");
            self.write(CONNECTIONS_SECTION, &profiles, SettingsScope::Global)
                .await?;
        }
        Ok(())
    }

    pub async fn get_connections(&self, include_workspace: bool) -> Result<Vec<ConnectionProfile>> {
        self.ensure_initialized().await?;

        let mut known_groups: HashSet<GroupId> = [ROOT_GROUP_ID].into();
        let global_groups: Vec<ConnectionGroup> =
            self.read(GROUPS_SECTION, SettingsScope::Global).await?;
        known_groups.extend(global_groups.iter().filter_map(|g| g.id));
        if include_workspace {
            let workspace_groups: Vec<ConnectionGroup> =
                self.read(GROUPS_SECTION, SettingsScope::Workspace).await?;
            known_groups.extend(workspace_groups.iter().filter_map(|g| g.id));
        }

        let mut connections = self
            .load_connections(SettingsScope::Global, &known_groups)
            .await?;
        connections.sort_by_key(ConnectionProfile::sort_key);

        if include_workspace {
            let mut workspace = self
                .load_connections(SettingsScope::Workspace, &known_groups)
                .await?;
            workspace.sort_by_key(ConnectionProfile::sort_key);
            connections.extend(workspace);
        }
        Ok(connections)
    }

    async fn load_connections(
        &self,
        scope: SettingsScope,
        known_groups: &HashSet<GroupId>,
    ) -> Result<Vec<ConnectionProfile>> {
        let stored: Vec<ConnectionProfile> = self.read(CONNECTIONS_SECTION, scope).await?;

        let mut kept = Vec::with_capacity(stored.len());
        let mut missing_ids = Vec::new();
        for profile in stored {
            if scope == SettingsScope::Workspace && profile.id.is_none() {
                missing_ids.push(profile.display_name());
                continue;
            }
            if !profile.has_connection_info() {
                self.notifier.error(&format!(
                    "Connection {} has no server name or connection string and was skipped",
                    profile
                        .id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| profile.display_name()),
                ));
                continue;
            }
            match profile.group_id {
                Some(group_id) if known_groups.contains(&group_id) => kept.push(profile),
                _ => self.notifier.warn(&format!(
                    "Connection {} references an unknown group and was skipped",
                    profile.display_name(),
                )),
            }
        }

        if !missing_ids.is_empty() && !self.warned_missing_workspace_ids.swap(true, Ordering::SeqCst)
        {
            self.notifier.error(&format!(
                "Workspace connections without an id were skipped: {}",
                missing_ids.join(", "),
            ));
        }
        Ok(kept)
    }

    pub async fn get_connection_by_id(&self, id: ProfileId) -> Result<Option<ConnectionProfile>> {
        let connections = self.get_connections(true).await?;
        Ok(connections.into_iter().find(|c| c.id == Some(id)))
    }

    /// Stores a profile, replacing any structurally-equal profile already in
    /// the target scope. Returns the stored form with id and group filled in.
    pub async fn add_connection(
        &self,
        mut profile: ConnectionProfile,
        scope: SettingsScope,
    ) -> Result<ConnectionProfile> {
        self.ensure_initialized().await?;
        repair::populate_missing_profile_ids(&mut profile);

        let mut profiles: Vec<ConnectionProfile> = self.read(CONNECTIONS_SECTION, scope).await?;
        profiles.retain(|existing| !existing.is_same_profile(&profile));
        profiles.push(profile.clone());
        self.write(CONNECTIONS_SECTION, &profiles, scope).await?;
        Ok(profile)
    }

    /// Removes every stored profile structurally equal to the argument from
    /// the global scope. Returns whether anything was removed.
    pub async fn remove_connection(&self, profile: &ConnectionProfile) -> Result<bool> {
        self.ensure_initialized().await?;

        let mut profiles: Vec<ConnectionProfile> =
            self.read(CONNECTIONS_SECTION, SettingsScope::Global).await?;
        let before = profiles.len();
        profiles.retain(|existing| !existing.is_same_profile(profile));
        if profiles.len() == before {
            return Ok(false);
        }
        self.write(CONNECTIONS_SECTION, &profiles, SettingsScope::Global)
            .await?;
        Ok(true)
    }

    pub async fn update_connection(&self, profile: ConnectionProfile) -> Result<()> {
        self.ensure_initialized().await?;

        let mut profiles: Vec<ConnectionProfile> =
            self.read(CONNECTIONS_SECTION, SettingsScope::Global).await?;
        let Some(slot) = profiles
            .iter_mut()
            .find(|existing| existing.id.is_some() && existing.id == profile.id)
        else {
            bail!(
                "No stored connection with id {}",
                profile
                    .id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "<none>".into()),
            );
        };
        *slot = profile;
        self.write(CONNECTIONS_SECTION, &profiles, SettingsScope::Global)
            .await
    }

    pub fn root_group(&self) -> ConnectionGroup {
        ConnectionGroup::root()
    }

    /// Stored groups of the scope with the synthetic root prepended. A stored
    /// record colliding with the root id is never surfaced.
    pub async fn get_groups(&self, scope: SettingsScope) -> Result<Vec<ConnectionGroup>> {
        self.ensure_initialized().await?;

        let stored: Vec<ConnectionGroup> = self.read(GROUPS_SECTION, scope).await?;
        let mut groups = vec![ConnectionGroup::root()];
        groups.extend(stored.into_iter().filter(|g| !g.is_root()));
        Ok(groups)
    }

    pub async fn get_group_by_id(&self, id: GroupId) -> Result<Option<ConnectionGroup>> {
        if id == ROOT_GROUP_ID {
            return Ok(Some(ConnectionGroup::root()));
        }
        self.ensure_initialized().await?;
        let groups: Vec<ConnectionGroup> = self.read(GROUPS_SECTION, SettingsScope::Global).await?;
        Ok(groups.into_iter().find(|g| g.id == Some(id)))
    }

    pub async fn add_group(&self, mut group: ConnectionGroup, scope: SettingsScope) -> Result<()> {
        self.ensure_initialized().await?;
        if group.is_root() {
            tracing::warn!("ignoring attempt to add a group under the reserved root id");
            return Ok(());
        }
        if group.id.is_none() {
            group.id = Some(uuid::Uuid::new_v4());
        }
        if group.parent_id.is_none() {
            group.parent_id = Some(ROOT_GROUP_ID);
        }

        let stored: Vec<ConnectionGroup> = self.read(GROUPS_SECTION, scope).await?;
        let mut groups: Vec<ConnectionGroup> =
            stored.into_iter().filter(|g| !g.is_root()).collect();
        groups.push(group);
        self.write(GROUPS_SECTION, &groups, scope).await
    }

    /// Removes a global-scope group, disposing of its contents per `action`.
    /// Returns false without writing when the id is the root or unknown.
    pub async fn remove_group(&self, id: GroupId, action: GroupContentAction) -> Result<bool> {
        self.ensure_initialized().await?;
        if id == ROOT_GROUP_ID {
            tracing::error!("refusing to remove the root connection group");
            return Ok(false);
        }

        let mut groups: Vec<ConnectionGroup> = self.read(GROUPS_SECTION, SettingsScope::Global).await?;
        if !groups.iter().any(|g| g.id == Some(id)) {
            tracing::warn!(%id, "group to remove was not found");
            return Ok(false);
        }

        let mut connections: Vec<ConnectionProfile> =
            self.read(CONNECTIONS_SECTION, SettingsScope::Global).await?;
        let connections_changed = match action {
            GroupContentAction::Delete => {
                let doomed = collect_subtree(&groups, id);
                let before = connections.len();
                connections.retain(|c| !c.group_id.is_some_and(|g| doomed.contains(&g)));
                groups.retain(|g| !g.id.is_some_and(|gid| doomed.contains(&gid)));
                connections.len() != before
            }
            GroupContentAction::Move => {
                let mut moved = false;
                for connection in connections.iter_mut() {
                    if connection.group_id == Some(id) {
                        connection.group_id = Some(ROOT_GROUP_ID);
                        moved = true;
                    }
                }
                for group in groups.iter_mut() {
                    if group.parent_id == Some(id) {
                        group.parent_id = Some(ROOT_GROUP_ID);
                    }
                }
                groups.retain(|g| g.id != Some(id));
                moved
            }
        };

        if connections_changed {
            self.write(CONNECTIONS_SECTION, &connections, SettingsScope::Global)
                .await?;
        }
        self.write(GROUPS_SECTION, &groups, SettingsScope::Global)
            .await?;
        Ok(true)
    }

    pub async fn update_group(&self, group: ConnectionGroup) -> Result<()> {
        self.ensure_initialized().await?;
        if group.is_root() {
            tracing::warn!("ignoring attempt to update the root connection group");
            return Ok(());
        }

        let mut groups: Vec<ConnectionGroup> = self.read(GROUPS_SECTION, SettingsScope::Global).await?;
        let Some(slot) = groups
            .iter_mut()
            .find(|existing| existing.id.is_some() && existing.id == group.id)
        else {
            bail!(
                "No stored connection group with id {}",
                group
                    .id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "<none>".into()),
            );
        };
        *slot = group;
        self.write(GROUPS_SECTION, &groups, SettingsScope::Global)
            .await
    }

    async fn read<T>(&self, section: &str, scope: SettingsScope) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        read_array(self.settings.as_ref(), section, scope).await
    }

    async fn write<T>(&self, section: &str, items: &[T], scope: SettingsScope) -> Result<()>
    where
        T: serde::Serialize,
    {
        write_array(self.settings.as_ref(), section, items, scope).await
    }
}

/// The target group's id plus every transitive descendant's. The visited set
/// keeps a hand-edited parent cycle from walking forever; the root id is
/// never collected.
fn collect_subtree(groups: &[ConnectionGroup], id: GroupId) -> HashSet<GroupId> {
    let mut collected = HashSet::new();
    let mut pending = vec![id];
    while let Some(current) = pending.pop() {
        if current == ROOT_GROUP_ID || !collected.insert(current) {
            continue;
        }
        for group in groups {
            if group.parent_id == Some(current) {
                if let Some(child_id) = group.id {
                    pending.push(child_id);
                }
            }
        }
    }
    collected
}
