use std::collections::HashSet;

use dbnest_core::{ConnectionGroup, ConnectionProfile, GroupId, ROOT_GROUP_ID};
use uuid::Uuid;

/// One repair pass over the stored groups. Legacy-root references are
/// migrated to the reserved root id, dangling or absent parents are
/// re-pointed at the root, and missing group ids are generated. Returns
/// whether anything changed so the caller can skip the write-back.
pub(crate) fn repair_groups(groups: &mut [ConnectionGroup]) -> bool {
    let legacy_ids = legacy_root_ids(groups);
    let mut valid_ids: HashSet<GroupId> = groups.iter().filter_map(|g| g.id).collect();
    valid_ids.insert(ROOT_GROUP_ID);

    let mut changed = false;
    for group in groups.iter_mut() {
        if group.id.is_none() {
            let id = Uuid::new_v4();
            tracing::debug!(group = %group.name, %id, "generated missing group id");
            group.id = Some(id);
            changed = true;
        }
        if repair_group_ref(&mut group.parent_id, &legacy_ids, &valid_ids) {
            tracing::debug!(group = %group.name, "re-pointed group parent at root");
            changed = true;
        }
    }
    changed
}

/// The profile pass. Group references are validated against the repaired
/// group list, not against the profiles' own current values, so a profile
/// pointing at a group that no longer exists is re-pointed at the root.
pub(crate) fn repair_profiles(
    profiles: &mut [ConnectionProfile],
    groups: &[ConnectionGroup],
) -> bool {
    let legacy_ids = legacy_root_ids(groups);
    let mut valid_ids: HashSet<GroupId> = groups.iter().filter_map(|g| g.id).collect();
    valid_ids.insert(ROOT_GROUP_ID);

    let mut changed = false;
    for profile in profiles.iter_mut() {
        if profile.id.is_none() {
            profile.id = Some(Uuid::new_v4());
            tracing::debug!(profile = %profile.display_name(), "generated missing connection id");
            changed = true;
        }
        if repair_group_ref(&mut profile.group_id, &legacy_ids, &valid_ids) {
            tracing::debug!(profile = %profile.display_name(), "re-pointed connection at root group");
            changed = true;
        }
    }
    changed
}

/// Back-fills a profile's id and group before it is stored. Shared between
/// the repair pass and `add_connection`.
pub fn populate_missing_profile_ids(profile: &mut ConnectionProfile) -> bool {
    let mut changed = false;
    if profile.group_id.is_none() {
        profile.group_id = Some(ROOT_GROUP_ID);
        changed = true;
    }
    if profile.id.is_none() {
        profile.id = Some(Uuid::new_v4());
        changed = true;
    }
    changed
}

fn legacy_root_ids(groups: &[ConnectionGroup]) -> HashSet<GroupId> {
    groups
        .iter()
        .filter(|g| g.is_legacy_root())
        .filter_map(|g| g.id)
        .collect()
}

fn repair_group_ref(
    reference: &mut Option<GroupId>,
    legacy_ids: &HashSet<GroupId>,
    valid_ids: &HashSet<GroupId>,
) -> bool {
    match *reference {
        Some(id) if legacy_ids.contains(&id) || !valid_ids.contains(&id) => {
            *reference = Some(ROOT_GROUP_ID);
            true
        }
        Some(_) => false,
        None => {
            *reference = Some(ROOT_GROUP_ID);
            true
        }
    }
}
