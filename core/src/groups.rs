use serde::{Deserialize, Serialize};
use uuid::{Uuid, uuid};

pub type GroupId = Uuid;

pub const ROOT_GROUP_ID: GroupId = uuid!("00000000-0000-0000-0000-000000000001");
pub const ROOT_GROUP_NAME: &str = "ROOT";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<GroupId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConnectionGroup {
    pub fn new(name: impl Into<String>, parent_id: Option<GroupId>) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            name: name.into(),
            parent_id,
            color: None,
            description: None,
        }
    }

    /// The synthetic root group. Never persisted; synthesized on every read.
    pub fn root() -> Self {
        Self {
            id: Some(ROOT_GROUP_ID),
            name: ROOT_GROUP_NAME.into(),
            parent_id: None,
            color: None,
            description: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == Some(ROOT_GROUP_ID)
    }

    /// A stored group left behind by the old scheme: carries the root name
    /// but not the reserved root id.
    pub fn is_legacy_root(&self) -> bool {
        self.name == ROOT_GROUP_NAME && self.id != Some(ROOT_GROUP_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_group_uses_reserved_identity() {
        let root = ConnectionGroup::root();
        assert_eq!(root.id, Some(ROOT_GROUP_ID));
        assert_eq!(root.name, ROOT_GROUP_NAME);
        assert!(root.is_root());
        assert!(!root.is_legacy_root());
    }

    #[test]
    fn legacy_root_detected_by_name_id_mismatch() {
        let mut group = ConnectionGroup::new(ROOT_GROUP_NAME, None);
        assert!(group.is_legacy_root());

        group.id = None;
        assert!(group.is_legacy_root());

        group.id = Some(ROOT_GROUP_ID);
        assert!(!group.is_legacy_root());
    }
}
