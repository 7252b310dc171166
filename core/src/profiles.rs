use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::groups::GroupId;

pub type ProfileId = Uuid;

/// Server value the profile form leaves behind when the field was never
/// filled in; treated as absent wherever connection info is required.
pub const SERVER_PLACEHOLDER: &str = "<server>";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationKind {
    #[default]
    Password,
    Integrated,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProfileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub authentication: AuthenticationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    #[serde(default)]
    pub remember_password: bool,
}

impl ConnectionProfile {
    /// Name shown in pickers and error messages: profile name, else server,
    /// else connection string, else the raw id.
    pub fn display_name(&self) -> String {
        if let Some(name) = non_empty(&self.profile_name) {
            return name.to_owned();
        }
        if let Some(server) = non_empty(&self.server) {
            return server.to_owned();
        }
        if let Some(connection_string) = non_empty(&self.connection_string) {
            return connection_string.to_owned();
        }
        self.id.map(|id| id.to_string()).unwrap_or_default()
    }

    /// Whether the profile carries enough information to open a connection:
    /// either a connection string or a real (non-placeholder) server name.
    pub fn has_connection_info(&self) -> bool {
        if non_empty(&self.connection_string).is_some() {
            return true;
        }
        match non_empty(&self.server) {
            Some(server) => server != SERVER_PLACEHOLDER,
            None => false,
        }
    }

    /// Structural identity: the connection-defining fields, never the id.
    pub fn is_same_profile(&self, other: &ConnectionProfile) -> bool {
        if self.connection_string.is_some() || other.connection_string.is_some() {
            return self.connection_string == other.connection_string
                && self.profile_name == other.profile_name;
        }
        self.profile_name == other.profile_name
            && self.server == other.server
            && self.database == other.database
            && self.user == other.user
            && self.authentication == other.authentication
    }

    /// Case-insensitive ordering key over the display name, with the original
    /// casing kept as tiebreak so ordering stays total.
    pub fn sort_key(&self) -> (String, String) {
        let name = self.display_name();
        (name.to_lowercase(), name)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_profile(name: Option<&str>, server: &str) -> ConnectionProfile {
        ConnectionProfile {
            id: Some(Uuid::new_v4()),
            profile_name: name.map(str::to_owned),
            server: Some(server.to_owned()),
            database: Some("inventory".into()),
            user: Some("app".into()),
            ..Default::default()
        }
    }

    #[test]
    fn display_name_prefers_profile_name_then_server_then_string() {
        let mut profile = server_profile(Some("prod"), "db.internal");
        assert_eq!(profile.display_name(), "prod");

        profile.profile_name = None;
        assert_eq!(profile.display_name(), "db.internal");

        profile.server = None;
        profile.connection_string = Some("host=db.internal".into());
        assert_eq!(profile.display_name(), "host=db.internal");
    }

    #[test]
    fn placeholder_server_does_not_count_as_connection_info() {
        let mut profile = server_profile(None, SERVER_PLACEHOLDER);
        assert!(!profile.has_connection_info());

        profile.connection_string = Some("host=db.internal".into());
        assert!(profile.has_connection_info());
    }

    #[test]
    fn same_profile_ignores_id() {
        let a = server_profile(Some("prod"), "db.internal");
        let mut b = a.clone();
        b.id = Some(Uuid::new_v4());
        assert!(a.is_same_profile(&b));

        b.user = Some("other".into());
        assert!(!a.is_same_profile(&b));
    }

    #[test]
    fn connection_string_dominates_equality() {
        let mut a = server_profile(Some("prod"), "db.internal");
        let mut b = server_profile(Some("prod"), "other.internal");
        a.connection_string = Some("host=x".into());
        b.connection_string = Some("host=x".into());
        assert!(a.is_same_profile(&b));

        b.connection_string = Some("host=y".into());
        assert!(!a.is_same_profile(&b));
    }
}
