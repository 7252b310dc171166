pub mod groups;
pub mod profiles;

pub use groups::{ConnectionGroup, GroupId, ROOT_GROUP_ID, ROOT_GROUP_NAME};
pub use profiles::{AuthenticationKind, ConnectionProfile, ProfileId, SERVER_PLACEHOLDER};

pub type Result<T> = anyhow::Result<T>;
