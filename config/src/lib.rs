pub mod notify;
mod repair;
mod store;

pub use notify::{Notifier, TracingNotifier};
pub use repair::populate_missing_profile_ids;
pub use store::{CONNECTIONS_SECTION, ConnectionConfig, GROUPS_SECTION, GroupContentAction};
