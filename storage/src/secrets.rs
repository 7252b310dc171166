use dbnest_core::{ConnectionProfile, Result};
use keyring::Entry;

/// Keyring-backed password storage, keyed by profile id and user. Profiles
/// without an id cannot own a secret and every operation on them is a no-op.
pub struct SecretStore {
    service: String,
}

impl SecretStore {
    pub fn new() -> Self {
        Self {
            service: "DbNest".into(),
        }
    }

    pub fn store(&self, profile: &ConnectionProfile, password: &str) -> Result<()> {
        let Some(entry) = self.entry(profile)? else {
            return Ok(());
        };
        entry.set_password(password)?;
        Ok(())
    }

    pub fn read(&self, profile: &ConnectionProfile) -> Result<Option<String>> {
        let Some(entry) = self.entry(profile)? else {
            return Ok(None);
        };
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn forget(&self, profile: &ConnectionProfile) -> Result<()> {
        let Some(entry) = self.entry(profile)? else {
            return Ok(());
        };
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn entry(&self, profile: &ConnectionProfile) -> Result<Option<Entry>> {
        let Some(id) = profile.id else {
            return Ok(None);
        };
        let account = match profile.user.as_deref() {
            Some(user) if !user.is_empty() => format!("{id}:{user}"),
            _ => id.to_string(),
        };
        Ok(Some(Entry::new(&self.service, &account)?))
    }
}

impl Default for SecretStore {
    fn default() -> Self {
        Self::new()
    }
}
