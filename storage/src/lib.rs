pub mod secrets;
pub mod settings;

pub use secrets::SecretStore;
pub use settings::{
    JsonSettingsBackend, MemorySettingsBackend, SettingsBackend, SettingsLayer, SettingsScope,
    read_array, write_array,
};
