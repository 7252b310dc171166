use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context as _, bail};
use async_trait::async_trait;
use dbnest_core::Result;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Physical settings layer a record is stored in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SettingsLayer {
    Global,
    Workspace,
    WorkspaceFolder,
}

/// Logical scope callers address. Workspace reads merge the workspace and
/// workspace-folder layers; workspace writes land in the workspace layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsScope {
    Global,
    Workspace,
}

#[async_trait]
pub trait SettingsBackend: Send + Sync {
    async fn read_layer(&self, section: &str, layer: SettingsLayer) -> Result<Option<Value>>;
    async fn write_layer(&self, section: &str, layer: SettingsLayer, value: Value) -> Result<()>;
}

pub async fn read_array<T>(
    backend: &dyn SettingsBackend,
    section: &str,
    scope: SettingsScope,
) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    match scope {
        SettingsScope::Global => layer_array(backend, section, SettingsLayer::Global).await,
        SettingsScope::Workspace => {
            let mut items = layer_array(backend, section, SettingsLayer::Workspace).await?;
            items.extend(layer_array(backend, section, SettingsLayer::WorkspaceFolder).await?);
            Ok(items)
        }
    }
}

pub async fn write_array<T>(
    backend: &dyn SettingsBackend,
    section: &str,
    items: &[T],
    scope: SettingsScope,
) -> Result<()>
where
    T: Serialize,
{
    let layer = match scope {
        SettingsScope::Global => SettingsLayer::Global,
        SettingsScope::Workspace => SettingsLayer::Workspace,
    };
    let value = serde_json::to_value(items)
        .with_context(|| format!("Failed to serialize settings section {section}"))?;
    backend.write_layer(section, layer, value).await
}

async fn layer_array<T>(
    backend: &dyn SettingsBackend,
    section: &str,
    layer: SettingsLayer,
) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    match backend.read_layer(section, layer).await? {
        Some(value) => serde_json::from_value(value)
            .with_context(|| format!("Malformed settings section {section} in {layer:?}")),
        None => Ok(Vec::new()),
    }
}

/// Settings stored as one JSON object file per layer. The global file always
/// exists conceptually; workspace layers are present only when the host opened
/// a workspace.
#[derive(Clone, Debug)]
pub struct JsonSettingsBackend {
    global_path: PathBuf,
    workspace_path: Option<PathBuf>,
    folder_path: Option<PathBuf>,
}

impl JsonSettingsBackend {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            global_path: config_dir.join("settings.json"),
            workspace_path: None,
            folder_path: None,
        }
    }

    pub fn with_workspace(mut self, path: PathBuf) -> Self {
        self.workspace_path = Some(path);
        self
    }

    pub fn with_workspace_folder(mut self, path: PathBuf) -> Self {
        self.folder_path = Some(path);
        self
    }

    fn layer_path(&self, layer: SettingsLayer) -> Option<&Path> {
        match layer {
            SettingsLayer::Global => Some(&self.global_path),
            SettingsLayer::Workspace => self.workspace_path.as_deref(),
            SettingsLayer::WorkspaceFolder => self.folder_path.as_deref(),
        }
    }
}

#[async_trait]
impl SettingsBackend for JsonSettingsBackend {
    async fn read_layer(&self, section: &str, layer: SettingsLayer) -> Result<Option<Value>> {
        let Some(path) = self.layer_path(layer) else {
            return Ok(None);
        };
        let mut sections = load_sections(path).await?;
        Ok(sections.remove(section))
    }

    async fn write_layer(&self, section: &str, layer: SettingsLayer, value: Value) -> Result<()> {
        let Some(path) = self.layer_path(layer) else {
            bail!("Settings layer {layer:?} is not available in this session");
        };
        let mut sections = load_sections(path).await?;
        sections.insert(section.to_owned(), value);
        let serialized = serde_json::to_string_pretty(&Value::Object(sections))?;
        tokio::fs::write(path, serialized)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

async fn load_sections(path: &Path) -> Result<Map<String, Value>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let sections: Map<String, Value> = serde_json::from_str(&contents)
                .with_context(|| format!("Malformed settings file {}", path.display()))?;
            Ok(sections)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
        Err(err) => Err(err.into()),
    }
}

/// In-memory backend for tests and single-process hosts.
#[derive(Default)]
pub struct MemorySettingsBackend {
    layers: Mutex<HashMap<(SettingsLayer, String), Value>>,
}

impl MemorySettingsBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsBackend for MemorySettingsBackend {
    async fn read_layer(&self, section: &str, layer: SettingsLayer) -> Result<Option<Value>> {
        let layers = self.layers.lock().expect("settings lock poisoned");
        Ok(layers.get(&(layer, section.to_owned())).cloned())
    }

    async fn write_layer(&self, section: &str, layer: SettingsLayer, value: Value) -> Result<()> {
        let mut layers = self.layers.lock().expect("settings lock poisoned");
        layers.insert((layer, section.to_owned()), value);
        Ok(())
    }
}
