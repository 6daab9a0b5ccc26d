//! Catalog Stores
//!
//! `YamlCatalog` keeps the command list in a `commands.yaml` file and rewrites
//! the whole document on every change. `MemoryCatalog` holds the same data
//! without persistence.

use super::{CatalogError, CommandCatalog, CommandDefinition};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// On-disk document layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    commands: Vec<CommandDefinition>,
}

type Entries = IndexMap<String, CommandDefinition>;

fn index(commands: Vec<CommandDefinition>) -> Result<Entries, CatalogError> {
    let mut entries = IndexMap::with_capacity(commands.len());
    for def in commands {
        validate_definition(&def)?;
        if entries.contains_key(&def.name) {
            return Err(CatalogError::Duplicate(def.name));
        }
        entries.insert(def.name.clone(), def);
    }
    Ok(entries)
}

fn validate_definition(def: &CommandDefinition) -> Result<(), CatalogError> {
    if def.name.trim().is_empty() {
        return Err(CatalogError::Invalid("command name must not be empty".to_string()));
    }
    if def.raw_template.trim().is_empty() {
        return Err(CatalogError::Invalid(format!(
            "command '{}' has an empty template",
            def.name
        )));
    }
    for param in &def.parameters {
        if param.name.trim().is_empty() {
            return Err(CatalogError::Invalid(format!(
                "command '{}' declares a parameter with an empty name",
                def.name
            )));
        }
    }
    Ok(())
}

/// In-memory catalog
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    entries: Arc<RwLock<Entries>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from definitions, rejecting duplicates
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = CommandDefinition>,
    ) -> Result<Self, CatalogError> {
        let entries = index(definitions.into_iter().collect())?;
        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    pub async fn add(&self, definition: CommandDefinition) -> Result<(), CatalogError> {
        validate_definition(&definition)?;
        let mut entries = self.entries.write().await;
        if entries.contains_key(&definition.name) {
            return Err(CatalogError::Duplicate(definition.name));
        }
        entries.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub async fn remove(&self, name: &str) -> Result<CommandDefinition, CatalogError> {
        self.entries
            .write()
            .await
            .shift_remove(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }
}

#[async_trait]
impl CommandCatalog for MemoryCatalog {
    async fn resolve(&self, name: &str) -> Option<CommandDefinition> {
        self.entries.read().await.get(name).cloned()
    }

    async fn list(&self) -> Vec<CommandDefinition> {
        self.entries.read().await.values().cloned().collect()
    }
}

/// Catalog persisted as a YAML document
///
/// ```yaml
/// commands:
///   - name: say hello
///     command: echo {{name}}
///     params:
///       - name: name
///         type: string
///         required: false
/// ```
#[derive(Debug, Clone)]
pub struct YamlCatalog {
    path: PathBuf,
    entries: Arc<RwLock<Entries>>,
}

impl YamlCatalog {
    /// Open a catalog file; a missing file yields an empty catalog
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let entries = Self::read_entries(&path).await?;
        info!("Loaded {} commands from {:?}", entries.len(), path);
        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn add(&self, definition: CommandDefinition) -> Result<(), CatalogError> {
        validate_definition(&definition)?;
        let mut entries = self.entries.write().await;
        if entries.contains_key(&definition.name) {
            return Err(CatalogError::Duplicate(definition.name));
        }
        let name = definition.name.clone();
        entries.insert(name.clone(), definition);
        if let Err(e) = Self::write_entries(&self.path, &entries).await {
            entries.shift_remove(&name);
            return Err(e);
        }
        info!("Added command '{}' to catalog", name);
        Ok(())
    }

    pub async fn remove(&self, name: &str) -> Result<CommandDefinition, CatalogError> {
        let mut entries = self.entries.write().await;
        let index = entries
            .get_index_of(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        let removed = entries.shift_remove_index(index);
        if let Err(e) = Self::write_entries(&self.path, &entries).await {
            if let Some((key, def)) = removed {
                entries.shift_insert(index, key, def);
            }
            return Err(e);
        }
        info!("Removed command '{}' from catalog", name);
        removed
            .map(|(_, def)| def)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    async fn read_entries(path: &Path) -> Result<Entries, CatalogError> {
        if !tokio::fs::try_exists(path).await? {
            debug!("Catalog file not found at {:?}, starting empty", path);
            return Ok(Entries::new());
        }
        let content = tokio::fs::read_to_string(path).await?;
        if content.trim().is_empty() {
            return Ok(Entries::new());
        }
        let file: CatalogFile = serde_yaml::from_str(&content)?;
        index(file.commands)
    }

    /// Serialize the whole catalog to a sibling temp file, then rename over the original
    async fn write_entries(path: &Path, entries: &Entries) -> Result<(), CatalogError> {
        let file = CatalogFile {
            commands: entries.values().cloned().collect(),
        };
        let yaml = serde_yaml::to_string(&file)?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&tmp, yaml).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl CommandCatalog for YamlCatalog {
    async fn resolve(&self, name: &str) -> Option<CommandDefinition> {
        self.entries.read().await.get(name).cloned()
    }

    async fn list(&self) -> Vec<CommandDefinition> {
        self.entries.read().await.values().cloned().collect()
    }

    /// Re-read the file, replacing the in-memory entries
    ///
    /// A file that fails to parse leaves the current entries in place.
    async fn reload(&self) -> Result<usize, CatalogError> {
        let fresh = Self::read_entries(&self.path).await?;
        let count = fresh.len();
        *self.entries.write().await = fresh;
        info!("Reloaded catalog from {:?} ({} commands)", self.path, count);
        Ok(count)
    }
}
