//! Command Catalog
//!
//! The registry mapping command names to their definitions. The execution
//! pipeline only reads from it through [`CommandCatalog`]; adding and removing
//! entries happens on the concrete stores.

mod model;
mod store;

pub use model::{CommandDefinition, ParamKind, ParameterSpec};
pub use store::{MemoryCatalog, YamlCatalog};

use async_trait::async_trait;

/// Error types for catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Command '{0}' not found in catalog")]
    NotFound(String),

    #[error("Command '{0}' already exists in catalog")]
    Duplicate(String),

    #[error("Invalid command definition: {0}")]
    Invalid(String),

    #[error("Catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog format error: {0}")]
    Format(#[from] serde_yaml::Error),
}

/// Read access to command definitions
#[async_trait]
pub trait CommandCatalog: Send + Sync {
    /// Look up a definition by exact name
    async fn resolve(&self, name: &str) -> Option<CommandDefinition>;

    /// All definitions in catalog order
    async fn list(&self) -> Vec<CommandDefinition>;

    /// Re-read the backing store, returning the number of definitions
    ///
    /// Stores without external state have nothing to re-read.
    async fn reload(&self) -> Result<usize, CatalogError> {
        Ok(self.list().await.len())
    }
}
