use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::{registry::TenantRegistry, Result};

/// Durable copy of the registry.
///
/// `save` overwrites the whole snapshot. There is no partial-write recovery
/// beyond "missing or corrupt file resets to an empty registry".
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn load(&self) -> Result<TenantRegistry>;
    async fn save(&self, registry: &TenantRegistry) -> Result<()>;
}

/// Single JSON state file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PersistenceStore for JsonFileStore {
    async fn load(&self) -> Result<TenantRegistry> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty = TenantRegistry::default();
                self.save(&empty).await?;
                return Ok(empty);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(registry) => Ok(registry),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "state file is corrupt; resetting to an empty registry"
                );
                let empty = TenantRegistry::default();
                self.save(&empty).await?;
                Ok(empty)
            }
        }
    }

    async fn save(&self, registry: &TenantRegistry) -> Result<()> {
        let json = serde_json::to_string_pretty(registry)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
