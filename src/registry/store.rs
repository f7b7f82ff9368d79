//! File-backed registry of desired services.
//!
//! The whole registry is one JSON array. Every write stages the complete new
//! snapshot next to the target and renames it into place, so a reader sees
//! either the old file or the new one, never a torn write.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::observability::metrics;
use crate::registry::descriptor::ServiceDescriptor;

/// Errors from reading or writing the registry file.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry file {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Durable store of [`ServiceDescriptor`]s keyed by name.
#[derive(Debug)]
pub struct RegistryStore {
    path: PathBuf,
    // Guards the file: loads share, load-modify-save sequences are exclusive.
    lock: RwLock<()>,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored services, in insertion order. A missing file is an empty registry.
    pub async fn load(&self) -> RegistryResult<Vec<ServiceDescriptor>> {
        let _guard = self.lock.read().await;
        self.read_snapshot().await
    }

    /// The stored service called `name`, if any.
    pub async fn get(&self, name: &str) -> RegistryResult<Option<ServiceDescriptor>> {
        Ok(self.load().await?.into_iter().find(|s| s.name == name))
    }

    /// Insert `service`, or replace the stored record with the same name.
    pub async fn upsert(&self, service: ServiceDescriptor) -> RegistryResult<()> {
        let _guard = self.lock.write().await;
        let mut services = self.read_snapshot().await?;

        match services.iter_mut().find(|s| s.name == service.name) {
            Some(existing) => *existing = service,
            None => services.push(service),
        }

        self.write_snapshot(&services).await
    }

    /// Remove the service called `name`. Returns whether it was present.
    pub async fn delete(&self, name: &str) -> RegistryResult<bool> {
        let _guard = self.lock.write().await;
        let mut services = self.read_snapshot().await?;

        let before = services.len();
        services.retain(|s| s.name != name);
        if services.len() == before {
            return Ok(false);
        }

        self.write_snapshot(&services).await?;
        Ok(true)
    }

    async fn read_snapshot(&self) -> RegistryResult<Vec<ServiceDescriptor>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&data).map_err(|source| RegistryError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_snapshot(&self, services: &[ServiceDescriptor]) -> RegistryResult<()> {
        let data = serde_json::to_vec_pretty(services).map_err(|source| RegistryError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let staging = self.staging_path();
        if let Err(e) = write_synced(&staging, &data).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(self.io_error(e));
        }
        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(self.io_error(e));
        }

        metrics::record_registry_size(services.len());
        tracing::debug!(path = %self.path.display(), services = services.len(), "Registry saved");
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "services.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> RegistryError {
        RegistryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}
