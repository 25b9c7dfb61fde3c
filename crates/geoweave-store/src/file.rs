//! Storage provider keeping the working state as JSON files in a directory.

use async_trait::async_trait;
use geoweave_core::error::{GeoweaveError, Result};
use geoweave_core::models::ProjectDict;
use geoweave_core::ports::StorageProvider;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const PROJECT_FILE: &str = "project.json";
const LAYOUT_FILE: &str = "layout.json";

#[derive(Debug, Clone)]
pub struct FileStorageProvider {
    directory: PathBuf,
}

impl FileStorageProvider {
    /// Create a provider storing its files in `directory`; the directory is created on first save
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn read_json(&self, file: &str) -> Result<Option<Value>> {
        let path = self.directory.join(file);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GeoweaveError::Io(e)),
        }
    }

    /// Write via a temporary file so readers never see a partial document
    async fn write_json(&self, file: &str, value: &Value) -> Result<()> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.directory.join(file);
        let temporary = self.directory.join(format!("{}.tmp", file));
        tokio::fs::write(&temporary, serde_json::to_vec_pretty(value)?).await?;
        tokio::fs::rename(&temporary, &path).await?;
        tracing::debug!(path = %path.display(), "Stored state file");
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for FileStorageProvider {
    async fn load_project(&self) -> Result<Option<ProjectDict>> {
        match self.read_json(PROJECT_FILE).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn save_project(&self, project: &ProjectDict) -> Result<()> {
        self.write_json(PROJECT_FILE, &serde_json::to_value(project)?)
            .await
    }

    async fn load_layout_settings(&self) -> Result<Option<Value>> {
        self.read_json(LAYOUT_FILE).await
    }

    async fn save_layout_settings(&self, settings: &Value) -> Result<()> {
        self.write_json(LAYOUT_FILE, settings).await
    }
}
