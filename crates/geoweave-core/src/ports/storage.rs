use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::ProjectDict;

/// Port for persisting the working state between sessions
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Load the last stored project, if any
    async fn load_project(&self) -> Result<Option<ProjectDict>>;

    /// Store the project
    async fn save_project(&self, project: &ProjectDict) -> Result<()>;

    /// Load the stored layout settings, if any
    async fn load_layout_settings(&self) -> Result<Option<Value>>;

    /// Store the layout settings
    async fn save_layout_settings(&self, settings: &Value) -> Result<()>;
}
