//! Storage provider persisting the project on the backend.

use async_trait::async_trait;
use geoweave_core::error::Result;
use geoweave_core::models::{ProjectDict, ProjectId, ProjectUpdate};
use geoweave_core::ports::{Backend, SessionTokenProvider, StorageProvider};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};

/// Loads the session's last project from the backend and writes every save back to it.
///
/// Layout settings have no backend representation and are kept in memory.
pub struct BackendStorageProvider {
    backend: Arc<dyn Backend>,
    session: Arc<dyn SessionTokenProvider>,
    project_id: Option<ProjectId>,
    layout: RwLock<Option<Value>>,
}

impl BackendStorageProvider {
    pub fn new(
        backend: Arc<dyn Backend>,
        session: Arc<dyn SessionTokenProvider>,
        project_id: Option<ProjectId>,
    ) -> Self {
        Self {
            backend,
            session,
            project_id,
            layout: RwLock::new(None),
        }
    }
}

#[async_trait]
impl StorageProvider for BackendStorageProvider {
    async fn load_project(&self) -> Result<Option<ProjectDict>> {
        let Some(id) = self.project_id else {
            return Ok(None);
        };
        let token = self.session.session_token_for_request().await?;
        Ok(Some(self.backend.load_project(id, &token).await?))
    }

    async fn save_project(&self, project: &ProjectDict) -> Result<()> {
        let token = self.session.session_token_for_request().await?;
        self.backend
            .update_project(&ProjectUpdate::full(project.clone()), &token)
            .await?;
        self.backend.set_session_project(project.id, &token).await
    }

    async fn load_layout_settings(&self) -> Result<Option<Value>> {
        Ok(self
            .layout
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save_layout_settings(&self, settings: &Value) -> Result<()> {
        *self.layout.write().unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
        Ok(())
    }
}
