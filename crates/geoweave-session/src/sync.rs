//! Debounced persistence of the active project and the layout settings.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use geoweave_core::error::Result;
use geoweave_core::models::Project;
use geoweave_core::ports::StorageProvider;
use geoweave_core::reactive::Subject;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::layout::{LayoutService, LayoutSettings};
use crate::project::ProjectService;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStatus {
    /// Stored state is still being loaded
    Pending,
    Ok,
}

pub struct StorageSync {
    project_service: Arc<ProjectService>,
    layout_service: Arc<LayoutService>,
    provider: Arc<dyn StorageProvider>,
    debounce: Duration,
    status: Subject<StorageStatus>,
    pending: Arc<Mutex<Option<Project>>>,
    /// The project as last read from or written to the provider
    stored: Arc<Mutex<Option<Project>>>,
    pending_layout: Arc<Mutex<Option<LayoutSettings>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl StorageSync {
    /// Restore the stored project and layout, then keep saving changes
    pub async fn start(
        project_service: Arc<ProjectService>,
        layout_service: Arc<LayoutService>,
        provider: Arc<dyn StorageProvider>,
        debounce: Duration,
    ) -> Result<Self> {
        let sync = Self {
            project_service,
            layout_service,
            provider,
            debounce,
            status: Subject::new(StorageStatus::Pending),
            pending: Arc::new(Mutex::new(None)),
            stored: Arc::new(Mutex::new(None)),
            pending_layout: Arc::new(Mutex::new(None)),
            tasks: Mutex::new(Vec::new()),
        };
        sync.restore().await?;
        Ok(sync)
    }

    async fn restore(&self) -> Result<()> {
        self.status.next(StorageStatus::Pending);

        let stored = match self.provider.load_project().await? {
            Some(dict) => {
                info!(project = %dict.id, "Restoring stored project");
                self.project_service
                    .set_project(Project::from_dict(dict))
                    .await;
                self.project_service.project_once().ok()
            }
            None => {
                self.project_service.load_most_recent_project().await?;
                None
            }
        };
        *lock(&self.stored) = stored;

        if let Some(settings) = self.provider.load_layout_settings().await? {
            self.layout_service.apply_layout_settings(&settings);
        }

        let project_task = tokio::spawn(save_projects(
            self.project_service.project_stream(),
            Arc::clone(&self.provider),
            Arc::clone(&self.pending),
            Arc::clone(&self.stored),
            self.debounce,
        ));
        let layout_task = tokio::spawn(save_layout(
            self.layout_service.layout_settings_stream(),
            Arc::clone(&self.provider),
            Arc::clone(&self.pending_layout),
            self.debounce,
        ));
        lock(&self.tasks).extend([project_task, layout_task]);

        self.status.next(StorageStatus::Ok);
        Ok(())
    }

    pub fn status(&self) -> StorageStatus {
        self.status.get().unwrap_or(StorageStatus::Pending)
    }

    pub fn status_stream(&self) -> BoxStream<'static, StorageStatus> {
        self.status.select(|status| *status)
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.pending).is_some()
            || lock(&self.pending_layout).is_some()
            || self.unstored_project().is_some()
    }

    /// The current project if it differs from the stored one
    fn unstored_project(&self) -> Option<Project> {
        let current = self.project_service.project_once().ok()?;
        (lock(&self.stored).as_ref() != Some(&current)).then_some(current)
    }

    /// Save the project and layout settings still waiting for their debounce.
    ///
    /// A project that was never stored counts as pending. Each write is bounded
    /// by the debounce interval. Returns whether anything was saved.
    pub async fn flush_pending(&self) -> bool {
        lock(&self.pending).take();
        let project = self.unstored_project();
        let layout = lock(&self.pending_layout).take();
        let mut flushed = false;

        if let Some(project) = project {
            let dict = project.to_dict();
            match tokio::time::timeout(self.debounce, self.provider.save_project(&dict)).await {
                Ok(Ok(())) => {
                    info!(project = %dict.id, "Flushed pending project");
                    *lock(&self.stored) = Some(project);
                    flushed = true;
                }
                Ok(Err(e)) => warn!(project = %dict.id, "Could not flush pending project: {}", e),
                Err(_) => warn!(project = %dict.id, "Flushing pending project timed out"),
            }
        }

        if let Some(layout) = layout {
            match tokio::time::timeout(self.debounce, save_layout_settings(&*self.provider, layout))
                .await
            {
                Ok(true) => {
                    info!("Flushed pending layout settings");
                    flushed = true;
                }
                Ok(false) => {}
                Err(_) => warn!("Flushing pending layout settings timed out"),
            }
        }

        flushed
    }

    /// Flush, stop syncing and restore again, e.g. after the session changed
    pub async fn reset(&self) -> Result<()> {
        self.flush_pending().await;
        self.stop();
        self.restore().await
    }

    fn stop(&self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }
}

impl Drop for StorageSync {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn save_projects(
    mut projects: BoxStream<'static, Project>,
    provider: Arc<dyn StorageProvider>,
    pending: Arc<Mutex<Option<Project>>>,
    stored: Arc<Mutex<Option<Project>>>,
    debounce: Duration,
) {
    // the first emission is the restored project
    if projects.next().await.is_none() {
        return;
    }

    loop {
        let waiting = lock(&pending).is_some();
        tokio::select! {
            next = projects.next() => match next {
                Some(project) => {
                    debug!(project = %project.id, "Project save pending");
                    *lock(&pending) = Some(project);
                }
                None => break,
            },
            _ = tokio::time::sleep(debounce), if waiting => {
                let Some(project) = lock(&pending).take() else {
                    continue;
                };
                let dict = project.to_dict();
                match provider.save_project(&dict).await {
                    Ok(()) => {
                        info!(project = %dict.id, "Saved project");
                        *lock(&stored) = Some(project);
                    }
                    Err(e) => warn!(project = %dict.id, "Could not save project: {}", e),
                }
            }
        }
    }
}

async fn save_layout(
    mut settings: BoxStream<'static, LayoutSettings>,
    provider: Arc<dyn StorageProvider>,
    pending: Arc<Mutex<Option<LayoutSettings>>>,
    debounce: Duration,
) {
    if settings.next().await.is_none() {
        return;
    }

    loop {
        let waiting = lock(&pending).is_some();
        tokio::select! {
            next = settings.next() => match next {
                Some(next) => *lock(&pending) = Some(next),
                None => break,
            },
            _ = tokio::time::sleep(debounce), if waiting => {
                let Some(layout) = lock(&pending).take() else {
                    continue;
                };
                save_layout_settings(&*provider, layout).await;
            }
        }
    }
}

/// Encode and save layout settings; returns whether they were saved
async fn save_layout_settings(provider: &dyn StorageProvider, layout: LayoutSettings) -> bool {
    let value = match serde_json::to_value(layout) {
        Ok(value) => value,
        Err(e) => {
            warn!("Could not encode layout settings: {}", e);
            return false;
        }
    };
    match provider.save_layout_settings(&value).await {
        Ok(()) => {
            debug!("Saved layout settings");
            true
        }
        Err(e) => {
            warn!("Could not save layout settings: {}", e);
            false
        }
    }
}
