//! Layers of a project.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::project::{LayerVisibility, ProjectLayerDict};
use super::symbology::Symbology;
use super::workflow::WorkflowId;

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(0);

/// Process-local layer identity, unique for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u64);

impl LayerId {
    pub fn next() -> Self {
        Self(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Raster,
    Vector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub workflow_id: WorkflowId,
    pub symbology: Symbology,
    pub is_visible: bool,
    pub is_legend_visible: bool,
}

/// Partial update of a layer; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerChanges {
    pub name: Option<String>,
    pub workflow_id: Option<WorkflowId>,
    pub symbology: Option<Symbology>,
    pub is_visible: Option<bool>,
    pub is_legend_visible: Option<bool>,
}

impl LayerChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.workflow_id.is_none()
            && self.symbology.is_none()
            && self.is_visible.is_none()
            && self.is_legend_visible.is_none()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn symbology(mut self, symbology: Symbology) -> Self {
        self.symbology = Some(symbology);
        self
    }

    pub fn visible(mut self, is_visible: bool) -> Self {
        self.is_visible = Some(is_visible);
        self
    }

    pub fn legend_visible(mut self, is_legend_visible: bool) -> Self {
        self.is_legend_visible = Some(is_legend_visible);
        self
    }
}

impl Layer {
    /// Create a visible layer with a fresh id and a hidden legend
    pub fn new(name: impl Into<String>, workflow_id: WorkflowId, symbology: Symbology) -> Self {
        Self {
            id: LayerId::next(),
            name: name.into(),
            workflow_id,
            symbology,
            is_visible: true,
            is_legend_visible: false,
        }
    }

    pub fn kind(&self) -> LayerKind {
        if self.symbology.is_raster() {
            LayerKind::Raster
        } else {
            LayerKind::Vector
        }
    }

    /// A new layer value with the given changes applied; the id is kept
    pub fn update_fields(&self, changes: LayerChanges) -> Self {
        Self {
            id: self.id,
            name: changes.name.unwrap_or_else(|| self.name.clone()),
            workflow_id: changes.workflow_id.unwrap_or(self.workflow_id),
            symbology: changes.symbology.unwrap_or_else(|| self.symbology.clone()),
            is_visible: changes.is_visible.unwrap_or(self.is_visible),
            is_legend_visible: changes.is_legend_visible.unwrap_or(self.is_legend_visible),
        }
    }

    pub fn to_dict(&self) -> ProjectLayerDict {
        ProjectLayerDict {
            workflow: self.workflow_id,
            name: self.name.clone(),
            visibility: LayerVisibility {
                data: self.is_visible,
                legend: self.is_legend_visible,
            },
            symbology: self.symbology.clone(),
        }
    }

    /// Build a layer from its stored form, assigning a fresh id
    pub fn from_dict(dict: ProjectLayerDict) -> Self {
        Self {
            id: LayerId::next(),
            name: dict.name,
            workflow_id: dict.workflow,
            symbology: dict.symbology,
            is_visible: dict.visibility.data,
            is_legend_visible: dict.visibility.legend,
        }
    }
}
