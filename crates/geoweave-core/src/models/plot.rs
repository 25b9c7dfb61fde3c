use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::workflow::WorkflowId;

static NEXT_PLOT_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlotId(pub u64);

impl PlotId {
    pub fn next() -> Self {
        Self(NEXT_PLOT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub id: PlotId,
    pub name: String,
    pub workflow_id: WorkflowId,
}

/// Stored form of a plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotDict {
    pub workflow: WorkflowId,
    pub name: String,
}

impl Plot {
    pub fn new(name: impl Into<String>, workflow_id: WorkflowId) -> Self {
        Self {
            id: PlotId::next(),
            name: name.into(),
            workflow_id,
        }
    }

    pub fn to_dict(&self) -> PlotDict {
        PlotDict {
            workflow: self.workflow_id,
            name: self.name.clone(),
        }
    }

    pub fn from_dict(dict: PlotDict) -> Self {
        Self::new(dict.name, dict.workflow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotOutputFormat {
    JsonPlain,
    JsonVega,
    ImagePng,
}

/// Computed plot output as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotData {
    pub plot_type: String,
    pub output_format: PlotOutputFormat,
    pub data: serde_json::Value,
}
