//! Error types for Geoweave

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoweaveError {
    // Validation errors
    #[error("Invalid time interval: end {end} is before start {start}")]
    InvalidTimeInterval { start: String, end: String },

    #[error("The layer detail view height percentage must be between 0 and 1, got {value}")]
    InvalidHeightPercentage { value: f64 },

    #[error("Invalid bounding box: {reason}")]
    InvalidBoundingBox { reason: String },

    #[error("Invalid spatial reference '{value}': expected AUTHORITY:CODE")]
    InvalidSpatialReference { value: String },

    // State errors
    #[error("No project is active yet")]
    NoActiveProject,

    #[error("Layer not found: {id}")]
    LayerNotFound { id: u64 },

    #[error("Plot not found: {id}")]
    PlotNotFound { id: u64 },

    // Backend errors
    #[error("Backend request '{operation}' failed: {reason}")]
    Backend { operation: String, reason: String },

    #[error("Backend rejected the session token for '{operation}'")]
    Unauthorized { operation: String },

    // Workflow errors
    #[error("Malformed workflow at {path}: {reason}")]
    MalformedWorkflow { path: String, reason: String },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GeoweaveError {
    /// Shorthand for a failed backend call
    pub fn backend(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Backend {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error originates from the remote backend
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::Unauthorized { .. })
    }
}

impl From<serde_json::Error> for GeoweaveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeoweaveError>;
