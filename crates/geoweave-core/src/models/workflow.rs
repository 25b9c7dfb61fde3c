//! Workflows, operator trees, result descriptors and provenance.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::spatial::{BoundingBox2D, SpatialReference};
use super::time::TimeInterval;
use crate::error::{GeoweaveError, Result};

/// Backend-assigned id of a registered workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowKind {
    Raster,
    Vector,
    Plot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(rename = "type")]
    pub kind: WorkflowKind,
    pub operator: Operator,
}

impl Workflow {
    pub fn new(kind: WorkflowKind, operator: Operator) -> Self {
        Self { kind, operator }
    }

    /// Serialized form used to recognize identical workflows
    pub fn content_key(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One node of an operator tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    #[serde(rename = "type")]
    pub operator_type: String,
    #[serde(default)]
    pub params: Option<IndexMap<String, Value>>,
    #[serde(default)]
    pub sources: IndexMap<String, SourceSlot>,
}

/// The content of a named source slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSlot {
    Single(Box<Operator>),
    Many(Vec<Operator>),
    Empty,
}

impl SourceSlot {
    /// The operators in this slot, a single source treated as a one-element list
    pub fn operators(&self) -> Vec<&Operator> {
        match self {
            Self::Single(operator) => vec![operator.as_ref()],
            Self::Many(operators) => operators.iter().collect(),
            Self::Empty => Vec::new(),
        }
    }
}

impl Operator {
    pub fn new(operator_type: impl Into<String>) -> Self {
        Self {
            operator_type: operator_type.into(),
            params: None,
            sources: IndexMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value);
        self
    }

    pub fn with_source(mut self, slot: impl Into<String>, source: Operator) -> Self {
        self.sources
            .insert(slot.into(), SourceSlot::Single(Box::new(source)));
        self
    }

    pub fn with_sources(mut self, slot: impl Into<String>, sources: Vec<Operator>) -> Self {
        self.sources.insert(slot.into(), SourceSlot::Many(sources));
        self
    }

    /// Wrap `source` so its output is projected into `target`
    pub fn reprojection(target: &SpatialReference, source: Operator) -> Self {
        Self::new("Reprojection")
            .with_param(
                "targetSpatialReference",
                Value::String(target.srs_string()),
            )
            .with_source("source", source)
    }

    /// Decode an operator tree, reporting the JSON path of the first malformed node
    pub fn from_value(value: &Value) -> Result<Self> {
        decode_operator(value, "$")
    }
}

fn malformed(path: &str, reason: impl Into<String>) -> GeoweaveError {
    GeoweaveError::MalformedWorkflow {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn decode_operator(value: &Value, path: &str) -> Result<Operator> {
    let object = value
        .as_object()
        .ok_or_else(|| malformed(path, "operator must be an object"))?;

    let operator_type = match object.get("type") {
        Some(Value::String(operator_type)) if !operator_type.is_empty() => operator_type.clone(),
        Some(_) => return Err(malformed(path, "`type` must be a non-empty string")),
        None => return Err(malformed(path, "missing `type`")),
    };

    let params = match object.get("params") {
        None | Some(Value::Null) => None,
        Some(Value::Object(params)) => Some(
            params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<IndexMap<_, _>>(),
        ),
        Some(_) => return Err(malformed(path, "`params` must be an object or null")),
    };

    let mut sources = IndexMap::new();
    match object.get("sources") {
        None | Some(Value::Null) => {}
        Some(Value::Object(slots)) => {
            for (slot, content) in slots {
                let slot_path = format!("{}.sources.{}", path, slot);
                let decoded = match content {
                    Value::Null => SourceSlot::Empty,
                    Value::Array(items) => SourceSlot::Many(
                        items
                            .iter()
                            .enumerate()
                            .map(|(i, item)| decode_operator(item, &format!("{}[{}]", slot_path, i)))
                            .collect::<Result<Vec<_>>>()?,
                    ),
                    Value::Object(_) => {
                        SourceSlot::Single(Box::new(decode_operator(content, &slot_path)?))
                    }
                    _ => {
                        return Err(malformed(
                            &slot_path,
                            "source must be an operator, a list of operators or null",
                        ))
                    }
                };
                sources.insert(slot.clone(), decoded);
            }
        }
        Some(_) => return Err(malformed(path, "`sources` must be an object")),
    }

    Ok(Operator {
        operator_type,
        params,
        sources,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialResolution {
    pub x: f64,
    pub y: f64,
}

/// Describes the output of a workflow, discriminated by the `type` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ResultDescriptor {
    Raster {
        data_type: String,
        spatial_reference: SpatialReference,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<TimeInterval>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bbox: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resolution: Option<SpatialResolution>,
        #[serde(default)]
        bands: Vec<Value>,
    },
    Vector {
        data_type: String,
        spatial_reference: SpatialReference,
        #[serde(default)]
        columns: IndexMap<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<TimeInterval>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bbox: Option<BoundingBox2D>,
    },
    Plot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spatial_reference: Option<SpatialReference>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<TimeInterval>,
    },
}

impl ResultDescriptor {
    pub fn spatial_reference(&self) -> Option<&SpatialReference> {
        match self {
            Self::Raster {
                spatial_reference, ..
            }
            | Self::Vector {
                spatial_reference, ..
            } => Some(spatial_reference),
            Self::Plot {
                spatial_reference, ..
            } => spatial_reference.as_ref(),
        }
    }

    pub fn time(&self) -> Option<TimeInterval> {
        match self {
            Self::Raster { time, .. } | Self::Vector { time, .. } | Self::Plot { time, .. } => *time,
        }
    }

    pub fn kind(&self) -> WorkflowKind {
        match self {
            Self::Raster { .. } => WorkflowKind::Raster,
            Self::Vector { .. } => WorkflowKind::Vector,
            Self::Plot { .. } => WorkflowKind::Plot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub citation: String,
    pub license: String,
    pub uri: String,
}

/// A provenance record and the data it applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub provenance: Provenance,
    #[serde(default)]
    pub data: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sources_keep_wire_order() {
        let value = json!({
            "type": "Expression",
            "params": {"expression": "A + B"},
            "sources": {
                "z": {"type": "GdalSource", "params": {"data": "z"}},
                "a": [{"type": "GdalSource", "params": {"data": "a"}}],
                "m": null
            }
        });
        let operator = Operator::from_value(&value).unwrap();
        let slots: Vec<&str> = operator.sources.keys().map(String::as_str).collect();
        assert_eq!(slots, vec!["z", "a", "m"]);
        assert_eq!(operator.sources["m"], SourceSlot::Empty);
        assert_eq!(operator.sources["a"].operators().len(), 1);
    }

    #[test]
    fn test_malformed_operator_reports_path() {
        let value = json!({
            "type": "Expression",
            "sources": {"raster": [{"params": {}}]}
        });
        match Operator::from_value(&value) {
            Err(GeoweaveError::MalformedWorkflow { path, .. }) => {
                assert_eq!(path, "$.sources.raster[0]");
            }
            other => panic!("expected malformed workflow, got {:?}", other),
        }
    }

    #[test]
    fn test_serde_decoding_matches_manual_decoding() {
        let value = json!({
            "type": "Reprojection",
            "params": {"targetSpatialReference": "EPSG:4326"},
            "sources": {"source": {"type": "OgrSource", "params": {"data": "ports"}}}
        });
        let manual = Operator::from_value(&value).unwrap();
        let derived: Operator = serde_json::from_value(value).unwrap();
        assert_eq!(manual, derived);
    }

    #[test]
    fn test_result_descriptor_tag() {
        let descriptor: ResultDescriptor = serde_json::from_value(json!({
            "type": "vector",
            "dataType": "MultiPoint",
            "spatialReference": "EPSG:4326",
            "columns": {}
        }))
        .unwrap();
        assert_eq!(descriptor.kind(), WorkflowKind::Vector);
        assert_eq!(descriptor.spatial_reference(), Some(&SpatialReference::wgs84()));
    }
}
