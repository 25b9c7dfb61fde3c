//! The project: the spatial, temporal and layer configuration a user works in.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use super::layer::Layer;
use super::plot::{Plot, PlotDict};
use super::spatial::{BoundingBox2D, SpatialReference};
use super::symbology::Symbology;
use super::time::{TimeInterval, TimeStep};
use super::workflow::WorkflowId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectVersion {
    pub id: Uuid,
    pub changed: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerVisibility {
    pub data: bool,
    pub legend: bool,
}

/// Stored form of a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectLayerDict {
    pub workflow: WorkflowId,
    pub name: String,
    pub visibility: LayerVisibility,
    pub symbology: Symbology,
}

/// Spatial reference, extent and time of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBounds {
    pub spatial_reference: SpatialReference,
    pub bounding_box: BoundingBox2D,
    pub time_interval: TimeInterval,
}

/// Stored form of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDict {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ProjectVersion>,
    pub bounds: ProjectBounds,
    #[serde(default)]
    pub layers: Vec<ProjectLayerDict>,
    #[serde(default)]
    pub plots: Vec<PlotDict>,
    pub time_step: TimeStep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub spatial_reference: SpatialReference,
    pub time: TimeInterval,
    pub bbox: BoundingBox2D,
    pub layers: Vec<Layer>,
    pub plots: Vec<Plot>,
    pub time_step: TimeStep,
    pub version: Option<ProjectVersion>,
}

/// Partial update of a project; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub spatial_reference: Option<SpatialReference>,
    pub time: Option<TimeInterval>,
    pub bbox: Option<BoundingBox2D>,
    pub layers: Option<Vec<Layer>>,
    pub plots: Option<Vec<Plot>>,
    pub time_step: Option<TimeStep>,
}

impl ProjectChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.spatial_reference.is_none()
            && self.time.is_none()
            && self.bbox.is_none()
            && self.layers.is_none()
            && self.plots.is_none()
            && self.time_step.is_none()
    }

    fn touches_bounds(&self) -> bool {
        self.spatial_reference.is_some() || self.time.is_some() || self.bbox.is_some()
    }
}

impl Project {
    /// A new project value with the given changes applied
    pub fn update_fields(&self, changes: ProjectChanges) -> Self {
        Self {
            id: self.id,
            name: changes.name.unwrap_or_else(|| self.name.clone()),
            description: changes
                .description
                .unwrap_or_else(|| self.description.clone()),
            spatial_reference: changes
                .spatial_reference
                .unwrap_or_else(|| self.spatial_reference.clone()),
            time: changes.time.unwrap_or(self.time),
            bbox: changes.bbox.unwrap_or(self.bbox),
            layers: changes.layers.unwrap_or_else(|| self.layers.clone()),
            plots: changes.plots.unwrap_or_else(|| self.plots.clone()),
            time_step: changes.time_step.unwrap_or(self.time_step),
            version: self.version.clone(),
        }
    }

    pub fn layer(&self, id: super::layer::LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn bounds(&self) -> ProjectBounds {
        ProjectBounds {
            spatial_reference: self.spatial_reference.clone(),
            bounding_box: self.bbox,
            time_interval: self.time,
        }
    }

    pub fn to_dict(&self) -> ProjectDict {
        ProjectDict {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.version.clone(),
            bounds: self.bounds(),
            layers: self.layers.iter().map(Layer::to_dict).collect(),
            plots: self.plots.iter().map(Plot::to_dict).collect(),
            time_step: self.time_step,
        }
    }

    /// Build a project from its stored form; layers and plots get fresh ids
    pub fn from_dict(dict: ProjectDict) -> Self {
        Self {
            id: dict.id,
            name: dict.name,
            description: dict.description,
            spatial_reference: dict.bounds.spatial_reference,
            time: dict.bounds.time_interval,
            bbox: dict.bounds.bounding_box,
            layers: dict.layers.into_iter().map(Layer::from_dict).collect(),
            plots: dict.plots.into_iter().map(Plot::from_dict).collect(),
            time_step: dict.time_step,
            version: dict.version,
        }
    }
}

/// Per-index update of a list on the backend
#[derive(Debug, Clone, PartialEq)]
pub enum VecUpdate<T> {
    /// Keep the element at this index
    None,
    Delete,
    Content(T),
}

impl<T: Serialize> Serialize for VecUpdate<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_str("none"),
            Self::Delete => serializer.serialize_str("delete"),
            Self::Content(content) => content.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for VecUpdate<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value.as_str() {
            Some("none") => Ok(Self::None),
            Some("delete") => Ok(Self::Delete),
            _ => serde_json::from_value(value)
                .map(Self::Content)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Encode the new list against the old one; unchanged slots become `None`
pub fn optimize_vec_updates<T, D>(
    old: &[T],
    new: &[T],
    to_dict: impl Fn(&T) -> D,
) -> Vec<VecUpdate<D>>
where
    T: PartialEq,
{
    new.iter()
        .enumerate()
        .map(|(i, item)| match old.get(i) {
            Some(previous) if previous == item => VecUpdate::None,
            _ => VecUpdate::Content(to_dict(item)),
        })
        .collect()
}

/// Partial project update sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    pub id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<VecUpdate<ProjectLayerDict>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plots: Option<Vec<VecUpdate<PlotDict>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<ProjectBounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_step: Option<TimeStep>,
}

impl ProjectUpdate {
    /// Describe the transition `old -> new` caused by `changes`
    pub fn from_changes(old: &Project, new: &Project, changes: &ProjectChanges) -> Self {
        Self {
            id: new.id,
            name: changes.name.clone(),
            description: changes.description.clone(),
            layers: changes
                .layers
                .as_ref()
                .map(|_| optimize_vec_updates(&old.layers, &new.layers, Layer::to_dict)),
            plots: changes
                .plots
                .as_ref()
                .map(|_| optimize_vec_updates(&old.plots, &new.plots, Plot::to_dict)),
            bounds: changes.touches_bounds().then(|| new.bounds()),
            time_step: changes.time_step,
        }
    }

    /// An update that overwrites every field of the stored project
    pub fn full(dict: ProjectDict) -> Self {
        Self {
            id: dict.id,
            name: Some(dict.name),
            description: Some(dict.description),
            layers: Some(dict.layers.into_iter().map(VecUpdate::Content).collect()),
            plots: Some(dict.plots.into_iter().map(VecUpdate::Content).collect()),
            bounds: Some(dict.bounds),
            time_step: Some(dict.time_step),
        }
    }

    /// Apply this update to a stored project
    pub fn apply_to(&self, dict: &mut ProjectDict) {
        if let Some(name) = &self.name {
            dict.name = name.clone();
        }
        if let Some(description) = &self.description {
            dict.description = description.clone();
        }
        if let Some(layers) = &self.layers {
            dict.layers = apply_vec_updates(&dict.layers, layers);
        }
        if let Some(plots) = &self.plots {
            dict.plots = apply_vec_updates(&dict.plots, plots);
        }
        if let Some(bounds) = &self.bounds {
            dict.bounds = bounds.clone();
        }
        if let Some(time_step) = self.time_step {
            dict.time_step = time_step;
        }
    }
}

fn apply_vec_updates<T: Clone>(old: &[T], updates: &[VecUpdate<T>]) -> Vec<T> {
    updates
        .iter()
        .enumerate()
        .filter_map(|(i, update)| match update {
            VecUpdate::None => old.get(i).cloned(),
            VecUpdate::Delete => None,
            VecUpdate::Content(content) => Some(content.clone()),
        })
        .collect()
}

/// Request body for creating a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub bounds: ProjectBounds,
    pub time_step: TimeStep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListing {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub layer_names: Vec<String>,
    pub changed: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectPermission {
    Read,
    Write,
    Owner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectFilter {
    #[serde(rename = "None")]
    None,
    Name { term: String },
    Description { term: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectOrder {
    DateAsc,
    DateDesc,
    NameAsc,
    NameDesc,
}

impl fmt::Display for ProjectOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match self {
            Self::DateAsc => "DateAsc",
            Self::DateDesc => "DateDesc",
            Self::NameAsc => "NameAsc",
            Self::NameDesc => "NameDesc",
        };
        f.write_str(order)
    }
}

/// Query options for listing projects
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectListOptions {
    pub permissions: Vec<ProjectPermission>,
    pub filter: ProjectFilter,
    pub order: ProjectOrder,
    pub offset: u32,
    pub limit: u32,
}

impl Default for ProjectListOptions {
    fn default() -> Self {
        Self {
            permissions: vec![ProjectPermission::Owner],
            filter: ProjectFilter::None,
            order: ProjectOrder::DateDesc,
            offset: 0,
            limit: 20,
        }
    }
}

impl ProjectListOptions {
    /// The newest owned project only
    pub fn most_recent() -> Self {
        Self {
            limit: 1,
            ..Self::default()
        }
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let permissions = serde_json::to_string(&self.permissions).unwrap_or_default();
        let filter = serde_json::to_string(&self.filter).unwrap_or_default();
        vec![
            ("permissions", permissions),
            ("filter", filter),
            ("order", self.order.to_string()),
            ("offset", self.offset.to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

/// The feature currently selected on the map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<BoundingBox2D>,
}

impl FeatureSelection {
    pub fn feature(id: impl Into<String>) -> Self {
        Self {
            feature: Some(id.into()),
            extent: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.feature.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::layer::LayerChanges;
    use chrono::{TimeZone, Utc};

    fn project() -> Project {
        Project {
            id: ProjectId::new(),
            name: "Default".to_string(),
            description: String::new(),
            spatial_reference: SpatialReference::wgs84(),
            time: TimeInterval::instant(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()),
            bbox: BoundingBox2D::world(),
            layers: vec![
                Layer::new("a", WorkflowId::new(), Symbology::default_point()),
                Layer::new("b", WorkflowId::new(), Symbology::default_raster()),
            ],
            plots: Vec::new(),
            time_step: TimeStep::default(),
            version: None,
        }
    }

    #[test]
    fn test_update_fields_is_a_new_value() {
        let project = project();
        let renamed = project.update_fields(ProjectChanges {
            name: Some("Renamed".to_string()),
            ..Default::default()
        });
        assert_eq!(renamed.name, "Renamed");
        assert_eq!(project.name, "Default");
        assert_eq!(renamed.layers, project.layers);
    }

    #[test]
    fn test_update_sends_only_changed_layers() {
        let old = project();
        let mut layers = old.layers.clone();
        layers[1] = layers[1].update_fields(LayerChanges::default().name("renamed"));
        let changes = ProjectChanges {
            layers: Some(layers),
            ..Default::default()
        };
        let new = old.update_fields(changes.clone());

        let update = ProjectUpdate::from_changes(&old, &new, &changes);
        let layers = update.layers.unwrap();
        assert_eq!(layers[0], VecUpdate::None);
        assert!(matches!(&layers[1], VecUpdate::Content(dict) if dict.name == "renamed"));
        assert!(update.bounds.is_none());
        assert!(update.name.is_none());
    }

    #[test]
    fn test_vec_update_wire_format() {
        let updates: Vec<VecUpdate<PlotDict>> = vec![VecUpdate::None, VecUpdate::Delete];
        assert_eq!(
            serde_json::to_value(&updates).unwrap(),
            serde_json::json!(["none", "delete"])
        );
    }

    #[test]
    fn test_apply_update_to_stored_project() {
        let old = project();
        let mut stored = old.to_dict();
        let changes = ProjectChanges {
            layers: Some(vec![old.layers[1].clone()]),
            time_step: Some(TimeStep::from_config("1 day")),
            ..Default::default()
        };
        let new = old.update_fields(changes.clone());
        ProjectUpdate::from_changes(&old, &new, &changes).apply_to(&mut stored);

        assert_eq!(stored.layers.len(), 1);
        assert_eq!(stored.layers[0].name, "b");
        assert_eq!(stored.time_step, TimeStep::from_config("1 day"));
    }

    #[test]
    fn test_dict_round_trip() {
        let project = project();
        let json = serde_json::to_value(project.to_dict()).unwrap();
        let restored = Project::from_dict(serde_json::from_value(json).unwrap());

        assert_eq!(restored.id, project.id);
        assert_eq!(restored.time, project.time);
        assert_eq!(restored.layers.len(), 2);
        assert_eq!(restored.layers[0].name, "a");
    }
}
