pub mod layer;
pub mod plot;
pub mod project;
pub mod session;
pub mod spatial;
pub mod symbology;
pub mod time;
pub mod workflow;

pub use layer::{Layer, LayerChanges, LayerId, LayerKind};
pub use plot::{Plot, PlotData, PlotDict, PlotId, PlotOutputFormat};
pub use project::{
    FeatureSelection, LayerVisibility, NewProject, Project, ProjectBounds, ProjectChanges,
    ProjectDict, ProjectFilter, ProjectId, ProjectLayerDict, ProjectListOptions, ProjectListing,
    ProjectOrder, ProjectPermission, ProjectUpdate, ProjectVersion, VecUpdate,
};
pub use session::{Session, SessionToken};
pub use spatial::{BoundingBox2D, Coordinate2D, SpatialReference, SpatialReferenceSpecification};
pub use symbology::{
    Breakpoint, ColorParam, Colorizer, NumberParam, RasterColorizer, RgbaColor, Stroke, Symbology,
    TextSymbology,
};
pub use time::{TimeGranularity, TimeInterval, TimeKind, TimeStep};
pub use workflow::{
    Operator, Provenance, ProvenanceEntry, ResultDescriptor, SourceSlot, SpatialResolution,
    Workflow, WorkflowId, WorkflowKind,
};
