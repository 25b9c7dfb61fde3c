//! Geoweave Session - Reactive project, layout and tab state
//!
//! This crate holds the single source of truth for the active project and
//! the UI layout, and keeps both in sync with a storage provider.

pub mod layout;
pub mod project;
pub mod sync;
pub mod tabs;

pub use layout::{LayoutMetrics, LayoutService, LayoutSettings, SidenavConfig, ViewportClass};
pub use project::{ProjectDefaults, ProjectService};
pub use sync::{StorageStatus, StorageSync};
pub use tabs::{ComponentId, InputEquality, OpenTab, TabContent, TabId, TabsService};
