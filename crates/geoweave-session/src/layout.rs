//! Visibility and sizing of the map, the layer list, the detail view and the sidenav.

use futures::stream::BoxStream;
use geoweave_core::error::{GeoweaveError, Result};
use geoweave_core::reactive::Subject;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::tabs::ComponentId;

pub const DEFAULT_LAYER_DETAIL_VIEW_HEIGHT_PERCENTAGE: f64 = 0.4;

/// Screen size class the layout adapts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewportClass {
    Desktop,
    HandsetPortrait,
    HandsetLandscape,
}

/// Measurements taken once at startup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub rem_px: f64,
    pub scrollbar_width_px: u32,
    pub viewport: ViewportClass,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            rem_px: 16.0,
            scrollbar_width_px: 0,
            viewport: ViewportClass::Desktop,
        }
    }
}

impl LayoutMetrics {
    /// Height of the detail view's tab bar, the smallest the detail view gets
    pub fn min_bar_height(&self) -> u32 {
        let px = match self.viewport {
            ViewportClass::HandsetLandscape => 2.0 * self.rem_px,
            ViewportClass::HandsetPortrait => 2.5 * self.rem_px,
            ViewportClass::Desktop => 3.0 * self.rem_px + 1.0,
        };
        px.ceil() as u32
    }

    pub fn toolbar_height(&self) -> u32 {
        match self.viewport {
            ViewportClass::HandsetLandscape => 48,
            ViewportClass::HandsetPortrait => 56,
            ViewportClass::Desktop => 64,
        }
    }
}

/// What the sidenav shows; no config means the sidenav is closed
#[derive(Debug, Clone, PartialEq)]
pub struct SidenavConfig {
    pub component: ComponentId,
    pub parent: Option<ComponentId>,
    pub config: Option<Value>,
}

impl SidenavConfig {
    pub fn new(component: impl Into<ComponentId>) -> Self {
        Self {
            component: component.into(),
            parent: None,
            config: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<ComponentId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }
}

/// The persisted part of the layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSettings {
    pub layer_list_visible: bool,
    pub layer_detail_view_visible: bool,
    pub layer_detail_view_tab_index: usize,
    pub layer_detail_view_height_percentage: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            layer_list_visible: true,
            layer_detail_view_visible: true,
            layer_detail_view_tab_index: 0,
            layer_detail_view_height_percentage: DEFAULT_LAYER_DETAIL_VIEW_HEIGHT_PERCENTAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct LayoutState {
    settings: LayoutSettings,
    sidenav: Option<SidenavConfig>,
    sidenav_max_width: Option<u32>,
}

/// Height of the detail view in pixels
pub fn detail_view_height(percentage: f64, total_height: u32, min_bar_height: u32) -> u32 {
    let height = (percentage * f64::from(total_height)).ceil() as u32;
    height.max(min_bar_height).min(total_height)
}

/// Height left for the map; always `total_height - detail_view_height(..)`
pub fn map_height(percentage: f64, total_height: u32, min_bar_height: u32) -> u32 {
    total_height - detail_view_height(percentage, total_height, min_bar_height)
}

pub struct LayoutService {
    metrics: LayoutMetrics,
    state: Subject<LayoutState>,
}

impl LayoutService {
    pub fn new(metrics: LayoutMetrics) -> Self {
        Self {
            metrics,
            state: Subject::new(LayoutState::default()),
        }
    }

    pub fn metrics(&self) -> LayoutMetrics {
        self.metrics
    }

    fn current(&self) -> LayoutState {
        self.state.get().unwrap_or_default()
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut LayoutState),
    {
        self.state.update(|old| {
            let mut new = old.clone();
            f(&mut new);
            if &new == old {
                return None;
            }
            debug!(?new, "Layout changed");
            Some(new)
        });
    }

    // Layer list

    pub fn set_layer_list_visibility(&self, visible: bool) {
        self.update(|state| state.settings.layer_list_visible = visible);
    }

    pub fn toggle_layer_list_visibility(&self) {
        self.update(|state| state.settings.layer_list_visible = !state.settings.layer_list_visible);
    }

    pub fn layer_list_visibility(&self) -> bool {
        self.current().settings.layer_list_visible
    }

    pub fn layer_list_visibility_stream(&self) -> BoxStream<'static, bool> {
        self.state.select(|state| state.settings.layer_list_visible)
    }

    // Detail view

    pub fn set_layer_detail_view_visibility(&self, visible: bool) {
        self.update(|state| state.settings.layer_detail_view_visible = visible);
    }

    pub fn toggle_layer_detail_view_visibility(&self) {
        self.update(|state| {
            state.settings.layer_detail_view_visible = !state.settings.layer_detail_view_visible
        });
    }

    pub fn layer_detail_view_visibility(&self) -> bool {
        self.current().settings.layer_detail_view_visible
    }

    pub fn layer_detail_view_visibility_stream(&self) -> BoxStream<'static, bool> {
        self.state
            .select(|state| state.settings.layer_detail_view_visible)
    }

    pub fn set_layer_detail_view_tab_index(&self, index: usize) {
        self.update(|state| state.settings.layer_detail_view_tab_index = index);
    }

    pub fn layer_detail_view_tab_index(&self) -> usize {
        self.current().settings.layer_detail_view_tab_index
    }

    pub fn layer_detail_view_tab_index_stream(&self) -> BoxStream<'static, usize> {
        self.state
            .select(|state| state.settings.layer_detail_view_tab_index)
    }

    /// Set the share of the content height used by the detail view
    pub fn set_layer_detail_view_height_percentage(&self, percentage: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&percentage) {
            return Err(GeoweaveError::InvalidHeightPercentage { value: percentage });
        }
        self.update(|state| state.settings.layer_detail_view_height_percentage = percentage);
        Ok(())
    }

    pub fn layer_detail_view_height_percentage(&self) -> f64 {
        self.current().settings.layer_detail_view_height_percentage
    }

    pub fn layer_detail_view_height_percentage_stream(&self) -> BoxStream<'static, f64> {
        self.state
            .select(|state| state.settings.layer_detail_view_height_percentage)
    }

    fn effective_percentage(settings: &LayoutSettings) -> f64 {
        if settings.layer_detail_view_visible {
            settings.layer_detail_view_height_percentage
        } else {
            0.0
        }
    }

    /// Detail view height for the current settings
    pub fn detail_view_height(&self, total_height: u32) -> u32 {
        let settings = self.current().settings;
        detail_view_height(
            Self::effective_percentage(&settings),
            total_height,
            self.metrics.min_bar_height(),
        )
    }

    /// Map height for the current settings
    pub fn map_height(&self, total_height: u32) -> u32 {
        let settings = self.current().settings;
        map_height(
            Self::effective_percentage(&settings),
            total_height,
            self.metrics.min_bar_height(),
        )
    }

    pub fn map_height_stream(&self, total_height: u32) -> BoxStream<'static, u32> {
        let min_bar_height = self.metrics.min_bar_height();
        self.state.select(move |state| {
            map_height(
                Self::effective_percentage(&state.settings),
                total_height,
                min_bar_height,
            )
        })
    }

    // Sidenav

    /// Show a component in the sidenav, `None` closes it
    pub fn set_sidenav_content_component(&self, config: Option<SidenavConfig>) {
        self.update(|state| state.sidenav = config);
    }

    pub fn sidenav_content_component(&self) -> Option<SidenavConfig> {
        self.current().sidenav
    }

    pub fn sidenav_content_component_stream(&self) -> BoxStream<'static, Option<SidenavConfig>> {
        self.state.select(|state| state.sidenav.clone())
    }

    pub fn set_sidenav_max_width(&self, width: Option<u32>) {
        self.update(|state| state.sidenav_max_width = width);
    }

    pub fn sidenav_max_width(&self) -> Option<u32> {
        self.current().sidenav_max_width
    }

    pub fn sidenav_max_width_stream(&self) -> BoxStream<'static, Option<u32>> {
        self.state.select(|state| state.sidenav_max_width)
    }

    // Settings

    pub fn layout_settings(&self) -> LayoutSettings {
        self.current().settings
    }

    pub fn layout_settings_stream(&self) -> BoxStream<'static, LayoutSettings> {
        self.state.select(|state| state.settings)
    }

    /// Apply stored settings; fields that are missing or invalid keep their current value
    pub fn apply_layout_settings(&self, value: &Value) {
        let Some(fields) = value.as_object() else {
            warn!("Ignoring layout settings that are not an object");
            return;
        };

        self.update(|state| {
            let settings = &mut state.settings;
            for (key, value) in fields {
                match key.as_str() {
                    "layerListVisible" => match value.as_bool() {
                        Some(visible) => settings.layer_list_visible = visible,
                        None => warn!(key = %key, %value, "Skipping invalid layout setting"),
                    },
                    "layerDetailViewVisible" => match value.as_bool() {
                        Some(visible) => settings.layer_detail_view_visible = visible,
                        None => warn!(key = %key, %value, "Skipping invalid layout setting"),
                    },
                    "layerDetailViewTabIndex" => {
                        match value.as_u64().and_then(|index| usize::try_from(index).ok()) {
                            Some(index) => settings.layer_detail_view_tab_index = index,
                            None => warn!(key = %key, %value, "Skipping invalid layout setting"),
                        }
                    }
                    "layerDetailViewHeightPercentage" => {
                        match value.as_f64().filter(|pct| (0.0..=1.0).contains(pct)) {
                            Some(percentage) => {
                                settings.layer_detail_view_height_percentage = percentage
                            }
                            None => warn!(key = %key, %value, "Skipping invalid layout setting"),
                        }
                    }
                    _ => debug!(key = %key, "Ignoring unknown layout setting"),
                }
            }
        });
    }
}

impl Default for LayoutService {
    fn default() -> Self {
        Self::new(LayoutMetrics::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{FutureExt, StreamExt};
    use serde_json::json;

    #[test]
    fn test_min_bar_height_per_viewport() {
        let mut metrics = LayoutMetrics::default();
        assert_eq!(metrics.min_bar_height(), 49);

        metrics.viewport = ViewportClass::HandsetPortrait;
        assert_eq!(metrics.min_bar_height(), 40);

        metrics.viewport = ViewportClass::HandsetLandscape;
        assert_eq!(metrics.min_bar_height(), 32);
        assert_eq!(metrics.toolbar_height(), 48);
    }

    #[test]
    fn test_heights_add_up() {
        assert_eq!(detail_view_height(0.4, 1000, 49), 400);
        assert_eq!(map_height(0.4, 1000, 49), 600);
        assert_eq!(detail_view_height(0.0, 1000, 49), 49);
        assert_eq!(map_height(1.0, 1000, 49), 0);
        assert_eq!(detail_view_height(0.333, 100, 10) + map_height(0.333, 100, 10), 100);
    }

    #[test]
    fn test_height_percentage_is_validated() {
        let layout = LayoutService::default();
        assert!(matches!(
            layout.set_layer_detail_view_height_percentage(-0.1),
            Err(GeoweaveError::InvalidHeightPercentage { .. })
        ));
        assert!(layout.set_layer_detail_view_height_percentage(1.1).is_err());
        assert_eq!(layout.layer_detail_view_height_percentage(), 0.4);

        layout.set_layer_detail_view_height_percentage(1.0).unwrap();
        assert_eq!(layout.layer_detail_view_height_percentage(), 1.0);
    }

    #[test]
    fn test_hidden_detail_view_uses_bar_height() {
        let layout = LayoutService::default();
        layout.set_layer_detail_view_visibility(false);
        assert_eq!(layout.detail_view_height(800), 49);
        assert_eq!(layout.map_height(800), 751);
    }

    #[test]
    fn test_apply_settings_skips_invalid_fields() {
        let layout = LayoutService::default();
        layout.apply_layout_settings(&json!({
            "layerListVisible": false,
            "layerDetailViewVisible": "yes",
            "layerDetailViewTabIndex": -2,
            "layerDetailViewHeightPercentage": 0.25,
            "somethingNew": 1
        }));

        assert_eq!(
            layout.layout_settings(),
            LayoutSettings {
                layer_list_visible: false,
                layer_detail_view_visible: true,
                layer_detail_view_tab_index: 0,
                layer_detail_view_height_percentage: 0.25,
            }
        );

        layout.apply_layout_settings(&json!({"layerDetailViewHeightPercentage": 7}));
        assert_eq!(layout.layer_detail_view_height_percentage(), 0.25);
        layout.apply_layout_settings(&json!([1, 2]));
        assert!(!layout.layer_list_visibility());
    }

    #[test]
    fn test_settings_serialize_flat() {
        let value = serde_json::to_value(LayoutSettings::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "layerListVisible": true,
                "layerDetailViewVisible": true,
                "layerDetailViewTabIndex": 0,
                "layerDetailViewHeightPercentage": 0.4
            })
        );
    }

    #[tokio::test]
    async fn test_unchanged_tab_index_does_not_emit() {
        let layout = LayoutService::default();
        let mut indices = layout.layer_detail_view_tab_index_stream();
        layout.set_layer_detail_view_tab_index(0);
        layout.set_layer_detail_view_tab_index(2);
        layout.set_layer_detail_view_tab_index(2);

        assert_eq!(indices.next().await, Some(0));
        assert_eq!(indices.next().await, Some(2));
        assert_eq!(layout.state.subscriber_count(), 1);
    }

    #[test]
    fn test_concurrent_toggles_are_not_lost() {
        let layout = LayoutService::default();
        let initial = layout.layer_list_visibility();
        let mut visibility = layout.layer_list_visibility_stream();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        layout.toggle_layer_list_visibility();
                    }
                });
            }
        });

        let mut seen = Vec::new();
        while let Some(Some(visible)) = visibility.next().now_or_never() {
            seen.push(visible);
        }
        assert_eq!(seen.len(), 101);
        assert_eq!(layout.layer_list_visibility(), initial);
    }

    #[tokio::test]
    async fn test_sidenav_stream_is_distinct() {
        let layout = LayoutService::default();
        let mut sidenav = layout.sidenav_content_component_stream();

        layout.set_sidenav_content_component(Some(SidenavConfig::new("add-data")));
        layout.set_sidenav_content_component(Some(SidenavConfig::new("add-data")));
        layout.set_sidenav_content_component(None);

        assert_eq!(sidenav.next().await, Some(None));
        assert_eq!(
            sidenav.next().await,
            Some(Some(SidenavConfig::new("add-data")))
        );
        assert_eq!(sidenav.next().await, Some(None));
    }
}
